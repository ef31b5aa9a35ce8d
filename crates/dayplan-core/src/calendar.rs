use std::collections::BTreeMap;
use std::fmt;
use std::str::FromStr;

use anyhow::anyhow;
use chrono::{Datelike, Days, NaiveDate, Weekday};
use serde::{Deserialize, Serialize};
use tracing::debug;

use crate::datekey::{DateKey, days_in_month};
use crate::filter::TaskFilter;
use crate::holiday::{Holiday, holiday_on};
use crate::task::Task;

const MIN_VIEW_YEAR: i32 = 1;
const MAX_VIEW_YEAR: i32 = 9998;

/// The month the grid is built for.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
pub struct ViewMonth {
    year: i32,
    month: u32,
}

impl ViewMonth {
    /// `month` is 1-based. Years are kept one step inside the four-digit
    /// range so the neighbouring months always have day keys.
    pub fn new(year: i32, month: u32) -> Option<Self> {
        if (1..=12).contains(&month) && (MIN_VIEW_YEAR..=MAX_VIEW_YEAR).contains(&year) {
            Some(Self { year, month })
        } else {
            None
        }
    }

    pub fn of_date(date: NaiveDate) -> Option<Self> {
        Self::new(date.year(), date.month())
    }

    pub fn of_key(key: &DateKey) -> Option<Self> {
        Self::new(key.year(), key.month())
    }

    pub fn today() -> Self {
        Self::of_date(chrono::Local::now().date_naive()).unwrap_or(Self {
            year: 2000,
            month: 1,
        })
    }

    pub fn year(&self) -> i32 {
        self.year
    }

    pub fn month(&self) -> u32 {
        self.month
    }

    pub fn days(&self) -> u32 {
        days_in_month(self.year, self.month)
    }

    #[must_use]
    pub fn prev(&self) -> Self {
        let (year, month) = if self.month == 1 {
            (self.year - 1, 12)
        } else {
            (self.year, self.month - 1)
        };
        Self::new(year, month).unwrap_or(*self)
    }

    #[must_use]
    pub fn next(&self) -> Self {
        let (year, month) = if self.month == 12 {
            (self.year + 1, 1)
        } else {
            (self.year, self.month + 1)
        };
        Self::new(year, month).unwrap_or(*self)
    }

    pub fn first_day(&self) -> Option<NaiveDate> {
        NaiveDate::from_ymd_opt(self.year, self.month, 1)
    }

    pub fn contains(&self, key: &DateKey) -> bool {
        key.year() == self.year && key.month() == self.month
    }

    /// Header title, e.g. `October 2026`.
    pub fn title(&self) -> String {
        self.first_day()
            .map(|first| first.format("%B %Y").to_string())
            .unwrap_or_else(|| self.to_string())
    }
}

impl fmt::Display for ViewMonth {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{:04}-{:02}", self.year, self.month)
    }
}

impl FromStr for ViewMonth {
    type Err = anyhow::Error;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        let (year, month) = s
            .trim()
            .split_once('-')
            .ok_or_else(|| anyhow!("expected YYYY-MM, got: {s}"))?;
        let year: i32 = year
            .parse()
            .map_err(|_| anyhow!("invalid year in {s}"))?;
        let month: u32 = month
            .parse()
            .map_err(|_| anyhow!("invalid month in {s}"))?;
        Self::new(year, month).ok_or_else(|| anyhow!("month out of range: {s}"))
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum WeekStart {
    #[default]
    Sunday,
    Monday,
}

impl WeekStart {
    pub fn parse(raw: &str) -> Option<Self> {
        match raw.trim().to_ascii_lowercase().as_str() {
            "sunday" | "sun" => Some(WeekStart::Sunday),
            "monday" | "mon" => Some(WeekStart::Monday),
            _ => None,
        }
    }

    pub fn weekday(&self) -> Weekday {
        match self {
            WeekStart::Sunday => Weekday::Sun,
            WeekStart::Monday => Weekday::Mon,
        }
    }

    /// Column index (0-6) of `day` in a row starting on this weekday.
    pub fn column_of(&self, day: Weekday) -> u32 {
        let start = self.weekday().num_days_from_sunday();
        (day.num_days_from_sunday() + 7 - start) % 7
    }

    /// The seven weekdays in column order.
    pub fn columns(&self) -> [Weekday; 7] {
        let mut days = [self.weekday(); 7];
        for idx in 1..7 {
            days[idx] = days[idx - 1].succ();
        }
        days
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum CellKind {
    #[serde(rename = "prevMonth")]
    PrevMonth,
    #[serde(rename = "currentMonth")]
    CurrentMonth,
    #[serde(rename = "nextMonth")]
    NextMonth,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct DayCell {
    pub name: CellKind,
    pub date: DateKey,
    pub day: u32,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub holiday: Option<String>,
    #[serde(default)]
    pub tasks: Vec<Task>,
}

impl DayCell {
    pub fn is_current(&self) -> bool {
        self.name == CellKind::CurrentMonth
    }
}

/// Builds the day cells for `view`: the tail of the previous month up to
/// the first weekday, every day of the month, then next-month days until
/// the last row is full. Cell count is always a multiple of 7.
#[tracing::instrument(skip(holidays, tasks, filter), fields(view = %view))]
pub fn build_month_grid(
    view: ViewMonth,
    week_start: WeekStart,
    holidays: &[Holiday],
    tasks: &[Task],
    filter: &TaskFilter,
) -> Vec<DayCell> {
    let Some(first) = view.first_day() else {
        return Vec::new();
    };

    let leading = week_start.column_of(first.weekday());
    let filled = leading + view.days();
    let trailing = (7 - filled % 7) % 7;
    let total = filled + trailing;

    let mut tasks_by_day: BTreeMap<DateKey, Vec<&Task>> = BTreeMap::new();
    for task in tasks {
        tasks_by_day.entry(task.date).or_default().push(task);
    }

    let Some(start) = first.checked_sub_days(Days::new(u64::from(leading))) else {
        return Vec::new();
    };

    let cells: Vec<DayCell> = start
        .iter_days()
        .take(total as usize)
        .filter_map(DateKey::from_date)
        .map(|date| {
            let name = if view.contains(&date) {
                CellKind::CurrentMonth
            } else if date.date() < first {
                CellKind::PrevMonth
            } else {
                CellKind::NextMonth
            };
            let day_tasks = tasks_by_day
                .get(&date)
                .map(|list| filter.apply(list.iter().copied()))
                .unwrap_or_default();

            DayCell {
                name,
                date,
                day: date.day(),
                holiday: holiday_on(holidays, &date).map(|holiday| holiday.name.clone()),
                tasks: day_tasks,
            }
        })
        .collect();

    debug!(
        leading,
        trailing,
        cells = cells.len(),
        holidays = holidays.len(),
        "built month grid"
    );
    cells
}

/// The month a grid was built for, taken from its first current-month cell.
pub fn grid_month(cells: &[DayCell]) -> Option<ViewMonth> {
    cells
        .iter()
        .find(|cell| cell.is_current())
        .and_then(|cell| ViewMonth::of_key(&cell.date))
}
