use serde::{Deserialize, Serialize};
use tracing::{debug, info};

use crate::calendar::{DayCell, ViewMonth, WeekStart, build_month_grid};
use crate::datekey::DateKey;
use crate::filter::{TaskFilter, is_clear_sentinel};
use crate::holiday::{HolidayBook, HolidaySource};
use crate::store::{TaskAction, TaskStore};
use crate::task::Task;
use crate::transfer::{self, ImportBundle, ImportError};

/// The part of the planner that survives between sessions. Search text
/// and the color filter are not part of it.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct PlannerState {
    #[serde(default)]
    pub tasks: Vec<Task>,
    #[serde(default = "ViewMonth::today")]
    pub view: ViewMonth,
    #[serde(default)]
    pub pen: Option<String>,
}

impl Default for PlannerState {
    fn default() -> Self {
        Self {
            tasks: vec![],
            view: ViewMonth::today(),
            pen: None,
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ImportReport {
    pub month: ViewMonth,
    pub added: usize,
    pub skipped: usize,
}

#[derive(Debug, Clone)]
pub struct Planner {
    store: TaskStore,
    filter: TaskFilter,
    view: ViewMonth,
    pen: Option<String>,
    holidays: HolidayBook,
    week_start: WeekStart,
}

impl Planner {
    pub fn new(state: PlannerState, week_start: WeekStart) -> Self {
        // the view comes from disk; re-check its range
        let view = ViewMonth::new(state.view.year(), state.view.month()).unwrap_or_else(ViewMonth::today);
        Self {
            store: TaskStore::new(state.tasks),
            filter: TaskFilter::default(),
            view,
            pen: state.pen,
            holidays: HolidayBook::default(),
            week_start,
        }
    }

    pub fn snapshot(&self) -> PlannerState {
        PlannerState {
            tasks: self.store.tasks().to_vec(),
            view: self.view,
            pen: self.pen.clone(),
        }
    }

    pub fn store(&self) -> &TaskStore {
        &self.store
    }

    pub fn filter(&self) -> &TaskFilter {
        &self.filter
    }

    pub fn view(&self) -> ViewMonth {
        self.view
    }

    pub fn pen(&self) -> Option<&str> {
        self.pen.as_deref()
    }

    pub fn week_start(&self) -> WeekStart {
        self.week_start
    }

    pub fn holidays(&self) -> &HolidayBook {
        &self.holidays
    }

    pub fn holidays_mut(&mut self) -> &mut HolidayBook {
        &mut self.holidays
    }

    pub fn goto(&mut self, view: ViewMonth) {
        debug!(from = %self.view, to = %view, "changing visible month");
        self.view = view;
    }

    pub fn prev_month(&mut self) {
        self.goto(self.view.prev());
    }

    pub fn next_month(&mut self) {
        self.goto(self.view.next());
    }

    pub fn set_search(&mut self, text: impl Into<String>) {
        self.filter.set_search(text);
    }

    pub fn toggle_color_filter(&mut self, color: &str) {
        self.filter.toggle_color(color);
    }

    /// Selects the label color applied by create and rename; a clear
    /// sentinel deselects it.
    pub fn select_pen(&mut self, color: Option<&str>) {
        self.pen = color
            .filter(|c| !is_clear_sentinel(c) && !c.trim().is_empty())
            .map(str::to_string);
        debug!(pen = ?self.pen, "pen color selected");
    }

    pub fn dispatch(&mut self, action: TaskAction) {
        self.store.dispatch(action);
    }

    /// Creates a task labelled with the current pen color. Returns the new
    /// task's id, or `None` for a blank title.
    pub fn create_task(&mut self, date: DateKey, title: &str) -> Option<String> {
        self.create_labelled(date, title, self.pen.clone())
    }

    /// Like [`Planner::create_task`] with an explicit label instead of the pen.
    pub fn create_labelled(&mut self, date: DateKey, title: &str, color: Option<String>) -> Option<String> {
        let before = self.store.len();
        self.store.dispatch(TaskAction::Create {
            date,
            title: title.to_string(),
            color,
        });
        if self.store.len() > before {
            self.store.tasks().last().map(|task| task.id.clone())
        } else {
            None
        }
    }

    pub fn rename_task(&mut self, id: &str, title: &str) {
        self.rename_labelled(id, title, self.pen.clone());
    }

    pub fn rename_labelled(&mut self, id: &str, title: &str, color: Option<String>) {
        self.store.dispatch(TaskAction::Rename {
            id: id.to_string(),
            title: title.to_string(),
            color,
        });
    }

    pub fn delete_task(&mut self, id: &str) {
        self.store.dispatch(TaskAction::Delete(id.to_string()));
    }

    pub fn remove_label(&mut self, id: &str, label: &str) {
        self.store.dispatch(TaskAction::RemoveLabel {
            id: id.to_string(),
            label: label.to_string(),
        });
    }

    /// Drop on a day: returns whether anything moved.
    pub fn move_task(&mut self, id: &str, date: DateKey) -> bool {
        match self.store.moved_to_day(id, date) {
            Some(tasks) => {
                self.store.dispatch(TaskAction::ReplaceAll(tasks));
                true
            }
            None => false,
        }
    }

    /// Drop on another task: returns whether anything moved.
    pub fn reorder_task(&mut self, source: &str, target: &str) -> bool {
        match self.store.reordered(source, target) {
            Some(tasks) => {
                self.store.dispatch(TaskAction::ReplaceAll(tasks));
                true
            }
            None => false,
        }
    }

    pub fn grid(&self) -> Vec<DayCell> {
        build_month_grid(
            self.view,
            self.week_start,
            self.holidays.holidays(),
            self.store.tasks(),
            &self.filter,
        )
    }

    pub fn export_json(&self) -> anyhow::Result<String> {
        transfer::export_grid(&self.grid())
    }

    /// Switches to the document's month and appends the tasks whose ids
    /// are not in the store yet.
    #[tracing::instrument(skip(self, raw))]
    pub fn import_json(&mut self, raw: &str) -> Result<ImportReport, ImportError> {
        let bundle = transfer::parse_import(raw)?;
        Ok(self.merge(bundle))
    }

    pub fn merge(&mut self, bundle: ImportBundle) -> ImportReport {
        self.goto(bundle.month);

        let mut added = 0;
        let mut skipped = 0;
        for task in bundle.tasks {
            if self.store.contains(&task.id) {
                skipped += 1;
                continue;
            }
            self.store.dispatch(TaskAction::Append(task));
            added += 1;
        }

        info!(month = %bundle.month, added, skipped, "imported tasks");
        ImportReport {
            month: bundle.month,
            added,
            skipped,
        }
    }

    /// Loads holidays for the visible year unless they are already held.
    pub async fn refresh_holidays<S: HolidaySource>(&mut self, source: &S) -> bool {
        let year = self.view.year();
        if self.holidays.year() == Some(year) && !self.holidays.holidays().is_empty() {
            return true;
        }
        self.holidays.refresh(source, year).await
    }
}
