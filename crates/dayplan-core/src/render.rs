use std::io::{self, IsTerminal, Write};

use unicode_width::{UnicodeWidthChar, UnicodeWidthStr};

use crate::calendar::{CellKind, DayCell, ViewMonth, WeekStart};
use crate::config::Config;
use crate::holiday::Holiday;
use crate::task::Task;

const CELL_WIDTH: usize = 14;

#[derive(Debug, Clone)]
pub struct Renderer {
    color: bool,
}

impl Renderer {
    pub fn new(cfg: &Config) -> Self {
        Self {
            color: cfg.color && io::stdout().is_terminal(),
        }
    }

    pub fn plain() -> Self {
        Self { color: false }
    }

    #[tracing::instrument(skip(self, cells))]
    pub fn print_month(&self, view: ViewMonth, week_start: WeekStart, cells: &[DayCell]) -> anyhow::Result<()> {
        let out = io::stdout().lock();
        self.write_month(out, view, week_start, cells)
    }

    pub fn write_month<W: Write>(
        &self,
        mut out: W,
        view: ViewMonth,
        week_start: WeekStart,
        cells: &[DayCell],
    ) -> anyhow::Result<()> {
        writeln!(out, "{}", self.paint(&view.title(), "1"))?;

        let header: Vec<String> = week_start
            .columns()
            .iter()
            .map(|day| fit(&day.to_string(), CELL_WIDTH))
            .collect();
        writeln!(out, "{}", header.join("|"))?;
        writeln!(out, "{}", vec!["-".repeat(CELL_WIDTH); 7].join("+"))?;

        for week in cells.chunks(7) {
            let height = week.iter().map(cell_height).max().unwrap_or(1);
            for line in 0..height {
                let parts: Vec<String> = week.iter().map(|cell| self.cell_line(cell, line)).collect();
                writeln!(out, "{}", parts.join("|"))?;
            }
            writeln!(out, "{}", vec!["-".repeat(CELL_WIDTH); 7].join("+"))?;
        }

        Ok(())
    }

    fn cell_line(&self, cell: &DayCell, line: usize) -> String {
        let holiday_lines = usize::from(cell.holiday.is_some());

        let (text, code) = if line == 0 {
            let marker = if cell.holiday.is_some() { "*" } else { "" };
            (format!("{:>2}{marker}", cell.day), day_code(cell))
        } else if line <= holiday_lines {
            (cell.holiday.clone().unwrap_or_default(), Some("31"))
        } else if let Some(task) = cell.tasks.get(line - 1 - holiday_lines) {
            (format!("- {}", task.title), None)
        } else {
            (String::new(), None)
        };

        let text = fit(&text, CELL_WIDTH);
        match code {
            Some(code) => self.paint(&text, code),
            None => text,
        }
    }

    /// Tasks with their ids, in store order.
    #[tracing::instrument(skip(self, tasks))]
    pub fn print_task_table(&self, tasks: &[Task]) -> anyhow::Result<()> {
        let out = io::stdout().lock();
        self.write_task_table(out, tasks)
    }

    pub fn write_task_table<W: Write>(&self, out: W, tasks: &[Task]) -> anyhow::Result<()> {
        let headers = vec![
            "ID".to_string(),
            "Date".to_string(),
            "Title".to_string(),
            "Labels".to_string(),
        ];

        let rows = tasks
            .iter()
            .map(|task| {
                vec![
                    self.paint(task.short_id(), "33"),
                    task.date.to_string(),
                    task.title.clone(),
                    task.labels.join(" "),
                ]
            })
            .collect();

        write_table(out, headers, rows)
    }

    #[tracing::instrument(skip(self, holidays))]
    pub fn print_holidays(&self, holidays: &[Holiday]) -> anyhow::Result<()> {
        let out = io::stdout().lock();
        let headers = vec!["Date".to_string(), "Name".to_string(), "Local name".to_string()];
        let rows = holidays
            .iter()
            .map(|holiday| {
                vec![
                    self.paint(&holiday.date.to_string(), "31"),
                    holiday.name.clone(),
                    holiday.local_name.clone(),
                ]
            })
            .collect();
        write_table(out, headers, rows)
    }

    fn paint(&self, text: &str, code: &str) -> String {
        if !self.color {
            return text.to_string();
        }
        format!("\x1b[{code}m{text}\x1b[0m")
    }
}

fn day_code(cell: &DayCell) -> Option<&'static str> {
    match (cell.name, cell.holiday.is_some()) {
        (_, true) => Some("1;31"),
        (CellKind::CurrentMonth, false) => Some("1"),
        _ => Some("2"),
    }
}

fn cell_height(cell: &DayCell) -> usize {
    1 + usize::from(cell.holiday.is_some()) + cell.tasks.len()
}

/// Cuts or pads `text` to exactly `width` terminal columns.
fn fit(text: &str, width: usize) -> String {
    let mut out = String::with_capacity(width);
    let mut used = 0;

    if UnicodeWidthStr::width(text) > width {
        for ch in text.chars() {
            let w = UnicodeWidthChar::width(ch).unwrap_or(0);
            if used + w + 1 > width {
                break;
            }
            out.push(ch);
            used += w;
        }
        out.push('…');
        used += 1;
    } else {
        out.push_str(text);
        used = UnicodeWidthStr::width(text);
    }

    out.push_str(&" ".repeat(width.saturating_sub(used)));
    out
}

fn write_table<W: Write>(mut writer: W, headers: Vec<String>, rows: Vec<Vec<String>>) -> anyhow::Result<()> {
    let column_count = headers.len();
    let mut widths: Vec<usize> = headers.iter().map(|h| UnicodeWidthStr::width(h.as_str())).collect();

    for row in &rows {
        for (idx, cell) in row.iter().enumerate().take(column_count) {
            widths[idx] = widths[idx].max(UnicodeWidthStr::width(strip_ansi(cell).as_str()));
        }
    }

    let header_line: Vec<String> = headers
        .iter()
        .zip(&widths)
        .map(|(header, &width)| format!("{header:width$}"))
        .collect();
    writeln!(writer, "{}", header_line.join(" ").trim_end())?;

    let rule: Vec<String> = widths.iter().map(|width| "-".repeat(*width)).collect();
    writeln!(writer, "{}", rule.join(" "))?;

    for row in rows {
        let cells: Vec<String> = row
            .iter()
            .zip(&widths)
            .map(|(cell, &width)| {
                let visible = UnicodeWidthStr::width(strip_ansi(cell).as_str());
                format!("{cell}{}", " ".repeat(width.saturating_sub(visible)))
            })
            .collect();
        writeln!(writer, "{}", cells.join(" ").trim_end())?;
    }

    Ok(())
}

fn strip_ansi(s: &str) -> String {
    let mut out = String::with_capacity(s.len());
    let mut escaped = false;

    for ch in s.chars() {
        if escaped {
            escaped = ch != 'm';
            continue;
        }
        if ch == '\x1b' {
            escaped = true;
            continue;
        }
        out.push(ch);
    }

    out
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::calendar::build_month_grid;
    use crate::filter::TaskFilter;

    fn render(cells: &[DayCell], view: ViewMonth) -> String {
        let mut buf = Vec::new();
        Renderer::plain()
            .write_month(&mut buf, view, WeekStart::Sunday, cells)
            .expect("render");
        String::from_utf8(buf).expect("utf8")
    }

    #[test]
    fn month_has_title_header_and_week_rows() {
        let view = ViewMonth::new(2026, 4).expect("month");
        let cells = build_month_grid(view, WeekStart::Sunday, &[], &[], &TaskFilter::default());
        let text = render(&cells, view);
        let lines: Vec<&str> = text.lines().collect();

        assert_eq!(lines[0], "April 2026");
        assert!(lines[1].starts_with("Sun"));
        // title, header, rule, then five weeks of one line plus a rule each
        assert_eq!(lines.len(), 3 + 5 * 2);
        assert!(lines[3].starts_with("29"));
    }

    #[test]
    fn tasks_and_holidays_grow_their_row() {
        let view = ViewMonth::new(2026, 8).expect("month");
        let tasks = vec![Task {
            id: "abcdef0123".to_string(),
            title: "A rather long meeting title".to_string(),
            date: "2026-08-24".parse().expect("key"),
            labels: vec![],
        }];
        let holidays = vec![Holiday {
            date: "2026-08-24".parse().expect("key"),
            local_name: "День Незалежності".to_string(),
            name: "Independence Day".to_string(),
            country_code: "UA".to_string(),
            fixed: true,
            global: true,
            counties: None,
            launch_year: None,
            types: vec![],
        }];
        let cells = build_month_grid(view, WeekStart::Sunday, &holidays, &tasks, &TaskFilter::default());
        let text = render(&cells, view);

        assert!(text.contains("24*"));
        assert!(text.contains("Independence …"));
        assert!(text.contains("- A rather lo…"));
        for line in text.lines().skip(1) {
            assert_eq!(UnicodeWidthStr::width(line), 7 * CELL_WIDTH + 6, "{line}");
        }
    }

    #[test]
    fn fit_pads_and_truncates_by_display_width() {
        assert_eq!(fit("abc", 5), "abc  ");
        assert_eq!(fit("abcdefgh", 5), "abcd…");
        assert_eq!(UnicodeWidthStr::width(fit("会議会議会議", 5).as_str()), 5);
    }

    #[test]
    fn table_aligns_on_visible_width() {
        let mut buf = Vec::new();
        write_table(
            &mut buf,
            vec!["ID".to_string(), "Title".to_string()],
            vec![vec!["\x1b[33mab\x1b[0m".to_string(), "x".to_string()]],
        )
        .expect("table");
        let text = String::from_utf8(buf).expect("utf8");
        let lines: Vec<&str> = text.lines().collect();
        assert_eq!(lines[0], "ID Title");
        assert_eq!(strip_ansi(lines[2]), "ab x");
    }
}
