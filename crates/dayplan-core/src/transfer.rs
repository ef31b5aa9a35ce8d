//! JSON export of the rendered grid and the matching import.

use anyhow::Context;
use tracing::{debug, warn};

use crate::calendar::{DayCell, ViewMonth, grid_month};
use crate::task::Task;

/// Default name of the exported document.
pub const EXPORT_FILE_NAME: &str = "data.json";

#[derive(Debug, thiserror::Error)]
pub enum ImportError {
    /// Not JSON, or JSON that is not an array of day cells.
    #[error("invalid import format: {0}")]
    InvalidFormat(#[from] serde_json::Error),

    /// The document has no cell for the month it was exported from.
    #[error("invalid import format: no currentMonth cell")]
    MissingCurrentMonth,

    /// The currentMonth cell names a month outside the supported range.
    #[error("invalid import format: month {0} is out of range")]
    MonthOutOfRange(String),
}

/// Tasks and target month read from an export document.
#[derive(Debug, Clone, PartialEq)]
pub struct ImportBundle {
    pub month: ViewMonth,
    pub tasks: Vec<Task>,
}

pub fn export_grid(cells: &[DayCell]) -> anyhow::Result<String> {
    serde_json::to_string(cells).context("failed serializing calendar grid")
}

pub fn export_grid_pretty(cells: &[DayCell]) -> anyhow::Result<String> {
    serde_json::to_string_pretty(cells).context("failed serializing calendar grid")
}

#[tracing::instrument(skip(raw), fields(bytes = raw.len()))]
pub fn parse_import(raw: &str) -> Result<ImportBundle, ImportError> {
    let cells: Vec<DayCell> = serde_json::from_str(raw).map_err(|err| {
        warn!(error = %err, "rejecting import document");
        ImportError::from(err)
    })?;

    let month = match grid_month(&cells) {
        Some(month) => month,
        None => {
            return Err(match cells.iter().find(|cell| cell.is_current()) {
                Some(cell) => ImportError::MonthOutOfRange(cell.date.to_string()),
                None => ImportError::MissingCurrentMonth,
            });
        }
    };

    let tasks: Vec<Task> = cells.into_iter().flat_map(|cell| cell.tasks).collect();
    debug!(month = %month, tasks = tasks.len(), "parsed import document");

    Ok(ImportBundle { month, tasks })
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::calendar::{WeekStart, build_month_grid};
    use crate::filter::TaskFilter;

    fn task(id: &str, date: &str) -> Task {
        Task {
            id: id.to_string(),
            title: format!("task {id}"),
            date: date.parse().expect("valid key"),
            labels: vec!["red".to_string()],
        }
    }

    #[test]
    fn export_then_import_recovers_month_and_tasks() {
        let tasks = vec![task("a", "2026-10-16"), task("b", "2026-09-28"), task("c", "2026-12-24")];
        let view = ViewMonth::new(2026, 10).expect("month");
        let cells = build_month_grid(view, WeekStart::Sunday, &[], &tasks, &TaskFilter::default());

        let bundle = parse_import(&export_grid(&cells).expect("export")).expect("import");
        assert_eq!(bundle.month, view);
        // 2026-09-28 is a leading cell of the October grid, 12-24 is not on it
        let ids: Vec<&str> = bundle.tasks.iter().map(|t| t.id.as_str()).collect();
        assert_eq!(ids, vec!["b", "a"]);
    }

    #[test]
    fn cells_without_tasks_field_are_accepted() {
        let raw = r#"[
          {"name":"prevMonth","date":"2026-09-30","day":30},
          {"name":"currentMonth","date":"2026-10-01","day":1,"holiday":"x",
           "tasks":[{"id":"t1","title":"Meeting","date":"2026-10-01","labels":["red"]}]}
        ]"#;
        let bundle = parse_import(raw).expect("import");
        assert_eq!(bundle.month, ViewMonth::new(2026, 10).expect("month"));
        assert_eq!(bundle.tasks.len(), 1);
        assert_eq!(bundle.tasks[0].title, "Meeting");
    }

    #[test]
    fn malformed_documents_are_typed_errors() {
        for raw in [
            "not json",
            r#"{"name":"currentMonth"}"#,
            r#"[{"name":"currentMonth","date":"2026-10-99","day":1}]"#,
            r#"[{"name":"someMonth","date":"2026-10-01","day":1}]"#,
            r#"[{"name":"currentMonth","date":"2026-10-01","day":1,"tasks":[{"id":"x"}]}]"#,
        ] {
            assert!(
                matches!(parse_import(raw), Err(ImportError::InvalidFormat(_))),
                "{raw}"
            );
        }
    }

    #[test]
    fn missing_current_month_is_reported() {
        let raw = r#"[{"name":"prevMonth","date":"2026-09-30","day":30}]"#;
        assert!(matches!(parse_import(raw), Err(ImportError::MissingCurrentMonth)));
        assert!(matches!(parse_import("[]"), Err(ImportError::MissingCurrentMonth)));
    }

    #[test]
    fn out_of_range_month_is_reported() {
        let raw = r#"[{"name":"currentMonth","date":"9999-06-01","day":1}]"#;
        assert!(matches!(parse_import(raw), Err(ImportError::MonthOutOfRange(_))));
    }
}
