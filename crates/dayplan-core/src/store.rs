use tracing::{debug, trace, warn};

use crate::datekey::DateKey;
use crate::task::{Task, label_color};

/// One state transition of the task store.
#[derive(Debug, Clone, PartialEq)]
pub enum TaskAction {
    Create {
        date: DateKey,
        title: String,
        color: Option<String>,
    },
    Append(Task),
    Rename {
        id: String,
        title: String,
        color: Option<String>,
    },
    Delete(String),
    ReplaceAll(Vec<Task>),
    RemoveLabel {
        id: String,
        label: String,
    },
}

impl TaskAction {
    fn name(&self) -> &'static str {
        match self {
            TaskAction::Create { .. } => "create",
            TaskAction::Append(_) => "append",
            TaskAction::Rename { .. } => "rename",
            TaskAction::Delete(_) => "delete",
            TaskAction::ReplaceAll(_) => "replace_all",
            TaskAction::RemoveLabel { .. } => "remove_label",
        }
    }
}

#[derive(Debug, Clone, Default, PartialEq)]
pub struct TaskStore {
    tasks: Vec<Task>,
}

impl TaskStore {
    pub fn new(tasks: Vec<Task>) -> Self {
        Self { tasks }
    }

    pub fn tasks(&self) -> &[Task] {
        &self.tasks
    }

    pub fn len(&self) -> usize {
        self.tasks.len()
    }

    pub fn is_empty(&self) -> bool {
        self.tasks.is_empty()
    }

    pub fn get(&self, id: &str) -> Option<&Task> {
        self.tasks.iter().find(|task| task.id == id)
    }

    pub fn contains(&self, id: &str) -> bool {
        self.get(id).is_some()
    }

    /// Resolves a full id or a unique id prefix.
    pub fn resolve_id(&self, needle: &str) -> Option<&str> {
        if let Some(task) = self.get(needle) {
            return Some(&task.id);
        }
        if needle.is_empty() {
            return None;
        }

        let mut matches = self.tasks.iter().filter(|task| task.id.starts_with(needle));
        let first = matches.next()?;
        if matches.next().is_some() {
            None
        } else {
            Some(&first.id)
        }
    }

    /// Pure reducer: the state after `action`, leaving `self` untouched.
    #[must_use]
    pub fn apply(&self, action: TaskAction) -> TaskStore {
        let mut next = self.clone();
        next.dispatch(action);
        next
    }

    #[tracing::instrument(skip(self, action), fields(action = action.name()))]
    pub fn dispatch(&mut self, action: TaskAction) {
        match action {
            TaskAction::Create { date, title, color } => {
                if title.trim().is_empty() {
                    trace!("ignoring create with blank title");
                    return;
                }
                let task = Task::new(date, title, color);
                debug!(id = %task.id, date = %task.date, "created task");
                self.tasks.push(task);
            }
            TaskAction::Append(task) => {
                debug!(id = %task.id, "appended task");
                self.tasks.push(task);
            }
            TaskAction::Rename { id, title, color } => {
                if title.trim().is_empty() {
                    debug!(id = %id, "blank rename removes task");
                    self.remove(&id);
                    return;
                }
                let Some(task) = self.tasks.iter_mut().find(|task| task.id == id) else {
                    trace!(id = %id, "rename of unknown task ignored");
                    return;
                };
                task.title = title;
                if let Some(color) = label_color(color)
                    && !task.has_label(&color)
                {
                    task.labels.push(color);
                }
            }
            TaskAction::Delete(id) => {
                self.remove(&id);
            }
            TaskAction::ReplaceAll(tasks) => {
                if let Some(task) = tasks.iter().find(|task| task.has_duplicate_labels()) {
                    warn!(id = %task.id, labels = ?task.labels, "replacement carries duplicate labels");
                }
                debug!(before = self.tasks.len(), after = tasks.len(), "replaced all tasks");
                self.tasks = tasks;
            }
            TaskAction::RemoveLabel { id, label } => {
                if let Some(task) = self.tasks.iter_mut().find(|task| task.id == id) {
                    task.labels.retain(|value| value != &label);
                }
            }
        }
    }

    fn remove(&mut self, id: &str) {
        if let Some(idx) = self.tasks.iter().position(|task| task.id == id) {
            self.tasks.remove(idx);
            debug!(id = %id, "deleted task");
        }
    }

    /// Replace-all payload for dropping a task onto another day.
    pub fn moved_to_day(&self, id: &str, date: DateKey) -> Option<Vec<Task>> {
        if !self.contains(id) {
            return None;
        }
        Some(
            self.tasks
                .iter()
                .map(|task| {
                    if task.id == id {
                        Task {
                            date,
                            ..task.clone()
                        }
                    } else {
                        task.clone()
                    }
                })
                .collect(),
        )
    }

    /// Replace-all payload for dropping `source` onto `target`: the source
    /// is removed and re-inserted at the target's original index.
    pub fn reordered(&self, source: &str, target: &str) -> Option<Vec<Task>> {
        let source_idx = self.tasks.iter().position(|task| task.id == source)?;
        let target_idx = self.tasks.iter().position(|task| task.id == target)?;

        let mut tasks = self.tasks.clone();
        let moved = tasks.remove(source_idx);
        tasks.insert(target_idx.min(tasks.len()), moved);
        Some(tasks)
    }
}
