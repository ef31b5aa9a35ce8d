use serde::{Deserialize, Serialize};
use uuid::Uuid;

use crate::datekey::DateKey;

#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
pub struct Task {
    pub id: String,

    pub title: String,

    pub date: DateKey,

    #[serde(default)]
    pub labels: Vec<String>,
}

impl Task {
    /// A task with a freshly generated id and at most one label. A blank
    /// color means no label.
    pub fn new(date: DateKey, title: String, color: Option<String>) -> Self {
        Self {
            id: Uuid::new_v4().to_string(),
            title,
            date,
            labels: label_color(color).into_iter().collect(),
        }
    }

    pub fn has_label(&self, label: &str) -> bool {
        self.labels.iter().any(|value| value == label)
    }

    pub fn has_duplicate_labels(&self) -> bool {
        self.labels
            .iter()
            .enumerate()
            .any(|(idx, label)| self.labels[..idx].contains(label))
    }

    pub fn short_id(&self) -> &str {
        short_id(&self.id)
    }
}

/// First eight characters of an id, or all of it when shorter.
pub fn short_id(id: &str) -> &str {
    id.get(..8).unwrap_or(id)
}

/// Drops blank colors so they never become labels.
pub fn label_color(color: Option<String>) -> Option<String> {
    color.filter(|color| !color.trim().is_empty())
}
