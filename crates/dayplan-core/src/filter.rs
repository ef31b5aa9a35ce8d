use std::collections::BTreeSet;

use tracing::{
  debug,
  trace
};

use crate::task::Task;

/// Sentinel colors that clear the whole color filter.
pub const CLEAR_SENTINELS: [&str; 2] =
  ["none", "null"];

#[derive(
  Debug, Clone, Default, PartialEq, Eq,
)]
pub struct ColorFilter {
  colors: BTreeSet<String>
}

impl ColorFilter {
  pub fn is_empty(&self) -> bool {
    self.colors.is_empty()
  }

  pub fn contains(
    &self,
    color: &str
  ) -> bool {
    self.colors.contains(color)
  }

  pub fn iter(
    &self
  ) -> impl Iterator<Item = &str> {
    self.colors.iter().map(String::as_str)
  }

  /// Adds an absent color, removes a present one; a sentinel clears all.
  pub fn toggle(&mut self, color: &str) {
    if is_clear_sentinel(color) {
      debug!("color filter cleared");
      self.colors.clear();
      return;
    }

    if !self.colors.remove(color) {
      self.colors.insert(color.to_string());
    }
    trace!(
      color,
      active = self.colors.len(),
      "color filter toggled"
    );
  }

  pub fn admits(
    &self,
    task: &Task
  ) -> bool {
    self.colors.is_empty()
      || task
        .labels
        .iter()
        .any(|label| {
          self.colors.contains(label)
        })
  }
}

#[must_use]
pub fn is_clear_sentinel(
  color: &str
) -> bool {
  CLEAR_SENTINELS
    .iter()
    .any(|s| color.eq_ignore_ascii_case(s))
}

/// Session-only visibility state: search text plus color filter.
#[derive(
  Debug, Clone, Default, PartialEq, Eq,
)]
pub struct TaskFilter {
  search: String,
  colors: ColorFilter
}

impl TaskFilter {
  pub fn new(
    search: impl Into<String>,
    colors: ColorFilter
  ) -> Self {
    Self {
      search: search.into(),
      colors
    }
  }

  pub fn search(&self) -> &str {
    &self.search
  }

  pub fn set_search(
    &mut self,
    text: impl Into<String>
  ) {
    self.search = text.into();
  }

  pub fn colors(&self) -> &ColorFilter {
    &self.colors
  }

  pub fn toggle_color(
    &mut self,
    color: &str
  ) {
    self.colors.toggle(color);
  }

  pub fn is_active(&self) -> bool {
    !self.search.is_empty()
      || !self.colors.is_empty()
  }

  pub fn matches(
    &self,
    task: &Task
  ) -> bool {
    let title_match = self
      .search
      .is_empty()
      || task
        .title
        .to_lowercase()
        .contains(
          &self.search.to_lowercase()
        );

    title_match
      && self.colors.admits(task)
  }

  pub fn apply<'a>(
    &self,
    tasks: impl IntoIterator<
      Item = &'a Task
    >
  ) -> Vec<Task> {
    tasks
      .into_iter()
      .filter(|task| self.matches(task))
      .cloned()
      .collect()
  }
}
