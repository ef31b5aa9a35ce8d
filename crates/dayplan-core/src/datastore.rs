use std::fs;
use std::io::Write;
use std::path::{Path, PathBuf};

use anyhow::{Context, anyhow};
use tempfile::NamedTempFile;
use tracing::{debug, info};

use crate::planner::PlannerState;

const STATE_FILE: &str = "planner.json";

#[derive(Debug)]
pub struct DataStore {
    pub data_dir: PathBuf,
    pub state_path: PathBuf,
}

impl DataStore {
    #[tracing::instrument(skip(data_dir))]
    pub fn open(data_dir: &Path) -> anyhow::Result<Self> {
        let data_dir = data_dir.to_path_buf();
        fs::create_dir_all(&data_dir)
            .with_context(|| format!("failed to create {}", data_dir.display()))?;

        let state_path = data_dir.join(STATE_FILE);
        if !state_path.exists() {
            fs::write(&state_path, "")?;
        }

        info!(
            data_dir = %data_dir.display(),
            state = %state_path.display(),
            "opened datastore"
        );

        Ok(Self {
            data_dir,
            state_path,
        })
    }

    /// An empty file is a fresh planner.
    #[tracing::instrument(skip(self))]
    pub fn load(&self) -> anyhow::Result<PlannerState> {
        let raw = fs::read_to_string(&self.state_path)
            .with_context(|| format!("failed reading {}", self.state_path.display()))?;
        if raw.trim().is_empty() {
            debug!("state file empty, starting fresh");
            return Ok(PlannerState::default());
        }

        let state: PlannerState = serde_json::from_str(&raw)
            .with_context(|| format!("failed parsing {}", self.state_path.display()))?;
        debug!(tasks = state.tasks.len(), view = %state.view, "loaded planner state");
        Ok(state)
    }

    #[tracing::instrument(skip(self, state))]
    pub fn save(&self, state: &PlannerState) -> anyhow::Result<()> {
        let serialized = serde_json::to_string_pretty(state)?;
        write_atomic(&self.state_path, serialized.as_bytes())?;
        debug!(tasks = state.tasks.len(), "saved planner state");
        Ok(())
    }
}

/// Writes through a temp file in the target's directory, then renames it
/// over the target.
#[tracing::instrument(skip(path, bytes), fields(file = %path.display(), len = bytes.len()))]
pub fn write_atomic(path: &Path, bytes: &[u8]) -> anyhow::Result<()> {
    let dir = match path.parent() {
        Some(parent) if !parent.as_os_str().is_empty() => parent,
        _ => Path::new("."),
    };
    let mut temp = NamedTempFile::new_in(dir)?;
    temp.write_all(bytes)?;
    temp.flush()?;

    temp.persist(path)
        .map_err(|err| anyhow!("failed to persist {}: {}", path.display(), err))?;

    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::calendar::ViewMonth;
    use crate::task::Task;
    use tempfile::tempdir;

    #[test]
    fn fresh_store_loads_default_state() {
        let temp = tempdir().expect("tempdir");
        let store = DataStore::open(temp.path()).expect("open");
        let state = store.load().expect("load");
        assert!(state.tasks.is_empty());
        assert_eq!(state.pen, None);
        assert!(store.state_path.exists());
    }

    #[test]
    fn save_then_load_round_trips() {
        let temp = tempdir().expect("tempdir");
        let store = DataStore::open(temp.path()).expect("open");

        let state = PlannerState {
            tasks: vec![Task::new(
                "2026-10-16".parse().expect("key"),
                "Meeting".to_string(),
                Some("red".to_string()),
            )],
            view: ViewMonth::new(2026, 10).expect("month"),
            pen: Some("red".to_string()),
        };
        store.save(&state).expect("save");

        let reopened = DataStore::open(temp.path()).expect("reopen");
        assert_eq!(reopened.load().expect("load"), state);
    }

    #[test]
    fn corrupt_state_is_an_error() {
        let temp = tempdir().expect("tempdir");
        let store = DataStore::open(temp.path()).expect("open");
        fs::write(&store.state_path, "{ not json").expect("write");
        assert!(store.load().is_err());
    }

    #[test]
    fn atomic_write_replaces_content() {
        let temp = tempdir().expect("tempdir");
        let path = temp.path().join("data.json");
        write_atomic(&path, b"first").expect("write");
        write_atomic(&path, b"second").expect("write");
        assert_eq!(fs::read_to_string(&path).expect("read"), "second");
    }
}
