use std::fs;
use std::path::{Path, PathBuf};

use serde::{Deserialize, Serialize};

use crate::common::Result;

/// Persistent "last user / last session" state, used by greeters to preselect entries.
pub trait StateStore {
    fn set_last(&mut self, user: &str, session: &str);
    fn save(&mut self) -> Result<()>;
}

#[derive(Debug, Default, Clone, PartialEq, Serialize, Deserialize)]
pub struct LastSession {
    pub user: Option<String>,
    pub session: Option<String>,
}

/// `StateStore` persisted as a JSON document.
pub struct StateFile {
    path: PathBuf,
    state: LastSession,
}

impl StateFile {
    /// Opens the state file, starting from an empty state when it is missing or unreadable.
    pub fn open(path: &Path) -> Self {
        let state = match fs::read(path) {
            Ok(content) => serde_json::from_slice(&content).unwrap_or_else(|error| {
                warn!("Ignoring unreadable state file {}: {}", path.display(), error);
                LastSession::default()
            }),
            Err(_) => LastSession::default(),
        };

        Self {
            path: path.to_path_buf(),
            state,
        }
    }

    pub fn last(&self) -> &LastSession {
        &self.state
    }
}

impl StateStore for StateFile {
    fn set_last(&mut self, user: &str, session: &str) {
        self.state.user = Some(user.to_string());
        self.state.session = Some(session.to_string());
    }

    fn save(&mut self) -> Result<()> {
        if let Some(parent) = self.path.parent() {
            fs::create_dir_all(parent)?;
        }

        let temporary = self.path.with_extension("tmp");
        fs::write(&temporary, serde_json::to_vec_pretty(&self.state)?)?;
        fs::rename(&temporary, &self.path)?;
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn saved_state_is_reloaded() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("lib/state.json");

        let mut state = StateFile::open(&path);
        assert_eq!(state.last(), &LastSession::default());

        state.set_last("alice", "plasma.desktop");
        state.save().unwrap();

        let reloaded = StateFile::open(&path);
        assert_eq!(reloaded.last().user.as_deref(), Some("alice"));
        assert_eq!(reloaded.last().session.as_deref(), Some("plasma.desktop"));
    }

    #[test]
    fn corrupt_state_starts_empty() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("state.json");
        fs::write(&path, "not json").unwrap();

        assert_eq!(StateFile::open(&path).last(), &LastSession::default());
    }
}
