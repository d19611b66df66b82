use super::{STATE_VERSION, SyncState};
use crate::error::StateError;
use std::fs;
use std::path::{Path, PathBuf};

/// JSON file holding one repository's [`SyncState`]
///
/// A missing file means the repository has never been synchronized. Saves
/// go through a temporary file and a rename, so a crash never leaves a
/// half-written document behind.
#[derive(Debug, Clone)]
pub struct SyncStateStore {
    path: PathBuf,
}

impl SyncStateStore {
    pub fn new(path: impl Into<PathBuf>) -> Self {
        Self { path: path.into() }
    }

    pub fn path(&self) -> &Path {
        &self.path
    }

    pub fn exists(&self) -> bool {
        self.path.is_file()
    }

    pub fn load(&self) -> Result<Option<SyncState>, StateError> {
        let content = match fs::read_to_string(&self.path) {
            Ok(content) => content,
            Err(e) if e.kind() == std::io::ErrorKind::NotFound => return Ok(None),
            Err(e) => {
                return Err(StateError::LoadFailed {
                    path: self.path.display().to_string(),
                    reason: e.to_string(),
                });
            }
        };

        let state: SyncState = serde_json::from_str(&content)
            .map_err(|e| StateError::ParseFailed(format!("{}: {}", self.path.display(), e)))?;

        if state.version > STATE_VERSION {
            return Err(StateError::UnsupportedVersion(format!(
                "{} (this build reads up to {})",
                state.version, STATE_VERSION
            )));
        }

        tracing::debug!("Loaded sync state from {}", self.path.display());
        Ok(Some(state))
    }

    pub fn save(&self, state: &SyncState) -> Result<(), StateError> {
        let save_failed = |reason: String| StateError::SaveFailed {
            path: self.path.display().to_string(),
            reason,
        };

        if let Some(parent) = self.path.parent().filter(|p| !p.as_os_str().is_empty()) {
            fs::create_dir_all(parent).map_err(|e| save_failed(e.to_string()))?;
        }

        let json = serde_json::to_string_pretty(state).map_err(|e| save_failed(e.to_string()))?;

        let mut tmp_name = self.path.as_os_str().to_owned();
        tmp_name.push(".tmp");
        let tmp_path = PathBuf::from(tmp_name);

        fs::write(&tmp_path, json).map_err(|e| save_failed(e.to_string()))?;
        fs::rename(&tmp_path, &self.path).map_err(|e| {
            let _ = fs::remove_file(&tmp_path);
            save_failed(e.to_string())
        })?;

        tracing::debug!("Saved sync state to {}", self.path.display());
        Ok(())
    }

    /// Delete the state file; returns whether one existed
    pub fn reset(&self) -> Result<bool, StateError> {
        match fs::remove_file(&self.path) {
            Ok(()) => {
                tracing::info!("Removed sync state {}", self.path.display());
                Ok(true)
            }
            Err(e) if e.kind() == std::io::ErrorKind::NotFound => Ok(false),
            Err(e) => Err(StateError::SaveFailed {
                path: self.path.display().to_string(),
                reason: e.to_string(),
            }),
        }
    }
}
