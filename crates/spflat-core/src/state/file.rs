// # State File
//
// JSON file holding the previous run's flattened results.
//
// ## Crash Behavior
//
// - Atomic writes: new state is written to `<path>.tmp`, then renamed
// - A run killed before `save` leaves the previous file untouched
// - A missing, unreadable or corrupt file loads as empty state
//
// ## File Format
//
// ```json
// {
//     "example.com": {
//         "sum": "9f2b...",
//         "records": [
//             "10.0.0.0/24"
//         ]
//     }
// }
// ```

use serde::Serialize;
use std::path::{Path, PathBuf};
use tokio::fs;
use tokio::io::AsyncWriteExt;

use super::PersistedState;
use crate::Error;

/// Indentation used when writing the state file
const INDENT: &[u8] = b"    ";

/// Persisted state file
#[derive(Debug, Clone)]
pub struct StateFile {
    path: PathBuf,
}

impl StateFile {
    /// Create a handle for the state file at `path`
    pub fn new(path: impl AsRef<Path>) -> Self {
        Self {
            path: path.as_ref().to_path_buf(),
        }
    }

    /// Path of the state file
    pub fn path(&self) -> &Path {
        &self.path
    }

    /// Load the previous state
    ///
    /// Never fails: a missing file is an empty baseline, and read or parse
    /// errors are logged and also treated as an empty baseline.
    pub async fn load(&self) -> PersistedState {
        match self.try_load().await {
            Ok(Some(state)) => {
                tracing::debug!(
                    "Loaded state from {}: {} domain(s)",
                    self.path.display(),
                    state.len()
                );
                state
            }
            Ok(None) => {
                tracing::info!(
                    "No previous state at {}, starting with an empty baseline",
                    self.path.display()
                );
                PersistedState::new()
            }
            Err(e) => {
                tracing::error!("{}. Starting with an empty baseline.", e);
                PersistedState::new()
            }
        }
    }

    async fn try_load(&self) -> Result<Option<PersistedState>, Error> {
        let content = match fs::read_to_string(&self.path).await {
            Ok(content) => content,
            Err(e) if e.kind() == std::io::ErrorKind::NotFound => return Ok(None),
            Err(e) => {
                return Err(Error::state_store(format!(
                    "Failed to read state file {}: {}",
                    self.path.display(),
                    e
                )));
            }
        };

        serde_json::from_str(&content).map(Some).map_err(|e| {
            Error::state_store(format!(
                "Failed to parse state file {}: {}",
                self.path.display(),
                e
            ))
        })
    }

    /// Render state the way it is stored on disk
    pub fn render(state: &PersistedState) -> Result<Vec<u8>, Error> {
        let mut out = Vec::new();
        let formatter = serde_json::ser::PrettyFormatter::with_indent(INDENT);
        let mut serializer = serde_json::Serializer::with_formatter(&mut out, formatter);
        state
            .serialize(&mut serializer)
            .map_err(|e| Error::state_store(format!("Failed to serialize state: {}", e)))?;
        Ok(out)
    }

    /// Replace the state file with `state`, atomically
    pub async fn save(&self, state: &PersistedState) -> Result<(), Error> {
        let bytes = Self::render(state)?;

        if let Some(parent) = self.path.parent()
            && !parent.as_os_str().is_empty()
            && !parent.exists()
        {
            fs::create_dir_all(parent).await.map_err(|e| {
                Error::state_store(format!(
                    "Failed to create state directory {}: {}",
                    parent.display(),
                    e
                ))
            })?;
        }

        // Write to temporary file first
        let temp_path = self.temp_path();
        {
            let mut file = fs::File::create(&temp_path).await.map_err(|e| {
                Error::state_store(format!(
                    "Failed to create temp file {}: {}",
                    temp_path.display(),
                    e
                ))
            })?;

            file.write_all(&bytes).await.map_err(|e| {
                Error::state_store(format!(
                    "Failed to write to temp file {}: {}",
                    temp_path.display(),
                    e
                ))
            })?;

            file.flush().await.map_err(|e| {
                Error::state_store(format!(
                    "Failed to flush temp file {}: {}",
                    temp_path.display(),
                    e
                ))
            })?;
        }

        // Atomic rename (temp -> actual)
        fs::rename(&temp_path, &self.path).await.map_err(|e| {
            Error::state_store(format!(
                "Failed to rename {} to {}: {}",
                temp_path.display(),
                self.path.display(),
                e
            ))
        })?;

        tracing::debug!("State written to {}", self.path.display());
        Ok(())
    }

    /// Path of the temporary file used for atomic writes
    fn temp_path(&self) -> PathBuf {
        let mut name = self.path.file_name().unwrap_or_default().to_os_string();
        name.push(".tmp");
        self.path.with_file_name(name)
    }
}
