//! Trace files: one mission and every trace recorded for it, as JSON.

use std::path::{Path, PathBuf};

use serde::{Deserialize, Serialize};
use sortie_model::mission::Mission;
use sortie_model::trace::MissionTrace;

#[derive(Debug, thiserror::Error)]
pub enum PersistError {
    #[error("Failed to access {path}: {source}")]
    Io {
        path: PathBuf,
        source: std::io::Error,
    },

    #[error("Malformed trace file {path}: {source}")]
    Json {
        path: PathBuf,
        source: serde_json::Error,
    },
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct TraceFile {
    pub mission: Mission,
    #[serde(default)]
    pub traces: Vec<MissionTrace>,
}

impl TraceFile {
    pub fn new(mission: Mission, traces: Vec<MissionTrace>) -> Self {
        Self { mission, traces }
    }

    pub fn load(path: &Path) -> Result<Self, PersistError> {
        let text = std::fs::read_to_string(path).map_err(|source| PersistError::Io {
            path: path.to_path_buf(),
            source,
        })?;
        let file: TraceFile = serde_json::from_str(&text).map_err(|source| PersistError::Json {
            path: path.to_path_buf(),
            source,
        })?;
        tracing::debug!(path = %path.display(), traces = file.traces.len(), "loaded trace file");
        Ok(file)
    }

    pub fn save(&self, path: &Path) -> Result<(), PersistError> {
        let text = serde_json::to_string_pretty(self).map_err(|source| PersistError::Json {
            path: path.to_path_buf(),
            source,
        })?;
        std::fs::write(path, text).map_err(|source| PersistError::Io {
            path: path.to_path_buf(),
            source,
        })
    }
}
