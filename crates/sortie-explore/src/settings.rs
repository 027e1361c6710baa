//! Detector settings, loaded from a JSON file.

use std::path::{Path, PathBuf};

use serde::{Deserialize, Serialize};
use sortie_sandbox::config::SandboxConfig;

use crate::resources::ResourceLimits;

#[derive(Debug, thiserror::Error)]
pub enum SettingsError {
    #[error("Failed to read settings {path}: {source}")]
    Io {
        path: PathBuf,
        source: std::io::Error,
    },

    #[error("Malformed settings {path}: {source}")]
    Json {
        path: PathBuf,
        source: serde_json::Error,
    },
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct DetectorSettings {
    /// Concurrent workers, each owning one provisioned SUT instance.
    pub workers: usize,
    /// Missions per generation. Defaults to the worker count.
    pub batch_size: Option<usize>,
    /// Seed for every random choice the search makes.
    pub seed: u64,
    pub limits: ResourceLimits,
    pub sandbox: SandboxConfig,
}

impl Default for DetectorSettings {
    fn default() -> Self {
        Self {
            workers: 1,
            batch_size: None,
            seed: 0,
            limits: ResourceLimits::default(),
            sandbox: SandboxConfig::default(),
        }
    }
}

impl DetectorSettings {
    /// Read settings from a JSON file. Keys left out keep their defaults.
    pub fn load(path: &Path) -> Result<Self, SettingsError> {
        let text = std::fs::read_to_string(path).map_err(|source| SettingsError::Io {
            path: path.to_path_buf(),
            source,
        })?;
        let settings: DetectorSettings =
            serde_json::from_str(&text).map_err(|source| SettingsError::Json {
                path: path.to_path_buf(),
                source,
            })?;
        tracing::debug!(path = %path.display(), workers = settings.workers, "loaded detector settings");
        Ok(settings)
    }

    pub fn batch_size(&self) -> usize {
        self.batch_size.unwrap_or(self.workers).max(1)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_partial_settings_keep_defaults() {
        let settings: DetectorSettings =
            serde_json::from_str(r#"{"workers": 3, "limits": {"max_missions": 20}}"#).unwrap();
        assert_eq!(settings.workers, 3);
        assert_eq!(settings.batch_size(), 3);
        assert_eq!(settings.limits.max_missions, Some(20));
        assert_eq!(settings.limits.max_actions_per_mission, 10);
        assert_eq!(settings.sandbox, SandboxConfig::default());
    }

    #[test]
    fn test_load_reads_file() {
        let path = std::env::temp_dir().join(format!("sortie-settings-{}.json", std::process::id()));
        std::fs::write(&path, r#"{"seed": 11, "batch_size": 4}"#).unwrap();
        let settings = DetectorSettings::load(&path);
        let _ = std::fs::remove_file(&path);

        let settings = settings.unwrap();
        assert_eq!(settings.seed, 11);
        assert_eq!(settings.batch_size(), 4);
        assert_eq!(settings.workers, 1);
    }

    #[test]
    fn test_missing_file_is_an_error() {
        let path = std::env::temp_dir().join("sortie-settings-does-not-exist.json");
        assert!(matches!(
            DetectorSettings::load(&path),
            Err(SettingsError::Io { .. })
        ));
    }

    #[test]
    fn test_malformed_file_is_an_error() {
        let path = std::env::temp_dir().join(format!(
            "sortie-settings-malformed-{}.json",
            std::process::id()
        ));
        std::fs::write(&path, "{ workers: ").unwrap();
        let result = DetectorSettings::load(&path);
        let _ = std::fs::remove_file(&path);
        assert!(matches!(result, Err(SettingsError::Json { .. })));
    }

    #[test]
    fn test_batch_size_is_at_least_one() {
        let settings = DetectorSettings {
            workers: 0,
            ..Default::default()
        };
        assert_eq!(settings.batch_size(), 1);
    }
}
