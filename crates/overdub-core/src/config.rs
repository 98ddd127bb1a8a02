//! Configuration file handling for the overdub binary.

use std::fs;
use std::path::{Path, PathBuf};

use serde::{Deserialize, Serialize};
use thiserror::Error;
use tracing::{debug, warn};

#[derive(Debug, Error)]
pub enum ConfigError {
    #[error("failed to read config {}: {source}", path.display())]
    Read {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },
    #[error("failed to parse config {}: {source}", path.display())]
    Parse {
        path: PathBuf,
        #[source]
        source: serde_yaml::Error,
    },
}

/// Settings for recording and playback sessions.
///
/// Every field has a default, so a partial (or absent) YAML file works.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct OverdubConfig {
    /// Where the persisted event log lives.
    #[serde(default = "default_log_path")]
    pub log_path: PathBuf,

    /// Speed multiplier applied to replay delays.
    #[serde(default = "default_playback_speed")]
    pub playback_speed: f64,

    /// Apply events immediately instead of honoring recorded delays.
    #[serde(default)]
    pub fast_forward: bool,
}

fn default_log_path() -> PathBuf {
    PathBuf::from("overdub-session.log")
}

fn default_playback_speed() -> f64 {
    1.0
}

impl Default for OverdubConfig {
    fn default() -> Self {
        Self {
            log_path: default_log_path(),
            playback_speed: default_playback_speed(),
            fast_forward: false,
        }
    }
}

impl OverdubConfig {
    /// Reads and normalizes a YAML config file.
    pub fn from_file(path: impl AsRef<Path>) -> Result<Self, ConfigError> {
        let path = path.as_ref();
        let raw = fs::read_to_string(path).map_err(|source| ConfigError::Read {
            path: path.to_path_buf(),
            source,
        })?;
        let mut config: Self = serde_yaml::from_str(&raw).map_err(|source| ConfigError::Parse {
            path: path.to_path_buf(),
            source,
        })?;
        config.normalize();
        debug!(path = %path.display(), "configuration loaded");
        Ok(config)
    }

    /// Loads `path` when it exists, falling back to defaults.
    pub fn load_or_default(path: impl AsRef<Path>) -> Result<Self, ConfigError> {
        let path = path.as_ref();
        if path.exists() {
            Self::from_file(path)
        } else {
            debug!(path = %path.display(), "no config file; using defaults");
            Ok(Self::default())
        }
    }

    fn normalize(&mut self) {
        if !self.playback_speed.is_finite() || self.playback_speed <= 0.0 {
            warn!(
                speed = self.playback_speed,
                "invalid playback speed in config; using 1.0"
            );
            self.playback_speed = 1.0;
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn write_config(contents: &str) -> (tempfile::TempDir, PathBuf) {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("overdub.yaml");
        fs::write(&path, contents).unwrap();
        (dir, path)
    }

    #[test]
    fn test_defaults() {
        let config = OverdubConfig::default();
        assert_eq!(config.log_path, PathBuf::from("overdub-session.log"));
        assert!((config.playback_speed - 1.0).abs() < f64::EPSILON);
        assert!(!config.fast_forward);
    }

    #[test]
    fn test_partial_file_fills_in_defaults() {
        let (_dir, path) = write_config("playback_speed: 2.5\n");
        let config = OverdubConfig::from_file(&path).unwrap();
        assert!((config.playback_speed - 2.5).abs() < f64::EPSILON);
        assert_eq!(config.log_path, PathBuf::from("overdub-session.log"));
    }

    #[test]
    fn test_invalid_speed_is_normalized() {
        let (_dir, path) = write_config("playback_speed: -3.0\n");
        let config = OverdubConfig::from_file(&path).unwrap();
        assert!((config.playback_speed - 1.0).abs() < f64::EPSILON);
    }

    #[test]
    fn test_missing_file_falls_back_to_defaults() {
        let dir = tempfile::tempdir().unwrap();
        let config = OverdubConfig::load_or_default(dir.path().join("absent.yaml")).unwrap();
        assert_eq!(config.log_path, PathBuf::from("overdub-session.log"));
    }

    #[test]
    fn test_unparseable_file_is_an_error() {
        let (_dir, path) = write_config("log_path: [not, a, path\n");
        assert!(matches!(
            OverdubConfig::from_file(&path),
            Err(ConfigError::Parse { .. })
        ));
    }
}
