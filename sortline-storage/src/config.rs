//! Configuration for sortline-storage

use serde::{Deserialize, Serialize};
use std::path::PathBuf;

/// On-disk format of the count log
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum LogFormat {
    Csv,
    Json,
}

/// Count log configuration
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct LogConfig {
    /// Target file, overwritten on every persist
    pub path: PathBuf,
    pub format: LogFormat,
    /// Render CSV timestamps in UTC instead of local time
    pub utc_timestamps: bool,
}

impl Default for LogConfig {
    fn default() -> Self {
        Self {
            path: PathBuf::from("detection_counts.csv"),
            format: LogFormat::Csv,
            utc_timestamps: false,
        }
    }
}

impl LogConfig {
    /// Validate configuration
    pub fn validate(&self) -> Result<(), String> {
        if self.path.as_os_str().is_empty() {
            return Err("Log path must not be empty".to_string());
        }
        if self.path.file_name().is_none() {
            return Err(format!("Log path {} does not name a file", self.path.display()));
        }
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_config_default() {
        let config = LogConfig::default();
        assert_eq!(config.path, PathBuf::from("detection_counts.csv"));
        assert_eq!(config.format, LogFormat::Csv);
        assert!(config.validate().is_ok());
    }

    #[test]
    fn test_empty_path_rejected() {
        let config = LogConfig { path: PathBuf::new(), ..LogConfig::default() };
        assert!(config.validate().is_err());

        let config = LogConfig { path: PathBuf::from(".."), ..LogConfig::default() };
        assert!(config.validate().is_err());
    }
}
