//! Run configuration

use crate::report::ReportConfig;
use serde::{Deserialize, Serialize};
use sortline_cns::PlcConfig;
use sortline_core::{Error, Result};
use sortline_eye::VisionConfig;
use sortline_storage::LogConfig;
use std::path::Path;

/// Name of the configuration file read from the working directory
pub const DEFAULT_CONFIG_FILE: &str = "sortline.toml";

/// Complete configuration of one sorting line
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
#[serde(default)]
pub struct SortlineConfig {
    pub vision: VisionConfig,
    pub plc: PlcConfig,
    pub log: LogConfig,
    pub report: ReportConfig,
}

impl SortlineConfig {
    /// Load configuration from file
    pub fn from_file(path: impl AsRef<Path>) -> Result<Self> {
        let path = path.as_ref();
        let content = std::fs::read_to_string(path).map_err(|e| {
            Error::Configuration(format!("Failed to read {}: {}", path.display(), e))
        })?;
        Self::from_str(&content)
    }

    /// Parse configuration, trying JSON, TOML and YAML in turn
    #[allow(clippy::should_implement_trait)]
    pub fn from_str(content: &str) -> Result<Self> {
        if let Ok(config) = serde_json::from_str::<SortlineConfig>(content) {
            return Ok(config);
        }

        let toml_err = match toml::from_str::<SortlineConfig>(content) {
            Ok(config) => return Ok(config),
            Err(e) => e,
        };

        if let Ok(config) = serde_yaml::from_str::<SortlineConfig>(content) {
            return Ok(config);
        }

        Err(Error::Configuration(format!(
            "Unrecognized configuration format: {}",
            toml_err
        )))
    }

    /// Read [`DEFAULT_CONFIG_FILE`] from `dir` if it exists, defaults otherwise
    pub fn load_or_default(dir: impl AsRef<Path>) -> Result<Self> {
        let path = dir.as_ref().join(DEFAULT_CONFIG_FILE);
        if path.is_file() {
            Self::from_file(path)
        } else {
            Ok(Self::default())
        }
    }

    /// Validate every section
    pub fn validate(&self) -> Result<()> {
        let sections = [
            ("vision", self.vision.validate()),
            ("plc", self.plc.validate()),
            ("log", self.log.validate()),
            ("report", self.report.validate()),
        ];

        let errors: Vec<String> = sections
            .into_iter()
            .filter_map(|(name, result)| result.err().map(|e| format!("{}: {}", name, e)))
            .collect();

        if errors.is_empty() {
            Ok(())
        } else {
            Err(Error::Configuration(errors.join("; ")))
        }
    }
}
