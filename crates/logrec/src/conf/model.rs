//! Model: EngineConfig and related structs.

use std::collections::HashMap;
use serde::{Deserialize, Serialize};
use thiserror::Error;

use crate::output::table::DEFAULT_FIELDS;
use crate::output::OutputFormat;
use crate::parser::time::parse_utc_offset;
use crate::parser::{MAX_LINE_LENGTH, PROBE_MAX_LINES};

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct EngineConfig {
    pub max_line_length: usize,
    pub probe_max_lines: usize,
    pub max_concurrent_files: usize,
    /// Offset of the host that wrote local-time logs, e.g. "+02:00"
    pub local_timezone: String,
    /// Offset timestamps are shown in by the table output
    pub display_timezone: String,
    pub output: OutputConfig,
    pub source_overrides: HashMap<String, SourceOverride>,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct OutputConfig {
    pub format: OutputFormat,
    pub fields: Vec<String>,
}

/// Per-source override, keyed by file name
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct SourceOverride {
    pub local_timezone: Option<String>,
}

#[derive(Debug, Error)]
pub enum ConfigError {
    #[error("Unable to read config file {path}: {source}")]
    Read {
        path: String,
        #[source]
        source: std::io::Error,
    },

    #[error("Invalid config file: {0}")]
    Toml(#[from] toml::de::Error),

    #[error("Invalid configuration: {0}")]
    Invalid(String),
}

impl Default for EngineConfig {
    fn default() -> Self {
        Self {
            max_line_length: MAX_LINE_LENGTH,
            probe_max_lines: PROBE_MAX_LINES,
            max_concurrent_files: 4,
            local_timezone: "UTC".to_string(),
            display_timezone: "UTC".to_string(),
            output: OutputConfig::default(),
            source_overrides: HashMap::new(),
        }
    }
}

impl Default for OutputConfig {
    fn default() -> Self {
        Self {
            format: OutputFormat::Jsonl,
            fields: DEFAULT_FIELDS.iter().map(|s| s.to_string()).collect(),
        }
    }
}

impl EngineConfig {
    /// Validate configuration values
    pub fn validate(&self) -> Result<(), ConfigError> {
        if self.max_line_length == 0 {
            return Err(ConfigError::Invalid("max_line_length must be > 0".to_string()));
        }
        if self.probe_max_lines == 0 {
            return Err(ConfigError::Invalid("probe_max_lines must be > 0".to_string()));
        }
        if self.max_concurrent_files == 0 {
            return Err(ConfigError::Invalid("max_concurrent_files must be > 0".to_string()));
        }
        validate_offset("local_timezone", &self.local_timezone)?;
        validate_offset("display_timezone", &self.display_timezone)?;
        if self.output.fields.is_empty() {
            return Err(ConfigError::Invalid("output.fields must not be empty".to_string()));
        }
        for (source, o) in &self.source_overrides {
            if let Some(tz) = &o.local_timezone {
                validate_offset(&format!("source_overrides.{}.local_timezone", source), tz)?;
            }
        }
        Ok(())
    }
}

fn validate_offset(name: &str, value: &str) -> Result<(), ConfigError> {
    match parse_utc_offset(value) {
        Some(_) => Ok(()),
        None => Err(ConfigError::Invalid(format!(
            "{} must be UTC or an offset like +02:00, got '{}'",
            name, value
        ))),
    }
}
