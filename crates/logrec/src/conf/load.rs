//! Load: config loading from file and environment variables.

use std::fs;
use std::path::Path;

use super::model::{ConfigError, EngineConfig};
use crate::output::OutputFormat;

pub const DEFAULT_CONFIG_PATH: &str = "/etc/logrec/logrec.toml";

impl EngineConfig {
    /// Load configuration from file or environment variables
    /// Priority: Environment Variables > Config File > Defaults
    pub fn load(explicit_path: Option<&str>) -> Result<Self, ConfigError> {
        let config_path = match explicit_path {
            Some(path) => path.to_string(),
            None => std::env::var("LOGREC_CONFIG_FILE").unwrap_or_else(|_| DEFAULT_CONFIG_PATH.to_string()),
        };

        let mut config = if Path::new(&config_path).exists() {
            tracing::info!("Loading configuration from: {}", config_path);
            Self::from_file(&config_path)?
        } else if explicit_path.is_some() {
            return Err(ConfigError::Read {
                path: config_path,
                source: std::io::Error::new(std::io::ErrorKind::NotFound, "file not found"),
            });
        } else {
            tracing::debug!("Config file not found at {}, using defaults", config_path);
            Self::default()
        };

        config.apply_env_overrides(|key| std::env::var(key).ok())?;
        config.validate()?;
        Ok(config)
    }

    /// Load configuration from TOML file
    pub fn from_file(path: &str) -> Result<Self, ConfigError> {
        let contents = fs::read_to_string(path).map_err(|source| ConfigError::Read {
            path: path.to_string(),
            source,
        })?;
        let config: EngineConfig = toml::from_str(&contents)?;
        Ok(config)
    }

    /// Override settings from `lookup`, which maps variable names to values.
    pub fn apply_env_overrides<F>(&mut self, lookup: F) -> Result<(), ConfigError>
    where
        F: Fn(&str) -> Option<String>,
    {
        if let Some(v) = lookup("LOGREC_MAX_LINE_LENGTH") {
            self.max_line_length = parse_number("LOGREC_MAX_LINE_LENGTH", &v)?;
        }
        if let Some(v) = lookup("LOGREC_MAX_CONCURRENT_FILES") {
            self.max_concurrent_files = parse_number("LOGREC_MAX_CONCURRENT_FILES", &v)?;
        }
        if let Some(v) = lookup("LOGREC_LOCAL_TIMEZONE") {
            self.local_timezone = v;
        }
        if let Some(v) = lookup("LOGREC_DISPLAY_TIMEZONE") {
            self.display_timezone = v;
        }
        if let Some(v) = lookup("LOGREC_OUTPUT_FORMAT") {
            self.output.format = OutputFormat::parse(&v).ok_or_else(|| {
                ConfigError::Invalid(format!("LOGREC_OUTPUT_FORMAT must be jsonl or table, got '{}'", v))
            })?;
        }
        Ok(())
    }
}

fn parse_number(name: &str, value: &str) -> Result<usize, ConfigError> {
    value
        .trim()
        .parse()
        .map_err(|_| ConfigError::Invalid(format!("{} must be a positive integer, got '{}'", name, value)))
}
