//! Group: per-source configuration resolution.

use chrono::FixedOffset;

use super::model::{ConfigError, EngineConfig};
use crate::parser::time::parse_utc_offset;

impl EngineConfig {
    /// Offset used to interpret local-time timestamps from `source`.
    /// Priority: source override (by file name) -> base `local_timezone`
    pub fn local_offset_for(&self, source: &str) -> Result<FixedOffset, ConfigError> {
        let tz = self
            .source_overrides
            .get(source)
            .and_then(|o| o.local_timezone.as_deref())
            .unwrap_or(&self.local_timezone);
        offset("local_timezone", tz)
    }

    pub fn display_offset(&self) -> Result<FixedOffset, ConfigError> {
        offset("display_timezone", &self.display_timezone)
    }
}

fn offset(name: &str, value: &str) -> Result<FixedOffset, ConfigError> {
    parse_utc_offset(value)
        .ok_or_else(|| ConfigError::Invalid(format!("{} is not a valid offset: '{}'", name, value)))
}
