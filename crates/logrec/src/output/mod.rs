//! Output: downstream sinks for emitted records.

pub mod jsonl;
pub mod table;

use std::io;

use serde::{Deserialize, Serialize};
use thiserror::Error;

use crate::parser::model::EventRecord;

pub use jsonl::JsonLinesWriter;
pub use table::TableWriter;

#[derive(Debug, Error)]
pub enum OutputError {
    #[error("Write failed: {0}")]
    Io(#[from] io::Error),

    #[error("Serialization failed: {0}")]
    Json(#[from] serde_json::Error),
}

/// Receives each completed record.
pub trait RecordSink {
    fn write_record(&mut self, record: &EventRecord) -> Result<(), OutputError>;
}

impl RecordSink for Vec<EventRecord> {
    fn write_record(&mut self, record: &EventRecord) -> Result<(), OutputError> {
        self.push(record.clone());
        Ok(())
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize, clap::ValueEnum)]
#[serde(rename_all = "lowercase")]
pub enum OutputFormat {
    #[value(alias = "json")]
    Jsonl,
    #[value(alias = "tsv")]
    Table,
}

impl OutputFormat {
    pub fn as_str(&self) -> &'static str {
        match self {
            OutputFormat::Jsonl => "jsonl",
            OutputFormat::Table => "table",
        }
    }

    pub fn parse(value: &str) -> Option<Self> {
        match value.to_ascii_lowercase().as_str() {
            "jsonl" | "json" => Some(OutputFormat::Jsonl),
            "table" | "tsv" => Some(OutputFormat::Table),
            _ => None,
        }
    }
}
