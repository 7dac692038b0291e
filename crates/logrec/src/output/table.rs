use std::io::Write;

use chrono::FixedOffset;

use super::{OutputError, RecordSink};
use crate::parser::model::{EventRecord, FieldValue};

pub const DEFAULT_FIELDS: [&str; 8] = [
    "data_type", "start_time", "end_time", "command", "command_line", "packages", "requester", "error",
];

const TIMESTAMP_FORMAT: &str = "%Y-%m-%d %H:%M:%S";

/// Tab-separated projection of records into fixed columns.
///
/// Timestamps are converted to the display timezone since the table has no
/// room for an offset. Control characters (tabs and newlines included) are
/// replaced with U+FFFD so a value never breaks the row layout.
pub struct TableWriter<W: Write> {
    writer: W,
    fields: Vec<String>,
    local_offset: FixedOffset,
    display_offset: FixedOffset,
    source: String,
    current_row: u64,
}

impl<W: Write> TableWriter<W> {
    pub fn new(writer: W, fields: Vec<String>, local_offset: FixedOffset, display_offset: FixedOffset) -> Self {
        Self {
            writer,
            fields,
            local_offset,
            display_offset,
            source: String::new(),
            current_row: 0,
        }
    }

    pub fn with_source(mut self, source: impl Into<String>) -> Self {
        self.source = source.into();
        self
    }

    pub fn write_header(&mut self) -> Result<(), OutputError> {
        let mut cells = vec!["source".to_string()];
        cells.extend(self.fields.iter().cloned());
        self.write_row(&cells)
    }

    pub fn rows_written(&self) -> u64 {
        self.current_row
    }

    pub fn into_inner(self) -> W {
        self.writer
    }

    fn cell(&self, record: &EventRecord, field: &str) -> String {
        if field == "data_type" {
            return record.data_type.to_string();
        }

        match record.field(field) {
            Some(FieldValue::Timestamp(ts)) => ts
                .to_display(self.local_offset, self.display_offset)
                .map(|dt| dt.format(TIMESTAMP_FORMAT).to_string())
                .unwrap_or_else(|| {
                    tracing::warn!(field, "unable to convert timestamp to display timezone");
                    "ERROR".to_string()
                }),
            Some(FieldValue::Text(text)) => sanitize(text),
            Some(FieldValue::Absent) | None => "-".to_string(),
        }
    }

    fn write_row(&mut self, cells: &[String]) -> Result<(), OutputError> {
        let mut line = cells.join("\t");
        line.push('\n');
        self.writer.write_all(line.as_bytes())?;
        self.current_row += 1;
        Ok(())
    }
}

impl<W: Write> RecordSink for TableWriter<W> {
    fn write_record(&mut self, record: &EventRecord) -> Result<(), OutputError> {
        let mut cells = Vec::with_capacity(self.fields.len() + 1);
        cells.push(sanitize(&self.source));
        for field in &self.fields {
            cells.push(self.cell(record, field));
        }
        self.write_row(&cells)
    }
}

fn sanitize(value: &str) -> String {
    value
        .chars()
        .map(|c| if c.is_control() { '\u{FFFD}' } else { c })
        .collect()
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::parser::time::{parse_utc_offset, TimeElements, TimeKind, Timestamp};

    fn record() -> EventRecord {
        let start = Timestamp::new(TimeElements::from_tuple((2019, 7, 10, 16, 38, 12)), TimeKind::Local).unwrap();
        EventRecord::new("linux:apt_history_log:entry")
            .with_field("start_time", FieldValue::Timestamp(start))
            .with_field("command", FieldValue::Text("Upgrade".into()))
            .with_field("command_line", FieldValue::Text("apt\tupgrade\n".into()))
            .with_field("error", FieldValue::Absent)
    }

    fn writer(display: &str) -> TableWriter<Vec<u8>> {
        let fields = vec![
            "start_time".to_string(),
            "command".to_string(),
            "command_line".to_string(),
            "error".to_string(),
            "unknown".to_string(),
        ];
        TableWriter::new(
            Vec::new(),
            fields,
            parse_utc_offset("+02:00").unwrap(),
            parse_utc_offset(display).unwrap(),
        )
        .with_source("history.log")
    }

    #[test]
    fn test_header_and_row() {
        let mut w = writer("+02:00");
        w.write_header().unwrap();
        w.write_record(&record()).unwrap();
        assert_eq!(w.rows_written(), 2);

        let out = String::from_utf8(w.into_inner()).unwrap();
        let rows: Vec<&str> = out.lines().collect();
        assert_eq!(rows[0], "source\tstart_time\tcommand\tcommand_line\terror\tunknown");
        assert_eq!(
            rows[1],
            "history.log\t2019-07-10 16:38:12\tUpgrade\tapt\u{FFFD}upgrade\u{FFFD}\t-\t-"
        );
    }

    #[test]
    fn test_display_timezone_conversion() {
        let mut w = writer("UTC");
        w.write_record(&record()).unwrap();

        let out = String::from_utf8(w.into_inner()).unwrap();
        assert!(out.starts_with("history.log\t2019-07-10 14:38:12\t"), "got: {}", out);
    }

    #[test]
    fn test_data_type_column() {
        let mut w = TableWriter::new(
            Vec::new(),
            DEFAULT_FIELDS.iter().map(|s| s.to_string()).collect(),
            parse_utc_offset("UTC").unwrap(),
            parse_utc_offset("UTC").unwrap(),
        );
        w.write_record(&record()).unwrap();

        let out = String::from_utf8(w.into_inner()).unwrap();
        let cells: Vec<&str> = out.trim_end_matches('\n').split('\t').collect();
        assert_eq!(cells.len(), DEFAULT_FIELDS.len() + 1);
        assert_eq!(cells[0], "");
        assert_eq!(cells[1], "linux:apt_history_log:entry");
    }
}
