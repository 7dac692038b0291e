use std::io::Write;

use serde::Serialize;

use super::{OutputError, RecordSink};
use crate::parser::model::EventRecord;

/// One JSON object per line, tagged with the stream it came from.
pub struct JsonLinesWriter<W: Write> {
    writer: W,
    source: String,
}

#[derive(Serialize)]
struct Line<'a> {
    source: &'a str,
    #[serde(flatten)]
    record: &'a EventRecord,
}

impl<W: Write> JsonLinesWriter<W> {
    pub fn new(writer: W, source: impl Into<String>) -> Self {
        Self {
            writer,
            source: source.into(),
        }
    }

    pub fn into_inner(self) -> W {
        self.writer
    }
}

impl<W: Write> RecordSink for JsonLinesWriter<W> {
    fn write_record(&mut self, record: &EventRecord) -> Result<(), OutputError> {
        // one write_all per record keeps lines whole on a shared stdout
        let mut line = serde_json::to_vec(&Line {
            source: &self.source,
            record,
        })?;
        line.push(b'\n');
        self.writer.write_all(&line)?;
        Ok(())
    }
}
