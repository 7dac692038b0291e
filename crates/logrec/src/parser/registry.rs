use std::io;
use std::sync::Arc;

use bytes::Bytes;

use super::diagnostics::DiagnosticsSink;
use super::formats::AptHistoryFormat;
use super::metrics::ParseStats;
use super::model::GrammarError;
use super::prober::FormatProber;
use super::session::{Session, StreamError};
use super::traits::LineFormat;
use crate::output::RecordSink;

/// Object-safe view of a [`LineFormat`], so formats with different record
/// types can sit in one registry.
pub trait RecordParser: Send + Sync {
    fn name(&self) -> &'static str;

    fn data_format(&self) -> &'static str;

    fn probe(&self, prober: &FormatProber, sample: &[Bytes]) -> bool;

    fn parse(
        &self,
        lines: &mut dyn Iterator<Item = io::Result<Bytes>>,
        sink: &mut dyn RecordSink,
        diagnostics: &mut dyn DiagnosticsSink,
        max_line_length: usize,
    ) -> Result<ParseStats, StreamError>;
}

impl<F: LineFormat> RecordParser for F {
    fn name(&self) -> &'static str {
        LineFormat::name(self)
    }

    fn data_format(&self) -> &'static str {
        LineFormat::data_format(self)
    }

    fn probe(&self, prober: &FormatProber, sample: &[Bytes]) -> bool {
        prober.probe(self, sample.iter())
    }

    fn parse(
        &self,
        lines: &mut dyn Iterator<Item = io::Result<Bytes>>,
        sink: &mut dyn RecordSink,
        diagnostics: &mut dyn DiagnosticsSink,
        max_line_length: usize,
    ) -> Result<ParseStats, StreamError> {
        let mut session = Session::new(self, diagnostics).with_max_line_length(max_line_length);
        session.run(lines, sink)?;
        let (stats, _) = session.finish();
        Ok(stats)
    }
}

/// Known formats, probed in registration order.
pub struct FormatRegistry {
    formats: Vec<Arc<dyn RecordParser>>,
}

impl FormatRegistry {
    pub fn new() -> Result<Self, GrammarError> {
        let formats: Vec<Arc<dyn RecordParser>> = vec![
            Arc::new(AptHistoryFormat::new()?),
        ];

        Ok(Self { formats })
    }

    pub fn with_formats(formats: Vec<Arc<dyn RecordParser>>) -> Self {
        Self { formats }
    }

    pub fn formats(&self) -> &[Arc<dyn RecordParser>] {
        &self.formats
    }

    pub fn get(&self, name: &str) -> Option<Arc<dyn RecordParser>> {
        self.formats.iter().find(|f| f.name() == name).cloned()
    }

    /// First format whose prober accepts the sample.
    pub fn detect(&self, prober: &FormatProber, sample: &[Bytes]) -> Option<Arc<dyn RecordParser>> {
        self.formats
            .iter()
            .find(|format| format.probe(prober, sample))
            .cloned()
    }
}
