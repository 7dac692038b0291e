//! Session: the line dispatcher and per-record state machine.
//!
//! One session exists per parsed stream. It classifies each line against
//! the format's rule set and moves between two states:
//!
//! - `Idle`: no record in flight
//! - `Active`: a start line was accepted, body lines update the record,
//!   an end line emits it
//!
//! Every input problem is reported to the diagnostics sink and costs at
//! most the line (or the in-flight record) it occurred in.

use std::io;

use thiserror::Error;
use tracing::{debug, trace};

use super::diagnostics::DiagnosticsSink;
use super::metrics::ParseStats;
use super::traits::*;
use crate::output::{OutputError, RecordSink};

enum RecordState<R> {
    Idle,
    Active { record: R, started_at: u64 },
}

/// Failures that stop a stream: the reader or the sink broke, not the input.
#[derive(Debug, Error)]
pub enum StreamError {
    #[error("Read failed: {0}")]
    Read(#[source] io::Error),

    #[error(transparent)]
    Output(#[from] OutputError),
}

pub struct Session<'f, F: LineFormat, D: DiagnosticsSink> {
    format: &'f F,
    state: RecordState<F::Record>,
    diagnostics: D,
    max_line_length: usize,
    line_number: u64,
    stats: ParseStats,
}

impl<'f, F: LineFormat, D: DiagnosticsSink> Session<'f, F, D> {
    pub fn new(format: &'f F, diagnostics: D) -> Self {
        Self {
            format,
            state: RecordState::Idle,
            diagnostics,
            max_line_length: super::MAX_LINE_LENGTH,
            line_number: 0,
            stats: ParseStats::default(),
        }
    }

    pub fn with_max_line_length(mut self, max_line_length: usize) -> Self {
        self.max_line_length = max_line_length;
        self
    }

    pub fn is_idle(&self) -> bool {
        matches!(self.state, RecordState::Idle)
    }

    pub fn line_number(&self) -> u64 {
        self.line_number
    }

    pub fn stats(&self) -> &ParseStats {
        &self.stats
    }

    pub fn diagnostics(&self) -> &D {
        &self.diagnostics
    }

    /// Process one physical line (without its line terminator).
    /// Returns the record this line completed, if any.
    pub fn feed_line(&mut self, raw: &[u8]) -> Option<EventRecord> {
        self.line_number += 1;
        self.stats.lines += 1;

        match self.dispatch(raw) {
            Ok(record) => record,
            Err(warning) => {
                self.report(warning);
                None
            }
        }
    }

    /// Drive a whole stream into `sink`.
    ///
    /// Only reader and sink failures stop the stream; parse problems are
    /// reported and skipped.
    pub fn run<I, T, S>(&mut self, lines: I, sink: &mut S) -> Result<ParseStats, StreamError>
    where
        I: IntoIterator<Item = io::Result<T>>,
        T: AsRef<[u8]>,
        S: RecordSink + ?Sized,
    {
        for line in lines {
            let line = line.map_err(StreamError::Read)?;
            if let Some(record) = self.feed_line(line.as_ref()) {
                sink.write_record(&record)?;
            }
        }
        Ok(self.stats.clone())
    }

    /// End the session. A record still in flight was never valid and is dropped.
    pub fn finish(self) -> (ParseStats, D) {
        if let RecordState::Active { started_at, .. } = self.state {
            debug!(
                format = self.format.name(),
                started_at,
                "session ended with an incomplete record, dropping it"
            );
        }
        (self.stats, self.diagnostics)
    }

    fn dispatch(&mut self, raw: &[u8]) -> Result<Option<EventRecord>, ParseError> {
        let line = super::decode_line(raw, self.max_line_length)?;

        let format = self.format;
        let rules = format.rules();

        if rules.ignores_blank_lines() && line.trim().is_empty() {
            self.stats.blank_lines += 1;
            return Ok(None);
        }

        let matched = rules
            .classify(line)
            .ok_or_else(|| ParseError::UnrecognizedLine(rules.name().to_string()))?;

        let rule = matched.rule;
        trace!(line = self.line_number, rule = rule.name(), kind = %rule.kind(), "classified");

        match rule.kind() {
            RuleKind::Start => self.start_record(rule.name(), &matched.tokens),
            RuleKind::Body => self.update_record(rule.name(), &matched.tokens),
            RuleKind::End => self.end_record(rule.name(), &matched.tokens),
        }
    }

    fn start_record(&mut self, rule: &str, tokens: &TokenStructure) -> Result<Option<EventRecord>, ParseError> {
        if let RecordState::Active { started_at, .. } = std::mem::replace(&mut self.state, RecordState::Idle) {
            self.stats.records_discarded += 1;
            self.report(ParseError::UnterminatedRecord(started_at));
        }

        let record = self.format.begin_record(rule, tokens)?;
        self.state = RecordState::Active {
            record,
            started_at: self.line_number,
        };
        Ok(None)
    }

    fn update_record(&mut self, rule: &str, tokens: &TokenStructure) -> Result<Option<EventRecord>, ParseError> {
        match &mut self.state {
            RecordState::Idle => Err(ParseError::OrphanTransition(RuleKind::Body)),
            RecordState::Active { record, .. } => {
                self.format.apply_body(record, rule, tokens)?;
                Ok(None)
            }
        }
    }

    fn end_record(&mut self, rule: &str, tokens: &TokenStructure) -> Result<Option<EventRecord>, ParseError> {
        match std::mem::replace(&mut self.state, RecordState::Idle) {
            RecordState::Idle => Err(ParseError::OrphanTransition(RuleKind::End)),
            RecordState::Active { record, started_at } => {
                match self.format.finish_record(record, rule, tokens) {
                    Ok(event) => {
                        self.stats.records_emitted += 1;
                        debug!(started_at, ended_at = self.line_number, "record emitted");
                        Ok(Some(event))
                    }
                    Err(e) => {
                        self.stats.records_discarded += 1;
                        Err(e)
                    }
                }
            }
        }
    }

    fn report(&mut self, warning: ParseError) {
        self.stats.record_warning(warning.kind());
        self.diagnostics.warn(self.line_number, &warning);
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::parser::diagnostics::CollectedDiagnostics;
    use crate::parser::formats::AptHistoryFormat;
    use crate::parser::time::TimeKind;

    fn feed_all<D: DiagnosticsSink>(session: &mut Session<'_, AptHistoryFormat, D>, lines: &[&str]) -> Vec<EventRecord> {
        lines
            .iter()
            .filter_map(|line| session.feed_line(line.as_bytes()))
            .collect()
    }

    fn record_lines() -> Vec<&'static str> {
        vec![
            "Start-Date: 2019-07-10  16:38:12",
            "Commandline: apt upgrade",
            "Upgrade: pkg-a, pkg-b",
            "End-Date: 2019-07-10  16:38:20",
        ]
    }

    // ── Happy path ──────────────────────────────────────────────

    #[test]
    fn test_documented_scenario() {
        let format = AptHistoryFormat::new().unwrap();
        let mut session = Session::new(&format, CollectedDiagnostics::new());

        let records = feed_all(&mut session, &record_lines());

        assert_eq!(records.len(), 1);
        let record = &records[0];
        assert_eq!(record.data_type, "linux:apt_history_log:entry");

        let start = record.timestamp("start_time").unwrap();
        assert_eq!(start.naive().to_string(), "2019-07-10 16:38:12");
        assert_eq!(start.kind(), TimeKind::Local);

        let end = record.timestamp("end_time").unwrap();
        assert_eq!(end.naive().to_string(), "2019-07-10 16:38:20");
        assert!(end.is_local_time());

        assert_eq!(record.text("command_line"), Some("apt upgrade"));
        assert_eq!(record.text("command"), Some("Upgrade"));
        assert_eq!(record.text("packages"), Some("pkg-a, pkg-b"));
        assert!(record.field("requester").unwrap().is_absent());
        assert!(record.field("error").unwrap().is_absent());

        assert!(session.diagnostics().is_empty(), "{:?}", session.diagnostics().messages());
        assert!(session.is_idle());
    }

    #[test]
    fn test_record_without_body_lines() {
        let format = AptHistoryFormat::new().unwrap();
        let mut session = Session::new(&format, CollectedDiagnostics::new());

        let records = feed_all(&mut session, &[
            "Start-Date: 2020-01-01  00:00:00",
            "End-Date: 2020-01-01  00:00:01",
        ]);

        assert_eq!(records.len(), 1);
        assert!(records[0].field("command").unwrap().is_absent());
        assert!(session.diagnostics().is_empty());
    }

    #[test]
    fn test_body_values_are_trimmed() {
        let format = AptHistoryFormat::new().unwrap();
        let mut session = Session::new(&format, CollectedDiagnostics::new());

        let records = feed_all(&mut session, &[
            "Start-Date: 2020-01-01  00:00:00",
            "Requested-By:   alice (1000)   ",
            "Error:\tSub-process /usr/bin/dpkg returned an error code (1)  ",
            "End-Date: 2020-01-01  00:00:01",
        ]);

        assert_eq!(records[0].text("requester"), Some("alice (1000)"));
        assert_eq!(
            records[0].text("error"),
            Some("Sub-process /usr/bin/dpkg returned an error code (1)")
        );
    }

    #[test]
    fn test_consecutive_records_with_blank_separators() {
        let format = AptHistoryFormat::new().unwrap();
        let mut session = Session::new(&format, CollectedDiagnostics::new());

        let mut lines = vec![""];
        lines.extend(record_lines());
        lines.push("");
        lines.extend([
            "Start-Date: 2019-07-11  09:00:00",
            "Install: vim:amd64 (2:8.1.0875-5)",
            "End-Date: 2019-07-11  09:00:05",
        ]);

        let records = feed_all(&mut session, &lines);
        assert_eq!(records.len(), 2);
        assert_eq!(records[1].text("command"), Some("Install"));
        assert_eq!(session.stats().blank_lines, 2);
        assert!(session.diagnostics().is_empty());
    }

    // ── Recovery ────────────────────────────────────────────────

    #[test]
    fn test_invalid_start_timestamp_stays_idle() {
        let format = AptHistoryFormat::new().unwrap();
        let mut session = Session::new(&format, CollectedDiagnostics::new());

        let records = feed_all(&mut session, &["Start-Date: 2019-13-10  16:38:12"]);
        assert!(records.is_empty());
        assert!(session.is_idle());
        assert_eq!(session.diagnostics().len(), 1);
        assert!(matches!(session.diagnostics().warnings[0].1, ParseError::TimeParse(_)));

        // A later valid record still works
        let records = feed_all(&mut session, &record_lines());
        assert_eq!(records.len(), 1);
    }

    #[test]
    fn test_invalid_start_hour() {
        let format = AptHistoryFormat::new().unwrap();
        let mut session = Session::new(&format, CollectedDiagnostics::new());

        let records = feed_all(&mut session, &[
            "Start-Date: 2019-07-10  25:38:12",
            "Commandline: apt upgrade",
            "End-Date: 2019-07-10  16:38:20",
        ]);

        // body and end are orphaned since the start never became active
        assert!(records.is_empty());
        let warnings = &session.diagnostics().warnings;
        assert_eq!(warnings.len(), 3);
        assert!(matches!(warnings[0].1, ParseError::TimeParse(_)));
        assert_eq!(warnings[1].1, ParseError::OrphanTransition(RuleKind::Body));
        assert_eq!(warnings[2].1, ParseError::OrphanTransition(RuleKind::End));
    }

    #[test]
    fn test_invalid_end_timestamp_discards_record() {
        let format = AptHistoryFormat::new().unwrap();
        let mut session = Session::new(&format, CollectedDiagnostics::new());

        let records = feed_all(&mut session, &[
            "Start-Date: 2019-07-10  16:38:12",
            "Upgrade: pkg-a",
            "End-Date: 2019-07-10  16:61:20",
        ]);

        assert!(records.is_empty());
        assert!(session.is_idle());
        assert_eq!(session.diagnostics().len(), 1);
        assert_eq!(session.stats().records_discarded, 1);

        // Fresh start accepted immediately, nothing leaks from the dropped record
        let records = feed_all(&mut session, &[
            "Start-Date: 2019-07-10  17:00:00",
            "End-Date: 2019-07-10  17:00:01",
        ]);
        assert_eq!(records.len(), 1);
        assert!(records[0].field("packages").unwrap().is_absent());
    }

    #[test]
    fn test_orphan_body_line() {
        let format = AptHistoryFormat::new().unwrap();
        let mut session = Session::new(&format, CollectedDiagnostics::new());

        let records = feed_all(&mut session, &["Commandline: apt install foo"]);

        assert!(records.is_empty());
        assert!(session.is_idle());
        assert_eq!(
            session.diagnostics().warnings,
            vec![(1, ParseError::OrphanTransition(RuleKind::Body))]
        );
    }

    #[test]
    fn test_unrecognized_line_skipped() {
        let format = AptHistoryFormat::new().unwrap();
        let mut session = Session::new(&format, CollectedDiagnostics::new());

        let records = feed_all(&mut session, &[
            "Start-Date: 2019-07-10  16:38:12",
            "Reinstall: something",
            "Commandline: apt upgrade",
            "End-Date: 2019-07-10  16:38:20",
        ]);

        assert_eq!(records.len(), 1);
        assert_eq!(records[0].text("command_line"), Some("apt upgrade"));
        assert_eq!(session.diagnostics().len(), 1);
        assert_eq!(session.diagnostics().warnings[0].0, 2);
        assert!(matches!(
            session.diagnostics().warnings[0].1,
            ParseError::UnrecognizedLine(_)
        ));
    }

    #[test]
    fn test_start_while_active_discards_previous() {
        let format = AptHistoryFormat::new().unwrap();
        let mut session = Session::new(&format, CollectedDiagnostics::new());

        let records = feed_all(&mut session, &[
            "Start-Date: 2019-07-10  16:38:12",
            "Install: stale",
            "Start-Date: 2019-07-10  16:40:00",
            "End-Date: 2019-07-10  16:40:05",
        ]);

        assert_eq!(records.len(), 1);
        assert!(records[0].field("packages").unwrap().is_absent());
        assert_eq!(
            session.diagnostics().warnings,
            vec![(3, ParseError::UnterminatedRecord(1))]
        );
    }

    #[test]
    fn test_line_too_long() {
        let format = AptHistoryFormat::new().unwrap();
        let mut session = Session::new(&format, CollectedDiagnostics::new()).with_max_line_length(40);

        let long = format!("Commandline: {}", "x".repeat(64));
        let records = feed_all(&mut session, &[
            "Start-Date: 2019-07-10  16:38:12",
            long.as_str(),
            "End-Date: 2019-07-10  16:38:20",
        ]);

        assert_eq!(records.len(), 1);
        assert!(records[0].field("command_line").unwrap().is_absent());
        assert!(matches!(
            session.diagnostics().warnings[0].1,
            ParseError::LineTooLong(_, 40)
        ));
    }

    #[test]
    fn test_line_limit_counts_characters_not_bytes() {
        let format = AptHistoryFormat::new().unwrap();
        let mut session = Session::new(&format, CollectedDiagnostics::new()).with_max_line_length(40);

        // 39 characters, 63 bytes
        let value = "\u{00fc}".repeat(26);
        let line = format!("Commandline: {}", value);
        assert_eq!(line.chars().count(), 39);

        let records = feed_all(&mut session, &[
            "Start-Date: 2019-07-10  16:38:12",
            line.as_str(),
            "End-Date: 2019-07-10  16:38:20",
        ]);

        assert_eq!(records.len(), 1);
        assert_eq!(records[0].text("command_line"), Some(value.as_str()));
        assert!(session.diagnostics().is_empty(), "{:?}", session.diagnostics().messages());
    }

    #[test]
    fn test_overlong_multibyte_line_reports_characters() {
        let format = AptHistoryFormat::new().unwrap();
        let mut session = Session::new(&format, CollectedDiagnostics::new()).with_max_line_length(20);

        let line = format!("Commandline: {}", "\u{00fc}".repeat(10));
        assert!(session.feed_line(line.as_bytes()).is_none());
        assert_eq!(session.diagnostics().warnings, vec![(1, ParseError::LineTooLong(23, 20))]);
    }

    #[test]
    fn test_crlf_record_at_line_limit() {
        use crate::parser::source::LineSource;
        use std::io::Cursor;

        let format = AptHistoryFormat::new().unwrap();
        let start = "Start-Date: 2019-07-10  16:38:12";
        assert_eq!(start.len(), 32);
        let input = format!("{}\r\nUpgrade: pkg-a\r\nEnd-Date: 2019-07-10  16:38:20\r\n", start);

        let mut session = Session::new(&format, CollectedDiagnostics::new()).with_max_line_length(32);
        let mut records: Vec<EventRecord> = Vec::new();
        session
            .run(LineSource::new(Cursor::new(input.into_bytes()), 32), &mut records)
            .unwrap();

        assert_eq!(records.len(), 1);
        assert_eq!(records[0].text("packages"), Some("pkg-a"));
        assert!(session.diagnostics().is_empty(), "{:?}", session.diagnostics().messages());
    }

    #[test]
    fn test_non_utf8_line() {
        let format = AptHistoryFormat::new().unwrap();
        let mut session = Session::new(&format, CollectedDiagnostics::new());

        assert!(session.feed_line(b"Commandline: \xFF\xFE").is_none());
        assert_eq!(session.diagnostics().warnings, vec![(1, ParseError::NonUtf8)]);
        assert_eq!(session.stats().warnings.non_utf8, 1);
    }

    // ── Round trip ──────────────────────────────────────────────

    #[test]
    fn test_refeeding_lines_reproduces_record() {
        let format = AptHistoryFormat::new().unwrap();

        let mut first = Session::new(&format, CollectedDiagnostics::new());
        let a = feed_all(&mut first, &record_lines());

        let mut second = Session::new(&format, CollectedDiagnostics::new());
        let b = feed_all(&mut second, &record_lines());

        assert_eq!(a, b);
        assert_eq!(
            serde_json::to_string(&a[0]).unwrap(),
            serde_json::to_string(&b[0]).unwrap()
        );
    }

    // ── Stream driving ──────────────────────────────────────────

    #[test]
    fn test_run_into_sink() {
        let format = AptHistoryFormat::new().unwrap();
        let mut session = Session::new(&format, CollectedDiagnostics::new());
        let mut sink: Vec<EventRecord> = Vec::new();

        let lines = record_lines().into_iter().map(|l| Ok::<_, io::Error>(l.as_bytes()));
        let stats = session.run(lines, &mut sink).unwrap();

        assert_eq!(sink.len(), 1);
        assert_eq!(stats.lines, 4);
        assert_eq!(stats.records_emitted, 1);
        assert_eq!(stats.warnings.total(), 0);
    }

    #[test]
    fn test_run_stops_on_read_error() {
        let format = AptHistoryFormat::new().unwrap();
        let mut session = Session::new(&format, CollectedDiagnostics::new());
        let mut sink: Vec<EventRecord> = Vec::new();

        let lines: Vec<io::Result<&[u8]>> = vec![
            Ok(&b"Start-Date: 2019-07-10  16:38:12"[..]),
            Err(io::Error::new(io::ErrorKind::Other, "disk gone")),
        ];
        let result = session.run(lines, &mut sink);
        assert!(matches!(result, Err(StreamError::Read(_))));
    }

    #[test]
    fn test_finish_drops_incomplete_record() {
        let format = AptHistoryFormat::new().unwrap();
        let mut session = Session::new(&format, CollectedDiagnostics::new());

        feed_all(&mut session, &["Start-Date: 2019-07-10  16:38:12", "Upgrade: a"]);
        assert!(!session.is_idle());

        let (stats, diagnostics) = session.finish();
        assert_eq!(stats.records_emitted, 0);
        assert!(diagnostics.is_empty());
    }
}
