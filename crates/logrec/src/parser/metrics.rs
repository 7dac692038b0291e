use std::sync::atomic::{AtomicU64, Ordering};
use serde::Serialize;

use super::model::ParseErrorKind;

/// Counters for a single session. Plain integers: a session is never shared.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize)]
pub struct ParseStats {
    pub lines: u64,
    pub blank_lines: u64,
    pub records_emitted: u64,
    /// Records dropped before emission (bad end timestamp, unterminated)
    pub records_discarded: u64,
    pub warnings: WarningCounts,
}

#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize)]
pub struct WarningCounts {
    pub line_too_long: u64,
    pub non_utf8: u64,
    pub unrecognized_line: u64,
    pub time_parse: u64,
    pub token_shape: u64,
    pub orphan_transition: u64,
    pub unterminated_record: u64,
}

impl WarningCounts {
    pub fn total(&self) -> u64 {
        self.line_too_long
            + self.non_utf8
            + self.unrecognized_line
            + self.time_parse
            + self.token_shape
            + self.orphan_transition
            + self.unterminated_record
    }
}

impl ParseStats {
    pub fn record_warning(&mut self, kind: ParseErrorKind) {
        let w = &mut self.warnings;
        match kind {
            ParseErrorKind::LineTooLong => w.line_too_long += 1,
            ParseErrorKind::NonUtf8 => w.non_utf8 += 1,
            ParseErrorKind::UnrecognizedLine => w.unrecognized_line += 1,
            ParseErrorKind::TimeParse => w.time_parse += 1,
            ParseErrorKind::TokenShape => w.token_shape += 1,
            ParseErrorKind::OrphanTransition => w.orphan_transition += 1,
            ParseErrorKind::UnterminatedRecord => w.unterminated_record += 1,
        }
    }
}

/// Forces the wrapped data onto its own 64-byte cache line so that
/// concurrent sessions updating different groups do not contend.
#[repr(align(64))]
#[derive(Debug, Default)]
pub struct CacheAligned<T>(pub T);

#[derive(Debug, Default)]
pub struct ProbeMetrics {
    pub attempts: AtomicU64,
    pub recognized: AtomicU64,
    pub unrecognized: AtomicU64,
}

#[derive(Debug, Default)]
pub struct VolumeMetrics {
    pub files: AtomicU64,
    pub lines: AtomicU64,
    pub blank_lines: AtomicU64,
    pub records_emitted: AtomicU64,
    pub records_discarded: AtomicU64,
}

#[derive(Debug, Default)]
pub struct WarningMetrics {
    pub line_too_long: AtomicU64,
    pub non_utf8: AtomicU64,
    pub unrecognized_line: AtomicU64,
    pub time_parse: AtomicU64,
    pub token_shape: AtomicU64,
    pub orphan_transition: AtomicU64,
    pub unterminated_record: AtomicU64,
}

/// Totals across every session of a run.
///
/// All operations use `Ordering::Relaxed`; `snapshot()` may tear across
/// fields while sessions are still running.
#[derive(Debug, Default)]
pub struct ParsingMetrics {
    pub probes: CacheAligned<ProbeMetrics>,
    pub volume: CacheAligned<VolumeMetrics>,
    pub warnings: CacheAligned<WarningMetrics>,
}

impl ParsingMetrics {
    pub fn new() -> Self {
        Self::default()
    }

    #[inline]
    pub fn record_probe(&self, recognized: bool) {
        self.probes.0.attempts.fetch_add(1, Ordering::Relaxed);
        if recognized {
            self.probes.0.recognized.fetch_add(1, Ordering::Relaxed);
        } else {
            self.probes.0.unrecognized.fetch_add(1, Ordering::Relaxed);
        }
    }

    /// Fold a finished session's counters into the totals.
    pub fn absorb(&self, stats: &ParseStats) {
        let v = &self.volume.0;
        v.files.fetch_add(1, Ordering::Relaxed);
        v.lines.fetch_add(stats.lines, Ordering::Relaxed);
        v.blank_lines.fetch_add(stats.blank_lines, Ordering::Relaxed);
        v.records_emitted.fetch_add(stats.records_emitted, Ordering::Relaxed);
        v.records_discarded.fetch_add(stats.records_discarded, Ordering::Relaxed);

        let w = &self.warnings.0;
        let s = &stats.warnings;
        w.line_too_long.fetch_add(s.line_too_long, Ordering::Relaxed);
        w.non_utf8.fetch_add(s.non_utf8, Ordering::Relaxed);
        w.unrecognized_line.fetch_add(s.unrecognized_line, Ordering::Relaxed);
        w.time_parse.fetch_add(s.time_parse, Ordering::Relaxed);
        w.token_shape.fetch_add(s.token_shape, Ordering::Relaxed);
        w.orphan_transition.fetch_add(s.orphan_transition, Ordering::Relaxed);
        w.unterminated_record.fetch_add(s.unterminated_record, Ordering::Relaxed);
    }

    pub fn snapshot(&self) -> MetricsSnapshot {
        let p = &self.probes.0;
        let v = &self.volume.0;
        let w = &self.warnings.0;
        MetricsSnapshot {
            probe_attempts: p.attempts.load(Ordering::Relaxed),
            probe_recognized: p.recognized.load(Ordering::Relaxed),
            probe_unrecognized: p.unrecognized.load(Ordering::Relaxed),
            files: v.files.load(Ordering::Relaxed),
            lines: v.lines.load(Ordering::Relaxed),
            blank_lines: v.blank_lines.load(Ordering::Relaxed),
            records_emitted: v.records_emitted.load(Ordering::Relaxed),
            records_discarded: v.records_discarded.load(Ordering::Relaxed),
            warnings: WarningCounts {
                line_too_long: w.line_too_long.load(Ordering::Relaxed),
                non_utf8: w.non_utf8.load(Ordering::Relaxed),
                unrecognized_line: w.unrecognized_line.load(Ordering::Relaxed),
                time_parse: w.time_parse.load(Ordering::Relaxed),
                token_shape: w.token_shape.load(Ordering::Relaxed),
                orphan_transition: w.orphan_transition.load(Ordering::Relaxed),
                unterminated_record: w.unterminated_record.load(Ordering::Relaxed),
            },
        }
    }
}

#[derive(Debug, Clone, Serialize)]
pub struct MetricsSnapshot {
    pub probe_attempts: u64,
    pub probe_recognized: u64,
    pub probe_unrecognized: u64,
    pub files: u64,
    pub lines: u64,
    pub blank_lines: u64,
    pub records_emitted: u64,
    pub records_discarded: u64,
    pub warnings: WarningCounts,
}
