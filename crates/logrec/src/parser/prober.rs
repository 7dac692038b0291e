use tracing::trace;

use super::traits::*;

/// Cheap check of whether a stream starts the way a format's records start.
///
/// The prober only reads the format; it never touches a session, so a
/// failed or successful probe leaves nothing behind for a later parse.
#[derive(Debug, Clone, Copy)]
pub struct FormatProber {
    max_line_length: usize,
    max_lines: usize,
}

impl FormatProber {
    pub fn new(max_line_length: usize, max_lines: usize) -> Self {
        Self {
            max_line_length,
            max_lines,
        }
    }

    pub fn max_lines(&self) -> usize {
        self.max_lines
    }

    /// Returns true when the first non-blank line (within `max_lines`)
    /// matches a start rule and yields a valid start timestamp.
    pub fn probe<F, I>(&self, format: &F, lines: I) -> bool
    where
        F: LineFormat + ?Sized,
        I: IntoIterator,
        I::Item: AsRef<[u8]>,
    {
        for raw in lines.into_iter().take(self.max_lines) {
            let raw = raw.as_ref();
            let line = match super::decode_line(raw, self.max_line_length) {
                Ok(line) => line,
                Err(e) => {
                    trace!(format = format.name(), error = %e, "probe: first line rejected");
                    return false;
                }
            };

            if line.trim().is_empty() {
                continue;
            }

            return self.probe_line(format, line);
        }

        trace!(format = format.name(), "probe: no non-blank line");
        false
    }

    fn probe_line<F: LineFormat + ?Sized>(&self, format: &F, line: &str) -> bool {
        let Some(matched) = format.rules().classify_kind(line, RuleKind::Start) else {
            trace!(format = format.name(), "probe: first line is not a start line");
            return false;
        };

        // The accumulator built here is dropped immediately
        match format.begin_record(matched.rule.name(), &matched.tokens) {
            Ok(_) => true,
            Err(e) => {
                trace!(format = format.name(), error = %e, "probe: start line rejected");
                false
            }
        }
    }
}

impl Default for FormatProber {
    fn default() -> Self {
        Self::new(super::MAX_LINE_LENGTH, super::PROBE_MAX_LINES)
    }
}
