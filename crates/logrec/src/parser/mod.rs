/// Incremental, line-oriented parsing of multi-line log records
///
/// This module turns a stream of physical lines into normalized event
/// records. Each format supplies a small grammar; the engine does the rest.
///
/// # Architecture
///
/// - `grammar.rs`: Named rules (start / body / end) grouped into rule sets
/// - `time.rs`: Date/time token validation and timezone reconciliation
/// - `session.rs`: Per-stream dispatcher and record state machine
/// - `prober.rs`: Non-mutating "is this my format?" check
/// - `registry.rs`: Known formats and detection order
/// - `formats/`: Individual format grammars
/// - `source.rs`: Bounded line splitting over a reader
/// - `metrics.rs`: Per-session and per-run counters
///
/// # Recovery Guarantees
///
/// - A bad line costs that line only
/// - A bad end timestamp costs the record in flight only
/// - Line size limits bound memory (no unbounded allocations)
/// - Non-UTF8 lines are reported, never fatal

pub mod traits;
pub mod model;
pub mod grammar;
pub mod time;
pub mod session;
pub mod prober;
pub mod registry;
pub mod diagnostics;
pub mod metrics;
pub mod formats;
pub mod source;
mod serde_utils;

// Re-export commonly used types
pub use traits::LineFormat;
pub use model::{EventRecord, FieldValue, ParseError};
pub use session::Session;
pub use prober::FormatProber;
pub use registry::{FormatRegistry, RecordParser};
pub use time::{TimeKind, Timestamp};

// Constants
/// Longest accepted line, in characters
pub const MAX_LINE_LENGTH: usize = 65_536;
pub const PROBE_MAX_LINES: usize = 16;

/// Decode one physical line, enforcing `max_line_length` in characters.
pub(crate) fn decode_line(raw: &[u8], max_line_length: usize) -> Result<&str, ParseError> {
    if raw.len() > max_line_length {
        // lead bytes count characters, even when the line was cut mid-character
        let chars = raw.iter().filter(|b| (**b & 0xC0) != 0x80).count();
        if chars > max_line_length {
            return Err(ParseError::LineTooLong(chars, max_line_length));
        }
    }
    std::str::from_utf8(raw).map_err(|_| ParseError::NonUtf8)
}
