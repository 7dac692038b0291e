pub use super::model::{
    EventRecord, FieldValue, ParseError, RuleKind, Token, TokenStructure
};
pub use super::grammar::{GrammarRule, RuleSet};

/// A log format: its rule set plus the record transitions for each rule kind.
///
/// The session owns the `Record` accumulator; a format only builds,
/// updates and finalizes it.
pub trait LineFormat: Send + Sync {
    type Record: Send;

    /// Short name, e.g. `apt_history`
    fn name(&self) -> &'static str;

    /// Human readable description of the format
    fn data_format(&self) -> &'static str;

    fn rules(&self) -> &RuleSet;

    /// Build a fresh accumulator from a start line.
    fn begin_record(&self, rule: &str, tokens: &TokenStructure) -> Result<Self::Record, ParseError>;

    /// Apply one body line to the in-flight accumulator.
    fn apply_body(&self, record: &mut Self::Record, rule: &str, tokens: &TokenStructure) -> Result<(), ParseError>;

    /// Close the accumulator with an end line and produce the event record.
    fn finish_record(&self, record: Self::Record, rule: &str, tokens: &TokenStructure) -> Result<EventRecord, ParseError>;
}
