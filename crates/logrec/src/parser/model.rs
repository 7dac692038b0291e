use std::fmt;
use thiserror::Error;
use serde::Serialize;
use super::serde_utils::serialize_fields_as_map;
use super::time::Timestamp;


/// Category of physical line a grammar rule recognizes.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum RuleKind {
    /// First line of a record; carries the start timestamp
    Start,
    /// Line inside a record that updates one or more fields
    Body,
    /// Last line of a record; carries the end timestamp
    End,
}

impl RuleKind {
    pub fn as_str(&self) -> &'static str {
        match self {
            RuleKind::Start => "start",
            RuleKind::Body => "body",
            RuleKind::End => "end",
        }
    }
}

/// A single value extracted by a rule match.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Token {
    Integer(i64),
    Text(String),
}

/// Ordered, named tokens extracted from one line.
///
/// Lookups never fall back to a default value: a missing token or a token
/// of the wrong type is reported as [`ParseError::TokenShape`].
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct TokenStructure {
    tokens: Vec<(String, Token)>,
}

impl TokenStructure {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn push(&mut self, name: impl Into<String>, token: Token) {
        self.tokens.push((name.into(), token));
    }

    pub fn get(&self, name: &str) -> Option<&Token> {
        self.tokens.iter().find(|(n, _)| n == name).map(|(_, t)| t)
    }

    pub fn integer(&self, name: &str) -> Result<i64, ParseError> {
        match self.get(name) {
            Some(Token::Integer(value)) => Ok(*value),
            Some(Token::Text(_)) => Err(ParseError::TokenShape(format!(
                "token '{}' is text, expected an integer",
                name
            ))),
            None => Err(ParseError::TokenShape(format!("missing token '{}'", name))),
        }
    }

    pub fn text(&self, name: &str) -> Result<&str, ParseError> {
        match self.get(name) {
            Some(Token::Text(value)) => Ok(value.as_str()),
            Some(Token::Integer(_)) => Err(ParseError::TokenShape(format!(
                "token '{}' is an integer, expected text",
                name
            ))),
            None => Err(ParseError::TokenShape(format!("missing token '{}'", name))),
        }
    }

    pub fn len(&self) -> usize {
        self.tokens.len()
    }

    pub fn is_empty(&self) -> bool {
        self.tokens.is_empty()
    }
}

/// Per-line parse failures. Every variant is recovered at the line level.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum ParseError {
    #[error("Line too long: {0} characters (max: {1})")]
    LineTooLong(usize, usize),

    #[error("Non-UTF8 content")]
    NonUtf8,

    #[error("Unrecognized line: no rule in '{0}' matched")]
    UnrecognizedLine(String),

    #[error("Unable to parse time elements: {0}")]
    TimeParse(String),

    #[error("Token shape mismatch: {0}")]
    TokenShape(String),

    #[error("Orphaned {0} line: no active record")]
    OrphanTransition(RuleKind),

    #[error("Record started at line {0} discarded: no end line before next start")]
    UnterminatedRecord(u64),
}

impl ParseError {
    pub fn kind(&self) -> ParseErrorKind {
        match self {
            ParseError::LineTooLong(..) => ParseErrorKind::LineTooLong,
            ParseError::NonUtf8 => ParseErrorKind::NonUtf8,
            ParseError::UnrecognizedLine(_) => ParseErrorKind::UnrecognizedLine,
            ParseError::TimeParse(_) => ParseErrorKind::TimeParse,
            ParseError::TokenShape(_) => ParseErrorKind::TokenShape,
            ParseError::OrphanTransition(_) => ParseErrorKind::OrphanTransition,
            ParseError::UnterminatedRecord(_) => ParseErrorKind::UnterminatedRecord,
        }
    }
}

impl fmt::Display for RuleKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Coarse error classes used for counting warnings.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ParseErrorKind {
    LineTooLong,
    NonUtf8,
    UnrecognizedLine,
    TimeParse,
    TokenShape,
    OrphanTransition,
    UnterminatedRecord,
}

/// Errors raised while building a rule set.
#[derive(Debug, Error)]
pub enum GrammarError {
    #[error("Duplicate rule name '{rule}' in rule set '{set}'")]
    DuplicateRule { set: String, rule: String },

    #[error("Rule set '{0}' has no start rule")]
    MissingStartRule(String),

    #[error("Invalid pattern for rule '{rule}': {source}")]
    InvalidPattern {
        rule: String,
        #[source]
        source: regex::Error,
    },
}

/// Value of one field of an emitted record.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
#[serde(untagged)]
pub enum FieldValue {
    Timestamp(Timestamp),
    Text(String),
    Absent,
}

impl FieldValue {
    pub fn from_option(value: Option<String>) -> Self {
        match value {
            Some(s) => FieldValue::Text(s),
            None => FieldValue::Absent,
        }
    }

    pub fn is_absent(&self) -> bool {
        matches!(self, FieldValue::Absent)
    }
}

/// Normalized event record handed to the downstream sink.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct EventRecord {
    /// Format-specific data type, e.g. `linux:apt_history_log:entry`
    pub data_type: &'static str,

    /// Fields in the order the format declares them
    #[serde(serialize_with = "serialize_fields_as_map")]
    pub fields: Vec<(String, FieldValue)>,
}

impl EventRecord {
    pub fn new(data_type: &'static str) -> Self {
        Self {
            data_type,
            fields: Vec::new(),
        }
    }

    pub fn with_field(mut self, name: &str, value: FieldValue) -> Self {
        self.fields.push((name.to_string(), value));
        self
    }

    pub fn field(&self, name: &str) -> Option<&FieldValue> {
        self.fields.iter().find(|(n, _)| n == name).map(|(_, v)| v)
    }

    pub fn text(&self, name: &str) -> Option<&str> {
        match self.field(name) {
            Some(FieldValue::Text(s)) => Some(s.as_str()),
            _ => None,
        }
    }

    pub fn timestamp(&self, name: &str) -> Option<&Timestamp> {
        match self.field(name) {
            Some(FieldValue::Timestamp(ts)) => Some(ts),
            _ => None,
        }
    }
}
