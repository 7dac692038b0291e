use tracing::debug;

use crate::parser::model::GrammarError;
use crate::parser::time::{TimeKind, Timestamp, TIME_ELEMENT_NAMES};
use crate::parser::traits::*;

pub const DATA_TYPE: &str = "linux:apt_history_log:entry";

// "2019-07-10  16:38:12"; digits are ASCII only
const DATE_TIME: &str = r"(?P<year>[0-9]{4})-(?P<month>[0-9]{2})-(?P<day>[0-9]{2})\s+(?P<hour>[0-9]{2}):(?P<minute>[0-9]{2}):(?P<second>[0-9]{2})";

const PACKAGE_ACTIONS: [&str; 5] = ["Downgrade", "Install", "Purge", "Remove", "Upgrade"];

/// Advanced Packaging Tool (APT) history log, `/var/log/apt/history.log`.
///
/// ```text
/// Start-Date: 2019-07-10  16:38:12
/// Commandline: apt upgrade
/// Upgrade: pkg-a, pkg-b
/// End-Date: 2019-07-10  16:38:20
/// ```
///
/// Dates are written in the local time of the host.
pub struct AptHistoryFormat {
    rules: RuleSet,
}

impl AptHistoryFormat {
    pub fn new() -> Result<Self, GrammarError> {
        let rules = RuleSet::new(
            "apt_history",
            vec![
                GrammarRule::new(
                    "record_start",
                    RuleKind::Start,
                    &format!(r"^\s*Start-Date:\s*{}\s*$", DATE_TIME),
                )?
                .with_integers(&TIME_ELEMENT_NAMES),
                GrammarRule::new(
                    "record_body",
                    RuleKind::Body,
                    r"^\s*(?P<keyword>Commandline|Downgrade|Error|Install|Purge|Remove|Requested-By|Upgrade):(?P<body>.*)$",
                )?,
                GrammarRule::new(
                    "record_end",
                    RuleKind::End,
                    &format!(r"^\s*End-Date:\s*{}\s*$", DATE_TIME),
                )?
                .with_integers(&TIME_ELEMENT_NAMES),
            ],
        )?
        .ignoring_blank_lines();

        Ok(Self { rules })
    }
}

/// Fields collected for the record in flight.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct AptHistoryEntry {
    pub start_time: Timestamp,
    pub command: Option<String>,
    pub command_line: Option<String>,
    pub packages: Option<String>,
    pub requester: Option<String>,
    pub error: Option<String>,
}

impl AptHistoryEntry {
    fn new(start_time: Timestamp) -> Self {
        Self {
            start_time,
            command: None,
            command_line: None,
            packages: None,
            requester: None,
            error: None,
        }
    }

    fn into_event(self, end_time: Timestamp) -> EventRecord {
        EventRecord::new(DATA_TYPE)
            .with_field("start_time", FieldValue::Timestamp(self.start_time))
            .with_field("end_time", FieldValue::Timestamp(end_time))
            .with_field("command", FieldValue::from_option(self.command))
            .with_field("command_line", FieldValue::from_option(self.command_line))
            .with_field("packages", FieldValue::from_option(self.packages))
            .with_field("requester", FieldValue::from_option(self.requester))
            .with_field("error", FieldValue::from_option(self.error))
    }
}

impl LineFormat for AptHistoryFormat {
    type Record = AptHistoryEntry;

    fn name(&self) -> &'static str {
        "apt_history"
    }

    fn data_format(&self) -> &'static str {
        "Advanced Packaging Tool (APT) History log file"
    }

    fn rules(&self) -> &RuleSet {
        &self.rules
    }

    fn begin_record(&self, _rule: &str, tokens: &TokenStructure) -> Result<AptHistoryEntry, ParseError> {
        let start_time = Timestamp::from_tokens(tokens, TimeKind::Local)?;
        Ok(AptHistoryEntry::new(start_time))
    }

    fn apply_body(&self, record: &mut AptHistoryEntry, _rule: &str, tokens: &TokenStructure) -> Result<(), ParseError> {
        let keyword = tokens.text("keyword")?;
        let body = tokens.text("body")?.trim().to_string();

        match keyword {
            "Commandline" => record.command_line = Some(body),
            "Error" => record.error = Some(body),
            "Requested-By" => record.requester = Some(body),
            action if PACKAGE_ACTIONS.contains(&action) => {
                if let Some(previous) = &record.command {
                    debug!(previous = %previous, action, "package action repeated in one record, keeping the last");
                }
                record.command = Some(action.to_string());
                record.packages = Some(body);
            }
            other => {
                return Err(ParseError::TokenShape(format!("unexpected keyword '{}'", other)));
            }
        }
        Ok(())
    }

    fn finish_record(&self, record: AptHistoryEntry, _rule: &str, tokens: &TokenStructure) -> Result<EventRecord, ParseError> {
        let end_time = Timestamp::from_tokens(tokens, TimeKind::Local)?;
        Ok(record.into_event(end_time))
    }
}
