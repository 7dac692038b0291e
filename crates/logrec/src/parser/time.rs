//! Time elements: six numeric date/time tokens validated into a [`Timestamp`].

use chrono::{DateTime, Datelike, FixedOffset, NaiveDate, NaiveDateTime, NaiveTime, TimeZone, Timelike, Utc};
use serde::Serialize;

use super::model::{ParseError, TokenStructure};

/// Token names a date-time rule must capture.
pub const TIME_ELEMENT_NAMES: [&str; 6] = ["year", "month", "day", "hour", "minute", "second"];

/// Whether a timestamp was written in the local time of the host that
/// produced the log, or as an absolute (UTC) value.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum TimeKind {
    Local,
    Absolute,
}

/// Raw date/time components before validation.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct TimeElements {
    pub year: i64,
    pub month: i64,
    pub day: i64,
    pub hour: i64,
    pub minute: i64,
    pub second: i64,
}

impl TimeElements {
    pub fn from_tuple((year, month, day, hour, minute, second): (i64, i64, i64, i64, i64, i64)) -> Self {
        Self { year, month, day, hour, minute, second }
    }

    /// Read the six components out of a token structure.
    ///
    /// Each component is looked up explicitly; a missing or non-integer
    /// token fails with [`ParseError::TokenShape`].
    pub fn from_tokens(tokens: &TokenStructure) -> Result<Self, ParseError> {
        Ok(Self {
            year: tokens.integer("year")?,
            month: tokens.integer("month")?,
            day: tokens.integer("day")?,
            hour: tokens.integer("hour")?,
            minute: tokens.integer("minute")?,
            second: tokens.integer("second")?,
        })
    }
}

/// A validated calendar date and time plus its [`TimeKind`].
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize)]
pub struct Timestamp {
    date_time: NaiveDateTime,
    kind: TimeKind,
}

impl Timestamp {
    pub fn new(elements: TimeElements, kind: TimeKind) -> Result<Self, ParseError> {
        let year = component(elements.year, "year")?;
        let month = component(elements.month, "month")?;
        let day = component(elements.day, "day")?;
        let hour = component(elements.hour, "hour")?;
        let minute = component(elements.minute, "minute")?;
        let second = component(elements.second, "second")?;

        let year = i32::try_from(year)
            .map_err(|_| ParseError::TimeParse(format!("year out of range: {}", elements.year)))?;

        let date = NaiveDate::from_ymd_opt(year, month, day).ok_or_else(|| {
            ParseError::TimeParse(format!(
                "invalid date: {:04}-{:02}-{:02}",
                elements.year, elements.month, elements.day
            ))
        })?;

        // from_hms_opt accepts nothing above 59 seconds, leap seconds included
        let time = NaiveTime::from_hms_opt(hour, minute, second).ok_or_else(|| {
            ParseError::TimeParse(format!(
                "invalid time: {:02}:{:02}:{:02}",
                elements.hour, elements.minute, elements.second
            ))
        })?;

        Ok(Self {
            date_time: NaiveDateTime::new(date, time),
            kind,
        })
    }

    pub fn from_tokens(tokens: &TokenStructure, kind: TimeKind) -> Result<Self, ParseError> {
        Self::new(TimeElements::from_tokens(tokens)?, kind)
    }

    pub fn kind(&self) -> TimeKind {
        self.kind
    }

    pub fn is_local_time(&self) -> bool {
        self.kind == TimeKind::Local
    }

    pub fn naive(&self) -> NaiveDateTime {
        self.date_time
    }

    pub fn elements(&self) -> TimeElements {
        TimeElements {
            year: self.date_time.year() as i64,
            month: self.date_time.month() as i64,
            day: self.date_time.day() as i64,
            hour: self.date_time.hour() as i64,
            minute: self.date_time.minute() as i64,
            second: self.date_time.second() as i64,
        }
    }

    /// Reconcile against the offset of the host that wrote the log.
    /// Absolute timestamps ignore `local_offset`.
    pub fn to_utc(&self, local_offset: FixedOffset) -> Option<DateTime<Utc>> {
        match self.kind {
            TimeKind::Local => local_offset
                .from_local_datetime(&self.date_time)
                .single()
                .map(|dt| dt.with_timezone(&Utc)),
            TimeKind::Absolute => Some(Utc.from_utc_datetime(&self.date_time)),
        }
    }

    /// Wall-clock value in the display timezone, for sinks that cannot carry
    /// an offset.
    pub fn to_display(&self, local_offset: FixedOffset, display_offset: FixedOffset) -> Option<NaiveDateTime> {
        self.to_utc(local_offset)
            .map(|utc| utc.with_timezone(&display_offset).naive_local())
    }
}

fn component(value: i64, name: &str) -> Result<u32, ParseError> {
    u32::try_from(value)
        .map_err(|_| ParseError::TimeParse(format!("{} out of range: {}", name, value)))
}

/// Parse `UTC`, `Z`, `+HH:MM`, `-HH:MM` or `+HHMM` into a fixed offset.
pub fn parse_utc_offset(text: &str) -> Option<FixedOffset> {
    let text = text.trim();
    if text.eq_ignore_ascii_case("utc") || text == "Z" {
        return FixedOffset::east_opt(0);
    }

    let (sign, rest) = match text.as_bytes().first()? {
        b'+' => (1, &text[1..]),
        b'-' => (-1, &text[1..]),
        _ => return None,
    };

    let digits: String = rest.chars().filter(|c| *c != ':').collect();
    if digits.len() != 4 || !digits.chars().all(|c| c.is_ascii_digit()) {
        return None;
    }

    let hours: i32 = digits[..2].parse().ok()?;
    let minutes: i32 = digits[2..].parse().ok()?;
    if hours > 23 || minutes > 59 {
        return None;
    }

    FixedOffset::east_opt(sign * (hours * 3600 + minutes * 60))
}
