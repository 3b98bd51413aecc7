//! Year-independent day/month codes and the tolerant parser that produces them.
//!
//! Upstream data mixes spreadsheet date cells, hand-typed strings and raw
//! Excel serial numbers. Everything is reduced to a canonical `DD.MM` code.

use chrono::{Datelike, Days, NaiveDate, NaiveDateTime};
use serde::{Deserialize, Deserializer, Serialize, Serializer};
use std::fmt;
use std::str::FromStr;
use thiserror::Error;

/// Formats carrying an explicit year, tried first and in this order.
const DATED_FORMATS: &[&str] = &[
    "%Y-%m-%d",
    "%Y-%m-%d %H:%M:%S",
    "%d.%m.%Y",
    "%d/%m/%Y",
    "%d-%m-%Y",
];

/// Yearless formats paired with the separator the raw text must contain.
const YEARLESS_FORMATS: &[(&str, char)] = &[
    ("%d.%m", '.'),
    ("%d/%m", '/'),
    ("%d-%m", '-'),
    ("%d.%m.", '.'),
    ("%d %m", ' '),
];

/// Yearless input is anchored to a leap year so that `29.02` is accepted.
const YEARLESS_ANCHOR_YEAR: i32 = 2000;

/// Upper bound for serial day counts; anything larger is not a plausible birthday.
const MAX_SERIAL_DAYS: f64 = 2_958_465.0;

#[derive(Debug, Clone, PartialEq, Eq, Error)]
#[error("unrecognized date value '{raw}'")]
pub struct DateParseError {
    pub raw: String,
}

impl DateParseError {
    fn new(raw: impl Into<String>) -> Self {
        Self { raw: raw.into() }
    }
}

/// Canonical day/month pair. Orders chronologically within a year.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct DateCode {
    month: u8,
    day: u8,
}

impl DateCode {
    /// Builds a code if the day exists in the month of a leap year.
    pub fn new(day: u32, month: u32) -> Option<Self> {
        NaiveDate::from_ymd_opt(YEARLESS_ANCHOR_YEAR, month, day)?;
        Some(Self {
            month: month as u8,
            day: day as u8,
        })
    }

    /// Pass-through extraction from any calendar value; the year is dropped.
    pub fn from_date<D: Datelike>(date: &D) -> Self {
        Self {
            month: date.month() as u8,
            day: date.day() as u8,
        }
    }

    pub fn day(&self) -> u32 {
        self.day as u32
    }

    pub fn month(&self) -> u32 {
        self.month as u32
    }

    pub fn is_leap_day(&self) -> bool {
        self.month == 2 && self.day == 29
    }

    /// True when a birthday with this code is celebrated on `date`.
    ///
    /// `29.02` falls back to 28 February in non-leap years.
    pub fn matches_on(&self, date: NaiveDate) -> bool {
        if *self == Self::from_date(&date) {
            return true;
        }
        self.is_leap_day()
            && date.month() == 2
            && date.day() == 28
            && NaiveDate::from_ymd_opt(date.year(), 2, 29).is_none()
    }

    /// Parses free-form text. See the module docs for the accepted shapes.
    pub fn parse(raw: &str) -> Result<Self, DateParseError> {
        let text = raw.trim();

        if text.is_empty() || text.eq_ignore_ascii_case("nan") || text.eq_ignore_ascii_case("nat") {
            return Err(DateParseError::new(raw));
        }

        for fmt in DATED_FORMATS {
            if let Some(date) = parse_dated(text, fmt) {
                return Ok(Self::from_date(&date));
            }
        }

        for (fmt, separator) in YEARLESS_FORMATS {
            if !text.contains(*separator) {
                continue;
            }
            let anchored = format!("{} {}", text, YEARLESS_ANCHOR_YEAR);
            let anchored_fmt = format!("{} %Y", fmt);
            if let Ok(date) = NaiveDate::parse_from_str(&anchored, &anchored_fmt) {
                return Ok(Self::from_date(&date));
            }
        }

        let numeric = text.chars().all(|c| c.is_ascii_digit() || c == '.')
            && text.chars().any(|c| c.is_ascii_digit());
        if numeric {
            if let Ok(serial) = text.parse::<f64>() {
                if let Some(code) = Self::from_serial(serial) {
                    return Ok(code);
                }
            }
        }

        Err(DateParseError::new(raw))
    }

    /// Excel serial date: whole days counted from 1899-12-30.
    pub fn from_serial(serial: f64) -> Option<Self> {
        if !serial.is_finite() || serial < 0.0 || serial > MAX_SERIAL_DAYS {
            return None;
        }
        let epoch = NaiveDate::from_ymd_opt(1899, 12, 30)?;
        let date = epoch.checked_add_days(Days::new(serial.floor() as u64))?;
        Some(Self::from_date(&date))
    }

    /// Parses a loosely-typed JSON cell: a `{day, month[, year]}` object,
    /// a string, or a number read as an Excel serial.
    pub fn parse_value(value: &serde_json::Value) -> Result<Self, DateParseError> {
        match value {
            serde_json::Value::Object(fields) => {
                let field = |key: &str| {
                    fields
                        .get(key)
                        .and_then(|v| v.as_u64())
                        .and_then(|n| u32::try_from(n).ok())
                };
                let day = field("day");
                let month = field("month");
                match (day, month) {
                    (Some(day), Some(month)) => Self::new(day, month)
                        .ok_or_else(|| DateParseError::new(value.to_string())),
                    _ => Err(DateParseError::new(value.to_string())),
                }
            }
            serde_json::Value::String(text) => Self::parse(text),
            serde_json::Value::Number(number) => number
                .as_f64()
                .and_then(Self::from_serial)
                .ok_or_else(|| DateParseError::new(number.to_string())),
            other => Err(DateParseError::new(other.to_string())),
        }
    }
}

fn parse_dated(text: &str, fmt: &str) -> Option<NaiveDate> {
    if fmt.contains("%H") {
        NaiveDateTime::parse_from_str(text, fmt)
            .ok()
            .map(|dt| dt.date())
    } else {
        NaiveDate::parse_from_str(text, fmt).ok()
    }
}

impl fmt::Display for DateCode {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{:02}.{:02}", self.day, self.month)
    }
}

impl FromStr for DateCode {
    type Err = DateParseError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        Self::parse(s)
    }
}

impl Serialize for DateCode {
    fn serialize<S: Serializer>(&self, serializer: S) -> Result<S::Ok, S::Error> {
        serializer.collect_str(self)
    }
}

impl<'de> Deserialize<'de> for DateCode {
    fn deserialize<D: Deserializer<'de>>(deserializer: D) -> Result<Self, D::Error> {
        let value = serde_json::Value::deserialize(deserializer)?;
        Self::parse_value(&value).map_err(serde::de::Error::custom)
    }
}
