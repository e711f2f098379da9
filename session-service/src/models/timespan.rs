//! `[d.]hh:mm[:ss[.fffffff]]` time spans, the wire format for session durations.
//!
//! A bare integer is read as a number of days. Fractions are kept to the
//! millisecond, which is the resolution sessions are stored at.

use std::time::Duration;
use thiserror::Error;

#[derive(Debug, Error, PartialEq, Eq)]
pub enum TimespanError {
    #[error("Time span is empty")]
    Empty,
    #[error("Time span '{0}' is not in [d.]hh:mm[:ss[.fff]] format")]
    Format(String),
    #[error("Time span component '{0}' is out of range")]
    OutOfRange(String),
}

const SECS_PER_MINUTE: u64 = 60;
const SECS_PER_HOUR: u64 = 60 * SECS_PER_MINUTE;
const SECS_PER_DAY: u64 = 24 * SECS_PER_HOUR;

pub fn parse_timespan(input: &str) -> Result<Duration, TimespanError> {
    let s = input.trim();
    if s.is_empty() {
        return Err(TimespanError::Empty);
    }

    if s.bytes().all(|b| b.is_ascii_digit()) {
        let days = number(s, u64::MAX / SECS_PER_DAY - 1)?;
        return Ok(Duration::from_secs(days * SECS_PER_DAY));
    }

    let format_err = || TimespanError::Format(s.to_string());

    // A day prefix is separated by '.' and must come before the first ':'.
    let first_colon = s.find(':').ok_or_else(format_err)?;
    let (days, clock) = match s[..first_colon].find('.') {
        Some(dot) => (number(&s[..dot], u64::MAX / SECS_PER_DAY - 1)?, &s[dot + 1..]),
        None => (0, s),
    };

    let parts: Vec<&str> = clock.split(':').collect();
    let (hours, minutes, seconds) = match parts.as_slice() {
        [h, m] => (*h, *m, None),
        [h, m, sec] => (*h, *m, Some(*sec)),
        _ => return Err(format_err()),
    };

    let hours = number(hours, 23)?;
    let minutes = number(minutes, 59)?;
    let (seconds, millis) = match seconds {
        None => (0, 0),
        Some(sec) => match sec.split_once('.') {
            Some((whole, fraction)) => (number(whole, 59)?, fraction_millis(fraction, s)?),
            None => (number(sec, 59)?, 0),
        },
    };

    let total_secs = days * SECS_PER_DAY + hours * SECS_PER_HOUR + minutes * SECS_PER_MINUTE + seconds;
    Ok(Duration::from_secs(total_secs) + Duration::from_millis(millis))
}

pub fn format_timespan(duration: Duration) -> String {
    let total = duration.as_secs();
    let days = total / SECS_PER_DAY;
    let hours = (total % SECS_PER_DAY) / SECS_PER_HOUR;
    let minutes = (total % SECS_PER_HOUR) / SECS_PER_MINUTE;
    let seconds = total % SECS_PER_MINUTE;
    let millis = duration.subsec_millis();

    let mut out = String::new();
    if days > 0 {
        out.push_str(&format!("{}.", days));
    }
    out.push_str(&format!("{:02}:{:02}:{:02}", hours, minutes, seconds));
    if millis > 0 {
        out.push_str(&format!(".{:03}", millis));
    }
    out
}

fn number(part: &str, max: u64) -> Result<u64, TimespanError> {
    if part.is_empty() || !part.bytes().all(|b| b.is_ascii_digit()) {
        return Err(TimespanError::Format(part.to_string()));
    }
    let value: u64 = part
        .parse()
        .map_err(|_| TimespanError::OutOfRange(part.to_string()))?;
    if value > max {
        return Err(TimespanError::OutOfRange(part.to_string()));
    }
    Ok(value)
}

fn fraction_millis(fraction: &str, whole: &str) -> Result<u64, TimespanError> {
    if fraction.is_empty() || fraction.len() > 7 || !fraction.bytes().all(|b| b.is_ascii_digit()) {
        return Err(TimespanError::Format(whole.to_string()));
    }
    let padded = format!("{:0<3}", &fraction[..fraction.len().min(3)]);
    padded
        .parse()
        .map_err(|_| TimespanError::Format(whole.to_string()))
}

/// Serde adapter rendering a `Duration` as a time span string.
pub mod serde_timespan {
    use super::{format_timespan, parse_timespan};
    use serde::{Deserialize, Deserializer, Serializer};
    use std::time::Duration;

    pub fn serialize<S>(duration: &Duration, serializer: S) -> Result<S::Ok, S::Error>
    where
        S: Serializer,
    {
        serializer.serialize_str(&format_timespan(*duration))
    }

    pub fn deserialize<'de, D>(deserializer: D) -> Result<Duration, D::Error>
    where
        D: Deserializer<'de>,
    {
        let raw = String::deserialize(deserializer)?;
        parse_timespan(&raw).map_err(serde::de::Error::custom)
    }
}
