//! Parsing of the server's date format
//!
//! The API formats every date as `Tue Mar 13 00:12:41 +0000 2007`, always in
//! UTC.

use chrono::{DateTime, NaiveDate, NaiveTime, Utc};
use thiserror::Error;

const MONTHS: [&str; 12] = [
    "Jan", "Feb", "Mar", "Apr", "May", "Jun", "Jul", "Aug", "Sep", "Oct", "Nov", "Dec",
];

/// Why a server timestamp could not be parsed
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum TimestampError {
    /// Not six space-separated fields, or a time without three parts
    #[error("unexpected timestamp layout: '{0}'")]
    Layout(String),
    /// Month abbreviation not in the table
    #[error("unknown month '{0}'")]
    Month(String),
    /// A numeric field did not parse
    #[error("invalid number '{0}' in timestamp")]
    Number(String),
    /// Fields parsed but do not form a valid date or time
    #[error("timestamp out of range: '{0}'")]
    Range(String),
}

/// Parse a server timestamp into a UTC date/time
pub fn parse_server_time(input: &str) -> Result<DateTime<Utc>, TimestampError> {
    let fields: Vec<&str> = input.split(' ').collect();
    let [_weekday, month, day, time, _offset, year] = fields[..] else {
        return Err(TimestampError::Layout(input.to_string()));
    };

    let month = MONTHS
        .iter()
        .position(|m| *m == month)
        .ok_or_else(|| TimestampError::Month(month.to_string()))?;
    let day = number(day)?;
    let year = number(year)?;

    let time: Vec<&str> = time.split(':').collect();
    let [hour, minute, second] = time[..] else {
        return Err(TimestampError::Layout(input.to_string()));
    };

    let date = NaiveDate::from_ymd_opt(year as i32, month as u32 + 1, day)
        .ok_or_else(|| TimestampError::Range(input.to_string()))?;
    let time = NaiveTime::from_hms_opt(number(hour)?, number(minute)?, number(second)?)
        .ok_or_else(|| TimestampError::Range(input.to_string()))?;

    Ok(date.and_time(time).and_utc())
}

fn number(field: &str) -> Result<u32, TimestampError> {
    field
        .parse()
        .map_err(|_| TimestampError::Number(field.to_string()))
}
