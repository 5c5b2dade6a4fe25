//! Datetime parsing and formatting for downstream row timestamps
//!
//! The marketing data store expects timestamps as `MM/DD/YY, HH:MM:SS`
//! (24-hour clock, local time of the service). Inbound bulk payloads carry
//! free-form date strings, so parsing accepts the common API formats.

use chrono::{DateTime, Local, NaiveDateTime};
use thiserror::Error;

/// Format used for every `timestamp` / `Timestamp` column
pub const UPSERT_TIMESTAMP_FORMAT: &str = "%m/%d/%y, %H:%M:%S";

/// Errors that can occur during datetime operations
#[derive(Error, Debug)]
pub enum DateTimeError {
    /// Invalid datetime format provided
    #[error("Invalid datetime format: '{input}'")]
    InvalidFormat { input: String },
}

/// Centralized datetime parsing and formatting utilities
pub struct DateTimeParser;

impl DateTimeParser {
    /// Parse a datetime from the formats seen in inbound payloads.
    ///
    /// Values carrying an offset are converted to local time; naive values
    /// are taken as local time already.
    pub fn parse_flexible(datetime_str: &str) -> Result<NaiveDateTime, DateTimeError> {
        let trimmed = datetime_str.trim();

        if let Ok(dt) = DateTime::parse_from_rfc3339(trimmed) {
            return Ok(dt.with_timezone(&Local).naive_local());
        }

        if let Ok(dt) = DateTime::parse_from_str(trimmed, "%Y-%m-%dT%H:%M:%S%z") {
            return Ok(dt.with_timezone(&Local).naive_local());
        }

        let naive_formats = [
            "%Y-%m-%d %H:%M:%S",
            "%Y-%m-%d %H:%M:%S%.f",
            "%Y-%m-%dT%H:%M:%S",
            "%Y-%m-%dT%H:%M:%S%.f",
            "%m/%d/%Y %H:%M:%S",
            "%m/%d/%Y, %H:%M:%S",
        ];

        for format in &naive_formats {
            if let Ok(naive_dt) = NaiveDateTime::parse_from_str(trimmed, format) {
                return Ok(naive_dt);
            }
        }

        Err(DateTimeError::InvalidFormat {
            input: datetime_str.to_string(),
        })
    }

    /// Format a local datetime for the upsert payload
    pub fn format_for_upsert(dt: &NaiveDateTime) -> String {
        dt.format(UPSERT_TIMESTAMP_FORMAT).to_string()
    }

    /// Current local time formatted for the upsert payload
    pub fn now_for_upsert() -> String {
        Self::format_for_upsert(&Local::now().naive_local())
    }
}
