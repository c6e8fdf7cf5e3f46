//! Core domain types used across all jobs

use chrono::{DateTime, SecondsFormat, Utc};
use serde::{Deserialize, Serialize};

use crate::error::{Result, VitalsError};

/// File name the cleaner writes next to its input.
pub const CLEANED_FILE_NAME: &str = "vitals_cleaned.jsonl";

/// Column names shared by the warehouse schema and the wide-column qualifiers.
pub mod fields {
    pub const EVENT_TIMESTAMP: &str = "event_timestamp";
    pub const SENSOR_ID: &str = "sensor_id";
    pub const HEART_RATE: &str = "heart_rate";
    pub const BODY_TEMPERATURE: &str = "body_temperature";
    pub const SPO2: &str = "spO2";
    pub const BATTERY_LEVEL: &str = "battery_level";
    pub const HEART_RATE_IMPUTED: &str = "heart_rate_imputed";
}

/// A cleaned vitals reading, one line of the intermediate file.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Reading {
    /// Epoch milliseconds, UTC.
    pub event_timestamp: i64,
    pub sensor_id: String,
    pub heart_rate: f64,
    pub body_temperature: f64,
    #[serde(rename = "spO2")]
    pub spo2: i64,
    pub battery_level: i64,
    pub heart_rate_imputed: bool,
}

impl Reading {
    pub fn event_time(&self) -> Result<DateTime<Utc>> {
        millis_to_utc(self.event_timestamp)
    }
}

pub fn millis_to_utc(ms: i64) -> Result<DateTime<Utc>> {
    DateTime::from_timestamp_millis(ms)
        .ok_or_else(|| VitalsError::Parse(format!("timestamp {} ms is out of range", ms)))
}

/// RFC 3339 rendering with millisecond precision, e.g. `2024-03-01T10:15:00.250Z`.
pub fn millis_to_rfc3339(ms: i64) -> Result<String> {
    Ok(millis_to_utc(ms)?.to_rfc3339_opts(SecondsFormat::Millis, true))
}
