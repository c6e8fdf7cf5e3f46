//! Ingest raw readings and write the cleaned intermediate file

use std::fs::File;
use std::io::{BufRead, BufReader};
use std::path::{Path, PathBuf};

use chrono::{DateTime, Utc};
use tracing::{debug, warn};
use vitals_core::jsonl::{require_file, write_records};
use vitals_core::{LeadingGapPolicy, Reading, Result, CLEANED_FILE_NAME};

use crate::impute::impute_series;
use crate::raw::{parse_event_timestamp, RawReading};

pub const MIN_BODY_TEMPERATURE: f64 = 27.0;
pub const MAX_BODY_TEMPERATURE: f64 = 42.6;

#[derive(Debug, Clone)]
pub struct CleanOptions {
    /// Readings stamped after this instant are discarded.
    pub now: DateTime<Utc>,
    pub leading_gap_policy: LeadingGapPolicy,
}

impl CleanOptions {
    pub fn new(leading_gap_policy: LeadingGapPolicy) -> Self {
        Self {
            now: Utc::now(),
            leading_gap_policy,
        }
    }
}

/// Why input records did not make it to the output.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct DropCounts {
    pub malformed: usize,
    pub invalid_timestamp: usize,
    pub future_timestamp: usize,
    pub incomplete: usize,
    /// Missing heart rate with nothing to impute from.
    pub unfillable: usize,
}

impl DropCounts {
    pub fn total(&self) -> usize {
        self.malformed
            + self.invalid_timestamp
            + self.future_timestamp
            + self.incomplete
            + self.unfillable
    }
}

#[derive(Debug, Clone)]
pub struct CleanReport {
    pub output_path: PathBuf,
    pub row_count: usize,
    pub imputed_count: usize,
    pub dropped: DropCounts,
}

/// Clean `input` and write `vitals_cleaned.jsonl` beside it.
pub fn ingest_and_clean(input: &Path, options: &CleanOptions) -> Result<CleanReport> {
    require_file(input)?;

    let (raw, malformed) = read_raw(input)?;
    if malformed > 0 {
        warn!("Skipped {} malformed line(s) in {}", malformed, input.display());
    }

    let (readings, mut dropped) = clean_readings(raw, options);
    dropped.malformed = malformed;

    let output_path = input
        .parent()
        .unwrap_or_else(|| Path::new("."))
        .join(CLEANED_FILE_NAME);
    write_records(&output_path, &readings)?;

    Ok(CleanReport {
        output_path,
        row_count: readings.len(),
        imputed_count: readings.iter().filter(|r| r.heart_rate_imputed).count(),
        dropped,
    })
}

/// Parse every non-blank line, counting the ones that are not a JSON object
/// of the expected shape. Lines are read as bytes so invalid UTF-8 counts as
/// malformed instead of failing the read.
fn read_raw(path: &Path) -> Result<(Vec<RawReading>, usize)> {
    let mut reader = BufReader::new(File::open(path)?);
    let mut records = Vec::new();
    let mut malformed = 0;
    let mut line = Vec::new();
    let mut line_no = 0;

    loop {
        line.clear();
        if reader.read_until(b'\n', &mut line)? == 0 {
            break;
        }
        line_no += 1;
        if line.iter().all(u8::is_ascii_whitespace) {
            continue;
        }
        match serde_json::from_slice::<RawReading>(&line) {
            Ok(record) => records.push(record),
            Err(e) => {
                debug!("line {}: {}", line_no, e);
                malformed += 1;
            }
        }
    }
    Ok((records, malformed))
}

/// A record that passed validation but may still lack a heart rate.
struct Candidate {
    event_timestamp: i64,
    sensor_id: String,
    heart_rate: Option<f64>,
    body_temperature: f64,
    spo2: i64,
    battery_level: i64,
}

/// Validate, clamp, sort and impute. Output is ordered by
/// `(sensor_id, event_timestamp)`.
pub fn clean_readings(raw: Vec<RawReading>, options: &CleanOptions) -> (Vec<Reading>, DropCounts) {
    let mut dropped = DropCounts::default();
    let mut candidates = Vec::with_capacity(raw.len());

    for record in raw {
        let Some(instant) = record.event_timestamp.as_ref().and_then(parse_event_timestamp) else {
            dropped.invalid_timestamp += 1;
            continue;
        };
        if instant > options.now {
            dropped.future_timestamp += 1;
            continue;
        }

        let (Some(sensor_id), Some(temperature), Some(spo2), Some(battery)) = (
            record.sensor_id(),
            record.body_temperature,
            record.spo2,
            record.battery_level,
        ) else {
            dropped.incomplete += 1;
            continue;
        };

        candidates.push(Candidate {
            event_timestamp: instant.timestamp_millis(),
            sensor_id,
            heart_rate: record.heart_rate,
            body_temperature: temperature.clamp(MIN_BODY_TEMPERATURE, MAX_BODY_TEMPERATURE),
            spo2: spo2.round() as i64,
            battery_level: battery.round() as i64,
        });
    }

    candidates.sort_by(|a, b| {
        a.sensor_id
            .cmp(&b.sensor_id)
            .then(a.event_timestamp.cmp(&b.event_timestamp))
    });

    let mut readings = Vec::with_capacity(candidates.len());
    for group in group_by_sensor(candidates) {
        let series: Vec<Option<f64>> = group.iter().map(|c| c.heart_rate).collect();
        let filled = impute_series(&series, options.leading_gap_policy);

        for (candidate, heart_rate) in group.into_iter().zip(filled) {
            let Some(heart_rate) = heart_rate else {
                dropped.unfillable += 1;
                continue;
            };
            readings.push(Reading {
                event_timestamp: candidate.event_timestamp,
                heart_rate_imputed: candidate.heart_rate.is_none(),
                sensor_id: candidate.sensor_id,
                heart_rate,
                body_temperature: candidate.body_temperature,
                spo2: candidate.spo2,
                battery_level: candidate.battery_level,
            });
        }
    }

    (readings, dropped)
}

/// Split sorted candidates into runs of the same sensor.
fn group_by_sensor(sorted: Vec<Candidate>) -> Vec<Vec<Candidate>> {
    let mut groups: Vec<Vec<Candidate>> = Vec::new();
    for candidate in sorted {
        match groups.last_mut() {
            Some(group) if group[0].sensor_id == candidate.sensor_id => group.push(candidate),
            _ => groups.push(vec![candidate]),
        }
    }
    groups
}
