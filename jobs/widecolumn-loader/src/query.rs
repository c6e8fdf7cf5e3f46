//! "All vitals for sensor X in the last hour"

use std::collections::HashMap;

use chrono::{DateTime, Duration, Utc};
use vitals_bigtable_sdk::{Cell, Row, RowFilter, WideColumnStore};
use vitals_core::{fields, millis_to_utc, Result, VitalsError};

use crate::bucket::bucket_keys;
use crate::load::CF_VITALS;

#[derive(Debug, Clone, PartialEq)]
pub struct VitalsSample {
    pub timestamp: DateTime<Utc>,
    pub heart_rate: f64,
    pub body_temperature: Option<f64>,
    pub spo2: Option<i64>,
}

#[derive(Debug, Clone, Default)]
pub struct VitalsWindow {
    /// Ascending by timestamp.
    pub samples: Vec<VitalsSample>,
    /// Buckets that returned a row.
    pub rows_read: usize,
}

/// Samples of `sensor_id` with `reference - 1h < timestamp <= reference`.
pub async fn query_vitals<S>(
    store: &S,
    sensor_id: &str,
    reference: DateTime<Utc>,
) -> Result<VitalsWindow>
where
    S: WideColumnStore + ?Sized,
{
    let start = reference - Duration::hours(1);

    // Cell timestamps have millisecond granularity, so (start, reference]
    // equals [start + 1ms, reference + 1ms).
    let filter = RowFilter::TimestampRange {
        start_micros: Some((start.timestamp_millis() + 1) * 1000),
        end_micros: Some((reference.timestamp_millis() + 1) * 1000),
    };

    let mut window = VitalsWindow::default();
    for key in bucket_keys(sensor_id, start, reference) {
        if let Some(row) = store.read_row(&key, Some(&filter)).await? {
            window.rows_read += 1;
            window.samples.extend(samples_from_row(&row)?);
        }
    }
    window.samples.sort_by_key(|s| s.timestamp);
    Ok(window)
}

/// Join the vitals columns on cell timestamp. Each heart-rate cell yields
/// one sample; the other columns are `None` where no cell shares its stamp.
fn samples_from_row(row: &Row) -> Result<Vec<VitalsSample>> {
    let temperatures = by_timestamp(row.cells(CF_VITALS, fields::BODY_TEMPERATURE));
    let saturations = by_timestamp(row.cells(CF_VITALS, fields::SPO2));

    row.cells(CF_VITALS, fields::HEART_RATE)
        .iter()
        .map(|cell| -> Result<VitalsSample> {
            let ts = cell.timestamp_micros;
            Ok(VitalsSample {
                timestamp: millis_to_utc(ts.div_euclid(1000))?,
                heart_rate: parse_cell(&row.key, cell)?,
                body_temperature: temperatures.get(&ts).map(|c| parse_cell(&row.key, c)).transpose()?,
                spo2: saturations.get(&ts).map(|c| parse_cell(&row.key, c)).transpose()?,
            })
        })
        .collect()
}

fn by_timestamp(cells: &[Cell]) -> HashMap<i64, &Cell> {
    cells.iter().map(|c| (c.timestamp_micros, c)).collect()
}

fn parse_cell<T: std::str::FromStr>(row_key: &str, cell: &Cell) -> Result<T> {
    cell.value_str()
        .and_then(|s| s.parse().ok())
        .ok_or_else(|| {
            VitalsError::Parse(format!(
                "row {}: unreadable cell value {:?} at {}",
                row_key,
                String::from_utf8_lossy(&cell.value),
                cell.timestamp_micros
            ))
        })
}
