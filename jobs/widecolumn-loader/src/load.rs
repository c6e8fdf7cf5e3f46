//! Table setup and batched row mutations

use std::collections::HashMap;
use std::time::Duration;

use tracing::{debug, info};
use vitals_bigtable_sdk::{ColumnFamilySpec, GcRule, RowMutation, WideColumnStore};
use vitals_core::{fields, Reading, Result};

use crate::bucket::row_key;

pub const CF_VITALS: &str = "vitals";
pub const CF_META: &str = "meta";

/// Hot-storage window; older cells are garbage collected by the store.
pub const CELL_MAX_AGE: Duration = Duration::from_secs(7 * 24 * 60 * 60);

/// Rows per `mutate_rows` request.
pub const MUTATION_BATCH_ROWS: usize = 50;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct LoadSummary {
    pub events: usize,
    pub rows: usize,
    pub batches: usize,
}

pub fn column_families() -> Vec<ColumnFamilySpec> {
    vec![
        ColumnFamilySpec::new(CF_VITALS, GcRule::MaxAge(CELL_MAX_AGE)),
        ColumnFamilySpec::new(CF_META, GcRule::MaxAge(CELL_MAX_AGE)),
    ]
}

/// Drop the table if present and create it empty.
pub async fn recreate_table<S>(store: &S) -> Result<()>
where
    S: WideColumnStore + ?Sized,
{
    if store.table_exists().await? {
        store.delete_table().await?;
        info!("Dropped existing wide-column table");
    }
    store.create_table(&column_families()).await?;
    Ok(())
}

/// One mutation per hour bucket, holding a cell version per reading.
/// Buckets keep the order in which they first appear.
pub fn build_mutations(readings: &[Reading]) -> Result<Vec<RowMutation>> {
    let mut index: HashMap<String, usize> = HashMap::new();
    let mut rows: Vec<RowMutation> = Vec::new();

    for reading in readings {
        let key = row_key(&reading.sensor_id, reading.event_time()?);
        let slot = *index.entry(key.clone()).or_insert_with(|| {
            rows.push(RowMutation::new(key));
            rows.len() - 1
        });

        let ts = reading.event_timestamp * 1000;
        rows[slot]
            .set_cell(CF_VITALS, fields::HEART_RATE, ts, reading.heart_rate.to_string())
            .set_cell(CF_VITALS, fields::BODY_TEMPERATURE, ts, reading.body_temperature.to_string())
            .set_cell(CF_VITALS, fields::SPO2, ts, reading.spo2.to_string())
            .set_cell(CF_META, fields::BATTERY_LEVEL, ts, reading.battery_level.to_string())
            .set_cell(CF_META, fields::HEART_RATE_IMPUTED, ts, reading.heart_rate_imputed.to_string());
    }
    Ok(rows)
}

/// Write every reading, flushing every [`MUTATION_BATCH_ROWS`] rows.
pub async fn load_readings<S>(store: &S, readings: &[Reading]) -> Result<LoadSummary>
where
    S: WideColumnStore + ?Sized,
{
    let rows = build_mutations(readings)?;

    let mut batches = 0;
    for batch in rows.chunks(MUTATION_BATCH_ROWS) {
        store.mutate_rows(batch).await?;
        batches += 1;
        debug!(batch = batches, rows = batch.len(), "Flushed mutation batch");
    }

    Ok(LoadSummary {
        events: readings.len(),
        rows: rows.len(),
        batches,
    })
}
