//! Load the cleaned readings into the warehouse table

use std::time::Duration;

use serde::Serialize;
use tracing::info;
use vitals_bigquery_sdk::{wait_for_job, DatasetRef, TableRef, WarehouseApi};
use vitals_core::jsonl::read_records;
use vitals_core::{millis_to_rfc3339, PipelineConfig, Reading, Result};
use vitals_telemetry::Progress;

use crate::schema::{load_config, table_definition};

/// How often a running load job is polled.
pub const JOB_POLL_INTERVAL: Duration = Duration::from_secs(1);

/// A cleaned reading as it goes into the load payload.
#[derive(Debug, Serialize)]
struct WarehouseRow<'a> {
    event_timestamp: String,
    sensor_id: &'a str,
    heart_rate: f64,
    body_temperature: f64,
    #[serde(rename = "spO2")]
    spo2: i64,
    battery_level: i64,
    heart_rate_imputed: bool,
}

impl<'a> WarehouseRow<'a> {
    fn from_reading(reading: &'a Reading) -> Result<Self> {
        Ok(Self {
            event_timestamp: millis_to_rfc3339(reading.event_timestamp)?,
            sensor_id: &reading.sensor_id,
            heart_rate: reading.heart_rate,
            body_temperature: reading.body_temperature,
            spo2: reading.spo2,
            battery_level: reading.battery_level,
            heart_rate_imputed: reading.heart_rate_imputed,
        })
    }
}

/// Newline-delimited JSON body for a load job.
pub fn to_ndjson(readings: &[Reading]) -> Result<Vec<u8>> {
    let mut body = Vec::new();
    for reading in readings {
        serde_json::to_writer(&mut body, &WarehouseRow::from_reading(reading)?)?;
        body.push(b'\n');
    }
    Ok(body)
}

#[derive(Debug, Clone)]
pub struct LoadReport {
    pub table: TableRef,
    pub records_read: usize,
    pub table_rows: u64,
}

/// Recreate the table and replace its contents with the cleaned file.
pub async fn load_warehouse<A>(
    api: &A,
    config: &PipelineConfig,
    progress: &Progress,
    poll_interval: Duration,
) -> Result<LoadReport>
where
    A: WarehouseApi + ?Sized,
{
    let dataset = DatasetRef::new(&config.project_id, &config.bq_dataset);
    let table = dataset.table(&config.bq_table);

    progress.step("Ensuring dataset exists ...");
    api.ensure_dataset(&dataset, &config.bq_location).await?;
    progress.detail(format!("Dataset \"{}\" ready.", config.bq_dataset));

    progress.step("Creating table ...");
    if api.delete_table(&table).await? {
        info!(table = %table, "Dropped existing table");
    }
    api.create_table(&table, &table_definition()).await?;
    progress.detail(format!(
        "Created table \"{}\" (partitioned by DAY, clustered by sensor_id).",
        table
    ));

    progress.step("Reading cleaned data ...");
    let readings: Vec<Reading> = read_records(&config.cleaned_path())?;
    progress.detail(format!("{} records read.", readings.len()));

    progress.step("Loading into BigQuery ...");
    let job = api
        .start_load(&table, &load_config(), to_ndjson(&readings)?)
        .await?;
    info!(job_id = %job.job_id, "Load job started");
    wait_for_job(api, &job, poll_interval).await?;

    let table_rows = api.table_row_count(&table).await?;
    progress.detail(format!("Loaded {} rows into {}.", table_rows, table));

    Ok(LoadReport {
        table,
        records_read: readings.len(),
        table_rows,
    })
}
