//! Wide-Column Loader
//!
//! Loads the cleaned vitals into hour-bucketed Bigtable rows, one cell
//! version per reading, then runs a demo "last hour" query.

mod bucket;
mod load;
mod query;

use std::sync::Arc;

use chrono::Duration;
use tracing::{error, info, warn};
use vitals_bigtable_sdk::{BigtableClient, MemoryStore, TablePath, WideColumnStore};
use vitals_core::jsonl::read_records;
use vitals_core::{BigtableBackend, GcpTokenSource, PipelineConfig, Reading, Result};
use vitals_telemetry::Progress;

use load::{load_readings, recreate_table, CF_META, CF_VITALS};
use query::query_vitals;

/// Samples printed by the demo query.
const DEMO_SAMPLES: usize = 5;

#[tokio::main(flavor = "current_thread")]
async fn main() -> anyhow::Result<()> {
    let config = PipelineConfig::from_env()?;
    let _telemetry = vitals_telemetry::init("widecolumn-loader", &config)?;

    info!(backend = ?config.bigtable_backend, "Starting wide-column loader");

    let progress = Progress::new();
    match run(&config, &progress).await {
        Ok(()) => Ok(()),
        Err(e) if e.is_skippable() => {
            warn!(code = e.error_code(), "Bigtable load skipped: {}", e);
            if let Some(hint) = e.hint() {
                warn!("{}", hint);
            }
            Ok(())
        }
        Err(e) => {
            error!(code = e.error_code(), "{}", e);
            Err(e.into())
        }
    }
}

async fn connect(config: &PipelineConfig) -> Result<Box<dyn WideColumnStore>> {
    let store: Box<dyn WideColumnStore> = match config.bigtable_backend {
        BigtableBackend::Memory => Box::new(MemoryStore::new(&config.bigtable_table)),
        BigtableBackend::Cloud => {
            let tokens = GcpTokenSource::discover().await?;
            let path = TablePath::new(
                &config.project_id,
                &config.bigtable_instance,
                &config.bigtable_table,
            );
            Box::new(BigtableClient::new(Arc::new(tokens), path, config.http_timeout)?)
        }
    };
    Ok(store)
}

async fn run(config: &PipelineConfig, progress: &Progress) -> Result<()> {
    progress.step("Connecting to Bigtable ...");
    let store = connect(config).await?;

    progress.step("Creating table ...");
    recreate_table(&*store).await?;
    progress.substep(
        1,
        format!(
            "Created table \"{}\" [{}, {}]",
            config.bigtable_table, CF_VITALS, CF_META
        ),
    );

    progress.step("Loading cleaned data ...");
    let readings: Vec<Reading> = read_records(&config.cleaned_path())?;
    let summary = load_readings(&*store, &readings).await?;
    progress.substep(
        2,
        format!(
            "{} events ==> {} rows ({} batches)",
            summary.events, summary.rows, summary.batches
        ),
    );

    let Some(first) = readings.first() else {
        warn!("No cleaned readings, skipping demo query");
        return Ok(());
    };
    demo_query(&*store, first, progress).await
}

/// Query the first reading's sensor for the hour ending one hour after it.
async fn demo_query(store: &dyn WideColumnStore, first: &Reading, progress: &Progress) -> Result<()> {
    let reference = first.event_time()? + Duration::hours(1);
    progress.step(format!(
        "Demo query: vitals for \"{}\", 1 h before {}",
        first.sensor_id,
        reference.to_rfc3339()
    ));

    let window = query_vitals(store, &first.sensor_id, reference).await?;
    progress.substep(
        3,
        format!(
            "{} readings returned from {} row(s)",
            window.samples.len(),
            window.rows_read
        ),
    );

    let fmt_opt = |v: Option<String>| v.unwrap_or_else(|| "-".to_string());
    for sample in window.samples.iter().take(DEMO_SAMPLES) {
        progress.substep(
            4,
            format!(
                "{}  hr={}  bt={}  spO2={}",
                sample.timestamp.to_rfc3339(),
                sample.heart_rate,
                fmt_opt(sample.body_temperature.map(|v| v.to_string())),
                fmt_opt(sample.spo2.map(|v| v.to_string())),
            ),
        );
    }
    if window.samples.len() > DEMO_SAMPLES {
        progress.substep(5, format!("... and {} more", window.samples.len() - DEMO_SAMPLES));
    }
    Ok(())
}
