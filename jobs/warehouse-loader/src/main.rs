//! Warehouse Loader
//!
//! Loads the cleaned vitals file into a day-partitioned, sensor-clustered
//! BigQuery table. The table is recreated on every run.

mod loader;
mod schema;


use std::sync::Arc;

use tracing::{error, info, warn};
use vitals_bigquery_sdk::BigQueryClient;
use vitals_core::{GcpTokenSource, PipelineConfig, Result};
use vitals_telemetry::Progress;

use loader::{load_warehouse, LoadReport, JOB_POLL_INTERVAL};

#[tokio::main(flavor = "current_thread")]
async fn main() -> anyhow::Result<()> {
    let config = PipelineConfig::from_env()?;
    let _telemetry = vitals_telemetry::init("warehouse-loader", &config)?;

    info!("Starting warehouse loader for {}", config.bq_table_ref());

    let progress = Progress::new();
    match run(&config, &progress).await {
        Ok(report) => {
            info!("");
            info!("Done. Run analytical queries in the BigQuery console or via");
            info!(
                "  bq query --use_legacy_sql=false 'SELECT sensor_id, AVG(heart_rate) FROM `{}` GROUP BY sensor_id'",
                report.table
            );
            Ok(())
        }
        Err(e) if e.is_skippable() => {
            warn!(code = e.error_code(), "BigQuery load skipped: {}", e);
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

async fn run(config: &PipelineConfig, progress: &Progress) -> Result<LoadReport> {
    progress.step("Connecting to BigQuery ...");
    let tokens = GcpTokenSource::discover().await?;
    let client = BigQueryClient::new(Arc::new(tokens), &config.bq_location, config.http_timeout)?;

    load_warehouse(&client, config, progress, JOB_POLL_INTERVAL).await
}
