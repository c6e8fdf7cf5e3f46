//! Vitals Cleaner
//!
//! Turns the raw sensor feed into the cleaned intermediate file:
//! - Drops unparseable and future timestamps
//! - Clamps body temperature into a physiological range
//! - Imputes missing heart rates per sensor

mod clean;
mod impute;
mod raw;

use tracing::{error, info};
use vitals_core::{PipelineConfig, Result};
use vitals_telemetry::Progress;

use clean::{ingest_and_clean, CleanOptions, CleanReport};

fn main() -> anyhow::Result<()> {
    let config = PipelineConfig::from_env()?;
    let telemetry = vitals_telemetry::init("vitals-cleaner", &config)?;

    info!("Starting vitals cleaner, logging to {}", telemetry.log_file().display());

    let progress = Progress::new();
    if let Err(e) = run(&config, &progress) {
        error!(code = e.error_code(), "{}", e);
        if let Some(hint) = e.hint() {
            error!("{}", hint);
        }
        return Err(e.into());
    }
    Ok(())
}

fn run(config: &PipelineConfig, progress: &Progress) -> Result<CleanReport> {
    let input = config.raw_path();
    progress.step(format!("Ingesting and cleaning {}", input.display()));

    let options = CleanOptions::new(config.leading_gap_policy);
    let report = ingest_and_clean(&input, &options)?;

    progress.substep(1, format!("Cleaned rows: {}", report.row_count));
    progress.substep(2, format!("Imputed heart rates: {}", report.imputed_count));
    progress.substep(
        3,
        format!(
            "Dropped rows: {} (malformed {}, bad timestamp {}, future {}, incomplete {}, unfillable {})",
            report.dropped.total(),
            report.dropped.malformed,
            report.dropped.invalid_timestamp,
            report.dropped.future_timestamp,
            report.dropped.incomplete,
            report.dropped.unfillable,
        ),
    );
    progress.substep(4, format!("Output written to {}", report.output_path.display()));

    Ok(report)
}
