//! Vitals Telemetry
//!
//! Console and per-job file logging via tracing, plus the progress reporter
//! the job entry points pass to their run functions.

mod config;
mod progress;
mod tracing_setup;

use std::path::{Path, PathBuf};

use vitals_core::PipelineConfig;

pub use config::TelemetryConfig;
pub use progress::Progress;
pub use tracing_setup::init_tracing;

/// Initialize logging for a job from the resolved pipeline configuration.
pub fn init(job_name: &str, config: &PipelineConfig) -> Result<TelemetryGuard, TelemetryError> {
    let log_file = init_tracing(job_name, &TelemetryConfig::from(config))?;
    Ok(TelemetryGuard { log_file })
}

/// Returned by [`init`]; keep it alive for the duration of the job.
#[derive(Debug)]
pub struct TelemetryGuard {
    log_file: PathBuf,
}

impl TelemetryGuard {
    pub fn log_file(&self) -> &Path {
        &self.log_file
    }
}

#[derive(Debug, thiserror::Error)]
pub enum TelemetryError {
    #[error("Tracing initialization failed: {0}")]
    TracingInit(String),

    #[error("Log file error: {0}")]
    LogFile(String),
}
