//! Tracing Setup

use std::fs::{self, File};
use std::path::PathBuf;
use std::sync::Mutex;

use tracing_subscriber::fmt::{self, format::Writer, time::FormatTime};
use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt, EnvFilter};

use crate::{TelemetryConfig, TelemetryError};

/// Prefixes every line with `[YYYY-MM-DD HH:MM:SS] [job]`.
#[derive(Debug, Clone)]
struct JobTimer {
    job: String,
}

impl FormatTime for JobTimer {
    fn format_time(&self, w: &mut Writer<'_>) -> std::fmt::Result {
        write!(
            w,
            "[{}] [{}]",
            chrono::Local::now().format("%Y-%m-%d %H:%M:%S"),
            self.job
        )
    }
}

/// Initialize tracing with a console sink and a per-job log file.
///
/// The log file is truncated on every run. Returns its path.
pub fn init_tracing(job_name: &str, config: &TelemetryConfig) -> Result<PathBuf, TelemetryError> {
    let env_filter = EnvFilter::try_from_default_env()
        .unwrap_or_else(|_| EnvFilter::new(&config.log_level));

    fs::create_dir_all(&config.log_dir)
        .map_err(|e| TelemetryError::LogFile(format!("{}: {}", config.log_dir.display(), e)))?;
    let log_path = config.log_file(job_name);
    let file = File::create(&log_path)
        .map_err(|e| TelemetryError::LogFile(format!("{}: {}", log_path.display(), e)))?;

    let timer = JobTimer {
        job: job_name.to_string(),
    };

    // Build subscriber based on JSON logging preference
    if config.json_logs {
        let console_layer = fmt::layer()
            .json()
            .with_target(true);
        let file_layer = fmt::layer()
            .json()
            .with_ansi(false)
            .with_writer(Mutex::new(file));

        tracing_subscriber::registry()
            .with(env_filter)
            .with(console_layer)
            .with(file_layer)
            .try_init()
            .map_err(|e| TelemetryError::TracingInit(e.to_string()))?;
    } else {
        let console_layer = fmt::layer()
            .with_timer(timer.clone())
            .with_target(false);
        let file_layer = fmt::layer()
            .with_timer(timer)
            .with_target(false)
            .with_ansi(false)
            .with_writer(Mutex::new(file));

        tracing_subscriber::registry()
            .with(env_filter)
            .with(console_layer)
            .with(file_layer)
            .try_init()
            .map_err(|e| TelemetryError::TracingInit(e.to_string()))?;
    }

    tracing::debug!(
        job = job_name,
        log_level = %config.log_level,
        log_file = %log_path.display(),
        "Tracing initialized"
    );

    Ok(log_path)
}
