//! Telemetry Configuration

use std::path::PathBuf;

use vitals_core::PipelineConfig;

/// Telemetry configuration
#[derive(Debug, Clone)]
pub struct TelemetryConfig {
    pub log_dir: PathBuf,
    pub log_level: String,
    pub json_logs: bool,
}

impl Default for TelemetryConfig {
    fn default() -> Self {
        Self {
            log_dir: PathBuf::from("logs"),
            log_level: "info".to_string(),
            json_logs: false,
        }
    }
}

impl From<&PipelineConfig> for TelemetryConfig {
    /// Level defaults to `info`; `RUST_LOG` still overrides it through the filter.
    fn from(config: &PipelineConfig) -> Self {
        Self {
            log_dir: config.log_dir.clone(),
            json_logs: config.json_logs,
            ..Self::default()
        }
    }
}

impl TelemetryConfig {
    pub fn log_file(&self, job_name: &str) -> PathBuf {
        self.log_dir.join(format!("{}.log", job_name))
    }
}
