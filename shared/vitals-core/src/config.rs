//! Configuration shared by every job
//!
//! Resolved once at startup and handed to each component by reference.

use std::path::PathBuf;
use std::str::FromStr;
use std::time::Duration;

use crate::error::{Result, VitalsError};

/// Which wide-column backend the loader talks to.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum BigtableBackend {
    /// Cloud Bigtable through its REST API.
    Cloud,
    /// In-process store, for local runs without a project.
    Memory,
}

impl FromStr for BigtableBackend {
    type Err = VitalsError;

    fn from_str(s: &str) -> Result<Self> {
        match s.trim().to_ascii_lowercase().as_str() {
            "cloud" => Ok(Self::Cloud),
            "memory" => Ok(Self::Memory),
            other => Err(VitalsError::Config(format!(
                "Invalid BIGTABLE_BACKEND '{}', expected 'cloud' or 'memory'",
                other
            ))),
        }
    }
}

/// What the cleaner does with a missing heart rate that has no earlier
/// observation to average.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum LeadingGapPolicy {
    #[default]
    Drop,
    /// Use the next observed heart rate of the same sensor.
    BackFill,
}

impl FromStr for LeadingGapPolicy {
    type Err = VitalsError;

    fn from_str(s: &str) -> Result<Self> {
        match s.trim().to_ascii_lowercase().as_str() {
            "drop" => Ok(Self::Drop),
            "backfill" | "back-fill" => Ok(Self::BackFill),
            other => Err(VitalsError::Config(format!(
                "Invalid LEADING_HR_POLICY '{}', expected 'drop' or 'backfill'",
                other
            ))),
        }
    }
}

#[derive(Debug, Clone)]
pub struct PipelineConfig {
    pub project_id: String,
    pub bq_dataset: String,
    pub bq_table: String,
    pub bq_location: String,
    pub bigtable_instance: String,
    pub bigtable_table: String,
    pub bigtable_backend: BigtableBackend,
    pub vertex_location: String,
    pub pipeline_root: String,
    pub trainer_image: String,
    pub data_dir: PathBuf,
    pub raw_file: String,
    pub log_dir: PathBuf,
    pub json_logs: bool,
    pub leading_gap_policy: LeadingGapPolicy,
    pub http_timeout: Duration,
}

impl PipelineConfig {
    pub fn from_env() -> Result<Self> {
        Self::from_lookup(|key| std::env::var(key).ok())
    }

    /// Build the configuration from an arbitrary key lookup.
    pub fn from_lookup<F>(lookup: F) -> Result<Self>
    where
        F: Fn(&str) -> Option<String>,
    {
        let var = |key: &str, default: &str| {
            lookup(key)
                .filter(|v| !v.trim().is_empty())
                .unwrap_or_else(|| default.to_string())
        };

        let project_id = var("PROJECT_ID", "patient-monitoring-dev");
        let pipeline_root = var(
            "PIPELINE_ROOT",
            &format!("gs://{}-pipeline-artifacts", project_id),
        );

        let http_timeout_secs: u64 = var("HTTP_TIMEOUT_SECS", "60")
            .parse()
            .map_err(|e| VitalsError::Config(format!("Invalid HTTP_TIMEOUT_SECS: {}", e)))?;

        Ok(Self {
            bq_dataset: var("BQ_DATASET", "patient_monitoring"),
            bq_table: var("BQ_TABLE", "patient_vitals"),
            bq_location: var("BQ_LOCATION", "US"),
            bigtable_instance: var("INSTANCE_ID", "test-instance"),
            bigtable_table: var("TABLE_ID", "patient_vitals"),
            bigtable_backend: var("BIGTABLE_BACKEND", "memory").parse()?,
            vertex_location: var("VERTEX_LOCATION", "europe-west4"),
            pipeline_root,
            trainer_image: var(
                "TRAINER_IMAGE",
                "us-docker.pkg.dev/vertex-ai/training/sklearn-cpu.1-3:latest",
            ),
            data_dir: PathBuf::from(var("DATA_DIR", "data")),
            raw_file: var("RAW_FILE", "vitals_raw.txt"),
            log_dir: PathBuf::from(var("LOG_DIR", "logs")),
            json_logs: matches!(var("JSON_LOGS", "false").as_str(), "true" | "1"),
            leading_gap_policy: var("LEADING_HR_POLICY", "drop").parse()?,
            http_timeout: Duration::from_secs(http_timeout_secs),
            project_id,
        })
    }

    pub fn raw_path(&self) -> PathBuf {
        self.data_dir.join(&self.raw_file)
    }

    /// Where the cleaner writes and the loaders read.
    pub fn cleaned_path(&self) -> PathBuf {
        self.data_dir.join(crate::domain::CLEANED_FILE_NAME)
    }

    /// `project.dataset.table` as used in standard SQL.
    pub fn bq_table_ref(&self) -> String {
        format!("{}.{}.{}", self.project_id, self.bq_dataset, self.bq_table)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::collections::HashMap;

    fn lookup(pairs: &[(&str, &str)]) -> impl Fn(&str) -> Option<String> {
        let map: HashMap<String, String> = pairs
            .iter()
            .map(|(k, v)| (k.to_string(), v.to_string()))
            .collect();
        move |key| map.get(key).cloned()
    }

    #[test]
    fn test_defaults() {
        let config = PipelineConfig::from_lookup(|_| None).unwrap();
        assert_eq!(config.project_id, "patient-monitoring-dev");
        assert_eq!(config.bq_dataset, "patient_monitoring");
        assert_eq!(config.bq_table, "patient_vitals");
        assert_eq!(config.bigtable_instance, "test-instance");
        assert_eq!(config.bigtable_backend, BigtableBackend::Memory);
        assert_eq!(config.vertex_location, "europe-west4");
        assert_eq!(config.pipeline_root, "gs://patient-monitoring-dev-pipeline-artifacts");
        assert_eq!(config.leading_gap_policy, LeadingGapPolicy::Drop);
        assert_eq!(config.http_timeout, Duration::from_secs(60));
        assert_eq!(config.raw_path(), PathBuf::from("data/vitals_raw.txt"));
        assert_eq!(config.cleaned_path(), PathBuf::from("data/vitals_cleaned.jsonl"));
    }

    #[test]
    fn test_overrides_and_derived_pipeline_root() {
        let config = PipelineConfig::from_lookup(lookup(&[
            ("PROJECT_ID", "icu-prod"),
            ("BQ_DATASET", "wards"),
            ("BIGTABLE_BACKEND", "Cloud"),
            ("LEADING_HR_POLICY", "backfill"),
        ]))
        .unwrap();

        assert_eq!(config.pipeline_root, "gs://icu-prod-pipeline-artifacts");
        assert_eq!(config.bq_table_ref(), "icu-prod.wards.patient_vitals");
        assert_eq!(config.bigtable_backend, BigtableBackend::Cloud);
        assert_eq!(config.leading_gap_policy, LeadingGapPolicy::BackFill);
    }

    #[test]
    fn test_blank_values_fall_back_to_defaults() {
        let config = PipelineConfig::from_lookup(lookup(&[("PROJECT_ID", "  ")])).unwrap();
        assert_eq!(config.project_id, "patient-monitoring-dev");

        let config = PipelineConfig::from_lookup(lookup(&[("LOG_DIR", ""), ("JSON_LOGS", "1")])).unwrap();
        assert_eq!(config.log_dir, PathBuf::from("logs"));
        assert!(config.json_logs);
    }

    #[test]
    fn test_invalid_values_are_config_errors() {
        let err = PipelineConfig::from_lookup(lookup(&[("BIGTABLE_BACKEND", "emulator")]))
            .unwrap_err();
        assert_eq!(err.error_code(), "CONFIG_ERROR");

        let err = PipelineConfig::from_lookup(lookup(&[("HTTP_TIMEOUT_SECS", "soon")]))
            .unwrap_err();
        assert!(matches!(err, VitalsError::Config(_)));
    }
}
