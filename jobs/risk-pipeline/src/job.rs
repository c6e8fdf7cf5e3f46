//! Dry-run pipeline job: the request that would start a run, never sent

use std::collections::BTreeMap;

use chrono::{DateTime, Utc};
use serde::Serialize;
use serde_json::Value;
use tracing::debug;
use vitals_core::{AccessTokenSource, PipelineConfig, Result, VitalsError};

use crate::compiler::PipelineSpec;
use crate::pipeline::PipelineParameters;

pub const RUN_DISPLAY_NAME: &str = "septic-risk-pipeline-run";

const SCOPES: &[&str] = &["https://www.googleapis.com/auth/cloud-platform"];

#[derive(Debug, Clone, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct RuntimeConfig {
    pub gcs_output_directory: String,
    pub parameter_values: BTreeMap<String, Value>,
}

/// `PipelineJob` resource body.
#[derive(Debug, Clone, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct PipelineJobBody {
    pub display_name: String,
    pub pipeline_spec: Value,
    pub runtime_config: RuntimeConfig,
    pub labels: BTreeMap<String, String>,
}

#[derive(Debug, Clone)]
pub struct PipelineJobRequest {
    pub job_id: String,
    pub url: String,
    pub body: PipelineJobBody,
}

/// Build the create request for a run of `spec`.
pub fn build_request(
    spec: &PipelineSpec,
    params: &PipelineParameters,
    config: &PipelineConfig,
    now: DateTime<Utc>,
) -> Result<PipelineJobRequest> {
    let job_id = format!("{}-{}", RUN_DISPLAY_NAME, now.format("%Y%m%d%H%M%S"));
    let url = format!(
        "https://{loc}-aiplatform.googleapis.com/v1/projects/{project}/locations/{loc}/pipelineJobs?pipelineJobId={job}",
        loc = config.vertex_location,
        project = config.project_id,
        job = job_id,
    );

    let pipeline_spec = serde_json::to_value(spec)
        .map_err(|e| VitalsError::Pipeline(format!("failed to encode pipeline spec: {}", e)))?;

    let body = PipelineJobBody {
        display_name: RUN_DISPLAY_NAME.to_string(),
        pipeline_spec,
        runtime_config: RuntimeConfig {
            gcs_output_directory: config.pipeline_root.clone(),
            parameter_values: params
                .run_values()
                .into_iter()
                .map(|(k, v)| (k.to_string(), Value::String(v.to_string())))
                .collect(),
        },
        labels: BTreeMap::from([("pipeline".to_string(), spec.pipeline_info.name.clone())]),
    };

    Ok(PipelineJobRequest { job_id, url, body })
}

/// A request whose credentials were acquired.
#[derive(Debug, Clone)]
pub struct PreparedJob {
    pub request: PipelineJobRequest,
    pub body_bytes: usize,
}

/// Acquire credentials for `request` without submitting it.
pub async fn prepare<T>(tokens: &T, request: PipelineJobRequest) -> Result<PreparedJob>
where
    T: AccessTokenSource + ?Sized,
{
    tokens.access_token(SCOPES).await?;
    let body_bytes = serde_json::to_vec(&request.body)?.len();
    debug!(job_id = %request.job_id, body_bytes, "PipelineJob request authorized");
    Ok(PreparedJob {
        request,
        body_bytes,
    })
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::compiler::compile;
    use crate::components::all_components;
    use crate::pipeline::septic_risk_graph;
    use async_trait::async_trait;
    use chrono::TimeZone;
    use vitals_core::{CredentialsError, StaticTokenSource};

    struct NoCredentials;

    #[async_trait]
    impl AccessTokenSource for NoCredentials {
        async fn access_token(&self, _scopes: &[&str]) -> std::result::Result<String, CredentialsError> {
            Err(CredentialsError("could not find default credentials".into()))
        }
    }

    fn request() -> PipelineJobRequest {
        let config = PipelineConfig::from_lookup(|_| None).unwrap();
        let params = PipelineParameters::from_config(&config);
        let spec = compile(
            &septic_risk_graph().unwrap(),
            &all_components(&config.trainer_image),
            &params,
            &config.pipeline_root,
        )
        .unwrap();
        let now = Utc.with_ymd_and_hms(2024, 3, 1, 10, 15, 0).unwrap();
        build_request(&spec, &params, &config, now).unwrap()
    }

    #[test]
    fn test_request_targets_regional_endpoint() {
        let req = request();
        assert_eq!(req.job_id, "septic-risk-pipeline-run-20240301101500");
        assert_eq!(
            req.url,
            "https://europe-west4-aiplatform.googleapis.com/v1/projects/patient-monitoring-dev/locations/europe-west4/pipelineJobs?pipelineJobId=septic-risk-pipeline-run-20240301101500"
        );
    }

    #[test]
    fn test_body_shape() {
        let body = serde_json::to_value(request().body).unwrap();
        assert_eq!(body["displayName"], "septic-risk-pipeline-run");
        assert_eq!(
            body["runtimeConfig"]["gcsOutputDirectory"],
            "gs://patient-monitoring-dev-pipeline-artifacts"
        );
        assert_eq!(body["runtimeConfig"]["parameterValues"]["bq_table"], "patient_vitals");
        assert_eq!(body["pipelineSpec"]["pipelineInfo"]["name"], "septic-shock-risk-pipeline");
        assert!(body["pipelineSpec"]["root"]["dag"]["tasks"]["deploy-model"].is_object());
    }

    #[tokio::test]
    async fn test_prepare_with_credentials() {
        let prepared =
            tokio_test::assert_ok!(prepare(&StaticTokenSource("ya29.token".into()), request()).await);
        assert!(prepared.body_bytes > 0);
        assert_eq!(prepared.request.body.display_name, RUN_DISPLAY_NAME);
    }

    #[tokio::test]
    async fn test_prepare_without_credentials_is_skippable() {
        let err = tokio_test::assert_err!(prepare(&NoCredentials, request()).await);
        assert!(err.is_skippable());
        assert!(err.hint().unwrap().contains("application-default login"));
    }
}
