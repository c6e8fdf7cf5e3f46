//! BigQuery REST client

use std::sync::Arc;
use std::time::Duration;

use async_trait::async_trait;
use reqwest::{Client, Response, StatusCode};
use tracing::{debug, info, instrument};
use vitals_core::AccessTokenSource;

use crate::api::WarehouseApi;
use crate::types::{
    DatasetRef, DatasetResource, GoogleErrorResponse, JobRef, JobResponse, JobState,
    LoadConfiguration, LoadJobConfig, LoadJobResource, LoadSpec, TableDefinition, TableRef,
    TableResource, TableResponse,
};
use crate::{BigQueryError, Result};

const API_BASE: &str = "https://bigquery.googleapis.com/bigquery/v2";
const UPLOAD_BASE: &str = "https://bigquery.googleapis.com/upload/bigquery/v2";
const SCOPES: &[&str] = &["https://www.googleapis.com/auth/bigquery"];
const MULTIPART_BOUNDARY: &str = "vitals_load_boundary";

/// BigQuery client over the v2 REST API
pub struct BigQueryClient {
    http: Client,
    tokens: Arc<dyn AccessTokenSource>,
    location: String,
    api_base: String,
    upload_base: String,
}

impl std::fmt::Debug for BigQueryClient {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("BigQueryClient")
            .field("location", &self.location)
            .field("api_base", &self.api_base)
            .finish_non_exhaustive()
    }
}

impl BigQueryClient {
    pub fn new(
        tokens: Arc<dyn AccessTokenSource>,
        location: impl Into<String>,
        timeout: Duration,
    ) -> Result<Self> {
        let http = Client::builder().timeout(timeout).build()?;
        Ok(Self {
            http,
            tokens,
            location: location.into(),
            api_base: API_BASE.to_string(),
            upload_base: UPLOAD_BASE.to_string(),
        })
    }

    async fn token(&self) -> Result<String> {
        Ok(self.tokens.access_token(SCOPES).await?)
    }

    fn table_url(&self, table: &TableRef) -> String {
        format!(
            "{}/projects/{}/datasets/{}/tables/{}",
            self.api_base, table.project_id, table.dataset_id, table.table_id
        )
    }
}

#[async_trait]
impl WarehouseApi for BigQueryClient {
    #[instrument(skip(self), fields(dataset = %dataset.dataset_id))]
    async fn ensure_dataset(&self, dataset: &DatasetRef, location: &str) -> Result<()> {
        let url = format!("{}/projects/{}/datasets", self.api_base, dataset.project_id);
        let response = self
            .http
            .post(&url)
            .bearer_auth(self.token().await?)
            .json(&DatasetResource {
                dataset_reference: dataset,
                location,
            })
            .send()
            .await?;

        if response.status() == StatusCode::CONFLICT {
            debug!("Dataset already exists");
            return Ok(());
        }
        check(response).await?;
        info!("Created dataset");
        Ok(())
    }

    #[instrument(skip(self), fields(table = %table))]
    async fn delete_table(&self, table: &TableRef) -> Result<bool> {
        let response = self
            .http
            .delete(self.table_url(table))
            .bearer_auth(self.token().await?)
            .send()
            .await?;

        if response.status() == StatusCode::NOT_FOUND {
            return Ok(false);
        }
        check(response).await?;
        Ok(true)
    }

    #[instrument(skip(self, definition), fields(table = %table))]
    async fn create_table(&self, table: &TableRef, definition: &TableDefinition) -> Result<()> {
        let url = format!(
            "{}/projects/{}/datasets/{}/tables",
            self.api_base, table.project_id, table.dataset_id
        );
        let response = self
            .http
            .post(&url)
            .bearer_auth(self.token().await?)
            .json(&TableResource {
                table_reference: table,
                definition,
            })
            .send()
            .await?;
        check(response).await?;
        Ok(())
    }

    #[instrument(skip(self, config, ndjson), fields(table = %table, bytes = ndjson.len()))]
    async fn start_load(
        &self,
        table: &TableRef,
        config: &LoadJobConfig,
        ndjson: Vec<u8>,
    ) -> Result<JobRef> {
        let job_ref = JobRef {
            project_id: table.project_id.clone(),
            job_id: format!("vitals_load_{}", uuid::Uuid::new_v4().simple()),
            location: Some(self.location.clone()),
        };
        let metadata = serde_json::to_vec(&LoadJobResource {
            job_reference: &job_ref,
            configuration: LoadConfiguration {
                load: LoadSpec {
                    destination_table: table,
                    schema: &config.schema,
                    source_format: config.source_format,
                    write_disposition: config.write_disposition,
                },
            },
        })
        .map_err(|e| BigQueryError::Parse(e.to_string()))?;

        let url = format!(
            "{}/projects/{}/jobs?uploadType=multipart",
            self.upload_base, table.project_id
        );
        let response = self
            .http
            .post(&url)
            .bearer_auth(self.token().await?)
            .header(
                reqwest::header::CONTENT_TYPE,
                format!("multipart/related; boundary={}", MULTIPART_BOUNDARY),
            )
            .body(multipart_related(MULTIPART_BOUNDARY, &metadata, &ndjson))
            .send()
            .await?;

        let job: JobResponse = check(response)
            .await?
            .json()
            .await?;
        info!(job_id = %job.job_reference.job_id, "Load job started");
        Ok(job.job_reference)
    }

    async fn job_state(&self, job: &JobRef) -> Result<JobState> {
        let mut url = format!(
            "{}/projects/{}/jobs/{}",
            self.api_base, job.project_id, job.job_id
        );
        if let Some(location) = &job.location {
            url.push_str(&format!("?location={}", location));
        }

        let response = self
            .http
            .get(&url)
            .bearer_auth(self.token().await?)
            .send()
            .await?;
        let job: JobResponse = check(response).await?.json().await?;
        Ok(job
            .status
            .map(|s| s.into_state())
            .unwrap_or(JobState::Pending))
    }

    async fn table_row_count(&self, table: &TableRef) -> Result<u64> {
        let response = self
            .http
            .get(self.table_url(table))
            .bearer_auth(self.token().await?)
            .send()
            .await?;
        let resource: TableResponse = check(response).await?.json().await?;

        match resource.num_rows {
            Some(n) => n
                .parse()
                .map_err(|e| BigQueryError::Parse(format!("numRows '{}': {}", n, e))),
            None => Ok(0),
        }
    }
}

/// Map a non-success response to a typed error.
async fn check(response: Response) -> Result<Response> {
    let status = response.status();
    if status.is_success() {
        return Ok(response);
    }

    let body = response
        .text()
        .await
        .unwrap_or_else(|_| "unknown error".to_string());
    Err(error_from_body(status, &body))
}

pub(crate) fn error_from_body(status: StatusCode, body: &str) -> BigQueryError {
    let message = serde_json::from_str::<GoogleErrorResponse>(body)
        .map(|r| r.error.message)
        .unwrap_or_else(|_| body.to_string());

    match status {
        StatusCode::UNAUTHORIZED => BigQueryError::Unauthorized(message),
        StatusCode::FORBIDDEN => BigQueryError::PermissionDenied(message),
        _ => BigQueryError::Api {
            status: status.as_u16(),
            message,
        },
    }
}

/// Body of a `multipart/related` media upload: JSON metadata then the payload.
pub(crate) fn multipart_related(boundary: &str, metadata: &[u8], data: &[u8]) -> Vec<u8> {
    let mut body = Vec::with_capacity(metadata.len() + data.len() + 256);
    body.extend_from_slice(format!("--{}\r\n", boundary).as_bytes());
    body.extend_from_slice(b"Content-Type: application/json; charset=UTF-8\r\n\r\n");
    body.extend_from_slice(metadata);
    body.extend_from_slice(format!("\r\n--{}\r\n", boundary).as_bytes());
    body.extend_from_slice(b"Content-Type: application/octet-stream\r\n\r\n");
    body.extend_from_slice(data);
    body.extend_from_slice(format!("\r\n--{}--\r\n", boundary).as_bytes());
    body
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_multipart_related_layout() {
        let body = multipart_related("b", br#"{"a":1}"#, b"{\"x\":1}\n{\"x\":2}\n");
        let text = String::from_utf8(body).unwrap();

        assert!(text.starts_with("--b\r\nContent-Type: application/json; charset=UTF-8\r\n\r\n{\"a\":1}"));
        assert!(text.contains("\r\n--b\r\nContent-Type: application/octet-stream\r\n\r\n{\"x\":1}\n{\"x\":2}\n"));
        assert!(text.ends_with("\r\n--b--\r\n"));
    }

    #[test]
    fn test_error_from_google_error_body() {
        let body = r#"{"error": {"code": 403, "message": "Access Denied: Project p", "status": "PERMISSION_DENIED"}}"#;
        match error_from_body(StatusCode::FORBIDDEN, body) {
            BigQueryError::PermissionDenied(msg) => assert_eq!(msg, "Access Denied: Project p"),
            other => panic!("unexpected {:?}", other),
        }

        match error_from_body(StatusCode::BAD_GATEWAY, "upstream down") {
            BigQueryError::Api { status, message } => {
                assert_eq!(status, 502);
                assert_eq!(message, "upstream down");
            }
            other => panic!("unexpected {:?}", other),
        }
    }

    #[test]
    fn test_table_url() {
        let tokens: Arc<dyn AccessTokenSource> =
            Arc::new(vitals_core::StaticTokenSource("t".into()));
        let client = BigQueryClient::new(tokens, "US", Duration::from_secs(5)).unwrap();
        let table = DatasetRef::new("p", "d").table("t");
        assert_eq!(
            client.table_url(&table),
            "https://bigquery.googleapis.com/bigquery/v2/projects/p/datasets/d/tables/t"
        );
    }
}
