//! Error types for the BigQuery SDK

use vitals_core::VitalsError;

/// Result type alias
pub type Result<T> = std::result::Result<T, BigQueryError>;

#[derive(Debug, thiserror::Error)]
pub enum BigQueryError {
    #[error("HTTP error: {0}")]
    Http(#[from] reqwest::Error),

    #[error("Credentials error: {0}")]
    Credentials(String),

    #[error("Unauthorized: {0}")]
    Unauthorized(String),

    #[error("Permission denied: {0}")]
    PermissionDenied(String),

    #[error("API error ({status}): {message}")]
    Api { status: u16, message: String },

    #[error("Job {job_id} failed: {reason}: {message}")]
    JobFailed {
        job_id: String,
        reason: String,
        message: String,
    },

    #[error("Parse error: {0}")]
    Parse(String),
}

impl From<vitals_core::CredentialsError> for BigQueryError {
    fn from(err: vitals_core::CredentialsError) -> Self {
        BigQueryError::Credentials(err.to_string())
    }
}

impl From<BigQueryError> for VitalsError {
    fn from(err: BigQueryError) -> Self {
        match err {
            BigQueryError::Http(e) if e.is_connect() || e.is_timeout() => {
                VitalsError::Connectivity(e.to_string())
            }
            BigQueryError::Credentials(msg)
            | BigQueryError::Unauthorized(msg)
            | BigQueryError::PermissionDenied(msg) => VitalsError::Credentials(msg),
            other => VitalsError::remote("BigQuery", other.to_string()),
        }
    }
}
