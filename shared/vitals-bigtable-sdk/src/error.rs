//! Error types for the Bigtable SDK

use vitals_core::VitalsError;

/// Result type alias
pub type Result<T> = std::result::Result<T, BigtableError>;

#[derive(Debug, thiserror::Error)]
pub enum BigtableError {
    #[error("HTTP error: {0}")]
    Http(#[from] reqwest::Error),

    #[error("Credentials error: {0}")]
    Credentials(String),

    #[error("Unauthorized: {0}")]
    Unauthorized(String),

    #[error("Permission denied: {0}")]
    PermissionDenied(String),

    #[error("Table not found: {0}")]
    TableNotFound(String),

    #[error("Invalid request: {0}")]
    InvalidRequest(String),

    #[error("API error ({status}): {message}")]
    Api { status: u16, message: String },

    #[error("Mutation of row {row_key} failed with code {code}: {message}")]
    Mutation {
        row_key: String,
        code: i32,
        message: String,
    },

    #[error("Protocol error: {0}")]
    Protocol(String),
}

impl From<vitals_core::CredentialsError> for BigtableError {
    fn from(err: vitals_core::CredentialsError) -> Self {
        BigtableError::Credentials(err.to_string())
    }
}

impl From<BigtableError> for VitalsError {
    fn from(err: BigtableError) -> Self {
        match err {
            BigtableError::Http(e) if e.is_connect() || e.is_timeout() => {
                VitalsError::Connectivity(e.to_string())
            }
            BigtableError::Credentials(msg)
            | BigtableError::Unauthorized(msg)
            | BigtableError::PermissionDenied(msg) => VitalsError::Credentials(msg),
            other => VitalsError::remote("Bigtable", other.to_string()),
        }
    }
}
