//! Error types for the vitals jobs

use thiserror::Error;

pub type Result<T> = std::result::Result<T, VitalsError>;

/// Remediation printed when a job is skipped for lack of credentials.
pub const AUTH_HINT: &str = "To authenticate, run: gcloud auth application-default login";

#[derive(Error, Debug)]
pub enum VitalsError {
    #[error("Validation error: {0}")]
    Validation(String),

    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),

    #[error("Parse error: {0}")]
    Parse(String),

    #[error("Configuration error: {0}")]
    Config(String),

    #[error("Credentials error: {0}")]
    Credentials(String),

    #[error("Connectivity error: {0}")]
    Connectivity(String),

    #[error("{service} error: {message}")]
    Remote { service: String, message: String },

    #[error("Pipeline definition error: {0}")]
    Pipeline(String),
}

impl VitalsError {
    pub fn remote(service: impl Into<String>, message: impl Into<String>) -> Self {
        Self::Remote {
            service: service.into(),
            message: message.into(),
        }
    }

    pub fn error_code(&self) -> &'static str {
        match self {
            Self::Validation(_) => "VALIDATION_ERROR",
            Self::Io(_) => "IO_ERROR",
            Self::Parse(_) => "PARSE_ERROR",
            Self::Config(_) => "CONFIG_ERROR",
            Self::Credentials(_) => "CREDENTIALS_ERROR",
            Self::Connectivity(_) => "CONNECTIVITY_ERROR",
            Self::Remote { .. } => "REMOTE_ERROR",
            Self::Pipeline(_) => "PIPELINE_ERROR",
        }
    }

    /// Credential and connectivity failures end a run as "skipped", not failed.
    pub fn is_skippable(&self) -> bool {
        matches!(self, Self::Credentials(_) | Self::Connectivity(_))
    }

    pub fn hint(&self) -> Option<&'static str> {
        match self {
            Self::Credentials(_) | Self::Connectivity(_) => Some(AUTH_HINT),
            Self::Validation(_) => Some("Check DATA_DIR and RAW_FILE point at an existing file"),
            _ => None,
        }
    }
}

impl From<serde_json::Error> for VitalsError {
    fn from(err: serde_json::Error) -> Self {
        VitalsError::Parse(err.to_string())
    }
}

impl From<crate::credentials::CredentialsError> for VitalsError {
    fn from(err: crate::credentials::CredentialsError) -> Self {
        VitalsError::Credentials(err.to_string())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_skippable_errors_carry_auth_hint() {
        let err = VitalsError::Credentials("no ADC found".into());
        assert!(err.is_skippable());
        assert_eq!(err.hint(), Some(AUTH_HINT));

        let err = VitalsError::Connectivity("dns failure".into());
        assert!(err.is_skippable());
        assert_eq!(err.error_code(), "CONNECTIVITY_ERROR");
    }

    #[test]
    fn test_remote_and_validation_are_fatal() {
        let err = VitalsError::remote("BigQuery", "quota exceeded");
        assert!(!err.is_skippable());
        assert_eq!(err.to_string(), "BigQuery error: quota exceeded");

        let err = VitalsError::Validation("missing file".into());
        assert!(!err.is_skippable());
        assert!(err.hint().is_some());
    }
}
