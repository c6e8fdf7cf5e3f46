//! Access tokens for Google Cloud REST APIs

use std::fmt;
use std::sync::Arc;

use async_trait::async_trait;
use gcp_auth::TokenProvider;
use tracing::debug;

#[derive(Debug, thiserror::Error)]
#[error("{0}")]
pub struct CredentialsError(pub String);

/// Supplies bearer tokens to the SDK clients.
#[async_trait]
pub trait AccessTokenSource: Send + Sync {
    async fn access_token(&self, scopes: &[&str]) -> Result<String, CredentialsError>;
}

/// Application-default credentials discovered by `gcp_auth`.
pub struct GcpTokenSource {
    provider: Arc<dyn TokenProvider>,
}

impl fmt::Debug for GcpTokenSource {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("GcpTokenSource").finish_non_exhaustive()
    }
}

impl GcpTokenSource {
    /// Discover credentials from the environment, gcloud config or the metadata server.
    pub async fn discover() -> Result<Self, CredentialsError> {
        let provider = gcp_auth::provider()
            .await
            .map_err(|e| CredentialsError(format!("failed to initialize GCP authentication: {e}")))?;
        debug!("GCP credentials discovered");
        Ok(Self { provider })
    }
}

#[async_trait]
impl AccessTokenSource for GcpTokenSource {
    async fn access_token(&self, scopes: &[&str]) -> Result<String, CredentialsError> {
        let token = self
            .provider
            .token(scopes)
            .await
            .map_err(|e| CredentialsError(format!("failed to get GCP access token: {e}")))?;
        Ok(token.as_str().to_string())
    }
}

/// Fixed token, for tests and pre-minted tokens.
#[derive(Debug, Clone)]
pub struct StaticTokenSource(pub String);

#[async_trait]
impl AccessTokenSource for StaticTokenSource {
    async fn access_token(&self, _scopes: &[&str]) -> Result<String, CredentialsError> {
        Ok(self.0.clone())
    }
}
