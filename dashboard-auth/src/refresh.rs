//! The token refresh endpoint.

use crate::error::RefreshFailure;
use crate::transport::{RequestDescriptor, Transport};
use async_trait::async_trait;
use serde::{Deserialize, Serialize};
use std::sync::Arc;

/// New tokens minted by the refresh endpoint.
#[derive(Debug, Clone, PartialEq, Eq, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct RefreshedTokens {
    #[serde(default, alias = "access_token")]
    pub access_token: String,
    #[serde(default, alias = "refresh_token")]
    pub refresh_token: Option<String>,
}

#[derive(Serialize)]
#[serde(rename_all = "camelCase")]
struct RefreshRequest<'a> {
    refresh_token: &'a str,
    user_id: &'a str,
}

#[async_trait]
pub trait RefreshEndpoint: Send + Sync {
    /// Exchange a refresh token for new credentials.
    ///
    /// A response without a non-empty access token is a failure.
    async fn refresh(
        &self,
        refresh_token: &str,
        user_id: &str,
    ) -> Result<RefreshedTokens, RefreshFailure>;
}

/// Calls the refresh endpoint directly on the transport.
///
/// This never goes through the authenticated pipeline.
pub struct HttpRefreshEndpoint {
    transport: Arc<dyn Transport>,
    path: String,
}

impl HttpRefreshEndpoint {
    pub fn new(transport: Arc<dyn Transport>, path: impl Into<String>) -> Self {
        Self {
            transport,
            path: path.into(),
        }
    }
}

#[async_trait]
impl RefreshEndpoint for HttpRefreshEndpoint {
    async fn refresh(
        &self,
        refresh_token: &str,
        user_id: &str,
    ) -> Result<RefreshedTokens, RefreshFailure> {
        let request = RequestDescriptor::post(self.path.as_str()).with_json(&RefreshRequest {
            refresh_token,
            user_id,
        })?;

        let response = self.transport.execute(request).await?;
        if !response.status.is_success() {
            return Err(RefreshFailure::Status(response.status));
        }

        let RefreshedTokens {
            access_token,
            refresh_token,
        } = response
            .json()
            .map_err(|e| RefreshFailure::Decode(e.to_string()))?;
        if access_token.is_empty() {
            return Err(RefreshFailure::MissingAccessToken);
        }

        Ok(RefreshedTokens {
            access_token,
            refresh_token: refresh_token.filter(|t| !t.is_empty()),
        })
    }
}
