//! The entry point UI components send requests through.

use crate::authenticator::RequestAuthenticator;
use crate::classifier::PublicEndpoints;
use crate::config::ApiSettings;
use crate::coordinator::RefreshCoordinator;
use crate::credentials::CredentialProvider;
use crate::error::PipelineError;
use crate::escalation::{FailureEscalation, Navigator};
use crate::refresh::RefreshEndpoint;
use crate::session::{Persistence, SessionRecord, SessionStore};
use crate::transport::{RequestDescriptor, Transport, TransportResponse};
use http::header::HeaderName;
use secrecy::{ExposeSecret, Secret};
use serde::Serialize;
use std::sync::Arc;

/// Username/password pair for the login endpoint.
pub struct LoginRequest {
    pub username: String,
    pub password: Secret<String>,
}

#[derive(Serialize)]
struct LoginBody<'a> {
    username: &'a str,
    password: &'a str,
}

#[derive(Serialize)]
#[serde(rename_all = "camelCase")]
struct LogoutBody<'a> {
    #[serde(skip_serializing_if = "Option::is_none")]
    refresh_token: Option<&'a str>,
}

pub struct AuthPipeline {
    transport: Arc<dyn Transport>,
    classifier: PublicEndpoints,
    authenticator: RequestAuthenticator,
    credentials: CredentialProvider,
    coordinator: RefreshCoordinator,
    login_path: String,
    logout_path: String,
}

impl AuthPipeline {
    pub fn new(
        api: &ApiSettings,
        transport: Arc<dyn Transport>,
        refresh_endpoint: Arc<dyn RefreshEndpoint>,
        store: Arc<SessionStore>,
        navigator: Arc<dyn Navigator>,
    ) -> Result<Self, PipelineError> {
        let refresh_header = HeaderName::from_bytes(api.refresh_header.as_bytes()).map_err(|e| {
            PipelineError::InvalidConfiguration(format!(
                "refresh header '{}': {}",
                api.refresh_header, e
            ))
        })?;

        let credentials = CredentialProvider::new(store);
        let escalation = FailureEscalation::new(credentials.clone(), navigator);

        Ok(Self {
            transport,
            classifier: PublicEndpoints::from_settings(api),
            authenticator: RequestAuthenticator::new(credentials.clone(), refresh_header),
            coordinator: RefreshCoordinator::new(credentials.clone(), refresh_endpoint, escalation),
            credentials,
            login_path: api.login_path.clone(),
            logout_path: api.logout_path.clone(),
        })
    }

    pub fn credentials(&self) -> &CredentialProvider {
        &self.credentials
    }

    pub fn coordinator(&self) -> &RefreshCoordinator {
        &self.coordinator
    }

    /// Send a request with the current credentials.
    ///
    /// An authentication failure is resolved by refreshing (or joining the
    /// refresh already in flight) and replaying the request once. Callers
    /// only ever see a successful response or a terminal error.
    #[tracing::instrument(
        name = "pipeline.send",
        skip_all,
        fields(method = %request.method(), url = %request.url())
    )]
    pub async fn send(
        &self,
        request: RequestDescriptor,
    ) -> Result<TransportResponse, PipelineError> {
        if self.classifier.is_public(request.url()) {
            tracing::debug!("Public endpoint; sending without credentials");
            let response = self.transport.execute(request).await?;
            return into_result(response);
        }

        let (attached, sent_with) = self.authenticator.attach_current(&request);
        let response = self.transport.execute(attached).await?;
        if !response.is_auth_failure() {
            return into_result(response);
        }

        tracing::debug!("Authentication failure; recovering credentials");
        let failed_token = sent_with.as_ref().map(|c| c.access_token.as_str());
        let fresh = self.coordinator.recover(failed_token).await?;

        let replay = self.authenticator.attach_credentials(&request, &fresh);
        let response = self.transport.execute(replay).await?;
        if response.is_auth_failure() {
            tracing::warn!("Replayed request rejected as unauthenticated");
            return Err(PipelineError::ReplayAuthFailure);
        }

        into_result(response)
    }

    /// Log in and establish the session in the chosen backend.
    pub async fn login(
        &self,
        request: LoginRequest,
        persistence: Persistence,
    ) -> Result<SessionRecord, PipelineError> {
        let descriptor = RequestDescriptor::post(self.login_path.as_str()).with_json(&LoginBody {
            username: &request.username,
            password: request.password.expose_secret(),
        })?;

        let response = match self.send(descriptor).await {
            Ok(response) => response,
            Err(PipelineError::Status { status, .. }) => {
                tracing::info!(status = status.as_u16(), "Login rejected");
                return Err(PipelineError::Login(format!("rejected with status {}", status)));
            }
            Err(e) => return Err(e),
        };

        let record: SessionRecord = response
            .json()
            .map_err(|e| PipelineError::Login(format!("invalid login response: {}", e)))?;
        self.credentials.establish(&record, persistence)?;

        tracing::info!(
            user_id = %record.user_id(),
            persistence = ?persistence,
            "User logged in successfully"
        );
        Ok(record)
    }

    /// Revoke the refresh token (best effort) and clear the session.
    ///
    /// A failed revocation is logged; the session is cleared regardless.
    pub async fn logout(&self) -> Result<(), PipelineError> {
        if let Some(credentials) = self.credentials.credentials() {
            let revoke = RequestDescriptor::post(self.logout_path.as_str()).with_json(&LogoutBody {
                refresh_token: credentials.refresh_token.as_deref(),
            })?;
            let revoke = self.authenticator.attach_credentials(&revoke, &credentials);

            match self.transport.execute(revoke).await {
                Ok(response) if response.status.is_success() => {
                    tracing::info!("Token revoked successfully")
                }
                Ok(response) => tracing::warn!(
                    status = response.status.as_u16(),
                    "Token revocation rejected during logout"
                ),
                Err(e) => tracing::error!("Failed to revoke token during logout: {}", e),
            }
        }

        self.credentials.clear()?;
        Ok(())
    }
}

fn into_result(response: TransportResponse) -> Result<TransportResponse, PipelineError> {
    if response.status.is_success() {
        Ok(response)
    } else {
        Err(PipelineError::Status {
            status: response.status,
            body: response.body,
        })
    }
}
