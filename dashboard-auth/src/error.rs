use http::StatusCode;
use thiserror::Error;

/// Failures of a session storage backend.
#[derive(Debug, Error)]
pub enum SessionError {
    #[error("Session record has an empty access token")]
    EmptyAccessToken,

    #[error("Session storage I/O error: {0}")]
    Io(#[from] std::io::Error),

    #[error("Session record serialization error: {0}")]
    Serialization(#[from] serde_json::Error),
}

/// Failures of the transport collaborator. Passed through to callers untouched.
#[derive(Debug, Clone, Error)]
pub enum TransportError {
    #[error("Request timed out: {0}")]
    Timeout(String),

    #[error("HTTP request failed: {0}")]
    Network(String),

    #[error("Invalid request: {0}")]
    InvalidRequest(String),
}

impl From<reqwest::Error> for TransportError {
    fn from(err: reqwest::Error) -> Self {
        if err.is_timeout() {
            TransportError::Timeout(err.to_string())
        } else if err.is_builder() {
            TransportError::InvalidRequest(err.to_string())
        } else {
            TransportError::Network(err.to_string())
        }
    }
}

/// Why a call to the refresh endpoint did not produce new credentials.
#[derive(Debug, Error)]
pub enum RefreshFailure {
    #[error("refresh endpoint returned {0}")]
    Status(StatusCode),

    #[error("refresh response carried no usable access token")]
    MissingAccessToken,

    #[error("refresh response could not be decoded: {0}")]
    Decode(String),

    #[error(transparent)]
    Transport(#[from] TransportError),
}

/// Terminal errors surfaced by [`crate::pipeline::AuthPipeline`].
///
/// An authentication failure that a refresh resolves never reaches the caller.
#[derive(Debug, Error)]
pub enum PipelineError {
    #[error(transparent)]
    Transport(#[from] TransportError),

    #[error("Request failed with status {status}")]
    Status { status: StatusCode, body: Vec<u8> },

    #[error("No refresh token available; session ended")]
    RefreshTokenMissing,

    #[error("Token refresh rejected: {0}")]
    RefreshRejected(String),

    #[error("Replayed request was rejected as unauthenticated")]
    ReplayAuthFailure,

    #[error("Token refresh was abandoned before it completed")]
    RefreshAbandoned,

    #[error("Session was closed while the token refresh was in flight")]
    SessionClosed,

    #[error("Login failed: {0}")]
    Login(String),

    #[error(transparent)]
    Session(#[from] SessionError),

    #[error("Invalid pipeline configuration: {0}")]
    InvalidConfiguration(String),
}

impl PipelineError {
    /// Whether this error ended the session (cleared it and requested a redirect).
    pub fn is_escalation(&self) -> bool {
        matches!(
            self,
            PipelineError::RefreshTokenMissing | PipelineError::RefreshRejected(_)
        )
    }
}
