use crate::config::Settings;
use crate::error::PipelineError;
use crate::escalation::Navigator;
use crate::pipeline::AuthPipeline;
use crate::refresh::HttpRefreshEndpoint;
use crate::session::file::FileBackend;
use crate::session::memory::MemoryBackend;
use crate::session::{Persistence, SessionStore};
use crate::transport::{ReqwestTransport, Transport};
use std::sync::Arc;

/// Wire the production pipeline: `reqwest` transport, file-backed
/// persistent sessions and in-memory per-process sessions.
pub fn build_pipeline(
    settings: &Settings,
    navigator: Arc<dyn Navigator>,
) -> Result<AuthPipeline, PipelineError> {
    let transport: Arc<dyn Transport> = Arc::new(ReqwestTransport::new(settings.api.clone())?);

    let persistent = Arc::new(FileBackend::open(&settings.session.storage_path)?);
    let store = Arc::new(SessionStore::open(
        persistent,
        Arc::new(MemoryBackend::default()),
    ));

    let refresh_endpoint = Arc::new(HttpRefreshEndpoint::new(
        transport.clone(),
        settings.api.refresh_path.clone(),
    ));

    tracing::info!(
        base_url = %settings.api.base_url,
        restored = store.active().is_some(),
        "Request pipeline ready"
    );

    AuthPipeline::new(&settings.api, transport, refresh_endpoint, store, navigator)
}

/// Backend a new login should be stored in.
pub fn login_persistence(settings: &Settings, remember_me: bool) -> Persistence {
    if remember_me || settings.session.remember_me {
        Persistence::Persistent
    } else {
        Persistence::Session
    }
}
