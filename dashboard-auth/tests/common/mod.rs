//! Scripted collaborators for pipeline integration tests.

#![allow(dead_code)]

use async_trait::async_trait;
use dashboard_auth::config::ApiSettings;
use dashboard_auth::error::{RefreshFailure, TransportError};
use dashboard_auth::refresh::{RefreshEndpoint, RefreshedTokens};
use dashboard_auth::{
    AuthPipeline, Navigator, Persistence, RequestDescriptor, SessionRecord, SessionStore,
    Transport, TransportResponse,
};
use http::header::AUTHORIZATION;
use http::StatusCode;
use parking_lot::Mutex;
use std::collections::HashMap;
use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::Arc;
use std::time::Duration;
use tokio::sync::Barrier;

pub fn api_settings() -> ApiSettings {
    ApiSettings {
        base_url: "http://dashboard.test".to_string(),
        login_path: "/auth/login".to_string(),
        refresh_path: "/auth/refresh".to_string(),
        logout_path: "/auth/logout".to_string(),
        request_timeout_secs: 5,
        refresh_header: "x-refresh-token".to_string(),
    }
}

/// Transport that accepts exactly one bearer token on protected paths.
///
/// Fixed responses registered with [`ScriptedTransport::respond`] win over
/// the bearer check.
pub struct ScriptedTransport {
    accepted: Mutex<String>,
    fixed: Mutex<HashMap<String, (StatusCode, String)>>,
    rejection_barrier: Option<Barrier>,
    seen: Mutex<Vec<RequestDescriptor>>,
}

impl ScriptedTransport {
    pub fn accepting(token: &str) -> Self {
        Self {
            accepted: Mutex::new(token.to_string()),
            fixed: Mutex::new(HashMap::new()),
            rejection_barrier: None,
            seen: Mutex::new(Vec::new()),
        }
    }

    /// Hold every rejection until `n` requests have been rejected.
    pub fn with_rejection_barrier(mut self, n: usize) -> Self {
        self.rejection_barrier = Some(Barrier::new(n));
        self
    }

    pub fn respond(self, url: &str, status: StatusCode, body: &str) -> Self {
        self.fixed
            .lock()
            .insert(url.to_string(), (status, body.to_string()));
        self
    }

    pub fn seen(&self) -> Vec<RequestDescriptor> {
        self.seen.lock().clone()
    }

    pub fn seen_for(&self, url: &str) -> Vec<RequestDescriptor> {
        self.seen().into_iter().filter(|r| r.url() == url).collect()
    }
}

pub fn bearer(request: &RequestDescriptor) -> Option<String> {
    request
        .headers()
        .get(AUTHORIZATION)
        .and_then(|v| v.to_str().ok())
        .map(str::to_string)
}

#[async_trait]
impl Transport for ScriptedTransport {
    async fn execute(
        &self,
        request: RequestDescriptor,
    ) -> Result<TransportResponse, TransportError> {
        self.seen.lock().push(request.clone());

        let fixed = self.fixed.lock().get(request.url()).cloned();
        if let Some((status, body)) = fixed {
            return Ok(TransportResponse::new(status, body));
        }

        let expected = format!("Bearer {}", self.accepted.lock());
        if bearer(&request).as_deref() == Some(expected.as_str()) {
            return Ok(TransportResponse::new(StatusCode::OK, "ok"));
        }

        if let Some(barrier) = &self.rejection_barrier {
            barrier.wait().await;
        }
        Ok(TransportResponse::new(StatusCode::UNAUTHORIZED, ""))
    }
}

/// Refresh endpoint that counts calls and answers with fixed tokens.
///
/// `None` tokens mean the endpoint rejects the refresh token.
pub struct CountingRefresh {
    tokens: Option<RefreshedTokens>,
    delay: Option<Duration>,
    calls: AtomicUsize,
    seen: Mutex<Vec<(String, String)>>,
}

impl CountingRefresh {
    pub fn issuing(access_token: &str, refresh_token: Option<&str>) -> Self {
        Self {
            tokens: Some(RefreshedTokens {
                access_token: access_token.to_string(),
                refresh_token: refresh_token.map(str::to_string),
            }),
            delay: None,
            calls: AtomicUsize::new(0),
            seen: Mutex::new(Vec::new()),
        }
    }

    pub fn rejecting() -> Self {
        Self {
            tokens: None,
            delay: None,
            calls: AtomicUsize::new(0),
            seen: Mutex::new(Vec::new()),
        }
    }

    /// Keep each refresh call in flight for `delay`.
    pub fn with_delay(mut self, delay: Duration) -> Self {
        self.delay = Some(delay);
        self
    }

    pub fn calls(&self) -> usize {
        self.calls.load(Ordering::SeqCst)
    }

    pub fn seen(&self) -> Vec<(String, String)> {
        self.seen.lock().clone()
    }
}

#[async_trait]
impl RefreshEndpoint for CountingRefresh {
    async fn refresh(
        &self,
        refresh_token: &str,
        user_id: &str,
    ) -> Result<RefreshedTokens, RefreshFailure> {
        self.calls.fetch_add(1, Ordering::SeqCst);
        self.seen
            .lock()
            .push((refresh_token.to_string(), user_id.to_string()));
        // Stay in flight for a few polls so concurrent failures queue up.
        for _ in 0..3 {
            tokio::task::yield_now().await;
        }
        if let Some(delay) = self.delay {
            tokio::time::sleep(delay).await;
        }

        self.tokens
            .clone()
            .ok_or(RefreshFailure::Status(StatusCode::UNAUTHORIZED))
    }
}

#[derive(Default)]
pub struct CountingNavigator {
    redirects: AtomicUsize,
}

impl CountingNavigator {
    pub fn redirects(&self) -> usize {
        self.redirects.load(Ordering::SeqCst)
    }
}

impl Navigator for CountingNavigator {
    fn redirect_to_login(&self) {
        self.redirects.fetch_add(1, Ordering::SeqCst);
    }
}

pub struct TestPipeline {
    pub pipeline: AuthPipeline,
    pub transport: Arc<ScriptedTransport>,
    pub refresh: Arc<CountingRefresh>,
    pub navigator: Arc<CountingNavigator>,
    pub store: Arc<SessionStore>,
}

/// Pipeline over in-memory storage, optionally seeded with a session.
pub fn pipeline(
    session: Option<SessionRecord>,
    transport: ScriptedTransport,
    refresh: CountingRefresh,
) -> TestPipeline {
    let store = Arc::new(SessionStore::in_memory());
    if let Some(record) = session {
        store.set(&record, Persistence::Session).unwrap();
    }

    let transport = Arc::new(transport);
    let refresh = Arc::new(refresh);
    let navigator = Arc::new(CountingNavigator::default());

    let pipeline = AuthPipeline::new(
        &api_settings(),
        transport.clone(),
        refresh.clone(),
        store.clone(),
        navigator.clone(),
    )
    .unwrap();

    TestPipeline {
        pipeline,
        transport,
        refresh,
        navigator,
        store,
    }
}

pub fn session(access_token: &str, refresh_token: Option<&str>) -> SessionRecord {
    SessionRecord::new(access_token, refresh_token.map(str::to_string), "user-1").unwrap()
}
