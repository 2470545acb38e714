//! Single-flight token refresh.
//!
//! The first authentication failure seen while idle starts a refresh on a
//! detached task. That caller and every failure seen while the refresh is in
//! flight register a one-shot waiter; no caller owns the refresh, so dropping
//! any of them leaves the network call and the other waiters untouched. When
//! the refresh resolves, the state goes back to `Idle` and the waiter queue
//! is taken in one critical section. The waiters are then released in
//! registration order, all with the same outcome.

use crate::credentials::{CredentialProvider, Credentials};
use crate::error::PipelineError;
use crate::escalation::FailureEscalation;
use crate::refresh::RefreshEndpoint;
use parking_lot::Mutex;
use std::collections::VecDeque;
use std::sync::Arc;
use tokio::sync::oneshot;
use tracing::Instrument;

/// Why a refresh produced no credentials, as delivered to waiters.
#[derive(Debug, Clone, PartialEq, Eq)]
enum RefreshError {
    Rejected(String),
    Abandoned,
    SessionClosed,
}

impl From<RefreshError> for PipelineError {
    fn from(err: RefreshError) -> Self {
        match err {
            RefreshError::Rejected(reason) => PipelineError::RefreshRejected(reason),
            RefreshError::Abandoned => PipelineError::RefreshAbandoned,
            RefreshError::SessionClosed => PipelineError::SessionClosed,
        }
    }
}

type RefreshOutcome = Result<Credentials, RefreshError>;

/// A queued caller. `ticket` is its registration position in this refresh.
struct Waiter {
    ticket: u64,
    sender: oneshot::Sender<RefreshOutcome>,
}

enum RefreshState {
    Idle,
    Refreshing {
        waiters: VecDeque<Waiter>,
        next_ticket: u64,
    },
}

impl RefreshState {
    /// Queue a waiter on an in-flight refresh. `None` when idle.
    fn enqueue(&mut self) -> Option<oneshot::Receiver<RefreshOutcome>> {
        match self {
            RefreshState::Refreshing {
                waiters,
                next_ticket,
            } => {
                let (sender, receiver) = oneshot::channel();
                waiters.push_back(Waiter {
                    ticket: *next_ticket,
                    sender,
                });
                *next_ticket += 1;
                Some(receiver)
            }
            RefreshState::Idle => None,
        }
    }
}

/// What a caller does after inspecting the state.
enum Role {
    Lead {
        refresh_token: String,
        user_id: String,
        receiver: oneshot::Receiver<RefreshOutcome>,
    },
    Wait(oneshot::Receiver<RefreshOutcome>),
    Superseded(Credentials),
    Missing,
}

struct Shared {
    state: Mutex<RefreshState>,
    credentials: CredentialProvider,
    endpoint: Arc<dyn RefreshEndpoint>,
    escalation: FailureEscalation,
}

#[derive(Clone)]
pub struct RefreshCoordinator {
    shared: Arc<Shared>,
}

impl RefreshCoordinator {
    pub fn new(
        credentials: CredentialProvider,
        endpoint: Arc<dyn RefreshEndpoint>,
        escalation: FailureEscalation,
    ) -> Self {
        Self {
            shared: Arc::new(Shared {
                state: Mutex::new(RefreshState::Idle),
                credentials,
                endpoint,
                escalation,
            }),
        }
    }

    pub fn is_refreshing(&self) -> bool {
        matches!(*self.shared.state.lock(), RefreshState::Refreshing { .. })
    }

    /// Callers currently waiting on the in-flight refresh, including the one
    /// that started it.
    pub fn pending_waiters(&self) -> usize {
        match &*self.shared.state.lock() {
            RefreshState::Refreshing { waiters, .. } => waiters.len(),
            RefreshState::Idle => 0,
        }
    }

    /// Resolve an authentication failure into credentials to replay with.
    ///
    /// `failed_token` is the access token the rejected request carried
    /// (`None` if it went out unauthenticated). If the session already holds
    /// a different token, an earlier refresh superseded it and no new refresh
    /// is started.
    ///
    /// Must be called from within a tokio runtime.
    pub async fn recover(&self, failed_token: Option<&str>) -> Result<Credentials, PipelineError> {
        let role = {
            let mut state = self.shared.state.lock();
            if let Some(receiver) = state.enqueue() {
                tracing::debug!("Refresh in flight; waiting");
                Role::Wait(receiver)
            } else {
                match self.shared.credentials.credentials() {
                    Some(current) if Some(current.access_token.as_str()) != failed_token => {
                        Role::Superseded(current)
                    }
                    Some(Credentials {
                        refresh_token: Some(refresh_token),
                        ..
                    }) => {
                        let (sender, receiver) = oneshot::channel();
                        *state = RefreshState::Refreshing {
                            waiters: VecDeque::from([Waiter { ticket: 0, sender }]),
                            next_ticket: 1,
                        };
                        Role::Lead {
                            refresh_token,
                            user_id: self.shared.credentials.user_id().unwrap_or_default(),
                            receiver,
                        }
                    }
                    _ => Role::Missing,
                }
            }
        };

        let receiver = match role {
            Role::Lead {
                refresh_token,
                user_id,
                receiver,
            } => {
                self.spawn_refresh(refresh_token, user_id);
                receiver
            }
            Role::Wait(receiver) => receiver,
            Role::Superseded(current) => {
                tracing::debug!("Access token already rotated; replaying without refresh");
                return Ok(current);
            }
            Role::Missing => {
                self.shared
                    .escalation
                    .on_unrecoverable("refresh token missing");
                return Err(PipelineError::RefreshTokenMissing);
            }
        };

        match receiver.await {
            Ok(outcome) => outcome.map_err(PipelineError::from),
            // The refresh task always releases; this only happens if the
            // runtime dropped it without running its guard.
            Err(_) => Err(PipelineError::RefreshAbandoned),
        }
    }

    fn spawn_refresh(&self, refresh_token: String, user_id: String) {
        let shared = Arc::clone(&self.shared);
        tokio::spawn(
            async move { shared.refresh(refresh_token, user_id).await }
                .instrument(tracing::info_span!("token_refresh")),
        );
    }
}

impl Shared {
    async fn refresh(&self, refresh_token: String, user_id: String) {
        let guard = ReleaseGuard {
            shared: self,
            released: false,
        };

        tracing::info!("Refreshing access token");
        let outcome = match self.endpoint.refresh(&refresh_token, &user_id).await {
            Ok(tokens) => {
                match self
                    .credentials
                    .update_tokens(&tokens.access_token, tokens.refresh_token.as_deref())
                {
                    Ok(true) => Ok(Credentials {
                        access_token: tokens.access_token,
                        refresh_token: tokens.refresh_token.or(Some(refresh_token)),
                    }),
                    Ok(false) => Err(RefreshError::SessionClosed),
                    Err(e) => Err(RefreshError::Rejected(format!(
                        "refreshed tokens could not be stored: {}",
                        e
                    ))),
                }
            }
            Err(failure) => Err(RefreshError::Rejected(failure.to_string())),
        };

        match &outcome {
            Ok(_) => tracing::info!("Access token refreshed"),
            Err(RefreshError::Rejected(reason)) => {
                tracing::warn!(reason = %reason, "Token refresh failed");
                self.escalation.on_unrecoverable(reason);
            }
            Err(RefreshError::SessionClosed) => {
                tracing::info!("Session closed during refresh; discarding new tokens");
            }
            Err(RefreshError::Abandoned) => {}
        }

        guard.release(outcome);
    }

    /// Return to `Idle` and hand `outcome` to every queued waiter.
    ///
    /// Returns the tickets in the order they were released.
    fn release(&self, outcome: RefreshOutcome) -> Vec<u64> {
        let waiters = match std::mem::replace(&mut *self.state.lock(), RefreshState::Idle) {
            RefreshState::Refreshing { waiters, .. } => waiters,
            RefreshState::Idle => VecDeque::new(),
        };

        let mut released = Vec::with_capacity(waiters.len());
        for Waiter { ticket, sender } in waiters {
            // A closed receiver means that caller went away.
            let _ = sender.send(outcome.clone());
            released.push(ticket);
        }

        tracing::debug!(
            order = ?released,
            success = outcome.is_ok(),
            "Released refresh waiters"
        );
        released
    }
}

/// Releases waiters even if the refresh task is torn down mid-flight
/// (runtime shutdown or a panicking endpoint).
struct ReleaseGuard<'a> {
    shared: &'a Shared,
    released: bool,
}

impl ReleaseGuard<'_> {
    fn release(mut self, outcome: RefreshOutcome) {
        self.released = true;
        self.shared.release(outcome);
    }
}

impl Drop for ReleaseGuard<'_> {
    fn drop(&mut self) {
        if !self.released {
            tracing::warn!("Refresh abandoned before completion");
            self.shared.release(Err(RefreshError::Abandoned));
        }
    }
}
