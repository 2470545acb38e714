//! Terminal failure path: end the session and send the user to login.

use crate::credentials::CredentialProvider;
use std::sync::Arc;
use tokio::sync::broadcast;

/// Navigation requests emitted by the pipeline.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum NavigationEvent {
    /// Go to the unauthenticated entry point, discarding in-flight UI state.
    Login,
}

/// The routing layer, as far as the pipeline needs it.
pub trait Navigator: Send + Sync {
    /// Fire-and-forget.
    fn redirect_to_login(&self);
}

/// Publishes navigation events to any number of UI subscribers.
pub struct BroadcastNavigator {
    sender: broadcast::Sender<NavigationEvent>,
}

impl BroadcastNavigator {
    pub fn new(capacity: usize) -> Self {
        let (sender, _) = broadcast::channel(capacity);
        Self { sender }
    }

    pub fn subscribe(&self) -> broadcast::Receiver<NavigationEvent> {
        self.sender.subscribe()
    }
}

impl Default for BroadcastNavigator {
    fn default() -> Self {
        Self::new(16)
    }
}

impl Navigator for BroadcastNavigator {
    fn redirect_to_login(&self) {
        // No subscribers is fine: nobody is rendering.
        if self.sender.send(NavigationEvent::Login).is_err() {
            tracing::debug!("Login redirect requested with no navigation subscribers");
        }
    }
}

#[derive(Clone)]
pub struct FailureEscalation {
    credentials: CredentialProvider,
    navigator: Arc<dyn Navigator>,
}

impl FailureEscalation {
    pub fn new(credentials: CredentialProvider, navigator: Arc<dyn Navigator>) -> Self {
        Self {
            credentials,
            navigator,
        }
    }

    /// Clear the session and redirect to login.
    ///
    /// Does nothing when no session is held. Returns whether it escalated.
    pub fn on_unrecoverable(&self, reason: &str) -> bool {
        if !self.credentials.has_session() {
            tracing::debug!(reason, "Session already cleared; escalation skipped");
            return false;
        }

        tracing::warn!(reason, "Unrecoverable authentication failure; ending session");

        if let Err(e) = self.credentials.clear() {
            tracing::error!(error = %e, "Failed to clear session during escalation");
        }
        self.navigator.redirect_to_login();
        true
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::session::{Persistence, SessionRecord, SessionStore};

    fn provider_with_session() -> CredentialProvider {
        let store = Arc::new(SessionStore::in_memory());
        store
            .set(
                &SessionRecord::new("A1", None, "u").unwrap(),
                Persistence::Session,
            )
            .unwrap();
        CredentialProvider::new(store)
    }

    #[test]
    fn test_escalation_clears_session_and_redirects_once() {
        let credentials = provider_with_session();
        let navigator = Arc::new(BroadcastNavigator::default());
        let mut events = navigator.subscribe();
        let escalation = FailureEscalation::new(credentials.clone(), navigator);

        assert!(escalation.on_unrecoverable("refresh token missing"));
        assert!(!credentials.has_session());
        assert_eq!(events.try_recv().unwrap(), NavigationEvent::Login);

        // Already cleared: no second redirect.
        assert!(!escalation.on_unrecoverable("refresh token missing"));
        assert!(events.try_recv().is_err());
    }

    #[test]
    fn test_escalation_without_session_is_noop() {
        let credentials = provider_with_session();
        credentials.clear().unwrap();
        let escalation =
            FailureEscalation::new(credentials, Arc::new(BroadcastNavigator::default()));

        assert!(!escalation.on_unrecoverable("refresh rejected"));
    }

    #[test]
    fn test_redirect_without_subscribers_does_not_panic() {
        BroadcastNavigator::new(1).redirect_to_login();
    }
}
