//! Credential provider: the only component that writes the session record.

use crate::error::SessionError;
use crate::session::{Persistence, SessionRecord, SessionStore};
use std::sync::Arc;

/// A snapshot of the tokens used to authenticate one request.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Credentials {
    pub access_token: String,
    pub refresh_token: Option<String>,
}

#[derive(Clone)]
pub struct CredentialProvider {
    store: Arc<SessionStore>,
}

impl CredentialProvider {
    pub fn new(store: Arc<SessionStore>) -> Self {
        Self { store }
    }

    pub fn access_token(&self) -> Option<String> {
        self.store.get().map(|r| r.access_token().to_string())
    }

    pub fn refresh_token(&self) -> Option<String> {
        self.store
            .get()
            .and_then(|r| r.refresh_token().map(str::to_string))
    }

    pub fn user_id(&self) -> Option<String> {
        self.store.get().map(|r| r.user_id().to_string())
    }

    /// Both tokens, read from a single snapshot of the record.
    pub fn credentials(&self) -> Option<Credentials> {
        self.store.get().map(|r| Credentials {
            access_token: r.access_token().to_string(),
            refresh_token: r.refresh_token().map(str::to_string),
        })
    }

    pub fn has_session(&self) -> bool {
        self.store.get().is_some()
    }

    pub fn establish(
        &self,
        record: &SessionRecord,
        persistence: Persistence,
    ) -> Result<(), SessionError> {
        self.store.set(record, persistence)
    }

    /// Write rotated tokens back to the backend holding the session.
    ///
    /// The refresh token is replaced only when a non-empty one is given.
    /// Returns `false` when no session is held, in which case nothing is written.
    pub fn update_tokens(
        &self,
        access_token: &str,
        refresh_token: Option<&str>,
    ) -> Result<bool, SessionError> {
        self.store
            .update(|record| record.rotate(access_token, refresh_token))
    }

    pub fn clear(&self) -> Result<(), SessionError> {
        self.store.clear()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn provider_with(record: Option<SessionRecord>) -> CredentialProvider {
        let store = Arc::new(SessionStore::in_memory());
        if let Some(record) = record {
            store.set(&record, Persistence::Session).unwrap();
        }
        CredentialProvider::new(store)
    }

    #[test]
    fn test_getters_without_session() {
        let provider = provider_with(None);
        assert_eq!(provider.access_token(), None);
        assert_eq!(provider.refresh_token(), None);
        assert_eq!(provider.credentials(), None);
        assert!(!provider.has_session());
    }

    #[test]
    fn test_update_without_refresh_keeps_existing_refresh_token() {
        let provider = provider_with(Some(
            SessionRecord::new("A1", Some("R1".to_string()), "u").unwrap(),
        ));

        assert!(provider.update_tokens("A2", None).unwrap());

        assert_eq!(provider.access_token().as_deref(), Some("A2"));
        assert_eq!(provider.refresh_token().as_deref(), Some("R1"));
    }

    #[test]
    fn test_update_replaces_both_tokens() {
        let provider = provider_with(Some(
            SessionRecord::new("A1", Some("R1".to_string()), "u").unwrap(),
        ));

        provider.update_tokens("A2", Some("R2")).unwrap();

        assert_eq!(
            provider.credentials(),
            Some(Credentials {
                access_token: "A2".to_string(),
                refresh_token: Some("R2".to_string()),
            })
        );
    }

    #[test]
    fn test_update_without_session_writes_nothing() {
        let provider = provider_with(None);
        assert!(!provider.update_tokens("A2", Some("R2")).unwrap());
        assert!(!provider.has_session());
    }

    #[test]
    fn test_update_rejects_empty_access_token() {
        let provider = provider_with(Some(SessionRecord::new("A1", None, "u").unwrap()));
        assert!(matches!(
            provider.update_tokens("", None),
            Err(SessionError::EmptyAccessToken)
        ));
        assert_eq!(provider.access_token().as_deref(), Some("A1"));
    }

    #[test]
    fn test_clear_drops_session() {
        let provider = provider_with(Some(SessionRecord::new("A1", None, "u").unwrap()));
        provider.clear().unwrap();
        assert!(!provider.has_session());
    }
}
