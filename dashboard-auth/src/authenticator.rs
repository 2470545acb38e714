use crate::credentials::{CredentialProvider, Credentials};
use crate::transport::RequestDescriptor;
use http::header::{HeaderName, HeaderValue, AUTHORIZATION};

/// Attaches bearer credentials to outgoing request descriptors.
#[derive(Clone)]
pub struct RequestAuthenticator {
    credentials: CredentialProvider,
    refresh_header: HeaderName,
}

impl RequestAuthenticator {
    pub fn new(credentials: CredentialProvider, refresh_header: HeaderName) -> Self {
        Self {
            credentials,
            refresh_header,
        }
    }

    /// Attach the current session's credentials.
    ///
    /// Without an access token the descriptor is returned unchanged and the
    /// request goes out unauthenticated.
    pub fn attach(&self, request: &RequestDescriptor) -> RequestDescriptor {
        self.attach_current(request).0
    }

    /// Like [`attach`](Self::attach), also returning the credentials used.
    pub fn attach_current(
        &self,
        request: &RequestDescriptor,
    ) -> (RequestDescriptor, Option<Credentials>) {
        let Some(credentials) = self.credentials.credentials() else {
            tracing::debug!(url = %request.url(), "No access token; sending unauthenticated");
            return (request.clone(), None);
        };

        match self.try_attach(request, &credentials) {
            Some(attached) => (attached, Some(credentials)),
            None => (request.clone(), None),
        }
    }

    /// Attach an explicit credential snapshot to a copy of `request`.
    ///
    /// An access token that is not a valid header value is not attached.
    pub fn attach_credentials(
        &self,
        request: &RequestDescriptor,
        credentials: &Credentials,
    ) -> RequestDescriptor {
        self.try_attach(request, credentials)
            .unwrap_or_else(|| request.clone())
    }

    fn try_attach(
        &self,
        request: &RequestDescriptor,
        credentials: &Credentials,
    ) -> Option<RequestDescriptor> {
        let mut derived = request.clone();

        match HeaderValue::from_str(&format!("Bearer {}", credentials.access_token)) {
            Ok(mut value) => {
                value.set_sensitive(true);
                derived = derived.with_header(AUTHORIZATION, value);
            }
            Err(_) => {
                tracing::warn!(
                    url = %request.url(),
                    "Access token is not a valid header value; not attached"
                );
                return None;
            }
        }

        if let Some(refresh) = credentials.refresh_token.as_deref() {
            if let Ok(mut value) = HeaderValue::from_str(refresh) {
                value.set_sensitive(true);
                derived = derived.with_header(self.refresh_header.clone(), value);
            }
        }

        Some(derived)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::session::{Persistence, SessionRecord, SessionStore};
    use std::sync::Arc;

    fn authenticator(record: Option<SessionRecord>) -> RequestAuthenticator {
        let store = Arc::new(SessionStore::in_memory());
        if let Some(record) = record {
            store.set(&record, Persistence::Session).unwrap();
        }
        RequestAuthenticator::new(
            CredentialProvider::new(store),
            HeaderName::from_static("x-refresh-token"),
        )
    }

    #[test]
    fn test_attach_adds_bearer_and_refresh_headers() {
        let auth = authenticator(Some(
            SessionRecord::new("A1", Some("R1".to_string()), "u").unwrap(),
        ));
        let request = RequestDescriptor::get("/api/widgets");

        let attached = auth.attach(&request);

        assert_eq!(attached.headers().get(AUTHORIZATION).unwrap(), "Bearer A1");
        assert_eq!(attached.headers().get("x-refresh-token").unwrap(), "R1");
        assert!(request.headers().is_empty());
    }

    #[test]
    fn test_attach_without_refresh_token_adds_only_bearer() {
        let auth = authenticator(Some(SessionRecord::new("A1", None, "u").unwrap()));

        let attached = auth.attach(&RequestDescriptor::get("/api/widgets"));

        assert_eq!(attached.headers().get(AUTHORIZATION).unwrap(), "Bearer A1");
        assert!(attached.headers().get("x-refresh-token").is_none());
    }

    #[test]
    fn test_attach_without_session_returns_request_unchanged() {
        let auth = authenticator(None);
        let request = RequestDescriptor::get("/api/widgets");

        let attached = auth.attach(&request);

        assert!(attached.headers().is_empty());
        assert_eq!(attached.url(), request.url());
    }

    #[test]
    fn test_unattachable_token_is_not_reported_as_sent() {
        let auth = authenticator(Some(
            SessionRecord::new("A1\nX", Some("R1".to_string()), "u").unwrap(),
        ));
        let request = RequestDescriptor::get("/api/widgets");

        let (attached, sent_with) = auth.attach_current(&request);

        assert!(attached.headers().get(AUTHORIZATION).is_none());
        assert!(attached.headers().get("x-refresh-token").is_none());
        assert_eq!(sent_with, None);
    }

    #[test]
    fn test_attach_credentials_overrides_stale_authorization() {
        let auth = authenticator(None);
        let stale = RequestDescriptor::get("/api/widgets")
            .with_header(AUTHORIZATION, HeaderValue::from_static("Bearer A1"));
        let fresh = Credentials {
            access_token: "A2".to_string(),
            refresh_token: None,
        };

        let attached = auth.attach_credentials(&stale, &fresh);

        assert_eq!(attached.headers().get(AUTHORIZATION).unwrap(), "Bearer A2");
    }
}
