//! Session record storage.
//!
//! A [`SessionStore`] owns two [`SessionBackend`]s: a persistent one (survives
//! restarts, "remember me") and a session-scoped one. The backend holding the
//! record is chosen when the session is established and remembered. Reads and
//! write-backs go to that backend only and never touch the other one.

pub mod file;
pub mod memory;

pub use file::FileBackend;
pub use memory::MemoryBackend;

use crate::error::SessionError;
use parking_lot::Mutex;
use serde::{Deserialize, Deserializer, Serialize};
use serde_json::{Map, Value};
use std::sync::Arc;

/// The current user's credentials plus arbitrary profile fields.
///
/// The access token is never empty. This is checked on construction, on
/// rotation and on deserialization.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(try_from = "SessionRecordWire", into = "SessionRecordWire")]
pub struct SessionRecord {
    access_token: String,
    refresh_token: Option<String>,
    user_id: String,
    profile: Map<String, Value>,
}

#[derive(Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
struct SessionRecordWire {
    #[serde(alias = "access_token")]
    access_token: String,
    #[serde(
        default,
        alias = "refresh_token",
        skip_serializing_if = "Option::is_none"
    )]
    refresh_token: Option<String>,
    #[serde(alias = "user_id", deserialize_with = "string_or_number")]
    user_id: String,
    #[serde(flatten)]
    profile: Map<String, Value>,
}

fn string_or_number<'de, D>(deserializer: D) -> Result<String, D::Error>
where
    D: Deserializer<'de>,
{
    match Value::deserialize(deserializer)? {
        Value::String(s) => Ok(s),
        Value::Number(n) => Ok(n.to_string()),
        other => Err(serde::de::Error::custom(format!(
            "expected string or number user id, got {}",
            other
        ))),
    }
}

impl TryFrom<SessionRecordWire> for SessionRecord {
    type Error = SessionError;

    fn try_from(wire: SessionRecordWire) -> Result<Self, Self::Error> {
        let mut record = SessionRecord::new(wire.access_token, wire.refresh_token, wire.user_id)?;
        record.profile = wire.profile;
        Ok(record)
    }
}

impl From<SessionRecord> for SessionRecordWire {
    fn from(record: SessionRecord) -> Self {
        Self {
            access_token: record.access_token,
            refresh_token: record.refresh_token,
            user_id: record.user_id,
            profile: record.profile,
        }
    }
}

impl SessionRecord {
    pub fn new(
        access_token: impl Into<String>,
        refresh_token: Option<String>,
        user_id: impl Into<String>,
    ) -> Result<Self, SessionError> {
        let access_token = access_token.into();
        if access_token.is_empty() {
            return Err(SessionError::EmptyAccessToken);
        }

        Ok(Self {
            access_token,
            refresh_token: refresh_token.filter(|t| !t.is_empty()),
            user_id: user_id.into(),
            profile: Map::new(),
        })
    }

    pub fn with_profile_field(mut self, key: impl Into<String>, value: Value) -> Self {
        self.profile.insert(key.into(), value);
        self
    }

    pub fn access_token(&self) -> &str {
        &self.access_token
    }

    pub fn refresh_token(&self) -> Option<&str> {
        self.refresh_token.as_deref()
    }

    pub fn user_id(&self) -> &str {
        &self.user_id
    }

    pub fn profile(&self) -> &Map<String, Value> {
        &self.profile
    }

    /// Replace the access token, and the refresh token only when a non-empty
    /// one is given.
    pub fn rotate(
        &mut self,
        access_token: &str,
        refresh_token: Option<&str>,
    ) -> Result<(), SessionError> {
        if access_token.is_empty() {
            return Err(SessionError::EmptyAccessToken);
        }
        self.access_token = access_token.to_string();

        if let Some(refresh) = refresh_token.filter(|t| !t.is_empty()) {
            self.refresh_token = Some(refresh.to_string());
        }
        Ok(())
    }
}

/// Which backend holds the session.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Persistence {
    /// Survives restarts.
    Persistent,
    /// Lives as long as the process.
    Session,
}

/// A single place a session record can live.
pub trait SessionBackend: Send + Sync {
    fn name(&self) -> &'static str;

    fn load(&self) -> Result<Option<SessionRecord>, SessionError>;

    fn save(&self, record: &SessionRecord) -> Result<(), SessionError>;

    fn clear(&self) -> Result<(), SessionError>;
}

/// Session storage capability with one authoritative backend per session.
pub struct SessionStore {
    persistent: Arc<dyn SessionBackend>,
    ephemeral: Arc<dyn SessionBackend>,
    active: Mutex<Option<Persistence>>,
}

impl SessionStore {
    /// Build a store and restore a previously established session.
    ///
    /// The backends are checked once here (persistent first). Afterwards
    /// only the active backend is consulted.
    pub fn open(persistent: Arc<dyn SessionBackend>, ephemeral: Arc<dyn SessionBackend>) -> Self {
        let active = if holds_session(persistent.as_ref()) {
            Some(Persistence::Persistent)
        } else if holds_session(ephemeral.as_ref()) {
            Some(Persistence::Session)
        } else {
            None
        };

        tracing::debug!(active = ?active, "Session store opened");

        Self {
            persistent,
            ephemeral,
            active: Mutex::new(active),
        }
    }

    /// Store with two in-memory backends. Nothing survives the process.
    pub fn in_memory() -> Self {
        Self::open(
            Arc::new(MemoryBackend::default()),
            Arc::new(MemoryBackend::default()),
        )
    }

    pub fn active(&self) -> Option<Persistence> {
        *self.active.lock()
    }

    pub fn get(&self) -> Option<SessionRecord> {
        let active = *self.active.lock();
        let backend = self.backend(active?);

        match backend.load() {
            Ok(record) => record,
            Err(e) => {
                tracing::warn!(
                    backend = backend.name(),
                    error = %e,
                    "Failed to read session record"
                );
                None
            }
        }
    }

    /// Establish `record` in the chosen backend; the other backend is emptied.
    pub fn set(
        &self,
        record: &SessionRecord,
        persistence: Persistence,
    ) -> Result<(), SessionError> {
        let mut active = self.active.lock();

        let (chosen, other) = match persistence {
            Persistence::Persistent => (&self.persistent, &self.ephemeral),
            Persistence::Session => (&self.ephemeral, &self.persistent),
        };
        other.clear()?;
        chosen.save(record)?;
        *active = Some(persistence);

        tracing::debug!(backend = chosen.name(), "Session established");
        Ok(())
    }

    /// Mutate the record in the backend that holds it.
    ///
    /// Returns `Ok(false)` without calling `f` when no backend holds a session.
    pub fn update<F>(&self, f: F) -> Result<bool, SessionError>
    where
        F: FnOnce(&mut SessionRecord) -> Result<(), SessionError>,
    {
        let active = self.active.lock();
        let Some(persistence) = *active else {
            return Ok(false);
        };

        let backend = self.backend(persistence);
        let Some(mut record) = backend.load()? else {
            return Ok(false);
        };
        f(&mut record)?;
        backend.save(&record)?;
        Ok(true)
    }

    /// Remove the record from both backends.
    pub fn clear(&self) -> Result<(), SessionError> {
        let mut active = self.active.lock();
        *active = None;

        let persistent = self.persistent.clear();
        let ephemeral = self.ephemeral.clear();
        persistent.and(ephemeral)
    }

    fn backend(&self, persistence: Persistence) -> &dyn SessionBackend {
        match persistence {
            Persistence::Persistent => self.persistent.as_ref(),
            Persistence::Session => self.ephemeral.as_ref(),
        }
    }
}

fn holds_session(backend: &dyn SessionBackend) -> bool {
    match backend.load() {
        Ok(record) => record.is_some(),
        Err(e) => {
            tracing::warn!(
                backend = backend.name(),
                error = %e,
                "Ignoring unreadable session record"
            );
            false
        }
    }
}
