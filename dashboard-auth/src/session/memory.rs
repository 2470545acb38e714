use super::{SessionBackend, SessionRecord};
use crate::error::SessionError;
use parking_lot::RwLock;

/// Session-scoped backend: the record lives only as long as the process.
#[derive(Default)]
pub struct MemoryBackend {
    record: RwLock<Option<SessionRecord>>,
}

impl SessionBackend for MemoryBackend {
    fn name(&self) -> &'static str {
        "memory"
    }

    fn load(&self) -> Result<Option<SessionRecord>, SessionError> {
        Ok(self.record.read().clone())
    }

    fn save(&self, record: &SessionRecord) -> Result<(), SessionError> {
        *self.record.write() = Some(record.clone());
        Ok(())
    }

    fn clear(&self) -> Result<(), SessionError> {
        *self.record.write() = None;
        Ok(())
    }
}
