//! Persistent session backend stored as a JSON file.
//!
//! The record is cached in memory after the first read; every save writes
//! through to disk via a temporary file and a rename, so a crash never leaves
//! a half-written record behind.

use super::{SessionBackend, SessionRecord};
use crate::error::SessionError;
use parking_lot::RwLock;
use std::fs;
use std::io::ErrorKind;
use std::path::{Path, PathBuf};

pub struct FileBackend {
    path: PathBuf,
    cache: RwLock<Option<SessionRecord>>,
}

impl FileBackend {
    /// Open the backend, reading any record already on disk.
    ///
    /// A record that cannot be parsed is discarded with a warning; the user
    /// simply has to log in again.
    pub fn open(path: impl Into<PathBuf>) -> Result<Self, SessionError> {
        let path = path.into();
        let cached = match read_record(&path) {
            Ok(record) => record,
            Err(SessionError::Io(e)) => return Err(SessionError::Io(e)),
            Err(e) => {
                tracing::warn!(
                    path = %path.display(),
                    error = %e,
                    "Discarding unreadable session file"
                );
                remove_if_exists(&path)?;
                None
            }
        };

        Ok(Self {
            path,
            cache: RwLock::new(cached),
        })
    }
}

impl SessionBackend for FileBackend {
    fn name(&self) -> &'static str {
        "file"
    }

    fn load(&self) -> Result<Option<SessionRecord>, SessionError> {
        Ok(self.cache.read().clone())
    }

    fn save(&self, record: &SessionRecord) -> Result<(), SessionError> {
        let mut cache = self.cache.write();

        if let Some(parent) = self.path.parent() {
            if !parent.as_os_str().is_empty() {
                fs::create_dir_all(parent)?;
            }
        }

        let tmp = self.path.with_extension("json.tmp");
        fs::write(&tmp, serde_json::to_vec_pretty(record)?)?;
        fs::rename(&tmp, &self.path)?;

        *cache = Some(record.clone());
        Ok(())
    }

    fn clear(&self) -> Result<(), SessionError> {
        let mut cache = self.cache.write();
        remove_if_exists(&self.path)?;
        *cache = None;
        Ok(())
    }
}

fn read_record(path: &Path) -> Result<Option<SessionRecord>, SessionError> {
    match fs::read(path) {
        Ok(bytes) => Ok(Some(serde_json::from_slice(&bytes)?)),
        Err(e) if e.kind() == ErrorKind::NotFound => Ok(None),
        Err(e) => Err(SessionError::Io(e)),
    }
}

fn remove_if_exists(path: &Path) -> Result<(), SessionError> {
    match fs::remove_file(path) {
        Ok(()) => Ok(()),
        Err(e) if e.kind() == ErrorKind::NotFound => Ok(()),
        Err(e) => Err(SessionError::Io(e)),
    }
}
