//! Session store persisted to a local JSON file.
//!
//! The whole state is rewritten after every successful write. Writes go to a
//! sibling temporary file first and are then renamed over the target.

use crate::core::{Activity, Archive, Session, SessionBucket, SessionCounters};
use crate::store::memory::StoreState;
use crate::store::{SessionStore, StoreError};
use chrono::{DateTime, Utc};
use std::path::{Path, PathBuf};
use std::sync::{Mutex, MutexGuard};

pub struct JsonStore {
    path: PathBuf,
    state: Mutex<StoreState>,
}

impl JsonStore {
    /// Open the store at `path`, starting empty when the file is absent.
    pub fn open(path: impl Into<PathBuf>) -> Result<Self, StoreError> {
        let path = path.into();
        let state = if path.exists() {
            let content = std::fs::read_to_string(&path)?;
            if content.trim().is_empty() {
                StoreState::default()
            } else {
                serde_json::from_str(&content)?
            }
        } else {
            StoreState::default()
        };

        tracing::debug!(
            path = %path.display(),
            sessions = state.sessions.len(),
            archives = state.archives.len(),
            "opened json store"
        );

        Ok(Self {
            path,
            state: Mutex::new(state),
        })
    }

    pub fn path(&self) -> &Path {
        &self.path
    }

    fn lock(&self) -> Result<MutexGuard<'_, StoreState>, StoreError> {
        self.state
            .lock()
            .map_err(|_| StoreError::Backend("store lock poisoned".to_string()))
    }

    fn read<T>(&self, f: impl FnOnce(&StoreState) -> Result<T, StoreError>) -> Result<T, StoreError> {
        let state = self.lock()?;
        f(&state)
    }

    /// Apply `f` and persist the result. The in-memory state is only
    /// replaced once the file has been written.
    fn write<T>(
        &self,
        f: impl FnOnce(&mut StoreState) -> Result<T, StoreError>,
    ) -> Result<T, StoreError> {
        let mut state = self.lock()?;
        let mut next = state.clone();
        let out = f(&mut next)?;
        self.persist(&next)?;
        *state = next;
        Ok(out)
    }

    fn persist(&self, state: &StoreState) -> Result<(), StoreError> {
        if let Some(parent) = self.path.parent() {
            std::fs::create_dir_all(parent)?;
        }

        let json = serde_json::to_string_pretty(state)?;
        let tmp = self.path.with_extension("json.tmp");
        std::fs::write(&tmp, json)?;
        std::fs::rename(&tmp, &self.path)?;
        Ok(())
    }
}

impl SessionStore for JsonStore {
    fn current_session(&self, bucket: &SessionBucket) -> Result<Session, StoreError> {
        self.read(|s| s.current_session(bucket))
    }

    fn insert_session(&self, session: &Session) -> Result<(), StoreError> {
        self.write(|s| s.insert_session(session))
    }

    fn update_session_activity(&self, id: &str, activity: &[Activity]) -> Result<(), StoreError> {
        self.write(|s| s.update_session_activity(id, activity))
    }

    fn update_session_counters(
        &self,
        id: &str,
        counters: &SessionCounters,
    ) -> Result<(), StoreError> {
        self.write(|s| s.update_session_counters(id, counters))
    }

    fn current_archive(&self, date: &str) -> Result<Archive, StoreError> {
        self.read(|s| s.current_archive(date))
    }

    fn insert_archive(&self, archive: &Archive) -> Result<(), StoreError> {
        self.write(|s| s.insert_archive(archive))
    }

    fn update_archive_sessions(&self, id: &str, sessions: &[Session]) -> Result<(), StoreError> {
        self.write(|s| s.update_archive_sessions(id, sessions))
    }

    fn delete_sessions_older_than(&self, before: DateTime<Utc>) -> Result<usize, StoreError> {
        self.write(|s| Ok(s.delete_sessions_older_than(before)))
    }

    fn sessions_between(
        &self,
        from: DateTime<Utc>,
        to: DateTime<Utc>,
    ) -> Result<Vec<Session>, StoreError> {
        self.read(|s| Ok(s.sessions_between(from, to)))
    }
}
