//! Persistence of sessions and archives.
//!
//! The monitor talks to storage only through [`SessionStore`]. Lookups
//! return [`StoreError::NotFound`] when nothing matches, updates overwrite
//! the named fields of an existing record, and inserts fail with
//! [`StoreError::Conflict`] when the bucket (or day) is already taken.

pub mod json;
pub mod memory;
#[cfg(feature = "remote")]
pub mod remote;

use crate::core::{Activity, Archive, Session, SessionBucket, SessionCounters};
use chrono::{DateTime, Utc};
use thiserror::Error;

pub use json::JsonStore;
pub use memory::{MemoryStore, StoreState};
#[cfg(feature = "remote")]
pub use remote::{BlockingRemoteStore, RemoteStore, RemoteStoreConfig};

/// Store errors.
#[derive(Debug, Error)]
pub enum StoreError {
    /// No record for the requested key. Expected when a new bucket or day
    /// starts.
    #[error("{0} not found")]
    NotFound(String),
    /// A record for the same bucket, day or id already exists.
    #[error("{0} already exists")]
    Conflict(String),
    /// Any other backend failure.
    #[error("store backend error: {0}")]
    Backend(String),
    #[error("store serialization error: {0}")]
    Serialization(#[from] serde_json::Error),
    #[error("store IO error: {0}")]
    Io(#[from] std::io::Error),
}

impl StoreError {
    pub fn is_not_found(&self) -> bool {
        matches!(self, StoreError::NotFound(_))
    }

    pub fn is_conflict(&self) -> bool {
        matches!(self, StoreError::Conflict(_))
    }
}

/// Operations the monitor needs from a persistence backend.
pub trait SessionStore {
    /// The session whose bounds equal `bucket`.
    fn current_session(&self, bucket: &SessionBucket) -> Result<Session, StoreError>;

    fn insert_session(&self, session: &Session) -> Result<(), StoreError>;

    /// Overwrite the activity list of session `id`.
    fn update_session_activity(&self, id: &str, activity: &[Activity]) -> Result<(), StoreError>;

    /// Overwrite the counter totals of session `id`.
    fn update_session_counters(
        &self,
        id: &str,
        counters: &SessionCounters,
    ) -> Result<(), StoreError>;

    /// The archive for calendar day `date` (`YYYY-MM-DD`).
    fn current_archive(&self, date: &str) -> Result<Archive, StoreError>;

    fn insert_archive(&self, archive: &Archive) -> Result<(), StoreError>;

    /// Overwrite the session list of archive `id`.
    fn update_archive_sessions(&self, id: &str, sessions: &[Session]) -> Result<(), StoreError>;

    /// Delete sessions that ended before `before`. Returns how many were
    /// removed when the backend reports it.
    fn delete_sessions_older_than(&self, before: DateTime<Utc>) -> Result<usize, StoreError>;

    /// Sessions lying entirely within `[from, to]`, ordered by start.
    fn sessions_between(
        &self,
        from: DateTime<Utc>,
        to: DateTime<Utc>,
    ) -> Result<Vec<Session>, StoreError>;
}

impl<S: SessionStore + ?Sized> SessionStore for Box<S> {
    fn current_session(&self, bucket: &SessionBucket) -> Result<Session, StoreError> {
        (**self).current_session(bucket)
    }

    fn insert_session(&self, session: &Session) -> Result<(), StoreError> {
        (**self).insert_session(session)
    }

    fn update_session_activity(&self, id: &str, activity: &[Activity]) -> Result<(), StoreError> {
        (**self).update_session_activity(id, activity)
    }

    fn update_session_counters(
        &self,
        id: &str,
        counters: &SessionCounters,
    ) -> Result<(), StoreError> {
        (**self).update_session_counters(id, counters)
    }

    fn current_archive(&self, date: &str) -> Result<Archive, StoreError> {
        (**self).current_archive(date)
    }

    fn insert_archive(&self, archive: &Archive) -> Result<(), StoreError> {
        (**self).insert_archive(archive)
    }

    fn update_archive_sessions(&self, id: &str, sessions: &[Session]) -> Result<(), StoreError> {
        (**self).update_archive_sessions(id, sessions)
    }

    fn delete_sessions_older_than(&self, before: DateTime<Utc>) -> Result<usize, StoreError> {
        (**self).delete_sessions_older_than(before)
    }

    fn sessions_between(
        &self,
        from: DateTime<Utc>,
        to: DateTime<Utc>,
    ) -> Result<Vec<Session>, StoreError> {
        (**self).sessions_between(from, to)
    }
}
