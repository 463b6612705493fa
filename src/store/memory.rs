//! In-process session store.

use crate::core::{Activity, Archive, Session, SessionBucket, SessionCounters};
use crate::store::{SessionStore, StoreError};
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use std::sync::{Mutex, MutexGuard};

/// Everything a local store holds.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct StoreState {
    #[serde(default)]
    pub sessions: Vec<Session>,
    #[serde(default)]
    pub archives: Vec<Archive>,
}

impl StoreState {
    pub fn current_session(&self, bucket: &SessionBucket) -> Result<Session, StoreError> {
        self.sessions
            .iter()
            .find(|s| s.start == bucket.start && s.end == bucket.end)
            .cloned()
            .ok_or_else(|| StoreError::NotFound(format!("session starting {}", bucket.start)))
    }

    pub fn insert_session(&mut self, session: &Session) -> Result<(), StoreError> {
        let taken = self.sessions.iter().any(|s| {
            s.id == session.id || (s.start == session.start && s.end == session.end)
        });
        if taken {
            return Err(StoreError::Conflict(format!(
                "session starting {}",
                session.start
            )));
        }
        self.sessions.push(session.clone());
        Ok(())
    }

    pub fn update_session_activity(
        &mut self,
        id: &str,
        activity: &[Activity],
    ) -> Result<(), StoreError> {
        self.session_mut(id)?.activity = activity.to_vec();
        Ok(())
    }

    pub fn update_session_counters(
        &mut self,
        id: &str,
        counters: &SessionCounters,
    ) -> Result<(), StoreError> {
        self.session_mut(id)?.counters = *counters;
        Ok(())
    }

    pub fn current_archive(&self, date: &str) -> Result<Archive, StoreError> {
        self.archives
            .iter()
            .find(|a| a.date == date)
            .cloned()
            .ok_or_else(|| StoreError::NotFound(format!("archive for {date}")))
    }

    pub fn insert_archive(&mut self, archive: &Archive) -> Result<(), StoreError> {
        if self
            .archives
            .iter()
            .any(|a| a.id == archive.id || a.date == archive.date)
        {
            return Err(StoreError::Conflict(format!("archive for {}", archive.date)));
        }
        self.archives.push(archive.clone());
        Ok(())
    }

    pub fn update_archive_sessions(
        &mut self,
        id: &str,
        sessions: &[Session],
    ) -> Result<(), StoreError> {
        let archive = self
            .archives
            .iter_mut()
            .find(|a| a.id == id)
            .ok_or_else(|| StoreError::NotFound(format!("archive {id}")))?;
        archive.sessions = sessions.to_vec();
        Ok(())
    }

    pub fn delete_sessions_older_than(&mut self, before: DateTime<Utc>) -> usize {
        let count = self.sessions.len();
        self.sessions.retain(|s| s.end >= before);
        count - self.sessions.len()
    }

    pub fn sessions_between(&self, from: DateTime<Utc>, to: DateTime<Utc>) -> Vec<Session> {
        let mut sessions: Vec<Session> = self
            .sessions
            .iter()
            .filter(|s| s.start >= from && s.end <= to)
            .cloned()
            .collect();
        sessions.sort_by_key(|s| s.start);
        sessions
    }

    fn session_mut(&mut self, id: &str) -> Result<&mut Session, StoreError> {
        self.sessions
            .iter_mut()
            .find(|s| s.id == id)
            .ok_or_else(|| StoreError::NotFound(format!("session {id}")))
    }
}

/// A store that lives only as long as the process.
#[derive(Debug, Default)]
pub struct MemoryStore {
    state: Mutex<StoreState>,
}

impl MemoryStore {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn with_state(state: StoreState) -> Self {
        Self {
            state: Mutex::new(state),
        }
    }

    /// A copy of the current contents.
    pub fn state(&self) -> Result<StoreState, StoreError> {
        Ok(self.lock()?.clone())
    }

    fn lock(&self) -> Result<MutexGuard<'_, StoreState>, StoreError> {
        self.state
            .lock()
            .map_err(|_| StoreError::Backend("store lock poisoned".to_string()))
    }
}

impl SessionStore for MemoryStore {
    fn current_session(&self, bucket: &SessionBucket) -> Result<Session, StoreError> {
        self.lock()?.current_session(bucket)
    }

    fn insert_session(&self, session: &Session) -> Result<(), StoreError> {
        self.lock()?.insert_session(session)
    }

    fn update_session_activity(&self, id: &str, activity: &[Activity]) -> Result<(), StoreError> {
        self.lock()?.update_session_activity(id, activity)
    }

    fn update_session_counters(
        &self,
        id: &str,
        counters: &SessionCounters,
    ) -> Result<(), StoreError> {
        self.lock()?.update_session_counters(id, counters)
    }

    fn current_archive(&self, date: &str) -> Result<Archive, StoreError> {
        self.lock()?.current_archive(date)
    }

    fn insert_archive(&self, archive: &Archive) -> Result<(), StoreError> {
        self.lock()?.insert_archive(archive)
    }

    fn update_archive_sessions(&self, id: &str, sessions: &[Session]) -> Result<(), StoreError> {
        self.lock()?.update_archive_sessions(id, sessions)
    }

    fn delete_sessions_older_than(&self, before: DateTime<Utc>) -> Result<usize, StoreError> {
        Ok(self.lock()?.delete_sessions_older_than(before))
    }

    fn sessions_between(
        &self,
        from: DateTime<Utc>,
        to: DateTime<Utc>,
    ) -> Result<Vec<Session>, StoreError> {
        Ok(self.lock()?.sessions_between(from, to))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::{Duration, TimeZone};
    use chrono_tz::Tz;

    fn bucket(h: u32, m: u32) -> SessionBucket {
        let now = Utc.with_ymd_and_hms(2024, 3, 9, h, m, 0).unwrap();
        SessionBucket::containing(now, Duration::minutes(30))
    }

    #[test]
    fn test_current_session_not_found_then_found() {
        let store = MemoryStore::new();
        let b = bucket(10, 5);
        assert!(store.current_session(&b).unwrap_err().is_not_found());

        let session = Session::new(b, Vec::new());
        store.insert_session(&session).unwrap();
        assert_eq!(store.current_session(&b).unwrap().id, session.id);
    }

    #[test]
    fn test_one_session_per_bucket() {
        let store = MemoryStore::new();
        let b = bucket(10, 5);
        store.insert_session(&Session::new(b, Vec::new())).unwrap();

        let err = store.insert_session(&Session::new(b, Vec::new())).unwrap_err();
        assert!(err.is_conflict());
        assert_eq!(store.state().unwrap().sessions.len(), 1);
    }

    #[test]
    fn test_updates_overwrite_and_reject_unknown() {
        let store = MemoryStore::new();
        let session = Session::new(bucket(10, 5), Vec::new());
        store.insert_session(&session).unwrap();

        let counters = SessionCounters {
            key_presses: 9,
            ..Default::default()
        };
        store.update_session_counters(&session.id, &counters).unwrap();
        store.update_session_counters(&session.id, &counters).unwrap();
        assert_eq!(
            store.current_session(&session.bucket()).unwrap().counters,
            counters
        );

        assert!(store
            .update_session_activity("missing", &[])
            .unwrap_err()
            .is_not_found());
    }

    #[test]
    fn test_archive_per_day() {
        let store = MemoryStore::new();
        let now = Utc.with_ymd_and_hms(2024, 3, 9, 12, 0, 0).unwrap();
        let archive = Archive::new(now, Tz::UTC);
        store.insert_archive(&archive).unwrap();

        assert!(store
            .insert_archive(&Archive::new(now, Tz::UTC))
            .unwrap_err()
            .is_conflict());
        assert_eq!(store.current_archive("2024-03-09").unwrap().id, archive.id);
        assert!(store.current_archive("2024-03-10").unwrap_err().is_not_found());
    }

    #[test]
    fn test_range_and_delete() {
        let store = MemoryStore::new();
        for (h, m) in [(11, 0), (9, 0), (10, 0)] {
            store.insert_session(&Session::new(bucket(h, m), Vec::new())).unwrap();
        }

        let from = Utc.with_ymd_and_hms(2024, 3, 9, 9, 0, 0).unwrap();
        let to = Utc.with_ymd_and_hms(2024, 3, 9, 11, 0, 0).unwrap();
        let between = store.sessions_between(from, to).unwrap();
        assert_eq!(between.len(), 2);
        assert!(between[0].start < between[1].start);

        let cutoff = Utc.with_ymd_and_hms(2024, 3, 9, 10, 45, 0).unwrap();
        assert_eq!(store.delete_sessions_older_than(cutoff).unwrap(), 2);
        assert_eq!(store.state().unwrap().sessions.len(), 1);
    }
}
