//! Day-scoped collections of finished sessions.

use crate::core::session::Session;
use chrono::{DateTime, Utc};
use chrono_tz::Tz;
use serde::{Deserialize, Serialize};
use uuid::Uuid;

/// Format of [`Archive::date`].
pub const DATE_FORMAT: &str = "%Y-%m-%d";

/// All archived sessions of one calendar day.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Archive {
    pub id: String,
    pub created: DateTime<Utc>,
    /// Calendar day, `YYYY-MM-DD`
    pub date: String,
    #[serde(default)]
    pub sessions: Vec<Session>,
}

impl Archive {
    /// An empty archive for the day containing `now` in `tz`.
    pub fn new(now: DateTime<Utc>, tz: Tz) -> Self {
        Self::dated(archive_date(now, tz), now)
    }

    /// An empty archive for an explicit `date`, created at `created`.
    pub fn dated(date: impl Into<String>, created: DateTime<Utc>) -> Self {
        Self {
            id: Uuid::new_v4().to_string(),
            created,
            date: date.into(),
            sessions: Vec::new(),
        }
    }

    /// Whether a session with the same id is already archived here.
    pub fn contains(&self, session: &Session) -> bool {
        self.sessions.iter().any(|s| s.id == session.id)
    }

    /// Append `session` unless it is already archived. Returns whether it
    /// was added.
    pub fn add(&mut self, session: Session) -> bool {
        if self.contains(&session) {
            return false;
        }
        self.sessions.push(session);
        true
    }
}

/// The calendar day of `now` in `tz`, formatted as an archive date.
pub fn archive_date(now: DateTime<Utc>, tz: Tz) -> String {
    now.with_timezone(&tz).format(DATE_FORMAT).to_string()
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::core::session::SessionBucket;
    use chrono::{Duration, TimeZone};

    fn session_at(h: u32) -> Session {
        let now = Utc.with_ymd_and_hms(2024, 3, 9, h, 0, 0).unwrap();
        Session::new(SessionBucket::containing(now, Duration::minutes(30)), Vec::new())
    }

    #[test]
    fn test_contains_by_id() {
        let now = Utc.with_ymd_and_hms(2024, 3, 9, 12, 0, 0).unwrap();
        let mut archive = Archive::new(now, Tz::UTC);
        let first = session_at(8);
        let second = session_at(9);

        assert!(archive.add(first.clone()));
        assert!(archive.contains(&first));
        assert!(!archive.contains(&second));
        assert!(!archive.add(first));
        assert_eq!(archive.sessions.len(), 1);
    }

    #[test]
    fn test_archive_date_uses_timezone() {
        let now = Utc.with_ymd_and_hms(2024, 3, 9, 3, 0, 0).unwrap();
        assert_eq!(archive_date(now, Tz::UTC), "2024-03-09");
        assert_eq!(archive_date(now, Tz::America__New_York), "2024-03-08");
    }
}
