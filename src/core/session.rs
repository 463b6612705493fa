//! Time-bucketed sessions.
//!
//! A session covers one fixed interval aligned to the Unix epoch (e.g. every
//! half hour) and carries the activity ledger plus input counters for it.

use crate::collector::tracker::TrackerSnapshot;
use crate::core::activity::Activity;
use chrono::{DateTime, Duration, TimeZone, Utc};
use serde::{Deserialize, Serialize};
use uuid::Uuid;

/// Bounds of the session interval containing a point in time.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct SessionBucket {
    pub start: DateTime<Utc>,
    pub end: DateTime<Utc>,
}

impl SessionBucket {
    /// The bucket containing `now`: `now` truncated to a multiple of
    /// `interval`, spanning one interval. Intervals below one second are
    /// treated as one second.
    pub fn containing(now: DateTime<Utc>, interval: Duration) -> Self {
        let secs = interval.num_seconds().max(1);
        let interval = Duration::seconds(secs);

        let ts = now.timestamp();
        let start_ts = ts - ts.rem_euclid(secs);
        let start = Utc
            .timestamp_opt(start_ts, 0)
            .single()
            .unwrap_or(now);

        Self {
            start,
            end: start + interval,
        }
    }

    pub fn contains(&self, ts: DateTime<Utc>) -> bool {
        ts >= self.start && ts < self.end
    }
}

/// Cumulative input counters stored with a session.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct SessionCounters {
    #[serde(default)]
    pub left_clicks: u64,
    #[serde(default)]
    pub right_clicks: u64,
    #[serde(default)]
    pub middle_clicks: u64,
    #[serde(default)]
    pub key_presses: u64,
    #[serde(default)]
    pub x_mouse_movement: u64,
    #[serde(default)]
    pub y_mouse_movement: u64,
}

impl SessionCounters {
    /// Totals after adding a tracker snapshot.
    pub fn add(&self, delta: &TrackerSnapshot) -> SessionCounters {
        SessionCounters {
            left_clicks: self.left_clicks + delta.left_clicks,
            right_clicks: self.right_clicks + delta.right_clicks,
            middle_clicks: self.middle_clicks + delta.middle_clicks,
            key_presses: self.key_presses + delta.key_presses,
            x_mouse_movement: self.x_mouse_movement + delta.x_movement,
            y_mouse_movement: self.y_mouse_movement + delta.y_movement,
        }
    }
}

/// One bucket of tracked activity.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Session {
    pub id: String,
    pub start: DateTime<Utc>,
    pub end: DateTime<Utc>,
    #[serde(default)]
    pub activity: Vec<Activity>,
    #[serde(flatten)]
    pub counters: SessionCounters,
}

impl Session {
    /// A fresh session for `bucket` with a new random id.
    pub fn new(bucket: SessionBucket, activity: Vec<Activity>) -> Self {
        Self {
            id: Uuid::new_v4().to_string(),
            start: bucket.start,
            end: bucket.end,
            activity,
            counters: SessionCounters::default(),
        }
    }

    pub fn bucket(&self) -> SessionBucket {
        SessionBucket {
            start: self.start,
            end: self.end,
        }
    }

    /// Whether the id is a well-formed UUID.
    pub fn is_valid(&self) -> bool {
        Uuid::parse_str(&self.id).is_ok()
    }

    /// Whether `now` falls inside this session's interval.
    pub fn is_current(&self, now: DateTime<Utc>) -> bool {
        self.bucket().contains(now)
    }

    /// Whether the interval is over and the session can be archived.
    pub fn has_ended(&self, now: DateTime<Utc>) -> bool {
        self.end <= now
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn at(h: u32, m: u32, s: u32) -> DateTime<Utc> {
        Utc.with_ymd_and_hms(2024, 3, 9, h, m, s).unwrap()
    }

    #[test]
    fn test_bucket_truncates_to_interval() {
        let bucket = SessionBucket::containing(at(14, 47, 12), Duration::minutes(30));
        assert_eq!(bucket.start, at(14, 30, 0));
        assert_eq!(bucket.end, at(15, 0, 0));

        let hourly = SessionBucket::containing(at(14, 47, 12), Duration::hours(1));
        assert_eq!(hourly.start, at(14, 0, 0));
        assert_eq!(hourly.end, at(15, 0, 0));
    }

    #[test]
    fn test_bucket_boundaries() {
        let bucket = SessionBucket::containing(at(15, 0, 0), Duration::minutes(30));
        assert_eq!(bucket.start, at(15, 0, 0));
        assert!(bucket.contains(at(15, 29, 59)));
        assert!(!bucket.contains(at(15, 30, 0)));
    }

    #[test]
    fn test_session_validity() {
        let bucket = SessionBucket::containing(at(9, 5, 0), Duration::minutes(30));
        let mut session = Session::new(bucket, Vec::new());
        assert!(session.is_valid());

        session.id = "not-a-uuid".to_string();
        assert!(!session.is_valid());
        session.id = String::new();
        assert!(!session.is_valid());
    }

    #[test]
    fn test_current_and_ended() {
        let bucket = SessionBucket::containing(at(9, 5, 0), Duration::minutes(30));
        let session = Session::new(bucket, Vec::new());

        assert!(session.is_current(at(9, 10, 0)));
        assert!(!session.has_ended(at(9, 29, 0)));
        assert!(session.has_ended(at(9, 30, 0)));
        assert!(!session.is_current(at(9, 30, 0)));
    }

    #[test]
    fn test_counters_add() {
        let base = SessionCounters {
            left_clicks: 2,
            key_presses: 10,
            ..Default::default()
        };
        let delta = TrackerSnapshot {
            left_clicks: 3,
            right_clicks: 1,
            key_presses: 5,
            x_movement: 40,
            ..Default::default()
        };

        let total = base.add(&delta);
        assert_eq!(total.left_clicks, 5);
        assert_eq!(total.right_clicks, 1);
        assert_eq!(total.key_presses, 15);
        assert_eq!(total.x_mouse_movement, 40);
    }

    #[test]
    fn test_session_json_field_names() {
        let bucket = SessionBucket::containing(at(9, 5, 0), Duration::minutes(30));
        let session = Session::new(bucket, Vec::new());
        let json = serde_json::to_value(&session).unwrap();

        for field in [
            "id",
            "start",
            "end",
            "activity",
            "left_clicks",
            "right_clicks",
            "middle_clicks",
            "key_presses",
            "x_mouse_movement",
            "y_mouse_movement",
        ] {
            assert!(json.get(field).is_some(), "missing {field}");
        }

        let back: Session = serde_json::from_value(json).unwrap();
        assert_eq!(back, session);
    }
}
