//! Per-window time ledger of a session.

use crate::wm::window::{IdentityStrategy, Window};
use serde::{Deserialize, Serialize};
use std::collections::HashSet;
use std::time::Duration;

/// Time spent with one window present during a session.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Activity {
    pub window: Window,
    #[serde(default)]
    pub time_spent_minutes: f64,
}

impl Activity {
    /// A zero-time entry for `window`.
    pub fn new(window: Window) -> Self {
        Self {
            window,
            time_spent_minutes: 0.0,
        }
    }
}

/// Zero-time entries for every distinct window, in observed order.
pub fn new_activity(windows: &[Window], identity: IdentityStrategy) -> Vec<Activity> {
    diff_new(&[], windows, identity)
}

/// Zero-time entries for windows not yet present in `existing`.
///
/// Order follows `current`; a window is reported at most once. Existing
/// entries are left alone, including ones whose window has gone away.
pub fn diff_new(
    existing: &[Activity],
    current: &[Window],
    identity: IdentityStrategy,
) -> Vec<Activity> {
    let mut known: HashSet<_> = existing
        .iter()
        .map(|a| a.window.identity(identity))
        .collect();

    current
        .iter()
        .filter(|window| known.insert(window.identity(identity)))
        .map(|window| Activity::new(window.clone()))
        .collect()
}

/// Add `delta` to every entry whose window is in `active`.
pub fn increment_time(
    activity: &mut [Activity],
    active: &[Window],
    identity: IdentityStrategy,
    delta: Duration,
) {
    let minutes = delta.as_secs_f64() / 60.0;
    let active: HashSet<_> = active.iter().map(|w| w.identity(identity)).collect();

    for entry in activity.iter_mut() {
        if active.contains(&entry.window.identity(identity)) {
            entry.time_spent_minutes += minutes;
        }
    }
}
