//! The periodic loop that turns raw input and window state into sessions.
//!
//! Each tick scrapes the window list, credits time to the current session,
//! flushes the tracker counters into it, archives finished sessions by day
//! and applies the retention period.

use crate::collector::tracker::{CollectorError, ExitReason, Tracker, TrackerSnapshot};
use crate::config::{Config, ConfigError};
use crate::core::{
    archive_date, diff_new, increment_time, new_activity, Archive, Session, SessionBucket,
};
use crate::store::{SessionStore, StoreError};
use crate::wm::{ExternalToolError, IdentityStrategy, Window, WindowSource};
use chrono::{DateTime, Utc};
use chrono_tz::Tz;
use std::collections::BTreeMap;
use std::sync::atomic::{AtomicBool, Ordering};
use std::thread;
use std::time::{Duration, Instant};
use thiserror::Error;

/// Errors surfaced by a monitor tick.
#[derive(Debug, Error)]
pub enum MonitorError {
    #[error("window scrape failed: {0}")]
    Windows(#[from] ExternalToolError),
    #[error("store operation failed: {0}")]
    Store(#[from] StoreError),
    #[error("input collection failed: {0}")]
    Collector(#[from] CollectorError),
}

/// The parts of [`Config`] the monitor runs with.
#[derive(Debug, Clone)]
pub struct MonitorSettings {
    pub identity: IdentityStrategy,
    pub session_interval: chrono::Duration,
    /// Tick period, and the time credited to each present window per tick
    pub increment: Duration,
    pub tz: Tz,
    pub retention: Option<chrono::Duration>,
}

impl MonitorSettings {
    pub fn from_config(config: &Config) -> Result<Self, ConfigError> {
        Ok(Self {
            identity: config.identity,
            session_interval: config.session_interval(),
            increment: config.increment_interval,
            tz: config.tz()?,
            retention: config.retention(),
        })
    }
}

impl Default for MonitorSettings {
    fn default() -> Self {
        Self {
            identity: IdentityStrategy::default(),
            session_interval: chrono::Duration::minutes(30),
            increment: Duration::from_secs(60),
            tz: Tz::UTC,
            retention: None,
        }
    }
}

/// What one tick did.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct TickReport {
    /// Session the tick wrote to, if one could be resolved
    pub session_id: Option<String>,
    /// Windows observed, `None` when scraping failed
    pub windows: Option<usize>,
    /// Activity entries added to the session
    pub new_activity: usize,
    /// Counters written to the session
    pub flushed: TrackerSnapshot,
    /// Sessions added to archives
    pub archived: usize,
    /// Sessions removed by retention
    pub pruned: usize,
}

/// Drives sessions from a window source, a tracker and a store.
pub struct Monitor<S> {
    store: S,
    source: Box<dyn WindowSource>,
    tracker: Tracker,
    settings: MonitorSettings,
    /// Counters drained from the tracker but not yet persisted
    pending: TrackerSnapshot,
    /// Lower start bound for the next archive scan; `None` scans everything
    archive_from: Option<DateTime<Utc>>,
}

impl<S: SessionStore> Monitor<S> {
    pub fn new(
        store: S,
        source: Box<dyn WindowSource>,
        tracker: Tracker,
        settings: MonitorSettings,
    ) -> Self {
        Self {
            store,
            source,
            tracker,
            settings,
            pending: TrackerSnapshot::default(),
            archive_from: None,
        }
    }

    pub fn store(&self) -> &S {
        &self.store
    }

    pub fn tracker(&self) -> &Tracker {
        &self.tracker
    }

    pub fn settings(&self) -> &MonitorSettings {
        &self.settings
    }

    /// Counters waiting for a successful write.
    pub fn pending(&self) -> TrackerSnapshot {
        self.pending
    }

    /// Run one full cycle at `now`.
    ///
    /// Every stage is attempted even when an earlier one fails; the first
    /// failure is returned afterwards.
    pub fn tick(&mut self, now: DateTime<Utc>) -> Result<TickReport, MonitorError> {
        let mut report = TickReport::default();
        let mut first_error: Option<MonitorError> = None;

        let windows = match self.source.current_windows() {
            Ok(windows) => {
                report.windows = Some(windows.len());
                Some(windows)
            }
            Err(e) => {
                tracing::warn!(error = %e, "could not read window list");
                first_error = Some(e.into());
                None
            }
        };

        let session = match self.ensure_current_session(now, windows.as_deref().unwrap_or(&[])) {
            Ok(session) => Some(session),
            Err(e) => {
                first_error.get_or_insert(e.into());
                None
            }
        };

        if let Some(mut session) = session {
            report.session_id = Some(session.id.clone());

            if let Some(windows) = &windows {
                match self.record_windows(&mut session, windows) {
                    Ok(added) => report.new_activity = added,
                    Err(e) => {
                        first_error.get_or_insert(e.into());
                    }
                }
            }

            match self.flush_into(&session) {
                Ok(flushed) => report.flushed = flushed,
                Err(e) => {
                    first_error.get_or_insert(e.into());
                }
            }
        } else {
            self.pending.merge(&self.tracker.snapshot_and_reset());
        }

        match self.archive_past_sessions(now) {
            Ok(archived) => report.archived = archived,
            Err(e) => {
                first_error.get_or_insert(e.into());
            }
        }

        match self.prune(now) {
            Ok(pruned) => report.pruned = pruned,
            Err(e) => {
                first_error.get_or_insert(e.into());
            }
        }

        match first_error {
            Some(e) => Err(e),
            None => Ok(report),
        }
    }

    /// The session of the bucket containing `now`, created and seeded with
    /// `windows` when the store has none yet.
    pub fn ensure_current_session(
        &self,
        now: DateTime<Utc>,
        windows: &[Window],
    ) -> Result<Session, StoreError> {
        let bucket = SessionBucket::containing(now, self.settings.session_interval);

        match self.store.current_session(&bucket) {
            Ok(session) => return Ok(session),
            Err(e) if e.is_not_found() => {}
            Err(e) => return Err(e),
        }

        let session = Session::new(bucket, new_activity(windows, self.settings.identity));
        match self.store.insert_session(&session) {
            Ok(()) => {
                tracing::info!(
                    session = %session.id,
                    start = %session.start,
                    end = %session.end,
                    "started new session"
                );
                Ok(session)
            }
            // Another writer created the bucket first.
            Err(e) if e.is_conflict() => self.store.current_session(&bucket),
            Err(e) => Err(e),
        }
    }

    /// Add unseen windows to `session`, credit one increment to every window
    /// present, and persist the activity list. Returns how many entries were
    /// added.
    fn record_windows(
        &self,
        session: &mut Session,
        windows: &[Window],
    ) -> Result<usize, StoreError> {
        let identity = self.settings.identity;

        let new = diff_new(&session.activity, windows, identity);
        let added = new.len();
        session.activity.extend(new);

        increment_time(
            &mut session.activity,
            windows,
            identity,
            self.settings.increment,
        );

        self.store
            .update_session_activity(&session.id, &session.activity)?;

        if added > 0 {
            tracing::debug!(session = %session.id, added, "new windows in session");
        }
        Ok(added)
    }

    /// Drain the tracker into `session`'s totals. On failure the drained
    /// counts stay pending and are retried on the next flush.
    fn flush_into(&mut self, session: &Session) -> Result<TrackerSnapshot, StoreError> {
        self.pending.merge(&self.tracker.snapshot_and_reset());
        if self.pending.is_empty() {
            return Ok(TrackerSnapshot::default());
        }

        let totals = session.counters.add(&self.pending);
        self.store.update_session_counters(&session.id, &totals)?;

        let flushed = std::mem::take(&mut self.pending);
        tracing::debug!(session = %session.id, counters = ?flushed, "flushed input counters");
        Ok(flushed)
    }

    /// Persist any outstanding counters into the current session.
    pub fn flush(&mut self, now: DateTime<Utc>) -> Result<TrackerSnapshot, StoreError> {
        let session = self.ensure_current_session(now, &[])?;
        self.flush_into(&session)
    }

    /// Move every finished session into the archive of the day it started
    /// on. Returns how many sessions were added.
    ///
    /// The first pass scans the whole store; later passes only look at
    /// sessions that could still have been running during the previous one.
    pub fn archive_past_sessions(&mut self, now: DateTime<Utc>) -> Result<usize, StoreError> {
        let tz = self.settings.tz;
        let from = self.archive_from.unwrap_or_default();

        let mut by_day: BTreeMap<String, Vec<Session>> = BTreeMap::new();
        for session in self.store.sessions_between(from, now)? {
            if session.has_ended(now) {
                by_day
                    .entry(archive_date(session.start, tz))
                    .or_default()
                    .push(session);
            }
        }

        let mut added = 0;
        for (date, sessions) in by_day {
            let mut archive = self.archive_for(&date, now)?;
            let new = sessions
                .into_iter()
                .filter(|session| archive.add(session.clone()))
                .count();

            if new > 0 {
                self.store
                    .update_archive_sessions(&archive.id, &archive.sessions)?;
                tracing::info!(date = %archive.date, added = new, "archived finished sessions");
                added += new;
            }
        }

        self.archive_from = now.checked_sub_signed(self.settings.session_interval);
        Ok(added)
    }

    fn archive_for(&self, date: &str, now: DateTime<Utc>) -> Result<Archive, StoreError> {
        match self.store.current_archive(date) {
            Ok(archive) => return Ok(archive),
            Err(e) if e.is_not_found() => {}
            Err(e) => return Err(e),
        }

        let archive = Archive::dated(date, now);
        match self.store.insert_archive(&archive) {
            Ok(()) => {
                tracing::info!(date = %archive.date, "created archive");
                Ok(archive)
            }
            Err(e) if e.is_conflict() => self.store.current_archive(date),
            Err(e) => Err(e),
        }
    }

    /// Delete sessions that ended before the retention period. Does nothing
    /// when no retention is configured.
    pub fn prune(&self, now: DateTime<Utc>) -> Result<usize, StoreError> {
        let Some(retention) = self.settings.retention else {
            return Ok(0);
        };

        // A cutoff before the earliest representable time matches nothing.
        let Some(cutoff) = now.checked_sub_signed(retention) else {
            return Ok(0);
        };

        let removed = self.store.delete_sessions_older_than(cutoff)?;
        if removed > 0 {
            tracing::info!(removed, "pruned old sessions");
        }
        Ok(removed)
    }

    /// Start the readers and tick every increment until `running` clears,
    /// then flush what is left and close the tracker.
    pub fn run(&mut self, running: &AtomicBool) -> Result<(), MonitorError> {
        match self.tracker.start_all() {
            Ok(()) | Err(CollectorError::AlreadyRunning) => {}
            Err(e) => return Err(e.into()),
        }

        tracing::info!(
            streams = self.tracker.stream_count(),
            increment_secs = self.settings.increment.as_secs(),
            "monitor running"
        );

        let mut last_tick: Option<Instant> = None;

        while running.load(Ordering::SeqCst) {
            for exit in self.tracker.reader_exits() {
                match exit.reason {
                    ExitReason::Failed(e) => {
                        tracing::error!(stream = %exit.stream, error = %e, "input stream lost")
                    }
                    reason => {
                        tracing::warn!(stream = %exit.stream, ?reason, "input stream ended")
                    }
                }
            }

            let due = last_tick.map_or(true, |t| t.elapsed() >= self.settings.increment);
            if due {
                last_tick = Some(Instant::now());
                match self.tick(Utc::now()) {
                    Ok(report) => tracing::debug!(?report, "tick complete"),
                    Err(e) => tracing::warn!(error = %e, "tick failed"),
                }
            }

            thread::sleep(Duration::from_millis(100));
        }

        tracing::info!("monitor stopping");
        let flushed = self.flush(Utc::now());
        self.tracker.close();

        match flushed {
            Ok(counters) => {
                tracing::debug!(?counters, "final flush");
                Ok(())
            }
            Err(e) => Err(e.into()),
        }
    }
}
