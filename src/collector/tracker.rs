//! Live aggregation of input-device counters.
//!
//! A [`Tracker`] owns one stream per input device and runs one reader thread
//! per stream. Readers decode frames and bump shared atomic counters; the
//! monitor drains them with [`Tracker::snapshot_and_reset`].

use crate::collector::event::{Axis, Classified, METERS_PER_COUNT};
use crate::collector::stream::{Frame, FrameReader};
use crate::config::DeviceConfig;
use crossbeam_channel::{unbounded, Receiver, Sender};
use serde::{Deserialize, Serialize};
use std::fs::File;
use std::io::{self, ErrorKind, Read};
use std::path::PathBuf;
use std::sync::atomic::{AtomicBool, AtomicU64, Ordering};
use std::sync::Arc;
use std::thread::{self, JoinHandle};
use thiserror::Error;

/// Errors that can occur while managing device streams.
#[derive(Debug, Error)]
pub enum CollectorError {
    #[error("tracker is already running")]
    AlreadyRunning,
    #[error("tracker has been closed")]
    Closed,
    #[error("failed to open input device {name} at {path:?}")]
    Open {
        name: String,
        path: PathBuf,
        #[source]
        source: io::Error,
    },
    #[error("failed to spawn reader thread: {0}")]
    Spawn(#[source] io::Error),
}

/// Counter values taken at one point in time.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct TrackerSnapshot {
    pub left_clicks: u64,
    pub right_clicks: u64,
    pub middle_clicks: u64,
    pub key_presses: u64,
    /// Sum of absolute horizontal deltas, in device counts
    pub x_movement: u64,
    /// Sum of absolute vertical deltas, in device counts
    pub y_movement: u64,
}

impl TrackerSnapshot {
    pub fn is_empty(&self) -> bool {
        *self == Self::default()
    }

    /// Fold another snapshot into this one.
    pub fn merge(&mut self, other: &TrackerSnapshot) {
        self.left_clicks += other.left_clicks;
        self.right_clicks += other.right_clicks;
        self.middle_clicks += other.middle_clicks;
        self.key_presses += other.key_presses;
        self.x_movement += other.x_movement;
        self.y_movement += other.y_movement;
    }

    pub fn x_meters(&self) -> f64 {
        self.x_movement as f64 * METERS_PER_COUNT
    }

    pub fn y_meters(&self) -> f64 {
        self.y_movement as f64 * METERS_PER_COUNT
    }
}

/// Shared counters written by reader threads.
#[derive(Debug, Default)]
pub struct TrackerCounters {
    left_clicks: AtomicU64,
    right_clicks: AtomicU64,
    middle_clicks: AtomicU64,
    key_presses: AtomicU64,
    x_movement: AtomicU64,
    y_movement: AtomicU64,
}

impl TrackerCounters {
    /// Count one classified event.
    pub fn record(&self, event: Classified) {
        match event {
            Classified::LeftClick => self.left_clicks.fetch_add(1, Ordering::Relaxed),
            Classified::RightClick => self.right_clicks.fetch_add(1, Ordering::Relaxed),
            Classified::MiddleClick => self.middle_clicks.fetch_add(1, Ordering::Relaxed),
            Classified::KeyPress => self.key_presses.fetch_add(1, Ordering::Relaxed),
            Classified::Move {
                axis: Axis::X,
                magnitude,
            } => self.x_movement.fetch_add(magnitude, Ordering::Relaxed),
            Classified::Move {
                axis: Axis::Y,
                magnitude,
            } => self.y_movement.fetch_add(magnitude, Ordering::Relaxed),
        };
    }

    pub fn snapshot(&self) -> TrackerSnapshot {
        TrackerSnapshot {
            left_clicks: self.left_clicks.load(Ordering::Relaxed),
            right_clicks: self.right_clicks.load(Ordering::Relaxed),
            middle_clicks: self.middle_clicks.load(Ordering::Relaxed),
            key_presses: self.key_presses.load(Ordering::Relaxed),
            x_movement: self.x_movement.load(Ordering::Relaxed),
            y_movement: self.y_movement.load(Ordering::Relaxed),
        }
    }

    /// Swap every counter with zero. An increment racing with this call
    /// lands either in the returned values or in the next ones, never both.
    pub fn take(&self) -> TrackerSnapshot {
        TrackerSnapshot {
            left_clicks: self.left_clicks.swap(0, Ordering::AcqRel),
            right_clicks: self.right_clicks.swap(0, Ordering::AcqRel),
            middle_clicks: self.middle_clicks.swap(0, Ordering::AcqRel),
            key_presses: self.key_presses.swap(0, Ordering::AcqRel),
            x_movement: self.x_movement.swap(0, Ordering::AcqRel),
            y_movement: self.y_movement.swap(0, Ordering::AcqRel),
        }
    }
}

/// Why a reader thread stopped.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum ExitReason {
    /// The stream reached end of file.
    Closed,
    /// The tracker was closed.
    Stopped,
    /// An unrecoverable read error.
    Failed(String),
}

/// Report sent by a reader thread as it exits.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ReaderExit {
    pub stream: String,
    pub reason: ExitReason,
}

struct InputStream {
    name: String,
    reader: Box<dyn Read + Send>,
}

/// Owns the device streams and their reader threads.
pub struct Tracker {
    counters: Arc<TrackerCounters>,
    pending: Vec<InputStream>,
    readers: Vec<JoinHandle<()>>,
    running: Arc<AtomicBool>,
    closed: bool,
    exit_tx: Sender<ReaderExit>,
    exit_rx: Receiver<ReaderExit>,
}

impl Tracker {
    /// Create a tracker with no streams.
    pub fn new() -> Self {
        let (exit_tx, exit_rx) = unbounded();
        Self {
            counters: Arc::new(TrackerCounters::default()),
            pending: Vec::new(),
            readers: Vec::new(),
            running: Arc::new(AtomicBool::new(false)),
            closed: false,
            exit_tx,
            exit_rx,
        }
    }

    /// Open every configured device node.
    pub fn open(devices: &[DeviceConfig]) -> Result<Self, CollectorError> {
        let mut tracker = Self::new();
        for device in devices {
            let file = File::open(&device.path).map_err(|source| CollectorError::Open {
                name: device.name.clone(),
                path: device.path.clone(),
                source,
            })?;
            tracker.add_stream(device.name.clone(), file);
        }
        Ok(tracker)
    }

    /// Hand a stream to the tracker. It is read once [`Tracker::start_all`]
    /// runs.
    pub fn add_stream<R>(&mut self, name: impl Into<String>, reader: R)
    where
        R: Read + Send + 'static,
    {
        self.pending.push(InputStream {
            name: name.into(),
            reader: Box::new(reader),
        });
    }

    /// Number of streams owned, started or not.
    pub fn stream_count(&self) -> usize {
        self.pending.len() + self.readers.len()
    }

    /// Spawn one reader thread per owned stream.
    pub fn start_all(&mut self) -> Result<(), CollectorError> {
        if self.closed {
            return Err(CollectorError::Closed);
        }
        if self.running.load(Ordering::SeqCst) {
            return Err(CollectorError::AlreadyRunning);
        }

        self.running.store(true, Ordering::SeqCst);

        for stream in self.pending.drain(..) {
            let counters = self.counters.clone();
            let running = self.running.clone();
            let exits = self.exit_tx.clone();
            let name = stream.name.clone();

            let handle = thread::Builder::new()
                .name(format!("reader-{name}"))
                .spawn(move || run_reader(stream, counters, running, exits))
                .map_err(CollectorError::Spawn)?;

            tracing::debug!(stream = %name, "started input reader");
            self.readers.push(handle);
        }

        Ok(())
    }

    /// Whether any reader thread is still alive.
    pub fn is_running(&self) -> bool {
        self.readers.iter().any(|handle| !handle.is_finished())
    }

    /// Read the counters without resetting them.
    pub fn snapshot(&self) -> TrackerSnapshot {
        self.counters.snapshot()
    }

    /// Read all counters and reset them to zero.
    pub fn snapshot_and_reset(&self) -> TrackerSnapshot {
        self.counters.take()
    }

    /// Exit reports from readers that stopped since the last call.
    pub fn reader_exits(&self) -> Vec<ReaderExit> {
        self.exit_rx.try_iter().collect()
    }

    /// Wait for every reader to finish and return their exit reports.
    ///
    /// Only returns once all streams end, so this is meant for finite
    /// sources such as captured device dumps.
    pub fn join(&mut self) -> Vec<ReaderExit> {
        for handle in self.readers.drain(..) {
            if handle.join().is_err() {
                tracing::error!("input reader panicked");
            }
        }
        self.running.store(false, Ordering::SeqCst);
        self.reader_exits()
    }

    /// Stop all readers and release the streams.
    ///
    /// Readers blocked inside a read cannot be interrupted; they are detached
    /// and exit after their next frame arrives.
    pub fn close(&mut self) {
        if self.closed {
            return;
        }
        self.closed = true;
        self.running.store(false, Ordering::SeqCst);
        self.pending.clear();

        for handle in self.readers.drain(..) {
            if handle.is_finished() {
                let _ = handle.join();
            } else {
                tracing::debug!("detaching input reader blocked in read");
            }
        }
    }
}

impl Default for Tracker {
    fn default() -> Self {
        Self::new()
    }
}

impl Drop for Tracker {
    fn drop(&mut self) {
        self.close();
    }
}

fn run_reader(
    stream: InputStream,
    counters: Arc<TrackerCounters>,
    running: Arc<AtomicBool>,
    exits: Sender<ReaderExit>,
) {
    let InputStream { name, reader } = stream;
    let mut frames = FrameReader::new(reader);

    let reason = loop {
        if !running.load(Ordering::SeqCst) {
            break ExitReason::Stopped;
        }

        match frames.next_frame() {
            Ok(Frame::Event(event)) => {
                if let Some(classified) = event.classify() {
                    counters.record(classified);
                }
            }
            Ok(Frame::Closed) => break ExitReason::Closed,
            Err(e) if e.kind() == ErrorKind::Interrupted => continue,
            Err(e) => break ExitReason::Failed(e.to_string()),
        }
    };

    match &reason {
        ExitReason::Failed(e) => tracing::error!(stream = %name, error = %e, "input reader failed"),
        other => tracing::debug!(stream = %name, reason = ?other, "input reader exited"),
    }

    let _ = exits.send(ReaderExit {
        stream: name,
        reason,
    });
}
