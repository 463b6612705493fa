//! Activity Agent - desktop activity telemetry for Linux.
//!
//! This library counts mouse and keyboard input read from kernel event
//! devices, tracks which windows are open, and records both into
//! time-bucketed sessions that are archived per calendar day.
//!
//! # What is recorded
//!
//! - **Input counts**: clicks per button, key presses, summed mouse travel
//! - **Window time**: minutes each window was present during a session
//! - **No key content**: key codes are only used to recognise key events
//! - **No coordinates**: only absolute relative-motion deltas are summed
//!
//! # Architecture
//!
//! ```text
//! ┌──────────────────────────────────────────────────────────────┐
//! │                        Activity Agent                        │
//! ├──────────────────────────────────────────────────────────────┤
//! │  ┌─────────────┐   ┌─────────────┐                           │
//! │  │  /dev/input │──▶│   Tracker   │──┐                        │
//! │  │  (readers)  │   │  (atomics)  │  │   ┌─────────────┐      │
//! │  └─────────────┘   └─────────────┘  ├──▶│   Monitor   │      │
//! │  ┌─────────────┐   ┌─────────────┐  │   │   (ticks)   │      │
//! │  │   hyprctl   │──▶│   Parser    │──┘   └──────┬──────┘      │
//! │  │  (clients)  │   │  (windows)  │             │             │
//! │  └─────────────┘   └─────────────┘             ▼             │
//! │                                         ┌─────────────┐      │
//! │                                         │    Store    │      │
//! │                                         │ (sessions,  │      │
//! │                                         │  archives)  │      │
//! │                                         └─────────────┘      │
//! └──────────────────────────────────────────────────────────────┘
//! ```
//!
//! # Example
//!
//! ```no_run
//! use activity_agent::{Config, Monitor, MonitorSettings, Tracker};
//! use activity_agent::store::MemoryStore;
//! use activity_agent::wm::{CommandSource, HyprctlParser};
//! use std::sync::atomic::AtomicBool;
//!
//! let config = Config::default();
//! let tracker = Tracker::open(&config.devices).expect("failed to open devices");
//! let source = CommandSource::new("hyprctl", vec!["clients".into()], Box::new(HyprctlParser::default()));
//! let settings = MonitorSettings::from_config(&config).expect("invalid config");
//!
//! let mut monitor = Monitor::new(MemoryStore::new(), Box::new(source), tracker, settings);
//! let running = AtomicBool::new(true);
//! monitor.run(&running).expect("monitor failed");
//! ```

pub mod collector;
pub mod config;
pub mod core;
pub mod monitor;
pub mod store;
pub mod wm;

// Re-export key types at crate root for convenience
pub use collector::{CollectorError, Event, Tracker, TrackerSnapshot};
pub use config::{Config, ConfigError, DeviceConfig, StoreConfig};
pub use core::{Activity, Archive, Session, SessionBucket, SessionCounters};
pub use monitor::{Monitor, MonitorError, MonitorSettings, TickReport};
pub use store::{JsonStore, MemoryStore, SessionStore, StoreError};
pub use wm::{IdentityStrategy, Window, WindowSource};

#[cfg(feature = "remote")]
pub use store::{BlockingRemoteStore, RemoteStore, RemoteStoreConfig};

/// Library version.
pub const VERSION: &str = env!("CARGO_PKG_VERSION");
