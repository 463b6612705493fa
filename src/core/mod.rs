//! Session data model.
//!
//! This module contains:
//! - The per-window activity ledger and its reconciliation against the
//!   currently open windows
//! - Time-bucketed sessions with their input counters
//! - Day archives of finished sessions

pub mod activity;
pub mod archive;
pub mod session;

// Re-export commonly used types
pub use activity::{diff_new, increment_time, new_activity, Activity};
pub use archive::{archive_date, Archive};
pub use session::{Session, SessionBucket, SessionCounters};
