//! Window-manager state scraping.
//!
//! The window manager is only reachable through its CLI, so the current
//! window set is recovered by parsing the tool's human-readable output.

pub mod parser;
pub mod source;
pub mod window;

pub use parser::{HyprctlParser, WindowParser, HYPRCTL_STRIDE};
pub use source::{CommandSource, ExternalToolError, StaticSource, WindowSource};
pub use window::{dedup_windows, IdentityStrategy, Window, WindowKey};
