//! Recovery of window identities from window-manager text dumps.
//!
//! `hyprctl clients` prints one block per window with no delimiters beyond
//! a fixed number of lines per block:
//!
//! ```text
//! Window 55d7e8a0 -> kitty:
//!     mapped: 1
//!     ...
//!     class: kitty
//!     title: nvim src/main.rs
//!     ...
//! ```
//!
//! The parser chunks on that stride, so a tool version that changes the
//! number of lines per block needs a new stride or a new [`WindowParser`].

use crate::wm::window::{dedup_windows, IdentityStrategy, Window};

/// Lines per window block in `hyprctl clients` output.
pub const HYPRCTL_STRIDE: usize = 22;

/// Extracts windows from raw tool output. Never fails: unrecognized text
/// yields fewer windows.
pub trait WindowParser: Send + Sync {
    fn parse(&self, raw: &str) -> Vec<Window>;
}

/// Fixed-stride parser for `hyprctl clients`.
#[derive(Debug, Clone)]
pub struct HyprctlParser {
    /// Number of lines per window block
    pub stride: usize,
    /// Also drop windows with an empty title
    pub require_title: bool,
    /// Identity used for de-duplication
    pub identity: IdentityStrategy,
}

impl Default for HyprctlParser {
    fn default() -> Self {
        Self {
            stride: HYPRCTL_STRIDE,
            require_title: false,
            identity: IdentityStrategy::default(),
        }
    }
}

impl HyprctlParser {
    pub fn new(stride: usize, require_title: bool, identity: IdentityStrategy) -> Self {
        Self {
            stride,
            require_title,
            identity,
        }
    }

    fn parse_chunk(&self, lines: &[&str]) -> Option<Window> {
        let mut window = Window::default();

        for line in lines.iter().map(|l| l.trim()).filter(|l| !l.is_empty()) {
            let mut words = line.split(' ');
            let field = match words.next() {
                Some("Window") => &mut window.id,
                Some("class:") => &mut window.class,
                Some("title:") => &mut window.title,
                _ => continue,
            };

            let rest: Vec<&str> = words.collect();
            if rest.is_empty() {
                continue;
            }
            *field = rest.join(" ");
        }

        let valid = !window.class.is_empty() && (!self.require_title || !window.title.is_empty());
        valid.then_some(window)
    }
}

impl WindowParser for HyprctlParser {
    fn parse(&self, raw: &str) -> Vec<Window> {
        let lines: Vec<&str> = raw.split('\n').collect();
        let windows = lines
            .chunks(self.stride.max(1))
            .filter_map(|chunk| self.parse_chunk(chunk))
            .collect();

        dedup_windows(windows, self.identity)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn block(header: Option<&str>, class: &str, title: &str) -> String {
        let mut lines = Vec::new();
        if let Some(header) = header {
            lines.push(header.to_string());
        }
        lines.push("\tmapped: 1".to_string());
        lines.push("\thidden: 0".to_string());
        lines.push("\tat: 10,40".to_string());
        lines.push("\tsize: 1900,1020".to_string());
        lines.push("\tworkspace: 1 (1)".to_string());
        lines.push("\tfloating: 0".to_string());
        lines.push(format!("\tclass: {class}"));
        lines.push(format!("\ttitle: {title}"));
        lines.push(format!("\tinitialClass: {class}"));
        lines.push(format!("\tinitialTitle: {title}"));
        lines.push("\tpid: 1234".to_string());
        lines.push("\txwayland: 0".to_string());
        lines.push("\tpinned: 0".to_string());
        lines.push("\tfullscreen: 0".to_string());
        lines.push("\tfullscreenmode: 0".to_string());
        lines.push("\tfakefullscreen: 0".to_string());
        lines.push("\tgrouped: 0".to_string());
        lines.push("\tswallowing: 0".to_string());
        lines.push("\tfocusHistoryID: 0".to_string());
        while lines.len() < HYPRCTL_STRIDE - 1 {
            lines.push("\ttags: ".to_string());
        }
        lines.push(String::new());
        assert_eq!(lines.len(), HYPRCTL_STRIDE);
        lines.join("\n")
    }

    #[test]
    fn test_parses_class_and_title_without_header() {
        let raw = block(None, "firefox", "Example - Mozilla Firefox");
        let windows = HyprctlParser::default().parse(&raw);

        assert_eq!(
            windows,
            vec![Window {
                id: String::new(),
                class: "firefox".to_string(),
                title: "Example - Mozilla Firefox".to_string(),
            }]
        );
    }

    #[test]
    fn test_parses_multiple_blocks_with_ids() {
        let raw = format!(
            "{}\n{}",
            block(Some("Window 55d7e8a0 -> kitty:"), "kitty", "nvim  src/main.rs"),
            block(Some("Window 55d7f000 -> firefox:"), "firefox", "Docs")
        );
        let windows = HyprctlParser::default().parse(&raw);

        assert_eq!(windows.len(), 2);
        assert_eq!(windows[0].id, "55d7e8a0 -> kitty:");
        assert_eq!(windows[0].title, "nvim  src/main.rs");
        assert_eq!(windows[1].class, "firefox");
    }

    #[test]
    fn test_missing_class_is_dropped() {
        let raw = block(Some("Window 1 -> x:"), "", "orphan");
        assert!(HyprctlParser::default().parse(&raw).is_empty());
    }

    #[test]
    fn test_require_title() {
        let raw = block(None, "Spotify", "");
        assert_eq!(HyprctlParser::default().parse(&raw).len(), 1);

        let strict = HyprctlParser::new(HYPRCTL_STRIDE, true, IdentityStrategy::ClassTitle);
        assert!(strict.parse(&raw).is_empty());
    }

    #[test]
    fn test_duplicates_collapse_by_strategy() {
        let raw = format!(
            "{}\n{}",
            block(Some("Window a1 -> kitty:"), "kitty", "zsh"),
            block(Some("Window b2 -> kitty:"), "kitty", "zsh")
        );

        let by_value = HyprctlParser::default().parse(&raw);
        assert_eq!(by_value.len(), 1);
        assert_eq!(by_value[0].id, "a1 -> kitty:");

        let by_id = HyprctlParser::new(HYPRCTL_STRIDE, false, IdentityStrategy::Id).parse(&raw);
        assert_eq!(by_id.len(), 2);
    }

    #[test]
    fn test_retitled_window_keeps_its_address() {
        let parser = HyprctlParser::new(HYPRCTL_STRIDE, false, IdentityStrategy::Id);
        let before = parser.parse(&block(Some("Window 55d7e8a0 -> zsh:"), "kitty", "zsh"));
        let after = parser.parse(&block(Some("Window 55d7e8a0 -> nvim:"), "kitty", "nvim"));

        assert_eq!(before[0].address(), "55d7e8a0");
        assert_eq!(
            before[0].identity(IdentityStrategy::Id),
            after[0].identity(IdentityStrategy::Id)
        );
    }

    #[test]
    fn test_garbage_yields_nothing() {
        let parser = HyprctlParser::default();
        assert!(parser.parse("").is_empty());
        assert!(parser.parse("invalid\nclass:\ntitle:\n").is_empty());
    }
}
