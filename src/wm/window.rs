//! Window identities as reported by the window manager.

use serde::{Deserialize, Serialize};
use std::collections::HashSet;

/// An application window.
#[derive(Debug, Clone, Default, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct Window {
    /// Manager-assigned address; empty when the tool did not report one
    #[serde(default)]
    pub id: String,
    pub class: String,
    pub title: String,
}

impl Window {
    pub fn new(class: impl Into<String>, title: impl Into<String>) -> Self {
        Self {
            id: String::new(),
            class: class.into(),
            title: title.into(),
        }
    }

    pub fn with_id(mut self, id: impl Into<String>) -> Self {
        self.id = id.into();
        self
    }

    /// First token of `id`. Hyprland reports `Window 55d7e8a0 -> kitty:`,
    /// and the text after the address repeats the window title.
    pub fn address(&self) -> &str {
        self.id.split_whitespace().next().unwrap_or("")
    }

    /// The key this window is compared by under `strategy`.
    pub fn identity(&self, strategy: IdentityStrategy) -> WindowKey<'_> {
        match strategy {
            IdentityStrategy::Id if !self.address().is_empty() => WindowKey::Id(self.address()),
            _ => WindowKey::ClassTitle(&self.class, &self.title),
        }
    }
}

/// How two windows are judged to be the same window.
///
/// `ClassTitle` merges distinct windows that share a class and title.
/// `Id` compares the window address, so a window keeps its identity when
/// its title changes. It depends on the tool reporting ids; windows
/// without an id fall back to class and title.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum IdentityStrategy {
    #[default]
    ClassTitle,
    Id,
}

/// Borrowed identity key of a [`Window`].
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum WindowKey<'a> {
    Id(&'a str),
    ClassTitle(&'a str, &'a str),
}

/// Drop windows whose identity was already seen, keeping the first.
pub fn dedup_windows(windows: Vec<Window>, strategy: IdentityStrategy) -> Vec<Window> {
    let first: Vec<bool> = {
        let mut seen = HashSet::with_capacity(windows.len());
        windows
            .iter()
            .map(|window| seen.insert(window.identity(strategy)))
            .collect()
    };

    windows
        .into_iter()
        .zip(first)
        .filter_map(|(window, first)| first.then_some(window))
        .collect()
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_identity_by_class_title() {
        let a = Window::new("kitty", "nvim").with_id("0x1");
        let b = Window::new("kitty", "nvim").with_id("0x2");
        assert_eq!(
            a.identity(IdentityStrategy::ClassTitle),
            b.identity(IdentityStrategy::ClassTitle)
        );
        assert_ne!(a.identity(IdentityStrategy::Id), b.identity(IdentityStrategy::Id));
    }

    #[test]
    fn test_id_strategy_falls_back_without_id() {
        let a = Window::new("firefox", "Docs");
        let b = Window::new("firefox", "Mail");
        assert_ne!(a.identity(IdentityStrategy::Id), b.identity(IdentityStrategy::Id));
        assert_eq!(
            a.identity(IdentityStrategy::Id),
            WindowKey::ClassTitle("firefox", "Docs")
        );
    }

    #[test]
    fn test_id_identity_survives_title_change() {
        let before = Window::new("kitty", "zsh").with_id("55d7e8a0 -> zsh:");
        let after = Window::new("kitty", "nvim").with_id("55d7e8a0 -> nvim:");
        assert_eq!(before.address(), "55d7e8a0");
        assert_eq!(
            before.identity(IdentityStrategy::Id),
            after.identity(IdentityStrategy::Id)
        );
        assert_eq!(after.identity(IdentityStrategy::Id), WindowKey::Id("55d7e8a0"));
        assert_ne!(
            before.identity(IdentityStrategy::ClassTitle),
            after.identity(IdentityStrategy::ClassTitle)
        );
    }

    #[test]
    fn test_blank_id_falls_back() {
        let window = Window::new("kitty", "zsh").with_id("   ");
        assert_eq!(window.address(), "");
        assert_eq!(
            window.identity(IdentityStrategy::Id),
            WindowKey::ClassTitle("kitty", "zsh")
        );
    }

    #[test]
    fn test_dedup_keeps_first() {
        let windows = vec![
            Window::new("kitty", "a").with_id("1"),
            Window::new("firefox", "b").with_id("2"),
            Window::new("kitty", "a").with_id("3"),
        ];

        let by_value = dedup_windows(windows.clone(), IdentityStrategy::ClassTitle);
        assert_eq!(by_value.len(), 2);
        assert_eq!(by_value[0].id, "1");

        let by_id = dedup_windows(windows, IdentityStrategy::Id);
        assert_eq!(by_id.len(), 3);
    }
}
