//! Set of keys currently held down.

use crate::keys::normalize;
use std::collections::HashSet;

/// Canonical labels of every key seen going down and not yet seen going up.
///
/// There is no timeout: a key whose release is never delivered stays
/// pressed until a later release of the same key or `clear`.
#[derive(Debug, Default, Clone, PartialEq)]
pub struct PressedKeys {
    held: HashSet<String>,
}

impl PressedKeys {
    pub fn new() -> Self {
        Self::default()
    }

    /// Record a key-down. Returns true if the key was not already held,
    /// so auto-repeat reports false.
    pub fn key_down(&mut self, raw: &str) -> bool {
        self.held.insert(normalize(raw))
    }

    /// Record a key-up. Returns true if the key was held.
    pub fn key_up(&mut self, raw: &str) -> bool {
        self.held.remove(&normalize(raw))
    }

    pub fn contains(&self, label: &str) -> bool {
        self.held.contains(label)
    }

    pub fn len(&self) -> usize {
        self.held.len()
    }

    pub fn is_empty(&self) -> bool {
        self.held.is_empty()
    }

    pub fn iter(&self) -> impl Iterator<Item = &str> {
        self.held.iter().map(String::as_str)
    }

    /// Held labels in sorted order, for stable display.
    pub fn sorted(&self) -> Vec<&str> {
        let mut labels: Vec<&str> = self.iter().collect();
        labels.sort_unstable();
        labels
    }

    pub fn clear(&mut self) {
        self.held.clear();
    }
}
