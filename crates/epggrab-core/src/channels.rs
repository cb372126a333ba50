//! Channel allow-list and display names.

use std::collections::BTreeMap;

/// Configured channel map: channel id → display name.
///
/// An empty map allows every channel. A non-empty map is an allow-list.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct ChannelMap {
    names: BTreeMap<String, String>,
}

impl ChannelMap {
    /// Creates a channel map.
    #[must_use]
    pub const fn new(names: BTreeMap<String, String>) -> Self {
        Self { names }
    }

    /// Whether the map restricts which channels are grabbed.
    #[must_use]
    pub fn is_restricted(&self) -> bool {
        !self.names.is_empty()
    }

    /// Whether `channel` may be grabbed and kept.
    #[must_use]
    pub fn allows(&self, channel: &str) -> bool {
        self.names.is_empty() || self.names.contains_key(channel)
    }

    /// Display name of `channel`, falling back to the id itself.
    #[must_use]
    pub fn display_name<'a>(&'a self, channel: &'a str) -> &'a str {
        self.names
            .get(channel)
            .map(|name| name.trim())
            .filter(|name| !name.is_empty())
            .unwrap_or(channel)
    }
}
