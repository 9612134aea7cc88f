//! Declared channel metadata.

use spectrascope_common::{ChannelDefinition, DisplayMetadata, MAX_CHANNELS, MAX_MAGNITUDE_SHIFT};
use tracing::warn;

/// One declared channel.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ChannelEntry {
    pub label: String,
    /// Right shift applied to power values, in `0..=MAX_MAGNITUDE_SHIFT`
    pub magnitude_shift: u8,
    /// Passed through to the renderer untouched
    pub display: DisplayMetadata,
}

impl From<&ChannelDefinition> for ChannelEntry {
    fn from(def: &ChannelDefinition) -> Self {
        if def.magnitude > MAX_MAGNITUDE_SHIFT {
            warn!(
                "[Registry] Channel '{}' magnitude {} clamped to {}",
                def.label, def.magnitude, MAX_MAGNITUDE_SHIFT
            );
        }
        Self {
            label: def.label.clone(),
            magnitude_shift: def.magnitude.min(MAX_MAGNITUDE_SHIFT),
            display: def.display,
        }
    }
}

/// Ordered list of declared channels; slot *i* holds channel *i*.
#[derive(Debug, Default)]
pub struct ChannelRegistry {
    entries: Vec<ChannelEntry>,
}

impl ChannelRegistry {
    pub fn new() -> Self {
        Self::default()
    }

    /// Append a channel, returning its slot index, or `None` when all slots are taken.
    pub fn define(&mut self, def: &ChannelDefinition) -> Option<usize> {
        if self.entries.len() >= MAX_CHANNELS {
            warn!(
                "[Registry] Ignoring channel '{}': all {} slots declared",
                def.label, MAX_CHANNELS
            );
            return None;
        }
        self.entries.push(ChannelEntry::from(def));
        Some(self.entries.len() - 1)
    }

    /// Replace every declared channel.
    pub fn redeclare(&mut self, defs: &[ChannelDefinition]) -> usize {
        self.entries.clear();
        defs.iter().filter_map(|def| self.define(def)).count()
    }

    pub fn get(&self, channel: usize) -> Option<&ChannelEntry> {
        self.entries.get(channel)
    }

    pub fn len(&self) -> usize {
        self.entries.len()
    }

    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }

    pub fn iter(&self) -> impl Iterator<Item = &ChannelEntry> {
        self.entries.iter()
    }

    pub fn clear(&mut self) {
        self.entries.clear();
    }
}
