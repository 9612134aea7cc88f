//! Active channel bitset.

use spectrascope_common::MAX_CHANNELS;

/// Bit *i* set means channel slot *i* accepts samples.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct ChannelMask(u8);

impl Default for ChannelMask {
    /// Channel 0 only.
    fn default() -> Self {
        Self(0b0000_0001)
    }
}

impl ChannelMask {
    pub fn from_bits(bits: u8) -> Self {
        Self(bits)
    }

    pub fn bits(self) -> u8 {
        self.0
    }

    pub fn is_enabled(self, channel: usize) -> bool {
        channel < MAX_CHANNELS && self.0 & (1 << channel) != 0
    }

    pub fn enable(&mut self, channel: usize) {
        if channel < MAX_CHANNELS {
            self.0 |= 1 << channel;
        }
    }

    pub fn disable(&mut self, channel: usize) {
        if channel < MAX_CHANNELS {
            self.0 &= !(1 << channel);
        }
    }

    pub fn count(self) -> usize {
        self.0.count_ones() as usize
    }

    pub fn is_empty(self) -> bool {
        self.0 == 0
    }

    /// Lowest enabled channel, or channel 0 when none are enabled.
    pub fn first_enabled(self) -> usize {
        if self.0 == 0 {
            0
        } else {
            self.0.trailing_zeros() as usize
        }
    }

    /// Highest enabled channel, or channel 0 when none are enabled.
    ///
    /// A write to this channel completes a channel cycle.
    pub fn last_enabled(self) -> usize {
        if self.0 == 0 {
            0
        } else {
            7 - self.0.leading_zeros() as usize
        }
    }

    /// Next enabled channel after `channel`, wrapping to the first one.
    pub fn next_after(self, channel: usize) -> usize {
        (channel + 1..MAX_CHANNELS)
            .find(|&c| self.is_enabled(c))
            .unwrap_or_else(|| self.first_enabled())
    }

    /// Enabled channel indices in ascending order.
    pub fn iter(self) -> impl Iterator<Item = usize> {
        (0..MAX_CHANNELS).filter(move |&c| self.is_enabled(c))
    }
}
