//! Interleaved multi-channel sample ring buffer.
//!
//! Samples for every channel slot share one flat array addressed as
//! `slot * MAX_CHANNELS + channel`. The write cursor only advances once the
//! highest enabled channel has written into the current slot, so a slot is
//! "complete" when every enabled channel holds a fresh value there.

use spectrascope_common::MAX_CHANNELS;

use crate::error::IngestError;
use crate::mask::ChannelMask;

/// Slot count of the reference buffer.
pub const REFERENCE_CAPACITY: usize = 2048;

/// Largest update interval, as a multiple of the FFT size.
pub const MAX_INTERVAL_FACTOR: usize = 4;

/// Outcome of a successful write.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SlotWrite {
    /// The slot still waits for higher enabled channels
    Pending,
    /// The write completed a channel cycle and the write cursor advanced
    Completed,
}

/// Where an extracted window takes its values from.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum WindowSource {
    /// One channel's values
    Channel(usize),
    /// Raw sum of every enabled channel at each slot
    Combined(ChannelMask),
}

/// Fixed-capacity interleaved sample store with independent read and write
/// cursors.
///
/// # Invariants
///
/// - `capacity` is a power of two and never changes after construction
/// - slots between `read_pos` (inclusive) and `write_pos` (exclusive) are
///   unread; at most `capacity - 1` slots can be unread at once
/// - `read_pos` never moves past `write_pos`
pub struct SampleRingBuffer {
    /// Interleaved samples
    samples: Vec<i32>,
    /// Number of slots (power of two)
    capacity: usize,
    /// Slot currently being filled
    write_pos: usize,
    /// Oldest slot still reserved for analysis
    read_pos: usize,
    /// Completed slots since the last clear
    admitted: u64,
    /// Cycle-completing writes rejected because the buffer was full
    dropped: u64,
}

impl SampleRingBuffer {
    /// Create a buffer with at least `capacity` slots (rounded up to a power of two).
    pub fn new(capacity: usize) -> Self {
        let capacity = capacity.max(2).next_power_of_two();
        Self {
            samples: vec![0; capacity * MAX_CHANNELS],
            capacity,
            write_pos: 0,
            read_pos: 0,
            admitted: 0,
            dropped: 0,
        }
    }

    /// Slot count that holds one analysis window plus the longest update
    /// interval for `fft_size`.
    pub fn capacity_for(fft_size: usize) -> usize {
        (fft_size * (MAX_INTERVAL_FACTOR + 1))
            .next_power_of_two()
            .max(REFERENCE_CAPACITY)
    }

    fn wrap(&self, slot: usize) -> usize {
        slot & (self.capacity - 1)
    }

    fn index(slot: usize, channel: usize) -> usize {
        slot * MAX_CHANNELS + channel
    }

    /// Get buffer capacity in slots
    pub fn capacity(&self) -> usize {
        self.capacity
    }

    /// Get current write position
    pub fn write_position(&self) -> usize {
        self.write_pos
    }

    /// Get current read position
    pub fn read_position(&self) -> usize {
        self.read_pos
    }

    /// Number of completed slots between the read and write cursors
    pub fn unread(&self) -> usize {
        self.wrap(self.write_pos + self.capacity - self.read_pos)
    }

    /// Completed slots since the last clear
    pub fn admitted(&self) -> u64 {
        self.admitted
    }

    /// Rejected writes since the last clear
    pub fn dropped(&self) -> u64 {
        self.dropped
    }

    /// Write `value` into the current slot for `channel`.
    ///
    /// Only a write to the highest enabled channel advances the write cursor.
    /// If advancing would run into the read cursor the write is rejected, the
    /// drop counter increments and neither cursor moves.
    pub fn write(
        &mut self,
        mask: ChannelMask,
        channel: usize,
        value: i32,
    ) -> Result<SlotWrite, IngestError> {
        if channel >= MAX_CHANNELS {
            return Err(IngestError::InvalidChannel(channel));
        }

        if channel != mask.last_enabled() {
            self.samples[Self::index(self.write_pos, channel)] = value;
            return Ok(SlotWrite::Pending);
        }

        let next = self.wrap(self.write_pos + 1);
        if next == self.read_pos {
            self.dropped += 1;
            return Err(IngestError::Overflow);
        }

        self.samples[Self::index(self.write_pos, channel)] = value;
        self.write_pos = next;
        self.admitted += 1;
        Ok(SlotWrite::Completed)
    }

    /// First slot of the `length` most recently completed slots.
    pub fn latest_window_start(&self, length: usize) -> usize {
        self.wrap(self.write_pos + self.capacity - (length % self.capacity))
    }

    /// Copy `len` consecutive slots starting at `start_slot` (wrapping).
    pub fn extract_window(&self, start_slot: usize, len: usize, source: WindowSource) -> Vec<i64> {
        let mut window = vec![0; len];
        self.extract_window_into(start_slot, source, &mut window);
        window
    }

    /// Fill `out` with consecutive slots starting at `start_slot` (wrapping).
    pub fn extract_window_into(&self, start_slot: usize, source: WindowSource, out: &mut [i64]) {
        for (offset, value) in out.iter_mut().enumerate() {
            let slot = self.wrap(start_slot + offset);
            *value = match source {
                WindowSource::Channel(channel) => {
                    self.samples[Self::index(slot, channel % MAX_CHANNELS)] as i64
                }
                // An empty mask routes every sample to channel 0
                WindowSource::Combined(mask) if mask.is_empty() => {
                    self.samples[Self::index(slot, 0)] as i64
                }
                WindowSource::Combined(mask) => mask
                    .iter()
                    .map(|channel| self.samples[Self::index(slot, channel)] as i64)
                    .sum(),
            };
        }
    }

    /// Release every unread slot older than the trailing `window` slots.
    ///
    /// The read cursor only moves forward and never past the write cursor.
    pub fn release_before(&mut self, window: usize) {
        if self.unread() > window {
            self.read_pos = self.wrap(self.write_pos + self.capacity - window);
        }
    }

    /// Zero all samples and reset cursors and counters.
    pub fn clear(&mut self) {
        self.samples.fill(0);
        self.write_pos = 0;
        self.read_pos = 0;
        self.admitted = 0;
        self.dropped = 0;
    }

    #[cfg(test)]
    fn is_zeroed(&self) -> bool {
        self.samples.iter().all(|&s| s == 0)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use proptest::prelude::*;

    #[test]
    fn capacity_tracks_fft_size() {
        assert_eq!(SampleRingBuffer::capacity_for(4), 2048);
        assert_eq!(SampleRingBuffer::capacity_for(256), 2048);
        assert_eq!(SampleRingBuffer::capacity_for(512), 4096);
        assert_eq!(SampleRingBuffer::capacity_for(2048), 16384);
        assert_eq!(SampleRingBuffer::new(100).capacity(), 128);
    }

    #[test]
    fn cursor_advances_once_per_channel_pair() {
        let mask = ChannelMask::from_bits(0b0000_0101);
        let mut buf = SampleRingBuffer::new(16);

        for i in 0..5 {
            assert_eq!(buf.write(mask, 0, i).unwrap(), SlotWrite::Pending);
            assert_eq!(buf.write_position(), i as usize);
            assert_eq!(buf.write(mask, 2, -i).unwrap(), SlotWrite::Completed);
            assert_eq!(buf.write_position(), i as usize + 1);
        }
        assert_eq!(buf.admitted(), 5);
    }

    #[test]
    fn invalid_channel_is_rejected_without_side_effects() {
        let mut buf = SampleRingBuffer::new(16);
        let result = buf.write(ChannelMask::default(), 8, 1);
        assert_eq!(result, Err(IngestError::InvalidChannel(8)));
        assert_eq!(buf.write_position(), 0);
        assert_eq!(buf.dropped(), 0);
        assert!(buf.is_zeroed());
    }

    #[test]
    fn overflow_drops_and_counts() {
        let mask = ChannelMask::default();
        let mut buf = SampleRingBuffer::new(8);

        for i in 0..7 {
            assert!(buf.write(mask, 0, i).is_ok());
        }
        assert_eq!(buf.unread(), 7);

        for _ in 0..3 {
            assert_eq!(buf.write(mask, 0, 99), Err(IngestError::Overflow));
        }
        assert_eq!(buf.dropped(), 3);
        assert_eq!(buf.write_position(), 7);
        assert_eq!(buf.read_position(), 0);

        // The rejected value never landed in the buffer
        let window = buf.extract_window(0, 8, WindowSource::Channel(0));
        assert_eq!(window, vec![0, 1, 2, 3, 4, 5, 6, 0]);
    }

    #[test]
    fn release_makes_room_for_new_slots() {
        let mask = ChannelMask::default();
        let mut buf = SampleRingBuffer::new(8);
        for i in 0..7 {
            buf.write(mask, 0, i).unwrap();
        }

        buf.release_before(4);
        assert_eq!(buf.unread(), 4);
        assert_eq!(buf.read_position(), 3);

        for i in 7..10 {
            assert!(buf.write(mask, 0, i).is_ok());
        }
        assert_eq!(buf.write(mask, 0, 10), Err(IngestError::Overflow));
    }

    #[test]
    fn release_never_moves_backwards() {
        let mask = ChannelMask::default();
        let mut buf = SampleRingBuffer::new(8);
        for i in 0..3 {
            buf.write(mask, 0, i).unwrap();
        }
        buf.release_before(5);
        assert_eq!(buf.read_position(), 0);
        buf.release_before(0);
        assert_eq!(buf.read_position(), buf.write_position());
        assert_eq!(buf.unread(), 0);
    }

    #[test]
    fn latest_window_wraps_around() {
        let mask = ChannelMask::default();
        let mut buf = SampleRingBuffer::new(8);
        for i in 0..11 {
            buf.write(mask, 0, i).unwrap();
            buf.release_before(4);
        }
        let start = buf.latest_window_start(4);
        assert_eq!(start, 7);
        let window = buf.extract_window(start, 4, WindowSource::Channel(0));
        assert_eq!(window, vec![7, 8, 9, 10]);
    }

    #[test]
    fn combined_window_sums_enabled_channels() {
        let mask = ChannelMask::from_bits(0b0000_1011);
        let mut buf = SampleRingBuffer::new(8);
        for i in 0..3 {
            buf.write(mask, 0, i).unwrap();
            buf.write(mask, 1, 10 * i).unwrap();
            buf.write(mask, 3, 100 * i).unwrap();
        }
        // Channel 2 is disabled; whatever it holds must not be summed
        buf.samples[SampleRingBuffer::index(1, 2)] = 5000;

        let window = buf.extract_window(0, 3, WindowSource::Combined(mask));
        assert_eq!(window, vec![0, 111, 222]);
    }

    #[test]
    fn clear_is_idempotent() {
        let mask = ChannelMask::default();
        let mut buf = SampleRingBuffer::new(4);
        for i in 0..6 {
            let _ = buf.write(mask, 0, i + 1);
        }
        assert!(buf.dropped() > 0);

        buf.clear();
        let once = (buf.write_position(), buf.read_position(), buf.dropped(), buf.admitted());
        assert!(buf.is_zeroed());

        buf.clear();
        let twice = (buf.write_position(), buf.read_position(), buf.dropped(), buf.admitted());
        assert_eq!(once, (0, 0, 0, 0));
        assert_eq!(once, twice);
        assert!(buf.is_zeroed());
    }

    #[derive(Debug, Clone)]
    enum Op {
        Write { channel: usize, value: i32 },
        Release { window: usize },
    }

    fn op_strategy() -> impl Strategy<Value = Op> {
        prop_oneof![
            8 => (0usize..8, any::<i32>()).prop_map(|(channel, value)| Op::Write { channel, value }),
            1 => (0usize..20).prop_map(|window| Op::Release { window }),
        ]
    }

    proptest! {
        #[test]
        fn read_cursor_never_passes_write_cursor(
            bits in any::<u8>(),
            ops in proptest::collection::vec(op_strategy(), 0..400),
        ) {
            let mask = ChannelMask::from_bits(bits);
            let mut buf = SampleRingBuffer::new(16);
            let mut rejected = 0u64;
            let mut completed = 0u64;

            for op in ops {
                let unread_before = buf.unread();
                match op {
                    Op::Write { channel, value } => match buf.write(mask, channel, value) {
                        Ok(SlotWrite::Completed) => completed += 1,
                        Ok(SlotWrite::Pending) => {}
                        Err(IngestError::Overflow) => {
                            rejected += 1;
                            prop_assert_eq!(buf.unread(), buf.capacity() - 1);
                        }
                        Err(IngestError::InvalidChannel(_)) => unreachable!(),
                    },
                    Op::Release { window } => {
                        buf.release_before(window);
                        prop_assert!(buf.unread() <= unread_before);
                    }
                }
                prop_assert!(buf.unread() < buf.capacity());
            }

            prop_assert_eq!(buf.dropped(), rejected);
            prop_assert_eq!(buf.admitted(), completed);
        }
    }
}
