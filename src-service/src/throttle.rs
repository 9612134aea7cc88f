//! Rate limiting for repeated warnings.

/// Decides which occurrences of a repeating condition get logged.
///
/// The first occurrence is always logged, then one in every `every`.
#[derive(Debug, Clone, Copy)]
pub struct LogThrottle {
    every: u64,
}

impl LogThrottle {
    pub fn new(every: u64) -> Self {
        Self {
            every: every.max(1),
        }
    }

    /// `count` is the running total including the current occurrence.
    pub fn should_log(&self, count: u64) -> bool {
        count == 1 || count % self.every == 0
    }
}
