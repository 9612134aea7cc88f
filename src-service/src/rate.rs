//! Incoming sample rate estimation and automatic update pacing.

use std::collections::VecDeque;
use std::time::Instant;

/// Number of arrival timestamps kept in the rolling window
pub const RATE_WINDOW: usize = 100;

/// Timestamps required before a rate is reported
pub const MIN_RATE_SAMPLES: usize = 10;

/// Rolling-window estimator of samples per second.
///
/// Keeps the most recent arrival timestamps and derives the rate from the
/// span between the oldest and newest one.
pub struct RateDetector {
    /// Recent arrival timestamps, oldest first
    arrivals: VecDeque<Instant>,
    /// Maximum number of timestamps retained
    window: usize,
    /// Last computed rate
    detected_rate: Option<f64>,
}

impl RateDetector {
    pub fn new() -> Self {
        Self::with_window(RATE_WINDOW)
    }

    /// Create a detector retaining `window` timestamps (at least `MIN_RATE_SAMPLES`).
    pub fn with_window(window: usize) -> Self {
        let window = window.max(MIN_RATE_SAMPLES);
        Self {
            arrivals: VecDeque::with_capacity(window),
            window,
            detected_rate: None,
        }
    }

    /// Record one sample arrival, dropping the oldest timestamp when full.
    pub fn on_sample_arrival(&mut self, at: Instant) {
        if self.arrivals.len() == self.window {
            self.arrivals.pop_front();
        }
        self.arrivals.push_back(at);

        if self.arrivals.len() < MIN_RATE_SAMPLES {
            return;
        }

        if let (Some(first), Some(last)) = (self.arrivals.front(), self.arrivals.back()) {
            let span = last.saturating_duration_since(*first).as_secs_f64();
            if span > 0.0 {
                self.detected_rate = Some((self.arrivals.len() - 1) as f64 / span);
            }
        }
    }

    /// Samples per second, once enough timestamps have been seen.
    pub fn current_rate(&self) -> Option<f64> {
        self.detected_rate
    }

    /// Interval, in channel cycles, that paces analysis cycles at
    /// `target_updates_per_second`.
    ///
    /// Each channel cycle consumes `samples_per_cycle` raw samples (the number
    /// of enabled channels). Returns `None` until a rate has been detected.
    pub fn compute_effective_interval(
        &self,
        fft_size: usize,
        target_updates_per_second: f64,
        samples_per_cycle: usize,
    ) -> Option<usize> {
        let samples_per_cycle = samples_per_cycle.max(1) as f64;
        self.detected_rate.map(|rate| {
            clamp_interval(rate / samples_per_cycle, fft_size, target_updates_per_second)
        })
    }
}

impl Default for RateDetector {
    fn default() -> Self {
        Self::new()
    }
}

/// `rate / target` rounded and clamped to `[fft_size / 2, fft_size * 4]`.
pub fn clamp_interval(rate: f64, fft_size: usize, target_updates_per_second: f64) -> usize {
    let low = (fft_size / 2).max(1);
    let high = (fft_size * 4).max(low);

    let raw = rate / target_updates_per_second;
    if !raw.is_finite() {
        return high;
    }

    (raw.round().max(0.0) as usize).clamp(low, high)
}
