//! Analysis cycle trigger.

/// Trigger state between fired cycles
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum TriggerState {
    /// No cycles counted since the last fire
    Idle,
    /// Counting towards the interval
    Accumulating,
}

/// Counts completed channel cycles and fires once per interval.
pub struct TriggerController {
    /// Channel cycles per fired analysis cycle
    interval: usize,
    /// Channel cycles counted since the last fire
    admitted_count: usize,
}

impl TriggerController {
    pub fn new(interval: usize) -> Self {
        Self {
            interval: interval.max(1),
            admitted_count: 0,
        }
    }

    pub fn interval(&self) -> usize {
        self.interval
    }

    pub fn admitted_count(&self) -> usize {
        self.admitted_count
    }

    pub fn state(&self) -> TriggerState {
        if self.admitted_count == 0 {
            TriggerState::Idle
        } else {
            TriggerState::Accumulating
        }
    }

    /// Replace the interval; the running count is kept.
    pub fn set_interval(&mut self, interval: usize) {
        self.interval = interval.max(1);
    }

    /// Count one completed channel cycle. Returns true when a cycle should fire.
    pub fn on_channel_cycle_complete(&mut self) -> bool {
        self.admitted_count += 1;
        if self.admitted_count >= self.interval {
            self.admitted_count = 0;
            true
        } else {
            false
        }
    }

    /// Zero the running count without touching the interval.
    pub fn reset(&mut self) {
        self.admitted_count = 0;
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn fires_every_interval() {
        let mut trigger = TriggerController::new(3);
        let fired: Vec<bool> = (0..7).map(|_| trigger.on_channel_cycle_complete()).collect();
        assert_eq!(fired, vec![false, false, true, false, false, true, false]);
        assert_eq!(trigger.state(), TriggerState::Accumulating);
    }

    #[test]
    fn reset_keeps_interval() {
        let mut trigger = TriggerController::new(4);
        trigger.on_channel_cycle_complete();
        trigger.on_channel_cycle_complete();
        trigger.reset();
        assert_eq!(trigger.state(), TriggerState::Idle);
        assert_eq!(trigger.interval(), 4);
        assert!(!trigger.on_channel_cycle_complete());
    }

    #[test]
    fn shrinking_interval_fires_on_next_cycle() {
        let mut trigger = TriggerController::new(10);
        for _ in 0..6 {
            trigger.on_channel_cycle_complete();
        }
        trigger.set_interval(4);
        assert!(trigger.on_channel_cycle_complete());
        assert_eq!(trigger.admitted_count(), 0);
    }

    #[test]
    fn zero_interval_is_treated_as_one() {
        let mut trigger = TriggerController::new(0);
        assert_eq!(trigger.interval(), 1);
        assert!(trigger.on_channel_cycle_complete());
    }
}
