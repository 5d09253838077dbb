//! Tick timing for the drive loop.
//!
//! Keeps the last few hundred tick durations in a fixed ring so the loop can
//! report jitter without allocating per tick.

use std::time::Duration;

const WINDOW: usize = 256;

/// Budget of one 60 Hz display tick.
pub const FRAME_BUDGET_US: u32 = 16_667;

/// Aggregates over the current window.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct FrameSummary {
    pub avg_us: u32,
    pub max_us: u32,
    pub p95_us: u32,
    /// Ticks over budget since creation
    pub overruns: u64,
    pub samples: usize,
}

#[derive(Debug, Clone)]
pub struct FrameTelemetry {
    durations_us: [u32; WINDOW],
    next: usize,
    filled: usize,
    window_max_us: u32,
    overruns: u64,
    budget_us: u32,
}

impl Default for FrameTelemetry {
    fn default() -> Self {
        Self::new(FRAME_BUDGET_US)
    }
}

impl FrameTelemetry {
    pub fn new(budget_us: u32) -> Self {
        Self {
            durations_us: [0; WINDOW],
            next: 0,
            filled: 0,
            window_max_us: 0,
            overruns: 0,
            budget_us,
        }
    }

    #[inline]
    pub fn record(&mut self, elapsed: Duration) {
        let us = elapsed.as_micros().min(u32::MAX as u128) as u32;
        self.durations_us[self.next] = us;
        self.next = (self.next + 1) % WINDOW;
        self.filled = (self.filled + 1).min(WINDOW);
        self.window_max_us = self.window_max_us.max(us);
        if us > self.budget_us {
            self.overruns += 1;
        }
    }

    /// Summarize the window and start a new max. Overruns stay cumulative.
    pub fn take_summary(&mut self) -> FrameSummary {
        if self.filled == 0 {
            return FrameSummary::default();
        }
        let live = &self.durations_us[..self.filled];
        let sum: u64 = live.iter().map(|&us| us as u64).sum();

        let mut sorted = self.durations_us;
        sorted[..self.filled].sort_unstable();
        let p95_idx = (self.filled * 95 / 100).max(1) - 1;

        let summary = FrameSummary {
            avg_us: (sum / self.filled as u64) as u32,
            max_us: self.window_max_us,
            p95_us: sorted[p95_idx.min(self.filled - 1)],
            overruns: self.overruns,
            samples: self.filled,
        };
        self.window_max_us = 0;
        summary
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn averages_and_max() {
        let mut t = FrameTelemetry::default();
        for us in [1_000, 2_000, 3_000] {
            t.record(Duration::from_micros(us));
        }
        let s = t.take_summary();
        assert_eq!(s.avg_us, 2_000);
        assert_eq!(s.max_us, 3_000);
        assert_eq!(s.overruns, 0);
        assert_eq!(s.samples, 3);
        assert_eq!(t.take_summary().max_us, 0);
    }

    #[test]
    fn overruns_accumulate() {
        let mut t = FrameTelemetry::new(500);
        t.record(Duration::from_micros(400));
        t.record(Duration::from_micros(600));
        assert_eq!(t.take_summary().overruns, 1);
        t.record(Duration::from_micros(900));
        assert_eq!(t.take_summary().overruns, 2);
    }

    #[test]
    fn empty_summary_is_zero() {
        assert_eq!(FrameTelemetry::default().take_summary(), FrameSummary::default());
    }
}
