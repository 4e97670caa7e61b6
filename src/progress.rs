use std::time::{Duration, Instant};
use tracing::info;

/// Periodic progress lines for a running search.
#[derive(Debug, Clone)]
pub struct ProgressReporter {
    interval: u64,
    started: Instant,
    lap: Instant,
    count: u64,
}

impl ProgressReporter {
    /// `interval == 0` disables reporting.
    pub fn new(interval: u64) -> Self {
        let now = Instant::now();
        Self {
            interval,
            started: now,
            lap: now,
            count: 0,
        }
    }

    pub fn count(&self) -> u64 {
        self.count
    }

    pub fn elapsed(&self) -> Duration {
        self.started.elapsed()
    }

    /// Count one pop; log when the interval is reached.
    pub fn tick(&mut self, frontier_len: usize, processed_len: usize) {
        self.count += 1;
        if self.interval == 0 || self.count % self.interval != 0 {
            return;
        }
        let now = Instant::now();
        let elapsed = now - self.started;
        let lap = now - self.lap;
        self.lap = now;
        info!(
            pops = self.count,
            elapsed_ms = elapsed.as_millis() as u64,
            candidates = frontier_len,
            processed = processed_len,
            avg_us = (elapsed.as_micros() / self.count as u128) as u64,
            lap_avg_us = (lap.as_micros() / self.interval as u128) as u64,
            "search progress"
        );
    }
}
