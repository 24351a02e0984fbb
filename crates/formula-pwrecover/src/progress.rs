//! Throughput and ETA bookkeeping for a run.
//!
//! Speed is measured over the whole run so far; the ETA assumes the remaining candidates are
//! tested at that speed.

use std::time::{Duration, Instant};

use serde::Serialize;

/// Point-in-time view of a running attack.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct ProgressSnapshot {
    /// Candidate most recently tested.
    pub current: String,
    /// Candidates tested so far, including `current`.
    pub tested: u64,
    /// Total candidates in the run.
    pub total: u64,
    /// Candidates per second since the run started.
    pub speed: f64,
    /// Estimated seconds until the candidate space is exhausted.
    pub eta_secs: f64,
}

impl ProgressSnapshot {
    pub fn eta(&self) -> Duration {
        Duration::try_from_secs_f64(self.eta_secs).unwrap_or(Duration::MAX)
    }

    /// Fraction of the run completed, in `0.0..=1.0`.
    pub fn fraction(&self) -> f64 {
        if self.total == 0 {
            1.0
        } else {
            self.tested as f64 / self.total as f64
        }
    }
}

/// Throughput estimator for one run.
#[derive(Debug, Clone)]
pub struct ThroughputMeter {
    started: Instant,
    total: u64,
}

impl ThroughputMeter {
    pub fn start(total: u64) -> Self {
        Self {
            started: Instant::now(),
            total,
        }
    }

    pub fn elapsed(&self) -> Duration {
        self.started.elapsed()
    }

    pub fn snapshot(&self, current: &str, tested: u64) -> ProgressSnapshot {
        estimate(current, tested, self.total, self.elapsed())
    }
}

/// Compute a snapshot from a tested count and elapsed wall-clock time.
pub fn estimate(current: &str, tested: u64, total: u64, elapsed: Duration) -> ProgressSnapshot {
    let tested = tested.min(total);
    let secs = elapsed.as_secs_f64();
    let speed = if secs > 0.0 { tested as f64 / secs } else { 0.0 };
    let eta_secs = if speed > 0.0 {
        (total - tested) as f64 / speed
    } else {
        0.0
    };
    ProgressSnapshot {
        current: current.to_string(),
        tested,
        total,
        speed,
        eta_secs,
    }
}
