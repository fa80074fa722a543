//! Circuit breaker guarding remote submissions.
//!
//! Pure state machine: callers pass in the current instant, which keeps the
//! transitions deterministic under test.

use serde::{Deserialize, Serialize};
use std::fmt;
use std::time::{Duration, Instant};

pub const DEFAULT_FAILURE_THRESHOLD: u32 = 5;
pub const DEFAULT_COOLDOWN: Duration = Duration::from_secs(60);

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum BreakerState {
    Closed { consecutive_failures: u32 },
    Open { until: Instant },
    HalfOpen { probe_in_flight: bool },
}

/// Serializable view of [`BreakerState`] for status output.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum BreakerPhase {
    Closed,
    Open,
    HalfOpen,
}

impl fmt::Display for BreakerPhase {
    fn fmt(&self, f: &mut fmt::Formatter) -> fmt::Result {
        let s = match self {
            BreakerPhase::Closed => "closed",
            BreakerPhase::Open => "open",
            BreakerPhase::HalfOpen => "half-open",
        };
        f.write_str(s)
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Permit {
    /// Normal attempt.
    Allowed,
    /// The single trial attempt after a cool-down.
    Probe,
    /// Attempts suspended; retry after the given wait.
    Rejected(Duration),
}

#[derive(Debug, Clone)]
pub struct CircuitBreaker {
    threshold: u32,
    cooldown: Duration,
    state: BreakerState,
    trips: u64,
}

impl CircuitBreaker {
    pub fn new(threshold: u32, cooldown: Duration) -> Self {
        Self {
            threshold: threshold.max(1),
            cooldown,
            state: BreakerState::Closed { consecutive_failures: 0 },
            trips: 0,
        }
    }

    pub fn state(&self) -> BreakerState {
        self.state
    }

    pub fn phase(&self) -> BreakerPhase {
        match self.state {
            BreakerState::Closed { .. } => BreakerPhase::Closed,
            BreakerState::Open { .. } => BreakerPhase::Open,
            BreakerState::HalfOpen { .. } => BreakerPhase::HalfOpen,
        }
    }

    /// How many times the breaker has opened.
    pub fn trips(&self) -> u64 {
        self.trips
    }

    pub fn try_acquire(&mut self, now: Instant) -> Permit {
        match self.state {
            BreakerState::Closed { .. } => Permit::Allowed,
            BreakerState::Open { until } if now < until => Permit::Rejected(until - now),
            BreakerState::Open { .. } => {
                self.state = BreakerState::HalfOpen { probe_in_flight: true };
                Permit::Probe
            }
            BreakerState::HalfOpen { probe_in_flight: false } => {
                self.state = BreakerState::HalfOpen { probe_in_flight: true };
                Permit::Probe
            }
            // Others wait for the probe verdict.
            BreakerState::HalfOpen { probe_in_flight: true } => Permit::Rejected(self.cooldown.min(Duration::from_secs(1))),
        }
    }

    pub fn record_success(&mut self) {
        if matches!(self.state, BreakerState::HalfOpen { .. }) {
            tracing::info!("circuit breaker closed after successful probe");
        }
        self.state = BreakerState::Closed { consecutive_failures: 0 };
    }

    /// Returns `true` when this failure opened the breaker.
    pub fn record_failure(&mut self, now: Instant) -> bool {
        match self.state {
            BreakerState::Closed { consecutive_failures } => {
                let consecutive_failures = consecutive_failures + 1;
                if consecutive_failures >= self.threshold {
                    self.open(now);
                    true
                } else {
                    self.state = BreakerState::Closed { consecutive_failures };
                    false
                }
            }
            BreakerState::HalfOpen { .. } => {
                self.open(now);
                true
            }
            // Late failure from an attempt admitted before the trip.
            BreakerState::Open { .. } => false,
        }
    }

    /// Returns an unanswered probe slot, e.g. when the probing task was cancelled.
    pub fn release_probe(&mut self) {
        if let BreakerState::HalfOpen { probe_in_flight: true } = self.state {
            self.state = BreakerState::HalfOpen { probe_in_flight: false };
        }
    }

    fn open(&mut self, now: Instant) {
        self.state = BreakerState::Open { until: now + self.cooldown };
        self.trips += 1;
    }
}

impl Default for CircuitBreaker {
    fn default() -> Self {
        Self::new(DEFAULT_FAILURE_THRESHOLD, DEFAULT_COOLDOWN)
    }
}
