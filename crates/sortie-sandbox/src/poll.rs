//! Deadline-bounded polling.
//!
//! The engine waits for postconditions by repeatedly observing the SUT.
//! This module owns that suspension point: a probe is called, and between
//! unsatisfied probes the thread sleeps for the current interval (optionally
//! growing by a backoff factor) until the deadline passes. The last probe
//! always happens at or after the deadline, never the sleep.

use std::thread;
use std::time::{Duration, Instant};

use crate::config::SandboxConfig;

/// Sleep schedule between probes.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct PollSchedule {
    pub interval: Duration,
    pub backoff: f64,
    pub max_interval: Duration,
}

impl PollSchedule {
    pub fn fixed(interval: Duration) -> Self {
        Self {
            interval,
            backoff: 1.0,
            max_interval: interval,
        }
    }

    pub fn from_config(config: &SandboxConfig) -> Self {
        Self {
            interval: config.poll_interval(),
            backoff: config.poll_backoff.max(1.0),
            max_interval: config.max_poll_interval(),
        }
    }

    fn next(&self, current: Duration) -> Duration {
        if self.backoff <= 1.0 {
            return current;
        }
        current.mul_f64(self.backoff).min(self.max_interval)
    }
}

/// What a single probe saw.
#[derive(Debug, Clone, PartialEq)]
pub enum Probe<T> {
    Done(T),
    Pending(T),
}

/// How polling ended. Both variants carry the last probed value.
#[derive(Debug, Clone, PartialEq)]
pub enum PollResult<T> {
    Satisfied { value: T, elapsed: Duration },
    Expired { value: T, elapsed: Duration },
}

impl<T> PollResult<T> {
    pub fn is_satisfied(&self) -> bool {
        matches!(self, PollResult::Satisfied { .. })
    }

    pub fn elapsed(&self) -> Duration {
        match self {
            PollResult::Satisfied { elapsed, .. } | PollResult::Expired { elapsed, .. } => *elapsed,
        }
    }

    pub fn into_value(self) -> T {
        match self {
            PollResult::Satisfied { value, .. } | PollResult::Expired { value, .. } => value,
        }
    }
}

/// Probe until it reports `Done` or `deadline` has elapsed.
///
/// The probe receives the time elapsed since polling began. A probe error
/// aborts polling immediately.
pub fn poll_until<T, E, F>(
    schedule: &PollSchedule,
    deadline: Duration,
    mut probe: F,
) -> Result<PollResult<T>, E>
where
    F: FnMut(Duration) -> Result<Probe<T>, E>,
{
    let start = Instant::now();
    let mut interval = schedule.interval;

    loop {
        match probe(start.elapsed())? {
            Probe::Done(value) => {
                return Ok(PollResult::Satisfied {
                    value,
                    elapsed: start.elapsed(),
                });
            }
            Probe::Pending(value) => {
                let elapsed = start.elapsed();
                if elapsed >= deadline {
                    return Ok(PollResult::Expired { value, elapsed });
                }
                thread::sleep(interval.min(deadline - elapsed));
                interval = schedule.next(interval);
            }
        }
    }
}
