//! Sandbox configuration: polling schedule and timeout scaling.
use std::time::Duration;

use serde::{Deserialize, Serialize};

/// Configuration for mission execution inside a sandbox.
///
/// Controls how often the SUT is observed while waiting for a postcondition,
/// and how resolved branch timeouts are scaled.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct SandboxConfig {
    /// Initial delay between observations (default: 100 ms).
    pub poll_interval_ms: u64,
    /// Multiplier applied to the delay after each unsatisfied observation.
    /// 1.0 keeps a fixed interval.
    pub poll_backoff: f64,
    /// Upper bound for the delay when backing off.
    pub max_poll_interval_ms: u64,
    /// Multiplier applied to every branch timeout (slow simulators need > 1).
    pub timeout_scale: f64,
}

impl Default for SandboxConfig {
    fn default() -> Self {
        Self {
            poll_interval_ms: 100,
            poll_backoff: 1.0,
            max_poll_interval_ms: 1_000,
            timeout_scale: 1.0,
        }
    }
}

impl SandboxConfig {
    pub fn poll_interval(&self) -> Duration {
        Duration::from_millis(self.poll_interval_ms)
    }

    pub fn max_poll_interval(&self) -> Duration {
        Duration::from_millis(self.max_poll_interval_ms.max(self.poll_interval_ms))
    }
}
