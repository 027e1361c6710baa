//! Resource limits and usage accounting for a detection run.
//!
//! Usage is owned by the detector and updated once per generation, after
//! every mission in the batch has returned. A run stops as soon as usage
//! reaches any configured cap; the per-mission action cap never stops a run,
//! it only restricts which missions may be extended further.

use serde::{Deserialize, Serialize};

/// Caps on a single detection run. `None` means unbounded.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct ResourceLimits {
    /// Maximum number of missions executed across all generations.
    pub max_missions: Option<u64>,
    /// Maximum wall-clock seconds since detection started.
    pub max_running_time_secs: Option<f64>,
    /// Maximum commands in any generated mission.
    pub max_actions_per_mission: usize,
}

impl Default for ResourceLimits {
    fn default() -> Self {
        Self {
            max_missions: None,
            max_running_time_secs: None,
            max_actions_per_mission: 10,
        }
    }
}

impl ResourceLimits {
    /// Returns the reason for stopping, or `None` while budget remains.
    pub fn reached(&self, usage: &ResourceUsage) -> Option<StopReason> {
        if let Some(max) = self.max_missions {
            if usage.num_missions >= max {
                return Some(StopReason::MissionLimitReached);
            }
        }
        if let Some(max) = self.max_running_time_secs {
            if usage.running_time_secs >= max {
                return Some(StopReason::TimeLimitReached);
            }
        }
        None
    }

    /// Missions that may still be executed, `None` when unbounded.
    pub fn missions_remaining(&self, usage: &ResourceUsage) -> Option<u64> {
        self.max_missions
            .map(|max| max.saturating_sub(usage.num_missions))
    }
}

/// Cumulative resources consumed so far.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct ResourceUsage {
    pub num_missions: u64,
    pub running_time_secs: f64,
}

/// Why a detection run ended.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum StopReason {
    /// Mission budget used up.
    MissionLimitReached,
    /// Wall-clock budget used up.
    TimeLimitReached,
    /// The strategy had no further missions to offer.
    Exhausted,
}
