use serde::{Deserialize, Serialize};

use crate::branch::BranchId;
use crate::command::Command;
use crate::state::State;

/// The result of executing a single command.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct CommandOutcome {
    pub command: Command,
    /// Branch whose postcondition was enforced.
    pub branch: BranchId,
    /// Postcondition satisfied before the timeout.
    pub passed: bool,
    pub state_before: State,
    pub state_after: State,
    /// Seconds between dispatch and the final observation.
    pub time_elapsed: f64,
}

/// Terminal state of a mission execution.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum MissionStatus {
    Passed,
    /// A command missed its postcondition; the mission stopped there.
    Failed,
    /// The execution environment broke. Says nothing about the SUT's behavior.
    Crashed,
}

/// The result of executing a mission.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct MissionOutcome {
    pub status: MissionStatus,
    /// One entry per attempted command, in order.
    pub outcomes: Vec<CommandOutcome>,
    #[serde(default)]
    pub time_setup: f64,
    pub time_total: f64,
}

impl MissionOutcome {
    /// Outcome of a mission that ran to completion or stopped at the first
    /// failing command.
    pub fn completed(outcomes: Vec<CommandOutcome>, time_setup: f64, time_total: f64) -> Self {
        let status = if outcomes.iter().all(|o| o.passed) {
            MissionStatus::Passed
        } else {
            MissionStatus::Failed
        };
        Self {
            status,
            outcomes,
            time_setup,
            time_total,
        }
    }

    /// Outcome of a mission whose SUT connection was lost.
    pub fn crashed(time_total: f64) -> Self {
        Self {
            status: MissionStatus::Crashed,
            outcomes: Vec::new(),
            time_setup: 0.0,
            time_total,
        }
    }

    pub fn passed(&self) -> bool {
        self.status == MissionStatus::Passed
    }

    pub fn failed(&self) -> bool {
        self.status == MissionStatus::Failed
    }

    pub fn is_crashed(&self) -> bool {
        self.status == MissionStatus::Crashed
    }

    /// A command failure terminated the mission. Crashes never count.
    pub fn is_fault_revealing(&self) -> bool {
        self.failed() && self.outcomes.last().is_some_and(|o| !o.passed)
    }

    /// State observed after the last executed command.
    pub fn end_state(&self) -> Option<&State> {
        self.outcomes.last().map(|o| &o.state_after)
    }

    /// Branches taken, in execution order.
    pub fn executed_path(&self) -> Vec<BranchId> {
        self.outcomes.iter().map(|o| o.branch.clone()).collect()
    }
}
