//! Behavior branches of a command schema.
//!
//! A branch is one behavioral variant of a command: a precondition saying
//! when it applies, a postcondition saying when execution succeeded, and a
//! timeout estimate. Every schema ends with an idle branch that applies
//! unconditionally, so resolution is total for a well-formed model.

use std::sync::Arc;

use serde::{Deserialize, Serialize};

use crate::command::Command;
use crate::state::{Configuration, Environment, State};

/// Everything a branch function may look at (besides the post-state).
#[derive(Debug, Clone, Copy)]
pub struct BranchContext<'a> {
    pub command: &'a Command,
    pub state: &'a State,
    pub environment: &'a Environment,
    pub configuration: &'a Configuration,
}

pub type Precondition = Arc<dyn for<'a> Fn(&BranchContext<'a>) -> bool + Send + Sync>;
pub type Postcondition = Arc<dyn for<'a> Fn(&BranchContext<'a>, &State) -> bool + Send + Sync>;
pub type TimeoutFn = Arc<dyn for<'a> Fn(&BranchContext<'a>) -> f64 + Send + Sync>;

/// Identifies a branch as `schema:branch`.
#[derive(Debug, Clone, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
pub struct BranchId {
    pub schema: String,
    pub branch: String,
}

impl std::fmt::Display for BranchId {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}:{}", self.schema, self.branch)
    }
}

/// A branch whose applicability is decided by a precondition.
#[derive(Clone)]
pub struct GuardedBranch {
    name: String,
    precondition: Precondition,
    postcondition: Postcondition,
    timeout: TimeoutFn,
}

impl GuardedBranch {
    pub fn new<Pre, Post, T>(name: &str, precondition: Pre, postcondition: Post, timeout: T) -> Self
    where
        Pre: for<'a> Fn(&BranchContext<'a>) -> bool + Send + Sync + 'static,
        Post: for<'a> Fn(&BranchContext<'a>, &State) -> bool + Send + Sync + 'static,
        T: for<'a> Fn(&BranchContext<'a>) -> f64 + Send + Sync + 'static,
    {
        Self {
            name: name.to_string(),
            precondition: Arc::new(precondition),
            postcondition: Arc::new(postcondition),
            timeout: Arc::new(timeout),
        }
    }
}

/// Catch-all branch: the command is expected to leave the system as it was.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct IdleBranch {
    /// Seconds the state must stay unchanged.
    pub idle_time: f64,
    /// Extra seconds granted on top of `idle_time` before timing out.
    pub grace: f64,
}

impl IdleBranch {
    pub const DEFAULT_IDLE_TIME: f64 = 5.0;
    pub const DEFAULT_GRACE: f64 = 2.0;

    pub fn new(idle_time: f64) -> Self {
        Self {
            idle_time,
            grace: Self::DEFAULT_GRACE,
        }
    }

    pub fn with_grace(mut self, grace: f64) -> Self {
        self.grace = grace;
        self
    }
}

impl Default for IdleBranch {
    fn default() -> Self {
        Self::new(Self::DEFAULT_IDLE_TIME)
    }
}

/// One behavioral variant of a command schema.
#[derive(Clone)]
pub enum Branch {
    Guarded(GuardedBranch),
    Idle(IdleBranch),
}

impl std::fmt::Debug for Branch {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Branch::Guarded(g) => f.debug_tuple("Guarded").field(&g.name).finish(),
            Branch::Idle(i) => f.debug_tuple("Idle").field(i).finish(),
        }
    }
}

impl Branch {
    pub fn name(&self) -> &str {
        match self {
            Branch::Guarded(g) => &g.name,
            Branch::Idle(_) => "idle",
        }
    }

    pub fn is_idle(&self) -> bool {
        matches!(self, Branch::Idle(_))
    }

    pub fn precondition(&self, ctx: &BranchContext<'_>) -> bool {
        match self {
            Branch::Guarded(g) => (g.precondition)(ctx),
            Branch::Idle(_) => true,
        }
    }

    /// Pure; safe to call repeatedly while polling.
    pub fn postcondition(&self, ctx: &BranchContext<'_>, state_after: &State) -> bool {
        match self {
            Branch::Guarded(g) => (g.postcondition)(ctx, state_after),
            Branch::Idle(idle) => {
                let time_passed = state_after.time_offset() - ctx.state.time_offset();
                time_passed > idle.idle_time && ctx.state.equiv(state_after)
            }
        }
    }

    /// Maximum seconds the command may take when following this branch.
    pub fn timeout(&self, ctx: &BranchContext<'_>) -> f64 {
        match self {
            Branch::Guarded(g) => (g.timeout)(ctx),
            Branch::Idle(idle) => idle.idle_time + idle.grace,
        }
    }
}
