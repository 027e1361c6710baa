use std::sync::{Arc, Mutex, PoisonError, TryLockError};
use std::time::{Duration, Instant};

use sortie_model::branch::BranchContext;
use sortie_model::command::Command;
use sortie_model::error::ModelError;
use sortie_model::mission::Mission;
use sortie_model::outcome::{CommandOutcome, MissionOutcome};
use sortie_model::system::SystemModel;
use sortie_model::trace::MissionTrace;

use crate::config::SandboxConfig;
use crate::connection::{ConnectionError, SutConnection};
use crate::poll::{poll_until, PollSchedule, Probe};

#[derive(Debug, thiserror::Error)]
pub enum SandboxError {
    #[error("Modeling defect: {0}")]
    Model(#[from] ModelError),

    #[error("Sandbox is already executing a mission")]
    Busy,

    #[error("Sandbox connection was poisoned by a panicking mission")]
    Poisoned,
}

/// Why a single command could not be judged.
#[derive(Debug, thiserror::Error)]
enum StepError {
    #[error(transparent)]
    Connection(#[from] ConnectionError),

    #[error(transparent)]
    Model(#[from] ModelError),
}

/// An exclusive execution session against one provisioned SUT instance.
///
/// Missions run strictly one at a time: a call made while another mission
/// holds the connection is rejected with [`SandboxError::Busy`].
pub struct Sandbox<C: SutConnection> {
    connection: Mutex<C>,
    model: Arc<SystemModel>,
    config: SandboxConfig,
    schedule: PollSchedule,
}

impl<C: SutConnection> Sandbox<C> {
    pub fn new(connection: C, model: Arc<SystemModel>, config: &SandboxConfig) -> Self {
        Self {
            connection: Mutex::new(connection),
            model,
            schedule: PollSchedule::from_config(config),
            config: config.clone(),
        }
    }

    /// Give back the underlying connection (for teardown).
    pub fn into_connection(self) -> C {
        self.connection
            .into_inner()
            .unwrap_or_else(PoisonError::into_inner)
    }

    /// Execute a mission and judge it against the model.
    pub fn run(&self, mission: &Mission) -> Result<MissionOutcome, SandboxError> {
        self.record(mission).map(|(outcome, _)| outcome)
    }

    /// Execute a mission, also returning every state observed along the way.
    ///
    /// Lost connections produce a crashed outcome; modeling defects are
    /// returned as errors.
    pub fn record(&self, mission: &Mission) -> Result<(MissionOutcome, MissionTrace), SandboxError> {
        let mut connection = match self.connection.try_lock() {
            Ok(guard) => guard,
            Err(TryLockError::WouldBlock) => return Err(SandboxError::Busy),
            Err(TryLockError::Poisoned(_)) => return Err(SandboxError::Poisoned),
        };

        let started = Instant::now();
        let mut trace = MissionTrace::new();

        tracing::debug!(commands = mission.len(), "preparing for mission");
        if let Err(err) = connection.prepare(mission) {
            tracing::warn!(error = %err, "mission crashed during setup");
            return Ok((MissionOutcome::crashed(secs(started)), trace));
        }
        let time_setup = secs(started);
        tracing::debug!(time_setup, "prepared for mission");

        let mut outcomes = Vec::with_capacity(mission.len());
        for command in mission {
            trace.begin(command.clone());
            match self.execute_command(&mut *connection, mission, command, &mut trace) {
                Ok(outcome) => {
                    let passed = outcome.passed;
                    outcomes.push(outcome);
                    if !passed {
                        break;
                    }
                }
                Err(StepError::Connection(err)) => {
                    tracing::warn!(command = %command, error = %err, "mission crashed");
                    return Ok((MissionOutcome::crashed(secs(started)), trace));
                }
                Err(StepError::Model(err)) => return Err(err.into()),
            }
        }

        let outcome = MissionOutcome::completed(outcomes, time_setup, secs(started));
        tracing::debug!(status = ?outcome.status, time_total = outcome.time_total, "mission finished");
        Ok((outcome, trace))
    }

    /// Observe, resolve, dispatch, then poll until the postcondition holds or
    /// the branch timeout elapses.
    fn execute_command(
        &self,
        connection: &mut C,
        mission: &Mission,
        command: &Command,
        trace: &mut MissionTrace,
    ) -> Result<CommandOutcome, StepError> {
        let schema = self.model.state_schema();
        let command_start = Instant::now();

        let state_before = schema.observe(&connection.observe()?, 0.0)?;
        trace.record(state_before.clone());

        let ctx = BranchContext {
            command,
            state: &state_before,
            environment: &mission.environment,
            configuration: &mission.configuration,
        };
        let branch = self.model.resolve(&ctx)?;
        let branch_id = self.model.schema(&command.kind)?.branch_id(branch);
        let timeout = self.model.timeout(branch, &ctx)? * self.config.timeout_scale;
        let deadline =
            Duration::try_from_secs_f64(timeout).map_err(|_| ModelError::InvalidTimeout {
                branch: branch_id.to_string(),
                timeout,
            })?;
        tracing::debug!(command = %command, branch = %branch_id, timeout, "enforcing branch postcondition");

        connection.dispatch(command)?;

        let result = poll_until(&self.schedule, deadline, |_| -> Result<_, StepError> {
            let state_after =
                schema.observe(&connection.observe()?, command_start.elapsed().as_secs_f64())?;
            trace.record(state_after.clone());
            if branch.postcondition(&ctx, &state_after) {
                Ok(Probe::Done(state_after))
            } else {
                Ok(Probe::Pending(state_after))
            }
        })?;

        let passed = result.is_satisfied();
        let time_elapsed = result.elapsed().as_secs_f64();
        if passed {
            tracing::debug!(command = %command, time_elapsed, "command was successful");
        } else {
            tracing::debug!(command = %command, timeout, "reached timeout before postcondition was satisfied");
        }

        Ok(CommandOutcome {
            command: command.clone(),
            branch: branch_id,
            passed,
            state_before,
            state_after: result.into_value(),
            time_elapsed,
        })
    }
}

fn secs(since: Instant) -> f64 {
    since.elapsed().as_secs_f64()
}
