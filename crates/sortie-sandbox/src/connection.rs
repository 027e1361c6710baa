use sortie_model::command::Command;
use sortie_model::mission::Mission;
use sortie_model::variable::RawObservation;

/// The SUT stopped answering or rejected the transport. Recorded as a crashed
/// mission, never as a postcondition violation.
#[derive(Debug, Clone, PartialEq, thiserror::Error)]
pub enum ConnectionError {
    #[error("Connection to SUT lost: {0}")]
    Lost(String),

    #[error("SUT rejected command '{command}': {reason}")]
    Rejected { command: String, reason: String },
}

#[derive(Debug, Clone, PartialEq, thiserror::Error)]
#[error("Failed to provision SUT instance: {reason}")]
pub struct ProvisionError {
    pub reason: String,
}

impl ProvisionError {
    pub fn new(reason: impl Into<String>) -> Self {
        Self {
            reason: reason.into(),
        }
    }
}

/// A live connection to one provisioned SUT instance.
///
/// Abstracted behind a trait so the engine can run against:
/// - simulated SUTs in tests
/// - protocol-specific connections (telemetry links, middleware bridges)
pub trait SutConnection: Send {
    /// Bring the SUT to the mission's initial state and environment.
    fn prepare(&mut self, _mission: &Mission) -> Result<(), ConnectionError> {
        Ok(())
    }

    /// Send a command. Returns once sent; the SUT executes asynchronously.
    fn dispatch(&mut self, command: &Command) -> Result<(), ConnectionError>;

    /// Snapshot every declared variable.
    fn observe(&mut self) -> Result<RawObservation, ConnectionError>;
}

/// Creates and tears down isolated SUT instances.
pub trait Provisioner: Send + Sync {
    type Instance: SutConnection;

    fn provision(&self) -> Result<Self::Instance, ProvisionError>;

    /// Tear down an instance. Taking it by value makes a second call on the
    /// same instance impossible.
    fn destroy(&self, instance: Self::Instance);
}

impl<P: Provisioner> Provisioner for &P {
    type Instance = P::Instance;

    fn provision(&self) -> Result<Self::Instance, ProvisionError> {
        (**self).provision()
    }

    fn destroy(&self, instance: Self::Instance) {
        (**self).destroy(instance)
    }
}
