#![allow(dead_code)]

use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::{Arc, Mutex};

use sortie_model::branch::{GuardedBranch, IdleBranch};
use sortie_model::command::{Command, Parameter, ParameterDomain};
use sortie_model::mission::Mission;
use sortie_model::state::{Configuration, Environment, State};
use sortie_model::system::{CommandSchema, SystemModel};
use sortie_model::value::Value;
use sortie_model::variable::{RawObservation, StateSchema, Variable};
use sortie_sandbox::config::SandboxConfig;
use sortie_sandbox::connection::{ConnectionError, ProvisionError, Provisioner, SutConnection};

/// Injected misbehavior for the simulated copter.
#[derive(Debug, Clone, Copy, Default)]
pub struct Faults {
    /// Takeoff is acknowledged but the copter never climbs.
    pub stuck_on_ground: bool,
    /// The link drops after this many observations.
    pub lose_link_after: Option<usize>,
    /// `prepare` fails.
    pub broken_setup: bool,
    /// Takeoff works this many times per instance, then sticks.
    pub takeoff_limit: Option<usize>,
}

/// A toy copter that moves a fixed step toward its target on every
/// observation.
pub struct SimCopter {
    pub id: usize,
    armed: bool,
    altitude: f64,
    target: Option<f64>,
    step: f64,
    observations: usize,
    takeoffs: usize,
    faults: Faults,
}

impl SimCopter {
    pub fn new() -> Self {
        Self::with_faults(Faults::default())
    }

    pub fn with_faults(faults: Faults) -> Self {
        Self {
            id: 0,
            armed: false,
            altitude: 0.0,
            target: None,
            step: 2.5,
            observations: 0,
            takeoffs: 0,
            faults,
        }
    }
}

impl SutConnection for SimCopter {
    fn prepare(&mut self, mission: &Mission) -> Result<(), ConnectionError> {
        if self.faults.broken_setup {
            return Err(ConnectionError::Lost("simulator failed to start".into()));
        }
        self.armed = mission.initial_state.get_bool("armed").unwrap_or(false);
        self.altitude = mission.initial_state.get_f64("altitude").unwrap_or(0.0);
        self.target = None;
        Ok(())
    }

    fn dispatch(&mut self, command: &Command) -> Result<(), ConnectionError> {
        match command.kind.as_str() {
            "arm" => self.armed = true,
            "takeoff" if self.armed => {
                self.takeoffs += 1;
                let worn_out = self.faults.takeoff_limit.is_some_and(|n| self.takeoffs > n);
                if !self.faults.stuck_on_ground && !worn_out {
                    self.target = command.get_f64("altitude");
                }
            }
            "land" if self.armed => self.target = Some(0.0),
            _ => {}
        }
        Ok(())
    }

    fn observe(&mut self) -> Result<RawObservation, ConnectionError> {
        self.observations += 1;
        if let Some(limit) = self.faults.lose_link_after {
            if self.observations > limit {
                return Err(ConnectionError::Lost("telemetry timeout".into()));
            }
        }
        if let Some(target) = self.target {
            let delta = (target - self.altitude).clamp(-self.step, self.step);
            self.altitude += delta;
            if (self.altitude - target).abs() < f64::EPSILON {
                self.target = None;
                if target == 0.0 {
                    self.armed = false;
                }
            }
        }
        let mut raw = RawObservation::new();
        raw.insert("armed".into(), Value::Bool(self.armed));
        raw.insert("altitude".into(), Value::Float(self.altitude));
        Ok(raw)
    }
}

pub fn copter_model() -> Arc<SystemModel> {
    let state = StateSchema::new(vec![
        Variable::categorical("armed"),
        Variable::continuous("altitude"),
    ])
    .unwrap();

    let idle = IdleBranch::new(0.01).with_grace(0.05);

    let arm = CommandSchema::builder("arm")
        .branch(GuardedBranch::new(
            "normal",
            |ctx| ctx.state.get_bool("armed") == Some(false),
            |_, after| after.get_bool("armed") == Some(true),
            |_| 0.2,
        ))
        .idle(idle)
        .build()
        .unwrap();

    let takeoff = CommandSchema::builder("takeoff")
        .parameter(Parameter::new(
            "altitude",
            ParameterDomain::Float { min: 1.0, max: 20.0 },
        ))
        .branch(GuardedBranch::new(
            "normal",
            |ctx| {
                ctx.state.get_bool("armed") == Some(true)
                    && ctx.state.get_f64("altitude").unwrap_or(0.0) < 0.3
            },
            |ctx, after| {
                let target = ctx.command.get_f64("altitude").unwrap_or(0.0);
                (after.get_f64("altitude").unwrap_or(0.0) - target).abs() < 0.5
            },
            |ctx| {
                let per_metre = ctx.configuration.get_f64_or("time_per_metre", 0.02);
                ctx.command.get_f64("altitude").unwrap_or(0.0) * per_metre + 0.2
            },
        ))
        .idle(idle)
        .build()
        .unwrap();

    let land = CommandSchema::builder("land")
        .branch(GuardedBranch::new(
            "normal",
            |ctx| ctx.state.get_bool("armed") == Some(true),
            |_, after| {
                after.get_f64("altitude").unwrap_or(1.0) < 0.1
                    && after.get_bool("armed") == Some(false)
            },
            |ctx| {
                let per_metre = ctx.configuration.get_f64_or("time_per_metre", 0.02);
                ctx.state.get_f64("altitude").unwrap_or(0.0) * per_metre + 0.2
            },
        ))
        .idle(idle)
        .build()
        .unwrap();

    Arc::new(SystemModel::new("copter", state, vec![arm, takeoff, land]).unwrap())
}

pub fn fast_config() -> SandboxConfig {
    SandboxConfig {
        poll_interval_ms: 1,
        ..Default::default()
    }
}

pub fn mission(commands: Vec<Command>) -> Mission {
    Mission::new(
        Configuration::default(),
        Environment::default(),
        State::from_pairs([("armed", Value::Bool(false)), ("altitude", Value::Float(0.0))]),
        commands,
    )
}

pub fn takeoff(altitude: f64) -> Command {
    Command::new("takeoff").with("altitude", altitude)
}

/// Hands out simulated copters and remembers what it created and destroyed.
#[derive(Default)]
pub struct SimProvisioner {
    pub faults: Faults,
    /// Provisioning fails once this many instances exist.
    pub fail_at: Option<usize>,
    pub next_id: AtomicUsize,
    pub destroyed: Mutex<Vec<usize>>,
}

impl SimProvisioner {
    pub fn new(faults: Faults) -> Self {
        Self {
            faults,
            ..Default::default()
        }
    }

    pub fn provisioned(&self) -> usize {
        self.next_id.load(Ordering::SeqCst)
    }

    pub fn destroyed_sorted(&self) -> Vec<usize> {
        let mut ids = self.destroyed.lock().unwrap().clone();
        ids.sort_unstable();
        ids
    }
}

impl Provisioner for SimProvisioner {
    type Instance = SimCopter;

    fn provision(&self) -> Result<SimCopter, ProvisionError> {
        if self.fail_at == Some(self.provisioned()) {
            return Err(ProvisionError::new("no simulator slots left"));
        }
        let mut copter = SimCopter::with_faults(self.faults);
        copter.id = self.next_id.fetch_add(1, Ordering::SeqCst);
        Ok(copter)
    }

    fn destroy(&self, instance: SimCopter) {
        self.destroyed.lock().unwrap().push(instance.id);
    }
}
