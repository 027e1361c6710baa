//! Bounded-concurrency mission execution.
//!
//! A [`RunnerPool`] provisions one SUT instance per worker up front and wraps
//! each in its own [`Sandbox`]. During [`RunnerPool::run`] every worker pulls
//! missions from a shared source (the only lock workers contend on) and
//! reports outcomes through a caller-supplied callback. Instances live for the
//! pool's lifetime and are destroyed exactly once by [`RunnerPool::shutdown`].

use std::sync::atomic::{AtomicBool, AtomicUsize, Ordering};
use std::sync::{Arc, Mutex, PoisonError};

use sortie_model::mission::Mission;
use sortie_model::outcome::MissionOutcome;
use sortie_model::system::SystemModel;
use sortie_sandbox::config::SandboxConfig;
use sortie_sandbox::connection::{ProvisionError, Provisioner};
use sortie_sandbox::sandbox::{Sandbox, SandboxError};

#[derive(Debug, thiserror::Error)]
pub enum RunnerError {
    #[error("Runner pool needs at least one worker")]
    NoWorkers,

    #[error(transparent)]
    Provision(#[from] ProvisionError),

    #[error(transparent)]
    Sandbox(#[from] SandboxError),

    #[error("Runner pool has been shut down")]
    ShutDown,

    #[error("A runner worker panicked")]
    WorkerPanicked,
}

/// Counters for one call to [`RunnerPool::run`].
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct RunStats {
    /// Missions taken from the source.
    pub dispatched: usize,
    /// Outcomes handed to the callback.
    pub reported: usize,
    /// Missions whose outcome was dropped because the run was stopping.
    pub abandoned: usize,
}

/// Requests shutdown of a running pool from another thread or from inside
/// the outcome callback.
#[derive(Debug, Clone)]
pub struct ShutdownHandle(Arc<AtomicBool>);

impl ShutdownHandle {
    pub fn shutdown(&self) {
        self.0.store(true, Ordering::Release);
    }

    pub fn is_shutdown(&self) -> bool {
        self.0.load(Ordering::Acquire)
    }
}

pub struct RunnerPool<P: Provisioner> {
    provisioner: P,
    sandboxes: Vec<Sandbox<P::Instance>>,
    shutdown: Arc<AtomicBool>,
}

impl<P: Provisioner> RunnerPool<P> {
    /// Provision `workers` SUT instances. If any provisioning fails, the
    /// instances already created are destroyed before the error is returned.
    pub fn new(
        provisioner: P,
        model: Arc<SystemModel>,
        workers: usize,
        config: &SandboxConfig,
    ) -> Result<Self, RunnerError> {
        if workers == 0 {
            return Err(RunnerError::NoWorkers);
        }

        let mut sandboxes = Vec::with_capacity(workers);
        for worker in 0..workers {
            match provisioner.provision() {
                Ok(instance) => {
                    tracing::info!(worker, "provisioned SUT instance");
                    sandboxes.push(Sandbox::new(instance, Arc::clone(&model), config));
                }
                Err(err) => {
                    tracing::warn!(worker, error = %err, "provisioning failed, tearing down");
                    for sandbox in sandboxes {
                        provisioner.destroy(sandbox.into_connection());
                    }
                    return Err(err.into());
                }
            }
        }

        Ok(Self {
            provisioner,
            sandboxes,
            shutdown: Arc::new(AtomicBool::new(false)),
        })
    }

    pub fn workers(&self) -> usize {
        self.sandboxes.len()
    }

    pub fn shutdown_handle(&self) -> ShutdownHandle {
        ShutdownHandle(Arc::clone(&self.shutdown))
    }

    /// Execute every mission from `missions`, at most one per worker at a
    /// time, and block until the source is exhausted or shutdown is
    /// requested.
    ///
    /// `on_outcome` is called from worker threads, possibly concurrently.
    /// Once shutdown is requested no further missions are fetched and
    /// in-flight outcomes are abandoned. A modeling defect stops the run and
    /// is returned after all workers have finished.
    pub fn run<I, F>(&self, missions: I, on_outcome: F) -> Result<RunStats, RunnerError>
    where
        I: Iterator<Item = Mission> + Send,
        F: Fn(Mission, MissionOutcome) + Sync,
    {
        if self.sandboxes.is_empty() || self.shutdown.load(Ordering::Acquire) {
            return Err(RunnerError::ShutDown);
        }

        let source = Mutex::new(missions);
        let stop = AtomicBool::new(false);
        let fatal: Mutex<Option<SandboxError>> = Mutex::new(None);
        let dispatched = AtomicUsize::new(0);
        let reported = AtomicUsize::new(0);
        let abandoned = AtomicUsize::new(0);

        let stopping = || stop.load(Ordering::Acquire) || self.shutdown.load(Ordering::Acquire);

        crossbeam::thread::scope(|s| {
            for (worker, sandbox) in self.sandboxes.iter().enumerate() {
                let (source, stop, fatal) = (&source, &stop, &fatal);
                let (dispatched, reported, abandoned) = (&dispatched, &reported, &abandoned);
                let (on_outcome, stopping) = (&on_outcome, &stopping);

                s.spawn(move |_| loop {
                    if stopping() {
                        break;
                    }
                    let next = source.lock().unwrap_or_else(PoisonError::into_inner).next();
                    let Some(mission) = next else {
                        break;
                    };
                    dispatched.fetch_add(1, Ordering::Relaxed);

                    match sandbox.run(&mission) {
                        Ok(outcome) if stopping() => {
                            tracing::debug!(worker, status = ?outcome.status, "abandoning outcome");
                            abandoned.fetch_add(1, Ordering::Relaxed);
                            break;
                        }
                        Ok(outcome) => {
                            on_outcome(mission, outcome);
                            reported.fetch_add(1, Ordering::Relaxed);
                        }
                        Err(err) => {
                            tracing::error!(worker, error = %err, "worker stopped by fatal error");
                            abandoned.fetch_add(1, Ordering::Relaxed);
                            fatal
                                .lock()
                                .unwrap_or_else(PoisonError::into_inner)
                                .get_or_insert(err);
                            stop.store(true, Ordering::Release);
                            break;
                        }
                    }
                });
            }
        })
        .map_err(|_| RunnerError::WorkerPanicked)?;

        if let Some(err) = fatal.into_inner().unwrap_or_else(PoisonError::into_inner) {
            return Err(err.into());
        }

        Ok(RunStats {
            dispatched: dispatched.into_inner(),
            reported: reported.into_inner(),
            abandoned: abandoned.into_inner(),
        })
    }

    /// Destroy every provisioned instance. Safe to call more than once; each
    /// instance is destroyed exactly once.
    pub fn shutdown(&mut self) {
        self.shutdown.store(true, Ordering::Release);
        if self.sandboxes.is_empty() {
            return;
        }
        tracing::info!(workers = self.sandboxes.len(), "tearing down SUT instances");
        for sandbox in self.sandboxes.drain(..) {
            self.provisioner.destroy(sandbox.into_connection());
        }
    }
}

impl<P: Provisioner> Drop for RunnerPool<P> {
    fn drop(&mut self) {
        self.shutdown();
    }
}

/// Provision a pool, run `missions` through it, and tear it down.
pub fn run_missions<P, I, F>(
    provisioner: P,
    model: Arc<SystemModel>,
    workers: usize,
    config: &SandboxConfig,
    missions: I,
    on_outcome: F,
) -> Result<RunStats, RunnerError>
where
    P: Provisioner,
    I: Iterator<Item = Mission> + Send,
    F: Fn(Mission, MissionOutcome) + Sync,
{
    let mut pool = RunnerPool::new(provisioner, model, workers, config)?;
    let result = pool.run(missions, on_outcome);
    pool.shutdown();
    result
}
