//! The search driver.
//!
//! A detection run alternates between asking a [`SearchStrategy`] for a
//! generation of missions and executing that generation on a
//! [`RunnerPool`]. Outcomes flow back over a channel and are applied in
//! batch order once the whole generation has returned, so the strategy,
//! history and usage are only ever touched by the calling thread.

use std::collections::{HashMap, HashSet};
use std::sync::Arc;
use std::time::Instant;

use rand::SeedableRng;
use rand_chacha::ChaCha8Rng;
use serde::{Deserialize, Serialize};
use sortie_model::error::ModelError;
use sortie_model::mission::Mission;
use sortie_model::outcome::{MissionOutcome, MissionStatus};
use sortie_model::system::SystemModel;
use sortie_sandbox::connection::{ProvisionError, Provisioner};
use sortie_sandbox::sandbox::SandboxError;

use crate::generator::Generators;
use crate::resources::{ResourceLimits, ResourceUsage, StopReason};
use crate::runner::{RunnerError, RunnerPool};
use crate::settings::DetectorSettings;
use crate::strategy::{GenerationContext, IncrementalStrategy, RandomStrategy, SearchStrategy};

#[derive(Debug, thiserror::Error)]
pub enum DetectorError {
    #[error(transparent)]
    Provision(#[from] ProvisionError),

    #[error(transparent)]
    Model(#[from] ModelError),

    #[error(transparent)]
    Sandbox(SandboxError),

    #[error(transparent)]
    Runner(RunnerError),
}

impl From<RunnerError> for DetectorError {
    fn from(err: RunnerError) -> Self {
        match err {
            RunnerError::Provision(err) => DetectorError::Provision(err),
            RunnerError::Sandbox(SandboxError::Model(err)) => DetectorError::Model(err),
            RunnerError::Sandbox(err) => DetectorError::Sandbox(err),
            other => DetectorError::Runner(other),
        }
    }
}

/// Everything a detection run produced.
#[derive(Debug, Clone)]
pub struct DetectionSummary {
    pub algorithm: String,
    /// Every executed mission with its outcome, in execution order.
    pub history: Vec<(Mission, MissionOutcome)>,
    pub outcomes: HashMap<Mission, MissionOutcome>,
    /// Missions whose termination was caused by a failing command.
    pub failures: HashSet<Mission>,
    /// Failures that strayed from the branch path the strategy intended.
    pub flaky: HashSet<Mission>,
    /// Missions lost to the execution environment.
    pub crashes: usize,
    pub generations: usize,
    pub usage: ResourceUsage,
    pub limits: ResourceLimits,
    pub stop_reason: StopReason,
}

impl DetectionSummary {
    fn new(algorithm: &str, limits: ResourceLimits) -> Self {
        Self {
            algorithm: algorithm.to_string(),
            history: Vec::new(),
            outcomes: HashMap::new(),
            failures: HashSet::new(),
            flaky: HashSet::new(),
            crashes: 0,
            generations: 0,
            usage: ResourceUsage::default(),
            limits,
            stop_reason: StopReason::Exhausted,
        }
    }

    fn absorb(&mut self, mission: Mission, outcome: MissionOutcome, flaky: bool) {
        if outcome.is_fault_revealing() {
            if flaky {
                self.flaky.insert(mission.clone());
            }
            self.failures.insert(mission.clone());
        } else if outcome.is_crashed() {
            self.crashes += 1;
        }
        self.outcomes.insert(mission.clone(), outcome.clone());
        self.history.push((mission, outcome));
    }

    pub fn num_missions(&self) -> usize {
        self.history.len()
    }

    pub fn count(&self, status: MissionStatus) -> usize {
        self.history.iter().filter(|(_, o)| o.status == status).count()
    }

    /// Serializable view with failures listed in execution order.
    pub fn to_report(&self) -> SummaryReport {
        SummaryReport {
            algorithm: self.algorithm.clone(),
            stop_reason: self.stop_reason,
            generations: self.generations,
            usage: self.usage.clone(),
            limits: self.limits.clone(),
            num_passed: self.count(MissionStatus::Passed),
            num_failed: self.count(MissionStatus::Failed),
            num_crashed: self.crashes,
            history: self.history.iter().map(entry).collect(),
            failures: self.entries_in(&self.failures),
            flaky: self.entries_in(&self.flaky),
        }
    }

    fn entries_in(&self, missions: &HashSet<Mission>) -> Vec<SummaryEntry> {
        let mut seen = HashSet::new();
        let mut entries = Vec::new();
        for item in &self.history {
            if missions.contains(&item.0) && seen.insert(&item.0) {
                entries.push(entry(item));
            }
        }
        entries
    }
}

fn entry((mission, outcome): &(Mission, MissionOutcome)) -> SummaryEntry {
    SummaryEntry {
        mission: mission.clone(),
        outcome: outcome.clone(),
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct SummaryEntry {
    pub mission: Mission,
    pub outcome: MissionOutcome,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct SummaryReport {
    pub algorithm: String,
    pub stop_reason: StopReason,
    pub generations: usize,
    pub usage: ResourceUsage,
    pub limits: ResourceLimits,
    pub num_passed: usize,
    pub num_failed: usize,
    pub num_crashed: usize,
    pub history: Vec<SummaryEntry>,
    pub failures: Vec<SummaryEntry>,
    #[serde(default)]
    pub flaky: Vec<SummaryEntry>,
}

pub struct BugDetector<P: Provisioner> {
    provisioner: P,
    model: Arc<SystemModel>,
    settings: DetectorSettings,
    generators: Generators,
}

impl<P: Provisioner> BugDetector<P> {
    pub fn new(provisioner: P, model: Arc<SystemModel>, settings: DetectorSettings) -> Self {
        Self {
            provisioner,
            model,
            settings,
            generators: Generators::new(),
        }
    }

    pub fn with_generators(mut self, generators: Generators) -> Self {
        self.generators = generators;
        self
    }

    pub fn settings(&self) -> &DetectorSettings {
        &self.settings
    }

    /// Random search: every mission built from scratch on `template`.
    pub fn detect_random(&self, template: Mission) -> Result<DetectionSummary, DetectorError> {
        let mut strategy = RandomStrategy::new(template, self.rng());
        self.detect(&mut strategy)
    }

    /// Incremental search grown from `seed`.
    pub fn detect_incremental(&self, seed: Mission) -> Result<DetectionSummary, DetectorError> {
        let mut strategy = IncrementalStrategy::new(seed, self.rng());
        self.detect(&mut strategy)
    }

    /// Same seed, same missions.
    fn rng(&self) -> ChaCha8Rng {
        ChaCha8Rng::seed_from_u64(self.settings.seed)
    }

    /// Run `strategy` until a resource limit is reached or it runs dry.
    ///
    /// Worker instances are provisioned once and destroyed exactly once,
    /// whether the run ends normally or with an error.
    pub fn detect<S: SearchStrategy>(&self, strategy: &mut S) -> Result<DetectionSummary, DetectorError> {
        let started = Instant::now();
        let mut pool = RunnerPool::new(
            &self.provisioner,
            Arc::clone(&self.model),
            self.settings.workers,
            &self.settings.sandbox,
        )?;

        let result = self.search(&pool, strategy, started);
        pool.shutdown();

        if let Ok(summary) = &result {
            tracing::info!(
                algorithm = %summary.algorithm,
                missions = summary.num_missions(),
                failures = summary.failures.len(),
                flaky = summary.flaky.len(),
                crashes = summary.crashes,
                stop_reason = ?summary.stop_reason,
                "detection finished"
            );
        }
        result
    }

    fn search<S: SearchStrategy>(
        &self,
        pool: &RunnerPool<&P>,
        strategy: &mut S,
        started: Instant,
    ) -> Result<DetectionSummary, DetectorError> {
        let limits = &self.settings.limits;
        let batch_size = self.settings.batch_size();
        let ctx = GenerationContext {
            model: &self.model,
            generators: &self.generators,
            limits,
        };
        let mut summary = DetectionSummary::new(strategy.name(), limits.clone());

        loop {
            if let Some(reason) = limits.reached(&summary.usage) {
                summary.stop_reason = reason;
                break;
            }

            let capacity = match limits.missions_remaining(&summary.usage) {
                Some(remaining) => batch_size.min(usize::try_from(remaining).unwrap_or(usize::MAX)),
                None => batch_size,
            };
            let mut batch = strategy.next_generation(&ctx, capacity);
            batch.truncate(capacity);
            if batch.is_empty() {
                summary.stop_reason = StopReason::Exhausted;
                break;
            }
            summary.generations += 1;

            let mut position: HashMap<&Mission, usize> = HashMap::new();
            for (i, mission) in batch.iter().enumerate() {
                position.entry(mission).or_insert(i);
            }

            let (tx, rx) = crossbeam::channel::unbounded();
            pool.run(batch.iter().cloned(), |mission, outcome| {
                let _ = tx.send((mission, outcome));
            })?;
            drop(tx);

            let mut results: Vec<(Mission, MissionOutcome)> = rx.into_iter().collect();
            results.sort_by_key(|(m, _)| position.get(m).copied().unwrap_or(usize::MAX));

            let executed = results.len();
            for (mission, outcome) in results {
                strategy.record(&mission, &outcome);
                let flaky = strategy.is_flaky(&mission);
                summary.absorb(mission, outcome, flaky);
            }
            summary.usage.num_missions += executed as u64;
            summary.usage.running_time_secs = started.elapsed().as_secs_f64();

            tracing::info!(
                generation = summary.generations,
                missions = summary.usage.num_missions,
                failures = summary.failures.len(),
                crashes = summary.crashes,
                "generation complete"
            );
        }

        Ok(summary)
    }
}
