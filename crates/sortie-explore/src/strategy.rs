//! Search strategies: how each generation's missions are chosen.
//!
//! Strategies are driven by the single controlling thread of the detector.
//! They never see outcomes before the whole generation has returned.

use std::collections::{HashMap, HashSet};

use rand::seq::SliceRandom;
use rand::Rng;
use rand_chacha::ChaCha8Rng;
use sortie_model::branch::{BranchContext, BranchId};
use sortie_model::command::Command;
use sortie_model::mission::Mission;
use sortie_model::outcome::MissionOutcome;
use sortie_model::state::State;
use sortie_model::system::{CommandSchema, SystemModel};

use crate::generator::Generators;
use crate::resources::ResourceLimits;

/// Everything a strategy may consult when building a generation.
#[derive(Debug, Clone, Copy)]
pub struct GenerationContext<'a> {
    pub model: &'a SystemModel,
    pub generators: &'a Generators,
    pub limits: &'a ResourceLimits,
}

pub trait SearchStrategy {
    /// Name reported in detection summaries.
    fn name(&self) -> &'static str;

    /// Build up to `capacity` missions for the next generation. An empty
    /// generation ends the search.
    fn next_generation(&mut self, ctx: &GenerationContext<'_>, capacity: usize) -> Vec<Mission>;

    /// Learn from one executed mission.
    fn record(&mut self, _mission: &Mission, _outcome: &MissionOutcome) {}

    /// Whether a recorded mission failed somewhere other than where the
    /// strategy expected it to go.
    fn is_flaky(&self, _mission: &Mission) -> bool {
        false
    }
}

/// Missions of random length built from independently drawn commands, all
/// starting from the same template.
#[derive(Debug)]
pub struct RandomStrategy {
    template: Mission,
    rng: ChaCha8Rng,
}

impl RandomStrategy {
    /// `template` supplies the configuration, environment and initial state;
    /// its commands are ignored.
    pub fn new(template: Mission, rng: ChaCha8Rng) -> Self {
        Self { template, rng }
    }
}

impl SearchStrategy for RandomStrategy {
    fn name(&self) -> &'static str {
        "random"
    }

    fn next_generation(&mut self, ctx: &GenerationContext<'_>, capacity: usize) -> Vec<Mission> {
        let schemas: Vec<&CommandSchema> = ctx.model.schemas().collect();
        let max_actions = ctx.limits.max_actions_per_mission;
        if schemas.is_empty() || max_actions == 0 {
            return Vec::new();
        }

        (0..capacity)
            .map(|_| {
                let len = self.rng.gen_range(1..=max_actions);
                let commands = (0..len)
                    .filter_map(|_| {
                        let schema = schemas.choose(&mut self.rng)?;
                        Some(ctx.generators.generate(
                            schema,
                            None,
                            &self.template.environment,
                            &mut self.rng,
                        ))
                    })
                    .collect();
                Mission::new(
                    self.template.configuration.clone(),
                    self.template.environment.clone(),
                    self.template.initial_state.clone(),
                    commands,
                )
            })
            .collect()
    }
}

/// Grows missions one command at a time from a pool of passing prefixes.
///
/// Children are sampled from parents with replacement. A child already known
/// to fail (tabu), already executed, or already in the current batch is
/// skipped. Crashed missions are neither pooled nor made tabu, so their
/// prefix may be tried again.
///
/// Each child carries an intended branch path: the parent's executed path
/// plus the branch its new command resolves to in the parent's end state. A
/// failing child whose executed path differs from that intent is flaky.
#[derive(Debug)]
pub struct IncrementalStrategy {
    rng: ChaCha8Rng,
    pool: Vec<Parent>,
    tabu: HashSet<Mission>,
    explored: HashSet<Mission>,
    intended: HashMap<Mission, Vec<BranchId>>,
    flaky: HashSet<Mission>,
}

#[derive(Debug)]
struct Parent {
    mission: Mission,
    end_state: State,
    /// Branches taken by the mission. Unknown for a seed with commands,
    /// which was never executed.
    path: Option<Vec<BranchId>>,
}

/// Generation attempts per requested mission before giving up on filling
/// the batch.
const ATTEMPTS_PER_SLOT: usize = 4;

impl IncrementalStrategy {
    /// Start from `seed`, whose end state is taken to be its initial state.
    pub fn new(seed: Mission, rng: ChaCha8Rng) -> Self {
        let root = Parent {
            end_state: seed.initial_state.clone(),
            path: seed.is_empty().then(Vec::new),
            mission: seed,
        };
        Self {
            rng,
            pool: vec![root],
            tabu: HashSet::new(),
            explored: HashSet::new(),
            intended: HashMap::new(),
            flaky: HashSet::new(),
        }
    }
}

impl SearchStrategy for IncrementalStrategy {
    fn name(&self) -> &'static str {
        "incremental"
    }

    fn next_generation(&mut self, ctx: &GenerationContext<'_>, capacity: usize) -> Vec<Mission> {
        let schemas: Vec<&CommandSchema> = ctx.model.schemas().collect();
        let max_actions = ctx.limits.max_actions_per_mission;
        let parents: Vec<usize> = (0..self.pool.len())
            .filter(|&i| self.pool[i].mission.len() < max_actions)
            .collect();
        if schemas.is_empty() || parents.is_empty() {
            return Vec::new();
        }

        let mut batch = Vec::with_capacity(capacity);
        let mut in_batch = HashSet::new();
        let mut attempts = capacity.saturating_mul(ATTEMPTS_PER_SLOT);
        while batch.len() < capacity && attempts > 0 {
            attempts -= 1;
            let (Some(&index), Some(schema)) =
                (parents.choose(&mut self.rng), schemas.choose(&mut self.rng))
            else {
                break;
            };
            let parent = &self.pool[index];
            let command = ctx.generators.generate(
                schema,
                Some(&parent.end_state),
                &parent.mission.environment,
                &mut self.rng,
            );
            let path = intended_path(ctx, parent, &command);
            let child = parent.mission.extended(command);

            if self.tabu.contains(&child) || self.explored.contains(&child) {
                continue;
            }
            if in_batch.insert(child.clone()) {
                if let Some(path) = path {
                    self.intended.insert(child.clone(), path);
                }
                batch.push(child);
            }
        }

        if batch.len() < capacity {
            tracing::debug!(requested = capacity, built = batch.len(), "generation under-filled");
        }
        batch
    }

    fn record(&mut self, mission: &Mission, outcome: &MissionOutcome) {
        self.explored.insert(mission.clone());
        let intended = self.intended.remove(mission);
        if outcome.failed() {
            let executed = outcome.executed_path();
            if intended.is_some_and(|path| path != executed) {
                tracing::debug!(mission = mission.len(), "mission diverged from its intended path");
                self.flaky.insert(mission.clone());
            }
            self.tabu.insert(mission.clone());
        } else if outcome.passed() {
            let end_state = outcome
                .end_state()
                .cloned()
                .unwrap_or_else(|| mission.initial_state.clone());
            self.pool.push(Parent {
                mission: mission.clone(),
                end_state,
                path: Some(outcome.executed_path()),
            });
        }
    }

    fn is_flaky(&self, mission: &Mission) -> bool {
        self.flaky.contains(mission)
    }
}

/// Parent path extended by the branch `command` should take from the
/// parent's end state. Modeling defects are left for execution to report.
fn intended_path(
    ctx: &GenerationContext<'_>,
    parent: &Parent,
    command: &Command,
) -> Option<Vec<BranchId>> {
    let mut path = parent.path.clone()?;
    let schema = ctx.model.schema(&command.kind).ok()?;
    let branch_ctx = BranchContext {
        command,
        state: &parent.end_state,
        environment: &parent.mission.environment,
        configuration: &parent.mission.configuration,
    };
    let branch = schema.resolve(&branch_ctx).ok()?;
    path.push(schema.branch_id(branch));
    Some(path)
}
