use std::collections::HashMap;

use rand::RngCore;
use sortie_model::command::Command;
use sortie_model::state::{Environment, State};
use sortie_model::system::CommandSchema;

/// Schema-specific source of commands.
///
/// Abstracted behind a trait so a search can:
/// - fall back to uniform sampling of the schema's parameter domains
/// - plug in hand-written generators that steer toward interesting inputs
pub trait CommandGenerator {
    /// Generate a command without knowledge of the current state.
    fn generate(&self, environment: &Environment, rng: &mut dyn RngCore) -> Command;

    /// Generate a command for a SUT currently in `state`.
    fn generate_with_state(
        &self,
        _state: &State,
        environment: &Environment,
        rng: &mut dyn RngCore,
    ) -> Command {
        self.generate(environment, rng)
    }
}

impl<F> CommandGenerator for F
where
    F: Fn(&Environment, &mut dyn RngCore) -> Command,
{
    fn generate(&self, environment: &Environment, rng: &mut dyn RngCore) -> Command {
        self(environment, rng)
    }
}

/// Adapts a state-aware closure into a [`CommandGenerator`]. Without a state
/// the closure sees the default (empty) state.
pub struct StateAware<F>(pub F);

impl<F> CommandGenerator for StateAware<F>
where
    F: Fn(&State, &Environment, &mut dyn RngCore) -> Command,
{
    fn generate(&self, environment: &Environment, rng: &mut dyn RngCore) -> Command {
        (self.0)(&State::default(), environment, rng)
    }

    fn generate_with_state(
        &self,
        state: &State,
        environment: &Environment,
        rng: &mut dyn RngCore,
    ) -> Command {
        (self.0)(state, environment, rng)
    }
}

/// Generators keyed by schema name.
#[derive(Default)]
pub struct Generators {
    by_schema: HashMap<String, Box<dyn CommandGenerator>>,
}

impl Generators {
    pub fn new() -> Self {
        Self::default()
    }

    /// Register a generator for one schema, replacing any previous one.
    pub fn register(&mut self, schema: &str, generator: impl CommandGenerator + 'static) {
        self.by_schema.insert(schema.to_string(), Box::new(generator));
    }

    pub fn with(mut self, schema: &str, generator: impl CommandGenerator + 'static) -> Self {
        self.register(schema, generator);
        self
    }

    pub fn contains(&self, schema: &str) -> bool {
        self.by_schema.contains_key(schema)
    }

    /// Generate a command for `schema`, using its registered generator if
    /// any, else the schema's default generator.
    pub fn generate(
        &self,
        schema: &CommandSchema,
        state: Option<&State>,
        environment: &Environment,
        rng: &mut dyn RngCore,
    ) -> Command {
        match (self.by_schema.get(schema.name()), state) {
            (Some(generator), Some(state)) => generator.generate_with_state(state, environment, rng),
            (Some(generator), None) => generator.generate(environment, rng),
            (None, _) => schema.generate(rng),
        }
    }
}

impl std::fmt::Debug for Generators {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        let mut names: Vec<&String> = self.by_schema.keys().collect();
        names.sort();
        f.debug_struct("Generators").field("schemas", &names).finish()
    }
}
