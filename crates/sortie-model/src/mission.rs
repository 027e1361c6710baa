use serde::{Deserialize, Serialize};

use crate::command::Command;
use crate::state::{Configuration, Environment, State};

/// An ordered sequence of commands carried out from a given initial state,
/// in a given environment, under a given configuration.
///
/// Missions are values: `extended` returns a new mission and leaves the
/// original untouched. Equality and hashing are structural.
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct Mission {
    pub configuration: Configuration,
    pub environment: Environment,
    pub initial_state: State,
    pub commands: Vec<Command>,
}

impl Mission {
    pub fn new(
        configuration: Configuration,
        environment: Environment,
        initial_state: State,
        commands: Vec<Command>,
    ) -> Self {
        Self {
            configuration,
            environment,
            initial_state,
            commands,
        }
    }

    /// A mission with no commands, used as the root of incremental search.
    pub fn empty(configuration: Configuration, environment: Environment, initial_state: State) -> Self {
        Self::new(configuration, environment, initial_state, Vec::new())
    }

    pub fn is_empty(&self) -> bool {
        self.commands.is_empty()
    }

    pub fn len(&self) -> usize {
        self.commands.len()
    }

    pub fn iter(&self) -> std::slice::Iter<'_, Command> {
        self.commands.iter()
    }

    /// A copy of this mission with `command` appended.
    pub fn extended(&self, command: Command) -> Mission {
        let mut commands = Vec::with_capacity(self.commands.len() + 1);
        commands.extend(self.commands.iter().cloned());
        commands.push(command);
        Mission {
            configuration: self.configuration.clone(),
            environment: self.environment.clone(),
            initial_state: self.initial_state.clone(),
            commands,
        }
    }

    /// Whether `prefix` is a (non-strict) prefix of this mission.
    pub fn starts_with(&self, prefix: &Mission) -> bool {
        self.configuration == prefix.configuration
            && self.environment == prefix.environment
            && self.initial_state == prefix.initial_state
            && self.commands.starts_with(&prefix.commands)
    }
}

impl<'a> IntoIterator for &'a Mission {
    type Item = &'a Command;
    type IntoIter = std::slice::Iter<'a, Command>;

    fn into_iter(self) -> Self::IntoIter {
        self.commands.iter()
    }
}
