use serde::{Deserialize, Serialize};

use crate::command::Command;
use crate::state::State;

/// Every state observed while one command was executing.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct CommandTrace {
    pub command: Command,
    pub states: Vec<State>,
}

impl CommandTrace {
    pub fn new(command: Command) -> Self {
        Self {
            command,
            states: Vec::new(),
        }
    }

    /// The state observed when the command completed or timed out.
    pub fn final_state(&self) -> Option<&State> {
        self.states.last()
    }
}

/// Recorded execution of a mission, one entry per attempted command.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct MissionTrace {
    commands: Vec<CommandTrace>,
}

impl MissionTrace {
    pub fn new() -> Self {
        Self {
            commands: Vec::new(),
        }
    }

    pub fn from_commands(commands: Vec<CommandTrace>) -> Self {
        Self { commands }
    }

    /// Start recording a new command.
    pub fn begin(&mut self, command: Command) {
        self.commands.push(CommandTrace::new(command));
    }

    /// Record a state against the most recently begun command.
    pub fn record(&mut self, state: State) {
        if let Some(current) = self.commands.last_mut() {
            current.states.push(state);
        }
    }

    pub fn commands(&self) -> &[CommandTrace] {
        &self.commands
    }

    /// Ordered command kinds; two traces share structure iff these match.
    pub fn command_kinds(&self) -> Vec<&str> {
        self.commands.iter().map(|c| c.command.kind.as_str()).collect()
    }

    pub fn len(&self) -> usize {
        self.commands.len()
    }

    pub fn is_empty(&self) -> bool {
        self.commands.is_empty()
    }
}
