use std::collections::{BTreeMap, HashSet};
use std::sync::Arc;

use serde::{Deserialize, Serialize};

use crate::error::ModelError;
use crate::state::State;
use crate::value::Value;

/// A raw snapshot of every value reported by a SUT, keyed by name.
pub type RawObservation = BTreeMap<String, Value>;

/// Reads one variable's value out of a raw observation.
pub type Accessor = Arc<dyn Fn(&RawObservation) -> Option<Value> + Send + Sync>;

/// Declared kind of a state variable. Fixed for the lifetime of a model.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum VariableKind {
    /// Non-numeric or discrete; expected to be deterministic for a mission.
    Categorical,
    /// Numeric; compared statistically.
    Continuous,
}

/// An observable state variable of the system under test.
#[derive(Clone)]
pub struct Variable {
    name: String,
    kind: VariableKind,
    accessor: Accessor,
}

impl std::fmt::Debug for Variable {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Variable")
            .field("name", &self.name)
            .field("kind", &self.kind)
            .finish()
    }
}

impl Variable {
    /// A variable read directly from the observation entry of the same name.
    pub fn new(name: &str, kind: VariableKind) -> Self {
        let key = name.to_string();
        Self {
            name: name.to_string(),
            kind,
            accessor: Arc::new(move |raw| raw.get(&key).cloned()),
        }
    }

    pub fn categorical(name: &str) -> Self {
        Self::new(name, VariableKind::Categorical)
    }

    pub fn continuous(name: &str) -> Self {
        Self::new(name, VariableKind::Continuous)
    }

    /// A variable derived from the raw observation by a custom accessor.
    pub fn with_accessor<F>(name: &str, kind: VariableKind, accessor: F) -> Self
    where
        F: Fn(&RawObservation) -> Option<Value> + Send + Sync + 'static,
    {
        Self {
            name: name.to_string(),
            kind,
            accessor: Arc::new(accessor),
        }
    }

    pub fn name(&self) -> &str {
        &self.name
    }

    pub fn kind(&self) -> VariableKind {
        self.kind
    }

    /// Read this variable from a raw observation, checking its declared kind.
    pub fn read(&self, raw: &RawObservation) -> Result<Value, ModelError> {
        let value = (self.accessor)(raw).ok_or_else(|| ModelError::MissingVariable {
            name: self.name.clone(),
        })?;
        if self.kind == VariableKind::Continuous && !value.is_numeric() {
            return Err(ModelError::KindMismatch {
                name: self.name.clone(),
                expected: self.kind,
                observed: value.to_string(),
            });
        }
        Ok(value)
    }
}

/// The ordered set of variables that make up a SUT's observable state.
#[derive(Debug, Clone, Default)]
pub struct StateSchema {
    variables: Vec<Variable>,
}

impl StateSchema {
    pub fn new(variables: Vec<Variable>) -> Result<Self, ModelError> {
        let mut seen = HashSet::new();
        for v in &variables {
            if !seen.insert(v.name.clone()) {
                return Err(ModelError::DuplicateVariable {
                    name: v.name.clone(),
                });
            }
        }
        Ok(Self { variables })
    }

    /// Infer a schema from a recorded state: numeric values are continuous,
    /// everything else is categorical.
    pub fn infer(state: &State) -> Self {
        let variables = state
            .values()
            .iter()
            .map(|(name, value)| {
                if value.is_numeric() {
                    Variable::continuous(name)
                } else {
                    Variable::categorical(name)
                }
            })
            .collect();
        Self { variables }
    }

    pub fn variables(&self) -> &[Variable] {
        &self.variables
    }

    pub fn get(&self, name: &str) -> Option<&Variable> {
        self.variables.iter().find(|v| v.name == name)
    }

    pub fn categorical(&self) -> impl Iterator<Item = &Variable> {
        self.variables
            .iter()
            .filter(|v| v.kind == VariableKind::Categorical)
    }

    pub fn continuous(&self) -> impl Iterator<Item = &Variable> {
        self.variables
            .iter()
            .filter(|v| v.kind == VariableKind::Continuous)
    }

    /// Build a state from a raw observation taken `time_offset` seconds into
    /// the current command.
    pub fn observe(&self, raw: &RawObservation, time_offset: f64) -> Result<State, ModelError> {
        let mut values = BTreeMap::new();
        for v in &self.variables {
            values.insert(v.name.clone(), v.read(raw)?);
        }
        Ok(State::new(values, time_offset))
    }
}
