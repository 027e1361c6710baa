use std::collections::BTreeMap;

use rand::seq::SliceRandom;
use rand::Rng;
use serde::{Deserialize, Serialize};

use crate::value::Value;

/// A concrete command: a command kind plus its parameter values.
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct Command {
    #[serde(rename = "type")]
    pub kind: String,
    #[serde(default)]
    pub parameters: BTreeMap<String, Value>,
}

impl Command {
    pub fn new(kind: &str) -> Self {
        Self {
            kind: kind.to_string(),
            parameters: BTreeMap::new(),
        }
    }

    /// Builder-style parameter assignment.
    pub fn with(mut self, name: &str, value: impl Into<Value>) -> Self {
        self.parameters.insert(name.to_string(), value.into());
        self
    }

    pub fn get(&self, name: &str) -> Option<&Value> {
        self.parameters.get(name)
    }

    pub fn get_f64(&self, name: &str) -> Option<f64> {
        self.parameters.get(name).and_then(Value::as_f64)
    }
}

impl std::fmt::Display for Command {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}(", self.kind)?;
        for (i, (name, value)) in self.parameters.iter().enumerate() {
            if i > 0 {
                write!(f, ", ")?;
            }
            write!(f, "{name}={value}")?;
        }
        write!(f, ")")
    }
}

/// The set of values a command parameter may take.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "type", rename_all = "snake_case")]
pub enum ParameterDomain {
    Bool,
    Int { min: i64, max: i64 },
    Float { min: f64, max: f64 },
    Choice { values: Vec<Value> },
}

impl ParameterDomain {
    /// Whether the domain holds at least one value that can be drawn.
    pub fn is_valid(&self) -> bool {
        match self {
            ParameterDomain::Bool => true,
            ParameterDomain::Int { min, max } => min <= max,
            ParameterDomain::Float { min, max } => {
                min.is_finite() && max.is_finite() && min <= max && (max - min).is_finite()
            }
            ParameterDomain::Choice { values } => !values.is_empty(),
        }
    }

    /// Draw a value uniformly from the domain. `None` for an invalid domain.
    pub fn sample<R: Rng + ?Sized>(&self, rng: &mut R) -> Option<Value> {
        if !self.is_valid() {
            return None;
        }
        let value = match self {
            ParameterDomain::Bool => Value::Bool(rng.gen_bool(0.5)),
            ParameterDomain::Int { min, max } => Value::Int(rng.gen_range(*min..=*max)),
            ParameterDomain::Float { min, max } if min == max => Value::Float(*min),
            ParameterDomain::Float { min, max } => Value::Float(rng.gen_range(*min..*max)),
            ParameterDomain::Choice { values } => values.choose(rng)?.clone(),
        };
        Some(value)
    }
}

/// A named, typed command parameter.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Parameter {
    pub name: String,
    pub domain: ParameterDomain,
}

impl Parameter {
    pub fn new(name: &str, domain: ParameterDomain) -> Self {
        Self {
            name: name.to_string(),
            domain,
        }
    }
}
