use std::collections::BTreeMap;
use std::hash::{Hash, Hasher};

use serde::{Deserialize, Serialize};

use crate::value::Value;

/// An immutable snapshot of the SUT's observable state.
///
/// `time_offset` is seconds since the start of the command during which the
/// observation was taken. Equality covers every value and the time offset.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct State {
    values: BTreeMap<String, Value>,
    #[serde(default)]
    time_offset: f64,
}

impl State {
    pub fn new(values: BTreeMap<String, Value>, time_offset: f64) -> Self {
        Self {
            values,
            time_offset,
        }
    }

    pub fn from_pairs<I, K, V>(pairs: I) -> Self
    where
        I: IntoIterator<Item = (K, V)>,
        K: Into<String>,
        V: Into<Value>,
    {
        let values = pairs
            .into_iter()
            .map(|(k, v)| (k.into(), v.into()))
            .collect();
        Self::new(values, 0.0)
    }

    pub fn get(&self, name: &str) -> Option<&Value> {
        self.values.get(name)
    }

    pub fn get_f64(&self, name: &str) -> Option<f64> {
        self.values.get(name).and_then(Value::as_f64)
    }

    pub fn get_bool(&self, name: &str) -> Option<bool> {
        self.values.get(name).and_then(Value::as_bool)
    }

    pub fn values(&self) -> &BTreeMap<String, Value> {
        &self.values
    }

    pub fn time_offset(&self) -> f64 {
        self.time_offset
    }

    /// Same values, ignoring when they were observed.
    pub fn equiv(&self, other: &State) -> bool {
        self.values == other.values
    }
}

impl PartialEq for State {
    fn eq(&self, other: &Self) -> bool {
        self.values == other.values && self.time_offset.to_bits() == other.time_offset.to_bits()
    }
}

impl Eq for State {}

impl Hash for State {
    fn hash<H: Hasher>(&self, state: &mut H) {
        self.values.hash(state);
        self.time_offset.to_bits().hash(state);
    }
}

/// The simulated or physical context a mission runs in (world parameters).
#[derive(Debug, Clone, Default, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct Environment {
    constants: BTreeMap<String, Value>,
}

impl Environment {
    pub fn new(constants: BTreeMap<String, Value>) -> Self {
        Self { constants }
    }

    pub fn get(&self, name: &str) -> Option<&Value> {
        self.constants.get(name)
    }

    pub fn get_f64(&self, name: &str) -> Option<f64> {
        self.constants.get(name).and_then(Value::as_f64)
    }

    pub fn constants(&self) -> &BTreeMap<String, Value> {
        &self.constants
    }
}

/// Tunables shared by every command of a mission (e.g. timeout constants).
#[derive(Debug, Clone, Default, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(transparent)]
pub struct Configuration {
    values: BTreeMap<String, Value>,
}

impl Configuration {
    pub fn new(values: BTreeMap<String, Value>) -> Self {
        Self { values }
    }

    pub fn from_pairs<I, K, V>(pairs: I) -> Self
    where
        I: IntoIterator<Item = (K, V)>,
        K: Into<String>,
        V: Into<Value>,
    {
        Self::new(
            pairs
                .into_iter()
                .map(|(k, v)| (k.into(), v.into()))
                .collect(),
        )
    }

    pub fn get(&self, name: &str) -> Option<&Value> {
        self.values.get(name)
    }

    /// Numeric tunable with a fallback when absent.
    pub fn get_f64_or(&self, name: &str, default: f64) -> f64 {
        self.values
            .get(name)
            .and_then(Value::as_f64)
            .unwrap_or(default)
    }
}
