//! Statistical equivalence of a candidate trace against a ground-truth
//! population.
//!
//! Categorical variables must match exactly. Each continuous variable must
//! fall, after every command, inside `mean ± std_dev · tolerance` of the
//! ground-truth samples at that command.

use std::fmt;

use sortie_model::state::State;
use sortie_model::trace::MissionTrace;
use sortie_model::value::Value;
use sortie_model::variable::{StateSchema, VariableKind};

use crate::stats::{mean, nearly_eq, std_dev};

/// Why a comparison could not be performed. Distinct from a negative
/// [`Verdict`], which means the comparison ran and found a difference.
#[derive(Debug, Clone, PartialEq, thiserror::Error)]
pub enum CompareError {
    #[error("Ground-truth set is empty")]
    EmptyGroundTruth,

    #[error("Ground-truth trace {trace} executed {found:?}, expected {expected:?}")]
    InconsistentStructure {
        trace: usize,
        expected: Vec<String>,
        found: Vec<String>,
    },

    #[error("Ground-truth traces disagree on categorical variable '{variable}' after command {index}")]
    InconsistentCategoricalValues { variable: String, index: usize },

    #[error("No state recorded for command {index}")]
    MissingState { index: usize },

    #[error("Variable '{variable}' missing from state after command {index}")]
    MissingVariable { variable: String, index: usize },

    #[error("Continuous variable '{variable}' has non-numeric value {value} after command {index}")]
    NonNumericValue {
        variable: String,
        index: usize,
        value: Value,
    },

    #[error("Tolerance factor must be a non-negative number, got {0}")]
    InvalidTolerance(f64),
}

/// Outcome of a comparison that ran to completion.
#[derive(Debug, Clone, PartialEq)]
pub enum Verdict {
    Equivalent,
    /// The candidate executed a different command sequence.
    StructuralMismatch {
        expected: Vec<String>,
        found: Vec<String>,
    },
    CategoricalMismatch {
        variable: String,
        index: usize,
        expected: Value,
        found: Value,
    },
    OutOfTolerance {
        variable: String,
        index: usize,
        value: f64,
        lower: f64,
        upper: f64,
    },
}

impl Verdict {
    pub fn is_equivalent(&self) -> bool {
        matches!(self, Verdict::Equivalent)
    }

    /// The first variable found in violation, if any.
    pub fn violating_variable(&self) -> Option<&str> {
        match self {
            Verdict::CategoricalMismatch { variable, .. }
            | Verdict::OutOfTolerance { variable, .. } => Some(variable),
            Verdict::Equivalent | Verdict::StructuralMismatch { .. } => None,
        }
    }
}

impl fmt::Display for Verdict {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Verdict::Equivalent => write!(f, "equivalent"),
            Verdict::StructuralMismatch { expected, found } => {
                write!(f, "command sequence {found:?} differs from {expected:?}")
            }
            Verdict::CategoricalMismatch {
                variable,
                index,
                expected,
                found,
            } => write!(
                f,
                "'{variable}' after command {index} is {found}, expected {expected}"
            ),
            Verdict::OutOfTolerance {
                variable,
                index,
                value,
                lower,
                upper,
            } => write!(
                f,
                "'{variable}' after command {index} is {value}, outside [{lower}, {upper}]"
            ),
        }
    }
}

/// Compares traces over a fixed partition of the state variables.
#[derive(Debug, Clone, PartialEq)]
pub struct TraceComparator {
    categorical: Vec<String>,
    continuous: Vec<String>,
}

impl TraceComparator {
    pub fn new(schema: &StateSchema) -> Self {
        let mut categorical = Vec::new();
        let mut continuous = Vec::new();
        for var in schema.variables() {
            match var.kind() {
                VariableKind::Categorical => categorical.push(var.name().to_string()),
                VariableKind::Continuous => continuous.push(var.name().to_string()),
            }
        }
        Self {
            categorical,
            continuous,
        }
    }

    /// Partition variables by the values recorded in the first ground-truth
    /// state: numeric values are continuous, the rest categorical.
    pub fn infer(ground_truth: &[MissionTrace]) -> Result<Self, CompareError> {
        let first = ground_truth.first().ok_or(CompareError::EmptyGroundTruth)?;
        let schema = first
            .commands()
            .iter()
            .find_map(|c| c.final_state())
            .map(StateSchema::infer)
            .unwrap_or_default();
        Ok(Self::new(&schema))
    }

    pub fn categorical(&self) -> &[String] {
        &self.categorical
    }

    pub fn continuous(&self) -> &[String] {
        &self.continuous
    }

    /// Whether `candidate` is statistically indistinguishable from the
    /// ground truth.
    pub fn matches_ground_truth(
        &self,
        candidate: &MissionTrace,
        ground_truth: &[MissionTrace],
        tolerance: f64,
    ) -> Result<bool, CompareError> {
        self.compare(candidate, ground_truth, tolerance)
            .map(|verdict| verdict.is_equivalent())
    }

    /// Like [`matches_ground_truth`](Self::matches_ground_truth), reporting
    /// the first violation found.
    pub fn compare(
        &self,
        candidate: &MissionTrace,
        ground_truth: &[MissionTrace],
        tolerance: f64,
    ) -> Result<Verdict, CompareError> {
        if tolerance.is_nan() || tolerance < 0.0 {
            return Err(CompareError::InvalidTolerance(tolerance));
        }
        let first = ground_truth.first().ok_or(CompareError::EmptyGroundTruth)?;

        let expected = owned_kinds(first);
        for (trace, gt) in ground_truth.iter().enumerate().skip(1) {
            let found = owned_kinds(gt);
            if found != expected {
                return Err(CompareError::InconsistentStructure {
                    trace,
                    expected,
                    found,
                });
            }
        }

        let truth = ground_truth
            .iter()
            .map(post_command_states)
            .collect::<Result<Vec<_>, _>>()?;

        for variable in &self.categorical {
            for index in 0..expected.len() {
                let reference = lookup(truth[0][index], variable, index)?;
                for states in &truth[1..] {
                    if lookup(states[index], variable, index)? != reference {
                        return Err(CompareError::InconsistentCategoricalValues {
                            variable: variable.clone(),
                            index,
                        });
                    }
                }
            }
        }

        let found = owned_kinds(candidate);
        if found != expected {
            tracing::debug!(?expected, ?found, "candidate executed a different command sequence");
            return Ok(Verdict::StructuralMismatch { expected, found });
        }
        let observed = post_command_states(candidate)?;

        for variable in &self.categorical {
            for index in 0..expected.len() {
                let reference = lookup(truth[0][index], variable, index)?;
                let value = lookup(observed[index], variable, index)?;
                if value != reference {
                    return Ok(Verdict::CategoricalMismatch {
                        variable: variable.clone(),
                        index,
                        expected: reference.clone(),
                        found: value.clone(),
                    });
                }
            }
        }

        for variable in &self.continuous {
            for index in 0..expected.len() {
                let samples = truth
                    .iter()
                    .map(|states| numeric(states[index], variable, index))
                    .collect::<Result<Vec<f64>, _>>()?;
                let mu = mean(&samples).unwrap_or(0.0);
                let sigma = std_dev(&samples).unwrap_or(0.0);
                let lower = mu - sigma * tolerance;
                let upper = mu + sigma * tolerance;
                let value = numeric(observed[index], variable, index)?;

                if !within(value, lower, upper, tolerance) {
                    tracing::debug!(variable = %variable, index, value, lower, upper, "value outside acceptance window");
                    return Ok(Verdict::OutOfTolerance {
                        variable: variable.clone(),
                        index,
                        value,
                        lower,
                        upper,
                    });
                }
            }
        }

        Ok(Verdict::Equivalent)
    }
}

/// Inclusive window check that also accepts values within floating-point
/// noise of either bound.
fn within(value: f64, lower: f64, upper: f64, tolerance: f64) -> bool {
    let epsilon = tolerance * f64::EPSILON;
    (lower <= value && value <= upper)
        || nearly_eq(value, lower, epsilon)
        || nearly_eq(value, upper, epsilon)
}

fn owned_kinds(trace: &MissionTrace) -> Vec<String> {
    trace.command_kinds().into_iter().map(str::to_string).collect()
}

fn post_command_states(trace: &MissionTrace) -> Result<Vec<&State>, CompareError> {
    trace
        .commands()
        .iter()
        .enumerate()
        .map(|(index, c)| c.final_state().ok_or(CompareError::MissingState { index }))
        .collect()
}

fn lookup<'s>(state: &'s State, variable: &str, index: usize) -> Result<&'s Value, CompareError> {
    state.get(variable).ok_or_else(|| CompareError::MissingVariable {
        variable: variable.to_string(),
        index,
    })
}

fn numeric(state: &State, variable: &str, index: usize) -> Result<f64, CompareError> {
    let value = lookup(state, variable, index)?;
    value.as_f64().ok_or_else(|| CompareError::NonNumericValue {
        variable: variable.to_string(),
        index,
        value: value.clone(),
    })
}
