use crate::variable::VariableKind;

/// Modeling defects. These are never retried: a model that produces one of
/// these is wrong, not unlucky.
#[derive(Debug, Clone, PartialEq, thiserror::Error)]
pub enum ModelError {
    #[error("Unknown command kind: {kind}")]
    UnknownCommand { kind: String },

    #[error("No applicable branch for command '{kind}' (schema has no matching idle fallback)")]
    NoApplicableBranch { kind: String },

    #[error("Command schema '{schema}' does not end with an idle branch")]
    MissingIdleBranch { schema: String },

    #[error("Parameter '{parameter}' of command schema '{schema}' has an empty domain")]
    InvalidDomain { schema: String, parameter: String },

    #[error("Duplicate command schema: {schema}")]
    DuplicateSchema { schema: String },

    #[error("Duplicate state variable: {name}")]
    DuplicateVariable { name: String },

    #[error("Missing value for state variable '{name}'")]
    MissingVariable { name: String },

    #[error("Variable '{name}' declared {expected:?} but observed value '{observed}'")]
    KindMismatch {
        name: String,
        expected: VariableKind,
        observed: String,
    },

    #[error("Branch '{branch}' produced an invalid timeout: {timeout}")]
    InvalidTimeout { branch: String, timeout: f64 },
}
