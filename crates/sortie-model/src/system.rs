use std::collections::BTreeMap;

use rand::Rng;

use crate::branch::{Branch, BranchContext, BranchId, GuardedBranch, IdleBranch};
use crate::command::{Command, Parameter};
use crate::error::ModelError;
use crate::variable::StateSchema;

/// A command kind: its parameters and its behavior branches, ordered from
/// most to least specific and terminated by an idle branch.
#[derive(Debug, Clone)]
pub struct CommandSchema {
    name: String,
    parameters: Vec<Parameter>,
    branches: Vec<Branch>,
}

impl CommandSchema {
    pub fn builder(name: &str) -> CommandSchemaBuilder {
        CommandSchemaBuilder {
            name: name.to_string(),
            parameters: Vec::new(),
            branches: Vec::new(),
            idle: None,
        }
    }

    pub fn name(&self) -> &str {
        &self.name
    }

    pub fn parameters(&self) -> &[Parameter] {
        &self.parameters
    }

    pub fn branches(&self) -> &[Branch] {
        &self.branches
    }

    /// First branch whose precondition holds.
    pub fn resolve(&self, ctx: &BranchContext<'_>) -> Result<&Branch, ModelError> {
        self.branches
            .iter()
            .find(|b| b.precondition(ctx))
            .ok_or_else(|| ModelError::NoApplicableBranch {
                kind: self.name.clone(),
            })
    }

    pub fn branch_id(&self, branch: &Branch) -> BranchId {
        BranchId {
            schema: self.name.clone(),
            branch: branch.name().to_string(),
        }
    }

    /// Default generator: every parameter drawn uniformly from its domain.
    pub fn generate<R: Rng + ?Sized>(&self, rng: &mut R) -> Command {
        let mut cmd = Command::new(&self.name);
        for p in &self.parameters {
            // Domains are checked when the schema is built.
            if let Some(value) = p.domain.sample(rng) {
                cmd.parameters.insert(p.name.clone(), value);
            }
        }
        cmd
    }
}

pub struct CommandSchemaBuilder {
    name: String,
    parameters: Vec<Parameter>,
    branches: Vec<Branch>,
    idle: Option<IdleBranch>,
}

impl CommandSchemaBuilder {
    pub fn parameter(mut self, parameter: Parameter) -> Self {
        self.parameters.push(parameter);
        self
    }

    /// Append a guarded branch. Order matters: earlier branches win.
    pub fn branch(mut self, branch: GuardedBranch) -> Self {
        self.branches.push(Branch::Guarded(branch));
        self
    }

    pub fn idle(mut self, idle: IdleBranch) -> Self {
        self.idle = Some(idle);
        self
    }

    /// Fails when the idle branch is missing or a parameter domain is empty.
    pub fn build(self) -> Result<CommandSchema, ModelError> {
        if let Some(p) = self.parameters.iter().find(|p| !p.domain.is_valid()) {
            return Err(ModelError::InvalidDomain {
                schema: self.name.clone(),
                parameter: p.name.clone(),
            });
        }
        let idle = self.idle.ok_or_else(|| ModelError::MissingIdleBranch {
            schema: self.name.clone(),
        })?;
        let mut branches = self.branches;
        branches.push(Branch::Idle(idle));
        Ok(CommandSchema {
            name: self.name,
            parameters: self.parameters,
            branches,
        })
    }
}

/// The declarative model of a system under test: its state variables and its
/// command catalogue.
#[derive(Debug, Clone)]
pub struct SystemModel {
    name: String,
    state: StateSchema,
    schemas: BTreeMap<String, CommandSchema>,
}

impl SystemModel {
    pub fn new(
        name: &str,
        state: StateSchema,
        schemas: Vec<CommandSchema>,
    ) -> Result<Self, ModelError> {
        let mut by_name = BTreeMap::new();
        for schema in schemas {
            let key = schema.name.clone();
            if by_name.insert(key.clone(), schema).is_some() {
                return Err(ModelError::DuplicateSchema { schema: key });
            }
        }
        Ok(Self {
            name: name.to_string(),
            state,
            schemas: by_name,
        })
    }

    pub fn name(&self) -> &str {
        &self.name
    }

    pub fn state_schema(&self) -> &StateSchema {
        &self.state
    }

    pub fn schema(&self, kind: &str) -> Result<&CommandSchema, ModelError> {
        self.schemas
            .get(kind)
            .ok_or_else(|| ModelError::UnknownCommand {
                kind: kind.to_string(),
            })
    }

    /// Schemas in name order (stable for seeded generation).
    pub fn schemas(&self) -> impl Iterator<Item = &CommandSchema> {
        self.schemas.values()
    }

    /// Resolve the branch that governs `ctx.command` in `ctx.state`.
    pub fn resolve(&self, ctx: &BranchContext<'_>) -> Result<&Branch, ModelError> {
        self.schema(&ctx.command.kind)?.resolve(ctx)
    }

    /// Timeout for the resolved branch. Negative or non-finite estimates are
    /// modeling defects.
    pub fn timeout(&self, branch: &Branch, ctx: &BranchContext<'_>) -> Result<f64, ModelError> {
        let timeout = branch.timeout(ctx);
        if !timeout.is_finite() || timeout < 0.0 {
            return Err(ModelError::InvalidTimeout {
                branch: format!("{}:{}", ctx.command.kind, branch.name()),
                timeout,
            });
        }
        Ok(timeout)
    }
}
