//! Engine error types.
//!
//! Validation problems are not errors: they travel inside
//! [`RunOutcome::Failed`](nimbus_types::RunOutcome). The types here cover
//! programming mistakes in workflow definitions and collaborator failures the
//! engine refuses to interpret.

use nimbus_types::CollaboratorError;
use thiserror::Error;

/// A workflow definition that cannot be run as declared.
#[derive(Debug, Error, PartialEq, Eq)]
pub enum DefinitionError {
    #[error("workflow '{workflow}' must declare at least one step")]
    NoSteps { workflow: String },
    #[error("step '{step}' is declared more than once")]
    DuplicateStep { step: String },
    #[error("step '{step}' declares field '{field}' more than once")]
    DuplicateField { step: String, field: String },
    #[error("field '{field}' of step '{step}' depends on unknown companion field '{companion}'")]
    UnknownCompanion { step: String, field: String, companion: String },
    #[error("step '{step}' depends on '{key}', which no earlier step contributes and the initial context does not provide")]
    UnsatisfiedDependency { step: String, key: String },
}

/// Why a step's contribution was refused.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ContributionViolation {
    /// The partial context holds a key the step never declared.
    Undeclared,
    /// A declared key was not returned.
    Missing,
}

/// Failure that aborts a run without producing a [`RunOutcome`](nimbus_types::RunOutcome).
#[derive(Debug, Error)]
pub enum EngineError {
    #[error("step '{step}' returned an invalid contribution for '{key}' ({violation:?})")]
    Contribution {
        step: String,
        key: String,
        violation: ContributionViolation,
    },
    #[error("unexpected failure while {activity} in step '{step}'")]
    Collaborator {
        step: String,
        activity: String,
        #[source]
        source: CollaboratorError,
    },
    #[error("finalize of workflow '{workflow}' requires '{key}', which is missing from the context")]
    MissingContext { workflow: String, key: String },
    #[error("unexpected failure while finalizing workflow '{workflow}'")]
    Finalize {
        workflow: String,
        #[source]
        source: CollaboratorError,
    },
    #[error("workflow '{workflow}' has already run; create a new instance per submission")]
    AlreadyRun { workflow: String },
}

/// Failure reported by a workflow's finalize operation.
#[derive(Debug, Error)]
pub enum FinalizeError {
    /// Nothing was changed remotely.
    #[error("finalize failed: {0}")]
    Failed(#[from] CollaboratorError),
    /// A destructive call succeeded and a later call of the same sequence failed.
    #[error("'{removed}' was removed but its replacement could not be completed: {source}")]
    Partial {
        removed: String,
        replacement: Option<String>,
        #[source]
        source: CollaboratorError,
    },
    /// A key the finalize needs was never contributed.
    #[error("missing context key '{0}'")]
    MissingContext(String),
}

impl FinalizeError {
    pub fn missing(key: impl ToString) -> Self {
        FinalizeError::MissingContext(key.to_string())
    }
}
