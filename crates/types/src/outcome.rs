//! Outcomes reported to the caller once a workflow run stops.

use serde::{Deserialize, Serialize};

use crate::validation::StepErrors;

/// Non-blocking notice raised while a run proceeds, for example a choice list
/// that could not be fetched for an optional field.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Warning {
    /// Slug of the step that raised the warning.
    pub step: String,
    #[serde(default)]
    pub field: Option<String>,
    pub message: String,
}

impl Warning {
    pub fn for_field(step: impl Into<String>, field: impl Into<String>, message: impl Into<String>) -> Self {
        Self {
            step: step.into(),
            field: Some(field.into()),
            message: message.into(),
        }
    }
}

/// Terminal result of one validate-and-finalize cycle.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "status", rename_all = "snake_case")]
pub enum RunOutcome<E> {
    /// Every enabled step validated and the finalize call succeeded.
    Completed { message: String, entity: E, warnings: Vec<Warning> },
    /// A step rejected the submission; nothing external was changed.
    Failed {
        step: String,
        errors: StepErrors,
        warnings: Vec<Warning>,
    },
    /// The finalize call failed before anything was changed.
    FinalizeFailed {
        message: String,
        reason: String,
        warnings: Vec<Warning>,
    },
    /// A destructive finalize step succeeded and a later one failed.
    PartialFinalize {
        message: String,
        /// Identifier of the entity that no longer exists.
        removed: String,
        /// Identifier of the replacement, when it was created but left incomplete.
        replacement: Option<String>,
        reason: String,
        warnings: Vec<Warning>,
    },
}

impl<E> RunOutcome<E> {
    pub fn is_completed(&self) -> bool {
        matches!(self, RunOutcome::Completed { .. })
    }

    pub fn warnings(&self) -> &[Warning] {
        match self {
            RunOutcome::Completed { warnings, .. }
            | RunOutcome::Failed { warnings, .. }
            | RunOutcome::FinalizeFailed { warnings, .. }
            | RunOutcome::PartialFinalize { warnings, .. } => warnings,
        }
    }

    /// Success or failure message; `None` for validation failures.
    pub fn message(&self) -> Option<&str> {
        match self {
            RunOutcome::Completed { message, .. }
            | RunOutcome::FinalizeFailed { message, .. }
            | RunOutcome::PartialFinalize { message, .. } => Some(message),
            RunOutcome::Failed { .. } => None,
        }
    }

    /// Validation errors when a step rejected the submission.
    pub fn step_errors(&self) -> Option<(&str, &StepErrors)> {
        match self {
            RunOutcome::Failed { step, errors, .. } => Some((step, errors)),
            _ => None,
        }
    }

    pub fn entity(&self) -> Option<&E> {
        match self {
            RunOutcome::Completed { entity, .. } => Some(entity),
            _ => None,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn serializes_with_status_tag() {
        let outcome: RunOutcome<String> = RunOutcome::FinalizeFailed {
            message: "Unable to create flavor.".into(),
            reason: "request rejected: quota".into(),
            warnings: Vec::new(),
        };
        let json = serde_json::to_value(&outcome).expect("serialize outcome");

        assert_eq!(json["status"], "finalize_failed");
        assert_eq!(json["message"], "Unable to create flavor.");
        assert!(outcome.message().is_some());
        assert!(outcome.step_errors().is_none());
    }
}
