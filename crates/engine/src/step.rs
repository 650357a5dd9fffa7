//! Steps: an action plus its place in the workflow's data flow.

use std::collections::BTreeSet;

use nimbus_types::{Requester, StepErrors, Warning};
use tracing::debug;

use crate::{
    action::{Action, ActionScope, ActionValidation, ValidatedFields, validate_action},
    context::WorkflowContext,
    error::{ContributionViolation, EngineError},
    workflow::WorkflowTelemetry,
};

/// One page of a wizard.
///
/// `depends_on` and `contributes` describe the step's data flow through the
/// context; the workflow checks at construction that every dependency is
/// produced upstream, and at run time that `contribute` returns exactly the
/// declared keys.
pub trait Step<C: WorkflowContext>: Send + Sync {
    /// Unique identifier within the workflow.
    fn slug(&self) -> &str;

    fn name(&self) -> &str;

    fn action(&self) -> &dyn Action<C>;

    /// Context keys read by this step.
    fn depends_on(&self) -> &[C::Key] {
        &[]
    }

    /// Context keys written by this step.
    fn contributes(&self) -> &[C::Key];

    /// Permissions the requester must hold for the step to run.
    fn permissions(&self) -> &[&str] {
        &[]
    }

    /// Condition on the context accumulated so far.
    fn is_enabled(&self, context: &C) -> bool {
        let _ = context;
        true
    }

    /// Maps validated fields onto the declared context keys.
    fn contribute(&self, fields: &ValidatedFields, scope: ActionScope<'_, C>) -> C;
}

/// Result of validating one step.
#[derive(Debug, Clone, PartialEq)]
pub enum StepValidation<C> {
    /// Partial context holding exactly the declared keys.
    Valid(C),
    Invalid(StepErrors),
}

/// A step runs only when the requester holds every permission and its own
/// condition accepts the context accumulated so far.
pub fn is_step_enabled<C: WorkflowContext>(step: &dyn Step<C>, requester: &Requester, context: &C) -> bool {
    requester.has_permissions(step.permissions()) && step.is_enabled(context)
}

/// Validates `step` against the submission and checks its contribution.
pub fn validate_step<C: WorkflowContext>(
    step: &dyn Step<C>,
    scope: ActionScope<'_, C>,
    telemetry: &mut WorkflowTelemetry,
    warnings: &mut Vec<Warning>,
) -> Result<StepValidation<C>, EngineError> {
    let fields = match validate_action(step.slug(), step.action(), scope, telemetry, warnings)? {
        ActionValidation::Valid(fields) => fields,
        ActionValidation::Invalid(errors) => return Ok(StepValidation::Invalid(errors)),
    };

    let contribution = step.contribute(&fields, scope);
    check_contribution(step, &contribution)?;
    debug!(step = %step.slug(), key_count = step.contributes().len(), "step contributed to context");
    Ok(StepValidation::Valid(contribution))
}

fn check_contribution<C: WorkflowContext>(step: &dyn Step<C>, contribution: &C) -> Result<(), EngineError> {
    let declared: BTreeSet<C::Key> = step.contributes().iter().copied().collect();
    let present = contribution.present_keys();

    if let Some(key) = present.difference(&declared).next() {
        return Err(EngineError::Contribution {
            step: step.slug().to_string(),
            key: key.to_string(),
            violation: ContributionViolation::Undeclared,
        });
    }
    if let Some(key) = declared.difference(&present).next() {
        return Err(EngineError::Contribution {
            step: step.slug().to_string(),
            key: key.to_string(),
            violation: ContributionViolation::Missing,
        });
    }
    Ok(())
}
