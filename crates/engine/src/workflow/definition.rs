//! Workflow definitions and the checks run when an instance is created.

use std::{
    collections::{BTreeSet, HashSet},
    fmt,
};

use indexmap::IndexMap;
use nimbus_types::Requester;
use serde::Serialize;

use crate::{
    context::WorkflowContext,
    error::{DefinitionError, FinalizeError},
    step::Step,
};

/// A complete wizard: its ordered steps and its finalize operation.
pub trait WorkflowDefinition {
    type Context: WorkflowContext;
    /// Entity returned by a successful finalize.
    type Entity: Serialize + fmt::Debug + Clone;

    fn slug(&self) -> &str;

    fn name(&self) -> &str;

    /// Steps in the order they are validated.
    fn steps(&self) -> &[Box<dyn Step<Self::Context>>];

    /// Performs the externally-effecting call (or fixed call sequence) with the
    /// completed context.
    fn finalize(&self, context: &Self::Context, requester: &Requester) -> Result<Self::Entity, FinalizeError>;

    /// Message template reported on success; see [`render_message`](crate::render_message).
    fn success_message(&self) -> &str;

    /// Message template reported when finalize fails.
    fn failure_message(&self) -> &str;

    /// Values available to the message templates.
    fn message_values(&self, context: &Self::Context) -> IndexMap<String, String> {
        let _ = context;
        IndexMap::new()
    }
}

/// Verifies that `definition` can run from `seed`.
///
/// Checks unique step slugs, unique field names per action, existing
/// `applies_when` companions, and that every `depends_on` key is either seeded
/// or contributed by a step declared earlier.
pub fn check_definition<D: WorkflowDefinition>(definition: &D, seed: &D::Context) -> Result<(), DefinitionError> {
    let steps = definition.steps();
    if steps.is_empty() {
        return Err(DefinitionError::NoSteps {
            workflow: definition.slug().to_string(),
        });
    }

    let mut slugs = HashSet::new();
    let mut available: BTreeSet<<D::Context as WorkflowContext>::Key> = seed.present_keys();

    for step in steps {
        if !slugs.insert(step.slug()) {
            return Err(DefinitionError::DuplicateStep {
                step: step.slug().to_string(),
            });
        }

        check_fields(step.as_ref())?;

        if let Some(key) = step.depends_on().iter().find(|key| !available.contains(key)) {
            return Err(DefinitionError::UnsatisfiedDependency {
                step: step.slug().to_string(),
                key: key.to_string(),
            });
        }
        available.extend(step.contributes().iter().copied());
    }

    Ok(())
}

fn check_fields<C: WorkflowContext>(step: &dyn Step<C>) -> Result<(), DefinitionError> {
    let fields = step.action().fields();
    let mut names = HashSet::new();

    for field in fields {
        if !names.insert(field.name.as_str()) {
            return Err(DefinitionError::DuplicateField {
                step: step.slug().to_string(),
                field: field.name.clone(),
            });
        }
    }

    for field in fields {
        if let Some(condition) = &field.applies_when
            && !names.contains(condition.field.as_str())
        {
            return Err(DefinitionError::UnknownCompanion {
                step: step.slug().to_string(),
                field: field.name.clone(),
                companion: condition.field.clone(),
            });
        }
    }

    Ok(())
}
