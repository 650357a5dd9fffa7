//! Read-only view of a workflow for presenting an empty form.

use nimbus_types::{Choice, FieldValue, FormData, ValueType, Warning};
use serde::Serialize;
use tracing::debug;

use crate::{
    action::{ActionScope, populate_field_choices},
    error::EngineError,
    provider::ChoiceCache,
    step::is_step_enabled,
    workflow::{Workflow, definition::WorkflowDefinition, state::StepStatus},
};

/// Presentation of one field with its initial value and fresh choices.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct FieldView {
    pub name: String,
    pub label: String,
    pub value_type: ValueType,
    pub required: bool,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub initial: Option<FieldValue>,
    #[serde(skip_serializing_if = "Vec::is_empty")]
    pub choices: Vec<Choice>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub help_text: Option<String>,
}

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct StepView {
    pub slug: String,
    pub name: String,
    pub fields: Vec<FieldView>,
}

impl StepView {
    pub fn field(&self, name: &str) -> Option<&FieldView> {
        self.fields.iter().find(|field| field.name == name)
    }
}

/// Every enabled step of a workflow, ready to present.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct WorkflowView {
    pub slug: String,
    pub name: String,
    pub steps: Vec<StepView>,
    /// Choice lists that degraded to empty because a collaborator failed.
    pub warnings: Vec<Warning>,
}

impl WorkflowView {
    pub fn step(&self, slug: &str) -> Option<&StepView> {
        self.steps.iter().find(|step| step.slug == slug)
    }
}

impl<D: WorkflowDefinition> Workflow<D> {
    /// Renders every enabled step against the seeded context.
    ///
    /// Dynamic choices are fetched exactly as during validation; failures
    /// degrade to empty lists plus warnings. Rendering never finalizes; the
    /// listings and warnings it gathers are its own and never reach a later
    /// run of the same instance.
    pub fn render(&mut self) -> Result<WorkflowView, EngineError> {
        let Workflow {
            definition,
            requester,
            context,
            telemetry,
            ..
        } = self;
        let cache = ChoiceCache::new();
        let mut warnings = Vec::new();
        let empty_form = FormData::new();
        let mut steps = Vec::new();

        for step in definition.steps() {
            if !is_step_enabled(step.as_ref(), &*requester, &*context) {
                telemetry.record_step_event(step.slug(), StepStatus::Skipped);
                continue;
            }

            let scope = ActionScope {
                form: &empty_form,
                context: &*context,
                requester: &*requester,
                cache: &cache,
            };
            let action = step.action();
            let mut fields = Vec::with_capacity(action.fields().len());

            for field in action.fields() {
                let choices = if field.dynamic_choices {
                    populate_field_choices(step.slug(), action, field, scope, telemetry, &mut warnings)?.choices
                } else {
                    field.constraints.choices.clone()
                };

                fields.push(FieldView {
                    name: field.name.clone(),
                    label: field.label.clone(),
                    value_type: field.value_type,
                    required: field.required,
                    initial: action.initial_value(field, &choices),
                    choices,
                    help_text: field.help_text.clone(),
                });
            }

            steps.push(StepView {
                slug: step.slug().to_string(),
                name: step.name().to_string(),
                fields,
            });
        }

        debug!(workflow = %definition.slug(), step_count = steps.len(), "workflow rendered");
        Ok(WorkflowView {
            slug: definition.slug().to_string(),
            name: definition.name().to_string(),
            steps,
            warnings,
        })
    }
}
