//! Synchronous validate-and-finalize driver for one submission.

use nimbus_types::{FormData, Requester, RunOutcome, Warning};
use tracing::{debug, info, warn};

use crate::{
    action::ActionScope,
    context::WorkflowContext,
    error::{DefinitionError, EngineError, FinalizeError},
    provider::ChoiceCache,
    step::{StepValidation, is_step_enabled, validate_step},
    templates::render_message,
    workflow::{
        definition::{WorkflowDefinition, check_definition},
        state::{StepStatus, WorkflowState, WorkflowTelemetry, transition},
    },
};

/// One instance of a wizard, created per submission (or per render).
///
/// The instance owns the accumulated context and the choice cache; both are
/// dropped with it.
pub struct Workflow<D: WorkflowDefinition> {
    pub(crate) definition: D,
    pub(crate) requester: Requester,
    pub(crate) context: D::Context,
    pub(crate) state: WorkflowState,
    pub(crate) cache: ChoiceCache,
    pub(crate) telemetry: WorkflowTelemetry,
    pub(crate) warnings: Vec<Warning>,
}

impl<D: WorkflowDefinition> Workflow<D> {
    /// Seeds the context and verifies the definition against it.
    pub fn new(definition: D, requester: Requester, seed: D::Context) -> Result<Self, DefinitionError> {
        check_definition(&definition, &seed)?;
        debug!(workflow = %definition.slug(), step_count = definition.steps().len(), "workflow created");

        Ok(Self {
            definition,
            requester,
            context: seed,
            state: WorkflowState::Created,
            cache: ChoiceCache::new(),
            telemetry: WorkflowTelemetry::default(),
            warnings: Vec::new(),
        })
    }

    pub fn definition(&self) -> &D {
        &self.definition
    }

    pub fn state(&self) -> WorkflowState {
        self.state
    }

    /// Context accumulated so far.
    pub fn context(&self) -> &D::Context {
        &self.context
    }

    pub fn telemetry(&self) -> &WorkflowTelemetry {
        &self.telemetry
    }

    pub fn requester(&self) -> &Requester {
        &self.requester
    }

    /// Validates every enabled step in order and finalizes on success.
    ///
    /// Validation stops at the first step that rejects the submission. An
    /// instance runs once; a second call is a programming error.
    pub fn run(&mut self, form: &FormData) -> Result<RunOutcome<D::Entity>, EngineError> {
        let Workflow {
            definition,
            requester,
            context,
            state,
            cache,
            telemetry,
            warnings,
        } = self;
        let workflow = definition.slug();

        if *state != WorkflowState::Created {
            return Err(EngineError::AlreadyRun {
                workflow: workflow.to_string(),
            });
        }
        info!(workflow = %workflow, "workflow run started");

        for (index, step) in definition.steps().iter().enumerate() {
            transition(state, telemetry, WorkflowState::Validating(index));

            if !is_step_enabled(step.as_ref(), &*requester, &*context) {
                debug!(workflow = %workflow, step = %step.slug(), "step disabled; skipping");
                telemetry.record_step_event(step.slug(), StepStatus::Skipped);
                continue;
            }

            let scope = ActionScope {
                form,
                context: &*context,
                requester: &*requester,
                cache: &*cache,
            };
            match validate_step(step.as_ref(), scope, telemetry, warnings)? {
                StepValidation::Valid(contribution) => {
                    telemetry.record_step_event(step.slug(), StepStatus::Valid);
                    context.merge(contribution);
                }
                StepValidation::Invalid(errors) => {
                    info!(workflow = %workflow, step = %step.slug(), "step rejected the submission");
                    telemetry.record_step_event(step.slug(), StepStatus::Invalid);
                    transition(state, telemetry, WorkflowState::Failed);
                    return Ok(RunOutcome::Failed {
                        step: step.slug().to_string(),
                        errors,
                        warnings: warnings.clone(),
                    });
                }
            }
        }

        transition(state, telemetry, WorkflowState::Finalizing);
        info!(workflow = %workflow, "finalizing workflow");
        let values = definition.message_values(context);

        match definition.finalize(context, requester) {
            Ok(entity) => {
                transition(state, telemetry, WorkflowState::Completed);
                let message = render_message(definition.success_message(), &values);
                info!(workflow = %workflow, message = %message, "workflow completed");
                Ok(RunOutcome::Completed {
                    message,
                    entity,
                    warnings: warnings.clone(),
                })
            }
            Err(FinalizeError::Failed(source)) if source.is_classified() => {
                transition(state, telemetry, WorkflowState::FinalizeFailed);
                warn!(workflow = %workflow, error = %source, "finalize failed");
                Ok(RunOutcome::FinalizeFailed {
                    message: render_message(definition.failure_message(), &values),
                    reason: source.to_string(),
                    warnings: warnings.clone(),
                })
            }
            Err(FinalizeError::Failed(source)) => Err(EngineError::Finalize {
                workflow: workflow.to_string(),
                source,
            }),
            Err(FinalizeError::Partial {
                removed,
                replacement,
                source,
            }) => {
                transition(state, telemetry, WorkflowState::PartialFinalize);
                warn!(workflow = %workflow, removed = %removed, error = %source, "finalize left partial state");
                Ok(RunOutcome::PartialFinalize {
                    message: render_message(definition.failure_message(), &values),
                    removed,
                    replacement,
                    reason: source.to_string(),
                    warnings: warnings.clone(),
                })
            }
            Err(FinalizeError::MissingContext(key)) => Err(EngineError::MissingContext {
                workflow: workflow.to_string(),
                key,
            }),
        }
    }
}
