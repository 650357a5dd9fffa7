//! Workflow lifecycle state and run telemetry.
//!
//! A [`Workflow`](super::Workflow) moves through [`WorkflowState`] exactly once.
//! Every transition, every step decision, and every choice population is
//! recorded in [`WorkflowTelemetry`] so callers and tests can observe what a
//! run actually did.

use std::fmt;

use chrono::{DateTime, Utc};
use serde::Serialize;

/// Lifecycle of one workflow instance.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(tag = "state", content = "step_index", rename_all = "snake_case")]
pub enum WorkflowState {
    Created,
    /// Evaluating the step at this index.
    Validating(usize),
    /// A step rejected the submission.
    Failed,
    Finalizing,
    Completed,
    FinalizeFailed,
    PartialFinalize,
}

impl WorkflowState {
    /// Whether the instance has stopped for good.
    pub fn is_terminal(&self) -> bool {
        matches!(
            self,
            WorkflowState::Failed | WorkflowState::Completed | WorkflowState::FinalizeFailed | WorkflowState::PartialFinalize
        )
    }
}

impl fmt::Display for WorkflowState {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            WorkflowState::Created => f.write_str("created"),
            WorkflowState::Validating(index) => write!(f, "validating({})", index),
            WorkflowState::Failed => f.write_str("failed"),
            WorkflowState::Finalizing => f.write_str("finalizing"),
            WorkflowState::Completed => f.write_str("completed"),
            WorkflowState::FinalizeFailed => f.write_str("finalize_failed"),
            WorkflowState::PartialFinalize => f.write_str("partial_finalize"),
        }
    }
}

/// What happened to one step during a run.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum StepStatus {
    /// Missing permission or condition; the action was never invoked.
    Skipped,
    Valid,
    Invalid,
}

/// Structured step telemetry event.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct StepTelemetryEvent {
    pub step: String,
    pub status: StepStatus,
    pub at: DateTime<Utc>,
}

/// One refresh of a dynamic field's choices.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct ChoicePopulationEvent {
    pub step: String,
    pub field: String,
    pub item_count: usize,
    /// The fetch failed and the list degraded to empty.
    pub degraded: bool,
    pub at: DateTime<Utc>,
}

impl ChoicePopulationEvent {
    pub fn new(step: impl Into<String>, field: impl Into<String>, item_count: usize, degraded: bool) -> Self {
        Self {
            step: step.into(),
            field: field.into(),
            item_count,
            degraded,
            at: Utc::now(),
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct TransitionEvent {
    pub from: WorkflowState,
    pub to: WorkflowState,
    pub at: DateTime<Utc>,
}

/// Aggregated telemetry emitted during a workflow run.
#[derive(Debug, Default, Clone, Serialize)]
pub struct WorkflowTelemetry {
    step_events: Vec<StepTelemetryEvent>,
    choice_populations: Vec<ChoicePopulationEvent>,
    transitions: Vec<TransitionEvent>,
}

impl WorkflowTelemetry {
    pub(crate) fn record_step_event(&mut self, step: &str, status: StepStatus) {
        self.step_events.push(StepTelemetryEvent {
            step: step.to_string(),
            status,
            at: Utc::now(),
        });
    }

    pub(crate) fn record_choice_population(&mut self, event: ChoicePopulationEvent) {
        self.choice_populations.push(event);
    }

    pub(crate) fn record_transition(&mut self, from: WorkflowState, to: WorkflowState) {
        self.transitions.push(TransitionEvent { from, to, at: Utc::now() });
    }

    /// Returns recorded step events.
    pub fn step_events(&self) -> &[StepTelemetryEvent] {
        &self.step_events
    }

    pub fn choice_populations(&self) -> &[ChoicePopulationEvent] {
        &self.choice_populations
    }

    pub fn transitions(&self) -> &[TransitionEvent] {
        &self.transitions
    }

    /// Slugs of steps whose action was invoked, in run order.
    pub fn invoked_steps(&self) -> Vec<&str> {
        self.step_events
            .iter()
            .filter(|event| event.status != StepStatus::Skipped)
            .map(|event| event.step.as_str())
            .collect()
    }

    pub fn skipped_steps(&self) -> Vec<&str> {
        self.step_events
            .iter()
            .filter(|event| event.status == StepStatus::Skipped)
            .map(|event| event.step.as_str())
            .collect()
    }
}

/// Moves `state` to `next`, recording the transition.
pub(crate) fn transition(state: &mut WorkflowState, telemetry: &mut WorkflowTelemetry, next: WorkflowState) {
    telemetry.record_transition(*state, next);
    *state = next;
}
