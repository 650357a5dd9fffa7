//! Workflow orchestration.
//!
//! - `definition`: the [`WorkflowDefinition`] contract and its construction-time checks
//! - `state`: lifecycle states and the telemetry recorded during a run
//! - `runner`: the [`Workflow`] instance that validates steps in order and finalizes
//! - `render`: the read-only view of a workflow used to present an empty form

pub mod definition;
pub mod render;
pub mod runner;
pub mod state;

pub use definition::{WorkflowDefinition, check_definition};
pub use render::{FieldView, StepView, WorkflowView};
pub use runner::Workflow;
pub use state::{ChoicePopulationEvent, StepStatus, StepTelemetryEvent, TransitionEvent, WorkflowState, WorkflowTelemetry};
