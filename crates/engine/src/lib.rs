//! # Nimbus Engine
//!
//! The Nimbus engine drives multi-step wizards of the cloud administration
//! console: it validates a submission step by step against a typed context,
//! populates choice fields from live collaborator data, and finalizes with one
//! externally-effecting operation.
//!
//! ## Architecture
//!
//! - **`context`**: typed context records and the [`workflow_context!`] macro
//! - **`action`**: field validation, dynamic choices, cross-field checks
//! - **`step`**: data-flow declarations (`depends_on`, `contributes`) and enablement
//! - **`workflow`**: definitions, the [`Workflow`] driver, rendering, telemetry
//! - **`provider`**: the [`ResourceClient`] collaborator contract and the per-run choice cache
//! - **`templates`**: `${{ name }}` message interpolation
//!
//! ## Lifecycle
//!
//! A [`Workflow`] is created per submission from a [`WorkflowDefinition`], the
//! requester, and a seed context. [`Workflow::run`] walks the enabled steps in
//! declared order, stops at the first invalid step, and otherwise calls the
//! definition's finalize. Validation failures are reported inside
//! [`RunOutcome`](nimbus_types::RunOutcome); [`EngineError`] is reserved for
//! programming errors and unclassified collaborator failures.

pub mod action;
pub mod context;
pub mod error;
pub mod provider;
pub mod step;
pub mod templates;
pub mod workflow;

pub use action::{Action, ActionScope, ActionValidation, FieldCheck, ValidatedFields, validate_action};
pub use context::WorkflowContext;
pub use error::{ContributionViolation, DefinitionError, EngineError, FinalizeError};
pub use provider::{ChoiceCache, Collaborators, NullClient, ResourceClient};
pub use step::{Step, StepValidation, is_step_enabled, validate_step};
pub use templates::render_message;
pub use workflow::{
    ChoicePopulationEvent, FieldView, StepStatus, StepTelemetryEvent, StepView, TransitionEvent, Workflow, WorkflowDefinition,
    WorkflowState, WorkflowTelemetry, WorkflowView, check_definition,
};
