//! Shared data model of the Nimbus console workflow engine.
//!
//! These types sit on the boundary between the engine, the concrete wizards,
//! and callers: submitted form data, field specifications, validation errors,
//! run outcomes, remote resources, and the identity of the requester.

pub mod field;
pub mod form;
pub mod outcome;
pub mod requester;
pub mod resource;
pub mod validation;

pub use field::{Choice, FieldApplicability, FieldConstraints, FieldSpec, ValueType};
pub use form::{CleanedData, FieldValue, FormData};
pub use outcome::{RunOutcome, Warning};
pub use requester::{NETWORK_SERVICE_PERMISSION, Project, Requester, VOLUME_SERVICE_PERMISSION};
pub use resource::{CollaboratorError, Resource, ResourceKind};
pub use validation::{FieldError, FieldErrorKind, REQUIRED_MESSAGE, StepErrors, check_constraints, coerce_raw_value};
