//! Wizards of the Nimbus cloud administration console.
//!
//! - [`launch`]: the six-step launch-instance wizard
//! - [`flavors`]: create and edit flavor wizards
//! - [`images`]: image visibility rules shared by the launch choices
//! - [`settings`]: console settings loaded from YAML or JSON
//! - [`memory`]: an in-memory cloud implementing every collaborator role

pub mod flavors;
pub mod images;
pub mod launch;
pub mod memory;
pub mod settings;

pub use flavors::{AUTO_FLAVOR_ID, CreateFlavor, EditFlavor, FlavorContext, FlavorCreateRequest, FlavorInfo, FlavorKey};
pub use images::{available_images, is_instance_snapshot};
pub use launch::{LaunchContext, LaunchInstance, LaunchKey, ServerCreateRequest};
pub use memory::{CallRecord, CloudFixture, FailureMode, InMemoryCloud, InjectedFailure, Operation};
pub use settings::{ConsoleSettings, FlavorSort, FlavorSortKey, PasswordPolicy, SettingsError};
