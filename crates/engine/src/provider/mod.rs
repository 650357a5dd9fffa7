//! Remote collaborators and per-run choice caching.
//!
//! Modules:
//! - `cache`: per-run memo of collaborator listings shared by the fields of one run
//! - `null`: collaborator for services that are not configured
//!
//! The engine never talks to a wire protocol. Each remote service is an opaque
//! [`ResourceClient`]; the wizards reach them through [`Collaborators`].

mod cache;
mod null;

use std::{fmt, sync::Arc};

use nimbus_types::{CollaboratorError, Resource, ResourceKind};
use serde_json::{Map as JsonMap, Value};

pub use cache::ChoiceCache;
pub use null::NullClient;

/// Narrow read/write contract of one remote management service.
///
/// Implementations own their transport, retries and timeouts. A timeout is
/// reported as [`CollaboratorError::Unavailable`], like any other unreachable service.
pub trait ResourceClient: Send + Sync {
    /// Lists every entity of `kind` visible to the caller.
    fn list(&self, kind: ResourceKind) -> Result<Vec<Resource>, CollaboratorError>;

    fn get(&self, kind: ResourceKind, id: &str) -> Result<Resource, CollaboratorError>;

    fn create(&self, kind: ResourceKind, attributes: &JsonMap<String, Value>) -> Result<Resource, CollaboratorError>;

    fn delete(&self, kind: ResourceKind, id: &str) -> Result<(), CollaboratorError>;

    /// Reads auxiliary data attached to an entity (for example flavor extra specs).
    fn get_auxiliary(&self, kind: ResourceKind, id: &str) -> Result<JsonMap<String, Value>, CollaboratorError>;

    fn set_auxiliary(&self, kind: ResourceKind, id: &str, data: &JsonMap<String, Value>) -> Result<(), CollaboratorError>;
}

/// Named remote services available to the console.
#[derive(Clone)]
pub struct Collaborators {
    pub compute: Arc<dyn ResourceClient>,
    pub block_storage: Arc<dyn ResourceClient>,
    pub image: Arc<dyn ResourceClient>,
    pub network: Arc<dyn ResourceClient>,
}

impl Collaborators {
    /// Routes every service to the same client.
    pub fn uniform(client: Arc<dyn ResourceClient>) -> Self {
        Self {
            compute: Arc::clone(&client),
            block_storage: Arc::clone(&client),
            image: Arc::clone(&client),
            network: client,
        }
    }

    pub fn with_compute(mut self, client: Arc<dyn ResourceClient>) -> Self {
        self.compute = client;
        self
    }

    pub fn with_block_storage(mut self, client: Arc<dyn ResourceClient>) -> Self {
        self.block_storage = client;
        self
    }

    pub fn with_image(mut self, client: Arc<dyn ResourceClient>) -> Self {
        self.image = client;
        self
    }

    pub fn with_network(mut self, client: Arc<dyn ResourceClient>) -> Self {
        self.network = client;
        self
    }
}

impl Default for Collaborators {
    fn default() -> Self {
        Self::uniform(Arc::new(NullClient))
    }
}

impl fmt::Debug for Collaborators {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Collaborators").finish_non_exhaustive()
    }
}
