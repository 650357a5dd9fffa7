use nimbus_types::{CollaboratorError, Resource, ResourceKind};
use serde_json::{Map as JsonMap, Value};

use super::ResourceClient;

/// Stands in for a service that is not configured: listings are empty and
/// every write is rejected.
#[derive(Debug, Clone, Copy, Default)]
pub struct NullClient;

impl ResourceClient for NullClient {
    fn list(&self, _kind: ResourceKind) -> Result<Vec<Resource>, CollaboratorError> {
        Ok(Vec::new())
    }

    fn get(&self, kind: ResourceKind, id: &str) -> Result<Resource, CollaboratorError> {
        Err(CollaboratorError::NotFound { kind, id: id.to_string() })
    }

    fn create(&self, kind: ResourceKind, _attributes: &JsonMap<String, Value>) -> Result<Resource, CollaboratorError> {
        Err(CollaboratorError::Rejected(format!("no service configured for {}", kind)))
    }

    fn delete(&self, kind: ResourceKind, id: &str) -> Result<(), CollaboratorError> {
        Err(CollaboratorError::NotFound { kind, id: id.to_string() })
    }

    fn get_auxiliary(&self, _kind: ResourceKind, _id: &str) -> Result<JsonMap<String, Value>, CollaboratorError> {
        Ok(JsonMap::new())
    }

    fn set_auxiliary(&self, kind: ResourceKind, _id: &str, _data: &JsonMap<String, Value>) -> Result<(), CollaboratorError> {
        Err(CollaboratorError::Rejected(format!("no service configured for {}", kind)))
    }
}
