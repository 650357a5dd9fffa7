//! Remote entities and the errors collaborators report.

use std::fmt;

use serde::{Deserialize, Serialize};
use serde_json::{Map as JsonMap, Value};
use thiserror::Error;

/// Kinds of remote entities the console reads or writes.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ResourceKind {
    Flavor,
    Image,
    Volume,
    VolumeSnapshot,
    AvailabilityZone,
    Keypair,
    SecurityGroup,
    Network,
    Server,
}

impl ResourceKind {
    pub fn as_str(&self) -> &'static str {
        match self {
            ResourceKind::Flavor => "flavor",
            ResourceKind::Image => "image",
            ResourceKind::Volume => "volume",
            ResourceKind::VolumeSnapshot => "volume_snapshot",
            ResourceKind::AvailabilityZone => "availability_zone",
            ResourceKind::Keypair => "keypair",
            ResourceKind::SecurityGroup => "security_group",
            ResourceKind::Network => "network",
            ResourceKind::Server => "server",
        }
    }
}

impl fmt::Display for ResourceKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// One remote entity as returned by a collaborator.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Resource {
    pub id: String,
    #[serde(default)]
    pub name: String,
    /// Every other attribute the service returned.
    #[serde(default)]
    pub attributes: JsonMap<String, Value>,
}

impl Resource {
    pub fn new(id: impl Into<String>, name: impl Into<String>) -> Self {
        Self {
            id: id.into(),
            name: name.into(),
            attributes: JsonMap::new(),
        }
    }

    pub fn with_attribute(mut self, key: impl Into<String>, value: impl Into<Value>) -> Self {
        self.attributes.insert(key.into(), value.into());
        self
    }

    pub fn attribute(&self, key: &str) -> Option<&Value> {
        self.attributes.get(key)
    }

    pub fn attribute_str(&self, key: &str) -> Option<&str> {
        self.attributes.get(key).and_then(Value::as_str)
    }

    pub fn attribute_u64(&self, key: &str) -> Option<u64> {
        self.attributes.get(key).and_then(Value::as_u64)
    }

    pub fn attribute_bool(&self, key: &str) -> Option<bool> {
        self.attributes.get(key).and_then(Value::as_bool)
    }

    /// Name when present, otherwise the identifier.
    pub fn display_name(&self) -> &str {
        if self.name.is_empty() { &self.id } else { &self.name }
    }
}

/// Failure reported by a remote collaborator.
///
/// `Unavailable`, `Rejected` and `NotFound` are classified failures the
/// console knows how to present. `Unexpected` carries anything else and must be
/// propagated rather than interpreted.
#[derive(Debug, Error)]
pub enum CollaboratorError {
    /// The service could not be reached (connection refused, timeout).
    #[error("{service} service is unavailable: {reason}")]
    Unavailable { service: String, reason: String },
    /// The service refused the request.
    #[error("request rejected: {0}")]
    Rejected(String),
    #[error("{kind} '{id}' not found")]
    NotFound { kind: ResourceKind, id: String },
    #[error(transparent)]
    Unexpected(#[from] anyhow::Error),
}

impl CollaboratorError {
    pub fn unavailable(service: impl Into<String>, reason: impl Into<String>) -> Self {
        CollaboratorError::Unavailable {
            service: service.into(),
            reason: reason.into(),
        }
    }

    /// Whether the failure belongs to the known taxonomy.
    pub fn is_classified(&self) -> bool {
        !matches!(self, CollaboratorError::Unexpected(_))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn display_name_falls_back_to_identifier() {
        assert_eq!(Resource::new("net-1", "").display_name(), "net-1");
        assert_eq!(Resource::new("net-1", "private").display_name(), "private");
    }

    #[test]
    fn unexpected_errors_are_not_classified() {
        assert!(CollaboratorError::unavailable("compute", "connection refused").is_classified());
        assert!(CollaboratorError::Rejected("quota exceeded".into()).is_classified());
        assert!(!CollaboratorError::Unexpected(anyhow::anyhow!("boom")).is_classified());
    }

    #[test]
    fn resource_kind_serializes_as_snake_case() {
        let json = serde_json::to_string(&ResourceKind::VolumeSnapshot).expect("serialize kind");
        assert_eq!(json, "\"volume_snapshot\"");
        assert_eq!(ResourceKind::AvailabilityZone.to_string(), "availability_zone");
    }
}
