//! Identity of the operator or tenant submitting a workflow.

use std::collections::BTreeSet;

use serde::{Deserialize, Serialize};

/// Permission that marks the block-storage service as enabled.
pub const VOLUME_SERVICE_PERMISSION: &str = "openstack.services.volume";
/// Permission that marks the network service as enabled.
pub const NETWORK_SERVICE_PERMISSION: &str = "openstack.services.network";

/// Project the requester may act in.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Project {
    pub id: String,
    pub name: String,
}

/// Resolved identity of the caller, supplied when a workflow is created.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct Requester {
    pub user_id: String,
    #[serde(default)]
    pub username: String,
    /// Project the request is scoped to.
    pub project_id: String,
    #[serde(default)]
    pub authorized_projects: Vec<Project>,
    /// Role and service-availability permissions.
    #[serde(default)]
    pub permissions: BTreeSet<String>,
}

impl Requester {
    pub fn new(user_id: impl Into<String>, project_id: impl Into<String>) -> Self {
        Self {
            user_id: user_id.into(),
            project_id: project_id.into(),
            ..Self::default()
        }
    }

    pub fn with_permission(mut self, permission: impl Into<String>) -> Self {
        self.permissions.insert(permission.into());
        self
    }

    pub fn has_permission(&self, permission: &str) -> bool {
        self.permissions.contains(permission)
    }

    /// Whether every listed permission is held.
    pub fn has_permissions(&self, permissions: &[&str]) -> bool {
        permissions.iter().all(|permission| self.has_permission(permission))
    }
}
