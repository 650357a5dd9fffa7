//! Flavor administration wizards.
//!
//! Both wizards are a single `flavor_info` step. Creating issues one
//! flavor-create call. The compute service has no flavor update, so editing
//! replaces the flavor: its extra specs are read, the old flavor is deleted, a
//! new one is created under the submitted name, and the extra specs are
//! reapplied to it.

mod info;

use indexmap::IndexMap;
use nimbus_engine::{Collaborators, FinalizeError, Step, WorkflowDefinition};
use nimbus_types::{CollaboratorError, Requester, Resource, ResourceKind};
use serde::Serialize;
use serde_json::{Map as JsonMap, Value};
use tracing::{info, warn};

pub use info::FlavorInfo;

/// Flavor identifier asking the compute service to generate one.
pub const AUTO_FLAVOR_ID: &str = "auto";

nimbus_engine::workflow_context! {
    /// Context accumulated by the flavor wizards.
    pub struct FlavorContext keyed by FlavorKey {
        /// Requested identifier on create (`auto` for a generated one); the
        /// flavor being replaced on edit.
        flavor_id: String => FlavorId,
        name: String => Name,
        vcpus: u32 => Vcpus,
        memory_mb: u64 => MemoryMb,
        disk_gb: u64 => DiskGb,
        eph_gb: u64 => EphGb,
        swap_mb: u64 => SwapMb,
    }
}

impl FlavorContext {
    /// Seed of the edit wizard.
    pub fn editing(flavor_id: impl Into<String>) -> Self {
        Self {
            flavor_id: Some(flavor_id.into()),
            ..Self::default()
        }
    }
}

/// Request sent to the compute service to create a flavor.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct FlavorCreateRequest {
    #[serde(skip_serializing_if = "Option::is_none")]
    pub id: Option<String>,
    pub name: String,
    pub ram: u64,
    pub vcpus: u32,
    pub disk: u64,
    pub ephemeral: u64,
    pub swap: u64,
}

impl FlavorCreateRequest {
    /// Builds the request; `id` is only sent when it is explicit.
    pub fn from_context(context: &FlavorContext, id: Option<&str>) -> Result<Self, FinalizeError> {
        Ok(Self {
            id: id.filter(|id| !id.is_empty() && *id != AUTO_FLAVOR_ID).map(str::to_string),
            name: context.name.clone().ok_or_else(|| FinalizeError::missing(FlavorKey::Name))?,
            ram: context.memory_mb.ok_or_else(|| FinalizeError::missing(FlavorKey::MemoryMb))?,
            vcpus: context.vcpus.ok_or_else(|| FinalizeError::missing(FlavorKey::Vcpus))?,
            disk: context.disk_gb.ok_or_else(|| FinalizeError::missing(FlavorKey::DiskGb))?,
            ephemeral: context.eph_gb.ok_or_else(|| FinalizeError::missing(FlavorKey::EphGb))?,
            swap: context.swap_mb.ok_or_else(|| FinalizeError::missing(FlavorKey::SwapMb))?,
        })
    }

    pub fn to_attributes(&self) -> Result<JsonMap<String, Value>, FinalizeError> {
        match serde_json::to_value(self) {
            Ok(Value::Object(attributes)) => Ok(attributes),
            Ok(_) => Ok(JsonMap::new()),
            Err(error) => Err(FinalizeError::Failed(CollaboratorError::Unexpected(error.into()))),
        }
    }
}

fn flavor_message_values(context: &FlavorContext) -> IndexMap<String, String> {
    let mut values = IndexMap::new();
    values.insert("name".to_string(), context.name.clone().unwrap_or_default());
    values
}

/// The create-flavor wizard.
pub struct CreateFlavor {
    collaborators: Collaborators,
    steps: Vec<Box<dyn Step<FlavorContext>>>,
}

impl CreateFlavor {
    pub fn new(collaborators: Collaborators) -> Self {
        let steps: Vec<Box<dyn Step<FlavorContext>>> = vec![Box::new(FlavorInfo::for_create(collaborators.clone()))];
        Self { collaborators, steps }
    }
}

impl WorkflowDefinition for CreateFlavor {
    type Context = FlavorContext;
    type Entity = Resource;

    fn slug(&self) -> &str {
        "create_flavor"
    }

    fn name(&self) -> &str {
        "Create Flavor"
    }

    fn steps(&self) -> &[Box<dyn Step<FlavorContext>>] {
        &self.steps
    }

    fn finalize(&self, context: &FlavorContext, _requester: &Requester) -> Result<Resource, FinalizeError> {
        let request = FlavorCreateRequest::from_context(context, context.flavor_id.as_deref())?;
        let attributes = request.to_attributes()?;

        info!(name = %request.name, explicit_id = request.id.is_some(), "creating flavor");
        Ok(self.collaborators.compute.create(ResourceKind::Flavor, &attributes)?)
    }

    fn success_message(&self) -> &str {
        "Created flavor \"${{ name }}\"."
    }

    fn failure_message(&self) -> &str {
        "Unable to create flavor."
    }

    fn message_values(&self, context: &FlavorContext) -> IndexMap<String, String> {
        flavor_message_values(context)
    }
}

/// The edit-flavor wizard, run against one existing flavor.
pub struct EditFlavor {
    collaborators: Collaborators,
    steps: Vec<Box<dyn Step<FlavorContext>>>,
}

impl EditFlavor {
    /// `existing` provides the initial field values; seed the run with
    /// [`FlavorContext::editing`] for the same identifier.
    pub fn new(collaborators: Collaborators, existing: &Resource) -> Self {
        let steps: Vec<Box<dyn Step<FlavorContext>>> = vec![Box::new(FlavorInfo::for_edit(collaborators.clone(), existing))];
        Self { collaborators, steps }
    }
}

impl WorkflowDefinition for EditFlavor {
    type Context = FlavorContext;
    type Entity = Resource;

    fn slug(&self) -> &str {
        "edit_flavor"
    }

    fn name(&self) -> &str {
        "Edit Flavor"
    }

    fn steps(&self) -> &[Box<dyn Step<FlavorContext>>] {
        &self.steps
    }

    /// Replaces the flavor in four calls. Nothing has changed until the delete
    /// succeeds; any failure after it is partial.
    fn finalize(&self, context: &FlavorContext, _requester: &Requester) -> Result<Resource, FinalizeError> {
        let compute = &self.collaborators.compute;
        let flavor_id = context
            .flavor_id
            .as_deref()
            .ok_or_else(|| FinalizeError::missing(FlavorKey::FlavorId))?;
        let request = FlavorCreateRequest::from_context(context, None)?;
        let attributes = request.to_attributes()?;

        let extra_specs = compute.get_auxiliary(ResourceKind::Flavor, flavor_id)?;
        compute.delete(ResourceKind::Flavor, flavor_id)?;
        info!(flavor_id = %flavor_id, extra_spec_count = extra_specs.len(), "deleted flavor; creating replacement");

        let replacement = compute
            .create(ResourceKind::Flavor, &attributes)
            .map_err(|source| FinalizeError::Partial {
                removed: flavor_id.to_string(),
                replacement: None,
                source,
            })?;

        if !extra_specs.is_empty()
            && let Err(source) = compute.set_auxiliary(ResourceKind::Flavor, &replacement.id, &extra_specs)
        {
            warn!(flavor_id = %replacement.id, error = %source, "extra specs were not reapplied");
            return Err(FinalizeError::Partial {
                removed: flavor_id.to_string(),
                replacement: Some(replacement.id),
                source,
            });
        }
        Ok(replacement)
    }

    fn success_message(&self) -> &str {
        "Updated flavor \"${{ name }}\"."
    }

    fn failure_message(&self) -> &str {
        "Unable to update flavor."
    }

    fn message_values(&self, context: &FlavorContext) -> IndexMap<String, String> {
        flavor_message_values(context)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn context(flavor_id: &str) -> FlavorContext {
        FlavorContext {
            flavor_id: Some(flavor_id.into()),
            name: Some("m1.large".into()),
            vcpus: Some(4),
            memory_mb: Some(8192),
            disk_gb: Some(80),
            eph_gb: Some(0),
            swap_mb: Some(0),
        }
    }

    #[test]
    fn auto_identifier_is_not_sent() {
        let request = FlavorCreateRequest::from_context(&context("auto"), Some("auto")).expect("request");
        let attributes = request.to_attributes().expect("attributes");

        assert!(!attributes.contains_key("id"));
        assert_eq!(attributes["ram"], 8192);
    }

    #[test]
    fn explicit_identifier_is_sent() {
        let request = FlavorCreateRequest::from_context(&context("42"), Some("42")).expect("request");
        assert_eq!(request.id.as_deref(), Some("42"));
    }

    #[test]
    fn missing_size_is_reported() {
        let mut context = context("auto");
        context.swap_mb = None;

        let error = FlavorCreateRequest::from_context(&context, None).expect_err("missing swap");
        assert!(matches!(error, FinalizeError::MissingContext(ref key) if key == "swap_mb"));
    }
}
