//! Instance launch wizard.
//!
//! Six steps in fixed order:
//! - `select_project_user`: project and user identity (always hidden; seeded)
//! - `set_instance_details`: source, zone, name, flavor, count
//! - `set_access_controls`: keypair, admin password, security groups
//! - `set_network`: networks (requires the network service)
//! - `volume_options`: boot volume (requires the block-storage service)
//! - `post_creation`: customization script
//!
//! Finalize issues one server-create request to the compute service.

mod access;
mod customize;
mod details;
mod network;
mod project_user;
mod volume;

use indexmap::IndexMap;
use nimbus_engine::{Collaborators, FinalizeError, Step, WorkflowDefinition};
use nimbus_types::{CollaboratorError, Requester, Resource, ResourceKind};
use serde::{Deserialize, Serialize};
use serde_json::{Map as JsonMap, Value};
use tracing::info;

use crate::settings::ConsoleSettings;

pub use access::SetAccessControls;
pub use customize::PostCreation;
pub use details::SetInstanceDetails;
pub use network::SetNetwork;
pub use project_user::SelectProjectUser;
pub use volume::VolumeOptions;

/// What the instance boots from when no boot volume is attached.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum SourceType {
    Image,
    InstanceSnapshot,
}

impl SourceType {
    /// Form field holding the selected source of this type.
    pub fn field(&self) -> &'static str {
        match self {
            SourceType::Image => "image_id",
            SourceType::InstanceSnapshot => "instance_snapshot_id",
        }
    }

    pub fn from_field(field: &str) -> Option<Self> {
        match field {
            "image_id" => Some(SourceType::Image),
            "instance_snapshot_id" => Some(SourceType::InstanceSnapshot),
            _ => None,
        }
    }
}

/// Canonical instance source; `source_id` is absent only when booting from a volume.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct InstanceSource {
    pub source_type: SourceType,
    pub source_id: Option<String>,
}

#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum AvailabilityZone {
    #[default]
    Any,
    Named(String),
}

impl AvailabilityZone {
    pub fn name(&self) -> Option<&str> {
        match self {
            AvailabilityZone::Any => None,
            AvailabilityZone::Named(name) => Some(name),
        }
    }
}

#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct AccessControls {
    pub keypair: Option<String>,
    pub security_groups: Vec<String>,
    pub admin_pass: Option<String>,
}

/// Which block-storage entity a boot volume is created from.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum VolumeSourceType {
    Volume,
    VolumeSnapshot,
}

impl VolumeSourceType {
    /// Form field holding the selection of this type.
    pub fn field(&self) -> &'static str {
        match self {
            VolumeSourceType::Volume => "volume_id",
            VolumeSourceType::VolumeSnapshot => "volume_snapshot_id",
        }
    }

    pub fn from_field(field: &str) -> Option<Self> {
        match field {
            "volume_id" => Some(VolumeSourceType::Volume),
            "volume_snapshot_id" => Some(VolumeSourceType::VolumeSnapshot),
            _ => None,
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct VolumeAttachment {
    pub source: VolumeSourceType,
    /// Selected choice value, `<id>:vol` or `<id>:snap`.
    pub volume_id: String,
    pub device_name: String,
    pub delete_on_terminate: bool,
}

impl VolumeAttachment {
    /// Legacy block-device mapping value: `<volume_id>::<0|1>`.
    pub fn mapping(&self) -> String {
        format!("{}::{}", self.volume_id, u8::from(self.delete_on_terminate))
    }
}

#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "boot", rename_all = "snake_case")]
pub enum BootVolume {
    #[default]
    None,
    Attach(VolumeAttachment),
}

nimbus_engine::workflow_context! {
    /// Context accumulated by the launch wizard.
    pub struct LaunchContext keyed by LaunchKey {
        project_id: String => ProjectId,
        user_id: String => UserId,
        source: InstanceSource => Source,
        availability_zone: AvailabilityZone => AvailabilityZone,
        name: String => Name,
        count: u32 => Count,
        flavor: String => Flavor,
        access: AccessControls => Access,
        network_ids: Vec<String> => NetworkIds,
        boot_volume: BootVolume => BootVolume,
        customization_script: String => CustomizationScript,
    }
}

impl LaunchContext {
    /// Seeds the project and user of the requester.
    pub fn seeded_from(requester: &Requester) -> Self {
        Self {
            project_id: Some(requester.project_id.clone()),
            user_id: Some(requester.user_id.clone()),
            ..Self::default()
        }
    }
}

/// One network interface of the server-create request.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct Nic {
    #[serde(rename = "net-id")]
    pub net_id: String,
    #[serde(rename = "v4-fixed-ip")]
    pub v4_fixed_ip: String,
}

/// Request sent to the compute service by the launch finalize.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct ServerCreateRequest {
    pub name: String,
    /// Image or instance snapshot; absent when booting from a volume.
    pub image_id: Option<String>,
    pub flavor_id: String,
    pub key_name: Option<String>,
    pub user_data: String,
    pub security_groups: Vec<String>,
    pub block_device_mapping: Option<IndexMap<String, String>>,
    pub nics: Option<Vec<Nic>>,
    pub availability_zone: Option<String>,
    pub instance_count: u32,
    pub admin_pass: Option<String>,
}

impl ServerCreateRequest {
    /// Builds the request from a completed context.
    ///
    /// Keys of steps that were disabled are read as "not requested": no boot
    /// volume, no explicit networks, an empty script.
    pub fn from_context(context: &LaunchContext) -> Result<Self, FinalizeError> {
        let name = context.name.clone().ok_or_else(|| FinalizeError::missing(LaunchKey::Name))?;
        let source = context.source.as_ref().ok_or_else(|| FinalizeError::missing(LaunchKey::Source))?;
        let flavor_id = context.flavor.clone().ok_or_else(|| FinalizeError::missing(LaunchKey::Flavor))?;
        let count = context.count.ok_or_else(|| FinalizeError::missing(LaunchKey::Count))?;
        let access = context.access.clone().unwrap_or_default();

        let block_device_mapping = match &context.boot_volume {
            Some(BootVolume::Attach(attachment)) => {
                let mut mapping = IndexMap::new();
                mapping.insert(attachment.device_name.clone(), attachment.mapping());
                Some(mapping)
            }
            Some(BootVolume::None) | None => None,
        };

        let nics = context
            .network_ids
            .as_ref()
            .filter(|network_ids| !network_ids.is_empty())
            .map(|network_ids| {
                network_ids
                    .iter()
                    .map(|net_id| Nic {
                        net_id: net_id.clone(),
                        v4_fixed_ip: String::new(),
                    })
                    .collect()
            });

        Ok(Self {
            name,
            image_id: source.source_id.clone(),
            flavor_id,
            key_name: access.keypair,
            user_data: normalize_newlines(context.customization_script.as_deref().unwrap_or_default()),
            security_groups: access.security_groups,
            block_device_mapping,
            nics,
            availability_zone: context
                .availability_zone
                .as_ref()
                .and_then(AvailabilityZone::name)
                .map(str::to_string),
            instance_count: count,
            admin_pass: access.admin_pass,
        })
    }

    pub fn to_attributes(&self) -> Result<JsonMap<String, Value>, serde_json::Error> {
        match serde_json::to_value(self)? {
            Value::Object(attributes) => Ok(attributes),
            _ => Ok(JsonMap::new()),
        }
    }
}

/// Converts `\r\n` and lone `\r` line endings to `\n`.
pub fn normalize_newlines(text: &str) -> String {
    text.replace("\r\n", "\n").replace('\r', "\n")
}

/// The launch-instance wizard.
pub struct LaunchInstance {
    collaborators: Collaborators,
    steps: Vec<Box<dyn Step<LaunchContext>>>,
}

impl LaunchInstance {
    pub fn new(collaborators: Collaborators, settings: &ConsoleSettings) -> Self {
        let steps: Vec<Box<dyn Step<LaunchContext>>> = vec![
            Box::new(SelectProjectUser::new()),
            Box::new(SetInstanceDetails::new(collaborators.clone(), settings.flavor_sort)),
            Box::new(SetAccessControls::new(collaborators.clone(), &settings.password)),
            Box::new(SetNetwork::new(collaborators.clone())),
            Box::new(VolumeOptions::new(collaborators.clone())),
            Box::new(PostCreation::new()),
        ];
        Self { collaborators, steps }
    }
}

impl WorkflowDefinition for LaunchInstance {
    type Context = LaunchContext;
    type Entity = Resource;

    fn slug(&self) -> &str {
        "launch_instance"
    }

    fn name(&self) -> &str {
        "Launch Instance"
    }

    fn steps(&self) -> &[Box<dyn Step<LaunchContext>>] {
        &self.steps
    }

    fn finalize(&self, context: &LaunchContext, _requester: &Requester) -> Result<Resource, FinalizeError> {
        let request = ServerCreateRequest::from_context(context)?;
        let attributes = request
            .to_attributes()
            .map_err(|error| FinalizeError::Failed(CollaboratorError::Unexpected(error.into())))?;

        info!(
            name = %request.name,
            flavor = %request.flavor_id,
            instance_count = request.instance_count,
            boot_from_volume = request.block_device_mapping.is_some(),
            "creating server"
        );
        Ok(self.collaborators.compute.create(ResourceKind::Server, &attributes)?)
    }

    fn success_message(&self) -> &str {
        "Launched ${{ count }} named \"${{ name }}\"."
    }

    fn failure_message(&self) -> &str {
        "Unable to launch ${{ count }} named \"${{ name }}\"."
    }

    fn message_values(&self, context: &LaunchContext) -> IndexMap<String, String> {
        let count = context.count.unwrap_or(1);
        let mut values = IndexMap::new();
        values.insert(
            "count".to_string(),
            if count > 1 { format!("{} instances", count) } else { "instance".to_string() },
        );
        values.insert(
            "name".to_string(),
            context.name.clone().unwrap_or_else(|| "unknown instance".to_string()),
        );
        values
    }
}
