use nimbus_engine::{Action, ActionScope, Collaborators, Step, ValidatedFields};
use nimbus_types::{Choice, CollaboratorError, FieldSpec, FieldValue, Resource, ResourceKind, VOLUME_SERVICE_PERMISSION};

use super::{BootVolume, LaunchContext, LaunchKey, VolumeAttachment, VolumeSourceType};

const NO_VOLUME_LABEL: &str = "Don't boot from a volume.";
const DEFAULT_DEVICE_NAME: &str = "vda";
const AVAILABLE: &str = "available";

/// Optional boot volume of the instance.
pub struct VolumeOptions {
    fields: Vec<FieldSpec>,
    collaborators: Collaborators,
}

impl VolumeOptions {
    pub fn new(collaborators: Collaborators) -> Self {
        let volume_types = vec![
            Choice::placeholder(NO_VOLUME_LABEL),
            Choice::new(VolumeSourceType::Volume.field(), "Boot from volume."),
            Choice::new(
                VolumeSourceType::VolumeSnapshot.field(),
                "Boot from volume snapshot (creates a new volume).",
            ),
        ];
        let boot_fields = [VolumeSourceType::Volume.field(), VolumeSourceType::VolumeSnapshot.field()];

        Self {
            fields: vec![
                FieldSpec::choice("volume_type", "Volume Options").choices(volume_types),
                FieldSpec::choice("volume_id", "Volume")
                    .dynamic()
                    .applies_when("volume_type", [VolumeSourceType::Volume.field()]),
                FieldSpec::choice("volume_snapshot_id", "Volume Snapshot")
                    .dynamic()
                    .applies_when("volume_type", [VolumeSourceType::VolumeSnapshot.field()]),
                FieldSpec::text("device_name", "Device Name")
                    .initial(FieldValue::Text(DEFAULT_DEVICE_NAME.to_string()))
                    .applies_when("volume_type", boot_fields)
                    .help_text("Volume mount point (e.g. 'vda' mounts at '/dev/vda')."),
                FieldSpec::boolean("delete_on_terminate", "Delete on Terminate")
                    .initial(FieldValue::Boolean(false))
                    .help_text("Delete volume on instance terminate"),
            ],
            collaborators,
        }
    }

    fn volume_choices(
        &self,
        scope: ActionScope<'_, LaunchContext>,
        kind: ResourceKind,
        placeholder: &str,
    ) -> Result<Vec<Choice>, CollaboratorError> {
        let items = scope.cache.list(self.collaborators.block_storage.as_ref(), kind)?;
        let mut choices = vec![Choice::placeholder(placeholder)];
        choices.extend(
            items
                .iter()
                .filter(|item| item.attribute_str("status") == Some(AVAILABLE))
                .map(|item| volume_choice(item, kind)),
        );
        Ok(choices)
    }
}

/// `<id>:vol` / `<id>:snap` labelled "name - size GB (Volume)".
fn volume_choice(item: &Resource, kind: ResourceKind) -> Choice {
    let (suffix, label) = match kind {
        ResourceKind::VolumeSnapshot => ("snap", "Snapshot"),
        _ => ("vol", "Volume"),
    };
    let size = item
        .attribute_u64("size")
        .map(|size| size.to_string())
        .unwrap_or_else(|| "?".to_string());
    Choice::new(
        format!("{}:{}", item.id, suffix),
        format!("{} - {} GB ({})", item.display_name(), size, label),
    )
}

impl Action<LaunchContext> for VolumeOptions {
    fn name(&self) -> &str {
        "Volume Options"
    }

    fn fields(&self) -> &[FieldSpec] {
        &self.fields
    }

    fn populate_choices(&self, field: &FieldSpec, scope: ActionScope<'_, LaunchContext>) -> Result<Vec<Choice>, CollaboratorError> {
        match field.name.as_str() {
            "volume_id" => self.volume_choices(scope, ResourceKind::Volume, "Select Volume"),
            "volume_snapshot_id" => self.volume_choices(scope, ResourceKind::VolumeSnapshot, "Select Volume Snapshot"),
            _ => Ok(field.constraints.choices.clone()),
        }
    }

    fn choices_unavailable_message(&self, field: &FieldSpec) -> String {
        match field.name.as_str() {
            "volume_snapshot_id" => "Unable to retrieve list of volume snapshots.".to_string(),
            _ => "Unable to retrieve list of volumes.".to_string(),
        }
    }

    fn clean(&self, fields: &ValidatedFields, _scope: ActionScope<'_, LaunchContext>) -> Result<(), String> {
        if let Some(volume_type) = fields.values.text("volume_type")
            && fields.values.text(volume_type).is_none()
        {
            return Err(format!("Please choose a volume, or select {}", NO_VOLUME_LABEL));
        }
        Ok(())
    }
}

impl Step<LaunchContext> for VolumeOptions {
    fn slug(&self) -> &str {
        "volume_options"
    }

    fn name(&self) -> &str {
        "Volume Options"
    }

    fn action(&self) -> &dyn Action<LaunchContext> {
        self
    }

    fn depends_on(&self) -> &[LaunchKey] {
        &[LaunchKey::ProjectId, LaunchKey::UserId]
    }

    fn contributes(&self) -> &[LaunchKey] {
        &[LaunchKey::BootVolume]
    }

    fn permissions(&self) -> &[&str] {
        &[VOLUME_SERVICE_PERMISSION]
    }

    fn contribute(&self, fields: &ValidatedFields, _scope: ActionScope<'_, LaunchContext>) -> LaunchContext {
        let values = &fields.values;
        let boot_volume = values
            .text("volume_type")
            .and_then(VolumeSourceType::from_field)
            .and_then(|source| {
                let volume_id = values.text(source.field())?;
                Some(BootVolume::Attach(VolumeAttachment {
                    source,
                    volume_id: volume_id.to_string(),
                    device_name: values.text("device_name").unwrap_or(DEFAULT_DEVICE_NAME).to_string(),
                    delete_on_terminate: values.boolean("delete_on_terminate"),
                }))
            })
            .unwrap_or(BootVolume::None);

        LaunchContext {
            boot_volume: Some(boot_volume),
            ..LaunchContext::default()
        }
    }
}
