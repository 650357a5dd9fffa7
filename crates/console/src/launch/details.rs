use nimbus_engine::{Action, ActionScope, Collaborators, Step, ValidatedFields};
use nimbus_types::{Choice, CollaboratorError, FieldSpec, FieldValue, Resource, ResourceKind, VOLUME_SERVICE_PERMISSION};

use super::{AvailabilityZone, InstanceSource, LaunchContext, LaunchKey, SourceType};
use crate::{
    images::{available_images, is_instance_snapshot},
    settings::FlavorSort,
};

const VOLUME_SOURCE_CONFLICT: &str = "You can't select an instance source when booting from a Volume. The Volume is your source and \
                                      should contain the operating system.";
const NO_IMAGE_SOURCES: &str =
    "There are no image sources available; you must first create an image before attempting to launch an instance.";
const SOURCE_REQUIRED: &str = "Please select an option for the instance source.";
const MULTIPLE_FROM_VOLUME: &str = "Launching multiple instances is only supported for images and instance snapshots.";

/// Source, placement, size and count of the instance.
pub struct SetInstanceDetails {
    fields: Vec<FieldSpec>,
    collaborators: Collaborators,
    flavor_sort: FlavorSort,
}

impl SetInstanceDetails {
    pub fn new(collaborators: Collaborators, flavor_sort: FlavorSort) -> Self {
        let source_types = vec![
            Choice::new(SourceType::Image.field(), "Image"),
            Choice::new(SourceType::InstanceSnapshot.field(), "Snapshot"),
        ];
        Self {
            fields: vec![
                FieldSpec::choice("source_type", "Instance Source").required().choices(source_types),
                FieldSpec::choice("image_id", "Image").dynamic(),
                FieldSpec::choice("instance_snapshot_id", "Instance Snapshot").dynamic(),
                FieldSpec::choice("availability_zone", "Availability Zone").dynamic(),
                FieldSpec::text("name", "Instance Name").required().max_length(80),
                FieldSpec::choice("flavor", "Flavor")
                    .required()
                    .dynamic()
                    .help_text("Size of image to launch."),
                FieldSpec::integer("count", "Instance Count")
                    .required()
                    .min_value(1)
                    .max_value(i64::from(u32::MAX))
                    .initial(FieldValue::Integer(1))
                    .help_text("Number of instances to launch."),
            ],
            collaborators,
            flavor_sort,
        }
    }

    fn image_choices(
        &self,
        scope: ActionScope<'_, LaunchContext>,
        snapshots: bool,
    ) -> Result<Vec<Choice>, CollaboratorError> {
        let images = scope.cache.list(self.collaborators.image.as_ref(), ResourceKind::Image)?;
        let project_id = scope.context.project_id.as_deref();

        let mut choices: Vec<Choice> = available_images(&images, project_id)
            .into_iter()
            .filter(|image| is_instance_snapshot(image) == snapshots)
            .map(|image| Choice::new(&image.id, image.display_name()))
            .collect();

        let placeholder = match (snapshots, choices.is_empty()) {
            (false, false) => "Select Image",
            (false, true) => "No images available.",
            (true, false) => "Select Instance Snapshot",
            (true, true) => "No snapshots available.",
        };
        choices.insert(0, Choice::placeholder(placeholder));
        Ok(choices)
    }

    fn zone_choices(&self, scope: ActionScope<'_, LaunchContext>) -> Result<Vec<Choice>, CollaboratorError> {
        let zones = scope
            .cache
            .list(self.collaborators.compute.as_ref(), ResourceKind::AvailabilityZone)?;

        let mut names: Vec<&str> = zones
            .iter()
            .filter(|zone| zone.attribute_bool("available").unwrap_or(false))
            .map(Resource::display_name)
            .collect();
        names.sort_unstable();

        let mut choices: Vec<Choice> = names.into_iter().map(|name| Choice::new(name, name)).collect();
        let placeholder = if choices.is_empty() { "No availability zones found." } else { "Any Availability Zone" };
        choices.insert(0, Choice::placeholder(placeholder));
        Ok(choices)
    }

    fn flavor_choices(&self, scope: ActionScope<'_, LaunchContext>) -> Result<Vec<Choice>, CollaboratorError> {
        let mut flavors = scope.cache.list(self.collaborators.compute.as_ref(), ResourceKind::Flavor)?;
        self.flavor_sort.sort(&mut flavors);
        Ok(flavors.iter().map(|flavor| Choice::new(&flavor.id, &flavor.name)).collect())
    }
}

impl Action<LaunchContext> for SetInstanceDetails {
    fn name(&self) -> &str {
        "Details"
    }

    fn fields(&self) -> &[FieldSpec] {
        &self.fields
    }

    fn populate_choices(&self, field: &FieldSpec, scope: ActionScope<'_, LaunchContext>) -> Result<Vec<Choice>, CollaboratorError> {
        match field.name.as_str() {
            "image_id" => self.image_choices(scope, false),
            "instance_snapshot_id" => self.image_choices(scope, true),
            "availability_zone" => self.zone_choices(scope),
            "flavor" => self.flavor_choices(scope),
            _ => Ok(field.constraints.choices.clone()),
        }
    }

    fn choices_unavailable_message(&self, field: &FieldSpec) -> String {
        match field.name.as_str() {
            "image_id" => "Unable to retrieve images.",
            "instance_snapshot_id" => "Unable to retrieve instance snapshots.",
            "availability_zone" => "Unable to retrieve availability zones.",
            "flavor" => "Unable to retrieve instance flavors.",
            _ => "Unable to retrieve choices.",
        }
        .to_string()
    }

    fn clean(&self, fields: &ValidatedFields, scope: ActionScope<'_, LaunchContext>) -> Result<(), String> {
        let source_field = fields.values.text("source_type").unwrap_or(SourceType::Image.field());
        let source_selected = fields.values.text(source_field).is_some();

        // The boot volume belongs to a later step; only consult it when that step can run.
        let boot_from_volume = scope.requester.has_permission(VOLUME_SERVICE_PERMISSION)
            && scope.form.get("volume_type").is_some_and(|volume_type| !volume_type.is_empty());

        if boot_from_volume {
            if source_selected {
                return Err(VOLUME_SOURCE_CONFLICT.to_string());
            }
        } else if source_field == SourceType::Image.field() && !has_real_choice(fields, "image_id") {
            return Err(NO_IMAGE_SOURCES.to_string());
        } else if !source_selected {
            return Err(SOURCE_REQUIRED.to_string());
        }

        if boot_from_volume && fields.values.integer("count").unwrap_or(1) > 1 {
            return Err(MULTIPLE_FROM_VOLUME.to_string());
        }
        Ok(())
    }
}

fn has_real_choice(fields: &ValidatedFields, field: &str) -> bool {
    fields
        .choices
        .get(field)
        .is_some_and(|choices| choices.iter().any(|choice| !choice.is_placeholder()))
}

impl Step<LaunchContext> for SetInstanceDetails {
    fn slug(&self) -> &str {
        "set_instance_details"
    }

    fn name(&self) -> &str {
        "Details"
    }

    fn action(&self) -> &dyn Action<LaunchContext> {
        self
    }

    fn depends_on(&self) -> &[LaunchKey] {
        &[LaunchKey::ProjectId]
    }

    fn contributes(&self) -> &[LaunchKey] {
        &[
            LaunchKey::Source,
            LaunchKey::AvailabilityZone,
            LaunchKey::Name,
            LaunchKey::Count,
            LaunchKey::Flavor,
        ]
    }

    fn contribute(&self, fields: &ValidatedFields, _scope: ActionScope<'_, LaunchContext>) -> LaunchContext {
        let values = &fields.values;
        let source_type = values
            .text("source_type")
            .and_then(SourceType::from_field)
            .unwrap_or(SourceType::Image);
        let availability_zone = values
            .text("availability_zone")
            .map_or(AvailabilityZone::Any, |zone| AvailabilityZone::Named(zone.to_string()));
        let count = values.integer("count").and_then(|count| u32::try_from(count).ok()).unwrap_or(1);

        LaunchContext {
            source: Some(InstanceSource {
                source_type,
                source_id: values.text(source_type.field()).map(str::to_string),
            }),
            availability_zone: Some(availability_zone),
            name: values.text("name").map(str::to_string),
            count: Some(count),
            flavor: values.text("flavor").map(str::to_string),
            ..LaunchContext::default()
        }
    }
}
