use nimbus_engine::{Action, ActionScope, Collaborators, FieldCheck, Step, ValidatedFields};
use nimbus_types::{FieldSpec, FieldValue, Resource, ResourceKind};

use super::{AUTO_FLAVOR_ID, FlavorContext, FlavorKey};

const NAME_PATTERN: &str = r"^[\w.\- ]+$";
const FLAVOR_ID_PATTERN: &str =
    r"^([0-9a-fA-F]{8}-[0-9a-fA-F]{4}-[0-9a-fA-F]{4}-[0-9a-fA-F]{4}-[0-9a-fA-F]{12}|[0-9]+|auto)$";
const FLAVOR_LIST_UNAVAILABLE: &str = "Unable to get flavor list.";

const CREATE_CONTRIBUTES: &[FlavorKey] = &[
    FlavorKey::FlavorId,
    FlavorKey::Name,
    FlavorKey::Vcpus,
    FlavorKey::MemoryMb,
    FlavorKey::DiskGb,
    FlavorKey::EphGb,
    FlavorKey::SwapMb,
];
const EDIT_CONTRIBUTES: &[FlavorKey] = &[
    FlavorKey::Name,
    FlavorKey::Vcpus,
    FlavorKey::MemoryMb,
    FlavorKey::DiskGb,
    FlavorKey::EphGb,
    FlavorKey::SwapMb,
];

/// Name, identifier and sizes of a flavor.
///
/// When editing, the identifier is fixed by the seed context and the name may
/// keep its current value.
pub struct FlavorInfo {
    fields: Vec<FieldSpec>,
    collaborators: Collaborators,
    /// Identifier of the flavor being edited.
    editing: Option<String>,
}

impl FlavorInfo {
    pub fn for_create(collaborators: Collaborators) -> Self {
        let mut fields = vec![
            FieldSpec::text("name", "Name")
                .required()
                .max_length(25)
                .pattern(NAME_PATTERN, "Name may only contain letters, numbers, underscores, periods and hyphens."),
            FieldSpec::text("flavor_id", "ID")
                .pattern(FLAVOR_ID_PATTERN, "Enter a valid value.")
                .initial(FieldValue::Text(AUTO_FLAVOR_ID.to_string()))
                .help_text("Flavor ID should be UUID4 or integer. Leave this field blank or use 'auto' to set a random UUID4."),
        ];
        fields.extend(size_fields(None));
        Self {
            fields,
            collaborators,
            editing: None,
        }
    }

    /// Fields start from the current values of `existing`.
    pub fn for_edit(collaborators: Collaborators, existing: &Resource) -> Self {
        let mut fields = vec![
            FieldSpec::text("name", "Name")
                .required()
                .max_length(25)
                .pattern(NAME_PATTERN, "Name may only contain letters, numbers, underscores, periods and hyphens.")
                .initial(FieldValue::Text(existing.name.clone())),
        ];
        fields.extend(size_fields(Some(existing)));
        Self {
            fields,
            collaborators,
            editing: Some(existing.id.clone()),
        }
    }

    fn flavors(&self, scope: ActionScope<'_, FlavorContext>) -> Result<Vec<Resource>, FieldCheck> {
        scope
            .cache
            .list(self.collaborators.compute.as_ref(), ResourceKind::Flavor)
            .map_err(|error| FieldCheck::from_fetch_error(error, FLAVOR_LIST_UNAVAILABLE))
    }
}

fn size_fields(existing: Option<&Resource>) -> Vec<FieldSpec> {
    let sizes = [
        ("vcpus", "VCPUs", "vcpus", 1, Some(i64::from(u32::MAX))),
        ("memory_mb", "RAM MB", "ram", 1, None),
        ("disk_gb", "Root Disk GB", "disk", 0, None),
        ("eph_gb", "Ephemeral Disk GB", "ephemeral", 0, None),
        ("swap_mb", "Swap Disk MB", "swap", 0, None),
    ];

    sizes
        .into_iter()
        .map(|(name, label, attribute, minimum, maximum)| {
            let field = FieldSpec::integer(name, label).required().min_value(minimum);
            let field = match maximum {
                Some(maximum) => field.max_value(maximum),
                None => field,
            };
            match existing.and_then(|flavor| flavor.attribute_u64(attribute)) {
                Some(current) => field.initial(FieldValue::Integer(i64::try_from(current).unwrap_or(i64::MAX))),
                None => field,
            }
        })
        .collect()
}

impl Action<FlavorContext> for FlavorInfo {
    fn name(&self) -> &str {
        "Flavor Information"
    }

    fn fields(&self) -> &[FieldSpec] {
        &self.fields
    }

    /// Names and explicit identifiers must not be used by another flavor.
    fn clean_field(&self, field: &FieldSpec, value: &FieldValue, scope: ActionScope<'_, FlavorContext>) -> Result<(), FieldCheck> {
        let Some(candidate) = value.as_text() else {
            return Ok(());
        };

        match field.name.as_str() {
            "name" => {
                let taken = self.flavors(scope)?.iter().any(|flavor| {
                    flavor.name == candidate && self.editing.as_deref() != Some(flavor.id.as_str())
                });
                if taken {
                    return Err(FieldCheck::Invalid(format!(
                        "The name \"{}\" is already used by another flavor.",
                        candidate
                    )));
                }
            }
            "flavor_id" if candidate != AUTO_FLAVOR_ID => {
                if self.flavors(scope)?.iter().any(|flavor| flavor.id == candidate) {
                    return Err(FieldCheck::Invalid(format!(
                        "The ID \"{}\" is already used by another flavor.",
                        candidate
                    )));
                }
            }
            _ => {}
        }
        Ok(())
    }
}

impl Step<FlavorContext> for FlavorInfo {
    fn slug(&self) -> &str {
        "flavor_info"
    }

    fn name(&self) -> &str {
        "Flavor Information"
    }

    fn action(&self) -> &dyn Action<FlavorContext> {
        self
    }

    fn depends_on(&self) -> &[FlavorKey] {
        if self.editing.is_some() { &[FlavorKey::FlavorId] } else { &[] }
    }

    fn contributes(&self) -> &[FlavorKey] {
        if self.editing.is_some() { EDIT_CONTRIBUTES } else { CREATE_CONTRIBUTES }
    }

    fn contribute(&self, fields: &ValidatedFields, _scope: ActionScope<'_, FlavorContext>) -> FlavorContext {
        let values = &fields.values;
        let size = |name: &str| values.integer(name).and_then(|value| u64::try_from(value).ok());

        FlavorContext {
            flavor_id: match self.editing {
                Some(_) => None,
                None => Some(values.text("flavor_id").unwrap_or(AUTO_FLAVOR_ID).to_string()),
            },
            name: values.text("name").map(str::to_string),
            vcpus: values.integer("vcpus").and_then(|value| u32::try_from(value).ok()),
            memory_mb: size("memory_mb"),
            disk_gb: size("disk_gb"),
            eph_gb: size("eph_gb"),
            swap_mb: size("swap_mb"),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn flavor_id_pattern_accepts_uuid_integer_and_auto() {
        let regex = regex::Regex::new(FLAVOR_ID_PATTERN).expect("pattern");

        assert!(regex.is_match("auto"));
        assert!(regex.is_match("42"));
        assert!(regex.is_match("0f6c2a8e-3b1d-4c5e-9a7b-1234567890ab"));
        assert!(!regex.is_match("auto-42"));
        assert!(!regex.is_match("m1.tiny"));
    }

    #[test]
    fn edit_fields_start_from_existing_flavor() {
        let existing = Resource::new("7", "m1.small")
            .with_attribute("vcpus", 1)
            .with_attribute("ram", 2048)
            .with_attribute("disk", 20);
        let info = FlavorInfo::for_edit(Collaborators::default(), &existing);

        let names: Vec<&str> = info.fields.iter().map(|field| field.name.as_str()).collect();
        assert_eq!(names, ["name", "vcpus", "memory_mb", "disk_gb", "eph_gb", "swap_mb"]);
        assert_eq!(info.fields[0].initial, Some(FieldValue::Text("m1.small".into())));
        assert_eq!(info.fields[2].initial, Some(FieldValue::Integer(2048)));
        assert_eq!(info.fields[4].initial, None);
        assert_eq!(info.depends_on(), &[FlavorKey::FlavorId]);
    }
}
