use nimbus_engine::{Action, ActionScope, Collaborators, Step, ValidatedFields};
use nimbus_types::{Choice, CollaboratorError, FieldSpec, FieldValue, ResourceKind};

use super::{AccessControls, LaunchContext, LaunchKey};
use crate::settings::PasswordPolicy;

/// Keypair, admin password and security groups of the instance.
pub struct SetAccessControls {
    fields: Vec<FieldSpec>,
    collaborators: Collaborators,
}

impl SetAccessControls {
    pub fn new(collaborators: Collaborators, password: &PasswordPolicy) -> Self {
        Self {
            fields: vec![
                FieldSpec::choice("keypair", "Keypair")
                    .dynamic()
                    .help_text("Which keypair to use for authentication."),
                FieldSpec::text("admin_pass", "Admin Pass").pattern(&password.pattern, &password.message),
                FieldSpec::text("confirm_admin_pass", "Confirm Admin Pass"),
                FieldSpec::multiple_choice("groups", "Security Groups")
                    .required()
                    .dynamic()
                    .initial(FieldValue::Choices(vec!["default".to_string()]))
                    .help_text("Launch instance in these security groups."),
            ],
            collaborators,
        }
    }
}

impl Action<LaunchContext> for SetAccessControls {
    fn name(&self) -> &str {
        "Access & Security"
    }

    fn fields(&self) -> &[FieldSpec] {
        &self.fields
    }

    fn populate_choices(&self, field: &FieldSpec, scope: ActionScope<'_, LaunchContext>) -> Result<Vec<Choice>, CollaboratorError> {
        match field.name.as_str() {
            "keypair" => {
                let keypairs = scope.cache.list(self.collaborators.compute.as_ref(), ResourceKind::Keypair)?;
                let mut choices: Vec<Choice> = keypairs
                    .iter()
                    .map(|keypair| Choice::new(keypair.display_name(), keypair.display_name()))
                    .collect();
                let placeholder = if choices.is_empty() { "No keypairs available." } else { "Select a keypair" };
                choices.insert(0, Choice::placeholder(placeholder));
                Ok(choices)
            }
            "groups" => {
                let groups = scope
                    .cache
                    .list(self.collaborators.network.as_ref(), ResourceKind::SecurityGroup)?;
                Ok(groups
                    .iter()
                    .map(|group| Choice::new(group.display_name(), group.display_name()))
                    .collect())
            }
            _ => Ok(field.constraints.choices.clone()),
        }
    }

    fn choices_unavailable_message(&self, field: &FieldSpec) -> String {
        match field.name.as_str() {
            "keypair" => "Unable to retrieve keypairs.".to_string(),
            _ => "Unable to retrieve list of security groups.".to_string(),
        }
    }

    /// A lone keypair is preselected.
    fn initial_value(&self, field: &FieldSpec, choices: &[Choice]) -> Option<FieldValue> {
        if field.name == "keypair" {
            let mut keypairs = choices.iter().filter(|choice| !choice.is_placeholder());
            return match (keypairs.next(), keypairs.next()) {
                (Some(only), None) => Some(FieldValue::Choice(only.value.clone())),
                _ => None,
            };
        }
        field.initial.clone()
    }

    fn clean(&self, fields: &ValidatedFields, _scope: ActionScope<'_, LaunchContext>) -> Result<(), String> {
        let password = fields.values.text("admin_pass").unwrap_or_default();
        let confirmation = fields.values.text("confirm_admin_pass").unwrap_or_default();
        if password != confirmation {
            return Err("Passwords do not match.".to_string());
        }
        Ok(())
    }
}

impl Step<LaunchContext> for SetAccessControls {
    fn slug(&self) -> &str {
        "set_access_controls"
    }

    fn name(&self) -> &str {
        "Access & Security"
    }

    fn action(&self) -> &dyn Action<LaunchContext> {
        self
    }

    fn depends_on(&self) -> &[LaunchKey] {
        &[LaunchKey::ProjectId, LaunchKey::UserId]
    }

    fn contributes(&self) -> &[LaunchKey] {
        &[LaunchKey::Access]
    }

    fn contribute(&self, fields: &ValidatedFields, _scope: ActionScope<'_, LaunchContext>) -> LaunchContext {
        LaunchContext {
            access: Some(AccessControls {
                keypair: fields.values.text("keypair").map(str::to_string),
                security_groups: fields.values.choices("groups").to_vec(),
                admin_pass: fields.values.text("admin_pass").map(str::to_string),
            }),
            ..LaunchContext::default()
        }
    }
}
