use nimbus_engine::{Action, ActionScope, Collaborators, Step, ValidatedFields};
use nimbus_types::{Choice, CollaboratorError, FieldSpec, NETWORK_SERVICE_PERMISSION, ResourceKind};

use super::{LaunchContext, LaunchKey};

/// Networks the instance is attached to.
pub struct SetNetwork {
    fields: Vec<FieldSpec>,
    collaborators: Collaborators,
}

impl SetNetwork {
    pub fn new(collaborators: Collaborators) -> Self {
        Self {
            fields: vec![
                FieldSpec::multiple_choice("network", "Networks")
                    .required()
                    .dynamic()
                    .required_message("At least one network must be specified.")
                    .help_text("Launch instance with these networks"),
            ],
            collaborators,
        }
    }
}

impl Action<LaunchContext> for SetNetwork {
    fn name(&self) -> &str {
        "Networking"
    }

    fn fields(&self) -> &[FieldSpec] {
        &self.fields
    }

    /// Networks owned by the requester's project plus shared ones.
    fn populate_choices(&self, _field: &FieldSpec, scope: ActionScope<'_, LaunchContext>) -> Result<Vec<Choice>, CollaboratorError> {
        let networks = scope.cache.list(self.collaborators.network.as_ref(), ResourceKind::Network)?;
        let project_id = scope.requester.project_id.as_str();

        Ok(networks
            .iter()
            .filter(|network| {
                network.attribute_bool("shared").unwrap_or(false) || network.attribute_str("tenant_id") == Some(project_id)
            })
            .map(|network| Choice::new(&network.id, network.display_name()))
            .collect())
    }

    fn choices_unavailable_message(&self, _field: &FieldSpec) -> String {
        "Unable to retrieve networks.".to_string()
    }
}

impl Step<LaunchContext> for SetNetwork {
    fn slug(&self) -> &str {
        "set_network"
    }

    fn name(&self) -> &str {
        "Networking"
    }

    fn action(&self) -> &dyn Action<LaunchContext> {
        self
    }

    fn depends_on(&self) -> &[LaunchKey] {
        &[LaunchKey::ProjectId]
    }

    fn contributes(&self) -> &[LaunchKey] {
        &[LaunchKey::NetworkIds]
    }

    fn permissions(&self) -> &[&str] {
        &[NETWORK_SERVICE_PERMISSION]
    }

    fn contribute(&self, fields: &ValidatedFields, _scope: ActionScope<'_, LaunchContext>) -> LaunchContext {
        LaunchContext {
            network_ids: Some(fields.values.choices("network").to_vec()),
            ..LaunchContext::default()
        }
    }
}
