use nimbus_engine::{Action, ActionScope, Step, ValidatedFields};
use nimbus_types::{Choice, CollaboratorError, FieldSpec};

use super::{LaunchContext, LaunchKey};

/// Permission no requester holds; keeps the step hidden while its
/// contributions are checked against the seeded context.
const UNUSABLE_PERMISSION: &str = "!";

/// Project and user the instance is launched for.
pub struct SelectProjectUser {
    fields: Vec<FieldSpec>,
}

impl SelectProjectUser {
    pub fn new() -> Self {
        Self {
            fields: vec![
                FieldSpec::choice("project_id", "Project").required().dynamic(),
                FieldSpec::choice("user_id", "User").required().dynamic(),
            ],
        }
    }
}

impl Default for SelectProjectUser {
    fn default() -> Self {
        Self::new()
    }
}

impl Action<LaunchContext> for SelectProjectUser {
    fn name(&self) -> &str {
        "Project & User"
    }

    fn fields(&self) -> &[FieldSpec] {
        &self.fields
    }

    fn populate_choices(&self, field: &FieldSpec, scope: ActionScope<'_, LaunchContext>) -> Result<Vec<Choice>, CollaboratorError> {
        let requester = scope.requester;
        Ok(match field.name.as_str() {
            "project_id" => requester
                .authorized_projects
                .iter()
                .map(|project| Choice::new(&project.id, &project.name))
                .collect(),
            "user_id" => vec![Choice::new(&requester.user_id, &requester.username)],
            _ => Vec::new(),
        })
    }
}

impl Step<LaunchContext> for SelectProjectUser {
    fn slug(&self) -> &str {
        "select_project_user"
    }

    fn name(&self) -> &str {
        "Project & User"
    }

    fn action(&self) -> &dyn Action<LaunchContext> {
        self
    }

    fn contributes(&self) -> &[LaunchKey] {
        &[LaunchKey::ProjectId, LaunchKey::UserId]
    }

    fn permissions(&self) -> &[&str] {
        &[UNUSABLE_PERMISSION]
    }

    fn contribute(&self, fields: &ValidatedFields, _scope: ActionScope<'_, LaunchContext>) -> LaunchContext {
        LaunchContext {
            project_id: fields.values.text("project_id").map(str::to_string),
            user_id: fields.values.text("user_id").map(str::to_string),
            ..LaunchContext::default()
        }
    }
}
