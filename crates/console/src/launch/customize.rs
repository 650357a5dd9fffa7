use nimbus_engine::{Action, ActionScope, Step, ValidatedFields};
use nimbus_types::FieldSpec;

use super::{LaunchContext, LaunchKey};

/// Script run by the instance once it has been built.
pub struct PostCreation {
    fields: Vec<FieldSpec>,
}

impl PostCreation {
    pub fn new() -> Self {
        Self {
            fields: vec![
                FieldSpec::text("customization_script", "Customization Script")
                    .help_text("A script or set of commands to be executed after the instance has been built (max 16kb)."),
            ],
        }
    }
}

impl Default for PostCreation {
    fn default() -> Self {
        Self::new()
    }
}

impl Action<LaunchContext> for PostCreation {
    fn name(&self) -> &str {
        "Post-Creation"
    }

    fn fields(&self) -> &[FieldSpec] {
        &self.fields
    }
}

impl Step<LaunchContext> for PostCreation {
    fn slug(&self) -> &str {
        "post_creation"
    }

    fn name(&self) -> &str {
        "Post-Creation"
    }

    fn action(&self) -> &dyn Action<LaunchContext> {
        self
    }

    fn contributes(&self) -> &[LaunchKey] {
        &[LaunchKey::CustomizationScript]
    }

    fn contribute(&self, fields: &ValidatedFields, _scope: ActionScope<'_, LaunchContext>) -> LaunchContext {
        LaunchContext {
            customization_script: Some(fields.values.text("customization_script").unwrap_or_default().to_string()),
            ..LaunchContext::default()
        }
    }
}
