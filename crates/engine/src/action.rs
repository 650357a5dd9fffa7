//! Actions: the validation unit bound to one step.
//!
//! An [`Action`] is a list of [`FieldSpec`]s plus a few hooks: dynamic choice
//! population, live per-field checks, and a cross-field check that runs last.
//! [`validate_action`] drives those hooks in a fixed order against one
//! submission and accumulates every field error of the action.

use indexmap::IndexMap;
use nimbus_types::{
    Choice, CleanedData, CollaboratorError, FieldError, FieldSpec, FieldValue, FormData, REQUIRED_MESSAGE, Requester, StepErrors,
    Warning, check_constraints, coerce_raw_value,
};
use tracing::{debug, warn};

use crate::{
    context::WorkflowContext,
    error::EngineError,
    provider::ChoiceCache,
    workflow::{ChoicePopulationEvent, WorkflowTelemetry},
};

/// Everything an action may read while it validates or populates choices.
pub struct ActionScope<'a, C> {
    pub form: &'a FormData,
    /// Context accumulated by the steps that ran before this one.
    pub context: &'a C,
    pub requester: &'a Requester,
    /// Per-run memo of collaborator listings.
    pub cache: &'a ChoiceCache,
}

impl<C> Clone for ActionScope<'_, C> {
    fn clone(&self) -> Self {
        *self
    }
}

impl<C> Copy for ActionScope<'_, C> {}

/// Output of an action whose fields all passed.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct ValidatedFields {
    pub values: CleanedData,
    /// Choice lists populated for dynamic fields during this validation.
    pub choices: IndexMap<String, Vec<Choice>>,
}

impl ValidatedFields {
    /// Label of the selected choice of `field`, if the field was populated.
    pub fn choice_label(&self, field: &str, value: &str) -> Option<&str> {
        self.choices
            .get(field)?
            .iter()
            .find(|choice| choice.value == value)
            .map(|choice| choice.label.as_str())
    }
}

/// Failure reported by [`Action::clean_field`].
#[derive(Debug)]
pub enum FieldCheck {
    /// The value violates a live rule (for example a duplicate name).
    Invalid(String),
    /// The data needed to check the value could not be fetched.
    Unavailable(String),
    /// Unclassified collaborator failure; aborts the run.
    Failed(CollaboratorError),
}

impl FieldCheck {
    /// Maps a failed fetch: classified failures become `Unavailable(message)`,
    /// anything else is propagated.
    pub fn from_fetch_error(error: CollaboratorError, message: impl Into<String>) -> Self {
        if error.is_classified() {
            FieldCheck::Unavailable(message.into())
        } else {
            FieldCheck::Failed(error)
        }
    }
}

/// Validation contract of one step.
pub trait Action<C: WorkflowContext>: Send + Sync {
    fn name(&self) -> &str;

    /// Field specifications in authoring order.
    fn fields(&self) -> &[FieldSpec];

    /// Fetches the current choices of a dynamic field.
    fn populate_choices(&self, field: &FieldSpec, scope: ActionScope<'_, C>) -> Result<Vec<Choice>, CollaboratorError> {
        let _ = scope;
        Ok(field.constraints.choices.clone())
    }

    /// Message reported when a required dynamic field could not be populated.
    fn choices_unavailable_message(&self, field: &FieldSpec) -> String {
        format!("Unable to retrieve {} choices.", field.label.to_lowercase())
    }

    /// Default shown at render time and used for blank optional submissions.
    fn initial_value(&self, field: &FieldSpec, choices: &[Choice]) -> Option<FieldValue> {
        let _ = choices;
        field.initial.clone()
    }

    /// Live check of one value that passed its declarative constraints.
    fn clean_field(&self, field: &FieldSpec, value: &FieldValue, scope: ActionScope<'_, C>) -> Result<(), FieldCheck> {
        let _ = (field, value, scope);
        Ok(())
    }

    /// Cross-field check; runs only once every field passed.
    fn clean(&self, fields: &ValidatedFields, scope: ActionScope<'_, C>) -> Result<(), String> {
        let _ = (fields, scope);
        Ok(())
    }
}

/// Result of validating one action.
#[derive(Debug, Clone, PartialEq)]
pub enum ActionValidation {
    Valid(ValidatedFields),
    Invalid(StepErrors),
}

/// Choices of one dynamic field after a population attempt.
#[derive(Debug, Clone, PartialEq)]
pub(crate) struct PopulatedChoices {
    pub choices: Vec<Choice>,
    /// Set when the fetch failed and the list degraded to empty.
    pub degraded: bool,
}

/// Refreshes a dynamic field's choices, degrading classified failures to an
/// empty list plus a warning.
pub(crate) fn populate_field_choices<C: WorkflowContext>(
    step: &str,
    action: &dyn Action<C>,
    field: &FieldSpec,
    scope: ActionScope<'_, C>,
    telemetry: &mut WorkflowTelemetry,
    warnings: &mut Vec<Warning>,
) -> Result<PopulatedChoices, EngineError> {
    let populated = match action.populate_choices(field, scope) {
        Ok(choices) => {
            debug!(step = %step, field = %field.name, item_count = choices.len(), "populated choices");
            PopulatedChoices { choices, degraded: false }
        }
        Err(error) if error.is_classified() => {
            warn!(step = %step, field = %field.name, error = %error, "choice population degraded to an empty list");
            warnings.push(Warning::for_field(step, &field.name, action.choices_unavailable_message(field)));
            PopulatedChoices {
                choices: Vec::new(),
                degraded: true,
            }
        }
        Err(error) => {
            return Err(EngineError::Collaborator {
                step: step.to_string(),
                activity: format!("populating choices of field '{}'", field.name),
                source: error,
            });
        }
    };

    telemetry.record_choice_population(ChoicePopulationEvent::new(
        step,
        &field.name,
        populated.choices.len(),
        populated.degraded,
    ));
    Ok(populated)
}

/// Validates one submission against `action`.
///
/// Per field, in authoring order: dynamic choices are refreshed, the raw value
/// is coerced, required-ness and declarative constraints are checked, then
/// [`Action::clean_field`] runs. Field errors accumulate across the action.
/// [`Action::clean`] runs last and only when no field failed.
pub fn validate_action<C: WorkflowContext>(
    step: &str,
    action: &dyn Action<C>,
    scope: ActionScope<'_, C>,
    telemetry: &mut WorkflowTelemetry,
    warnings: &mut Vec<Warning>,
) -> Result<ActionValidation, EngineError> {
    let mut errors = StepErrors::default();
    let mut validated = ValidatedFields::default();

    for field in action.fields() {
        let required = field.is_required_for(scope.form);
        let mut spec = field.clone();

        if field.dynamic_choices {
            let populated = populate_field_choices(step, action, field, scope, telemetry, warnings)?;
            if populated.degraded && required {
                errors.add_field_error(&field.name, FieldError::unavailable(action.choices_unavailable_message(field)));
                continue;
            }
            spec.constraints.choices = populated.choices;
            validated.choices.insert(field.name.clone(), spec.constraints.choices.clone());
        }

        let value = match coerce_raw_value(&spec, scope.form.get_all(&field.name)) {
            Ok(value) => value,
            Err(message) => {
                errors.add_field_error(&field.name, FieldError::invalid(message));
                continue;
            }
        };

        let value = if value.is_empty() {
            if required {
                let message = field.required_message.as_deref().unwrap_or(REQUIRED_MESSAGE);
                errors.add_field_error(&field.name, FieldError::invalid(message));
                continue;
            }
            action
                .initial_value(&spec, &spec.constraints.choices)
                .unwrap_or(FieldValue::Empty)
        } else {
            if let Err(message) = check_constraints(&value, &spec.constraints) {
                errors.add_field_error(&field.name, FieldError::invalid(message));
                continue;
            }
            value
        };

        match action.clean_field(&spec, &value, scope) {
            Ok(()) => validated.values.insert(field.name.clone(), value),
            Err(FieldCheck::Invalid(message)) => errors.add_field_error(&field.name, FieldError::invalid(message)),
            Err(FieldCheck::Unavailable(message)) => errors.add_field_error(&field.name, FieldError::unavailable(message)),
            Err(FieldCheck::Failed(source)) => {
                return Err(EngineError::Collaborator {
                    step: step.to_string(),
                    activity: format!("checking field '{}'", field.name),
                    source,
                });
            }
        }
    }

    if !errors.is_empty() {
        debug!(step = %step, action = %action.name(), error_count = errors.fields.len(), "field validation failed");
        return Ok(ActionValidation::Invalid(errors));
    }

    if let Err(message) = action.clean(&validated, scope) {
        debug!(step = %step, action = %action.name(), "cross-field validation failed");
        errors.add_form_error(message);
        return Ok(ActionValidation::Invalid(errors));
    }

    Ok(ActionValidation::Valid(validated))
}

#[cfg(test)]
mod tests {
    use std::sync::atomic::{AtomicUsize, Ordering};

    use nimbus_types::FieldErrorKind;

    use super::*;

    crate::workflow_context! {
        struct ProbeContext keyed by ProbeKey {
            name: String => Name,
        }
    }

    struct ProbeAction {
        fields: Vec<FieldSpec>,
        population: fn() -> Result<Vec<Choice>, CollaboratorError>,
        clean_calls: AtomicUsize,
    }

    impl ProbeAction {
        fn new(fields: Vec<FieldSpec>, population: fn() -> Result<Vec<Choice>, CollaboratorError>) -> Self {
            Self {
                fields,
                population,
                clean_calls: AtomicUsize::new(0),
            }
        }
    }

    impl Action<ProbeContext> for ProbeAction {
        fn name(&self) -> &str {
            "probe"
        }

        fn fields(&self) -> &[FieldSpec] {
            &self.fields
        }

        fn populate_choices(&self, _field: &FieldSpec, _scope: ActionScope<'_, ProbeContext>) -> Result<Vec<Choice>, CollaboratorError> {
            (self.population)()
        }

        fn clean(&self, fields: &ValidatedFields, _scope: ActionScope<'_, ProbeContext>) -> Result<(), String> {
            self.clean_calls.fetch_add(1, Ordering::SeqCst);
            match fields.values.text("name") {
                Some("forbidden") => Err("That name is reserved.".to_string()),
                _ => Ok(()),
            }
        }
    }

    fn flavors() -> Result<Vec<Choice>, CollaboratorError> {
        Ok(vec![Choice::new("1", "m1.tiny"), Choice::new("2", "m1.small")])
    }

    fn unreachable_flavors() -> Result<Vec<Choice>, CollaboratorError> {
        Err(CollaboratorError::unavailable("compute", "connection refused"))
    }

    fn broken_flavors() -> Result<Vec<Choice>, CollaboratorError> {
        Err(CollaboratorError::Unexpected(anyhow::anyhow!("decoder exploded")))
    }

    fn run(action: &ProbeAction, form: &FormData) -> (Result<ActionValidation, EngineError>, Vec<Warning>) {
        let context = ProbeContext::default();
        let requester = Requester::new("u-1", "p-1");
        let cache = ChoiceCache::new();
        let scope = ActionScope {
            form,
            context: &context,
            requester: &requester,
            cache: &cache,
        };
        let mut telemetry = WorkflowTelemetry::default();
        let mut warnings = Vec::new();
        let result = validate_action("probe", action, scope, &mut telemetry, &mut warnings);
        (result, warnings)
    }

    fn fields(required_flavor: bool) -> Vec<FieldSpec> {
        let flavor = FieldSpec::choice("flavor", "Flavor").dynamic();
        vec![
            FieldSpec::text("name", "Name").required().max_length(10),
            FieldSpec::integer("count", "Count").required().min_value(1),
            if required_flavor { flavor.required() } else { flavor },
        ]
    }

    #[test]
    fn accumulates_every_field_error() {
        let action = ProbeAction::new(fields(true), flavors);
        let form: FormData = [("name", "far-too-long"), ("count", "two"), ("flavor", "9")].into_iter().collect();

        let (result, _) = run(&action, &form);
        let Ok(ActionValidation::Invalid(errors)) = result else {
            panic!("expected field errors");
        };

        assert_eq!(errors.fields.len(), 3);
        assert_eq!(errors.field_messages("count"), vec!["Enter a whole number."]);
        assert_eq!(action.clean_calls.load(Ordering::SeqCst), 0);
    }

    #[test]
    fn cross_field_check_reports_form_error() {
        let action = ProbeAction::new(fields(true), flavors);
        let form: FormData = [("name", "forbidden"), ("count", "1"), ("flavor", "2")].into_iter().collect();

        let (result, _) = run(&action, &form);
        let Ok(ActionValidation::Invalid(errors)) = result else {
            panic!("expected a form error");
        };

        assert!(errors.fields.is_empty());
        assert_eq!(errors.form, vec!["That name is reserved.".to_string()]);
    }

    #[test]
    fn required_field_with_unreachable_choices_is_unavailable() {
        let action = ProbeAction::new(fields(true), unreachable_flavors);
        let form: FormData = [("name", "web"), ("count", "1"), ("flavor", "1")].into_iter().collect();

        let (result, warnings) = run(&action, &form);
        let Ok(ActionValidation::Invalid(errors)) = result else {
            panic!("expected an unavailable field error");
        };

        assert_eq!(errors.fields["flavor"][0].kind, FieldErrorKind::Unavailable);
        assert_eq!(warnings.len(), 1);
        assert_eq!(warnings[0].field.as_deref(), Some("flavor"));
    }

    #[test]
    fn optional_field_with_unreachable_choices_degrades_to_warning() {
        let action = ProbeAction::new(fields(false), unreachable_flavors);
        let form: FormData = [("name", "web"), ("count", "1")].into_iter().collect();

        let (result, warnings) = run(&action, &form);
        let Ok(ActionValidation::Valid(validated)) = result else {
            panic!("expected a valid submission");
        };

        assert_eq!(validated.choices["flavor"], Vec::<Choice>::new());
        assert_eq!(warnings.len(), 1);
    }

    #[test]
    fn unclassified_population_failure_propagates() {
        let action = ProbeAction::new(fields(false), broken_flavors);
        let form: FormData = [("name", "web"), ("count", "1")].into_iter().collect();

        let (result, _) = run(&action, &form);
        assert!(matches!(result, Err(EngineError::Collaborator { .. })));
    }

    #[test]
    fn blank_optional_field_takes_initial_value() {
        let mut specs = fields(false);
        specs.push(FieldSpec::text("device_name", "Device Name").initial(FieldValue::Text("vda".into())));
        let action = ProbeAction::new(specs, flavors);
        let form: FormData = [("name", "web"), ("count", "1"), ("device_name", "")].into_iter().collect();

        let (result, _) = run(&action, &form);
        let Ok(ActionValidation::Valid(validated)) = result else {
            panic!("expected a valid submission");
        };

        assert_eq!(validated.values.text("device_name"), Some("vda"));
        assert_eq!(validated.choice_label("flavor", "2"), Some("m1.small"));
    }
}
