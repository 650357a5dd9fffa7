//! Field specifications describing a single input of an action.
//!
//! A [`FieldSpec`] is pure data: the engine reads it to coerce raw submitted
//! strings, apply declarative constraints, and decide whether a field's choices
//! must be fetched at run time. Specs are built with the fluent constructors
//! below so step definitions read as a list of declarations.

use serde::{Deserialize, Serialize};

use crate::form::{FieldValue, FormData};

/// Primitive type a raw submitted value is coerced into.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ValueType {
    /// Free-form text.
    Text,
    /// Signed whole number.
    Integer,
    /// Checkbox semantics: absent or `false`/`0`/`off` is false.
    Boolean,
    /// One value out of `constraints.choices`.
    Choice,
    /// Any number of values out of `constraints.choices`.
    MultipleChoice,
}

/// One selectable option of a choice field.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Choice {
    /// Submitted value.
    pub value: String,
    /// Human-readable label.
    pub label: String,
}

impl Choice {
    pub fn new(value: impl Into<String>, label: impl Into<String>) -> Self {
        Self {
            value: value.into(),
            label: label.into(),
        }
    }

    /// Builds a sentinel entry (empty value) such as "Select Image".
    pub fn placeholder(label: impl Into<String>) -> Self {
        Self::new(String::new(), label)
    }

    /// Sentinel entries never count as a selectable option.
    pub fn is_placeholder(&self) -> bool {
        self.value.is_empty()
    }
}

/// Declarative constraints applied after coercion.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct FieldConstraints {
    /// Regular expression text values must match.
    #[serde(default)]
    pub pattern: Option<String>,
    /// Message reported when `pattern` does not match.
    #[serde(default)]
    pub pattern_message: Option<String>,
    /// Inclusive lower bound for integers.
    #[serde(default)]
    pub min_value: Option<i64>,
    /// Inclusive upper bound for integers.
    #[serde(default)]
    pub max_value: Option<i64>,
    /// Maximum number of characters for text.
    #[serde(default)]
    pub max_length: Option<usize>,
    /// Allowed values for choice fields. Refreshed per run for dynamic fields.
    #[serde(default)]
    pub choices: Vec<Choice>,
}

/// Companion condition that decides whether a field applies to a submission.
///
/// When the companion field's submitted value is not one of `one_of`, the
/// field is inapplicable and its required-ness is waived.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct FieldApplicability {
    /// Name of the companion field within the same action.
    pub field: String,
    /// Companion values under which this field applies.
    pub one_of: Vec<String>,
}

impl FieldApplicability {
    pub fn applies(&self, form: &FormData) -> bool {
        let companion = form.get(&self.field).unwrap_or_default();
        self.one_of.iter().any(|candidate| candidate == companion)
    }
}

/// Specification of one input value owned by an action.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct FieldSpec {
    /// Unique name within the owning action; also the submitted form key.
    pub name: String,
    /// Label used in messages.
    pub label: String,
    pub value_type: ValueType,
    pub required: bool,
    #[serde(default)]
    pub constraints: FieldConstraints,
    /// Value shown when rendering an empty form.
    #[serde(default)]
    pub initial: Option<FieldValue>,
    /// Choices must be fetched from a collaborator before validation.
    #[serde(default)]
    pub dynamic_choices: bool,
    #[serde(default)]
    pub applies_when: Option<FieldApplicability>,
    /// Overrides the generic "This field is required." message.
    #[serde(default)]
    pub required_message: Option<String>,
    #[serde(default)]
    pub help_text: Option<String>,
}

impl FieldSpec {
    pub fn new(name: impl Into<String>, label: impl Into<String>, value_type: ValueType) -> Self {
        Self {
            name: name.into(),
            label: label.into(),
            value_type,
            required: false,
            constraints: FieldConstraints::default(),
            initial: None,
            dynamic_choices: false,
            applies_when: None,
            required_message: None,
            help_text: None,
        }
    }

    pub fn text(name: impl Into<String>, label: impl Into<String>) -> Self {
        Self::new(name, label, ValueType::Text)
    }

    pub fn integer(name: impl Into<String>, label: impl Into<String>) -> Self {
        Self::new(name, label, ValueType::Integer)
    }

    pub fn boolean(name: impl Into<String>, label: impl Into<String>) -> Self {
        Self::new(name, label, ValueType::Boolean)
    }

    pub fn choice(name: impl Into<String>, label: impl Into<String>) -> Self {
        Self::new(name, label, ValueType::Choice)
    }

    pub fn multiple_choice(name: impl Into<String>, label: impl Into<String>) -> Self {
        Self::new(name, label, ValueType::MultipleChoice)
    }

    pub fn required(mut self) -> Self {
        self.required = true;
        self
    }

    pub fn pattern(mut self, pattern: impl Into<String>, message: impl Into<String>) -> Self {
        self.constraints.pattern = Some(pattern.into());
        self.constraints.pattern_message = Some(message.into());
        self
    }

    pub fn min_value(mut self, minimum: i64) -> Self {
        self.constraints.min_value = Some(minimum);
        self
    }

    pub fn max_value(mut self, maximum: i64) -> Self {
        self.constraints.max_value = Some(maximum);
        self
    }

    pub fn max_length(mut self, maximum: usize) -> Self {
        self.constraints.max_length = Some(maximum);
        self
    }

    pub fn choices(mut self, choices: Vec<Choice>) -> Self {
        self.constraints.choices = choices;
        self
    }

    /// Marks the field's choices as fetched per run.
    pub fn dynamic(mut self) -> Self {
        self.dynamic_choices = true;
        self
    }

    pub fn initial(mut self, value: FieldValue) -> Self {
        self.initial = Some(value);
        self
    }

    pub fn applies_when<I, S>(mut self, field: impl Into<String>, one_of: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        self.applies_when = Some(FieldApplicability {
            field: field.into(),
            one_of: one_of.into_iter().map(Into::into).collect(),
        });
        self
    }

    pub fn required_message(mut self, message: impl Into<String>) -> Self {
        self.required_message = Some(message.into());
        self
    }

    pub fn help_text(mut self, text: impl Into<String>) -> Self {
        self.help_text = Some(text.into());
        self
    }

    /// Whether the field applies to this submission (see [`FieldApplicability`]).
    pub fn is_applicable(&self, form: &FormData) -> bool {
        self.applies_when.as_ref().is_none_or(|condition| condition.applies(form))
    }

    /// Whether an empty submission must be rejected.
    pub fn is_required_for(&self, form: &FormData) -> bool {
        self.required && self.is_applicable(form)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn builder_sets_constraints() {
        let spec = FieldSpec::integer("count", "Instance Count")
            .required()
            .min_value(1)
            .initial(FieldValue::Integer(1));

        assert!(spec.required);
        assert_eq!(spec.constraints.min_value, Some(1));
        assert_eq!(spec.initial, Some(FieldValue::Integer(1)));
        assert!(!spec.dynamic_choices);
    }

    #[test]
    fn required_is_waived_when_companion_excludes_field() {
        let spec = FieldSpec::text("device_name", "Device Name")
            .required()
            .applies_when("volume_type", ["volume_id", "volume_snapshot_id"]);

        let mut form = FormData::new();
        assert!(!spec.is_required_for(&form));

        form.insert("volume_type", "volume_id");
        assert!(spec.is_required_for(&form));

        form.insert("volume_type", "");
        assert!(!spec.is_required_for(&form));
    }

    #[test]
    fn placeholder_choices_have_empty_values() {
        let placeholder = Choice::placeholder("Select Image");
        assert!(placeholder.is_placeholder());
        assert!(!Choice::new("img-1", "cirros").is_placeholder());
    }
}
