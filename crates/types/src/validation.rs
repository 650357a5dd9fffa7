//! Coercion and declarative constraint checks shared by every action.
//!
//! The checks mirror what an operator expects from the console forms:
//! - Raw strings are coerced to the field's declared type first.
//! - Choice values must be one of the non-placeholder choices.
//! - Patterns and maximum length only apply to text.
//! - Numeric ranges only apply to integers.
//!
//! Every failure is a human-readable message; nothing here panics on bad input.

use indexmap::IndexMap;
use regex::Regex;
use serde::{Deserialize, Serialize};

use crate::field::{Choice, FieldConstraints, FieldSpec, ValueType};
use crate::form::FieldValue;

pub const REQUIRED_MESSAGE: &str = "This field is required.";

/// Coerce the raw submitted strings of one field into its declared type.
pub fn coerce_raw_value(spec: &FieldSpec, raw: &[String]) -> Result<FieldValue, String> {
    let first = raw.first().map(String::as_str).unwrap_or_default();

    match spec.value_type {
        ValueType::Text => Ok(if first.is_empty() {
            FieldValue::Empty
        } else {
            FieldValue::Text(first.to_string())
        }),
        ValueType::Choice => Ok(if first.is_empty() {
            FieldValue::Empty
        } else {
            FieldValue::Choice(first.to_string())
        }),
        ValueType::Integer => {
            let trimmed = first.trim();
            if trimmed.is_empty() {
                return Ok(FieldValue::Empty);
            }
            trimmed
                .parse::<i64>()
                .map(FieldValue::Integer)
                .map_err(|_| "Enter a whole number.".to_string())
        }
        ValueType::Boolean => {
            let normalized = first.trim().to_ascii_lowercase();
            let checked = !matches!(normalized.as_str(), "" | "false" | "0" | "off" | "no");
            Ok(FieldValue::Boolean(checked))
        }
        ValueType::MultipleChoice => {
            let values: Vec<String> = raw.iter().filter(|value| !value.is_empty()).cloned().collect();
            Ok(if values.is_empty() {
                FieldValue::Empty
            } else {
                FieldValue::Choices(values)
            })
        }
    }
}

/// Validate a coerced, non-empty value against the declarative constraints.
pub fn check_constraints(value: &FieldValue, constraints: &FieldConstraints) -> Result<(), String> {
    match value {
        FieldValue::Choice(selected) => check_choice(selected, &constraints.choices),
        FieldValue::Choices(selected) => selected
            .iter()
            .try_for_each(|candidate| check_choice(candidate, &constraints.choices)),
        FieldValue::Text(text) => {
            if let Some(max_length) = constraints.max_length {
                let length = text.chars().count();
                if length > max_length {
                    return Err(format!(
                        "Ensure this value has at most {} characters (it has {}).",
                        max_length, length
                    ));
                }
            }

            if let Some(pattern) = &constraints.pattern {
                let regex = Regex::new(pattern).map_err(|error| format!("invalid pattern '{}': {}", pattern, error))?;
                if !regex.is_match(text) {
                    return Err(constraints
                        .pattern_message
                        .clone()
                        .unwrap_or_else(|| "Enter a valid value.".to_string()));
                }
            }
            Ok(())
        }
        FieldValue::Integer(number) => {
            if let Some(minimum) = constraints.min_value
                && *number < minimum
            {
                return Err(format!("Ensure this value is greater than or equal to {}.", minimum));
            }
            if let Some(maximum) = constraints.max_value
                && *number > maximum
            {
                return Err(format!("Ensure this value is less than or equal to {}.", maximum));
            }
            Ok(())
        }
        FieldValue::Boolean(_) | FieldValue::Empty => Ok(()),
    }
}

fn check_choice(candidate: &str, choices: &[Choice]) -> Result<(), String> {
    let allowed = choices
        .iter()
        .any(|choice| !choice.is_placeholder() && choice.value == candidate);
    if allowed {
        Ok(())
    } else {
        Err(format!(
            "Select a valid choice. {} is not one of the available choices.",
            candidate
        ))
    }
}

/// Distinguishes bad input from a collaborator that could not be consulted.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum FieldErrorKind {
    /// The submitted value is malformed or violates a constraint.
    Invalid,
    /// Live data needed to validate the field could not be fetched.
    Unavailable,
}

/// Error attached to a single field.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct FieldError {
    pub kind: FieldErrorKind,
    pub message: String,
}

impl FieldError {
    pub fn invalid(message: impl Into<String>) -> Self {
        Self {
            kind: FieldErrorKind::Invalid,
            message: message.into(),
        }
    }

    pub fn unavailable(message: impl Into<String>) -> Self {
        Self {
            kind: FieldErrorKind::Unavailable,
            message: message.into(),
        }
    }
}

/// Every error produced while validating one step.
///
/// Field errors are accumulated across the whole action; form errors come from
/// the cross-field check that runs once all fields passed.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct StepErrors {
    #[serde(default)]
    pub fields: IndexMap<String, Vec<FieldError>>,
    #[serde(default)]
    pub form: Vec<String>,
}

impl StepErrors {
    pub fn add_field_error(&mut self, field: impl Into<String>, error: FieldError) {
        self.fields.entry(field.into()).or_default().push(error);
    }

    pub fn add_form_error(&mut self, message: impl Into<String>) {
        self.form.push(message.into());
    }

    pub fn is_empty(&self) -> bool {
        self.fields.is_empty() && self.form.is_empty()
    }

    /// Messages attached to `field`, in the order they were raised.
    pub fn field_messages(&self, field: &str) -> Vec<&str> {
        self.fields
            .get(field)
            .map(|errors| errors.iter().map(|error| error.message.as_str()).collect())
            .unwrap_or_default()
    }
}
