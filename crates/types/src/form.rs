//! Submitted form data and the values produced by coercing it.
//!
//! [`FormData`] is the untyped boundary: a submission maps field names to one
//! or more raw strings (checkbox lists submit several). Everything past the
//! boundary works with [`FieldValue`] and [`CleanedData`].

use indexmap::IndexMap;
use serde::{Deserialize, Serialize};

/// Raw submission keyed by field name, preserving submission order.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(from = "IndexMap<String, RawField>", into = "IndexMap<String, Vec<String>>")]
pub struct FormData {
    values: IndexMap<String, Vec<String>>,
}

impl FormData {
    pub fn new() -> Self {
        Self::default()
    }

    /// Replaces any previous values of `name` with a single value.
    pub fn insert(&mut self, name: impl Into<String>, value: impl Into<String>) {
        self.values.insert(name.into(), vec![value.into()]);
    }

    /// Replaces any previous values of `name` with a list of values.
    pub fn insert_many<I, S>(&mut self, name: impl Into<String>, values: I)
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        self.values.insert(name.into(), values.into_iter().map(Into::into).collect());
    }

    /// First submitted value of `name`.
    pub fn get(&self, name: &str) -> Option<&str> {
        self.values.get(name).and_then(|values| values.first()).map(String::as_str)
    }

    /// Every submitted value of `name`; empty when absent.
    pub fn get_all(&self, name: &str) -> &[String] {
        self.values.get(name).map(Vec::as_slice).unwrap_or_default()
    }

    pub fn contains(&self, name: &str) -> bool {
        self.values.contains_key(name)
    }

    pub fn is_empty(&self) -> bool {
        self.values.is_empty()
    }

    pub fn iter(&self) -> impl Iterator<Item = (&String, &Vec<String>)> {
        self.values.iter()
    }
}

impl<K, V> FromIterator<(K, V)> for FormData
where
    K: Into<String>,
    V: Into<String>,
{
    fn from_iter<T: IntoIterator<Item = (K, V)>>(iter: T) -> Self {
        let mut form = FormData::new();
        for (name, value) in iter {
            form.insert(name, value);
        }
        form
    }
}

/// Shapes accepted for one field when a submission is deserialized from YAML or JSON.
#[derive(Debug, Clone, Deserialize)]
#[serde(untagged)]
enum RawField {
    Many(Vec<RawScalar>),
    One(RawScalar),
}

#[derive(Debug, Clone, Deserialize)]
#[serde(untagged)]
enum RawScalar {
    Text(String),
    Integer(i64),
    Boolean(bool),
    Null(()),
}

impl RawScalar {
    fn into_string(self) -> String {
        match self {
            RawScalar::Text(text) => text,
            RawScalar::Integer(number) => number.to_string(),
            RawScalar::Boolean(flag) => flag.to_string(),
            RawScalar::Null(()) => String::new(),
        }
    }
}

impl From<IndexMap<String, RawField>> for FormData {
    fn from(raw: IndexMap<String, RawField>) -> Self {
        let values = raw
            .into_iter()
            .map(|(name, field)| {
                let values = match field {
                    RawField::One(scalar) => vec![scalar.into_string()],
                    RawField::Many(scalars) => scalars.into_iter().map(RawScalar::into_string).collect(),
                };
                (name, values)
            })
            .collect();
        Self { values }
    }
}

impl From<FormData> for IndexMap<String, Vec<String>> {
    fn from(form: FormData) -> Self {
        form.values
    }
}

/// A raw value after coercion to its declared [`ValueType`](crate::ValueType).
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "type", content = "value", rename_all = "snake_case")]
pub enum FieldValue {
    /// Nothing was submitted (or only blanks for a list).
    Empty,
    Text(String),
    Integer(i64),
    Boolean(bool),
    Choice(String),
    Choices(Vec<String>),
}

impl FieldValue {
    pub fn is_empty(&self) -> bool {
        match self {
            FieldValue::Empty => true,
            FieldValue::Text(text) | FieldValue::Choice(text) => text.is_empty(),
            FieldValue::Choices(values) => values.is_empty(),
            FieldValue::Integer(_) | FieldValue::Boolean(_) => false,
        }
    }

    /// Text or single choice; `None` for blanks.
    pub fn as_text(&self) -> Option<&str> {
        match self {
            FieldValue::Text(text) | FieldValue::Choice(text) if !text.is_empty() => Some(text),
            _ => None,
        }
    }

    pub fn as_integer(&self) -> Option<i64> {
        match self {
            FieldValue::Integer(number) => Some(*number),
            _ => None,
        }
    }

    /// Unchecked checkboxes arrive as `Empty`; both read as false.
    pub fn as_bool(&self) -> bool {
        matches!(self, FieldValue::Boolean(true))
    }

    pub fn as_choices(&self) -> &[String] {
        match self {
            FieldValue::Choices(values) => values,
            _ => &[],
        }
    }
}

/// Values of an action whose fields all validated, keyed by field name.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize)]
pub struct CleanedData {
    values: IndexMap<String, FieldValue>,
}

impl CleanedData {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn insert(&mut self, name: impl Into<String>, value: FieldValue) {
        self.values.insert(name.into(), value);
    }

    pub fn get(&self, name: &str) -> Option<&FieldValue> {
        self.values.get(name)
    }

    /// Non-blank text or single choice.
    pub fn text(&self, name: &str) -> Option<&str> {
        self.get(name).and_then(FieldValue::as_text)
    }

    pub fn integer(&self, name: &str) -> Option<i64> {
        self.get(name).and_then(FieldValue::as_integer)
    }

    pub fn boolean(&self, name: &str) -> bool {
        self.get(name).is_some_and(FieldValue::as_bool)
    }

    pub fn choices(&self, name: &str) -> &[String] {
        self.get(name).map(FieldValue::as_choices).unwrap_or_default()
    }

    pub fn len(&self) -> usize {
        self.values.len()
    }

    pub fn is_empty(&self) -> bool {
        self.values.is_empty()
    }
}
