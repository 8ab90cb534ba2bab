//! Field values and per-kind field descriptors.

use crate::validation::Rule;
use serde::{Deserialize, Serialize};
use std::fmt::{Debug, Formatter};

/// Uniform value exchanged through field descriptors.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum FieldValue {
    Empty,
    Text(String),
    Number(i64),
    /// Ordered identifier list, e.g. meeting participants.
    Ids(Vec<i64>),
}

impl FieldValue {
    pub fn text(value: impl Into<String>) -> Self {
        Self::Text(value.into())
    }

    pub fn as_text(&self) -> Option<&str> {
        match self {
            Self::Text(value) => Some(value.as_str()),
            _ => None,
        }
    }

    pub fn as_number(&self) -> Option<i64> {
        match self {
            Self::Number(value) => Some(*value),
            _ => None,
        }
    }

    pub fn as_ids(&self) -> Option<&[i64]> {
        match self {
            Self::Ids(ids) => Some(ids.as_slice()),
            _ => None,
        }
    }

    /// `Empty`, whitespace-only text and an empty id list count as blank.
    pub fn is_blank(&self) -> bool {
        match self {
            Self::Empty => true,
            Self::Text(value) => value.trim().is_empty(),
            Self::Number(_) => false,
            Self::Ids(ids) => ids.is_empty(),
        }
    }
}

impl From<&str> for FieldValue {
    fn from(value: &str) -> Self {
        Self::Text(value.to_string())
    }
}

impl From<String> for FieldValue {
    fn from(value: String) -> Self {
        Self::Text(value)
    }
}

impl From<i64> for FieldValue {
    fn from(value: i64) -> Self {
        Self::Number(value)
    }
}

impl From<Option<String>> for FieldValue {
    fn from(value: Option<String>) -> Self {
        value.map_or(Self::Empty, Self::Text)
    }
}

impl From<Option<i64>> for FieldValue {
    fn from(value: Option<i64>) -> Self {
        value.map_or(Self::Empty, Self::Number)
    }
}

impl From<Vec<i64>> for FieldValue {
    fn from(value: Vec<i64>) -> Self {
        Self::Ids(value)
    }
}

/// Reads one field from the model.
pub type FieldGetter<E> = fn(&E) -> FieldValue;

/// Writes one field; hands the value back when its shape does not fit.
pub type FieldSetter<E> = fn(&mut E, FieldValue) -> Result<(), FieldValue>;

/// One editable field of an entity kind.
pub struct FieldDescriptor<E> {
    pub name: &'static str,
    pub get: FieldGetter<E>,
    pub set: FieldSetter<E>,
    pub rules: Vec<Rule>,
}

impl<E> FieldDescriptor<E> {
    pub fn new(name: &'static str, get: FieldGetter<E>, set: FieldSetter<E>) -> Self {
        Self {
            name,
            get,
            set,
            rules: Vec::new(),
        }
    }

    pub fn with_rule(mut self, rule: Rule) -> Self {
        self.rules.push(rule);
        self
    }
}

impl<E> Debug for FieldDescriptor<E> {
    fn fmt(&self, f: &mut Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("FieldDescriptor")
            .field("name", &self.name)
            .field("rules", &self.rules.len())
            .finish()
    }
}

/// Coerces a value for a required text field; `Empty` becomes `""`.
pub fn into_text(value: FieldValue) -> Result<String, FieldValue> {
    match value {
        FieldValue::Empty => Ok(String::new()),
        FieldValue::Text(text) => Ok(text),
        other => Err(other),
    }
}

/// Coerces a value for an optional text field; blank text becomes `None`.
pub fn into_optional_text(value: FieldValue) -> Result<Option<String>, FieldValue> {
    match value {
        FieldValue::Empty => Ok(None),
        FieldValue::Text(text) if text.is_empty() => Ok(None),
        FieldValue::Text(text) => Ok(Some(text)),
        other => Err(other),
    }
}

/// Coerces a value for an optional numeric field.
pub fn into_optional_number(value: FieldValue) -> Result<Option<i64>, FieldValue> {
    match value {
        FieldValue::Empty => Ok(None),
        FieldValue::Number(number) => Ok(Some(number)),
        other => Err(other),
    }
}

/// Coerces a value for an id-list field; `Empty` becomes an empty list.
pub fn into_ids(value: FieldValue) -> Result<Vec<i64>, FieldValue> {
    match value {
        FieldValue::Empty => Ok(Vec::new()),
        FieldValue::Ids(ids) => Ok(ids),
        other => Err(other),
    }
}
