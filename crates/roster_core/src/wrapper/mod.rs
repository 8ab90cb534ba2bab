//! Change-tracking and validation wrapper around one entity.
//!
//! # Responsibility
//! - Read and write entity fields by name through the kind's field table.
//! - Remember the last committed value of every edited field.
//! - Keep per-field validation errors current after each write.
//!
//! # Invariants
//! - An original value is recorded only on the first effective write of a
//!   field, never eagerly at construction.
//! - `has_changes()` and `has_errors()` are derived on every read.
//! - A rejected write leaves the model, originals and errors untouched.

pub mod field;

use crate::model::{Entity, EntityId};
use crate::validation::validate;
use field::{FieldDescriptor, FieldValue};
use std::collections::BTreeMap;
use std::error::Error;
use std::fmt::{Display, Formatter};

/// Notification produced by a wrapper mutation.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum WrapperEvent {
    FieldChanged(&'static str),
    /// The field's error list switched between empty and non-empty.
    ErrorsChanged(&'static str),
}

/// Rejected wrapper access.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum WrapperError {
    UnknownField(String),
    TypeMismatch {
        field: &'static str,
        value: FieldValue,
    },
}

impl Display for WrapperError {
    fn fmt(&self, f: &mut Formatter<'_>) -> std::fmt::Result {
        match self {
            Self::UnknownField(field) => write!(f, "unknown field: `{field}`"),
            Self::TypeMismatch { field, value } => {
                write!(f, "value {value:?} does not fit field `{field}`")
            }
        }
    }
}

impl Error for WrapperError {}

/// Stateful adapter adding dirty tracking and validation to an entity.
#[derive(Debug, Clone)]
pub struct ModelWrapper<E: Entity> {
    model: E,
    original_values: BTreeMap<&'static str, FieldValue>,
    errors: BTreeMap<&'static str, Vec<String>>,
}

impl<E: Entity> ModelWrapper<E> {
    /// Wraps `model` without running any validation.
    pub fn new(model: E) -> Self {
        Self {
            model,
            original_values: BTreeMap::new(),
            errors: BTreeMap::new(),
        }
    }

    pub fn model(&self) -> &E {
        &self.model
    }

    pub fn into_model(self) -> E {
        self.model
    }

    pub fn id(&self) -> EntityId {
        self.model.id()
    }

    /// Adopts a store-assigned identifier. Identifiers are not tracked fields.
    pub fn assign_id(&mut self, id: EntityId) {
        self.model.set_id(id);
    }

    /// Returns the current value of `field`.
    pub fn get(&self, field: &str) -> Result<FieldValue, WrapperError> {
        let descriptor = descriptor::<E>(field)?;
        Ok((descriptor.get)(&self.model))
    }

    /// Writes `value` into `field`.
    ///
    /// Returns the emitted notifications; an empty list means the write was a
    /// no-op because the field already held an equal value.
    ///
    /// # Errors
    /// - `UnknownField` when `field` is not declared for the kind.
    /// - `TypeMismatch` when `value` cannot be stored in `field`.
    pub fn set(
        &mut self,
        field: &str,
        value: impl Into<FieldValue>,
    ) -> Result<Vec<WrapperEvent>, WrapperError> {
        let descriptor = descriptor::<E>(field)?;
        let previous = (descriptor.get)(&self.model);
        (descriptor.set)(&mut self.model, value.into()).map_err(|value| {
            WrapperError::TypeMismatch {
                field: descriptor.name,
                value,
            }
        })?;
        if (descriptor.get)(&self.model) == previous {
            return Ok(Vec::new());
        }

        self.original_values.entry(descriptor.name).or_insert(previous);

        let mut events = vec![WrapperEvent::FieldChanged(descriptor.name)];
        events.extend(self.apply_validation(descriptor));
        Ok(events)
    }

    /// Re-runs the rules of `field` without writing to it.
    pub fn revalidate(&mut self, field: &str) -> Result<Option<WrapperEvent>, WrapperError> {
        let descriptor = descriptor::<E>(field)?;
        Ok(self.apply_validation(descriptor))
    }

    /// Re-runs the rules of every declared field.
    pub fn validate_all(&mut self) -> Vec<WrapperEvent> {
        E::fields()
            .iter()
            .filter_map(|descriptor| self.apply_validation(descriptor))
            .collect()
    }

    /// Commits the current values as the new baseline.
    pub fn accept_changes(&mut self) {
        self.original_values.clear();
    }

    /// Restores every edited field to its baseline and re-validates.
    pub fn discard_changes(&mut self) -> Vec<WrapperEvent> {
        let originals = std::mem::take(&mut self.original_values);
        let mut events = Vec::with_capacity(originals.len());
        for (name, value) in originals {
            if let Some(descriptor) = E::fields().iter().find(|d| d.name == name) {
                // Originals were read through the same getter, so they always fit.
                if (descriptor.set)(&mut self.model, value).is_ok() {
                    events.push(WrapperEvent::FieldChanged(name));
                }
            }
        }
        events.extend(self.validate_all());
        events
    }

    /// Baseline value of `field`, present only once the field was edited.
    pub fn original_value(&self, field: &str) -> Option<&FieldValue> {
        self.original_values.get(field)
    }

    pub fn is_field_changed(&self, field: &str) -> bool {
        match (self.original_values.get(field), self.get(field)) {
            (Some(original), Ok(current)) => *original != current,
            _ => false,
        }
    }

    pub fn has_changes(&self) -> bool {
        self.original_values.keys().any(|name| self.is_field_changed(name))
    }

    pub fn errors(&self, field: &str) -> &[String] {
        self.errors.get(field).map(Vec::as_slice).unwrap_or(&[])
    }

    /// Fields with at least one error, paired with their messages.
    pub fn all_errors(&self) -> impl Iterator<Item = (&'static str, &[String])> + '_ {
        self.errors
            .iter()
            .filter(|(_, messages)| !messages.is_empty())
            .map(|(name, messages)| (*name, messages.as_slice()))
    }

    pub fn has_errors(&self) -> bool {
        self.errors.values().any(|messages| !messages.is_empty())
    }

    fn apply_validation(&mut self, descriptor: &FieldDescriptor<E>) -> Option<WrapperEvent> {
        let value = (descriptor.get)(&self.model);
        let messages = validate(&descriptor.rules, &value);
        let had_errors = !self.errors(descriptor.name).is_empty();
        let has_errors = !messages.is_empty();

        if has_errors {
            self.errors.insert(descriptor.name, messages);
        } else {
            self.errors.remove(descriptor.name);
        }

        (had_errors != has_errors).then_some(WrapperEvent::ErrorsChanged(descriptor.name))
    }
}

fn descriptor<E: Entity>(field: &str) -> Result<&'static FieldDescriptor<E>, WrapperError> {
    E::fields()
        .iter()
        .find(|descriptor| descriptor.name == field)
        .ok_or_else(|| WrapperError::UnknownField(field.to_string()))
}
