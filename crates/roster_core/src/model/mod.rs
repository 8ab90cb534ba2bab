//! Domain records edited through detail sessions.
//!
//! # Responsibility
//! - Define the plain entity records owned by the persistence collaborator.
//! - Declare the per-kind field tables used by `ModelWrapper`.
//!
//! # Invariants
//! - `EntityId` value `0` means "not yet persisted".
//! - Every editable field is declared exactly once in its kind's table.

pub mod friend;
pub mod lookup;
pub mod meeting;

use crate::wrapper::field::FieldDescriptor;
use serde::{Deserialize, Serialize};
use std::fmt::{Debug, Display, Formatter};

/// Numeric store identifier. `0` marks a transient entity.
pub type EntityId = i64;

/// Identifier value carried by entities that were never saved.
pub const TRANSIENT_ID: EntityId = 0;

/// Kinds of records that share one navigation list.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
pub enum EntityKind {
    Friend,
    Meeting,
    ProgrammingLanguage,
}

impl EntityKind {
    pub fn as_str(self) -> &'static str {
        match self {
            Self::Friend => "Friend",
            Self::Meeting => "Meeting",
            Self::ProgrammingLanguage => "ProgrammingLanguage",
        }
    }
}

impl Display for EntityKind {
    fn fmt(&self, f: &mut Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.as_str())
    }
}

/// A plain record whose fields can be read and written by name.
pub trait Entity: Clone + Debug + 'static {
    fn id(&self) -> EntityId;

    /// Adopts an identifier assigned by the store.
    fn set_id(&mut self, id: EntityId);

    /// Field table for this kind, built once per process.
    fn fields() -> &'static [FieldDescriptor<Self>];

    /// Fields validated as soon as a transient instance enters an edit
    /// session, so required-field errors show before the first keystroke.
    fn create_validation_fields() -> &'static [&'static str] {
        &[]
    }

    fn is_transient(&self) -> bool {
        self.id() == TRANSIENT_ID
    }
}

/// Top-level entity edited by a detail session, optionally owning children.
pub trait Aggregate: Entity {
    const KIND: EntityKind;

    type Child: Entity;

    /// Creates the blank instance registered by a "new" session.
    fn new_transient() -> Self;

    /// Display label used for titles and lookup items.
    fn label(&self) -> String;

    fn children(&self) -> &[Self::Child];

    fn children_mut(&mut self) -> &mut [Self::Child];

    /// Replaces the child collection with the session's current children.
    fn set_children(&mut self, children: Vec<Self::Child>);

    /// Blank child for `add_child`; `None` when the kind has no children.
    fn new_child(&self) -> Option<Self::Child> {
        None
    }

    /// Read-only lookup lists a detail of this kind shows in pickers.
    fn picker_kinds() -> &'static [EntityKind] {
        &[]
    }
}

/// Child type for aggregates without a child collection.
#[derive(Debug, Clone)]
pub enum NoChildren {}

impl Entity for NoChildren {
    fn id(&self) -> EntityId {
        match *self {}
    }

    fn set_id(&mut self, _id: EntityId) {
        match *self {}
    }

    fn fields() -> &'static [FieldDescriptor<Self>] {
        static NO_FIELDS: [FieldDescriptor<NoChildren>; 0] = [];
        &NO_FIELDS
    }
}
