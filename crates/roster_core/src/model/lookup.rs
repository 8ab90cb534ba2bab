//! Read-only lookup records and navigation items.

use super::{EntityId, EntityKind};
use serde::{Deserialize, Serialize};

/// `{id, label}` pair served by the lookup read service.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct LookupRecord {
    pub id: EntityId,
    pub label: String,
}

impl LookupRecord {
    pub fn new(id: EntityId, label: impl Into<String>) -> Self {
        Self {
            id,
            label: label.into(),
        }
    }
}

/// Navigation list entry. `(id, kind)` is unique within one list.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct LookupItem {
    pub id: EntityId,
    pub label: String,
    pub kind: EntityKind,
}

impl LookupItem {
    pub fn from_record(record: LookupRecord, kind: EntityKind) -> Self {
        Self {
            id: record.id,
            label: record.label,
            kind,
        }
    }

    pub fn matches(&self, id: EntityId, kind: EntityKind) -> bool {
        self.id == id && self.kind == kind
    }
}

/// Read-only language entry offered in the friend detail picker.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ProgrammingLanguage {
    pub id: EntityId,
    pub name: String,
}
