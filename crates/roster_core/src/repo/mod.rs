//! Persistence collaborator contracts and the in-memory reference store.
//!
//! # Responsibility
//! - Define what detail sessions need from storage: fetch, register, remove,
//!   save with optimistic concurrency, and delete guards.
//! - Keep storage mechanics behind these traits.
//!
//! # Invariants
//! - A stale write is reported as `RepoError::Conflict`, never applied,
//!   unless the caller asked for `SaveMode::Overwrite`.
//! - Failed saves leave stored data untouched.

pub mod memory;

use crate::model::lookup::LookupRecord;
use crate::model::{Aggregate, EntityId, EntityKind};
use std::error::Error;
use std::fmt::{Display, Formatter};

pub type RepoResult<T> = Result<T, RepoError>;

/// Error reported by persistence collaborators.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum RepoError {
    NotFound { kind: EntityKind, id: EntityId },
    /// The stored record changed or disappeared since it was loaded.
    Conflict { kind: EntityKind, id: EntityId },
    /// Storage could not complete the call; retrying may succeed.
    Unavailable(String),
    InvalidData(String),
}

impl Display for RepoError {
    fn fmt(&self, f: &mut Formatter<'_>) -> std::fmt::Result {
        match self {
            Self::NotFound { kind, id } => write!(f, "{kind} not found: {id}"),
            Self::Conflict { kind, id } => {
                write!(f, "{kind} {id} was changed or removed since it was loaded")
            }
            Self::Unavailable(message) => write!(f, "storage unavailable: {message}"),
            Self::InvalidData(message) => write!(f, "invalid stored data: {message}"),
        }
    }
}

impl Error for RepoError {}

/// How `save` treats version checks.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum SaveMode {
    /// Reject the write when the record changed since it was loaded.
    #[default]
    CheckVersion,
    /// Write local values over whatever is stored.
    Overwrite,
}

/// Unit-of-work over one entity kind, owned by a single detail session.
#[allow(async_fn_in_trait)]
pub trait EntityRepository<E: Aggregate> {
    /// Fetches one entity and remembers the version it was read at.
    async fn get_by_id(&mut self, id: EntityId) -> RepoResult<E>;

    /// Registers a transient entity so the next `save` inserts it.
    fn add(&mut self, entity: &E);

    /// Registers a stored entity so the next `save` deletes it.
    fn remove(&mut self, id: EntityId);

    /// Flushes the pending insert, update or delete of `entity`.
    ///
    /// Inserts assign identifiers to `entity` and to its new children.
    async fn save(&mut self, entity: &mut E, mode: SaveMode) -> RepoResult<()>;

    /// Whether an insert or delete is registered but not yet saved.
    fn has_pending_changes(&self) -> bool;

    /// Drops a registered insert or delete without touching storage.
    fn discard_pending(&mut self);

    /// Reason the entity may not be deleted, if another record refers to it.
    async fn deletion_blocker(&self, entity: &E) -> RepoResult<Option<String>>;
}

/// Read-only `{id, label}` listings for pickers and navigation.
#[allow(async_fn_in_trait)]
pub trait LookupReadService {
    async fn list_all(&self, kind: EntityKind) -> RepoResult<Vec<LookupRecord>>;
}
