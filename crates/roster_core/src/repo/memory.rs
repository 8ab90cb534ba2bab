//! In-memory versioned store implementing the repository contracts.
//!
//! # Responsibility
//! - Hold friends, meetings and programming languages in per-kind tables.
//! - Hand out one `MemoryRepository` unit of work per detail session.
//! - Detect stale writes by comparing the version a session loaded with the
//!   version currently stored.
//!
//! # Invariants
//! - Every successful write bumps the row version by one.
//! - Identifiers are never reused within one store.
//! - The store is a single-thread handle (`Rc`); clones share the same data.

use super::{EntityRepository, LookupReadService, RepoError, RepoResult, SaveMode};
use crate::model::friend::Friend;
use crate::model::lookup::{LookupRecord, ProgrammingLanguage};
use crate::model::meeting::Meeting;
use crate::model::{Aggregate, Entity, EntityId, EntityKind};
use log::{debug, info, warn};
use std::cell::RefCell;
use std::collections::{BTreeMap, VecDeque};
use std::rc::Rc;

/// One stored row and its optimistic-concurrency version.
#[derive(Debug, Clone)]
pub struct StoredRow<E> {
    entity: E,
    version: u64,
}

/// Rows of one aggregate kind.
#[derive(Debug)]
pub struct Table<E> {
    rows: BTreeMap<EntityId, StoredRow<E>>,
    next_id: EntityId,
}

impl<E> Default for Table<E> {
    fn default() -> Self {
        Self {
            rows: BTreeMap::new(),
            next_id: 0,
        }
    }
}

/// Everything held by one `MemoryStore`.
#[derive(Debug, Default)]
pub struct StoreState {
    friends: Table<Friend>,
    meetings: Table<Meeting>,
    languages: BTreeMap<EntityId, ProgrammingLanguage>,
    next_child_id: EntityId,
    injected_failures: VecDeque<String>,
}

/// Aggregate kinds the in-memory store can hold.
pub trait StoredAggregate: Aggregate {
    fn table(state: &StoreState) -> &Table<Self>;

    fn table_mut(state: &mut StoreState) -> &mut Table<Self>;

    /// Reason `entity` may not be deleted given the rest of the store.
    fn deletion_blocker(state: &StoreState, entity: &Self) -> Option<String>;
}

impl StoredAggregate for Friend {
    fn table(state: &StoreState) -> &Table<Self> {
        &state.friends
    }

    fn table_mut(state: &mut StoreState) -> &mut Table<Self> {
        &mut state.friends
    }

    fn deletion_blocker(state: &StoreState, entity: &Self) -> Option<String> {
        let in_meeting = state
            .meetings
            .rows
            .values()
            .any(|row| row.entity.participant_ids.contains(&entity.id));
        in_meeting.then(|| {
            format!(
                "{} can't be deleted, as this friend is part of at least one meeting",
                entity.label()
            )
        })
    }
}

impl StoredAggregate for Meeting {
    fn table(state: &StoreState) -> &Table<Self> {
        &state.meetings
    }

    fn table_mut(state: &mut StoreState) -> &mut Table<Self> {
        &mut state.meetings
    }

    fn deletion_blocker(_state: &StoreState, _entity: &Self) -> Option<String> {
        None
    }
}

/// Shared in-memory backing store.
#[derive(Debug, Clone, Default)]
pub struct MemoryStore {
    state: Rc<RefCell<StoreState>>,
}

impl MemoryStore {
    pub fn new() -> Self {
        Self::default()
    }

    /// Stores `entity` directly, keeping a non-zero id or assigning a new one.
    pub fn insert<E: StoredAggregate>(&self, mut entity: E) -> EntityId {
        let mut guard = self.state.borrow_mut();
        let state = &mut *guard;
        assign_child_ids(&mut state.next_child_id, &mut entity);
        let table = E::table_mut(state);
        let id = if entity.is_transient() {
            table.next_id + 1
        } else {
            entity.id()
        };
        table.next_id = table.next_id.max(id);
        entity.set_id(id);
        table.rows.insert(id, StoredRow { entity, version: 1 });
        id
    }

    pub fn insert_language(&self, name: impl Into<String>) -> EntityId {
        let mut state = self.state.borrow_mut();
        let id = state.languages.keys().next_back().map_or(1, |last| last + 1);
        state.languages.insert(
            id,
            ProgrammingLanguage {
                id,
                name: name.into(),
            },
        );
        id
    }

    pub fn get<E: StoredAggregate>(&self, id: EntityId) -> Option<E> {
        let state = self.state.borrow();
        E::table(&state).rows.get(&id).map(|row| row.entity.clone())
    }

    pub fn version<E: StoredAggregate>(&self, id: EntityId) -> Option<u64> {
        let state = self.state.borrow();
        E::table(&state).rows.get(&id).map(|row| row.version)
    }

    pub fn count<E: StoredAggregate>(&self) -> usize {
        E::table(&self.state.borrow()).rows.len()
    }

    /// Makes the next `save` on any repository fail with `Unavailable`.
    pub fn fail_next_save(&self, message: impl Into<String>) {
        self.state
            .borrow_mut()
            .injected_failures
            .push_back(message.into());
    }

    /// Opens a fresh unit of work over this store.
    pub fn repository<E: StoredAggregate>(&self) -> MemoryRepository<E> {
        MemoryRepository {
            store: self.clone(),
            loaded_versions: BTreeMap::new(),
            pending: None,
            _kind: std::marker::PhantomData,
        }
    }
}

impl LookupReadService for MemoryStore {
    async fn list_all(&self, kind: EntityKind) -> RepoResult<Vec<LookupRecord>> {
        let state = self.state.borrow();
        let records = match kind {
            EntityKind::Friend => labels(&state.friends),
            EntityKind::Meeting => labels(&state.meetings),
            EntityKind::ProgrammingLanguage => state
                .languages
                .values()
                .map(|language| LookupRecord::new(language.id, language.name.as_str()))
                .collect(),
        };
        debug!(
            "event=lookup_list module=repo status=ok kind={} count={}",
            kind,
            records.len()
        );
        Ok(records)
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum PendingChange {
    Insert,
    Remove(EntityId),
}

/// Unit of work over one kind, remembering the versions it has read.
#[derive(Debug)]
pub struct MemoryRepository<E: StoredAggregate> {
    store: MemoryStore,
    loaded_versions: BTreeMap<EntityId, u64>,
    pending: Option<PendingChange>,
    _kind: std::marker::PhantomData<E>,
}

impl<E: StoredAggregate> MemoryRepository<E> {
    fn update(
        &mut self,
        state: &mut StoreState,
        entity: &mut E,
        mode: SaveMode,
    ) -> RepoResult<()> {
        let id = entity.id();
        let conflict = RepoError::Conflict { kind: E::KIND, id };
        let stored_version = E::table(state).rows.get(&id).map(|row| row.version);
        match (stored_version, mode) {
            (None, SaveMode::CheckVersion) => return Err(conflict),
            (None, SaveMode::Overwrite) => return Err(RepoError::NotFound { kind: E::KIND, id }),
            (Some(version), SaveMode::CheckVersion)
                if self.loaded_versions.get(&id) != Some(&version) =>
            {
                return Err(conflict);
            }
            _ => {}
        }

        assign_child_ids(&mut state.next_child_id, entity);
        // Re-links new children to their parent.
        entity.set_id(id);

        let row = E::table_mut(state)
            .rows
            .get_mut(&id)
            .ok_or(RepoError::NotFound { kind: E::KIND, id })?;
        row.entity = entity.clone();
        row.version += 1;
        self.loaded_versions.insert(id, row.version);
        Ok(())
    }
}

impl<E: StoredAggregate> EntityRepository<E> for MemoryRepository<E> {
    async fn get_by_id(&mut self, id: EntityId) -> RepoResult<E> {
        let state = self.store.state.borrow();
        let row = E::table(&state)
            .rows
            .get(&id)
            .ok_or(RepoError::NotFound { kind: E::KIND, id })?;
        self.loaded_versions.insert(id, row.version);
        Ok(row.entity.clone())
    }

    fn add(&mut self, entity: &E) {
        if !entity.is_transient() {
            warn!(
                "event=repo_add module=repo status=ignored kind={} id={} reason=already_persisted",
                E::KIND,
                entity.id()
            );
            return;
        }
        self.pending = Some(PendingChange::Insert);
    }

    fn remove(&mut self, id: EntityId) {
        self.pending = Some(PendingChange::Remove(id));
    }

    async fn save(&mut self, entity: &mut E, mode: SaveMode) -> RepoResult<()> {
        let store = self.store.clone();
        let mut guard = store.state.borrow_mut();
        let state = &mut *guard;
        if let Some(message) = state.injected_failures.pop_front() {
            return Err(RepoError::Unavailable(message));
        }

        let pending = self.pending;
        match pending {
            Some(PendingChange::Insert) => {
                assign_child_ids(&mut state.next_child_id, entity);
                let table = E::table_mut(state);
                table.next_id += 1;
                let id = table.next_id;
                entity.set_id(id);
                table.rows.insert(
                    id,
                    StoredRow {
                        entity: entity.clone(),
                        version: 1,
                    },
                );
                self.loaded_versions.insert(id, 1);
                info!(
                    "event=repo_save module=repo status=ok op=insert kind={} id={id}",
                    E::KIND
                );
            }
            Some(PendingChange::Remove(id)) => {
                let existed = E::table_mut(state).rows.remove(&id).is_some();
                self.loaded_versions.remove(&id);
                info!(
                    "event=repo_save module=repo status=ok op=delete kind={} id={id} existed={existed}",
                    E::KIND
                );
            }
            None => {
                self.update(state, entity, mode)?;
                info!(
                    "event=repo_save module=repo status=ok op=update kind={} id={} mode={mode:?}",
                    E::KIND,
                    entity.id()
                );
            }
        }

        self.pending = None;
        Ok(())
    }

    fn has_pending_changes(&self) -> bool {
        self.pending.is_some()
    }

    fn discard_pending(&mut self) {
        if let Some(change) = self.pending.take() {
            debug!(
                "event=repo_discard module=repo kind={} change={change:?}",
                E::KIND
            );
        }
    }

    async fn deletion_blocker(&self, entity: &E) -> RepoResult<Option<String>> {
        Ok(E::deletion_blocker(&self.store.state.borrow(), entity))
    }
}

fn labels<E: Aggregate>(table: &Table<E>) -> Vec<LookupRecord> {
    table
        .rows
        .values()
        .map(|row| LookupRecord::new(row.entity.id(), row.entity.label()))
        .collect()
}

fn assign_child_ids<E: Aggregate>(next_child_id: &mut EntityId, entity: &mut E) {
    // Explicit ids seeded by callers must never be handed out again.
    for child in entity.children() {
        *next_child_id = (*next_child_id).max(child.id());
    }
    for child in entity.children_mut() {
        if child.is_transient() {
            *next_child_id += 1;
            child.set_id(*next_child_id);
        }
    }
}
