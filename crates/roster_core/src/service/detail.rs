//! Detail session controller: load, edit, validate, save and delete.
//!
//! # Responsibility
//! - Own the wrapper of one aggregate plus wrappers of its children.
//! - Drive the `Unloaded → Loading → Loaded → Saving/Deleting` lifecycle.
//! - Gate saving on validity and dirtiness, and surface stale-write
//!   conflicts for an explicit reload/overwrite decision.
//! - Publish saved/deleted notifications for other listeners.
//!
//! # Invariants
//! - At most one save or delete is in flight; re-entry is rejected.
//! - A failed save never accepts changes; a blocked or cancelled delete
//!   never touches the repository.
//! - Derived state is recomputed after every mutation.

use crate::events::{DeletedEvent, Notification, NotificationChannel, SavedEvent};
use crate::model::lookup::LookupRecord;
use crate::model::meeting::{Meeting, PARTICIPANT_IDS};
use crate::model::{Aggregate, Entity, EntityId, EntityKind, TRANSIENT_ID};
use crate::repo::{EntityRepository, LookupReadService, RepoError, SaveMode};
use crate::service::dialog::{DialogResult, DialogService};
use crate::wrapper::field::FieldValue;
use crate::wrapper::{ModelWrapper, WrapperError};
use log::{debug, error, info, warn};
use std::collections::BTreeMap;
use std::error::Error;
use std::fmt::{Display, Formatter};
use std::time::Instant;

const CONFLICT_MESSAGE: &str = "The entity has been changed in the meantime by someone else. \
Click OK to save your changes anyway, click Cancel to reload the entity from the store.";
const NAVIGATE_AWAY_MESSAGE: &str = "You've made changes. Navigate away?";
const QUESTION_TITLE: &str = "Question";

/// Lifecycle state of one detail session.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum DetailState {
    Unloaded,
    Loading,
    Loaded,
    Saving,
    Deleting,
    /// Terminal: the entity was deleted and the session should be dropped.
    Deleted,
}

impl Display for DetailState {
    fn fmt(&self, f: &mut Formatter<'_>) -> std::fmt::Result {
        let name = match self {
            Self::Unloaded => "unloaded",
            Self::Loading => "loading",
            Self::Loaded => "loaded",
            Self::Saving => "saving",
            Self::Deleting => "deleting",
            Self::Deleted => "deleted",
        };
        f.write_str(name)
    }
}

/// Command-enablement snapshot returned after each mutation.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub struct DerivedState {
    pub can_save: bool,
    pub has_changes: bool,
    pub has_errors: bool,
}

/// User decision after a save hit a stale-write conflict.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ConflictResolution {
    /// Drop local edits and load the stored record again.
    Reload,
    /// Save local values over the stored record, without merging.
    Overwrite,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum DeleteOutcome {
    Deleted,
    /// Another record refers to the entity; nothing was deleted.
    Blocked(String),
    /// The user declined the confirmation.
    Cancelled,
}

/// Failure of a detail session operation.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum DetailError {
    InvalidState {
        operation: &'static str,
        state: DetailState,
    },
    NotLoaded,
    /// Save requested while the session is invalid or unchanged.
    CannotSave,
    NotFound {
        kind: EntityKind,
        id: EntityId,
    },
    /// The stored record changed since load; local edits are kept.
    Conflict {
        kind: EntityKind,
        id: EntityId,
    },
    NoPendingConflict,
    NotPersisted(EntityKind),
    ChildrenNotSupported(EntityKind),
    ChildIndexOutOfRange(usize),
    /// The id is not offered by the session's picker of `kind`.
    NotInPicker {
        kind: EntityKind,
        id: EntityId,
    },
    Field(WrapperError),
    /// Any other storage failure; the operation can be retried unchanged.
    Repository(RepoError),
}

impl Display for DetailError {
    fn fmt(&self, f: &mut Formatter<'_>) -> std::fmt::Result {
        match self {
            Self::InvalidState { operation, state } => {
                write!(f, "cannot {operation} while the detail is {state}")
            }
            Self::NotLoaded => write!(f, "no entity is loaded"),
            Self::CannotSave => write!(f, "nothing valid to save"),
            Self::NotFound { kind, id } => write!(f, "{kind} not found: {id}"),
            Self::Conflict { kind, id } => {
                write!(f, "{kind} {id} was changed by someone else in the meantime")
            }
            Self::NoPendingConflict => write!(f, "there is no conflict to resolve"),
            Self::NotPersisted(kind) => write!(f, "{kind} has not been saved yet"),
            Self::ChildrenNotSupported(kind) => write!(f, "{kind} has no child collection"),
            Self::ChildIndexOutOfRange(index) => write!(f, "no child at index {index}"),
            Self::NotInPicker { kind, id } => write!(f, "{kind} {id} is not available here"),
            Self::Field(err) => write!(f, "{err}"),
            Self::Repository(err) => write!(f, "{err}"),
        }
    }
}

impl Error for DetailError {
    fn source(&self) -> Option<&(dyn Error + 'static)> {
        match self {
            Self::Field(err) => Some(err),
            Self::Repository(err) => Some(err),
            _ => None,
        }
    }
}

impl From<WrapperError> for DetailError {
    fn from(value: WrapperError) -> Self {
        Self::Field(value)
    }
}

impl From<RepoError> for DetailError {
    fn from(value: RepoError) -> Self {
        match value {
            RepoError::NotFound { kind, id } => Self::NotFound { kind, id },
            RepoError::Conflict { kind, id } => Self::Conflict { kind, id },
            other => Self::Repository(other),
        }
    }
}

/// Controller for one detail session of aggregate kind `E`.
pub struct DetailController<E, R, L, D>
where
    E: Aggregate,
{
    repository: R,
    lookups: L,
    dialog: D,
    channel: NotificationChannel,
    state: DetailState,
    wrapper: Option<ModelWrapper<E>>,
    children: Vec<ModelWrapper<E::Child>>,
    loaded_child_ids: Vec<EntityId>,
    selected_child: Option<usize>,
    pickers: BTreeMap<EntityKind, Vec<LookupRecord>>,
    title: String,
    id: EntityId,
    conflict: bool,
}

impl<E, R, L, D> DetailController<E, R, L, D>
where
    E: Aggregate,
    R: EntityRepository<E>,
    L: LookupReadService,
    D: DialogService,
{
    pub fn new(repository: R, lookups: L, dialog: D, channel: NotificationChannel) -> Self {
        Self {
            repository,
            lookups,
            dialog,
            channel,
            state: DetailState::Unloaded,
            wrapper: None,
            children: Vec::new(),
            loaded_child_ids: Vec::new(),
            selected_child: None,
            pickers: BTreeMap::new(),
            title: String::new(),
            id: TRANSIENT_ID,
            conflict: false,
        }
    }

    /// Loads an existing entity, or starts a new one for `None`/`0`.
    ///
    /// # Errors
    /// - `NotFound` when `id` does not exist; the previous session stays.
    /// - `InvalidState` while a save or delete is in flight.
    pub async fn load(&mut self, id: Option<EntityId>) -> Result<DerivedState, DetailError> {
        self.ensure_state("load", &[DetailState::Unloaded, DetailState::Loaded])?;
        let previous = self.state;
        self.state = DetailState::Loading;

        match self.fetch(id).await {
            Ok((entity, pickers)) => {
                let created = entity.is_transient();
                self.pickers = pickers;
                self.install(entity);
                self.state = DetailState::Loaded;
                if created {
                    self.trigger_create_validation();
                }
                info!(
                    "event=detail_load module=detail status=ok kind={} id={} created={created}",
                    E::KIND,
                    self.id
                );
                Ok(self.recompute_derived_state())
            }
            Err(err) => {
                self.state = previous;
                warn!(
                    "event=detail_load module=detail status=error kind={} requested_id={:?} error={err}",
                    E::KIND,
                    id
                );
                Err(err)
            }
        }
    }

    /// Runs the rules of the kind's create-time fields so a blank new entity
    /// shows its required-field errors before anything is typed.
    pub fn trigger_create_validation(&mut self) -> DerivedState {
        if let Some(wrapper) = self.wrapper.as_mut() {
            for field in E::create_validation_fields() {
                if let Err(err) = wrapper.revalidate(field) {
                    warn!(
                        "event=create_validation module=detail status=error kind={} error={err}",
                        E::KIND
                    );
                }
            }
        }
        self.recompute_derived_state()
    }

    /// Writes one field of the primary entity.
    pub fn set_field(
        &mut self,
        field: &str,
        value: impl Into<FieldValue>,
    ) -> Result<DerivedState, DetailError> {
        self.ensure_state("edit", &[DetailState::Loaded])?;
        let wrapper = self.wrapper.as_mut().ok_or(DetailError::NotLoaded)?;
        let events = wrapper.set(field, value)?;
        if !events.is_empty() {
            self.title = wrapper.model().label();
            debug!(
                "event=detail_edit module=detail kind={} field={field} events={}",
                E::KIND,
                events.len()
            );
        }
        Ok(self.recompute_derived_state())
    }

    /// Writes one field of the child at `index`.
    pub fn set_child_field(
        &mut self,
        index: usize,
        field: &str,
        value: impl Into<FieldValue>,
    ) -> Result<DerivedState, DetailError> {
        self.ensure_state("edit", &[DetailState::Loaded])?;
        let child = self
            .children
            .get_mut(index)
            .ok_or(DetailError::ChildIndexOutOfRange(index))?;
        child.set(field, value)?;
        Ok(self.recompute_derived_state())
    }

    /// Appends a blank, already-validated child.
    ///
    /// Returns the new child's index with the recomputed derived state.
    pub fn add_child(&mut self) -> Result<(usize, DerivedState), DetailError> {
        self.ensure_state("add a child", &[DetailState::Loaded])?;
        let wrapper = self.wrapper.as_ref().ok_or(DetailError::NotLoaded)?;
        let child = wrapper
            .model()
            .new_child()
            .ok_or(DetailError::ChildrenNotSupported(E::KIND))?;

        let mut child = ModelWrapper::new(child);
        for field in <E::Child as Entity>::create_validation_fields() {
            child.revalidate(field)?;
        }
        self.children.push(child);
        Ok((self.children.len() - 1, self.recompute_derived_state()))
    }

    /// Detaches the child at `index` and clears the selection.
    pub fn remove_child(&mut self, index: usize) -> Result<DerivedState, DetailError> {
        self.ensure_state("remove a child", &[DetailState::Loaded])?;
        if index >= self.children.len() {
            return Err(DetailError::ChildIndexOutOfRange(index));
        }
        self.children.remove(index);
        self.selected_child = None;
        Ok(self.recompute_derived_state())
    }

    pub fn select_child(&mut self, index: Option<usize>) -> Result<(), DetailError> {
        self.ensure_state("select a child", &[DetailState::Loaded])?;
        if let Some(index) = index {
            if index >= self.children.len() {
                return Err(DetailError::ChildIndexOutOfRange(index));
            }
        }
        self.selected_child = index;
        Ok(())
    }

    pub fn remove_selected_child(&mut self) -> Result<DerivedState, DetailError> {
        match self.selected_child {
            Some(index) => self.remove_child(index),
            None => Ok(self.recompute_derived_state()),
        }
    }

    /// Saves the session, checking the stored version.
    ///
    /// # Errors
    /// - `CannotSave` unless `can_save()` holds.
    /// - `Conflict` when the record changed since load; edits are kept and
    ///   `resolve_conflict` decides what happens next.
    /// - `Repository` for any other storage failure; safe to retry.
    pub async fn save(&mut self) -> Result<EntityId, DetailError> {
        self.save_with_mode(SaveMode::CheckVersion).await
    }

    /// Applies the user's decision about a pending conflict.
    pub async fn resolve_conflict(
        &mut self,
        resolution: ConflictResolution,
    ) -> Result<DerivedState, DetailError> {
        if !self.conflict {
            return Err(DetailError::NoPendingConflict);
        }
        info!(
            "event=detail_conflict_resolve module=detail kind={} id={} resolution={resolution:?}",
            E::KIND,
            self.id
        );

        match resolution {
            ConflictResolution::Reload => {
                if let Some(wrapper) = self.wrapper.as_mut() {
                    wrapper.discard_changes();
                }
                for child in &mut self.children {
                    child.discard_changes();
                }
                let id = self.id;
                self.load(Some(id)).await
            }
            ConflictResolution::Overwrite => {
                self.save_with_mode(SaveMode::Overwrite).await?;
                Ok(self.recompute_derived_state())
            }
        }
    }

    /// Saves and, on conflict, asks the dialog whether to overwrite (OK) or
    /// reload (Cancel).
    pub async fn save_or_resolve(&mut self) -> Result<DerivedState, DetailError> {
        match self.save().await {
            Ok(_) => Ok(self.recompute_derived_state()),
            Err(DetailError::Conflict { .. }) => {
                let answer = self.dialog.confirm(CONFLICT_MESSAGE, QUESTION_TITLE).await;
                let resolution = match answer {
                    DialogResult::Ok => ConflictResolution::Overwrite,
                    DialogResult::Cancel => ConflictResolution::Reload,
                };
                self.resolve_conflict(resolution).await
            }
            Err(err) => Err(err),
        }
    }

    /// Deletes the loaded entity after the guard query and a confirmation.
    ///
    /// On `DeleteOutcome::Deleted` the session is terminal.
    pub async fn delete(&mut self) -> Result<DeleteOutcome, DetailError> {
        self.ensure_state("delete", &[DetailState::Loaded])?;
        let mut entity = self.snapshot_entity()?;
        if entity.is_transient() {
            return Err(DetailError::NotPersisted(E::KIND));
        }

        self.state = DetailState::Deleting;
        let outcome = self.delete_confirmed(&mut entity).await;
        self.state = match outcome {
            Ok(DeleteOutcome::Deleted) => DetailState::Deleted,
            _ => DetailState::Loaded,
        };

        // A failed flush must not leave the removal queued for the next save.
        if outcome.is_err() && self.repository.has_pending_changes() {
            self.repository.discard_pending();
        }

        match &outcome {
            Ok(DeleteOutcome::Deleted) => {
                self.channel.publish(Notification::Deleted(DeletedEvent {
                    id: entity.id(),
                    kind: E::KIND,
                }));
                info!(
                    "event=detail_delete module=detail status=ok kind={} id={}",
                    E::KIND,
                    entity.id()
                );
            }
            Ok(other) => info!(
                "event=detail_delete module=detail status=skipped kind={} id={} outcome={other:?}",
                E::KIND,
                entity.id()
            ),
            Err(err) => error!(
                "event=detail_delete module=detail status=error kind={} id={} error={err}",
                E::KIND,
                entity.id()
            ),
        }
        outcome
    }

    /// Asks before a session with unsaved changes is discarded.
    ///
    /// Returns `true` when the caller may navigate away.
    pub async fn confirm_navigation(&self) -> bool {
        if !self.has_changes() {
            return true;
        }
        self.dialog.confirm(NAVIGATE_AWAY_MESSAGE, QUESTION_TITLE).await == DialogResult::Ok
    }

    /// Recomputes `{can_save, has_changes, has_errors}` from current state.
    pub fn recompute_derived_state(&self) -> DerivedState {
        let Some(wrapper) = self.wrapper.as_ref() else {
            return DerivedState::default();
        };
        let has_changes = wrapper.has_changes()
            || self.children.iter().any(ModelWrapper::has_changes)
            || self.children_structurally_changed();
        let has_errors = wrapper.has_errors() || self.children.iter().any(ModelWrapper::has_errors);
        DerivedState {
            can_save: self.state == DetailState::Loaded && has_changes && !has_errors,
            has_changes,
            has_errors,
        }
    }

    pub fn can_save(&self) -> bool {
        self.recompute_derived_state().can_save
    }

    pub fn has_changes(&self) -> bool {
        self.recompute_derived_state().has_changes
    }

    pub fn has_errors(&self) -> bool {
        self.recompute_derived_state().has_errors
    }

    pub fn has_conflict(&self) -> bool {
        self.conflict
    }

    pub fn state(&self) -> DetailState {
        self.state
    }

    pub fn id(&self) -> EntityId {
        self.id
    }

    pub fn title(&self) -> &str {
        &self.title
    }

    pub fn wrapper(&self) -> Option<&ModelWrapper<E>> {
        self.wrapper.as_ref()
    }

    pub fn children(&self) -> &[ModelWrapper<E::Child>] {
        &self.children
    }

    pub fn selected_child(&self) -> Option<usize> {
        self.selected_child
    }

    /// Lookup entries loaded for a picker of `kind`.
    pub fn picker(&self, kind: EntityKind) -> &[LookupRecord] {
        self.pickers.get(&kind).map(Vec::as_slice).unwrap_or(&[])
    }

    pub fn repository(&self) -> &R {
        &self.repository
    }

    async fn fetch(
        &mut self,
        id: Option<EntityId>,
    ) -> Result<(E, BTreeMap<EntityKind, Vec<LookupRecord>>), DetailError> {
        let mut pickers = BTreeMap::new();
        for kind in E::picker_kinds() {
            pickers.insert(*kind, self.lookups.list_all(*kind).await?);
        }

        let entity = match id.filter(|id| *id != TRANSIENT_ID) {
            Some(id) => {
                let entity = self.repository.get_by_id(id).await?;
                // Drops an insert registered by an earlier "new" session.
                self.repository.discard_pending();
                entity
            }
            None => {
                let entity = E::new_transient();
                self.repository.add(&entity);
                entity
            }
        };
        Ok((entity, pickers))
    }

    fn install(&mut self, entity: E) {
        self.children = entity
            .children()
            .iter()
            .cloned()
            .map(ModelWrapper::new)
            .collect();
        self.loaded_child_ids = persisted_ids(&self.children);
        self.selected_child = None;
        self.id = entity.id();
        self.title = entity.label();
        self.conflict = false;
        self.wrapper = Some(ModelWrapper::new(entity));
    }

    async fn save_with_mode(&mut self, mode: SaveMode) -> Result<EntityId, DetailError> {
        self.ensure_state("save", &[DetailState::Loaded])?;
        if !self.can_save() {
            return Err(DetailError::CannotSave);
        }
        let mut entity = self.snapshot_entity()?;
        let started_at = Instant::now();

        self.state = DetailState::Saving;
        let result = self.repository.save(&mut entity, mode).await;
        self.state = DetailState::Loaded;

        match result {
            Ok(()) => {
                self.commit(&entity);
                info!(
                    "event=detail_save module=detail status=ok kind={} id={} mode={mode:?} duration_ms={}",
                    E::KIND,
                    self.id,
                    started_at.elapsed().as_millis()
                );
                self.channel.publish(Notification::Saved(SavedEvent {
                    id: self.id,
                    label: self.title.clone(),
                    kind: E::KIND,
                }));
                Ok(self.id)
            }
            Err(err) => {
                let err = DetailError::from(err);
                if matches!(err, DetailError::Conflict { .. }) {
                    self.conflict = true;
                    warn!(
                        "event=detail_save module=detail status=conflict kind={} id={}",
                        E::KIND,
                        self.id
                    );
                } else {
                    error!(
                        "event=detail_save module=detail status=error kind={} id={} error={err}",
                        E::KIND,
                        self.id
                    );
                }
                Err(err)
            }
        }
    }

    /// Adopts store-assigned ids and makes the saved values the new baseline.
    fn commit(&mut self, saved: &E) {
        if let Some(wrapper) = self.wrapper.as_mut() {
            wrapper.assign_id(saved.id());
            wrapper.accept_changes();
            self.title = wrapper.model().label();
        }
        for (child, stored) in self.children.iter_mut().zip(saved.children()) {
            child.assign_id(stored.id());
            child.accept_changes();
        }
        self.loaded_child_ids = persisted_ids(&self.children);
        self.id = saved.id();
        self.conflict = false;
    }

    async fn delete_confirmed(&mut self, entity: &mut E) -> Result<DeleteOutcome, DetailError> {
        if let Some(reason) = self.repository.deletion_blocker(entity).await? {
            self.dialog.info(&reason).await;
            return Ok(DeleteOutcome::Blocked(reason));
        }

        let message = format!(
            "Do you really want to delete the {} {}?",
            E::KIND.as_str().to_lowercase(),
            self.title
        );
        if self.dialog.confirm(&message, QUESTION_TITLE).await == DialogResult::Cancel {
            return Ok(DeleteOutcome::Cancelled);
        }

        self.repository.remove(entity.id());
        self.repository.save(entity, SaveMode::CheckVersion).await?;
        Ok(DeleteOutcome::Deleted)
    }

    /// Primary model with the session's current children attached.
    fn snapshot_entity(&self) -> Result<E, DetailError> {
        let wrapper = self.wrapper.as_ref().ok_or(DetailError::NotLoaded)?;
        let mut entity = wrapper.model().clone();
        entity.set_children(
            self.children
                .iter()
                .map(|child| child.model().clone())
                .collect(),
        );
        Ok(entity)
    }

    fn children_structurally_changed(&self) -> bool {
        self.children
            .iter()
            .any(|child| child.model().is_transient())
            || persisted_ids(&self.children) != self.loaded_child_ids
    }

    fn ensure_state(
        &self,
        operation: &'static str,
        allowed: &[DetailState],
    ) -> Result<(), DetailError> {
        if allowed.contains(&self.state) {
            Ok(())
        } else {
            Err(DetailError::InvalidState {
                operation,
                state: self.state,
            })
        }
    }
}

fn persisted_ids<C: Entity>(children: &[ModelWrapper<C>]) -> Vec<EntityId> {
    children
        .iter()
        .map(ModelWrapper::id)
        .filter(|id| *id != TRANSIENT_ID)
        .collect()
}

impl<R, L, D> DetailController<Meeting, R, L, D>
where
    R: EntityRepository<Meeting>,
    L: LookupReadService,
    D: DialogService,
{
    /// Adds a friend offered by the friend picker to the participants.
    ///
    /// Adding a friend who already takes part is a no-op.
    pub fn add_participant(&mut self, friend_id: EntityId) -> Result<DerivedState, DetailError> {
        self.ensure_state("edit", &[DetailState::Loaded])?;
        if !self
            .picker(EntityKind::Friend)
            .iter()
            .any(|record| record.id == friend_id)
        {
            return Err(DetailError::NotInPicker {
                kind: EntityKind::Friend,
                id: friend_id,
            });
        }
        let mut ids = self.participant_ids()?;
        if !ids.contains(&friend_id) {
            ids.push(friend_id);
        }
        self.set_field(PARTICIPANT_IDS, ids)
    }

    pub fn remove_participant(&mut self, friend_id: EntityId) -> Result<DerivedState, DetailError> {
        self.ensure_state("edit", &[DetailState::Loaded])?;
        let mut ids = self.participant_ids()?;
        ids.retain(|id| *id != friend_id);
        self.set_field(PARTICIPANT_IDS, ids)
    }

    /// Picker entries for friends not yet taking part.
    pub fn available_participants(&self) -> Vec<LookupRecord> {
        let taking_part = self.participant_ids().unwrap_or_default();
        self.picker(EntityKind::Friend)
            .iter()
            .filter(|record| !taking_part.contains(&record.id))
            .cloned()
            .collect()
    }

    fn participant_ids(&self) -> Result<Vec<EntityId>, DetailError> {
        let wrapper = self.wrapper.as_ref().ok_or(DetailError::NotLoaded)?;
        Ok(wrapper.model().participant_ids.clone())
    }
}
