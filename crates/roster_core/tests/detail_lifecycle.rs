use roster_core::model::friend::{FIRST_NAME, PHONE_NUMBER};
use roster_core::model::meeting::TITLE;
use roster_core::model::EntityId;
use roster_core::{
    ConflictResolution, DeleteOutcome, DetailController, DetailError, DetailState, DialogResult,
    DialogService, EntityKind, EntityRepository, Friend, FriendPhoneNumber, LookupSync, Meeting,
    MemoryRepository, MemoryStore, NotificationChannel, RepoError,
};
use std::cell::RefCell;
use std::collections::VecDeque;
use std::rc::Rc;

type FriendDetail = DetailController<Friend, MemoryRepository<Friend>, MemoryStore, ScriptedDialog>;
type MeetingDetail =
    DetailController<Meeting, MemoryRepository<Meeting>, MemoryStore, ScriptedDialog>;

const ANN: i64 = 7;

/// Dialog double answering from a script and recording every prompt.
#[derive(Clone, Default)]
struct ScriptedDialog {
    answers: Rc<RefCell<VecDeque<DialogResult>>>,
    confirms: Rc<RefCell<Vec<String>>>,
    infos: Rc<RefCell<Vec<String>>>,
}

impl ScriptedDialog {
    fn answering(answers: &[DialogResult]) -> Self {
        let dialog = Self::default();
        dialog.answers.borrow_mut().extend(answers.iter().copied());
        dialog
    }

    fn confirms(&self) -> Vec<String> {
        self.confirms.borrow().clone()
    }

    fn infos(&self) -> Vec<String> {
        self.infos.borrow().clone()
    }
}

impl DialogService for ScriptedDialog {
    async fn confirm(&self, message: &str, _title: &str) -> DialogResult {
        self.confirms.borrow_mut().push(message.to_string());
        self.answers
            .borrow_mut()
            .pop_front()
            .unwrap_or(DialogResult::Cancel)
    }

    async fn info(&self, message: &str) {
        self.infos.borrow_mut().push(message.to_string());
    }
}

fn seeded_store() -> MemoryStore {
    let store = MemoryStore::new();
    store.insert_language("Rust");
    store.insert_language("Go");
    let mut ann = Friend::new("Ann", Some("Smith"));
    ann.id = ANN;
    ann.phone_numbers.push(FriendPhoneNumber::new("555 0101"));
    store.insert(ann);
    store
}

fn friend_detail(
    store: &MemoryStore,
    channel: &NotificationChannel,
    dialog: &ScriptedDialog,
) -> FriendDetail {
    DetailController::new(
        store.repository(),
        store.clone(),
        dialog.clone(),
        channel.clone(),
    )
}

fn meeting_detail(store: &MemoryStore, channel: &NotificationChannel) -> MeetingDetail {
    DetailController::new(
        store.repository(),
        store.clone(),
        ScriptedDialog::default(),
        channel.clone(),
    )
}

fn saved_counter(channel: &NotificationChannel) -> Rc<RefCell<Vec<(i64, String)>>> {
    let seen = Rc::new(RefCell::new(Vec::new()));
    let sink = Rc::clone(&seen);
    channel.subscribe_saved(move |event| {
        sink.borrow_mut().push((event.id, event.label.clone()));
    });
    seen
}

#[tokio::test]
async fn loading_existing_friend_starts_clean_with_pickers() {
    let store = seeded_store();
    let mut detail = friend_detail(&store, &NotificationChannel::new(), &ScriptedDialog::default());

    let derived = detail.load(Some(ANN)).await.unwrap();

    assert_eq!(detail.state(), DetailState::Loaded);
    assert_eq!(detail.title(), "Ann Smith");
    assert_eq!(detail.children().len(), 1);
    assert!(!derived.can_save && !derived.has_changes && !derived.has_errors);
    let languages: Vec<_> = detail
        .picker(EntityKind::ProgrammingLanguage)
        .iter()
        .map(|record| record.label.as_str())
        .collect();
    assert_eq!(languages, vec!["Rust", "Go"]);
}

#[tokio::test]
async fn new_friend_shows_required_error_before_any_edit() {
    let store = seeded_store();
    let channel = NotificationChannel::new();
    let saved = saved_counter(&channel);
    let mut detail = friend_detail(&store, &channel, &ScriptedDialog::default());

    let derived = detail.load(None).await.unwrap();
    assert!(derived.has_errors);
    assert!(!derived.has_changes);
    assert!(!derived.can_save);
    assert_eq!(
        detail.wrapper().unwrap().errors(FIRST_NAME),
        ["First name is required".to_string()]
    );
    assert!(detail.repository().has_pending_changes());

    let derived = detail.set_field(FIRST_NAME, "Di").unwrap();
    assert!(derived.can_save);

    let id = detail.save().await.unwrap();
    assert_ne!(id, 0);
    assert_eq!(detail.id(), id);
    assert_eq!(store.get::<Friend>(id).unwrap().first_name, "Di");
    assert!(!detail.has_changes());
    assert_eq!(*saved.borrow(), vec![(id, "Di".to_string())]);
}

#[tokio::test]
async fn robot_blocks_save_until_corrected_then_save_notifies_once() {
    let store = seeded_store();
    let channel = NotificationChannel::new();
    let navigation = LookupSync::attach(&channel);
    navigation.load(&store, &[EntityKind::Friend]).await.unwrap();
    let saved = saved_counter(&channel);
    let mut detail = friend_detail(&store, &channel, &ScriptedDialog::default());
    detail.load(Some(ANN)).await.unwrap();

    let derived = detail.set_field(FIRST_NAME, "Robot").unwrap();
    assert!(derived.has_errors);
    assert!(derived.has_changes);
    assert!(!derived.can_save);
    assert_eq!(detail.save().await.unwrap_err(), DetailError::CannotSave);

    let derived = detail.set_field(FIRST_NAME, "Anna").unwrap();
    assert!(derived.can_save);
    assert_eq!(detail.save().await.unwrap(), ANN);

    assert_eq!(*saved.borrow(), vec![(ANN, "Anna Smith".to_string())]);
    assert_eq!(navigation.len(), 1);
    assert_eq!(
        navigation.find(ANN, EntityKind::Friend).unwrap().label,
        "Anna Smith"
    );
    assert_eq!(detail.title(), "Anna Smith");
    assert!(!detail.has_changes());
    assert!(!detail.can_save());
    assert_eq!(store.version::<Friend>(ANN), Some(2));
}

#[tokio::test]
async fn conflict_keeps_edits_and_reload_adopts_stored_values() {
    let store = seeded_store();
    let channel = NotificationChannel::new();
    let dialog = ScriptedDialog::default();
    let mut first = friend_detail(&store, &channel, &dialog);
    let mut second = friend_detail(&store, &channel, &dialog);
    first.load(Some(ANN)).await.unwrap();
    second.load(Some(ANN)).await.unwrap();

    first.set_field(FIRST_NAME, "Anna").unwrap();
    first.save().await.unwrap();

    second.set_field(FIRST_NAME, "Annie").unwrap();
    let err = second.save().await.unwrap_err();
    assert_eq!(
        err,
        DetailError::Conflict {
            kind: EntityKind::Friend,
            id: ANN
        }
    );
    assert!(second.has_conflict());
    assert!(second.has_changes());
    assert_eq!(second.wrapper().unwrap().model().first_name, "Annie");

    let derived = second
        .resolve_conflict(ConflictResolution::Reload)
        .await
        .unwrap();
    assert!(!derived.has_changes);
    assert!(!second.has_conflict());
    assert_eq!(second.wrapper().unwrap().model().first_name, "Anna");
    assert_eq!(store.get::<Friend>(ANN).unwrap().first_name, "Anna");
}

#[tokio::test]
async fn overwrite_after_conflict_persists_local_values() {
    let store = seeded_store();
    let channel = NotificationChannel::new();
    let saved = saved_counter(&channel);
    let dialog = ScriptedDialog::default();
    let mut first = friend_detail(&store, &channel, &dialog);
    let mut second = friend_detail(&store, &channel, &dialog);
    first.load(Some(ANN)).await.unwrap();
    second.load(Some(ANN)).await.unwrap();

    first.set_field(FIRST_NAME, "Anna").unwrap();
    first.save().await.unwrap();
    second.set_field(FIRST_NAME, "Annie").unwrap();
    assert!(second.save().await.is_err());

    second
        .resolve_conflict(ConflictResolution::Overwrite)
        .await
        .unwrap();

    assert_eq!(store.get::<Friend>(ANN).unwrap().first_name, "Annie");
    assert!(!second.has_changes());
    assert!(!second.has_conflict());
    assert_eq!(
        saved.borrow().last().cloned(),
        Some((ANN, "Annie Smith".to_string()))
    );

    // A later plain save from the same session no longer conflicts.
    second.set_field(FIRST_NAME, "Ann").unwrap();
    second.save().await.unwrap();
}

#[tokio::test]
async fn save_or_resolve_asks_the_dialog() {
    let store = seeded_store();
    let channel = NotificationChannel::new();
    let mut first = friend_detail(&store, &channel, &ScriptedDialog::default());
    let overwrite = ScriptedDialog::answering(&[DialogResult::Ok]);
    let mut second = friend_detail(&store, &channel, &overwrite);
    let reload = ScriptedDialog::answering(&[DialogResult::Cancel]);
    let mut third = friend_detail(&store, &channel, &reload);
    first.load(Some(ANN)).await.unwrap();
    second.load(Some(ANN)).await.unwrap();
    third.load(Some(ANN)).await.unwrap();

    first.set_field(FIRST_NAME, "Anna").unwrap();
    first.save_or_resolve().await.unwrap();

    second.set_field(FIRST_NAME, "Annie").unwrap();
    let derived = second.save_or_resolve().await.unwrap();
    assert!(!derived.has_changes);
    assert_eq!(store.get::<Friend>(ANN).unwrap().first_name, "Annie");
    assert_eq!(overwrite.confirms().len(), 1);
    assert!(overwrite.confirms()[0].contains("changed in the meantime"));

    third.set_field(FIRST_NAME, "Anita").unwrap();
    let derived = third.save_or_resolve().await.unwrap();
    assert!(!derived.has_changes);
    assert_eq!(third.wrapper().unwrap().model().first_name, "Annie");
    assert_eq!(store.get::<Friend>(ANN).unwrap().first_name, "Annie");
}

#[tokio::test]
async fn resolving_without_conflict_is_rejected() {
    let store = seeded_store();
    let mut detail = friend_detail(&store, &NotificationChannel::new(), &ScriptedDialog::default());
    detail.load(Some(ANN)).await.unwrap();

    let err = detail
        .resolve_conflict(ConflictResolution::Overwrite)
        .await
        .unwrap_err();
    assert_eq!(err, DetailError::NoPendingConflict);
}

#[tokio::test]
async fn transient_store_failure_keeps_changes_for_retry() {
    let store = seeded_store();
    let channel = NotificationChannel::new();
    let saved = saved_counter(&channel);
    let mut detail = friend_detail(&store, &channel, &ScriptedDialog::default());
    detail.load(Some(ANN)).await.unwrap();
    detail.set_field(FIRST_NAME, "Anna").unwrap();

    store.fail_next_save("store offline");
    let err = detail.save().await.unwrap_err();
    assert_eq!(
        err,
        DetailError::Repository(RepoError::Unavailable("store offline".to_string()))
    );
    assert_eq!(detail.state(), DetailState::Loaded);
    assert!(detail.has_changes());
    assert!(detail.can_save());
    assert!(saved.borrow().is_empty());
    assert_eq!(store.get::<Friend>(ANN).unwrap().first_name, "Ann");

    detail.save().await.unwrap();
    assert_eq!(store.get::<Friend>(ANN).unwrap().first_name, "Anna");
    assert_eq!(saved.borrow().len(), 1);
}

#[tokio::test]
async fn delete_is_blocked_while_friend_is_in_a_meeting() {
    let store = seeded_store();
    store.insert(Meeting::new("Standup", vec![ANN]));
    let channel = NotificationChannel::new();
    let deleted = Rc::new(RefCell::new(0));
    let sink = Rc::clone(&deleted);
    channel.subscribe_deleted(move |_| *sink.borrow_mut() += 1);
    let dialog = ScriptedDialog::answering(&[DialogResult::Ok]);
    let mut detail = friend_detail(&store, &channel, &dialog);
    detail.load(Some(ANN)).await.unwrap();

    let outcome = detail.delete().await.unwrap();

    let reason = match outcome {
        DeleteOutcome::Blocked(reason) => reason,
        other => panic!("expected a blocked delete, got {other:?}"),
    };
    assert!(reason.contains("Ann Smith"));
    assert!(reason.contains("meeting"));
    assert_eq!(dialog.infos(), vec![reason]);
    assert!(dialog.confirms().is_empty());
    assert_eq!(*deleted.borrow(), 0);
    assert!(store.get::<Friend>(ANN).is_some());
    assert_eq!(detail.state(), DetailState::Loaded);
}

#[tokio::test]
async fn confirmed_delete_removes_entity_and_ends_session() {
    let store = seeded_store();
    let channel = NotificationChannel::new();
    let navigation = LookupSync::attach(&channel);
    navigation.load(&store, &[EntityKind::Friend]).await.unwrap();
    let dialog = ScriptedDialog::answering(&[DialogResult::Ok]);
    let mut detail = friend_detail(&store, &channel, &dialog);
    detail.load(Some(ANN)).await.unwrap();

    assert_eq!(detail.delete().await.unwrap(), DeleteOutcome::Deleted);

    assert_eq!(
        dialog.confirms(),
        vec!["Do you really want to delete the friend Ann Smith?".to_string()]
    );
    assert!(store.get::<Friend>(ANN).is_none());
    assert!(navigation.is_empty());
    assert_eq!(detail.state(), DetailState::Deleted);
    assert_eq!(
        detail.set_field(FIRST_NAME, "Zed").unwrap_err(),
        DetailError::InvalidState {
            operation: "edit",
            state: DetailState::Deleted
        }
    );
}

#[tokio::test]
async fn cancelled_delete_keeps_entity() {
    let store = seeded_store();
    let dialog = ScriptedDialog::answering(&[DialogResult::Cancel]);
    let mut detail = friend_detail(&store, &NotificationChannel::new(), &dialog);
    detail.load(Some(ANN)).await.unwrap();

    assert_eq!(detail.delete().await.unwrap(), DeleteOutcome::Cancelled);
    assert!(store.get::<Friend>(ANN).is_some());
    assert_eq!(detail.state(), DetailState::Loaded);
    assert!(!detail.repository().has_pending_changes());
}

#[tokio::test]
async fn unsaved_entity_cannot_be_deleted() {
    let store = seeded_store();
    let mut detail = friend_detail(&store, &NotificationChannel::new(), &ScriptedDialog::default());
    detail.load(None).await.unwrap();

    assert_eq!(
        detail.delete().await.unwrap_err(),
        DetailError::NotPersisted(EntityKind::Friend)
    );
}

#[tokio::test]
async fn adding_then_removing_a_new_child_leaves_session_clean() {
    let store = seeded_store();
    let mut detail = friend_detail(&store, &NotificationChannel::new(), &ScriptedDialog::default());
    detail.load(Some(ANN)).await.unwrap();

    let (index, derived) = detail.add_child().unwrap();
    assert_eq!(index, 1);
    assert!(derived.has_changes);
    assert!(derived.has_errors, "blank phone number is flagged at once");
    assert!(!derived.can_save);

    let derived = detail.remove_child(index).unwrap();
    assert!(!derived.has_changes);
    assert!(!derived.has_errors);
}

#[tokio::test]
async fn child_add_and_remove_are_persisted_with_the_parent() {
    let store = seeded_store();
    let mut detail = friend_detail(&store, &NotificationChannel::new(), &ScriptedDialog::default());
    detail.load(Some(ANN)).await.unwrap();

    let (index, _) = detail.add_child().unwrap();
    let derived = detail
        .set_child_field(index, PHONE_NUMBER, "+49 555 0102")
        .unwrap();
    assert!(derived.can_save);
    detail.save().await.unwrap();

    let stored = store.get::<Friend>(ANN).unwrap();
    assert_eq!(stored.phone_numbers.len(), 2);
    assert!(stored.phone_numbers.iter().all(|phone| phone.id != 0));
    assert!(stored.phone_numbers.iter().all(|phone| phone.friend_id == ANN));
    assert!(detail.children().iter().all(|child| child.id() != 0));
    assert!(!detail.has_changes());

    detail.select_child(Some(0)).unwrap();
    let derived = detail.remove_selected_child().unwrap();
    assert!(derived.can_save);
    assert_eq!(detail.selected_child(), None);
    detail.save().await.unwrap();

    let stored = store.get::<Friend>(ANN).unwrap();
    assert_eq!(stored.phone_numbers.len(), 1);
    assert_eq!(stored.phone_numbers[0].number, "+49 555 0102");
}

#[tokio::test]
async fn invalid_child_index_is_rejected() {
    let store = seeded_store();
    let mut detail = friend_detail(&store, &NotificationChannel::new(), &ScriptedDialog::default());
    detail.load(Some(ANN)).await.unwrap();

    assert_eq!(
        detail.select_child(Some(5)).unwrap_err(),
        DetailError::ChildIndexOutOfRange(5)
    );
    assert_eq!(
        detail.remove_child(5).unwrap_err(),
        DetailError::ChildIndexOutOfRange(5)
    );
}

#[tokio::test]
async fn meeting_has_no_child_collection() {
    let store = seeded_store();
    let mut detail = meeting_detail(&store, &NotificationChannel::new());

    let derived = detail.load(None).await.unwrap();
    assert!(derived.has_errors);
    assert_eq!(
        detail.add_child().unwrap_err(),
        DetailError::ChildrenNotSupported(EntityKind::Meeting)
    );

    detail.set_field(TITLE, "Retro").unwrap();
    let id = detail.save().await.unwrap();
    assert_eq!(store.get::<Meeting>(id).unwrap().title, "Retro");
}

#[tokio::test]
async fn missing_entity_reports_not_found_and_keeps_state() {
    let store = seeded_store();
    let mut detail = friend_detail(&store, &NotificationChannel::new(), &ScriptedDialog::default());

    let err = detail.load(Some(99)).await.unwrap_err();
    assert_eq!(
        err,
        DetailError::NotFound {
            kind: EntityKind::Friend,
            id: 99
        }
    );
    assert_eq!(detail.state(), DetailState::Unloaded);
    assert!(detail.wrapper().is_none());
}

#[tokio::test]
async fn editing_before_load_is_rejected() {
    let store = seeded_store();
    let mut detail = friend_detail(&store, &NotificationChannel::new(), &ScriptedDialog::default());

    assert_eq!(
        detail.set_field(FIRST_NAME, "Anna").unwrap_err(),
        DetailError::InvalidState {
            operation: "edit",
            state: DetailState::Unloaded
        }
    );
}

#[tokio::test]
async fn navigation_prompt_only_for_unsaved_changes() {
    let store = seeded_store();
    let dialog = ScriptedDialog::answering(&[DialogResult::Cancel, DialogResult::Ok]);
    let mut detail = friend_detail(&store, &NotificationChannel::new(), &dialog);
    detail.load(Some(ANN)).await.unwrap();

    assert!(detail.confirm_navigation().await);
    assert!(dialog.confirms().is_empty());

    detail.set_field(FIRST_NAME, "Anna").unwrap();
    assert!(!detail.confirm_navigation().await);
    assert!(detail.confirm_navigation().await);
    assert_eq!(dialog.confirms().len(), 2);
}

#[tokio::test]
async fn failed_delete_stays_retryable_and_later_edits_update() {
    let store = seeded_store();
    let channel = NotificationChannel::new();
    let navigation = LookupSync::attach(&channel);
    navigation.load(&store, &[EntityKind::Friend]).await.unwrap();
    let saved = saved_counter(&channel);
    let dialog = ScriptedDialog::answering(&[DialogResult::Ok, DialogResult::Ok]);
    let mut detail = friend_detail(&store, &channel, &dialog);
    detail.load(Some(ANN)).await.unwrap();

    store.fail_next_save("disk full");
    let err = detail.delete().await.unwrap_err();
    assert_eq!(
        err,
        DetailError::Repository(RepoError::Unavailable("disk full".to_string()))
    );
    assert_eq!(detail.state(), DetailState::Loaded);
    assert!(!detail.repository().has_pending_changes());
    assert!(store.get::<Friend>(ANN).is_some());

    detail.set_field(FIRST_NAME, "Anna").unwrap();
    assert_eq!(detail.save().await.unwrap(), ANN);
    assert_eq!(store.get::<Friend>(ANN).unwrap().first_name, "Anna");
    assert_eq!(*saved.borrow(), vec![(ANN, "Anna Smith".to_string())]);
    assert_eq!(navigation.len(), 1);

    assert_eq!(detail.delete().await.unwrap(), DeleteOutcome::Deleted);
    assert!(store.get::<Friend>(ANN).is_none());
    assert!(navigation.is_empty());
}

#[tokio::test]
async fn loading_an_existing_entity_after_new_does_not_insert() {
    let store = seeded_store();
    let mut detail = friend_detail(&store, &NotificationChannel::new(), &ScriptedDialog::default());
    detail.load(None).await.unwrap();
    assert!(detail.repository().has_pending_changes());

    detail.load(Some(ANN)).await.unwrap();
    assert!(!detail.repository().has_pending_changes());
    detail.set_field(FIRST_NAME, "Anna").unwrap();

    assert_eq!(detail.save().await.unwrap(), ANN);
    assert_eq!(store.count::<Friend>(), 1);
    assert_eq!(store.get::<Friend>(ANN).unwrap().first_name, "Anna");
}

#[tokio::test]
async fn failed_load_keeps_the_pending_new_entity() {
    let store = seeded_store();
    let mut detail = friend_detail(&store, &NotificationChannel::new(), &ScriptedDialog::default());
    detail.load(None).await.unwrap();

    assert!(detail.load(Some(99)).await.is_err());
    detail.set_field(FIRST_NAME, "Gus").unwrap();

    let id = detail.save().await.unwrap();
    assert_ne!(id, ANN);
    assert_eq!(store.count::<Friend>(), 2);
}

#[tokio::test]
async fn meeting_participants_come_from_the_friend_picker() {
    let store = seeded_store();
    let bo = store.insert(Friend::new("Bo", None));
    let meeting = store.insert(Meeting::new("Standup", vec![ANN]));
    let mut detail = meeting_detail(&store, &NotificationChannel::new());
    detail.load(Some(meeting)).await.unwrap();

    let offered: Vec<EntityId> = detail
        .available_participants()
        .iter()
        .map(|record| record.id)
        .collect();
    assert_eq!(offered, vec![bo]);

    let derived = detail.add_participant(bo).unwrap();
    assert!(derived.has_changes);
    assert!(derived.can_save);
    assert!(detail.available_participants().is_empty());

    assert_eq!(
        detail.add_participant(404).unwrap_err(),
        DetailError::NotInPicker {
            kind: EntityKind::Friend,
            id: 404
        }
    );

    detail.save().await.unwrap();
    assert_eq!(
        store.get::<Meeting>(meeting).unwrap().participant_ids,
        vec![ANN, bo]
    );
    assert!(!detail.has_changes());
}

#[tokio::test]
async fn removing_then_readding_a_participant_is_clean() {
    let store = seeded_store();
    let meeting = store.insert(Meeting::new("Standup", vec![ANN]));
    let mut detail = meeting_detail(&store, &NotificationChannel::new());
    detail.load(Some(meeting)).await.unwrap();

    let derived = detail.remove_participant(ANN).unwrap();
    assert!(derived.has_changes);

    let derived = detail.add_participant(ANN).unwrap();
    assert!(!derived.has_changes);
    let derived = detail.add_participant(ANN).unwrap();
    assert!(!derived.has_changes, "adding a participant twice is a no-op");
}
