//! Navigation list kept in step with saved/deleted notifications.
//!
//! # Invariants
//! - `(id, kind)` identifies at most one item; saves upsert, never duplicate.
//! - Removing an absent item is a no-op.

use crate::events::{Notification, NotificationChannel, SubscriptionId};
use crate::model::lookup::LookupItem;
use crate::model::{EntityId, EntityKind};
use crate::repo::{LookupReadService, RepoResult};
use log::{debug, info};
use std::cell::RefCell;
use std::rc::Rc;

/// Navigation list subscribed to one notification channel.
#[derive(Debug)]
pub struct LookupSync {
    channel: NotificationChannel,
    subscription: SubscriptionId,
    items: Rc<RefCell<Vec<LookupItem>>>,
}

impl LookupSync {
    /// Creates an empty list and subscribes it to `channel`.
    pub fn attach(channel: &NotificationChannel) -> Self {
        let items = Rc::new(RefCell::new(Vec::new()));
        let sink = Rc::clone(&items);
        let subscription = channel.subscribe(move |notification| {
            apply_notification(&mut sink.borrow_mut(), notification);
        });
        Self {
            channel: channel.clone(),
            subscription,
            items,
        }
    }

    /// Replaces the list with the full lookup set of every kind in `kinds`.
    pub async fn load<L: LookupReadService>(
        &self,
        lookups: &L,
        kinds: &[EntityKind],
    ) -> RepoResult<()> {
        let mut loaded = Vec::new();
        for kind in kinds {
            let records = lookups.list_all(*kind).await?;
            loaded.extend(
                records
                    .into_iter()
                    .map(|record| LookupItem::from_record(record, *kind)),
            );
        }
        info!(
            "event=lookup_load module=lookup_sync status=ok kinds={} count={}",
            kinds.len(),
            loaded.len()
        );
        *self.items.borrow_mut() = loaded;
        Ok(())
    }

    pub fn items(&self) -> Vec<LookupItem> {
        self.items.borrow().clone()
    }

    pub fn items_of(&self, kind: EntityKind) -> Vec<LookupItem> {
        self.items
            .borrow()
            .iter()
            .filter(|item| item.kind == kind)
            .cloned()
            .collect()
    }

    pub fn find(&self, id: EntityId, kind: EntityKind) -> Option<LookupItem> {
        self.items
            .borrow()
            .iter()
            .find(|item| item.matches(id, kind))
            .cloned()
    }

    pub fn len(&self) -> usize {
        self.items.borrow().len()
    }

    pub fn is_empty(&self) -> bool {
        self.items.borrow().is_empty()
    }
}

impl Drop for LookupSync {
    fn drop(&mut self) {
        self.channel.unsubscribe(self.subscription);
    }
}

/// Applies one notification to a navigation list.
pub fn apply_notification(items: &mut Vec<LookupItem>, notification: &Notification) {
    match notification {
        Notification::Saved(event) => {
            match items
                .iter_mut()
                .find(|item| item.matches(event.id, event.kind))
            {
                Some(item) => item.label.clone_from(&event.label),
                None => items.push(LookupItem {
                    id: event.id,
                    label: event.label.clone(),
                    kind: event.kind,
                }),
            }
            debug!(
                "event=lookup_upsert module=lookup_sync kind={} id={}",
                event.kind, event.id
            );
        }
        Notification::Deleted(event) => {
            let before = items.len();
            items.retain(|item| !item.matches(event.id, event.kind));
            debug!(
                "event=lookup_remove module=lookup_sync kind={} id={} removed={}",
                event.kind,
                event.id,
                before - items.len()
            );
        }
    }
}
