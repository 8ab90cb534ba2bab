//! Typed publish/subscribe channel between detail sessions and listeners.
//!
//! # Responsibility
//! - Decouple detail controllers from navigation lists and from each other.
//!
//! # Invariants
//! - Delivery is synchronous and follows subscription order.
//! - Subscribers only see events published after they subscribed; there is
//!   no replay.
//! - The channel is a single-thread handle (`Rc`); clones share one registry.

use crate::model::{EntityId, EntityKind};
use log::warn;
use serde::{Deserialize, Serialize};
use std::cell::RefCell;
use std::fmt::{Debug, Formatter};
use std::rc::Rc;

/// Published after a detail session stored its entity.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct SavedEvent {
    pub id: EntityId,
    pub label: String,
    pub kind: EntityKind,
}

/// Published after a detail session deleted its entity.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct DeletedEvent {
    pub id: EntityId,
    pub kind: EntityKind,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub enum Notification {
    Saved(SavedEvent),
    Deleted(DeletedEvent),
}

/// Handle returned by `subscribe`, used to unsubscribe.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash)]
pub struct SubscriptionId(u64);

type Handler = Rc<RefCell<dyn FnMut(&Notification)>>;

#[derive(Default)]
struct Registry {
    next_id: u64,
    subscribers: Vec<(SubscriptionId, Handler)>,
}

/// Cloneable handle onto one shared subscriber registry.
#[derive(Clone, Default)]
pub struct NotificationChannel {
    registry: Rc<RefCell<Registry>>,
}

impl NotificationChannel {
    pub fn new() -> Self {
        Self::default()
    }

    /// Registers `handler` for every notification published from now on.
    pub fn subscribe(&self, handler: impl FnMut(&Notification) + 'static) -> SubscriptionId {
        let mut registry = self.registry.borrow_mut();
        registry.next_id += 1;
        let id = SubscriptionId(registry.next_id);
        let handler: Handler = Rc::new(RefCell::new(handler));
        registry.subscribers.push((id, handler));
        id
    }

    pub fn subscribe_saved(
        &self,
        mut handler: impl FnMut(&SavedEvent) + 'static,
    ) -> SubscriptionId {
        self.subscribe(move |notification| {
            if let Notification::Saved(event) = notification {
                handler(event);
            }
        })
    }

    pub fn subscribe_deleted(
        &self,
        mut handler: impl FnMut(&DeletedEvent) + 'static,
    ) -> SubscriptionId {
        self.subscribe(move |notification| {
            if let Notification::Deleted(event) = notification {
                handler(event);
            }
        })
    }

    /// Removes one subscriber. Returns `false` when it was already gone.
    pub fn unsubscribe(&self, id: SubscriptionId) -> bool {
        let mut registry = self.registry.borrow_mut();
        let before = registry.subscribers.len();
        registry.subscribers.retain(|(existing, _)| *existing != id);
        registry.subscribers.len() != before
    }

    pub fn subscriber_count(&self) -> usize {
        self.registry.borrow().subscribers.len()
    }

    /// Delivers `notification` to every current subscriber, in order.
    ///
    /// Returns the number of handlers invoked.
    pub fn publish(&self, notification: Notification) -> usize {
        let snapshot: Vec<(SubscriptionId, Handler)> = self.registry.borrow().subscribers.clone();
        let mut delivered = 0;
        for (id, handler) in snapshot {
            match handler.try_borrow_mut() {
                Ok(mut handler) => {
                    (&mut *handler)(&notification);
                    delivered += 1;
                }
                Err(_) => warn!(
                    "event=notification_publish module=events status=skipped subscription={} reason=reentrant",
                    id.0
                ),
            }
        }
        delivered
    }
}

impl Debug for NotificationChannel {
    fn fmt(&self, f: &mut Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("NotificationChannel")
            .field("subscribers", &self.subscriber_count())
            .finish()
    }
}
