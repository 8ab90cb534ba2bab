//! Core domain logic for the roster organizer.
//! Detail sessions, change tracking, validation and cross-view notifications
//! live here; rendering and real storage stay with the embedding app.

pub mod config;
pub mod events;
pub mod logging;
pub mod model;
pub mod repo;
pub mod service;
pub mod validation;
pub mod wrapper;

pub use config::{CoreConfig, LoggingConfig};
pub use events::{DeletedEvent, Notification, NotificationChannel, SavedEvent, SubscriptionId};
pub use logging::{default_log_level, init_logging, logging_status};
pub use model::friend::{Friend, FriendPhoneNumber};
pub use model::lookup::{LookupItem, LookupRecord, ProgrammingLanguage};
pub use model::meeting::Meeting;
pub use model::{Aggregate, Entity, EntityId, EntityKind, TRANSIENT_ID};
pub use repo::memory::{MemoryRepository, MemoryStore};
pub use repo::{EntityRepository, LookupReadService, RepoError, RepoResult, SaveMode};
pub use service::detail::{
    ConflictResolution, DeleteOutcome, DerivedState, DetailController, DetailError, DetailState,
};
pub use service::dialog::{DialogResult, DialogService};
pub use service::lookup_sync::LookupSync;
pub use validation::Rule;
pub use wrapper::field::FieldValue;
pub use wrapper::{ModelWrapper, WrapperError, WrapperEvent};

/// Returns the core crate version.
pub fn core_version() -> &'static str {
    env!("CARGO_PKG_VERSION")
}
