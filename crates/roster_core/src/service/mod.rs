//! Core use-case services.
//!
//! # Responsibility
//! - Orchestrate wrappers, repositories, dialogs and notifications into
//!   detail sessions and navigation lists.
//! - Keep callers decoupled from storage and presentation details.

pub mod detail;
pub mod dialog;
pub mod lookup_sync;
