//! Dialog collaborator contract.
//!
//! The core never renders anything; it only asks for decisions.

/// Answer to a confirmation request.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum DialogResult {
    Ok,
    Cancel,
}

/// Suspendable user prompts requested by detail sessions.
#[allow(async_fn_in_trait)]
pub trait DialogService {
    async fn confirm(&self, message: &str, title: &str) -> DialogResult;

    async fn info(&self, message: &str);
}
