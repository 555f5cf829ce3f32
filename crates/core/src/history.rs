//! History persistence trait.
//!
//! Backends store whole message lists; they give no durability or atomicity
//! guarantee. Implementations live in the `agentrelay-history` crate.

use async_trait::async_trait;

use crate::error::HistoryError;
use crate::message::Message;

#[async_trait]
pub trait HistoryStore: Send + Sync {
    /// Backend name (e.g., "json", "memory").
    fn name(&self) -> &str;

    /// Replace the stored history with `messages`.
    async fn save_history(&self, messages: &[Message]) -> Result<(), HistoryError>;

    /// Read stored messages. `limit == 0 && offset == 0` means everything;
    /// see [`crate::message::paginate`] for the rest.
    async fn get_history(&self, limit: usize, offset: usize) -> Result<Vec<Message>, HistoryError>;
}
