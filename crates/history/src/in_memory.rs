//! In-memory history store: useful for testing and ephemeral sessions.

use async_trait::async_trait;
use agentrelay_core::error::HistoryError;
use agentrelay_core::history::HistoryStore;
use agentrelay_core::message::{Message, paginate};
use std::sync::Arc;
use tokio::sync::RwLock;

/// Keeps the last saved history in a Vec.
#[derive(Clone, Default)]
pub struct InMemoryHistory {
    messages: Arc<RwLock<Vec<Message>>>,
}

impl InMemoryHistory {
    pub fn new() -> Self {
        Self::default()
    }

    /// Start from an existing conversation.
    pub fn with_messages(messages: Vec<Message>) -> Self {
        Self {
            messages: Arc::new(RwLock::new(messages)),
        }
    }
}

#[async_trait]
impl HistoryStore for InMemoryHistory {
    fn name(&self) -> &str {
        "memory"
    }

    async fn save_history(&self, messages: &[Message]) -> Result<(), HistoryError> {
        *self.messages.write().await = messages.to_vec();
        Ok(())
    }

    async fn get_history(&self, limit: usize, offset: usize) -> Result<Vec<Message>, HistoryError> {
        Ok(paginate(&self.messages.read().await, limit, offset))
    }
}
