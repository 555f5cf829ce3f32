//! File-based history store: one pretty-printed JSON array per agent session.
//!
//! Storage location: `<dir>/<agent>-<uuid>.json`, a fresh file per process so
//! concurrent sessions never share one.
//!
//! The whole history is kept in memory and rewritten on every save.

use async_trait::async_trait;
use agentrelay_core::error::HistoryError;
use agentrelay_core::history::HistoryStore;
use agentrelay_core::message::{Message, paginate};
use std::path::{Path, PathBuf};
use std::sync::Arc;
use tokio::sync::RwLock;
use tracing::debug;
use uuid::Uuid;

/// A file-backed history store.
pub struct JsonFileHistory {
    path: PathBuf,
    messages: Arc<RwLock<Vec<Message>>>,
}

impl JsonFileHistory {
    /// Open the history at `path`. A missing file starts empty (created on first save).
    pub fn open(path: impl Into<PathBuf>) -> Result<Self, HistoryError> {
        let path = path.into();
        let messages = Self::load_from_disk(&path)?;
        debug!(path = %path.display(), count = messages.len(), "JSON history loaded");
        Ok(Self {
            path,
            messages: Arc::new(RwLock::new(messages)),
        })
    }

    /// A new, uniquely named history file for `agent_name` under `dir`.
    pub fn for_agent(dir: &Path, agent_name: &str) -> Self {
        let file = format!("{}-{}.json", sanitize(agent_name), Uuid::new_v4());
        Self {
            path: dir.join(file),
            messages: Arc::new(RwLock::new(Vec::new())),
        }
    }

    pub fn path(&self) -> &Path {
        &self.path
    }

    fn load_from_disk(path: &Path) -> Result<Vec<Message>, HistoryError> {
        let content = match std::fs::read_to_string(path) {
            Ok(c) => c,
            Err(e) if e.kind() == std::io::ErrorKind::NotFound => return Ok(Vec::new()),
            Err(e) => {
                return Err(HistoryError::Storage(format!(
                    "Failed to read {}: {e}",
                    path.display()
                )));
            }
        };
        if content.trim().is_empty() {
            return Ok(Vec::new());
        }
        serde_json::from_str(&content)
            .map_err(|e| HistoryError::Corrupted(format!("{}: {e}", path.display())))
    }

    async fn flush(&self, messages: &[Message]) -> Result<(), HistoryError> {
        if let Some(parent) = self.path.parent() {
            tokio::fs::create_dir_all(parent).await.map_err(|e| {
                HistoryError::Storage(format!("Failed to create history directory: {e}"))
            })?;
        }

        let content = serde_json::to_string_pretty(messages)
            .map_err(|e| HistoryError::Storage(format!("Failed to serialize history: {e}")))?;

        tokio::fs::write(&self.path, content)
            .await
            .map_err(|e| HistoryError::Storage(format!("Failed to write history file: {e}")))
    }
}

/// Keep agent names filesystem-friendly.
fn sanitize(name: &str) -> String {
    name.chars()
        .map(|c| if c.is_ascii_alphanumeric() || c == '-' || c == '_' { c } else { '_' })
        .collect()
}

#[async_trait]
impl HistoryStore for JsonFileHistory {
    fn name(&self) -> &str {
        "json"
    }

    async fn save_history(&self, messages: &[Message]) -> Result<(), HistoryError> {
        let mut stored = self.messages.write().await;
        *stored = messages.to_vec();
        self.flush(&stored).await
    }

    async fn get_history(&self, limit: usize, offset: usize) -> Result<Vec<Message>, HistoryError> {
        Ok(paginate(&self.messages.read().await, limit, offset))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use agentrelay_core::message::Role;

    fn conversation() -> Vec<Message> {
        vec![
            Message::system("be helpful"),
            Message::user("hi"),
            Message::assistant("hello", None),
        ]
    }

    #[tokio::test]
    async fn save_and_reload_persists() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("main.json");

        let store = JsonFileHistory::open(&path).unwrap();
        store.save_history(&conversation()).await.unwrap();

        let content = std::fs::read_to_string(&path).unwrap();
        assert!(content.contains("be helpful"));

        let reopened = JsonFileHistory::open(&path).unwrap();
        let all = reopened.get_history(0, 0).await.unwrap();
        assert_eq!(all.len(), 3);
        assert_eq!(all[0].role, Role::System);
    }

    #[tokio::test]
    async fn save_replaces_previous_content() {
        let dir = tempfile::tempdir().unwrap();
        let store = JsonFileHistory::open(dir.path().join("h.json")).unwrap();
        store.save_history(&conversation()).await.unwrap();
        store.save_history(&conversation()[..1]).await.unwrap();
        assert_eq!(store.get_history(0, 0).await.unwrap().len(), 1);
    }

    #[tokio::test]
    async fn get_history_pages() {
        let dir = tempfile::tempdir().unwrap();
        let store = JsonFileHistory::open(dir.path().join("h.json")).unwrap();
        store.save_history(&conversation()).await.unwrap();

        let page = store.get_history(1, 1).await.unwrap();
        assert_eq!(page.len(), 1);
        assert_eq!(page[0].content, "hi");
        assert!(store.get_history(0, 3).await.unwrap().is_empty());
    }

    #[tokio::test]
    async fn for_agent_creates_unique_files_in_nested_dir() {
        let dir = tempfile::tempdir().unwrap();
        let nested = dir.path().join("history");
        let a = JsonFileHistory::for_agent(&nested, "Main Agent");
        let b = JsonFileHistory::for_agent(&nested, "Main Agent");
        assert_ne!(a.path(), b.path());
        let file_name = a.path().file_name().unwrap().to_string_lossy().to_string();
        assert!(file_name.starts_with("Main_Agent-"));

        a.save_history(&conversation()).await.unwrap();
        assert!(a.path().exists());
    }

    #[test]
    fn corrupted_file_is_reported() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("bad.json");
        std::fs::write(&path, "{not json").unwrap();
        assert!(matches!(
            JsonFileHistory::open(&path),
            Err(HistoryError::Corrupted(_))
        ));
    }

    #[test]
    fn empty_file_starts_empty() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("empty.json");
        std::fs::write(&path, "").unwrap();
        assert!(JsonFileHistory::open(&path).is_ok());
    }
}
