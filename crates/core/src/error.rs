//! Error types for the agentrelay domain.
//!
//! Uses `thiserror` for ergonomic error definitions.
//! Each bounded context has its own error variant.

use thiserror::Error;

/// The top-level error type for all agentrelay operations.
#[derive(Debug, Error)]
pub enum Error {
    // --- LLM engine transport ---
    #[error("Provider error: {0}")]
    Provider(#[from] ProviderError),

    // --- Tools ---
    #[error("Tool error: {0}")]
    Tool(#[from] ToolError),

    // --- History ---
    #[error("History error: {0}")]
    History(#[from] HistoryError),

    // --- Event stream ---
    #[error("Stream error: {0}")]
    Stream(#[from] StreamError),

    /// The run kept requesting tools past the configured cap.
    #[error("reached maximum tool iterations ({0})")]
    IterationsExhausted(u32),

    // --- Configuration errors ---
    #[error("Configuration error: {message}")]
    Config { message: String },
}

/// Result type alias using our Error.
pub type Result<T> = std::result::Result<T, Error>;

// --- Bounded context errors ---

#[derive(Debug, Clone, Error)]
pub enum ProviderError {
    #[error("API request failed: {message} (status: {status_code})")]
    ApiError {
        status_code: u16,
        message: String,
    },

    #[error("Rate limited by provider, retry after {retry_after_secs}s")]
    RateLimited { retry_after_secs: u64 },

    #[error("Authentication failed: {0}")]
    AuthenticationFailed(String),

    #[error("Model not found: {0}")]
    ModelNotFound(String),

    #[error("Stream interrupted: {0}")]
    StreamInterrupted(String),

    /// The engine sent a chunk with status `error`.
    #[error("Model stream reported an error: {0}")]
    StreamFailed(String),

    #[error("Malformed chunk: {0}")]
    Deserialization(String),

    #[error("Provider not configured: {0}")]
    NotConfigured(String),

    #[error("Request timed out: {0}")]
    Timeout(String),

    #[error("Network error: {0}")]
    Network(String),
}

#[derive(Debug, Error)]
pub enum ToolError {
    #[error("Tool not found: {0}")]
    NotFound(String),

    #[error("Tool execution failed: {tool_name}: {reason}")]
    ExecutionFailed { tool_name: String, reason: String },

    #[error("Permission denied: {tool_name}: {reason}")]
    PermissionDenied { tool_name: String, reason: String },

    #[error("Invalid tool arguments: {0}")]
    InvalidArguments(String),

    #[error("Unknown tools in selection: {0}")]
    UnknownSelection(String),
}

#[derive(Debug, Error)]
pub enum HistoryError {
    #[error("Storage error: {0}")]
    Storage(String),

    #[error("Corrupted history: {0}")]
    Corrupted(String),

    #[error("history already has a system message")]
    DuplicateSystemMessage,

    #[error("tool message references unknown tool call '{0}'")]
    UnknownToolCall(String),

    #[error("tool message is missing a tool call id")]
    MissingToolCallId,
}

#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum StreamError {
    #[error("event stream closed by consumer")]
    Closed,

    #[error("run cancelled")]
    Cancelled,

    #[error("event stream already terminated")]
    Terminated,
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn provider_error_displays_correctly() {
        let err = Error::Provider(ProviderError::ApiError {
            status_code: 429,
            message: "Too many requests".into(),
        });
        assert!(err.to_string().contains("429"));
        assert!(err.to_string().contains("Too many requests"));
    }

    #[test]
    fn iterations_exhausted_message() {
        let err = Error::IterationsExhausted(3);
        assert_eq!(err.to_string(), "reached maximum tool iterations (3)");
    }

    #[test]
    fn history_error_converts() {
        let err: Error = HistoryError::UnknownToolCall("call_9".into()).into();
        assert!(err.to_string().contains("call_9"));
    }
}
