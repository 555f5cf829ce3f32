//! OpenAI-compatible streaming engine.
//!
//! Works with: OpenAI, OpenRouter, Together AI, DeepSeek, Ollama, vLLM and any
//! endpoint exposing `/v1/chat/completions` with SSE streaming and function calling.

use async_trait::async_trait;
use agentrelay_core::error::ProviderError;
use agentrelay_core::message::{Message, Role, TokenUsage};
use agentrelay_core::provider::{Chunk, ChunkReceiver, LlmEngine, ToolDefinition};
use agentrelay_core::tool::{ToolArgs, ToolCall};
use futures::StreamExt;
use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;
use std::time::Duration;
use tracing::{debug, trace, warn};

/// An OpenAI-compatible LLM engine bound to one model.
pub struct OpenAiCompatEngine {
    name: String,
    base_url: String,
    api_key: String,
    model: String,
    temperature: f32,
    max_tokens: Option<u32>,
    client: reqwest::Client,
}

impl OpenAiCompatEngine {
    /// Create a new engine for `model` at `base_url`.
    pub fn new(
        name: impl Into<String>,
        base_url: impl Into<String>,
        api_key: impl Into<String>,
        model: impl Into<String>,
    ) -> Result<Self, ProviderError> {
        let client = reqwest::Client::builder()
            .timeout(Duration::from_secs(120))
            .build()
            .map_err(|e| ProviderError::NotConfigured(format!("HTTP client: {e}")))?;

        Ok(Self {
            name: name.into(),
            base_url: base_url.into().trim_end_matches('/').to_string(),
            api_key: api_key.into(),
            model: model.into(),
            temperature: 0.7,
            max_tokens: None,
            client,
        })
    }

    pub fn with_temperature(mut self, temperature: f32) -> Self {
        self.temperature = temperature;
        self
    }

    pub fn with_max_tokens(mut self, max_tokens: Option<u32>) -> Self {
        self.max_tokens = max_tokens;
        self
    }

    pub fn model(&self) -> &str {
        &self.model
    }

    pub fn base_url(&self) -> &str {
        &self.base_url
    }

    /// Convert our Message types to OpenAI API format.
    fn to_api_messages(messages: &[Message]) -> Vec<ApiMessage> {
        messages
            .iter()
            .map(|m| ApiMessage {
                role: match m.role {
                    Role::User => "user".into(),
                    Role::Assistant => "assistant".into(),
                    Role::System => "system".into(),
                    Role::Tool => "tool".into(),
                },
                content: Some(m.content.clone()),
                tool_calls: if m.tool_calls.is_empty() {
                    None
                } else {
                    Some(
                        m.tool_calls
                            .iter()
                            .map(|tc| ApiToolCall {
                                id: tc.id.clone(),
                                r#type: "function".into(),
                                function: ApiFunction {
                                    name: tc.name.clone(),
                                    arguments: serde_json::Value::Object(tc.arguments.clone())
                                        .to_string(),
                                },
                            })
                            .collect(),
                    )
                },
                tool_call_id: m.tool_call_id.clone(),
            })
            .collect()
    }

    /// Convert tool definitions to OpenAI API format.
    fn to_api_tools(tools: &[ToolDefinition]) -> Vec<ApiToolDefinition> {
        tools
            .iter()
            .map(|t| ApiToolDefinition {
                r#type: "function".into(),
                function: ApiToolFunction {
                    name: t.name.clone(),
                    description: t.description.clone(),
                    parameters: t.parameters.clone(),
                },
            })
            .collect()
    }

    fn request_body(&self, messages: &[Message], tools: &[ToolDefinition]) -> serde_json::Value {
        let mut body = serde_json::json!({
            "model": self.model,
            "messages": Self::to_api_messages(messages),
            "temperature": self.temperature,
            "stream": true,
            "stream_options": { "include_usage": true },
        });

        if let Some(max_tokens) = self.max_tokens {
            body["max_tokens"] = serde_json::json!(max_tokens);
        }

        if !tools.is_empty() {
            body["tools"] = serde_json::json!(Self::to_api_tools(tools));
        }
        body
    }
}

#[async_trait]
impl LlmEngine for OpenAiCompatEngine {
    fn name(&self) -> &str {
        &self.name
    }

    async fn chat_stream(
        &self,
        messages: &[Message],
        tools: &[ToolDefinition],
    ) -> Result<ChunkReceiver, ProviderError> {
        let url = format!("{}/chat/completions", self.base_url);
        let body = self.request_body(messages, tools);

        debug!(
            provider = %self.name,
            model = %self.model,
            messages = messages.len(),
            tools = tools.len(),
            "Sending streaming request"
        );

        let response = self
            .client
            .post(&url)
            .header("Authorization", format!("Bearer {}", self.api_key))
            .header("Content-Type", "application/json")
            .header("Accept", "text/event-stream")
            .json(&body)
            .send()
            .await
            .map_err(|e| {
                if e.is_timeout() {
                    ProviderError::Timeout(e.to_string())
                } else {
                    ProviderError::Network(e.to_string())
                }
            })?;

        let status = response.status().as_u16();

        if status == 429 {
            return Err(ProviderError::RateLimited {
                retry_after_secs: 5,
            });
        }

        if status == 401 || status == 403 {
            return Err(ProviderError::AuthenticationFailed(
                "Invalid API key or insufficient permissions".into(),
            ));
        }

        if status == 404 {
            return Err(ProviderError::ModelNotFound(self.model.clone()));
        }

        if status != 200 {
            let error_body = response.text().await.unwrap_or_default();
            warn!(status, body = %error_body, "Provider streaming error");
            return Err(ProviderError::ApiError {
                status_code: status,
                message: error_body,
            });
        }

        let (tx, rx) = tokio::sync::mpsc::channel(64);
        let provider_name = self.name.clone();

        // Read the SSE byte stream and translate it into chunks
        tokio::spawn(async move {
            let mut byte_stream = response.bytes_stream();
            let mut lines = SseLines::default();
            let mut turn = SseTurn::default();

            while let Some(chunk_result) = byte_stream.next().await {
                let bytes = match chunk_result {
                    Ok(b) => b,
                    Err(e) => {
                        let _ = tx
                            .send(Err(ProviderError::StreamInterrupted(e.to_string())))
                            .await;
                        return;
                    }
                };

                let complete = match lines.push(&bytes) {
                    Ok(complete) => complete,
                    Err(e) => {
                        let _ = tx.send(Err(e)).await;
                        return;
                    }
                };

                for line in complete {
                    // Skip empty lines and SSE comments
                    let Some(data) = line.strip_prefix("data:") else {
                        continue;
                    };

                    match turn.feed(data.trim()) {
                        Ok(chunks) => {
                            for chunk in chunks {
                                if tx.send(Ok(chunk)).await.is_err() {
                                    return; // receiver dropped
                                }
                            }
                        }
                        Err(e) => {
                            trace!(provider = %provider_name, error = %e, "Bad SSE chunk");
                            let _ = tx.send(Err(e)).await;
                            return;
                        }
                    }
                    if turn.is_finished() {
                        return;
                    }
                }
            }

            // Stream ended without [DONE]
            match turn.finish() {
                Ok(chunks) => {
                    for chunk in chunks {
                        if tx.send(Ok(chunk)).await.is_err() {
                            return;
                        }
                    }
                }
                Err(e) => {
                    let _ = tx.send(Err(e)).await;
                }
            }
        });

        Ok(rx)
    }
}

/// Splits the SSE byte stream into lines.
///
/// Bytes are buffered until a newline arrives, so a multi-byte character
/// split across network chunks is decoded whole.
#[derive(Default)]
struct SseLines {
    pending: Vec<u8>,
}

impl SseLines {
    fn push(&mut self, bytes: &[u8]) -> Result<Vec<String>, ProviderError> {
        self.pending.extend_from_slice(bytes);
        let mut lines = Vec::new();
        while let Some(line_end) = self.pending.iter().position(|b| *b == b'\n') {
            let raw: Vec<u8> = self.pending.drain(..=line_end).collect();
            let line = String::from_utf8(raw)
                .map_err(|e| ProviderError::Deserialization(format!("invalid UTF-8 in stream: {e}")))?;
            lines.push(line.trim_end_matches(['\r', '\n']).to_string());
        }
        Ok(lines)
    }
}

/// Translates the `data:` payloads of one streamed turn into chunks.
#[derive(Default)]
struct SseTurn {
    full_content: String,
    // keyed by the tool call index the API assigns
    tool_calls: BTreeMap<u32, ToolCallAccumulator>,
    usage: Option<TokenUsage>,
    finished: bool,
}

impl SseTurn {
    fn is_finished(&self) -> bool {
        self.finished
    }

    fn feed(&mut self, data: &str) -> Result<Vec<Chunk>, ProviderError> {
        if data == "[DONE]" {
            return self.finish();
        }

        let response: StreamResponse = serde_json::from_str(data)
            .map_err(|e| ProviderError::Deserialization(format!("{e}: {data}")))?;

        let mut chunks = Vec::new();
        if let Some(choice) = response.choices.into_iter().next() {
            for tc_delta in choice.delta.tool_calls.unwrap_or_default() {
                let acc = self.tool_calls.entry(tc_delta.index).or_default();
                if let Some(id) = tc_delta.id {
                    acc.id = id;
                }
                if let Some(func) = tc_delta.function {
                    if let Some(name) = func.name {
                        acc.name = name;
                    }
                    if let Some(args) = func.arguments {
                        acc.arguments.push_str(&args);
                    }
                }
            }

            if let Some(content) = choice.delta.content.filter(|c| !c.is_empty()) {
                self.full_content.push_str(&content);
                chunks.push(Chunk::delta(content, self.full_content.clone()));
            }
        }

        if let Some(usage) = response.usage {
            self.usage = Some(TokenUsage {
                prompt_tokens: usage.prompt_tokens,
                completion_tokens: usage.completion_tokens,
                total_tokens: usage.total_tokens,
            });
        }
        Ok(chunks)
    }

    /// Emit the pending tool-call chunk (if any) and the completion chunk.
    fn finish(&mut self) -> Result<Vec<Chunk>, ProviderError> {
        if self.finished {
            return Ok(Vec::new());
        }
        self.finished = true;

        let mut chunks = Vec::new();
        if !self.tool_calls.is_empty() {
            let calls = std::mem::take(&mut self.tool_calls)
                .into_values()
                .map(ToolCallAccumulator::into_tool_call)
                .collect::<Result<Vec<_>, _>>()?;
            chunks.push(Chunk::tool_calls(calls));
        }
        chunks.push(Chunk::completed(self.full_content.clone(), self.usage));
        Ok(chunks)
    }
}

// --- OpenAI API types (internal) ---

#[derive(Debug, Serialize, Deserialize)]
struct ApiMessage {
    role: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    content: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    tool_calls: Option<Vec<ApiToolCall>>,
    #[serde(skip_serializing_if = "Option::is_none")]
    tool_call_id: Option<String>,
}

#[derive(Debug, Serialize, Deserialize)]
struct ApiToolCall {
    id: String,
    r#type: String,
    function: ApiFunction,
}

#[derive(Debug, Serialize, Deserialize)]
struct ApiFunction {
    name: String,
    arguments: String,
}

#[derive(Debug, Serialize, Deserialize)]
struct ApiToolDefinition {
    r#type: String,
    function: ApiToolFunction,
}

#[derive(Debug, Serialize, Deserialize)]
struct ApiToolFunction {
    name: String,
    description: String,
    parameters: serde_json::Value,
}

#[derive(Debug, Deserialize)]
struct ApiUsage {
    prompt_tokens: u32,
    completion_tokens: u32,
    total_tokens: u32,
}

// --- Streaming SSE types ---

/// A single SSE `data: {...}` chunk from a streaming response.
#[derive(Debug, Deserialize)]
struct StreamResponse {
    #[serde(default)]
    choices: Vec<StreamChoice>,
    #[serde(default)]
    usage: Option<ApiUsage>,
}

#[derive(Debug, Deserialize)]
struct StreamChoice {
    delta: StreamDelta,
}

#[derive(Debug, Deserialize)]
struct StreamDelta {
    #[serde(default)]
    content: Option<String>,
    #[serde(default)]
    tool_calls: Option<Vec<StreamToolCallDelta>>,
}

/// A tool call delta: arrives incrementally across chunks.
#[derive(Debug, Deserialize)]
struct StreamToolCallDelta {
    index: u32,
    #[serde(default)]
    id: Option<String>,
    #[serde(default)]
    function: Option<StreamFunctionDelta>,
}

#[derive(Debug, Deserialize)]
struct StreamFunctionDelta {
    #[serde(default)]
    name: Option<String>,
    #[serde(default)]
    arguments: Option<String>,
}

/// Accumulates incremental tool call deltas into a complete tool call.
#[derive(Default)]
struct ToolCallAccumulator {
    id: String,
    name: String,
    arguments: String,
}

impl ToolCallAccumulator {
    fn into_tool_call(self) -> Result<ToolCall, ProviderError> {
        let arguments = if self.arguments.trim().is_empty() {
            ToolArgs::new()
        } else {
            serde_json::from_str::<ToolArgs>(&self.arguments).map_err(|e| {
                ProviderError::Deserialization(format!(
                    "arguments of tool call '{}' ({}): {e}",
                    self.name, self.id
                ))
            })?
        };
        Ok(ToolCall::new(self.id, self.name, arguments))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use agentrelay_core::provider::ChunkStatus;

    fn engine() -> OpenAiCompatEngine {
        OpenAiCompatEngine::new("openai", "https://api.openai.com/v1/", "sk-test", "gpt-4o").unwrap()
    }

    #[test]
    fn constructor_trims_base_url() {
        let engine = engine();
        assert_eq!(engine.name(), "openai");
        assert_eq!(engine.base_url(), "https://api.openai.com/v1");
    }

    #[test]
    fn message_conversion() {
        let messages = vec![Message::system("You are helpful"), Message::user("Hello")];
        let api_messages = OpenAiCompatEngine::to_api_messages(&messages);
        assert_eq!(api_messages.len(), 2);
        assert_eq!(api_messages[0].role, "system");
        assert_eq!(api_messages[1].role, "user");
    }

    #[test]
    fn message_conversion_with_tool_calls() {
        let args = serde_json::json!({"path": "notes.txt"}).as_object().cloned().unwrap();
        let msg = Message::assistant_with_tool_calls(
            "reading...",
            vec![ToolCall::new("call_1", "file_read", args)],
            None,
        );
        let api_msgs = OpenAiCompatEngine::to_api_messages(&[msg]);
        let tc = api_msgs[0].tool_calls.as_ref().unwrap();
        assert_eq!(tc[0].function.name, "file_read");
        assert_eq!(tc[0].function.arguments, r#"{"path":"notes.txt"}"#);
    }

    #[test]
    fn message_conversion_tool_response() {
        let msg = Message::tool_result("call_1", "result data");
        let api_msgs = OpenAiCompatEngine::to_api_messages(&[msg]);
        assert_eq!(api_msgs[0].role, "tool");
        assert_eq!(api_msgs[0].tool_call_id.as_deref(), Some("call_1"));
    }

    #[test]
    fn request_body_includes_tools_and_limits() {
        let engine = engine().with_max_tokens(Some(256));
        let tools = vec![ToolDefinition {
            name: "calculator".into(),
            description: "Do math".into(),
            parameters: serde_json::json!({"type": "object"}),
        }];
        let body = engine.request_body(&[Message::user("2+2")], &tools);
        assert_eq!(body["stream"], true);
        assert_eq!(body["max_tokens"], 256);
        assert_eq!(body["tools"][0]["type"], "function");
        assert_eq!(body["tools"][0]["function"]["name"], "calculator");

        let bare = engine.request_body(&[Message::user("hi")], &[]);
        assert!(bare.get("tools").is_none());
    }

    // --- SSE turn tests ---

    #[test]
    fn content_deltas_accumulate_full_text() {
        let mut turn = SseTurn::default();
        let a = turn
            .feed(r#"{"choices":[{"delta":{"content":"Hel"},"finish_reason":null}]}"#)
            .unwrap();
        let b = turn
            .feed(r#"{"choices":[{"delta":{"content":"lo"},"finish_reason":null}]}"#)
            .unwrap();
        assert_eq!(a[0].content, "Hel");
        assert_eq!(b[0].content, "lo");
        assert_eq!(b[0].full_content, "Hello");

        turn.feed(r#"{"choices":[],"usage":{"prompt_tokens":10,"completion_tokens":5,"total_tokens":15}}"#)
            .unwrap();
        let done = turn.feed("[DONE]").unwrap();
        assert_eq!(done.len(), 1);
        assert_eq!(done[0].status, ChunkStatus::Completed);
        assert_eq!(done[0].full_content, "Hello");
        assert_eq!(done[0].usage.unwrap().total_tokens, 15);
        assert!(turn.is_finished());
    }

    #[test]
    fn tool_call_fragments_assemble_in_index_order() {
        let mut turn = SseTurn::default();
        turn.feed(r#"{"choices":[{"delta":{"tool_calls":[{"index":1,"id":"call_b","function":{"name":"expand","arguments":""}},{"index":0,"id":"call_a","function":{"name":"calculator","arguments":"{\"expr"}}]}}]}"#)
            .unwrap();
        turn.feed(r#"{"choices":[{"delta":{"tool_calls":[{"index":0,"function":{"arguments":"ession\": \"2+2\"}"}}]}}]}"#)
            .unwrap();

        let chunks = turn.feed("[DONE]").unwrap();
        assert_eq!(chunks.len(), 2);
        assert_eq!(chunks[0].status, ChunkStatus::ToolCall);
        let calls = &chunks[0].tool_calls;
        assert_eq!(calls[0].id, "call_a");
        assert_eq!(calls[0].arguments["expression"], "2+2");
        assert_eq!(calls[1].name, "expand");
        assert!(calls[1].arguments.is_empty());
        assert_eq!(chunks[1].status, ChunkStatus::Completed);
    }

    #[test]
    fn malformed_tool_arguments_are_rejected() {
        let mut turn = SseTurn::default();
        turn.feed(r#"{"choices":[{"delta":{"tool_calls":[{"index":0,"id":"c","function":{"name":"x","arguments":"{oops"}}]}}]}"#)
            .unwrap();
        assert!(matches!(
            turn.feed("[DONE]"),
            Err(ProviderError::Deserialization(_))
        ));
    }

    #[test]
    fn unparseable_chunk_is_a_deserialization_error() {
        let mut turn = SseTurn::default();
        let err = turn.feed("{not json").unwrap_err();
        assert!(matches!(err, ProviderError::Deserialization(_)));
    }

    #[test]
    fn empty_delta_yields_nothing() {
        let mut turn = SseTurn::default();
        let chunks = turn
            .feed(r#"{"choices":[{"delta":{},"finish_reason":"stop"}]}"#)
            .unwrap();
        assert!(chunks.is_empty());
    }

    #[test]
    fn finish_is_idempotent() {
        let mut turn = SseTurn::default();
        assert_eq!(turn.finish().unwrap().len(), 1);
        assert!(turn.finish().unwrap().is_empty());
    }

    #[test]
    fn multibyte_character_split_across_network_chunks() {
        let line = "data: {\"choices\":[{\"delta\":{\"content\":\"caf\u{e9}\"},\"finish_reason\":null}]}\r\n".to_string();
        let bytes = line.as_bytes();
        // Split inside the two-byte encoding of 'é'.
        let split = line.find('\u{e9}').unwrap() + 1;

        let mut lines = SseLines::default();
        assert!(lines.push(&bytes[..split]).unwrap().is_empty());
        let complete = lines.push(&bytes[split..]).unwrap();
        assert_eq!(complete.len(), 1);
        assert!(!complete[0].contains('\u{fffd}'));

        let mut turn = SseTurn::default();
        let data = complete[0].strip_prefix("data:").unwrap().trim();
        assert_eq!(turn.feed(data).unwrap()[0].content, "caf\u{e9}");
    }

    #[test]
    fn invalid_utf8_line_is_a_deserialization_error() {
        let mut lines = SseLines::default();
        let err = lines.push(b"data: \xff\n").unwrap_err();
        assert!(matches!(err, ProviderError::Deserialization(_)));
    }
}
