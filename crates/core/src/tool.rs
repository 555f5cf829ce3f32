//! Tool trait: the abstraction over agent capabilities.
//!
//! Tools are what give the agent the ability to act: evaluate arithmetic,
//! read/write files, introspect its peers, delegate to sub-agents, etc.

use async_trait::async_trait;
use serde::{Deserialize, Serialize};
use serde_json::{Map, Value, json};
use std::fmt;
use std::sync::Arc;

use crate::context::ToolContext;
use crate::error::ToolError;
use crate::provider::ToolDefinition;

/// Structured tool arguments, keyed by parameter name.
pub type ToolArgs = Map<String, Value>;

/// A request to execute a tool, as issued by the model.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ToolCall {
    /// Unique call ID (matches the model's tool_call.id)
    pub id: String,

    /// Name of the tool to execute
    pub name: String,

    /// Arguments as a JSON object
    #[serde(default)]
    pub arguments: ToolArgs,
}

impl ToolCall {
    pub fn new(id: impl Into<String>, name: impl Into<String>, arguments: ToolArgs) -> Self {
        Self {
            id: id.into(),
            name: name.into(),
            arguments,
        }
    }
}

/// JSON type a parameter is declared with.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum ParamType {
    String,
    Number,
    Integer,
    Boolean,
    Object,
    Array,
}

impl ParamType {
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::String => "string",
            Self::Number => "number",
            Self::Integer => "integer",
            Self::Boolean => "boolean",
            Self::Object => "object",
            Self::Array => "array",
        }
    }
}

impl fmt::Display for ParamType {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Custom check run after the type check. The error string becomes the failure message.
pub type Validator = Arc<dyn Fn(&Value) -> Result<(), String> + Send + Sync>;

/// A declared tool parameter.
#[derive(Clone)]
pub struct Parameter {
    pub name: String,
    pub kind: ParamType,
    pub description: String,
    pub required: bool,
    pub validator: Option<Validator>,
}

impl Parameter {
    pub fn required(name: impl Into<String>, kind: ParamType, description: impl Into<String>) -> Self {
        Self {
            name: name.into(),
            kind,
            description: description.into(),
            required: true,
            validator: None,
        }
    }

    pub fn optional(name: impl Into<String>, kind: ParamType, description: impl Into<String>) -> Self {
        Self {
            required: false,
            ..Self::required(name, kind, description)
        }
    }

    pub fn with_validator<F>(mut self, validator: F) -> Self
    where
        F: Fn(&Value) -> Result<(), String> + Send + Sync + 'static,
    {
        self.validator = Some(Arc::new(validator));
        self
    }
}

impl fmt::Debug for Parameter {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Parameter")
            .field("name", &self.name)
            .field("kind", &self.kind)
            .field("required", &self.required)
            .field("validator", &self.validator.is_some())
            .finish()
    }
}

/// Progressive-disclosure descriptions of a tool or agent.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct Discovery {
    /// One-line summary, always shown
    pub basic: String,
    /// Long-form usage notes, shown on request
    #[serde(default)]
    pub advanced: String,
    /// Known failure modes and fixes
    #[serde(default)]
    pub troubleshooting: String,
}

impl Discovery {
    pub fn new(basic: impl Into<String>) -> Self {
        Self {
            basic: basic.into(),
            ..Self::default()
        }
    }

    pub fn with_advanced(mut self, advanced: impl Into<String>) -> Self {
        self.advanced = advanced.into();
        self
    }

    pub fn with_troubleshooting(mut self, troubleshooting: impl Into<String>) -> Self {
        self.troubleshooting = troubleshooting.into();
        self
    }
}

/// What a tool handler returns.
#[derive(Debug, Clone, PartialEq, Eq, Default)]
pub struct ToolOutput {
    pub success: bool,
    pub result: String,
    pub error: String,
}

impl ToolOutput {
    pub fn success(result: impl Into<String>) -> Self {
        Self {
            success: true,
            result: result.into(),
            error: String::new(),
        }
    }

    pub fn error(error: impl Into<String>) -> Self {
        Self::failure(error, String::new())
    }

    /// A failed call that still produced some data.
    pub fn failure(error: impl Into<String>, partial: impl Into<String>) -> Self {
        Self {
            success: false,
            result: partial.into(),
            error: error.into(),
        }
    }
}

/// The normalized result of one tool call.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ToolOutcome {
    pub tool_call_id: String,
    pub tool_name: String,
    pub success: bool,
    #[serde(default)]
    pub result: String,
    #[serde(default)]
    pub error: String,
}

impl ToolOutcome {
    pub fn from_output(call: &ToolCall, output: ToolOutput) -> Self {
        Self {
            tool_call_id: call.id.clone(),
            tool_name: call.name.clone(),
            success: output.success,
            result: output.result,
            error: output.error,
        }
    }

    pub fn failed(call: &ToolCall, error: impl Into<String>) -> Self {
        Self::from_output(call, ToolOutput::error(error))
    }

    /// Text the model sees in the tool message for this outcome.
    pub fn history_content(&self) -> String {
        match (self.success, self.result.is_empty()) {
            (true, _) => self.result.clone(),
            (false, true) => format!("Error: {}", self.error),
            (false, false) => format!("Error: {}\nPartial result:\n{}", self.error, self.result),
        }
    }
}

/// The core Tool trait.
///
/// Each tool (calculator, file_read, expand, delegate, ...) implements this
/// trait. Arguments reach `call` only after they passed validation against
/// `parameters()`.
#[async_trait]
pub trait Tool: Send + Sync {
    /// The unique, case-sensitive name of this tool.
    fn name(&self) -> &str;

    /// A description of what this tool does (sent to the model).
    fn description(&self) -> &str;

    /// Declared parameters, checked before every call.
    fn parameters(&self) -> &[Parameter];

    /// Extra descriptions for the `expand` tool. Tools opt in by returning `Some`.
    fn discovery(&self) -> Option<&Discovery> {
        None
    }

    /// Execute the tool with validated arguments.
    async fn call(&self, ctx: &ToolContext, args: ToolArgs) -> Result<ToolOutput, ToolError>;

    /// Convert this tool into a ToolDefinition for sending to the model.
    fn to_definition(&self) -> ToolDefinition {
        ToolDefinition {
            name: self.name().to_string(),
            description: self.description().to_string(),
            parameters: parameters_schema(self.parameters()),
        }
    }
}

/// Render declared parameters as a JSON Schema object.
pub fn parameters_schema(params: &[Parameter]) -> Value {
    let properties: Map<String, Value> = params
        .iter()
        .map(|p| {
            (
                p.name.clone(),
                json!({ "type": p.kind.as_str(), "description": p.description }),
            )
        })
        .collect();
    let required: Vec<&str> = params
        .iter()
        .filter(|p| p.required)
        .map(|p| p.name.as_str())
        .collect();

    json!({
        "type": "object",
        "properties": properties,
        "required": required,
    })
}

/// An ordered set of tools with exact-name lookup.
///
/// Cheap to clone: agents snapshot their registry at the start of each run.
#[derive(Clone, Default)]
pub struct ToolRegistry {
    tools: Vec<Arc<dyn Tool>>,
}

impl ToolRegistry {
    pub fn new() -> Self {
        Self { tools: Vec::new() }
    }

    /// Register a tool. Replaces any existing tool with the same name, keeping its position.
    pub fn register(&mut self, tool: Arc<dyn Tool>) {
        match self.tools.iter().position(|t| t.name() == tool.name()) {
            Some(index) => self.tools[index] = tool,
            None => self.tools.push(tool),
        }
    }

    pub fn with(mut self, tool: Arc<dyn Tool>) -> Self {
        self.register(tool);
        self
    }

    /// Get a tool by exact name.
    pub fn get(&self, name: &str) -> Option<Arc<dyn Tool>> {
        self.tools.iter().find(|t| t.name() == name).cloned()
    }

    /// Get all tool definitions (for sending to the model).
    pub fn definitions(&self) -> Vec<ToolDefinition> {
        self.tools.iter().map(|t| t.to_definition()).collect()
    }

    /// List all registered tool names, in registration order.
    pub fn names(&self) -> Vec<&str> {
        self.tools.iter().map(|t| t.name()).collect()
    }

    pub fn iter(&self) -> impl Iterator<Item = &Arc<dyn Tool>> {
        self.tools.iter()
    }

    pub fn len(&self) -> usize {
        self.tools.len()
    }

    pub fn is_empty(&self) -> bool {
        self.tools.is_empty()
    }

    /// Build a registry holding only the named tools, in the order given.
    pub fn select<S: AsRef<str>>(&self, names: &[S]) -> Result<ToolRegistry, ToolError> {
        let mut selected = ToolRegistry::new();
        let mut unknown = Vec::new();
        for name in names {
            match self.get(name.as_ref()) {
                Some(tool) => selected.register(tool),
                None => unknown.push(name.as_ref().to_string()),
            }
        }
        if unknown.is_empty() {
            Ok(selected)
        } else {
            Err(ToolError::UnknownSelection(unknown.join(", ")))
        }
    }
}

impl fmt::Debug for ToolRegistry {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_list().entries(self.names()).finish()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    struct EchoTool {
        params: Vec<Parameter>,
    }

    impl EchoTool {
        fn new() -> Self {
            Self {
                params: vec![Parameter::required("text", ParamType::String, "Text to echo")],
            }
        }
    }

    #[async_trait]
    impl Tool for EchoTool {
        fn name(&self) -> &str { "echo" }
        fn description(&self) -> &str { "Echoes back the input" }
        fn parameters(&self) -> &[Parameter] { &self.params }
        async fn call(&self, _ctx: &ToolContext, args: ToolArgs) -> Result<ToolOutput, ToolError> {
            Ok(ToolOutput::success(args["text"].as_str().unwrap_or_default()))
        }
    }

    #[test]
    fn registry_register_and_lookup() {
        let registry = ToolRegistry::new().with(Arc::new(EchoTool::new()));
        assert!(registry.get("echo").is_some());
        assert!(registry.get("Echo").is_none());
        assert!(registry.get("nonexistent").is_none());
    }

    #[test]
    fn register_replaces_same_name_in_place() {
        let mut registry = ToolRegistry::new();
        registry.register(Arc::new(EchoTool::new()));
        registry.register(Arc::new(EchoTool::new()));
        assert_eq!(registry.len(), 1);
    }

    #[test]
    fn definitions_carry_json_schema() {
        let registry = ToolRegistry::new().with(Arc::new(EchoTool::new()));
        let defs = registry.definitions();
        assert_eq!(defs.len(), 1);
        assert_eq!(defs[0].name, "echo");
        assert_eq!(defs[0].parameters["properties"]["text"]["type"], "string");
        assert_eq!(defs[0].parameters["required"][0], "text");
    }

    #[test]
    fn select_reports_unknown_names() {
        let registry = ToolRegistry::new().with(Arc::new(EchoTool::new()));
        assert_eq!(registry.select(&["echo"]).unwrap().len(), 1);

        let err = registry.select(&["echo", "shell", "web"]).unwrap_err();
        assert!(err.to_string().contains("shell, web"));
    }

    #[test]
    fn outcome_history_content() {
        let call = ToolCall::new("c1", "echo", ToolArgs::new());
        let ok = ToolOutcome::from_output(&call, ToolOutput::success("hi"));
        assert_eq!(ok.history_content(), "hi");

        let failed = ToolOutcome::failed(&call, "boom");
        assert_eq!(failed.history_content(), "Error: boom");

        let partial = ToolOutcome::from_output(&call, ToolOutput::failure("cut off", "half"));
        assert!(partial.history_content().contains("half"));
    }

    #[test]
    fn outcome_serializes_camel_case() {
        let call = ToolCall::new("c1", "echo", ToolArgs::new());
        let json = serde_json::to_value(ToolOutcome::failed(&call, "x")).unwrap();
        assert_eq!(json["toolCallId"], "c1");
        assert_eq!(json["toolName"], "echo");
        assert_eq!(json["success"], false);
    }
}
