//! Agents: a configured model, tool set, sub-agent set and history that
//! turn user messages into event streams.

use agentrelay_config::AgentSettings;
use agentrelay_core::agent::{DEFAULT_MAX_DELEGATION_DEPTH, DelegationScope, SubAgent};
use agentrelay_core::context::{Capability, ToolContext};
use agentrelay_core::error::Error;
use agentrelay_core::event::{EventStream, channel};
use agentrelay_core::history::HistoryStore;
use agentrelay_core::message::{History, Message};
use agentrelay_core::provider::LlmEngine;
use agentrelay_core::tool::{Discovery, Tool, ToolRegistry};
use agentrelay_core::CancellationToken;
use agentrelay_tools::DelegateTool;
use serde_json::Value;
use std::collections::HashMap;
use std::sync::{Arc, PoisonError, RwLock};
use tokio::sync::Mutex;
use tracing::{debug, warn};

use crate::dispatcher::ToolDispatcher;
use crate::engine::ChatEngine;
use crate::prompt;
use crate::template::reasoning_template;

pub const DEFAULT_TRACE: &str = "response";
pub const DEFAULT_MAX_TOOL_ITERATIONS: u32 = 10;

/// A model-backed agent. Cloning is cheap and clones share history.
#[derive(Clone)]
pub struct Agent {
    inner: Arc<AgentInner>,
}

struct AgentInner {
    name: String,
    trace: String,
    discovery: Discovery,
    system_prompt: Arc<str>,
    main_agent: bool,
    llm: Arc<dyn LlmEngine>,
    tools: RwLock<ToolRegistry>,
    delegate: Option<Arc<DelegateTool>>,
    sub_agents: Vec<Arc<dyn SubAgent>>,
    max_tool_iterations: u32,
    max_delegation_depth: usize,
    custom: Arc<HashMap<String, Value>>,
    store: Option<Arc<dyn HistoryStore>>,
    state: Mutex<HistoryState>,
}

#[derive(Default)]
struct HistoryState {
    history: History,
    hydrated: bool,
}

impl Agent {
    pub fn builder(name: impl Into<String>, llm: Arc<dyn LlmEngine>) -> AgentBuilder {
        AgentBuilder::new(name, llm)
    }

    pub fn name(&self) -> &str {
        &self.inner.name
    }

    pub fn trace(&self) -> &str {
        &self.inner.trace
    }

    pub fn discovery(&self) -> &Discovery {
        &self.inner.discovery
    }

    pub fn system_prompt(&self) -> &str {
        &self.inner.system_prompt
    }

    pub fn is_main_agent(&self) -> bool {
        self.inner.main_agent
    }

    pub fn sub_agents(&self) -> &[Arc<dyn SubAgent>] {
        &self.inner.sub_agents
    }

    /// Current tool set, including `delegate` when the agent has sub-agents.
    pub fn tools(&self) -> ToolRegistry {
        let registry = self
            .inner
            .tools
            .read()
            .unwrap_or_else(PoisonError::into_inner)
            .clone();
        match &self.inner.delegate {
            Some(delegate) => registry.with(delegate.clone()),
            None => registry,
        }
    }

    /// Replace the tool set. Runs already in flight keep the set they started with.
    pub fn set_tools(&self, tools: ToolRegistry) {
        *self
            .inner
            .tools
            .write()
            .unwrap_or_else(PoisonError::into_inner) = tools;
    }

    /// Start a run. The returned stream ends after `completed` or `error`.
    pub fn run(&self, message: impl Into<String>) -> EventStream {
        self.run_with_cancel(message, CancellationToken::new())
    }

    /// Start a run that stops when `cancel` fires. A cancelled run closes
    /// its stream without a terminal event.
    pub fn run_with_cancel(&self, message: impl Into<String>, cancel: CancellationToken) -> EventStream {
        let scope = DelegationScope::root(&self.inner.name, self.inner.max_delegation_depth, cancel);
        self.start(message.into(), scope)
    }

    pub async fn history_snapshot(&self) -> Vec<Message> {
        self.inner.state.lock().await.history.messages().to_vec()
    }

    /// Forget the conversation. The next run starts from the system prompt.
    pub async fn clear_history(&self) {
        let mut state = self.inner.state.lock().await;
        state.history.clear();
        state.hydrated = true;
        if let Some(store) = &self.inner.store
            && let Err(e) = store.save_history(&[]).await
        {
            warn!(agent = %self.inner.name, error = %e, "failed to persist cleared history");
        }
    }

    fn start(&self, message: String, scope: DelegationScope) -> EventStream {
        let (events, stream) = channel(
            self.inner.name.as_str(),
            self.inner.trace.as_str(),
            scope.cancellation().clone(),
        );
        let agent = self.clone();

        tokio::spawn(async move {
            // Held for the whole run: concurrent runs on one agent queue up here.
            let mut state = agent.inner.state.lock().await;
            agent.hydrate(&mut state).await;

            let tools = agent.tools();
            let ctx = ToolContext::new(events, scope)
                .with_custom(agent.inner.custom.clone())
                .with_tools(tool_capabilities(&tools))
                .with_sub_agents(sub_agent_capabilities(&agent.inner.sub_agents));

            let engine = ChatEngine::new(
                agent.inner.llm.clone(),
                ToolDispatcher::new(tools),
                agent.inner.system_prompt.clone(),
                agent.inner.max_tool_iterations,
            )
            .with_store(agent.inner.store.clone());

            engine.run(&mut state.history, message, &ctx).await;
        });

        stream
    }

    /// Load persisted history once, on the first run of an empty agent.
    async fn hydrate(&self, state: &mut HistoryState) {
        if state.hydrated {
            return;
        }
        state.hydrated = true;
        let Some(store) = &self.inner.store else {
            return;
        };
        if !state.history.is_empty() {
            return;
        }

        match store.get_history(0, 0).await {
            Ok(messages) if messages.is_empty() => {}
            Ok(messages) => match History::from_messages(messages) {
                Ok(history) => {
                    debug!(agent = %self.inner.name, messages = history.len(), "history restored");
                    state.history = history;
                }
                Err(e) => warn!(agent = %self.inner.name, error = %e, "stored history rejected"),
            },
            Err(e) => warn!(agent = %self.inner.name, error = %e, "failed to load history"),
        }
    }
}

impl SubAgent for Agent {
    fn name(&self) -> &str {
        &self.inner.name
    }

    fn trace(&self) -> &str {
        &self.inner.trace
    }

    fn discovery(&self) -> &Discovery {
        &self.inner.discovery
    }

    fn delegate(&self, message: String, scope: DelegationScope) -> EventStream {
        self.start(message, scope)
    }
}

impl std::fmt::Debug for Agent {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Agent")
            .field("name", &self.inner.name)
            .field("trace", &self.inner.trace)
            .field("engine", &self.inner.llm.name())
            .field("sub_agents", &self.inner.sub_agents.len())
            .finish()
    }
}

fn tool_capabilities(tools: &ToolRegistry) -> Vec<Capability> {
    tools
        .iter()
        .map(|tool| Capability {
            name: tool.name().to_string(),
            description: tool.description().to_string(),
            discovery: tool.discovery().cloned(),
        })
        .collect()
}

fn sub_agent_capabilities(sub_agents: &[Arc<dyn SubAgent>]) -> Vec<Capability> {
    sub_agents
        .iter()
        .map(|agent| Capability {
            name: agent.name().to_string(),
            description: agent.discovery().basic.clone(),
            discovery: Some(agent.discovery().clone()),
        })
        .collect()
}

/// Builder for [`Agent`].
pub struct AgentBuilder {
    name: String,
    llm: Arc<dyn LlmEngine>,
    trace: String,
    discovery: Discovery,
    system_prompt: Option<String>,
    main_agent: bool,
    tools: ToolRegistry,
    sub_agents: Vec<Arc<dyn SubAgent>>,
    max_tool_iterations: u32,
    max_delegation_depth: usize,
    custom: HashMap<String, Value>,
    store: Option<Arc<dyn HistoryStore>>,
}

impl AgentBuilder {
    pub fn new(name: impl Into<String>, llm: Arc<dyn LlmEngine>) -> Self {
        Self {
            name: name.into(),
            llm,
            trace: DEFAULT_TRACE.to_string(),
            discovery: Discovery::default(),
            system_prompt: None,
            main_agent: true,
            tools: ToolRegistry::new(),
            sub_agents: Vec::new(),
            max_tool_iterations: DEFAULT_MAX_TOOL_ITERATIONS,
            max_delegation_depth: DEFAULT_MAX_DELEGATION_DEPTH,
            custom: HashMap::new(),
            store: None,
        }
    }

    /// Builder preloaded from an `[agent]` / `[[sub_agents]]` config section.
    /// Tools, sub-agents and the history store are wired by the caller.
    pub fn from_settings(settings: &AgentSettings, llm: Arc<dyn LlmEngine>) -> Self {
        let mut builder = Self::new(&settings.name, llm)
            .with_trace(&settings.trace)
            .with_discovery(
                Discovery::new(&settings.description)
                    .with_advanced(&settings.advanced_description)
                    .with_troubleshooting(&settings.troubleshooting),
            )
            .with_main_agent(settings.main_agent)
            .with_max_tool_iterations(settings.max_tool_iterations)
            .with_max_delegation_depth(settings.max_delegation_depth);
        if let Some(prompt) = &settings.system_prompt {
            builder = builder.with_system_prompt(prompt);
        }
        for (key, value) in &settings.context {
            builder = builder.with_context(key, value.clone());
        }
        builder
    }

    pub fn with_trace(mut self, trace: impl Into<String>) -> Self {
        self.trace = trace.into();
        self
    }

    pub fn with_system_prompt(mut self, prompt: impl Into<String>) -> Self {
        self.system_prompt = Some(prompt.into());
        self
    }

    pub fn with_discovery(mut self, discovery: Discovery) -> Self {
        self.discovery = discovery;
        self
    }

    pub fn with_description(mut self, basic: impl Into<String>) -> Self {
        self.discovery.basic = basic.into();
        self
    }

    pub fn with_main_agent(mut self, main_agent: bool) -> Self {
        self.main_agent = main_agent;
        self
    }

    pub fn with_tools(mut self, tools: ToolRegistry) -> Self {
        self.tools = tools;
        self
    }

    pub fn with_tool(mut self, tool: Arc<dyn Tool>) -> Self {
        self.tools.register(tool);
        self
    }

    pub fn with_sub_agent(mut self, sub_agent: Arc<dyn SubAgent>) -> Self {
        self.sub_agents.push(sub_agent);
        self
    }

    /// Add the built-in reasoning agent as a sub-agent, backed by `llm`.
    pub fn with_reasoning(self, llm: Arc<dyn LlmEngine>) -> Result<Self, Error> {
        let reasoning = reasoning_template()
            .builder(llm)
            .with_max_delegation_depth(self.max_delegation_depth)
            .build()?;
        Ok(self.with_sub_agent(Arc::new(reasoning)))
    }

    pub fn with_max_tool_iterations(mut self, max: u32) -> Self {
        self.max_tool_iterations = max;
        self
    }

    pub fn with_max_delegation_depth(mut self, depth: usize) -> Self {
        self.max_delegation_depth = depth;
        self
    }

    /// A value handed to tools through [`ToolContext::custom_value`].
    pub fn with_context(mut self, key: impl Into<String>, value: Value) -> Self {
        self.custom.insert(key.into(), value);
        self
    }

    pub fn with_history_store(mut self, store: Arc<dyn HistoryStore>) -> Self {
        self.store = Some(store);
        self
    }

    pub fn build(self) -> Result<Agent, Error> {
        if self.name.trim().is_empty() {
            return Err(Error::Config {
                message: "agent name must not be empty".into(),
            });
        }
        if self.max_tool_iterations == 0 {
            return Err(Error::Config {
                message: format!("agent '{}': max_tool_iterations must be > 0", self.name),
            });
        }
        let mut seen = std::collections::HashSet::new();
        if let Some(duplicate) = self.sub_agents.iter().find(|a| !seen.insert(a.name())) {
            return Err(Error::Config {
                message: format!(
                    "agent '{}': duplicate sub-agent '{}'",
                    self.name,
                    duplicate.name()
                ),
            });
        }

        let system_prompt = prompt::compose(
            self.system_prompt.as_deref(),
            self.main_agent,
            &self.sub_agents,
        );
        let delegate = (!self.sub_agents.is_empty())
            .then(|| Arc::new(DelegateTool::new(self.sub_agents.clone())));

        Ok(Agent {
            inner: Arc::new(AgentInner {
                name: self.name,
                trace: self.trace,
                discovery: self.discovery,
                system_prompt: Arc::from(system_prompt),
                main_agent: self.main_agent,
                llm: self.llm,
                tools: RwLock::new(self.tools),
                delegate,
                sub_agents: self.sub_agents,
                max_tool_iterations: self.max_tool_iterations,
                max_delegation_depth: self.max_delegation_depth,
                custom: Arc::new(self.custom),
                store: self.store,
                state: Mutex::new(HistoryState::default()),
            }),
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use agentrelay_core::error::ToolError;
    use agentrelay_core::event::{Event, EventKind};
    use agentrelay_core::message::Role;
    use agentrelay_core::tool::{ParamType, Parameter, ToolArgs, ToolOutput};
    use agentrelay_history::InMemoryHistory;
    use agentrelay_providers::mock::{ScriptedEngine, call, text_turn, tool_call_turn};
    use agentrelay_tools::calculator::CalculatorTool;
    use async_trait::async_trait;
    use serde_json::json;

    struct EchoTool {
        params: Vec<Parameter>,
    }

    impl EchoTool {
        fn new() -> Arc<Self> {
            Arc::new(Self {
                params: vec![Parameter::required("text", ParamType::String, "Text to echo")],
            })
        }
    }

    #[async_trait]
    impl Tool for EchoTool {
        fn name(&self) -> &str {
            "echo"
        }

        fn description(&self) -> &str {
            "Echo the input"
        }

        fn parameters(&self) -> &[Parameter] {
            &self.params
        }

        async fn call(&self, ctx: &ToolContext, args: ToolArgs) -> Result<ToolOutput, ToolError> {
            let text = args["text"].as_str().unwrap_or_default();
            let suffix = ctx
                .custom_value("suffix")
                .and_then(|v| v.as_str())
                .unwrap_or_default();
            Ok(ToolOutput::success(format!("{text}{suffix}")))
        }
    }

    fn statuses(events: &[Event]) -> Vec<&'static str> {
        events.iter().map(|e| e.kind.status()).collect()
    }

    fn final_content(events: &[Event]) -> &str {
        match events.last().map(|e| &e.kind) {
            Some(EventKind::Completed { full_content, .. }) => full_content,
            other => panic!("expected completed, got {other:?}"),
        }
    }

    #[tokio::test]
    async fn echo_round_trip_streams_every_stage() {
        let llm = Arc::new(ScriptedEngine::new(vec![
            tool_call_turn("Echoing.", vec![call("c1", "echo", json!({"text": "ping"}))]),
            text_turn("got ping!"),
        ]));
        let agent = Agent::builder("main", llm.clone())
            .with_tool(EchoTool::new())
            .with_context("suffix", json!("!"))
            .build()
            .unwrap();

        let events = agent.run("echo ping").collect_all().await;

        assert_eq!(
            statuses(&events),
            [
                "streaming",
                "tool-call",
                "tool-executing",
                "tool-result",
                "streaming",
                "streaming",
                "completed"
            ]
        );
        assert!(events.iter().all(|e| e.agent_name == "main" && e.trace == "response"));
        let EventKind::ToolResult { outcome } = &events[3].kind else {
            panic!("expected tool result");
        };
        assert!(outcome.success);
        assert_eq!(outcome.result, "ping!");
        assert_eq!(final_content(&events), "got ping!");

        let history = agent.history_snapshot().await;
        let roles: Vec<Role> = history.iter().map(|m| m.role).collect();
        assert_eq!(
            roles,
            [Role::System, Role::User, Role::Assistant, Role::Tool, Role::Assistant]
        );
        assert_eq!(history[3].content, "ping!");
        assert_eq!(llm.advertised_tools()[0], ["echo"]);
    }

    #[tokio::test]
    async fn unknown_tool_is_reported_and_the_run_continues() {
        let llm = Arc::new(ScriptedEngine::new(vec![
            tool_call_turn("", vec![call("c1", "missing", json!({}))]),
            text_turn("sorry"),
        ]));
        let agent = Agent::builder("main", llm.clone()).build().unwrap();

        let events = agent.run("go").collect_all().await;

        let outcome = events
            .iter()
            .find_map(|e| match &e.kind {
                EventKind::ToolResult { outcome } => Some(outcome.clone()),
                _ => None,
            })
            .unwrap();
        assert!(!outcome.success);
        assert_eq!(outcome.error, "tool not found: missing");
        assert_eq!(final_content(&events), "sorry");

        let tool_message = &llm.requests()[1][3];
        assert_eq!(tool_message.role, Role::Tool);
        assert_eq!(tool_message.content, "Error: tool not found: missing");
    }

    #[tokio::test]
    async fn delegation_forwards_child_events_with_child_identity() {
        let child = Agent::builder("researcher", Arc::new(ScriptedEngine::text("facts here")))
            .with_trace("research")
            .with_description("finds facts")
            .with_main_agent(false)
            .build()
            .unwrap();
        let llm = Arc::new(ScriptedEngine::new(vec![
            tool_call_turn(
                "",
                vec![call("d1", "delegate", json!({"subAgent": "researcher", "message": "find"}))],
            ),
            text_turn("summary"),
        ]));
        let parent = Agent::builder("main", llm.clone())
            .with_sub_agent(Arc::new(child.clone()))
            .build()
            .unwrap();

        let events = parent.run("research this").collect_all().await;

        assert_eq!(
            statuses(&events),
            [
                "tool-call",
                "tool-executing",
                "delegation-start",
                "streaming",
                "streaming",
                "completed",
                "delegation-end",
                "tool-result",
                "streaming",
                "completed"
            ]
        );
        for event in &events[3..6] {
            assert_eq!(event.agent_name, "researcher");
            assert_eq!(event.trace, "research");
        }
        assert_eq!(events[2].agent_name, "main");
        let EventKind::ToolResult { outcome } = &events[7].kind else {
            panic!("expected tool result");
        };
        assert_eq!(outcome.result, "facts here");
        assert_eq!(final_content(&events), "summary");

        assert_eq!(child.history_snapshot().await.len(), 3);
        assert!(parent.system_prompt().contains("- researcher: finds facts"));
        assert_eq!(llm.advertised_tools()[0], ["delegate"]);
    }

    #[tokio::test]
    async fn child_failure_becomes_a_failed_tool_result() {
        let child = Agent::builder(
            "flaky",
            Arc::new(ScriptedEngine::new(vec![vec![
                Ok(agentrelay_core::provider::Chunk::delta("half ", "half ")),
                Ok(agentrelay_core::provider::Chunk::error("model overloaded")),
            ]])),
        )
        .with_main_agent(false)
        .build()
        .unwrap();
        let llm = Arc::new(ScriptedEngine::new(vec![
            tool_call_turn(
                "",
                vec![call("d1", "delegate", json!({"subAgent": "flaky", "message": "try"}))],
            ),
            text_turn("it failed"),
        ]));
        let parent = Agent::builder("main", llm.clone())
            .with_sub_agent(Arc::new(child))
            .build()
            .unwrap();

        let events = parent.run("go").collect_all().await;

        assert!(statuses(&events).contains(&"delegation-failed"));
        let outcome = events
            .iter()
            .find_map(|e| match &e.kind {
                EventKind::ToolResult { outcome } => Some(outcome.clone()),
                _ => None,
            })
            .unwrap();
        assert!(!outcome.success);
        assert!(outcome.error.starts_with("delegation error:"), "{}", outcome.error);
        assert_eq!(outcome.result, "half ");
        assert!(llm.requests()[1][3].content.contains("Partial result:\nhalf "));
        assert_eq!(final_content(&events), "it failed");
    }

    #[tokio::test]
    async fn delegating_back_into_the_lineage_is_refused() {
        let impostor = Agent::builder("main", Arc::new(ScriptedEngine::text("never")))
            .with_main_agent(false)
            .build()
            .unwrap();
        let llm = Arc::new(ScriptedEngine::new(vec![
            tool_call_turn(
                "",
                vec![call("d1", "delegate", json!({"subAgent": "main", "message": "loop"}))],
            ),
            text_turn("ok"),
        ]));
        let parent = Agent::builder("main", llm)
            .with_sub_agent(Arc::new(impostor.clone()))
            .build()
            .unwrap();

        let events = parent.run("go").collect_all().await;

        assert!(!statuses(&events).contains(&"delegation-start"));
        let outcome = events
            .iter()
            .find_map(|e| match &e.kind {
                EventKind::ToolResult { outcome } => Some(outcome.clone()),
                _ => None,
            })
            .unwrap();
        assert!(outcome.error.contains("delegation cycle detected"));
        assert!(impostor.history_snapshot().await.is_empty());
        assert_eq!(final_content(&events), "ok");
    }

    #[tokio::test]
    async fn history_is_restored_from_the_store_once() {
        let store = InMemoryHistory::with_messages(vec![
            Message::system("remembered prompt"),
            Message::user("hi"),
            Message::assistant("hello", None),
        ]);
        let llm = Arc::new(ScriptedEngine::repeating(vec![text_turn("again")]));
        let agent = Agent::builder("main", llm.clone())
            .with_history_store(Arc::new(store.clone()))
            .build()
            .unwrap();

        agent.run("one").collect_all().await;
        agent.run("two").collect_all().await;

        let requests = llm.requests();
        assert_eq!(requests[0].len(), 4);
        assert_eq!(requests[0][0].content, "remembered prompt");
        assert_eq!(requests[1].len(), 6);
        assert_eq!(store.get_history(0, 0).await.unwrap().len(), 7);
    }

    #[tokio::test]
    async fn clear_history_starts_over_and_clears_the_store() {
        let store = InMemoryHistory::new();
        let llm = Arc::new(ScriptedEngine::repeating(vec![text_turn("answer")]));
        let agent = Agent::builder("main", llm.clone())
            .with_history_store(Arc::new(store.clone()))
            .build()
            .unwrap();

        agent.run("one").collect_all().await;
        assert_eq!(store.get_history(0, 0).await.unwrap().len(), 3);

        agent.clear_history().await;
        assert!(agent.history_snapshot().await.is_empty());
        assert!(store.get_history(0, 0).await.unwrap().is_empty());

        agent.run("two").collect_all().await;
        assert_eq!(llm.requests()[1].len(), 2);
    }

    #[tokio::test]
    async fn set_tools_applies_to_the_next_run_and_keeps_delegate() {
        let child = Agent::builder("helper", Arc::new(ScriptedEngine::text("x")))
            .build()
            .unwrap();
        let llm = Arc::new(ScriptedEngine::repeating(vec![text_turn("fine")]));
        let agent = Agent::builder("main", llm.clone())
            .with_tool(Arc::new(CalculatorTool::new()))
            .with_sub_agent(Arc::new(child))
            .build()
            .unwrap();
        assert_eq!(agent.tools().names(), ["calculator", "delegate"]);

        agent.run("first").collect_all().await;
        agent.set_tools(ToolRegistry::new().with(EchoTool::new()));
        agent.run("second").collect_all().await;

        let advertised = llm.advertised_tools();
        assert_eq!(advertised[0], ["calculator", "delegate"]);
        assert_eq!(advertised[1], ["echo", "delegate"]);
    }

    #[tokio::test]
    async fn concurrent_runs_on_one_agent_are_serialized() {
        let llm = Arc::new(ScriptedEngine::repeating(vec![text_turn("done")]));
        let agent = Agent::builder("main", llm.clone()).build().unwrap();

        let (a, b) = tokio::join!(agent.run("a").collect_all(), agent.run("b").collect_all());
        assert_eq!(final_content(&a), "done");
        assert_eq!(final_content(&b), "done");

        let mut sizes: Vec<usize> = llm.requests().iter().map(Vec::len).collect();
        sizes.sort_unstable();
        assert_eq!(sizes, [2, 4]);
        assert_eq!(agent.history_snapshot().await.len(), 5);
    }

    #[tokio::test]
    async fn cancelled_run_closes_without_a_terminal_event() {
        let llm = Arc::new(ScriptedEngine::repeating(vec![text_turn("never seen")]));
        let agent = Agent::builder("main", llm).build().unwrap();
        let cancel = CancellationToken::new();
        cancel.cancel();

        let events = agent.run_with_cancel("hello", cancel).collect_all().await;

        assert!(events.iter().all(|e| !e.is_terminal()));
    }

    /// Cancels the run it is called from.
    struct StopTool;

    #[async_trait]
    impl Tool for StopTool {
        fn name(&self) -> &str {
            "stop"
        }

        fn description(&self) -> &str {
            "Stop the current run"
        }

        fn parameters(&self) -> &[Parameter] {
            &[]
        }

        async fn call(&self, ctx: &ToolContext, _args: ToolArgs) -> Result<ToolOutput, ToolError> {
            ctx.scope().cancellation().cancel();
            Ok(ToolOutput::success("stopped"))
        }
    }

    #[tokio::test]
    async fn cancel_during_tools_answers_every_pending_call() {
        let llm = Arc::new(ScriptedEngine::new(vec![
            tool_call_turn(
                "",
                vec![
                    call("c1", "stop", json!({})),
                    call("c2", "echo", json!({"text": "later"})),
                ],
            ),
            text_turn("fresh start"),
        ]));
        let agent = Agent::builder("main", llm.clone())
            .with_tool(Arc::new(StopTool))
            .with_tool(EchoTool::new())
            .build()
            .unwrap();

        let events = agent
            .run_with_cancel("first", CancellationToken::new())
            .collect_all()
            .await;
        assert!(events.iter().all(|e| !e.is_terminal()));

        let history = agent.history_snapshot().await;
        let answered: Vec<(&str, &str)> = history
            .iter()
            .filter(|m| m.role == Role::Tool)
            .map(|m| (m.tool_call_id.as_deref().unwrap_or_default(), m.content.as_str()))
            .collect();
        assert_eq!(
            answered,
            [
                ("c1", "Error: interrupted: run cancelled"),
                ("c2", "Error: interrupted: run cancelled")
            ]
        );

        // The next run starts from a history the model accepts.
        let events = agent.run("second").collect_all().await;
        assert_eq!(final_content(&events), "fresh start");
        let roles: Vec<Role> = llm.requests()[1].iter().map(|m| m.role).collect();
        assert_eq!(
            roles,
            [Role::System, Role::User, Role::Assistant, Role::Tool, Role::Tool, Role::User]
        );
    }

    #[test]
    fn build_rejects_invalid_definitions() {
        let llm: Arc<dyn LlmEngine> = Arc::new(ScriptedEngine::text("x"));

        let err = Agent::builder("  ", llm.clone()).build().unwrap_err();
        assert!(err.to_string().contains("name must not be empty"));

        let err = Agent::builder("main", llm.clone())
            .with_max_tool_iterations(0)
            .build()
            .unwrap_err();
        assert!(err.to_string().contains("max_tool_iterations"));

        let twin = || {
            Arc::new(Agent::builder("twin", llm.clone()).build().unwrap()) as Arc<dyn SubAgent>
        };
        let err = Agent::builder("main", llm.clone())
            .with_sub_agent(twin())
            .with_sub_agent(twin())
            .build()
            .unwrap_err();
        assert!(err.to_string().contains("duplicate sub-agent 'twin'"));
    }

    #[test]
    fn builder_defaults() {
        let agent = Agent::builder("main", Arc::new(ScriptedEngine::text("x")))
            .build()
            .unwrap();
        assert_eq!(agent.trace(), DEFAULT_TRACE);
        assert!(agent.is_main_agent());
        assert!(agent.tools().is_empty());
        assert_eq!(agent.system_prompt(), prompt::DEFAULT_SYSTEM_PROMPT);
    }
}
