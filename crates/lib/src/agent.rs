//! Agent turn: filter skills, call the model, execute tool calls, record history.
//!
//! Each model round recomputes the visibility spec from the current registry snapshot,
//! offers only those skills' operations, and executes whatever the model calls. The
//! turn ends on a reply without tool calls or when `max_turns` rounds are used up.

use std::sync::Arc;

use crate::filter::{TurnContext, VisibilityFilter, VisibilitySpec};
use crate::llm::{ChatMessage, LlmBackend, LlmError, ToolCall};
use crate::prompt::generate_system_prompt;
use crate::retention::{RetentionError, TurnEntry};
use crate::session::{Session, SessionStore};
use crate::skills::{InvocationError, SkillDescriptor, SkillIndex, SkillRegistry};

/// Default number of model rounds per turn.
pub const DEFAULT_MAX_TURNS: usize = 5;

const FALLBACK_MODEL: &str = "llama3.2:latest";

/// Executes an operation by name with JSON arguments.
pub trait ToolExecutor: Send + Sync {
    fn execute(&self, name: &str, args: &serde_json::Value) -> Result<String, InvocationError>;
}

#[derive(Debug, thiserror::Error)]
pub enum AgentError {
    #[error(transparent)]
    Llm(#[from] LlmError),
    #[error("max turns must be at least 1")]
    InvalidBudget,
    #[error(transparent)]
    Retention(#[from] RetentionError),
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum TurnOutcome {
    /// The model replied without calling tools.
    FinalAnswer,
    /// The round budget ran out; the content is the last model output as-is.
    BudgetExhausted,
}

/// One executed (or rejected) tool call.
#[derive(Debug, Clone, PartialEq)]
pub struct ToolCallRecord {
    pub name: String,
    pub arguments: serde_json::Value,
    pub output: String,
    pub is_error: bool,
}

/// Result of one agent turn.
#[derive(Debug, Clone)]
pub struct AgentTurnResult {
    pub content: String,
    pub outcome: TurnOutcome,
    /// Model rounds used.
    pub rounds: usize,
    pub tool_calls: Vec<ToolCallRecord>,
    /// Skills offered in the last round.
    pub visibility: VisibilitySpec,
}

/// Drives turns for any number of sessions against one shared registry.
pub struct Agent<B: LlmBackend> {
    registry: Arc<SkillRegistry>,
    filter: VisibilityFilter,
    backend: B,
    model: String,
    max_turns: usize,
    instructions: Option<String>,
}

impl<B: LlmBackend> Agent<B> {
    pub fn new(registry: Arc<SkillRegistry>, backend: B, model: impl Into<String>) -> Self {
        Self {
            registry,
            filter: VisibilityFilter::default(),
            backend,
            model: model.into(),
            max_turns: DEFAULT_MAX_TURNS,
            instructions: None,
        }
    }

    pub fn with_filter(mut self, filter: VisibilityFilter) -> Self {
        self.filter = filter;
        self
    }

    pub fn with_max_turns(mut self, max_turns: usize) -> Self {
        self.max_turns = max_turns;
        self
    }

    /// Extra instructions appended to the generated system prompt (e.g. AGENTS.md).
    pub fn with_instructions(mut self, instructions: Option<String>) -> Self {
        self.instructions = instructions.filter(|s| !s.trim().is_empty());
        self
    }

    pub fn registry(&self) -> &Arc<SkillRegistry> {
        &self.registry
    }

    pub fn backend(&self) -> &B {
        &self.backend
    }

    pub fn filter(&self) -> &VisibilityFilter {
        &self.filter
    }

    pub fn model(&self) -> &str {
        &self.model
    }

    fn model_name(&self) -> &str {
        let name = self.model.trim();
        if name.is_empty() {
            log::warn!("agent: configured model was empty, using fallback");
            FALLBACK_MODEL
        } else {
            name
        }
    }

    /// Look up (or create) a session in `store`, lock it for the whole turn, and run it.
    pub async fn run_in(
        &self,
        store: &SessionStore,
        session_id: &str,
        user_message: &str,
    ) -> Result<AgentTurnResult, AgentError> {
        let session = store.get_or_create(session_id).await?;
        let mut session = session.lock().await;
        self.run_turn(&mut session, user_message).await
    }

    /// Run one turn for `session`.
    pub async fn run_turn(
        &self,
        session: &mut Session,
        user_message: &str,
    ) -> Result<AgentTurnResult, AgentError> {
        if self.max_turns == 0 {
            return Err(AgentError::InvalidBudget);
        }
        let model = self.model_name();
        let turn = session.begin_turn();
        let history = session.history();
        let ctx = TurnContext::new(user_message, &history, turn);
        log::info!("agent: turn {} of session {} using model {}", turn, session.id, model);

        let mut in_turn = vec![ChatMessage::user(user_message)];
        let mut entries = vec![TurnEntry::user(turn, user_message)];
        let mut records: Vec<ToolCallRecord> = Vec::new();
        let mut rounds = 0;

        loop {
            let index = self.registry.snapshot();
            let visibility = self.filter.compute(&ctx, &index);
            let offered: Vec<&SkillDescriptor> = visibility
                .names
                .iter()
                .filter_map(|n| index.get(n))
                .map(|d| d.as_ref())
                .collect();
            let tools = index.tools_for(&visibility.names);
            let system = generate_system_prompt(&offered, self.instructions.as_deref());

            let mut messages = Vec::with_capacity(1 + history.len() + in_turn.len());
            messages.push(ChatMessage::system(system));
            messages.extend(history.iter().map(TurnEntry::to_chat_message));
            messages.extend(in_turn.iter().cloned());

            let tools = if tools.is_empty() { None } else { Some(tools) };
            let res = self.backend.chat(model, messages, tools).await?;
            rounds += 1;
            let content = res.content().to_string();
            let calls: Vec<ToolCall> = res.tool_calls().to_vec();

            if calls.is_empty() {
                entries.push(TurnEntry::assistant(turn, content.clone(), Vec::new()));
                session.record(entries);
                return Ok(AgentTurnResult {
                    content,
                    outcome: TurnOutcome::FinalAnswer,
                    rounds,
                    tool_calls: records,
                    visibility,
                });
            }
            if rounds >= self.max_turns {
                log::debug!(
                    "agent: max rounds ({}) reached, dropping {} unexecuted tool calls",
                    self.max_turns,
                    calls.len()
                );
                // Unexecuted calls are not retained; history must not hold calls without results.
                entries.push(TurnEntry::assistant(turn, content.clone(), Vec::new()));
                session.record(entries);
                return Ok(AgentTurnResult {
                    content,
                    outcome: TurnOutcome::BudgetExhausted,
                    rounds,
                    tool_calls: records,
                    visibility,
                });
            }

            entries.push(TurnEntry::assistant(turn, content.clone(), calls.clone()));
            in_turn.push(ChatMessage::assistant(content, calls.clone()));
            for call in calls {
                let name = call.function.name;
                let args = call.function.arguments;
                let (output, is_error) = match dispatch(&index, &visibility, &name, &args) {
                    Ok(out) => (out, false),
                    Err(e) => {
                        log::warn!("agent: tool {} failed: {}", name, e);
                        (format!("error: {}", e), true)
                    }
                };
                in_turn.push(ChatMessage::tool(name.clone(), output.clone()));
                entries.push(TurnEntry::tool_result(
                    turn,
                    name.clone(),
                    args.clone(),
                    output.clone(),
                    is_error,
                ));
                records.push(ToolCallRecord {
                    name,
                    arguments: args,
                    output,
                    is_error,
                });
            }
        }
    }
}

/// Execute a call, refusing operations whose skill was not offered this round.
fn dispatch(
    index: &SkillIndex,
    visibility: &VisibilitySpec,
    name: &str,
    args: &serde_json::Value,
) -> Result<String, InvocationError> {
    if let Some(owner) = index.owner_of(name) {
        if !visibility.contains(&owner.name) {
            return Err(InvocationError::Execution(format!(
                "tool {} is not available this turn",
                name
            )));
        }
    }
    let executor: &dyn ToolExecutor = index;
    executor.execute(name, args)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::llm::{ChatResponse, ToolDefinition};
    use crate::retention::{EntryKind, RetentionMode};
    use crate::skills::BuiltinSource;
    use async_trait::async_trait;
    use serde_json::json;
    use std::sync::Mutex;

    /// Replays scripted responses and records every request.
    struct Scripted {
        replies: Mutex<Vec<ChatResponse>>,
        seen: Mutex<Vec<(Vec<ChatMessage>, Vec<String>)>>,
    }

    impl Scripted {
        fn new(mut replies: Vec<ChatResponse>) -> Self {
            replies.reverse();
            Self {
                replies: Mutex::new(replies),
                seen: Mutex::new(Vec::new()),
            }
        }
    }

    #[async_trait]
    impl LlmBackend for Scripted {
        async fn chat(
            &self,
            _model: &str,
            messages: Vec<ChatMessage>,
            tools: Option<Vec<ToolDefinition>>,
        ) -> Result<ChatResponse, LlmError> {
            let names = tools
                .unwrap_or_default()
                .into_iter()
                .map(|t| t.function.name)
                .collect();
            self.seen.lock().unwrap().push((messages, names));
            self.replies
                .lock()
                .unwrap()
                .pop()
                .ok_or_else(|| LlmError::Api("script exhausted".to_string()))
        }
    }

    fn registry() -> Arc<SkillRegistry> {
        let reg = SkillRegistry::new();
        reg.discover(&BuiltinSource::new()).unwrap();
        Arc::new(reg)
    }

    fn call(name: &str, args: serde_json::Value) -> ChatResponse {
        ChatResponse::with_tool_calls("", vec![ToolCall::function(name, args)])
    }

    #[tokio::test]
    async fn tool_call_then_final_answer() {
        let backend = Scripted::new(vec![
            call("calculator", json!({"expression": "6 * 7"})),
            ChatResponse::text("It is 42."),
        ]);
        let agent = Agent::new(registry(), backend, "test-model");
        let mut session = Session::new("s", RetentionMode::Accumulate).unwrap();
        let res = agent.run_turn(&mut session, "what is 6 times 7").await.unwrap();

        assert_eq!(res.outcome, TurnOutcome::FinalAnswer);
        assert_eq!(res.content, "It is 42.");
        assert_eq!(res.rounds, 2);
        assert_eq!(res.tool_calls[0].output, "Result: 42");
        assert!(!res.tool_calls[0].is_error);

        let seen = agent.backend.seen.lock().unwrap();
        let (second, tools) = &seen[1];
        assert_eq!(second[0].role, "system");
        assert_eq!(second.last().unwrap().role, "tool");
        assert_eq!(second.last().unwrap().content, "Result: 42");
        assert!(tools.contains(&"text_uppercase".to_string()));

        // user, assistant(call), tool result, assistant(final)
        let history = session.history();
        assert_eq!(history.len(), 4);
        assert!(matches!(history[2].kind, EntryKind::ToolResult { .. }));
        assert!(history.iter().all(|e| e.turn == 1));
    }

    #[tokio::test]
    async fn invocation_error_becomes_payload() {
        let backend = Scripted::new(vec![
            call("calculator", json!({"expression": "1 / 0"})),
            call("calculator", json!({"expression": "1 / 1"})),
            ChatResponse::text("done"),
        ]);
        let agent = Agent::new(registry(), backend, "m");
        let mut session = Session::new("s", RetentionMode::Replace).unwrap();
        let res = agent.run_turn(&mut session, "divide").await.unwrap();
        assert_eq!(res.outcome, TurnOutcome::FinalAnswer);
        assert_eq!(res.tool_calls[0].output, "error: division by zero");
        assert!(res.tool_calls[0].is_error);
        assert_eq!(res.tool_calls[1].output, "Result: 1");
        // user, two calls with their results, final answer
        assert_eq!(session.history().len(), 6);
    }

    #[tokio::test]
    async fn replace_keeps_the_whole_latest_turn() {
        let backend = Scripted::new(vec![
            ChatResponse::text("hello"),
            call("calculator", json!({"expression": "6*7"})),
            ChatResponse::text("It is 42."),
        ]);
        let agent = Agent::new(registry(), backend, "m");
        let mut session = Session::new("s", RetentionMode::Replace).unwrap();
        agent.run_turn(&mut session, "hi").await.unwrap();
        agent.run_turn(&mut session, "what is 6 times 7").await.unwrap();

        let history = session.history();
        assert_eq!(history.len(), 4);
        assert!(history.iter().all(|e| e.turn == 2));
        assert_eq!(history[0].user_text(), Some("what is 6 times 7"));
        assert!(matches!(
            &history[1].kind,
            EntryKind::Assistant { tool_calls, .. } if tool_calls.len() == 1
        ));
        assert!(matches!(
            &history[2].kind,
            EntryKind::ToolResult { output, is_error: false, .. } if output == "Result: 42"
        ));
        assert_eq!(history[3].to_chat_message().content, "It is 42.");
    }

    #[tokio::test]
    async fn budget_exhaustion_surfaces_last_output() {
        let backend = Scripted::new(vec![
            ChatResponse::with_tool_calls("thinking", vec![ToolCall::function("get_timestamp", json!({}))]),
            ChatResponse::with_tool_calls("still thinking", vec![ToolCall::function("get_timestamp", json!({}))]),
        ]);
        let agent = Agent::new(registry(), backend, "m").with_max_turns(2);
        let mut session = Session::new("s", RetentionMode::Accumulate).unwrap();
        let res = agent.run_turn(&mut session, "loop forever").await.unwrap();
        assert_eq!(res.outcome, TurnOutcome::BudgetExhausted);
        assert_eq!(res.content, "still thinking");
        assert_eq!(res.rounds, 2);
        assert_eq!(res.tool_calls.len(), 1);

        // The last round's calls were never run, so they are not retained.
        let history = session.history();
        assert_eq!(history.len(), 4);
        match &history[3].kind {
            EntryKind::Assistant { content, tool_calls } => {
                assert_eq!(content, "still thinking");
                assert!(tool_calls.is_empty());
            }
            other => panic!("expected assistant entry, got {:?}", other),
        }
    }

    #[tokio::test]
    async fn zero_budget_is_rejected() {
        let agent = Agent::new(registry(), Scripted::new(Vec::new()), "m").with_max_turns(0);
        let mut session = Session::new("s", RetentionMode::Replace).unwrap();
        assert!(matches!(
            agent.run_turn(&mut session, "hi").await,
            Err(AgentError::InvalidBudget)
        ));
        assert_eq!(session.turns(), 0);
    }

    #[tokio::test]
    async fn unoffered_and_unknown_tools_are_rejected() {
        let reg = SkillRegistry::new();
        reg.discover(&BuiltinSource::new().without(["time"])).unwrap();
        reg.register(
            crate::skills::builtin::descriptor("time")
                .unwrap()
                .with_visibility(crate::skills::Visibility::Internal),
        )
        .unwrap();
        let backend = Scripted::new(vec![
            ChatResponse::with_tool_calls(
                "",
                vec![
                    ToolCall::function("get_timestamp", json!({})),
                    ToolCall::function("rm_rf", json!({})),
                ],
            ),
            ChatResponse::text("ok"),
        ]);
        let agent = Agent::new(Arc::new(reg), backend, "m");
        let mut session = Session::new("s", RetentionMode::Accumulate).unwrap();
        let res = agent.run_turn(&mut session, "what time is it").await.unwrap();
        assert_eq!(
            res.tool_calls[0].output,
            "error: tool get_timestamp is not available this turn"
        );
        assert_eq!(res.tool_calls[1].output, "error: unknown tool: rm_rf");
        assert!(!res.visibility.contains("time"));

        let seen = agent.backend.seen.lock().unwrap();
        assert!(!seen[0].1.contains(&"get_timestamp".to_string()));
    }

    #[tokio::test]
    async fn later_turns_see_retained_history() {
        let backend = Scripted::new(vec![ChatResponse::text("first"), ChatResponse::text("second")]);
        let agent = Agent::new(registry(), backend, "m");
        let store = SessionStore::new(RetentionMode::Fifo { capacity: 3 });
        agent.run_in(&store, "chat", "one").await.unwrap();
        agent.run_in(&store, "chat", "two").await.unwrap();

        let seen = agent.backend.seen.lock().unwrap();
        let contents: Vec<&str> = seen[1].0.iter().skip(1).map(|m| m.content.as_str()).collect();
        assert_eq!(contents, vec!["one", "first", "two"]);

        let session = store.get("chat").await.unwrap();
        let session = session.lock().await;
        assert_eq!(session.turns(), 2);
        // Capacity 3 of the four entries written.
        assert_eq!(session.history()[0].to_chat_message().content, "first");
    }
}
