//! Integration test: drive the agent loop with a scripted backend.
//! Covers retention across turns, keyword filtering, and sessions sharing one registry.

use async_trait::async_trait;
use serde_json::json;
use skillful::agent::{Agent, TurnOutcome};
use skillful::config::{Config, PredicateKind};
use skillful::llm::{ChatMessage, ChatResponse, LlmBackend, LlmError, ToolCall, ToolDefinition};
use skillful::retention::{EntryKind, RetentionMode};
use skillful::session::SessionStore;
use skillful::skills::{BuiltinSource, SkillRegistry};
use std::sync::{Arc, Mutex};

/// Answers tool calls by name from the latest user message and records offered tools.
#[derive(Default)]
struct Echoing {
    offered: Mutex<Vec<Vec<String>>>,
}

#[async_trait]
impl LlmBackend for Echoing {
    async fn chat(
        &self,
        _model: &str,
        messages: Vec<ChatMessage>,
        tools: Option<Vec<ToolDefinition>>,
    ) -> Result<ChatResponse, LlmError> {
        let names: Vec<String> = tools
            .unwrap_or_default()
            .into_iter()
            .map(|t| t.function.name)
            .collect();
        self.offered.lock().expect("lock").push(names.clone());

        let last = messages.last().ok_or_else(|| LlmError::Api("no messages".to_string()))?;
        if last.role == "tool" {
            return Ok(ChatResponse::text(format!("tool said: {}", last.content)));
        }
        let text = last.content.clone();
        if names.iter().any(|n| n == "text_uppercase") && text.starts_with("shout ") {
            return Ok(ChatResponse::with_tool_calls(
                "",
                vec![ToolCall::function(
                    "text_uppercase",
                    json!({"text": text.trim_start_matches("shout ")}),
                )],
            ));
        }
        Ok(ChatResponse::text(format!("you said: {}", text)))
    }
}

fn registry() -> Arc<SkillRegistry> {
    let registry = SkillRegistry::new();
    registry
        .discover(&BuiltinSource::new())
        .expect("builtins always load");
    Arc::new(registry)
}

#[tokio::test]
async fn keyword_filter_narrows_tools_per_turn() {
    let mut config = Config::default();
    config.middleware.predicate = PredicateKind::Keyword;
    let agent = Agent::new(registry(), Echoing::default(), "test")
        .with_filter(config.middleware.build_filter());
    let store = SessionStore::new(RetentionMode::Accumulate);

    let res = agent
        .run_in(&store, "s1", "shout uppercase text please")
        .await
        .expect("turn runs");
    assert_eq!(res.outcome, TurnOutcome::FinalAnswer);
    assert_eq!(res.content, "tool said: UPPERCASE TEXT PLEASE");
    assert_eq!(res.visibility.names, vec!["text_processor"]);

    let res = agent
        .run_in(&store, "s1", "zzz")
        .await
        .expect("turn runs");
    // "zzz" matches nothing but the history still mentions text.
    assert_eq!(res.visibility.names, vec!["text_processor"]);
    assert!(!res.visibility.fell_back);

    let offered = agent.backend().offered.lock().expect("lock").clone();
    assert_eq!(offered.len(), 3);
    assert!(offered[0].iter().all(|n| n.starts_with("text_")));
}

#[tokio::test]
async fn fifo_session_history_stays_bounded() {
    let agent = Agent::new(registry(), Echoing::default(), "test");
    let store = SessionStore::new(RetentionMode::Fifo { capacity: 5 });
    for i in 0..6 {
        agent
            .run_in(&store, "bounded", &format!("message {}", i))
            .await
            .expect("turn runs");
    }
    let session = store.get("bounded").await.expect("session exists");
    let session = session.lock().await;
    let history = session.history();
    assert_eq!(history.len(), 5);
    assert_eq!(session.turns(), 6);
    assert!(matches!(
        &history.last().expect("non-empty").kind,
        EntryKind::Assistant { content, .. } if content == "you said: message 5"
    ));
}

#[tokio::test(flavor = "multi_thread", worker_threads = 4)]
async fn sessions_share_registry_but_not_history() {
    let agent = Arc::new(Agent::new(registry(), Echoing::default(), "test"));
    let store = Arc::new(SessionStore::new(RetentionMode::Accumulate));

    let mut handles = Vec::new();
    for s in 0..4 {
        let agent = agent.clone();
        let store = store.clone();
        handles.push(tokio::spawn(async move {
            let id = format!("session-{}", s);
            for t in 0..3 {
                agent
                    .run_in(&store, &id, &format!("{} turn {}", id, t))
                    .await
                    .expect("turn runs");
            }
            id
        }));
    }
    for h in handles {
        let id = h.await.expect("task completes");
        let session = store.get(&id).await.expect("session exists");
        let history = session.lock().await.history();
        assert_eq!(history.len(), 6);
        assert!(history
            .iter()
            .filter_map(|e| e.user_text())
            .all(|t| t.starts_with(&id)));
    }
    assert_eq!(store.len().await, 4);
}
