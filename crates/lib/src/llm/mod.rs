//! Model client abstraction and the Ollama implementation.
//!
//! The agent loop only talks to [`LlmBackend`]; anything that can answer a chat
//! request with either text or tool calls can drive it.

mod ollama;

pub use ollama::{
    ChatMessage, ChatResponse, OllamaClient, OllamaModel, ToolCall, ToolCallFunction,
    ToolDefinition, ToolFunctionDefinition,
};

use async_trait::async_trait;

#[derive(Debug, thiserror::Error)]
pub enum LlmError {
    #[error("model request failed: {0}")]
    Request(#[from] reqwest::Error),
    #[error("model api error: {0}")]
    Api(String),
}

/// A chat backend that can be offered tool definitions.
#[async_trait]
pub trait LlmBackend: Send + Sync {
    /// Send the conversation and the offered tools; returns the assistant message.
    async fn chat(
        &self,
        model: &str,
        messages: Vec<ChatMessage>,
        tools: Option<Vec<ToolDefinition>>,
    ) -> Result<ChatResponse, LlmError>;
}
