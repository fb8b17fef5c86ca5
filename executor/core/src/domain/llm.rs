// Copyright (c) 2026 100monkeys.ai
// SPDX-License-Identifier: AGPL-3.0

// Model client domain interface (anti-corruption layer).
//
// Isolates the agent loop from vendor APIs: one trait, streaming deltas,
// tool declarations. Implementations live in infrastructure/llm/.

use async_trait::async_trait;
use futures::Stream;
use serde_json::Value;
use std::pin::Pin;

/// Message role on the model wire.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ModelRole {
    System,
    User,
    Assistant,
    Tool,
}

impl ModelRole {
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::System => "system",
            Self::User => "user",
            Self::Assistant => "assistant",
            Self::Tool => "tool",
        }
    }
}

/// A tool call recorded on an assistant message.
#[derive(Debug, Clone)]
pub struct AssistantToolCall {
    pub id: String,
    pub name: String,
    /// Raw JSON-encoded argument object.
    pub arguments: String,
}

/// One message of the model conversation, including tool plumbing.
#[derive(Debug, Clone)]
pub struct ModelMessage {
    pub role: ModelRole,
    pub content: Option<String>,
    pub tool_calls: Vec<AssistantToolCall>,
    /// Set on `Tool` messages: the call this result answers.
    pub tool_call_id: Option<String>,
}

impl ModelMessage {
    pub fn text(role: ModelRole, content: impl Into<String>) -> Self {
        Self {
            role,
            content: Some(content.into()),
            tool_calls: Vec::new(),
            tool_call_id: None,
        }
    }

    pub fn assistant_with_calls(content: Option<String>, calls: Vec<AssistantToolCall>) -> Self {
        Self {
            role: ModelRole::Assistant,
            content,
            tool_calls: calls,
            tool_call_id: None,
        }
    }

    pub fn tool_result(call_id: impl Into<String>, payload: impl Into<String>) -> Self {
        Self {
            role: ModelRole::Tool,
            content: Some(payload.into()),
            tool_calls: Vec::new(),
            tool_call_id: Some(call_id.into()),
        }
    }
}

/// Declaration of a callable tool, passed to the model each turn.
#[derive(Debug, Clone)]
pub struct ToolSpec {
    pub name: String,
    pub description: String,
    /// JSON Schema of the argument object.
    pub parameters: Value,
}

/// One model turn: full conversation plus tool declarations.
#[derive(Debug, Clone)]
pub struct ModelTurnRequest {
    pub model: String,
    pub messages: Vec<ModelMessage>,
    pub tools: Vec<ToolSpec>,
    pub temperature: Option<f32>,
    pub max_tokens: Option<u32>,
}

/// Why the model stopped emitting.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum TurnFinish {
    Stop,
    Length,
    ToolCalls,
}

/// Incremental output of a streamed model turn.
#[derive(Debug, Clone)]
pub enum ModelDelta {
    /// A fragment of assistant text.
    Text(String),
    /// A fragment of a tool call. `id`/`name` arrive on the first fragment
    /// for a given `index`; later fragments append to `arguments`.
    ToolCall {
        index: usize,
        id: Option<String>,
        name: Option<String>,
        arguments: String,
    },
    /// Terminal marker of the turn.
    Finish(TurnFinish),
}

pub type ModelStream = Pin<Box<dyn Stream<Item = Result<ModelDelta, LLMError>> + Send>>;

/// Domain interface for streaming chat models.
#[async_trait]
pub trait ChatModel: Send + Sync {
    /// Stream one turn. The returned stream ends with `Finish` unless it
    /// errors first.
    async fn stream_turn(&self, request: ModelTurnRequest) -> Result<ModelStream, LLMError>;
}

/// Errors from model providers.
#[derive(Debug, thiserror::Error)]
pub enum LLMError {
    #[error("Network error: {0}")]
    Network(String),

    #[error("Authentication failed: {0}")]
    Authentication(String),

    #[error("Rate limit exceeded")]
    RateLimit,

    #[error("Model not found: {0}")]
    ModelNotFound(String),

    #[error("Provider error: {0}")]
    Provider(String),

    #[error("Invalid input: {0}")]
    InvalidInput(String),
}
