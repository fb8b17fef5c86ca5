// Copyright (c) 2026 100monkeys.ai
// SPDX-License-Identifier: AGPL-3.0
//! OpenAI-compatible wire models for the streaming chat surface.

use serde::{Deserialize, Serialize};

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum ChatRole {
    User,
    Assistant,
    System,
}

/// Single message in a chat conversation.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ChatMessage {
    pub role: ChatRole,
    pub content: String,
}

/// Request body of `POST /v1/chat/completions`. Only streaming is
/// supported; `stream` defaults to false so its absence is rejected too.
#[derive(Debug, Clone, Deserialize)]
pub struct ChatCompletionRequest {
    pub model: String,
    pub messages: Vec<ChatMessage>,
    #[serde(default)]
    pub stream: bool,
    #[serde(default)]
    pub temperature: Option<f32>,
    #[serde(default)]
    pub max_tokens: Option<u32>,
    /// Caller-supplied user identifier scoping container and session.
    #[serde(default)]
    pub user: Option<String>,
}

/// `delta.tool_calls[*].function` of a streamed chunk.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct FunctionCallPayload {
    pub name: String,
    /// JSON-encoded argument object, as OpenAI streams it.
    pub arguments: String,
}

/// `delta.tool_calls[*]` of a streamed chunk.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ToolCallPayload {
    pub id: String,
    #[serde(rename = "type")]
    pub call_type: String,
    pub function: FunctionCallPayload,
}

impl ToolCallPayload {
    pub fn function(id: String, name: String, arguments: String) -> Self {
        Self {
            id,
            call_type: "function".to_string(),
            function: FunctionCallPayload { name, arguments },
        }
    }
}

/// Delta content of a streamed chunk.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct Delta {
    #[serde(skip_serializing_if = "Option::is_none")]
    pub role: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub content: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub tool_calls: Option<Vec<ToolCallPayload>>,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Choice {
    pub index: u32,
    pub delta: Delta,
    pub finish_reason: Option<String>,
}

/// Streaming chat completion chunk in OpenAI format.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ChatCompletionChunk {
    pub id: String,
    pub object: String,
    pub created: i64,
    pub model: String,
    pub choices: Vec<Choice>,
}

impl ChatCompletionChunk {
    pub fn new(id: &str, model: &str, delta: Delta, finish_reason: Option<String>) -> Self {
        Self {
            id: id.to_string(),
            object: "chat.completion.chunk".to_string(),
            created: chrono::Utc::now().timestamp(),
            model: model.to_string(),
            choices: vec![Choice {
                index: 0,
                delta,
                finish_reason,
            }],
        }
    }
}

/// Entry of `GET /v1/models`.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ModelInfo {
    pub id: String,
    pub object: String,
    pub created: i64,
    pub owned_by: String,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ModelList {
    pub object: String,
    pub data: Vec<ModelInfo>,
}

impl ModelList {
    pub fn single(id: &str, owned_by: &str) -> Self {
        Self {
            object: "list".to_string(),
            data: vec![ModelInfo {
                id: id.to_string(),
                object: "model".to_string(),
                created: chrono::Utc::now().timestamp(),
                owned_by: owned_by.to_string(),
            }],
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn request_defaults_stream_to_false() {
        let request: ChatCompletionRequest = serde_json::from_str(
            r#"{"model":"m","messages":[{"role":"user","content":"hi"}]}"#,
        )
        .unwrap();
        assert!(!request.stream);
        assert!(request.user.is_none());
        assert_eq!(request.messages[0].role, ChatRole::User);
    }

    #[test]
    fn chunk_serializes_openai_shape() {
        let chunk = ChatCompletionChunk::new(
            "chatcmpl-abc",
            "test-model",
            Delta {
                content: Some("hello".into()),
                ..Default::default()
            },
            None,
        );
        let value = serde_json::to_value(&chunk).unwrap();
        assert_eq!(value["object"], "chat.completion.chunk");
        assert_eq!(value["choices"][0]["delta"]["content"], "hello");
        assert_eq!(value["choices"][0]["index"], 0);
        assert!(value["choices"][0]["delta"].get("role").is_none());
        assert_eq!(value["choices"][0]["finish_reason"], serde_json::Value::Null);
    }

    #[test]
    fn tool_call_payload_shape() {
        let chunk = ChatCompletionChunk::new(
            "chatcmpl-abc",
            "test-model",
            Delta {
                tool_calls: Some(vec![ToolCallPayload::function(
                    "call_1".into(),
                    "execute_bash".into(),
                    r#"{"command":"ls"}"#.into(),
                )]),
                ..Default::default()
            },
            None,
        );
        let value = serde_json::to_value(&chunk).unwrap();
        let call = &value["choices"][0]["delta"]["tool_calls"][0];
        assert_eq!(call["type"], "function");
        assert_eq!(call["function"]["name"], "execute_bash");
    }

    #[test]
    fn model_list_shape() {
        let list = ModelList::single("anthropic/claude-sonnet-4-5", "anthropic");
        let value = serde_json::to_value(&list).unwrap();
        assert_eq!(value["object"], "list");
        assert_eq!(value["data"][0]["object"], "model");
        assert_eq!(value["data"][0]["owned_by"], "anthropic");
    }
}
