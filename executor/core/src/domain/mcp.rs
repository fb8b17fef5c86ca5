// Copyright (c) 2026 100monkeys.ai
// SPDX-License-Identifier: AGPL-3.0
//! MCP wire types.
//!
//! The tool surface is JSON-RPC 2.0 over HTTP. Tool names, argument keys,
//! and return shapes are a frozen contract; user routing rides on the
//! `x-user-id` request header, never on the argument payload.

use serde::{Deserialize, Serialize};
use serde_json::Value;

/// Header carrying the per-request user id on every MCP call.
pub const USER_ID_HEADER: &str = "x-user-id";

/// Name of the MCP prompt exposing the rendered agent system prompt.
pub const AGENT_SYSTEM_PROMPT: &str = "agent_system_prompt";

// JSON-RPC 2.0 error codes used by the tool server.
pub const PARSE_ERROR: i64 = -32700;
pub const INVALID_REQUEST: i64 = -32600;
pub const METHOD_NOT_FOUND: i64 = -32601;
pub const INVALID_PARAMS: i64 = -32602;
pub const INTERNAL_ERROR: i64 = -32603;
/// Server-defined: MCP tool call without an `x-user-id` header.
pub const MISSING_USER_CONTEXT: i64 = -32001;
/// Server-defined: tool execution failed inside the substrate.
pub const TOOL_EXECUTION_ERROR: i64 = -32002;

#[derive(Debug, Clone, Deserialize)]
pub struct RpcRequest {
    pub jsonrpc: String,
    pub method: String,
    #[serde(default)]
    pub params: Option<Value>,
    #[serde(default)]
    pub id: Value,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct RpcError {
    pub code: i64,
    pub message: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub data: Option<Value>,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct RpcResponse {
    pub jsonrpc: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub result: Option<Value>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub error: Option<RpcError>,
    pub id: Value,
}

impl RpcResponse {
    pub fn success(id: Value, result: Value) -> Self {
        Self {
            jsonrpc: "2.0".to_string(),
            result: Some(result),
            error: None,
            id,
        }
    }

    pub fn failure(id: Value, code: i64, message: impl Into<String>) -> Self {
        Self {
            jsonrpc: "2.0".to_string(),
            result: None,
            error: Some(RpcError {
                code,
                message: message.into(),
                data: None,
            }),
            id,
        }
    }
}

/// Tool metadata served by `tools/list`.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ToolDescriptor {
    pub name: String,
    pub description: String,
    #[serde(rename = "inputSchema")]
    pub input_schema: Value,
}

/// `params` of a `tools/call` request.
#[derive(Debug, Clone, Deserialize)]
pub struct ToolCallParams {
    pub name: String,
    #[serde(default)]
    pub arguments: Value,
}

/// `params` of a `prompts/get` request.
#[derive(Debug, Clone, Deserialize)]
pub struct PromptGetParams {
    pub name: String,
}

/// One message of a served prompt.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct PromptMessage {
    pub role: String,
    pub content: PromptContent,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct PromptContent {
    #[serde(rename = "type")]
    pub content_type: String,
    pub text: String,
}

impl PromptMessage {
    pub fn user_text(text: impl Into<String>) -> Self {
        Self {
            role: "user".to_string(),
            content: PromptContent {
                content_type: "text".to_string(),
                text: text.into(),
            },
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    #[test]
    fn success_response_omits_error() {
        let response = RpcResponse::success(json!(1), json!({"ok": true}));
        let value = serde_json::to_value(&response).unwrap();
        assert_eq!(value["jsonrpc"], "2.0");
        assert_eq!(value["result"]["ok"], true);
        assert!(value.get("error").is_none());
    }

    #[test]
    fn failure_response_omits_result() {
        let response = RpcResponse::failure(json!("req-1"), METHOD_NOT_FOUND, "no such method");
        let value = serde_json::to_value(&response).unwrap();
        assert_eq!(value["error"]["code"], METHOD_NOT_FOUND);
        assert!(value.get("result").is_none());
        assert_eq!(value["id"], "req-1");
    }

    #[test]
    fn tool_descriptor_uses_camel_case_schema_key() {
        let descriptor = ToolDescriptor {
            name: "execute_bash".into(),
            description: "run a command".into(),
            input_schema: json!({"type": "object"}),
        };
        let value = serde_json::to_value(&descriptor).unwrap();
        assert!(value.get("inputSchema").is_some());
    }

    #[test]
    fn request_parses_without_params() {
        let request: RpcRequest =
            serde_json::from_str(r#"{"jsonrpc":"2.0","method":"tools/list","id":7}"#).unwrap();
        assert_eq!(request.method, "tools/list");
        assert!(request.params.is_none());
        assert_eq!(request.id, json!(7));
    }

    #[test]
    fn prompt_message_shape_matches_mcp() {
        let message = PromptMessage::user_text("prompt body");
        let value = serde_json::to_value(&message).unwrap();
        assert_eq!(value["content"]["type"], "text");
        assert_eq!(value["content"]["text"], "prompt body");
    }
}
