// Copyright (c) 2026 100monkeys.ai
// SPDX-License-Identifier: AGPL-3.0
//! JSON-RPC client for the MCP tool server.
//!
//! Every tool call carries the user id in the `x-user-id` header; nothing
//! in the argument payload is trusted for routing. The client also serves
//! as the prompt fetcher behind the prompt cache.

use crate::domain::container::UserId;
use crate::domain::mcp::{RpcResponse, AGENT_SYSTEM_PROMPT, USER_ID_HEADER};
use crate::domain::prompt::{PromptFetchError, PromptFetcher};
use async_trait::async_trait;
use serde_json::{json, Value};
use thiserror::Error;
use tracing::debug;

#[derive(Debug, Error)]
pub enum McpClientError {
    #[error("Tool server unreachable: {0}")]
    Transport(String),

    #[error("Tool server error {code}: {message}")]
    Rpc { code: i64, message: String },
}

pub struct McpClient {
    client: reqwest::Client,
    endpoint: String,
}

impl McpClient {
    pub fn new(endpoint: String) -> Self {
        Self {
            client: reqwest::Client::new(),
            endpoint,
        }
    }

    async fn call(
        &self,
        method: &str,
        params: Value,
        user: Option<&UserId>,
    ) -> Result<Value, McpClientError> {
        let request_id = uuid::Uuid::new_v4().to_string();
        let body = json!({
            "jsonrpc": "2.0",
            "method": method,
            "params": params,
            "id": request_id,
        });

        let mut request = self.client.post(&self.endpoint).json(&body);
        if let Some(user) = user {
            request = request.header(USER_ID_HEADER, user.as_str());
        }

        let response = request
            .send()
            .await
            .map_err(|e| McpClientError::Transport(e.to_string()))?;
        let response: RpcResponse = response
            .json()
            .await
            .map_err(|e| McpClientError::Transport(format!("invalid JSON-RPC reply: {}", e)))?;

        if let Some(error) = response.error {
            return Err(McpClientError::Rpc {
                code: error.code,
                message: error.message,
            });
        }
        Ok(response.result.unwrap_or(Value::Null))
    }

    /// Invoke one tool on behalf of `user`. Returns the tool's JSON result
    /// payload as served by the tool server.
    pub async fn call_tool(
        &self,
        user: &UserId,
        name: &str,
        arguments: Value,
    ) -> Result<Value, McpClientError> {
        debug!(user = %user, tool = name, "Dispatching MCP tool call");
        self.call(
            "tools/call",
            json!({ "name": name, "arguments": arguments }),
            Some(user),
        )
        .await
    }

    /// List the tool descriptors the server exposes.
    pub async fn list_tools(&self) -> Result<Value, McpClientError> {
        self.call("tools/list", Value::Null, None).await
    }
}

#[async_trait]
impl PromptFetcher for McpClient {
    async fn fetch_from_server(&self) -> Result<String, PromptFetchError> {
        let result = self
            .call(
                "prompts/get",
                json!({ "name": AGENT_SYSTEM_PROMPT }),
                None,
            )
            .await
            .map_err(|e| PromptFetchError::Unreachable(e.to_string()))?;

        let text = result
            .get("messages")
            .and_then(Value::as_array)
            .and_then(|messages| messages.first())
            .and_then(|message| message.get("content"))
            .and_then(|content| content.get("text"))
            .and_then(Value::as_str)
            .unwrap_or_default();

        if text.trim().is_empty() {
            return Err(PromptFetchError::Empty);
        }
        Ok(text.to_string())
    }
}
