// Copyright (c) 2026 100monkeys.ai
// SPDX-License-Identifier: AGPL-3.0
//! Events produced by one agent run.
//!
//! The agent loop emits these in production order; the presentation layer
//! maps each variant to exactly one OpenAI-shaped chunk, so stream
//! conversion is a total function over the enum.

use serde::{Deserialize, Serialize};
use serde_json::Value;

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum FinishReason {
    Stop,
    Length,
}

impl FinishReason {
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Stop => "stop",
            Self::Length => "length",
        }
    }
}

/// One event from the agent loop.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(tag = "kind", rename_all = "snake_case")]
pub enum AgentEvent {
    /// Incremental assistant text.
    TextDelta { text: String },
    /// The agent decided to invoke a tool.
    ToolCall {
        id: String,
        name: String,
        arguments: Value,
    },
    /// Result returned by a tool invocation.
    ToolResult { id: String, payload: Value },
    /// The run completed normally.
    Finish { reason: FinishReason },
    /// The run failed; one of these terminates the stream.
    Error { error_kind: String, message: String },
}
