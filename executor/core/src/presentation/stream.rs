// Copyright (c) 2026 100monkeys.ai
// SPDX-License-Identifier: AGPL-3.0
//! Agent events to OpenAI chunk payloads.
//!
//! Total conversion over [`AgentEvent`]: every variant maps to exactly one
//! SSE payload, chunks keep production order, and the stream always ends
//! with the literal `[DONE]` marker. The first chunk announces the
//! assistant role; text that follows a tool round is padded with a blank
//! line so replies do not run into tool output.

use crate::application::agent::EventStream;
use crate::domain::chat::{ChatCompletionChunk, Delta, ToolCallPayload};
use crate::domain::events::AgentEvent;
use async_stream::stream;
use futures::{Stream, StreamExt};
use serde_json::json;

/// Terminal SSE payload.
pub const DONE_MARKER: &str = "[DONE]";

/// Convert an agent event stream into SSE data payloads (JSON strings,
/// then `[DONE]`). The transport layer wraps each in a `data:` frame.
pub fn chunk_payloads(mut events: EventStream, model: String) -> impl Stream<Item = String> + Send {
    let request_id = format!("chatcmpl-{}", &uuid::Uuid::new_v4().simple().to_string()[..12]);

    stream! {
        let mut first = true;
        let mut after_tool_round = false;

        while let Some(event) = events.next().await {
            if first {
                first = false;
                let role_chunk = ChatCompletionChunk::new(
                    &request_id,
                    &model,
                    Delta {
                        role: Some("assistant".to_string()),
                        ..Default::default()
                    },
                    None,
                );
                yield encode(&role_chunk);
            }

            match event {
                AgentEvent::TextDelta { text } => {
                    let content = if after_tool_round {
                        format!("\n\n{}", text)
                    } else {
                        text
                    };
                    after_tool_round = false;
                    let chunk = ChatCompletionChunk::new(
                        &request_id,
                        &model,
                        Delta {
                            content: Some(content),
                            ..Default::default()
                        },
                        None,
                    );
                    yield encode(&chunk);
                }
                AgentEvent::ToolCall { id, name, arguments } => {
                    after_tool_round = true;
                    let chunk = ChatCompletionChunk::new(
                        &request_id,
                        &model,
                        Delta {
                            tool_calls: Some(vec![ToolCallPayload::function(
                                id,
                                name,
                                arguments.to_string(),
                            )]),
                            ..Default::default()
                        },
                        None,
                    );
                    yield encode(&chunk);
                }
                AgentEvent::ToolResult { .. } => {
                    // Results reach the caller through the model's next
                    // text turn; the wire only announces the calls.
                    after_tool_round = true;
                }
                AgentEvent::Finish { reason } => {
                    let chunk = ChatCompletionChunk::new(
                        &request_id,
                        &model,
                        Delta::default(),
                        Some(reason.as_str().to_string()),
                    );
                    yield encode(&chunk);
                }
                AgentEvent::Error { error_kind, message } => {
                    yield json!({
                        "error": { "message": message, "type": error_kind }
                    })
                    .to_string();
                }
            }
        }

        yield DONE_MARKER.to_string();
    }
}

fn encode(chunk: &ChatCompletionChunk) -> String {
    serde_json::to_string(chunk).unwrap_or_else(|_| "{}".to_string())
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::domain::events::FinishReason;
    use serde_json::Value;

    async fn collect(events: Vec<AgentEvent>) -> Vec<String> {
        let stream: EventStream = Box::pin(futures::stream::iter(events));
        chunk_payloads(stream, "test-model".to_string()).collect().await
    }

    fn parse(payload: &str) -> Value {
        serde_json::from_str(payload).unwrap()
    }

    #[tokio::test]
    async fn text_run_has_role_chunks_finish_and_done() {
        let payloads = collect(vec![
            AgentEvent::TextDelta { text: "hel".into() },
            AgentEvent::TextDelta { text: "lo".into() },
            AgentEvent::Finish { reason: FinishReason::Stop },
        ])
        .await;

        assert_eq!(payloads.len(), 5);
        assert_eq!(parse(&payloads[0])["choices"][0]["delta"]["role"], "assistant");
        assert_eq!(parse(&payloads[1])["choices"][0]["delta"]["content"], "hel");
        assert_eq!(parse(&payloads[2])["choices"][0]["delta"]["content"], "lo");
        let finish = parse(&payloads[3]);
        assert_eq!(finish["choices"][0]["finish_reason"], "stop");
        assert_eq!(finish["object"], "chat.completion.chunk");
        assert_eq!(payloads[4], DONE_MARKER);
    }

    #[tokio::test]
    async fn tool_round_pads_following_text() {
        let payloads = collect(vec![
            AgentEvent::ToolCall {
                id: "call_1".into(),
                name: "execute_bash".into(),
                arguments: json!({"command": "ls"}),
            },
            AgentEvent::ToolResult {
                id: "call_1".into(),
                payload: json!({"exit_code": 0}),
            },
            AgentEvent::TextDelta { text: "done".into() },
            AgentEvent::Finish { reason: FinishReason::Stop },
        ])
        .await;

        // role, tool_call, text, finish, done - the tool result itself
        // produces no frame.
        assert_eq!(payloads.len(), 5);
        let call = parse(&payloads[1]);
        let tool_call = &call["choices"][0]["delta"]["tool_calls"][0];
        assert_eq!(tool_call["id"], "call_1");
        assert_eq!(tool_call["type"], "function");
        assert_eq!(tool_call["function"]["name"], "execute_bash");
        assert_eq!(parse(&payloads[2])["choices"][0]["delta"]["content"], "\n\ndone");
    }

    #[tokio::test]
    async fn error_emits_error_frame_then_done() {
        let payloads = collect(vec![AgentEvent::Error {
            error_kind: "model_call_failed".into(),
            message: "boom".into(),
        }])
        .await;

        assert_eq!(payloads.len(), 3);
        let error = parse(&payloads[1]);
        assert_eq!(error["error"]["message"], "boom");
        assert_eq!(error["error"]["type"], "model_call_failed");
        assert_eq!(payloads[2], DONE_MARKER);
    }

    #[tokio::test]
    async fn chunks_share_one_request_id() {
        let payloads = collect(vec![
            AgentEvent::TextDelta { text: "a".into() },
            AgentEvent::Finish { reason: FinishReason::Stop },
        ])
        .await;
        let first_id = parse(&payloads[0])["id"].as_str().unwrap().to_string();
        assert!(first_id.starts_with("chatcmpl-"));
        assert_eq!(parse(&payloads[1])["id"], first_id.as_str());
        assert_eq!(parse(&payloads[2])["id"], first_id.as_str());
    }
}
