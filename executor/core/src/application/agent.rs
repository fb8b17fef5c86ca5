// Copyright (c) 2026 100monkeys.ai
// SPDX-License-Identifier: AGPL-3.0
//! Agent runtimes and the tool-calling loop.
//!
//! A runtime is the per-user composition of model client, MCP tool client,
//! and the system prompt captured at construction time. Runtimes are cached
//! for process lifetime; the prompt is re-captured only when a new runtime
//! is built after cache eviction. One run drives model turns until the
//! model stops asking for tools, forwarding every increment as an
//! [`AgentEvent`] in production order.

use crate::application::session_store::SessionStore;
use crate::application::tools::tool_specs;
use crate::domain::chat::ChatCompletionRequest;
use crate::domain::container::{ExecutorError, UserId};
use crate::domain::events::{AgentEvent, FinishReason};
use crate::domain::llm::{
    AssistantToolCall, ChatModel, ModelDelta, ModelMessage, ModelRole, ModelTurnRequest,
    TurnFinish,
};
use crate::domain::prompt::PromptSource;
use crate::infrastructure::mcp_client::McpClient;
use async_stream::stream;
use futures::{Stream, StreamExt};
use serde_json::{json, Value};
use std::collections::{BTreeMap, HashMap};
use std::pin::Pin;
use std::sync::Arc;
use tokio::sync::Mutex;
use tracing::{debug, info, warn};

/// Upper bound on model turns within one request; a loop that keeps
/// requesting tools past this is cut off with a clean finish.
const MAX_TURNS: usize = 16;

pub type EventStream = Pin<Box<dyn Stream<Item = AgentEvent> + Send>>;

struct ConversationState {
    session_id: String,
    messages: Vec<ModelMessage>,
}

/// Per-user agent runtime. The system prompt is fixed for the lifetime of
/// the runtime.
pub struct AgentRuntime {
    system_prompt: String,
    state: Mutex<ConversationState>,
}

pub struct AgentService {
    model: Arc<dyn ChatModel>,
    mcp: Arc<McpClient>,
    prompts: Arc<dyn PromptSource>,
    sessions: Arc<SessionStore>,
    runtimes: Mutex<HashMap<String, Arc<AgentRuntime>>>,
}

impl AgentService {
    pub fn new(
        model: Arc<dyn ChatModel>,
        mcp: Arc<McpClient>,
        prompts: Arc<dyn PromptSource>,
        sessions: Arc<SessionStore>,
    ) -> Self {
        Self {
            model,
            mcp,
            prompts,
            sessions,
            runtimes: Mutex::new(HashMap::new()),
        }
    }

    pub async fn runtime_count(&self) -> usize {
        self.runtimes.lock().await.len()
    }

    /// Resolve the stable user id for a request: the dedicated field when
    /// present, otherwise a freshly generated opaque id.
    pub fn resolve_user_id(request: &ChatCompletionRequest) -> String {
        match &request.user {
            Some(user) if !user.trim().is_empty() => user.clone(),
            _ => format!("user-{}", &uuid::Uuid::new_v4().simple().to_string()[..8]),
        }
    }

    async fn runtime_for(&self, user_id: &str, session_id: &str) -> Arc<AgentRuntime> {
        {
            let runtimes = self.runtimes.lock().await;
            if let Some(runtime) = runtimes.get(user_id) {
                return runtime.clone();
            }
        }

        // Capture the system prompt outside the map lock; a concurrent
        // creation for the same user is tolerated, first insert wins.
        let system_prompt = self.prompts.fetch().await;
        let runtime = Arc::new(AgentRuntime {
            system_prompt,
            state: Mutex::new(ConversationState {
                session_id: session_id.to_string(),
                messages: Vec::new(),
            }),
        });

        let mut runtimes = self.runtimes.lock().await;
        runtimes
            .entry(user_id.to_string())
            .or_insert(runtime)
            .clone()
    }

    /// Run one chat request as an agent loop. Returns the resolved user id
    /// and the ordered event stream.
    pub async fn run(
        &self,
        request: &ChatCompletionRequest,
    ) -> Result<(String, EventStream), ExecutorError> {
        if request.model.trim().is_empty() {
            return Err(ExecutorError::InvalidRequest(
                "model must not be empty".to_string(),
            ));
        }
        let user_message = request
            .messages
            .last()
            .map(|message| message.content.clone())
            .ok_or_else(|| ExecutorError::InvalidRequest("no messages provided".to_string()))?;

        let user_id = Self::resolve_user_id(request);
        let user = UserId::new(&user_id)?;
        let (session_id, fresh) = self.sessions.ensure_session(&user_id).await;
        debug!(user = %user_id, session = %session_id, fresh, "Chat completion accepted");

        let runtime = self.runtime_for(&user_id, &session_id).await;
        let events = self.drive(
            runtime,
            user,
            session_id,
            fresh,
            user_message,
            request.model.clone(),
            request.temperature,
            request.max_tokens,
        );
        Ok((user_id, events))
    }

    #[allow(clippy::too_many_arguments)]
    fn drive(
        &self,
        runtime: Arc<AgentRuntime>,
        user: UserId,
        session_id: String,
        fresh_session: bool,
        user_message: String,
        model_id: String,
        temperature: Option<f32>,
        max_tokens: Option<u32>,
    ) -> EventStream {
        let model = self.model.clone();
        let mcp = self.mcp.clone();

        let events = stream! {
            let mut messages = {
                let mut state = runtime.state.lock().await;
                if fresh_session || state.session_id != session_id {
                    state.session_id = session_id.clone();
                    state.messages.clear();
                }
                let mut conversation =
                    vec![ModelMessage::text(ModelRole::System, runtime.system_prompt.clone())];
                conversation.extend(state.messages.iter().cloned());
                conversation
            };
            messages.push(ModelMessage::text(ModelRole::User, user_message));

            let tools = tool_specs();
            let mut turns = 0usize;

            loop {
                turns += 1;
                if turns > MAX_TURNS {
                    warn!(user = %user, "Agent loop hit turn limit, finishing");
                    yield AgentEvent::Finish { reason: FinishReason::Stop };
                    break;
                }

                let turn_request = ModelTurnRequest {
                    model: model_id.clone(),
                    messages: messages.clone(),
                    tools: tools.clone(),
                    temperature,
                    max_tokens,
                };

                let mut deltas = match model.stream_turn(turn_request).await {
                    Ok(deltas) => deltas,
                    Err(e) => {
                        warn!(user = %user, error = %e, "Model call failed");
                        yield AgentEvent::Error {
                            error_kind: "model_call_failed".to_string(),
                            message: e.to_string(),
                        };
                        break;
                    }
                };

                let mut text = String::new();
                let mut pending: BTreeMap<usize, PendingCall> = BTreeMap::new();
                let mut finish = TurnFinish::Stop;
                let mut failed = false;

                while let Some(delta) = deltas.next().await {
                    match delta {
                        Ok(ModelDelta::Text(fragment)) => {
                            text.push_str(&fragment);
                            yield AgentEvent::TextDelta { text: fragment };
                        }
                        Ok(ModelDelta::ToolCall { index, id, name, arguments }) => {
                            let entry = pending.entry(index).or_default();
                            if let Some(id) = id {
                                entry.id = Some(id);
                            }
                            if let Some(name) = name {
                                entry.name = Some(name);
                            }
                            entry.arguments.push_str(&arguments);
                        }
                        Ok(ModelDelta::Finish(reason)) => finish = reason,
                        Err(e) => {
                            warn!(user = %user, error = %e, "Model stream failed mid-turn");
                            yield AgentEvent::Error {
                                error_kind: "model_call_failed".to_string(),
                                message: e.to_string(),
                            };
                            failed = true;
                            break;
                        }
                    }
                }
                if failed {
                    break;
                }

                if pending.is_empty() {
                    if !text.is_empty() {
                        messages.push(ModelMessage::text(ModelRole::Assistant, text));
                    }
                    let reason = match finish {
                        TurnFinish::Length => FinishReason::Length,
                        _ => FinishReason::Stop,
                    };
                    yield AgentEvent::Finish { reason };
                    break;
                }

                // Tool round: announce, dispatch, record, and go again.
                let calls: Vec<AssistantToolCall> = pending
                    .into_values()
                    .map(|call| call.into_assistant_call())
                    .collect();
                messages.push(ModelMessage::assistant_with_calls(
                    (!text.is_empty()).then_some(text),
                    calls.clone(),
                ));

                for call in calls {
                    let arguments: Value =
                        serde_json::from_str(&call.arguments).unwrap_or_else(|_| json!({}));
                    yield AgentEvent::ToolCall {
                        id: call.id.clone(),
                        name: call.name.clone(),
                        arguments: arguments.clone(),
                    };

                    let payload = match mcp.call_tool(&user, &call.name, arguments).await {
                        Ok(payload) => payload,
                        Err(e) => {
                            warn!(user = %user, tool = %call.name, error = %e, "Tool call failed");
                            json!({ "error": e.to_string() })
                        }
                    };
                    yield AgentEvent::ToolResult {
                        id: call.id.clone(),
                        payload: payload.clone(),
                    };
                    messages.push(ModelMessage::tool_result(call.id, payload.to_string()));
                }
            }

            // Persist the conversation for the next request on this
            // session; the leading system message stays out of history.
            let mut state = runtime.state.lock().await;
            if state.session_id == session_id {
                state.messages = messages.into_iter().skip(1).collect();
            }
            info!(user = %user, session = %session_id, turns, "Agent run finished");
        };

        Box::pin(events)
    }
}

#[derive(Default)]
struct PendingCall {
    id: Option<String>,
    name: Option<String>,
    arguments: String,
}

impl PendingCall {
    fn into_assistant_call(self) -> AssistantToolCall {
        AssistantToolCall {
            id: self
                .id
                .unwrap_or_else(|| format!("call_{}", &uuid::Uuid::new_v4().simple().to_string()[..12])),
            name: self.name.unwrap_or_default(),
            arguments: if self.arguments.is_empty() {
                "{}".to_string()
            } else {
                self.arguments
            },
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::domain::chat::{ChatMessage, ChatRole};

    fn request(user: Option<&str>) -> ChatCompletionRequest {
        serde_json::from_value(json!({
            "model": "test-model",
            "messages": [{"role": "user", "content": "hi"}],
            "stream": true,
            "user": user,
        }))
        .unwrap()
    }

    #[test]
    fn resolve_user_id_prefers_request_field() {
        assert_eq!(AgentService::resolve_user_id(&request(Some("u1"))), "u1");
    }

    #[test]
    fn resolve_user_id_generates_opaque_fallback() {
        let generated = AgentService::resolve_user_id(&request(None));
        assert!(generated.starts_with("user-"));
        assert_eq!(generated.len(), "user-".len() + 8);

        let blank = ChatCompletionRequest {
            model: "m".into(),
            messages: vec![ChatMessage {
                role: ChatRole::User,
                content: "hi".into(),
            }],
            stream: true,
            temperature: None,
            max_tokens: None,
            user: Some("   ".into()),
        };
        assert!(AgentService::resolve_user_id(&blank).starts_with("user-"));
    }

    #[test]
    fn pending_call_fills_missing_fields() {
        let call = PendingCall {
            id: None,
            name: Some("execute_bash".into()),
            arguments: String::new(),
        }
        .into_assistant_call();
        assert!(call.id.starts_with("call_"));
        assert_eq!(call.arguments, "{}");
    }
}
