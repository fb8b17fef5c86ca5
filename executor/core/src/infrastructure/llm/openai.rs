// Copyright (c) 2026 100monkeys.ai
// SPDX-License-Identifier: AGPL-3.0

// OpenAI-compatible streaming adapter.
//
// Anti-Corruption Layer for any endpoint speaking the OpenAI chat API
// (OpenAI itself, LiteLLM proxies, vLLM, LM Studio). Streams SSE frames
// and translates them into domain deltas, including tool-call fragments.

use crate::domain::llm::{
    ChatModel, LLMError, ModelDelta, ModelStream, ModelTurnRequest, TurnFinish,
};
use async_stream::stream;
use async_trait::async_trait;
use futures::StreamExt;
use serde::{Deserialize, Serialize};
use serde_json::Value;

pub struct OpenAICompatAdapter {
    client: reqwest::Client,
    endpoint: String,
    api_key: String,
}

#[derive(Serialize)]
struct WireRequest {
    model: String,
    messages: Vec<WireMessage>,
    stream: bool,
    #[serde(skip_serializing_if = "Vec::is_empty")]
    tools: Vec<WireTool>,
    #[serde(skip_serializing_if = "Option::is_none")]
    temperature: Option<f32>,
    #[serde(skip_serializing_if = "Option::is_none")]
    max_tokens: Option<u32>,
}

#[derive(Serialize)]
struct WireMessage {
    role: &'static str,
    #[serde(skip_serializing_if = "Option::is_none")]
    content: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    tool_calls: Option<Vec<Value>>,
    #[serde(skip_serializing_if = "Option::is_none")]
    tool_call_id: Option<String>,
}

#[derive(Serialize)]
struct WireTool {
    #[serde(rename = "type")]
    tool_type: &'static str,
    function: WireFunction,
}

#[derive(Serialize)]
struct WireFunction {
    name: String,
    description: String,
    parameters: Value,
}

#[derive(Deserialize)]
struct WireChunk {
    #[serde(default)]
    choices: Vec<WireChoice>,
}

#[derive(Deserialize)]
struct WireChoice {
    #[serde(default)]
    delta: WireDelta,
    #[serde(default)]
    finish_reason: Option<String>,
}

#[derive(Deserialize, Default)]
struct WireDelta {
    #[serde(default)]
    content: Option<String>,
    #[serde(default)]
    tool_calls: Option<Vec<WireToolCallDelta>>,
}

#[derive(Deserialize)]
struct WireToolCallDelta {
    #[serde(default)]
    index: usize,
    #[serde(default)]
    id: Option<String>,
    #[serde(default)]
    function: Option<WireFunctionDelta>,
}

#[derive(Deserialize)]
struct WireFunctionDelta {
    #[serde(default)]
    name: Option<String>,
    #[serde(default)]
    arguments: Option<String>,
}

impl OpenAICompatAdapter {
    pub fn new(endpoint: String, api_key: String) -> Self {
        Self {
            client: reqwest::Client::new(),
            endpoint,
            api_key,
        }
    }

    fn to_wire(request: &ModelTurnRequest) -> WireRequest {
        let messages = request
            .messages
            .iter()
            .map(|message| {
                let tool_calls = if message.tool_calls.is_empty() {
                    None
                } else {
                    Some(
                        message
                            .tool_calls
                            .iter()
                            .map(|call| {
                                serde_json::json!({
                                    "id": call.id,
                                    "type": "function",
                                    "function": {
                                        "name": call.name,
                                        "arguments": call.arguments,
                                    },
                                })
                            })
                            .collect(),
                    )
                };
                WireMessage {
                    role: message.role.as_str(),
                    content: message.content.clone(),
                    tool_calls,
                    tool_call_id: message.tool_call_id.clone(),
                }
            })
            .collect();

        let tools = request
            .tools
            .iter()
            .map(|tool| WireTool {
                tool_type: "function",
                function: WireFunction {
                    name: tool.name.clone(),
                    description: tool.description.clone(),
                    parameters: tool.parameters.clone(),
                },
            })
            .collect();

        WireRequest {
            model: request.model.clone(),
            messages,
            stream: true,
            tools,
            temperature: request.temperature,
            max_tokens: request.max_tokens,
        }
    }
}

#[async_trait]
impl ChatModel for OpenAICompatAdapter {
    async fn stream_turn(&self, request: ModelTurnRequest) -> Result<ModelStream, LLMError> {
        let url = format!("{}/chat/completions", self.endpoint.trim_end_matches('/'));
        let wire = Self::to_wire(&request);

        let mut http = self.client.post(&url).json(&wire);
        if !self.api_key.is_empty() {
            http = http.header("Authorization", format!("Bearer {}", self.api_key));
        }

        let response = http
            .send()
            .await
            .map_err(|e| LLMError::Network(e.to_string()))?;

        if !response.status().is_success() {
            let status = response.status();
            let error_text = response.text().await.unwrap_or_default();

            return Err(if status == 401 || status == 403 {
                LLMError::Authentication(error_text)
            } else if status == 429 {
                LLMError::RateLimit
            } else if status == 404 {
                LLMError::ModelNotFound(request.model.clone())
            } else {
                LLMError::Provider(format!("HTTP {}: {}", status, error_text))
            });
        }

        let mut body = response.bytes_stream();
        let deltas = stream! {
            let mut buffer = String::new();
            let mut finished = false;
            let mut saw_done = false;

            while !saw_done {
                let Some(chunk) = body.next().await else { break };
                let chunk = match chunk {
                    Ok(chunk) => chunk,
                    Err(e) => {
                        yield Err(LLMError::Network(e.to_string()));
                        return;
                    }
                };
                buffer.push_str(&String::from_utf8_lossy(&chunk));

                // SSE frames are separated by a blank line.
                while let Some(pos) = buffer.find("\n\n") {
                    let frame = buffer[..pos].to_string();
                    buffer.drain(..pos + 2);

                    let mut payloads = Vec::new();
                    for line in frame.lines() {
                        let Some(data) = line.strip_prefix("data:") else {
                            continue;
                        };
                        let data = data.trim();
                        if data == "[DONE]" {
                            saw_done = true;
                            break;
                        }
                        payloads.push(data.to_string());
                    }

                    for data in payloads {
                        let parsed: WireChunk = match serde_json::from_str(&data) {
                            Ok(parsed) => parsed,
                            Err(e) => {
                                yield Err(LLMError::Provider(format!(
                                    "malformed stream chunk: {}",
                                    e
                                )));
                                return;
                            }
                        };

                        for choice in parsed.choices {
                            if let Some(text) = choice.delta.content {
                                if !text.is_empty() {
                                    yield Ok(ModelDelta::Text(text));
                                }
                            }
                            if let Some(calls) = choice.delta.tool_calls {
                                for call in calls {
                                    let (name, arguments) = match call.function {
                                        Some(function) => (
                                            function.name,
                                            function.arguments.unwrap_or_default(),
                                        ),
                                        None => (None, String::new()),
                                    };
                                    yield Ok(ModelDelta::ToolCall {
                                        index: call.index,
                                        id: call.id,
                                        name,
                                        arguments,
                                    });
                                }
                            }
                            if let Some(reason) = choice.finish_reason {
                                finished = true;
                                let finish = match reason.as_str() {
                                    "length" => TurnFinish::Length,
                                    "tool_calls" => TurnFinish::ToolCalls,
                                    _ => TurnFinish::Stop,
                                };
                                yield Ok(ModelDelta::Finish(finish));
                            }
                        }
                    }

                    if saw_done {
                        break;
                    }
                }
            }

            if !finished {
                // Stream ended without a finish marker; treat as a clean stop
                // so the agent loop can settle.
                yield Ok(ModelDelta::Finish(TurnFinish::Stop));
            }
        };

        Ok(Box::pin(deltas))
    }
}
