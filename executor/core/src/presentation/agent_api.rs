// Copyright (c) 2026 100monkeys.ai
// SPDX-License-Identifier: AGPL-3.0
//! OpenAI-compatible Agent API surface.
//!
//! Streaming-only chat completions over SSE, a models listing, health with
//! a tool-server probe, and artifact proxy endpoints that let UI clients
//! download generated files without talking to the tool server directly.

use crate::application::agent::AgentService;
use crate::application::session_store::SessionStore;
use crate::domain::chat::{ChatCompletionRequest, ModelList};
use crate::domain::config::Settings;
use crate::domain::container::ExecutorError;
use crate::presentation::stream::chunk_payloads;
use crate::presentation::tools_api::ApiError;
use axum::extract::{Path, State};
use axum::http::{header, StatusCode};
use axum::response::sse::{Event, KeepAlive, Sse};
use axum::response::{IntoResponse, Response};
use axum::routing::{get, post};
use axum::{Json, Router};
use base64::Engine;
use futures::StreamExt;
use serde_json::{json, Value};
use std::convert::Infallible;
use std::sync::Arc;
use std::time::Duration;
use tracing::{error, info, warn};

pub const SERVICE_NAME: &str = "agent-api";

const HEALTH_PROBE_TIMEOUT: Duration = Duration::from_secs(5);
const PROXY_LIST_TIMEOUT: Duration = Duration::from_secs(10);
const PROXY_FETCH_TIMEOUT: Duration = Duration::from_secs(30);

pub struct AgentApiState {
    pub settings: Arc<Settings>,
    pub agent: Arc<AgentService>,
    pub sessions: Arc<SessionStore>,
    pub http: reqwest::Client,
}

pub fn app(state: Arc<AgentApiState>) -> Router {
    Router::new()
        .route("/", get(info_root))
        .route("/health", get(health))
        .route("/v1/models", get(list_models))
        .route("/v1/chat/completions", post(chat_completions))
        .route("/artifacts/:user_id", get(proxy_list_artifacts))
        .route("/artifacts/:user_id/:artifact_id", get(proxy_get_artifact))
        .with_state(state)
}

async fn info_root(State(state): State<Arc<AgentApiState>>) -> Json<Value> {
    Json(json!({
        "name": "Code Execution Agent API",
        "version": env!("CARGO_PKG_VERSION"),
        "description": "OpenAI-compatible API for code execution agents",
        "endpoints": {
            "health": "/health",
            "models": "/v1/models",
            "chat": "/v1/chat/completions",
        },
        "mcp_server": state.settings.mcp_server_url,
        "default_model": state.settings.default_model,
        "agent_name": state.settings.agent_name,
        "active_sessions": state.sessions.active_count().await,
    }))
}

async fn health(State(state): State<Arc<AgentApiState>>) -> Response {
    let probe = state
        .http
        .get(&state.settings.mcp_server_health_url)
        .timeout(HEALTH_PROBE_TIMEOUT)
        .send()
        .await;
    let connected = matches!(&probe, Ok(response) if response.status().is_success());
    if let Err(e) = &probe {
        warn!(error = %e, "Tool server health probe failed");
    }

    let body = Json(json!({
        "status": if connected { "healthy" } else { "degraded" },
        "service": SERVICE_NAME,
        "mcp_server_connected": connected,
        "timestamp": chrono::Utc::now().to_rfc3339(),
    }));
    let status = if connected {
        StatusCode::OK
    } else {
        StatusCode::SERVICE_UNAVAILABLE
    };
    (status, body).into_response()
}

async fn list_models(State(state): State<Arc<AgentApiState>>) -> Json<ModelList> {
    Json(ModelList::single(
        &state.settings.default_model,
        &state.settings.model_owner(),
    ))
}

async fn chat_completions(
    State(state): State<Arc<AgentApiState>>,
    Json(request): Json<ChatCompletionRequest>,
) -> Result<Response, ApiError> {
    if !request.stream {
        return Err(ApiError(ExecutorError::InvalidRequest(
            "Only streaming responses are supported. Set stream=true".to_string(),
        )));
    }
    if request.messages.is_empty() {
        return Err(ApiError(ExecutorError::InvalidRequest(
            "no messages provided".to_string(),
        )));
    }

    let (user_id, events) = state.agent.run(&request).await?;
    info!(user = %user_id, model = %request.model, "Chat completion stream started");

    let payloads = chunk_payloads(events, request.model.clone());
    let sse_stream = payloads.map(|payload| Ok::<_, Infallible>(Event::default().data(payload)));

    Ok(Sse::new(sse_stream)
        .keep_alive(KeepAlive::default())
        .into_response())
}

fn tool_server_base(settings: &Settings) -> String {
    settings
        .mcp_server_health_url
        .trim_end_matches("/health")
        .to_string()
}

async fn proxy_list_artifacts(
    State(state): State<Arc<AgentApiState>>,
    Path(user_id): Path<String>,
) -> Result<Json<Value>, ApiError> {
    let url = format!("{}/{}/artifacts", tool_server_base(&state.settings), user_id);
    let response = state
        .http
        .get(&url)
        .timeout(PROXY_LIST_TIMEOUT)
        .send()
        .await
        .map_err(|e| ApiError(ExecutorError::Internal(format!("failed to list artifacts: {}", e))))?;

    if !response.status().is_success() {
        error!(user = %user_id, status = %response.status(), "Artifact listing failed upstream");
        return Err(ApiError(ExecutorError::Internal(
            "failed to list artifacts".to_string(),
        )));
    }

    let data: Value = response
        .json()
        .await
        .map_err(|e| ApiError(ExecutorError::Internal(e.to_string())))?;
    Ok(Json(json!({
        "artifacts": data.get("artifacts").cloned().unwrap_or_else(|| json!([])),
        "count": data.get("count").cloned().unwrap_or_else(|| json!(0)),
    })))
}

async fn proxy_get_artifact(
    State(state): State<Arc<AgentApiState>>,
    Path((user_id, artifact_id)): Path<(String, String)>,
) -> Result<Response, ApiError> {
    let url = format!(
        "{}/{}/artifacts/{}",
        tool_server_base(&state.settings),
        user_id,
        artifact_id
    );
    let response = state
        .http
        .get(&url)
        .timeout(PROXY_FETCH_TIMEOUT)
        .send()
        .await
        .map_err(|e| {
            ApiError(ExecutorError::Internal(format!(
                "failed to download artifact: {}",
                e
            )))
        })?;

    let status = response.status();
    if status == reqwest::StatusCode::NOT_FOUND {
        return Err(ApiError(ExecutorError::FileNotFound(artifact_id)));
    }
    if status == reqwest::StatusCode::BAD_REQUEST {
        return Err(ApiError(ExecutorError::InvalidRequest(format!(
            "invalid artifact request for '{}'",
            artifact_id
        ))));
    }
    if !status.is_success() {
        error!(user = %user_id, artifact = %artifact_id, status = %status, "Artifact download failed upstream");
        return Err(ApiError(ExecutorError::Internal(
            "failed to download artifact".to_string(),
        )));
    }

    let data: Value = response
        .json()
        .await
        .map_err(|e| ApiError(ExecutorError::Internal(e.to_string())))?;
    let encoded = data.get("data").and_then(Value::as_str).unwrap_or_default();
    let bytes = base64::engine::general_purpose::STANDARD
        .decode(encoded)
        .map_err(|e| ApiError(ExecutorError::Internal(format!("invalid artifact payload: {}", e))))?;

    let disposition = format!("attachment; filename=\"{}\"", artifact_id);
    Ok((
        StatusCode::OK,
        [
            (header::CONTENT_TYPE, "application/octet-stream".to_string()),
            (header::CONTENT_DISPOSITION, disposition),
        ],
        bytes,
    )
        .into_response())
}
