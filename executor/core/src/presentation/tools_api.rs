// Copyright (c) 2026 100monkeys.ai
// SPDX-License-Identifier: AGPL-3.0
//! Tool & Prompt Server surface.
//!
//! JSON-RPC 2.0 on `POST /mcp` carries the MCP methods; health, skills,
//! and artifact retrieval ride plain HTTP beside it. User routing for tool
//! calls comes exclusively from the `x-user-id` header.

use crate::application::skill_registry::SkillRegistry;
use crate::application::tools::{tool_descriptors, ToolRegistry};
use crate::domain::container::{ExecutorError, UserId};
use crate::domain::mcp::{
    self, PromptGetParams, PromptMessage, RpcRequest, RpcResponse, ToolCallParams,
};
use crate::infrastructure::docker::DockerExecutor;
use axum::extract::{Path, State};
use axum::http::{HeaderMap, StatusCode};
use axum::response::{IntoResponse, Response};
use axum::routing::{get, post};
use axum::{Json, Router};
use base64::Engine;
use serde_json::{json, Value};
use std::sync::Arc;
use tracing::{info, warn};

pub const SERVICE_NAME: &str = "mcp-code-executor";

pub struct ToolsApiState {
    pub executor: Arc<DockerExecutor>,
    pub registry: ToolRegistry,
    pub skills: Arc<SkillRegistry>,
}

pub fn app(state: Arc<ToolsApiState>) -> Router {
    Router::new()
        .route("/mcp", post(handle_rpc))
        .route("/health", get(health))
        .route("/skills", get(list_skills))
        .route("/skills/:id", get(get_skill))
        .route("/:user_id/artifacts", get(list_artifacts))
        .route("/:user_id/artifacts/:name", get(get_artifact))
        .with_state(state)
}

/// HTTP error wrapper mapping the substrate taxonomy onto status codes.
pub struct ApiError(pub ExecutorError);

impl IntoResponse for ApiError {
    fn into_response(self) -> Response {
        let status = match &self.0 {
            ExecutorError::InvalidRequest(_)
            | ExecutorError::MissingUserContext
            | ExecutorError::PathViolation(_)
            | ExecutorError::ArtifactTooLarge { .. } => StatusCode::BAD_REQUEST,
            ExecutorError::FileNotFound(_) => StatusCode::NOT_FOUND,
            ExecutorError::ImageUnavailable(_) | ExecutorError::ContainerUnavailable(_) => {
                StatusCode::SERVICE_UNAVAILABLE
            }
            _ => StatusCode::INTERNAL_SERVER_ERROR,
        };
        let body = Json(json!({ "error": { "message": self.0.to_string() } }));
        (status, body).into_response()
    }
}

impl From<ExecutorError> for ApiError {
    fn from(error: ExecutorError) -> Self {
        Self(error)
    }
}

async fn handle_rpc(
    State(state): State<Arc<ToolsApiState>>,
    headers: HeaderMap,
    Json(request): Json<RpcRequest>,
) -> Json<RpcResponse> {
    if request.jsonrpc != "2.0" {
        return Json(RpcResponse::failure(
            request.id,
            mcp::INVALID_REQUEST,
            "invalid jsonrpc version",
        ));
    }

    let id = request.id.clone();
    let response = match request.method.as_str() {
        "initialize" => RpcResponse::success(
            id,
            json!({
                "protocolVersion": "2024-11-05",
                "serverInfo": {
                    "name": SERVICE_NAME,
                    "version": env!("CARGO_PKG_VERSION"),
                },
                "capabilities": { "tools": {}, "prompts": {} },
            }),
        ),
        "tools/list" => RpcResponse::success(id, json!({ "tools": tool_descriptors() })),
        "tools/call" => handle_tool_call(&state, &headers, id, request.params).await,
        "prompts/list" => RpcResponse::success(
            id,
            json!({
                "prompts": [{
                    "name": mcp::AGENT_SYSTEM_PROMPT,
                    "description": "Agent system prompt with embedded skill catalog",
                }],
            }),
        ),
        "prompts/get" => handle_prompt_get(&state, id, request.params).await,
        other => RpcResponse::failure(
            id,
            mcp::METHOD_NOT_FOUND,
            format!("unknown method '{}'", other),
        ),
    };

    Json(response)
}

async fn handle_tool_call(
    state: &ToolsApiState,
    headers: &HeaderMap,
    id: Value,
    params: Option<Value>,
) -> RpcResponse {
    let user = match user_from_headers(headers) {
        Ok(user) => user,
        Err(_) => {
            warn!("Tool call rejected: missing x-user-id header");
            return RpcResponse::failure(
                id,
                mcp::MISSING_USER_CONTEXT,
                "missing x-user-id header",
            );
        }
    };

    let params: ToolCallParams = match params.map(serde_json::from_value).transpose() {
        Ok(Some(params)) => params,
        Ok(None) => {
            return RpcResponse::failure(id, mcp::INVALID_PARAMS, "missing params");
        }
        Err(e) => {
            return RpcResponse::failure(
                id,
                mcp::INVALID_PARAMS,
                format!("invalid params: {}", e),
            );
        }
    };

    match state
        .registry
        .dispatch(&user, &params.name, params.arguments)
        .await
    {
        Ok(result) => RpcResponse::success(id, result),
        Err(e) => {
            warn!(user = %user, tool = %params.name, error = %e, "Tool call failed");
            let code = match &e {
                ExecutorError::MissingUserContext => mcp::MISSING_USER_CONTEXT,
                ExecutorError::InvalidRequest(_) => mcp::INVALID_PARAMS,
                _ => mcp::TOOL_EXECUTION_ERROR,
            };
            RpcResponse::failure(id, code, e.to_string())
        }
    }
}

async fn handle_prompt_get(
    state: &ToolsApiState,
    id: Value,
    params: Option<Value>,
) -> RpcResponse {
    let params: Option<PromptGetParams> =
        params.and_then(|value| serde_json::from_value(value).ok());
    let Some(params) = params else {
        return RpcResponse::failure(id, mcp::INVALID_PARAMS, "missing prompt name");
    };
    if params.name != mcp::AGENT_SYSTEM_PROMPT {
        return RpcResponse::failure(
            id,
            mcp::INVALID_PARAMS,
            format!("unknown prompt '{}'", params.name),
        );
    }

    let prompt = state.skills.render_prompt().await;
    info!(chars = prompt.len(), "Served agent system prompt");
    RpcResponse::success(
        id,
        json!({
            "description": "Agent system prompt with embedded skill catalog",
            "messages": [PromptMessage::user_text(prompt)],
        }),
    )
}

fn user_from_headers(headers: &HeaderMap) -> Result<UserId, ExecutorError> {
    let raw = headers
        .get(mcp::USER_ID_HEADER)
        .and_then(|value| value.to_str().ok())
        .unwrap_or_default();
    UserId::new(raw)
}

async fn health(State(_state): State<Arc<ToolsApiState>>) -> Json<Value> {
    // The executor handle exists for the lifetime of the router, so the
    // manager is initialized whenever we can answer at all.
    Json(json!({
        "status": "healthy",
        "service": SERVICE_NAME,
        "client_initialized": true,
    }))
}

async fn list_skills(State(state): State<Arc<ToolsApiState>>) -> Json<Value> {
    let skills = state.skills.skills().await;
    let entries: Vec<Value> = skills
        .iter()
        .map(|skill| {
            json!({
                "id": skill.id,
                "name": skill.name,
                "description": skill.description,
                "version": skill.version,
            })
        })
        .collect();
    Json(json!({ "skills": entries, "count": entries.len() }))
}

async fn get_skill(
    State(state): State<Arc<ToolsApiState>>,
    Path(id): Path<String>,
) -> Result<Json<Value>, ApiError> {
    let skill = state
        .skills
        .get(&id)
        .await
        .ok_or_else(|| ApiError(ExecutorError::FileNotFound(format!("skill '{}'", id))))?;
    Ok(Json(serde_json::to_value(&skill).map_err(|e| {
        ApiError(ExecutorError::Internal(e.to_string()))
    })?))
}

async fn list_artifacts(
    State(state): State<Arc<ToolsApiState>>,
    Path(user_id): Path<String>,
) -> Result<Json<Value>, ApiError> {
    let user = UserId::new(user_id)?;
    let artifacts = state.executor.list_artifacts(&user).await?;
    Ok(Json(json!({
        "count": artifacts.len(),
        "artifacts": artifacts,
    })))
}

async fn get_artifact(
    State(state): State<Arc<ToolsApiState>>,
    Path((user_id, name)): Path<(String, String)>,
) -> Result<Json<Value>, ApiError> {
    let user = UserId::new(user_id)?;
    let bytes = state.executor.get_artifact(&user, &name).await?;
    let data = base64::engine::general_purpose::STANDARD.encode(bytes);
    Ok(Json(json!({
        "artifact_id": name,
        "data": data,
        "encoding": "base64",
    })))
}
