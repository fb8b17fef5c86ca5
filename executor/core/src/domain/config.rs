// Copyright (c) 2026 100monkeys.ai
// SPDX-License-Identifier: AGPL-3.0

// Runtime configuration, loaded from environment variables with documented
// defaults. Host/port/log-level are CLI concerns and live on the clap layer.

use serde::Serialize;

/// Process-wide settings shared by both server surfaces.
#[derive(Debug, Clone, Serialize)]
pub struct Settings {
    /// URL of the MCP tool server as seen from the agent bridge.
    pub mcp_server_url: String,
    /// Health endpoint of the MCP tool server.
    pub mcp_server_health_url: String,

    /// Docker image for per-user executor containers.
    pub executor_image: String,
    /// Host directory bound read-only at /tools.
    pub tools_path: String,
    /// Host directory bound read-only at /skills.
    pub skills_path: String,
    /// In-container account used for exec sessions.
    pub exec_user: String,

    /// Idle lifetime of a conversation session, seconds.
    pub session_timeout_secs: u64,
    /// Lifetime of the cached system prompt, seconds.
    pub prompt_cache_ttl_secs: u64,
    /// Per-fetch artifact size ceiling, bytes.
    pub artifact_size_limit_bytes: u64,

    /// Model identifier in `provider/model` form.
    pub default_model: String,
    /// Logical agent name reported on the info endpoint.
    pub agent_name: String,
    /// Base URL of the OpenAI-compatible model endpoint.
    pub model_api_base: String,
    /// Bearer token for the model endpoint; empty disables the header.
    #[serde(skip)]
    pub model_api_key: String,
}

const DEFAULT_ARTIFACT_SIZE_LIMIT_MB: u64 = 50;

impl Settings {
    /// Load settings from the environment, falling back to defaults.
    pub fn from_env() -> Self {
        let artifact_limit_mb =
            env_parse("MCP_ARTIFACT_SIZE_LIMIT_MB", DEFAULT_ARTIFACT_SIZE_LIMIT_MB);

        Self {
            mcp_server_url: env_or("MCP_SERVER_URL", "http://localhost:8989/mcp"),
            mcp_server_health_url: env_or(
                "MCP_SERVER_HEALTH_URL",
                "http://localhost:8989/health",
            ),
            executor_image: env_or("MCP_EXECUTOR_IMAGE", "mcp-code-executor:latest"),
            tools_path: env_or("MCP_TOOLS_PATH", "./tools"),
            skills_path: env_or("MCP_SKILLS_PATH", "./skills"),
            exec_user: env_or("MCP_EXEC_USER", "coderunner"),
            session_timeout_secs: env_parse("SESSION_TIMEOUT_SECONDS", 3600),
            prompt_cache_ttl_secs: env_parse("PROMPT_CACHE_TTL_SECONDS", 3600),
            artifact_size_limit_bytes: artifact_limit_mb * 1024 * 1024,
            default_model: env_or("DEFAULT_MODEL", "anthropic/claude-sonnet-4-5-20250929"),
            agent_name: env_or("AGENT_NAME", "code_executor_agent"),
            model_api_base: env_or("MODEL_API_BASE", "http://localhost:4000/v1"),
            model_api_key: env_or("MODEL_API_KEY", ""),
        }
    }

    /// Provider segment of `default_model`, used as `owned_by` in the
    /// models listing. `unknown` when the id carries no provider prefix.
    pub fn model_owner(&self) -> String {
        match self.default_model.split_once('/') {
            Some((owner, _)) if !owner.is_empty() => owner.to_string(),
            _ => "unknown".to_string(),
        }
    }
}

fn env_or(key: &str, default: &str) -> String {
    std::env::var(key).unwrap_or_else(|_| default.to_string())
}

fn env_parse<T: std::str::FromStr>(key: &str, default: T) -> T {
    std::env::var(key)
        .ok()
        .and_then(|v| v.parse().ok())
        .unwrap_or(default)
}
