// Copyright (c) 2026 100monkeys.ai
// SPDX-License-Identifier: AGPL-3.0

//! # Crucible server binary
//!
//! One binary, two surfaces:
//!
//! - `crucible serve-tools` - the MCP Tool & Prompt Server (containers,
//!   skills, artifacts)
//! - `crucible serve-api` - the OpenAI-compatible Agent API
//! - `crucible serve` - both in one process, for development
//!
//! Everything beyond host/port/log-level is configured through the
//! environment; see `Settings::from_env`.

use anyhow::{Context, Result};
use clap::{Parser, Subcommand};
use colored::Colorize;
use std::sync::Arc;
use tracing::info;

use crucible_core::application::agent::AgentService;
use crucible_core::application::prompt_cache::PromptCache;
use crucible_core::application::session_store::SessionStore;
use crucible_core::application::skill_registry::SkillRegistry;
use crucible_core::application::tools::ToolRegistry;
use crucible_core::domain::config::Settings;
use crucible_core::infrastructure::docker::DockerExecutor;
use crucible_core::infrastructure::llm::OpenAICompatAdapter;
use crucible_core::infrastructure::mcp_client::McpClient;
use crucible_core::presentation::agent_api::{self, AgentApiState};
use crucible_core::presentation::tools_api::{self, ToolsApiState};

/// Crucible - sandboxed code execution backend for AI agents
#[derive(Parser)]
#[command(name = "crucible")]
#[command(version, about, long_about = None)]
struct Cli {
    /// Tool server bind host
    #[arg(long, global = true, env = "MCP_SERVER_HOST", default_value = "0.0.0.0")]
    tools_host: String,

    /// Tool server bind port
    #[arg(long, global = true, env = "MCP_SERVER_PORT", default_value = "8989")]
    tools_port: u16,

    /// Agent API bind host
    #[arg(long, global = true, env = "AGENT_API_HOST", default_value = "0.0.0.0")]
    api_host: String,

    /// Agent API bind port
    #[arg(long, global = true, env = "AGENT_API_PORT", default_value = "8000")]
    api_port: u16,

    /// Log level (trace, debug, info, warn, error)
    #[arg(long, global = true, env = "CRUCIBLE_LOG_LEVEL", default_value = "info")]
    log_level: String,

    #[command(subcommand)]
    command: Option<Commands>,
}

#[derive(Subcommand)]
enum Commands {
    /// Run the MCP Tool & Prompt Server
    ServeTools,
    /// Run the OpenAI-compatible Agent API
    ServeApi,
    /// Run both servers in one process
    Serve,
}

#[tokio::main]
async fn main() -> Result<()> {
    let cli = Cli::parse();
    init_logging(&cli.log_level)?;

    let settings = Arc::new(Settings::from_env());

    match cli.command {
        Some(Commands::ServeTools) => {
            serve_tools(settings, &cli.tools_host, cli.tools_port).await
        }
        Some(Commands::ServeApi) => serve_api(settings, &cli.api_host, cli.api_port).await,
        Some(Commands::Serve) => {
            let tools = serve_tools(settings.clone(), &cli.tools_host, cli.tools_port);
            let api = serve_api(settings, &cli.api_host, cli.api_port);
            tokio::try_join!(tools, api)?;
            Ok(())
        }
        None => {
            eprintln!("{}", "No command specified. Use --help for usage.".yellow());
            std::process::exit(1);
        }
    }
}

async fn serve_tools(settings: Arc<Settings>, host: &str, port: u16) -> Result<()> {
    info!(image = %settings.executor_image, "Starting MCP Tool & Prompt Server");

    let executor = Arc::new(DockerExecutor::new(&settings).context("Docker client init failed")?);
    executor
        .healthcheck()
        .await
        .context("Docker daemon unreachable")?;
    executor.purge_orphans().await;

    let skills = Arc::new(SkillRegistry::new(&settings.skills_path));
    let state = Arc::new(ToolsApiState {
        registry: ToolRegistry::new(executor.clone()),
        executor: executor.clone(),
        skills,
    });

    let addr = format!("{}:{}", host, port);
    let listener = tokio::net::TcpListener::bind(&addr)
        .await
        .with_context(|| format!("failed to bind {}", addr))?;
    info!(addr = %addr, "Tool server listening");

    axum::serve(listener, tools_api::app(state))
        .with_graceful_shutdown(shutdown_signal())
        .await
        .context("tool server failed")?;

    info!(
        containers = executor.container_count().await,
        "Shutting down, cleaning up containers"
    );
    executor.release_all().await;
    Ok(())
}

async fn serve_api(settings: Arc<Settings>, host: &str, port: u16) -> Result<()> {
    info!(
        mcp = %settings.mcp_server_url,
        model = %settings.default_model,
        "Starting Agent API server"
    );

    let mcp = Arc::new(McpClient::new(settings.mcp_server_url.clone()));
    let prompts = Arc::new(PromptCache::new(mcp.clone(), settings.prompt_cache_ttl_secs));
    let model = Arc::new(OpenAICompatAdapter::new(
        settings.model_api_base.clone(),
        settings.model_api_key.clone(),
    ));
    let sessions = Arc::new(SessionStore::new(settings.session_timeout_secs));
    let cleanup = sessions.spawn_cleanup();

    let agent = Arc::new(AgentService::new(model, mcp, prompts, sessions.clone()));
    let state = Arc::new(AgentApiState {
        settings: settings.clone(),
        agent: agent.clone(),
        sessions: sessions.clone(),
        http: reqwest::Client::new(),
    });

    let addr = format!("{}:{}", host, port);
    let listener = tokio::net::TcpListener::bind(&addr)
        .await
        .with_context(|| format!("failed to bind {}", addr))?;
    info!(addr = %addr, "Agent API listening");

    axum::serve(listener, agent_api::app(state))
        .with_graceful_shutdown(shutdown_signal())
        .await
        .context("agent api failed")?;

    cleanup.abort();
    info!(
        sessions = sessions.active_count().await,
        runtimes = agent.runtime_count().await,
        "Agent API shut down"
    );
    Ok(())
}

async fn shutdown_signal() {
    let _ = tokio::signal::ctrl_c().await;
    info!("Shutdown signal received");
}

/// Initialize tracing subscriber for logging
fn init_logging(level: &str) -> Result<()> {
    let filter = tracing_subscriber::EnvFilter::try_from_default_env()
        .or_else(|_| tracing_subscriber::EnvFilter::try_new(level))
        .context("Failed to create log filter")?;

    tracing_subscriber::fmt()
        .with_env_filter(filter)
        .with_target(false)
        .with_thread_ids(false)
        .with_file(false)
        .with_line_number(false)
        .compact()
        .init();

    Ok(())
}
