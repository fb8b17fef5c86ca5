// Copyright (c) 2026 100monkeys.ai
// SPDX-License-Identifier: AGPL-3.0

// The prompt seam between the agent bridge and the tool server.
//
// `PromptSource` is what the bridge consumes: infallible, always yields a
// usable prompt. `PromptFetcher` is the narrow server-facing dependency the
// cache sits on. The split keeps cache, MCP client, and agent runtime from
// depending on each other.

use async_trait::async_trait;
use thiserror::Error;

#[derive(Debug, Error)]
pub enum PromptFetchError {
    #[error("Prompt endpoint unreachable: {0}")]
    Unreachable(String),

    #[error("Prompt endpoint returned no usable prompt")]
    Empty,
}

/// Supplies the agent system prompt. Implementations must not fail; the
/// cache degrades to [`FALLBACK_PROMPT`] when the server cannot be reached.
#[async_trait]
pub trait PromptSource: Send + Sync {
    async fn fetch(&self) -> String;
}

/// Raw fetch from the tool server's prompt endpoint.
#[async_trait]
pub trait PromptFetcher: Send + Sync {
    async fn fetch_from_server(&self) -> Result<String, PromptFetchError>;
}

/// Static prompt used when the tool server cannot provide the rendered one.
/// Describes the environment and the four tools without any skill listing.
pub const FALLBACK_PROMPT: &str = "\
You are a code execution assistant with access to secure Docker containers.

You can:
- Execute bash commands and Python scripts
- Write files to the workspace
- Read file contents with pagination
- Inspect function documentation

Guidelines:
- Always validate user code before execution
- Use appropriate timeouts for long-running tasks
- Handle errors gracefully and provide clear feedback
- Keep the workspace organized

Available tools:
- execute_bash: Run commands in isolated container
- write_file: Create/overwrite files in workspace
- read_file: Read file contents (supports pagination)
- read_docstring: Extract function documentation

Be helpful, secure, and efficient!";
