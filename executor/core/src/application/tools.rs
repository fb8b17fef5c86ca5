// Copyright (c) 2026 100monkeys.ai
// SPDX-License-Identifier: AGPL-3.0
//! The MCP tool registry.
//!
//! Tool names, argument keys, and return shapes are a frozen contract.
//! Handlers are held in an explicit registry keyed by name; the same
//! schema table also feeds the agent bridge's tool declarations, so the
//! two surfaces cannot drift apart.

use crate::domain::container::{ExecutorError, UserId};
use crate::domain::exec::DEFAULT_EXEC_TIMEOUT_SECS;
use crate::domain::llm::ToolSpec;
use crate::domain::mcp::ToolDescriptor;
use crate::infrastructure::docker::DockerExecutor;
use serde::Deserialize;
use serde_json::{json, Value};
use std::sync::Arc;
use tracing::info;

pub const EXECUTE_BASH: &str = "execute_bash";
pub const READ_FILE: &str = "read_file";
pub const WRITE_FILE: &str = "write_file";
pub const READ_DOCSTRING: &str = "read_docstring";

/// Name, description, and argument schema of every tool, in listing order.
fn schema_table() -> Vec<(&'static str, &'static str, Value)> {
    vec![
        (
            EXECUTE_BASH,
            "Execute a bash command in the user's isolated container. The \
             container persists between calls for the same user.",
            json!({
                "type": "object",
                "properties": {
                    "command": {
                        "type": "string",
                        "description": "Bash command to execute in the container"
                    },
                    "timeout": {
                        "type": "integer",
                        "description": "Command timeout in seconds (default: 30)"
                    }
                },
                "required": ["command"]
            }),
        ),
        (
            READ_FILE,
            "Read a file from the user's container with optional line-based \
             pagination. Use the artifact endpoint for binary files.",
            json!({
                "type": "object",
                "properties": {
                    "file_path": {
                        "type": "string",
                        "description": "Absolute path to the file in the container"
                    },
                    "offset": {
                        "type": "integer",
                        "description": "Line number to start reading from (0-indexed)"
                    },
                    "line_count": {
                        "type": ["integer", "null"],
                        "description": "Number of lines to read (null for all)"
                    }
                },
                "required": ["file_path"]
            }),
        ),
        (
            WRITE_FILE,
            "Write content to a file in the user's container, creating \
             parent directories as needed.",
            json!({
                "type": "object",
                "properties": {
                    "file_path": {
                        "type": "string",
                        "description": "Absolute path where to write the file"
                    },
                    "content": {
                        "type": "string",
                        "description": "Content to write to the file"
                    }
                },
                "required": ["file_path", "content"]
            }),
        ),
        (
            READ_DOCSTRING,
            "Read the docstring of a top-level function from a Python file \
             in the user's container.",
            json!({
                "type": "object",
                "properties": {
                    "file_path": {
                        "type": "string",
                        "description": "Absolute path to the Python file"
                    },
                    "function_name": {
                        "type": "string",
                        "description": "Name of the function to inspect"
                    }
                },
                "required": ["file_path", "function_name"]
            }),
        ),
    ]
}

/// Descriptors served by `tools/list`.
pub fn tool_descriptors() -> Vec<ToolDescriptor> {
    schema_table()
        .into_iter()
        .map(|(name, description, schema)| ToolDescriptor {
            name: name.to_string(),
            description: description.to_string(),
            input_schema: schema,
        })
        .collect()
}

/// Tool declarations handed to the model by the agent bridge.
pub fn tool_specs() -> Vec<ToolSpec> {
    schema_table()
        .into_iter()
        .map(|(name, description, schema)| ToolSpec {
            name: name.to_string(),
            description: description.to_string(),
            parameters: schema,
        })
        .collect()
}

#[derive(Deserialize)]
struct ExecuteBashArgs {
    command: String,
    #[serde(default)]
    timeout: Option<u64>,
}

#[derive(Deserialize)]
struct ReadFileArgs {
    file_path: String,
    #[serde(default)]
    offset: u64,
    #[serde(default)]
    line_count: Option<u64>,
}

#[derive(Deserialize)]
struct WriteFileArgs {
    file_path: String,
    content: String,
}

#[derive(Deserialize)]
struct ReadDocstringArgs {
    file_path: String,
    function_name: String,
}

/// Dispatches tool invocations to the execution substrate.
pub struct ToolRegistry {
    executor: Arc<DockerExecutor>,
}

impl ToolRegistry {
    pub fn new(executor: Arc<DockerExecutor>) -> Self {
        Self { executor }
    }

    pub fn contains(&self, name: &str) -> bool {
        matches!(name, EXECUTE_BASH | READ_FILE | WRITE_FILE | READ_DOCSTRING)
    }

    /// Invoke `name` for `user`. Unknown names and malformed arguments are
    /// `InvalidRequest`; substrate failures keep their own kinds.
    pub async fn dispatch(
        &self,
        user: &UserId,
        name: &str,
        arguments: Value,
    ) -> Result<Value, ExecutorError> {
        match name {
            EXECUTE_BASH => {
                let args: ExecuteBashArgs = parse_args(arguments)?;
                let timeout = args.timeout.unwrap_or(DEFAULT_EXEC_TIMEOUT_SECS);
                info!(user = %user, command = %truncate(&args.command, 100), "execute_bash");
                let output = self.executor.execute(user, &args.command, timeout).await?;
                serde_json::to_value(&output)
                    .map_err(|e| ExecutorError::Internal(e.to_string()))
            }
            READ_FILE => {
                let args: ReadFileArgs = parse_args(arguments)?;
                info!(user = %user, path = %args.file_path, "read_file");
                let content = self
                    .executor
                    .read_file(user, &args.file_path, args.offset, args.line_count)
                    .await?;
                Ok(Value::String(content))
            }
            WRITE_FILE => {
                let args: WriteFileArgs = parse_args(arguments)?;
                info!(user = %user, path = %args.file_path, "write_file");
                let written = self
                    .executor
                    .write_file(user, &args.file_path, args.content.as_bytes())
                    .await?;
                Ok(Value::String(format!(
                    "Successfully wrote {} bytes to {}",
                    written, args.file_path
                )))
            }
            READ_DOCSTRING => {
                let args: ReadDocstringArgs = parse_args(arguments)?;
                info!(
                    user = %user,
                    path = %args.file_path,
                    function = %args.function_name,
                    "read_docstring"
                );
                let doc = self
                    .executor
                    .read_docstring(user, &args.file_path, &args.function_name)
                    .await?;
                Ok(Value::String(doc))
            }
            other => Err(ExecutorError::InvalidRequest(format!(
                "unknown tool '{}'",
                other
            ))),
        }
    }
}

fn parse_args<T: serde::de::DeserializeOwned>(arguments: Value) -> Result<T, ExecutorError> {
    serde_json::from_value(arguments)
        .map_err(|e| ExecutorError::InvalidRequest(format!("invalid tool arguments: {}", e)))
}

fn truncate(s: &str, limit: usize) -> &str {
    match s.char_indices().nth(limit) {
        Some((idx, _)) => &s[..idx],
        None => s,
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn registry_lists_the_four_frozen_tools() {
        let names: Vec<String> = tool_descriptors().into_iter().map(|d| d.name).collect();
        assert_eq!(
            names,
            vec![EXECUTE_BASH, READ_FILE, WRITE_FILE, READ_DOCSTRING]
        );
    }

    #[test]
    fn specs_and_descriptors_share_schemas() {
        let specs = tool_specs();
        let descriptors = tool_descriptors();
        for (spec, descriptor) in specs.iter().zip(descriptors.iter()) {
            assert_eq!(spec.name, descriptor.name);
            assert_eq!(spec.parameters, descriptor.input_schema);
        }
    }

    #[test]
    fn execute_bash_args_default_timeout() {
        let args: ExecuteBashArgs =
            serde_json::from_value(json!({"command": "echo hi"})).unwrap();
        assert_eq!(args.timeout, None);

        let args: ExecuteBashArgs =
            serde_json::from_value(json!({"command": "echo hi", "timeout": 5})).unwrap();
        assert_eq!(args.timeout, Some(5));
    }

    #[test]
    fn read_file_args_defaults() {
        let args: ReadFileArgs =
            serde_json::from_value(json!({"file_path": "/workspace/a.txt"})).unwrap();
        assert_eq!(args.offset, 0);
        assert_eq!(args.line_count, None);
    }

    #[test]
    fn truncate_respects_char_boundaries() {
        assert_eq!(truncate("héllo wörld", 5), "héllo");
        assert_eq!(truncate("short", 100), "short");
    }
}
