// Copyright (c) 2026 100monkeys.ai
// SPDX-License-Identifier: AGPL-3.0
//! Container identity and the execution-substrate error taxonomy.
//!
//! A user id is an opaque caller-supplied token; equality on it determines
//! container identity and session scope. Container names follow the
//! `mcp-executor-<user>` convention, which also lets a restarted process
//! sweep orphans left by a crashed predecessor.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use thiserror::Error;

/// Name prefix for every managed container. Anything matching this prefix
/// is assumed to be ours during orphan cleanup.
pub const CONTAINER_NAME_PREFIX: &str = "mcp-executor-";

/// Writable tree for scratch work inside a container.
pub const WORKSPACE_DIR: &str = "/workspace";
/// Writable tree for published artifacts inside a container.
pub const ARTIFACTS_DIR: &str = "/artifacts";
/// Read-only mount point for helper tool modules.
pub const TOOLS_MOUNT: &str = "/tools";
/// Read-only mount point for skill documents.
pub const SKILLS_MOUNT: &str = "/skills";

/// Opaque per-request user token. Non-empty by construction.
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct UserId(String);

impl UserId {
    pub fn new(raw: impl Into<String>) -> Result<Self, ExecutorError> {
        let raw = raw.into();
        if raw.trim().is_empty() {
            return Err(ExecutorError::MissingUserContext);
        }
        Ok(Self(raw))
    }

    pub fn as_str(&self) -> &str {
        &self.0
    }

    /// Container-safe form: characters outside `[A-Za-z0-9_.-]` become `-`,
    /// truncated to 63 bytes (hostname limit).
    pub fn sanitized(&self) -> String {
        let mut out: String = self
            .0
            .chars()
            .map(|c| {
                if c.is_ascii_alphanumeric() || matches!(c, '_' | '.' | '-') {
                    c
                } else {
                    '-'
                }
            })
            .collect();
        out.truncate(63);
        out
    }

    pub fn container_name(&self) -> String {
        format!("{}{}", CONTAINER_NAME_PREFIX, self.sanitized())
    }
}

impl std::fmt::Display for UserId {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(&self.0)
    }
}

/// Lifecycle state of a per-user container record.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum ContainerState {
    Absent,
    Starting,
    Running,
    Stopped,
    Removing,
}

/// Bookkeeping for one user's container. The manager owns these records
/// exclusively; at most one per user id in a state other than `Absent`.
#[derive(Debug, Clone)]
pub struct ContainerRecord {
    pub container_id: String,
    pub image: String,
    pub state: ContainerState,
    pub created_at: DateTime<Utc>,
    pub last_used_at: DateTime<Utc>,
}

impl ContainerRecord {
    pub fn new(container_id: String, image: String) -> Self {
        let now = Utc::now();
        Self {
            container_id,
            image,
            state: ContainerState::Starting,
            created_at: now,
            last_used_at: now,
        }
    }

    pub fn touch(&mut self) {
        self.last_used_at = Utc::now();
    }
}

/// Error taxonomy of the execution substrate. Timeouts are not here: a
/// command that exceeds its deadline is a structured `ExecOutput`, not a
/// transport failure.
#[derive(Debug, Error)]
pub enum ExecutorError {
    #[error("Executor image not available: {0}")]
    ImageUnavailable(String),

    #[error("Container unavailable: {0}")]
    ContainerUnavailable(String),

    #[error("Command execution failed: {0}")]
    ExecFailed(String),

    #[error("File not found: {0}")]
    FileNotFound(String),

    #[error("Path violation: {0}")]
    PathViolation(String),

    #[error("Artifact '{name}' is {size} bytes, exceeds limit of {limit} bytes")]
    ArtifactTooLarge { name: String, size: u64, limit: u64 },

    #[error("Docstring extraction failed: {0}")]
    DocstringExtractionFailed(String),

    #[error("Missing x-user-id header on tool invocation")]
    MissingUserContext,

    #[error("Invalid request: {0}")]
    InvalidRequest(String),

    #[error("Internal error: {0}")]
    Internal(String),
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn user_id_rejects_empty() {
        assert!(matches!(
            UserId::new(""),
            Err(ExecutorError::MissingUserContext)
        ));
        assert!(matches!(
            UserId::new("   "),
            Err(ExecutorError::MissingUserContext)
        ));
    }

    #[test]
    fn container_name_sanitizes_user_id() {
        let user = UserId::new("alice@example.com/7").unwrap();
        assert_eq!(user.container_name(), "mcp-executor-alice-example.com-7");
    }

    #[test]
    fn container_name_truncates_long_user_id() {
        let user = UserId::new("u".repeat(200)).unwrap();
        let name = user.container_name();
        assert_eq!(name.len(), CONTAINER_NAME_PREFIX.len() + 63);
    }

    #[test]
    fn record_touch_advances_last_used() {
        let mut record = ContainerRecord::new("abc".into(), "img:latest".into());
        let before = record.last_used_at;
        record.touch();
        assert!(record.last_used_at >= before);
        assert_eq!(record.state, ContainerState::Starting);
    }
}
