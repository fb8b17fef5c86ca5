// Copyright (c) 2026 100monkeys.ai
// SPDX-License-Identifier: AGPL-3.0

use serde::{Deserialize, Serialize};

/// Default deadline for an in-container command.
pub const DEFAULT_EXEC_TIMEOUT_SECS: u64 = 30;

/// Exit code reported when a command is cut off by its deadline. The real
/// exit status is unknowable at that point; `-1` is the documented sentinel
/// and `error_kind` carries the reason.
pub const TIMEOUT_EXIT_CODE: i64 = -1;

/// Why a command result is degraded.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ExecErrorKind {
    Timeout,
}

/// Captured result of one shell command. Streams are collected in full and
/// kept separate; a timed-out command returns whatever was collected before
/// the deadline.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ExecOutput {
    pub exit_code: i64,
    pub stdout: String,
    pub stderr: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub error_kind: Option<ExecErrorKind>,
}

impl ExecOutput {
    pub fn completed(exit_code: i64, stdout: String, stderr: String) -> Self {
        Self {
            exit_code,
            stdout,
            stderr,
            error_kind: None,
        }
    }

    pub fn timed_out(stdout: String, stderr: String, timeout_secs: u64) -> Self {
        let mut stderr = stderr;
        if !stderr.is_empty() && !stderr.ends_with('\n') {
            stderr.push('\n');
        }
        stderr.push_str(&format!("Command timed out after {} seconds", timeout_secs));
        Self {
            exit_code: TIMEOUT_EXIT_CODE,
            stdout,
            stderr,
            error_kind: Some(ExecErrorKind::Timeout),
        }
    }

    pub fn is_success(&self) -> bool {
        self.exit_code == 0 && self.error_kind.is_none()
    }

    pub fn is_timeout(&self) -> bool {
        self.error_kind == Some(ExecErrorKind::Timeout)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn completed_output_is_success_on_zero() {
        let out = ExecOutput::completed(0, "hello\n".into(), String::new());
        assert!(out.is_success());
        assert!(!out.is_timeout());
    }

    #[test]
    fn timed_out_output_carries_sentinel_and_partial_streams() {
        let out = ExecOutput::timed_out("partial".into(), String::new(), 1);
        assert_eq!(out.exit_code, TIMEOUT_EXIT_CODE);
        assert!(out.is_timeout());
        assert_eq!(out.stdout, "partial");
        assert!(out.stderr.contains("timed out after 1 seconds"));
    }

    #[test]
    fn timeout_serializes_error_kind() {
        let out = ExecOutput::timed_out(String::new(), String::new(), 5);
        let json = serde_json::to_value(&out).unwrap();
        assert_eq!(json["error_kind"], "timeout");
        assert_eq!(json["exit_code"], -1);
    }

    #[test]
    fn success_omits_error_kind_field() {
        let out = ExecOutput::completed(0, String::new(), String::new());
        let json = serde_json::to_value(&out).unwrap();
        assert!(json.get("error_kind").is_none());
    }
}
