// Copyright (c) 2026 100monkeys.ai
// SPDX-License-Identifier: AGPL-3.0
//! Artifact name validation.
//!
//! An artifact is a regular file living directly in `/artifacts` inside a
//! user's container; the name is the only addressing handle, so it must
//! never be able to escape that directory. This is a domain rule, not an
//! infrastructure concern: every retrieval path goes through it.

use crate::domain::container::ExecutorError;

/// Validate an artifact file name: no path separators, no leading dot,
/// non-empty. Returns the name unchanged so call sites can chain.
pub fn validate_artifact_name(name: &str) -> Result<&str, ExecutorError> {
    if name.is_empty() {
        return Err(ExecutorError::PathViolation(
            "artifact name must not be empty".to_string(),
        ));
    }
    if name.contains('/') || name.contains('\\') {
        return Err(ExecutorError::PathViolation(format!(
            "invalid artifact name '{}': must be a filename, not a path",
            name
        )));
    }
    if name.starts_with('.') {
        return Err(ExecutorError::PathViolation(format!(
            "invalid artifact name '{}': cannot start with '.'",
            name
        )));
    }
    Ok(name)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn accepts_plain_file_names() {
        assert!(validate_artifact_name("chart.png").is_ok());
        assert!(validate_artifact_name("report-v2.final.pdf").is_ok());
        assert!(validate_artifact_name("data").is_ok());
    }

    #[test]
    fn rejects_path_separators() {
        for name in ["../etc/passwd", "a/b.txt", "a\\b.txt", "/absolute"] {
            let err = validate_artifact_name(name).unwrap_err();
            assert!(matches!(err, ExecutorError::PathViolation(_)), "{}", name);
        }
    }

    #[test]
    fn rejects_hidden_and_dot_names() {
        for name in [".hidden", ".", ".."] {
            let err = validate_artifact_name(name).unwrap_err();
            assert!(matches!(err, ExecutorError::PathViolation(_)), "{}", name);
        }
    }

    #[test]
    fn rejects_empty_name() {
        assert!(validate_artifact_name("").is_err());
    }
}
