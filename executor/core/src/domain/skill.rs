// Copyright (c) 2026 100monkeys.ai
// SPDX-License-Identifier: AGPL-3.0
//! Skill documents.
//!
//! A skill is a `Skill.md` file in a first-level directory under the skills
//! root: a front-matter block of `key: value` lines between `---`
//! delimiters, followed by a Markdown body. The directory name is the
//! stable skill id; the body is loaded by the agent on demand through
//! `read_file` against the container path `/skills/<id>/Skill.md`.

use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;
use thiserror::Error;

pub const MAX_NAME_LEN: usize = 64;
pub const MAX_DESCRIPTION_LEN: usize = 200;

#[derive(Debug, Error)]
pub enum SkillError {
    #[error("Skill '{0}' has no front-matter block")]
    MissingFrontMatter(String),

    #[error("Skill '{0}' is missing required key '{1}'")]
    MissingKey(String, &'static str),

    #[error("Skill '{id}' field '{field}' exceeds {limit} characters")]
    FieldTooLong {
        id: String,
        field: &'static str,
        limit: usize,
    },
}

/// A parsed skill. `extra` preserves unknown front-matter keys; they are
/// carried but never interpreted.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Skill {
    pub id: String,
    pub name: String,
    pub description: String,
    pub version: String,
    pub dependencies: String,
    #[serde(default, skip_serializing_if = "BTreeMap::is_empty")]
    pub extra: BTreeMap<String, String>,
    pub body: String,
}

impl Skill {
    /// Parse the full contents of a `Skill.md` file.
    pub fn parse(id: &str, content: &str) -> Result<Self, SkillError> {
        let (mut meta, body) = split_front_matter(content)
            .ok_or_else(|| SkillError::MissingFrontMatter(id.to_string()))?;

        let name = meta
            .remove("name")
            .ok_or(SkillError::MissingKey(id.to_string(), "name"))?;
        let description = meta
            .remove("description")
            .ok_or(SkillError::MissingKey(id.to_string(), "description"))?;

        if name.chars().count() > MAX_NAME_LEN {
            return Err(SkillError::FieldTooLong {
                id: id.to_string(),
                field: "name",
                limit: MAX_NAME_LEN,
            });
        }
        if description.chars().count() > MAX_DESCRIPTION_LEN {
            return Err(SkillError::FieldTooLong {
                id: id.to_string(),
                field: "description",
                limit: MAX_DESCRIPTION_LEN,
            });
        }

        let version = meta.remove("version").unwrap_or_else(|| "1.0.0".to_string());
        let dependencies = meta.remove("dependencies").unwrap_or_default();

        Ok(Self {
            id: id.to_string(),
            name,
            description,
            version,
            dependencies,
            extra: meta,
            body: body.trim().to_string(),
        })
    }

    /// Container path of this skill's document.
    pub fn container_path(&self) -> String {
        format!("/skills/{}/Skill.md", self.id)
    }

    /// Bullet items under the `## When to Use This Skill` heading, used as
    /// trigger hints in the rendered agent prompt. Empty when the section
    /// is absent.
    pub fn use_cases(&self) -> Vec<String> {
        extract_use_cases(&self.body)
    }
}

/// Split `content` into (front-matter map, body). The file must begin with
/// a `---` line; the next `---` line closes the block. Keys are single
/// `key: value` lines; malformed lines are skipped.
fn split_front_matter(content: &str) -> Option<(BTreeMap<String, String>, String)> {
    let rest = content.strip_prefix("---")?;
    let rest = rest.strip_prefix("\r\n").or_else(|| rest.strip_prefix('\n'))?;

    let mut meta = BTreeMap::new();
    let mut consumed = 0usize;
    let mut closed = false;

    for line in rest.split_inclusive('\n') {
        consumed += line.len();
        let line = line.trim_end();
        if line == "---" {
            closed = true;
            break;
        }
        if let Some((key, value)) = line.split_once(':') {
            let key = key.trim();
            if !key.is_empty() {
                meta.insert(key.to_string(), value.trim().to_string());
            }
        }
    }

    if !closed {
        return None;
    }
    Some((meta, rest[consumed..].to_string()))
}

fn extract_use_cases(body: &str) -> Vec<String> {
    let mut in_section = false;
    let mut cases = Vec::new();

    for line in body.lines() {
        let trimmed = line.trim();
        if let Some(heading) = trimmed.strip_prefix("## ") {
            if in_section {
                break;
            }
            in_section = heading.trim().eq_ignore_ascii_case("When to Use This Skill");
            continue;
        }
        if !in_section {
            continue;
        }
        if let Some(item) = trimmed
            .strip_prefix("- ")
            .or_else(|| trimmed.strip_prefix("* "))
        {
            if !item.trim().is_empty() {
                cases.push(item.trim().to_string());
            }
        }
    }

    cases
}

#[cfg(test)]
mod tests {
    use super::*;

    const SAMPLE: &str = "---\n\
name: Symbolic Computation\n\
description: Symbolic math with sympy\n\
version: 2.1.0\n\
dependencies: sympy\n\
author: somebody\n\
---\n\
# Symbolic Computation\n\
\n\
## When to Use This Skill\n\
\n\
Invoke this skill when the user requests:\n\
- Solving equations symbolically\n\
- Computing derivatives or integrals\n\
\n\
## Core Capabilities\n\
\n\
- Not a use case\n";

    #[test]
    fn parses_front_matter_and_body() {
        let skill = Skill::parse("symbolic-computation", SAMPLE).unwrap();
        assert_eq!(skill.name, "Symbolic Computation");
        assert_eq!(skill.description, "Symbolic math with sympy");
        assert_eq!(skill.version, "2.1.0");
        assert_eq!(skill.dependencies, "sympy");
        assert_eq!(skill.extra.get("author").unwrap(), "somebody");
        assert!(skill.body.starts_with("# Symbolic Computation"));
        assert_eq!(
            skill.container_path(),
            "/skills/symbolic-computation/Skill.md"
        );
    }

    #[test]
    fn use_cases_stop_at_next_heading() {
        let skill = Skill::parse("symbolic-computation", SAMPLE).unwrap();
        assert_eq!(
            skill.use_cases(),
            vec![
                "Solving equations symbolically".to_string(),
                "Computing derivatives or integrals".to_string(),
            ]
        );
    }

    #[test]
    fn defaults_version_when_absent() {
        let content = "---\nname: A\ndescription: B\n---\nbody\n";
        let skill = Skill::parse("a", content).unwrap();
        assert_eq!(skill.version, "1.0.0");
        assert_eq!(skill.dependencies, "");
    }

    #[test]
    fn rejects_missing_front_matter() {
        assert!(matches!(
            Skill::parse("x", "# Just markdown\n"),
            Err(SkillError::MissingFrontMatter(_))
        ));
        // Unterminated block is treated the same way.
        assert!(matches!(
            Skill::parse("x", "---\nname: A\n"),
            Err(SkillError::MissingFrontMatter(_))
        ));
    }

    #[test]
    fn rejects_missing_required_keys() {
        let content = "---\nname: OnlyName\n---\nbody\n";
        assert!(matches!(
            Skill::parse("x", content),
            Err(SkillError::MissingKey(_, "description"))
        ));
    }

    #[test]
    fn rejects_over_long_fields() {
        let content = format!("---\nname: {}\ndescription: ok\n---\n", "n".repeat(65));
        assert!(matches!(
            Skill::parse("x", &content),
            Err(SkillError::FieldTooLong { field: "name", .. })
        ));
    }
}
