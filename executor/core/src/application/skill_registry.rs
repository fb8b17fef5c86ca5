// Copyright (c) 2026 100monkeys.ai
// SPDX-License-Identifier: AGPL-3.0
//! Skill discovery and agent prompt rendering.
//!
//! Skills are enumerated lazily on first query and kept in memory until an
//! explicit reload, which swaps the whole set atomically. Prompt rendering
//! is a pure function of the sorted skill set: same skills in, same bytes
//! out.

use crate::domain::skill::Skill;
use std::path::PathBuf;
use std::sync::Arc;
use tokio::sync::RwLock;
use tracing::{error, info, warn};

pub struct SkillRegistry {
    root: PathBuf,
    skills: RwLock<Option<Arc<Vec<Skill>>>>,
}

impl SkillRegistry {
    pub fn new(root: impl Into<PathBuf>) -> Self {
        Self {
            root: root.into(),
            skills: RwLock::new(None),
        }
    }

    /// Current skill set, loading it on first call.
    pub async fn skills(&self) -> Arc<Vec<Skill>> {
        {
            let loaded = self.skills.read().await;
            if let Some(skills) = loaded.as_ref() {
                return skills.clone();
            }
        }

        let mut slot = self.skills.write().await;
        // Another task may have loaded while we waited for the write lock.
        if let Some(skills) = slot.as_ref() {
            return skills.clone();
        }
        let skills = Arc::new(self.scan());
        *slot = Some(skills.clone());
        skills
    }

    /// Re-enumerate the skills root and swap the set atomically.
    pub async fn reload(&self) -> Arc<Vec<Skill>> {
        let skills = Arc::new(self.scan());
        let mut slot = self.skills.write().await;
        *slot = Some(skills.clone());
        skills
    }

    pub async fn get(&self, id: &str) -> Option<Skill> {
        self.skills()
            .await
            .iter()
            .find(|skill| skill.id == id)
            .cloned()
    }

    /// Rendered agent system prompt over the current skill set.
    pub async fn render_prompt(&self) -> String {
        render_prompt(&self.skills().await)
    }

    fn scan(&self) -> Vec<Skill> {
        let entries = match std::fs::read_dir(&self.root) {
            Ok(entries) => entries,
            Err(e) => {
                warn!(root = %self.root.display(), error = %e, "Skills root not readable");
                return Vec::new();
            }
        };

        let mut skills = Vec::new();
        for entry in entries.flatten() {
            let path = entry.path();
            if !path.is_dir() {
                continue;
            }
            let Some(id) = path.file_name().and_then(|n| n.to_str()).map(String::from) else {
                continue;
            };
            let skill_file = path.join("Skill.md");
            let content = match std::fs::read_to_string(&skill_file) {
                Ok(content) => content,
                Err(_) => continue,
            };
            match Skill::parse(&id, &content) {
                Ok(skill) => skills.push(skill),
                Err(e) => error!(skill = %id, error = %e, "Skipping malformed skill"),
            }
        }

        skills.sort_by(|a, b| a.id.cmp(&b.id));
        info!(count = skills.len(), root = %self.root.display(), "Loaded skills");
        skills
    }
}

/// Render the full agent system prompt. Pure and deterministic.
pub fn render_prompt(skills: &[Skill]) -> String {
    format!(
        "# Agentic Code Execution with Domain Skills\n\
         \n\
         You are an AI agent with access to a Docker-based code execution \
         environment and specialized domain skills. Your container has a \
         writable workspace at `/workspace`, an artifact directory at \
         `/artifacts`, and read-only skill documents under `/skills/`.\n\
         \n\
         ## Available Skills\n\
         \n\
         {skills_section}\n\
         \n\
         ## Using Skills\n\
         \n\
         Before writing code, check whether the request matches a skill \
         description above. If it does, read the full skill document with \
         the read_file tool against its container path, study its examples, \
         and apply its patterns. Skill bodies live in your container; never \
         fetch them over the network. For tasks that match no skill, \
         proceed with standard practice.\n\
         \n\
         ## MCP Tools Available\n\
         \n\
         - **execute_bash(command, timeout)** - Execute bash commands in \
         your container\n\
         - **write_file(file_path, content)** - Create or overwrite files\n\
         - **read_file(file_path, offset, line_count)** - Read files with \
         pagination (including skills)\n\
         - **read_docstring(file_path, function_name)** - Inspect function \
         documentation\n\
         \n\
         ## Artifact Guidelines\n\
         \n\
         When the user asks for generated files (scripts, images, reports), \
         save them directly in `/artifacts/` - never nested in \
         subdirectories - and keep each file below the size limit. \
         Everything else belongs in `/workspace/`.\n",
        skills_section = render_skills_section(skills)
    )
}

fn render_skills_section(skills: &[Skill]) -> String {
    if skills.is_empty() {
        return "No skills currently available.\n".to_string();
    }

    let mut sections = Vec::new();
    for skill in skills {
        let use_cases = skill.use_cases();
        let use_cases_block = if use_cases.is_empty() {
            String::new()
        } else {
            let bullets: String = use_cases
                .iter()
                .map(|case| format!("- {}\n", case))
                .collect();
            format!("\n**Use this skill when the user requests:**\n{}", bullets)
        };

        sections.push(format!(
            "---\n\
             \n\
             ### **{id}**\n\
             **Name:** {name}\n\
             **Version:** {version}\n\
             **Description:** {description}\n\
             **Dependencies:** `{dependencies}`\n\
             {use_cases}\
             **Skill location:** `{location}`\n",
            id = skill.id,
            name = skill.name,
            version = skill.version,
            description = skill.description,
            dependencies = if skill.dependencies.is_empty() {
                "None"
            } else {
                &skill.dependencies
            },
            use_cases = use_cases_block,
            location = skill.container_path(),
        ));
    }

    sections.join("\n")
}

#[cfg(test)]
mod tests {
    use super::*;

    fn sample_skill(id: &str) -> Skill {
        Skill::parse(
            id,
            "---\n\
             name: Sample\n\
             description: A sample skill\n\
             version: 1.2.0\n\
             dependencies: numpy\n\
             ---\n\
             ## When to Use This Skill\n\
             \n\
             - Doing sample things\n",
        )
        .unwrap()
    }

    #[test]
    fn prompt_is_deterministic() {
        let skills = vec![sample_skill("alpha"), sample_skill("beta")];
        assert_eq!(render_prompt(&skills), render_prompt(&skills));
    }

    #[test]
    fn prompt_contains_every_skill_entry() {
        let skills = vec![sample_skill("alpha"), sample_skill("beta")];
        let prompt = render_prompt(&skills);
        assert!(prompt.contains("### **alpha**"));
        assert!(prompt.contains("### **beta**"));
        assert!(prompt.contains("`/skills/alpha/Skill.md`"));
        assert!(prompt.contains("Doing sample things"));
    }

    #[test]
    fn prompt_mentions_all_four_tools() {
        let prompt = render_prompt(&[]);
        for tool in ["execute_bash", "write_file", "read_file", "read_docstring"] {
            assert!(prompt.contains(tool), "missing {}", tool);
        }
        assert!(prompt.contains("No skills currently available."));
    }

    #[test]
    fn empty_dependencies_render_as_none() {
        let skill = Skill::parse("bare", "---\nname: Bare\ndescription: D\n---\n").unwrap();
        let section = render_skills_section(&[skill]);
        assert!(section.contains("**Dependencies:** `None`"));
    }
}
