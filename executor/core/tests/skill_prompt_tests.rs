// Copyright (c) 2026 100monkeys.ai
// SPDX-License-Identifier: AGPL-3.0

//! Skill registry integration tests over a real directory tree.

use crucible_core::application::skill_registry::SkillRegistry;
use std::fs;
use std::path::Path;
use tempfile::TempDir;

fn write_skill(root: &Path, id: &str, name: &str, description: &str) {
    let dir = root.join(id);
    fs::create_dir_all(&dir).unwrap();
    fs::write(
        dir.join("Skill.md"),
        format!(
            "---\n\
             name: {name}\n\
             description: {description}\n\
             version: 1.0.0\n\
             dependencies: none\n\
             ---\n\
             # {name}\n\
             \n\
             ## When to Use This Skill\n\
             \n\
             - Working with {id}\n"
        ),
    )
    .unwrap();
}

#[tokio::test]
async fn discovers_first_level_skill_directories() {
    let root = TempDir::new().unwrap();
    write_skill(root.path(), "alpha", "Alpha", "First skill");
    write_skill(root.path(), "beta", "Beta", "Second skill");
    // A stray file at the root is not a skill.
    fs::write(root.path().join("README.md"), "not a skill").unwrap();
    // A directory without Skill.md is skipped.
    fs::create_dir_all(root.path().join("empty-dir")).unwrap();

    let registry = SkillRegistry::new(root.path());
    let skills = registry.skills().await;

    let ids: Vec<&str> = skills.iter().map(|s| s.id.as_str()).collect();
    assert_eq!(ids, vec!["alpha", "beta"]);
}

#[tokio::test]
async fn malformed_skills_are_skipped_not_fatal() {
    let root = TempDir::new().unwrap();
    write_skill(root.path(), "good", "Good", "Valid skill");
    let bad = root.path().join("bad");
    fs::create_dir_all(&bad).unwrap();
    fs::write(bad.join("Skill.md"), "no front matter here\n").unwrap();

    let registry = SkillRegistry::new(root.path());
    let skills = registry.skills().await;
    assert_eq!(skills.len(), 1);
    assert_eq!(skills[0].id, "good");
}

#[tokio::test]
async fn get_returns_full_skill_with_body() {
    let root = TempDir::new().unwrap();
    write_skill(root.path(), "alpha", "Alpha", "First skill");

    let registry = SkillRegistry::new(root.path());
    let skill = registry.get("alpha").await.unwrap();
    assert_eq!(skill.name, "Alpha");
    assert!(skill.body.contains("# Alpha"));
    assert!(registry.get("missing").await.is_none());
}

#[tokio::test]
async fn prompt_is_stable_and_lists_every_skill() {
    let root = TempDir::new().unwrap();
    write_skill(root.path(), "alpha", "Alpha", "First skill");
    write_skill(root.path(), "beta", "Beta", "Second skill");

    let registry = SkillRegistry::new(root.path());
    let first = registry.render_prompt().await;
    let second = registry.render_prompt().await;
    assert_eq!(first, second);

    for marker in [
        "### **alpha**",
        "### **beta**",
        "`/skills/alpha/Skill.md`",
        "Working with beta",
    ] {
        assert!(first.contains(marker), "prompt missing {marker}");
    }
}

#[tokio::test]
async fn reload_picks_up_new_skills_atomically() {
    let root = TempDir::new().unwrap();
    write_skill(root.path(), "alpha", "Alpha", "First skill");

    let registry = SkillRegistry::new(root.path());
    assert_eq!(registry.skills().await.len(), 1);

    // The set is pinned until an explicit reload.
    write_skill(root.path(), "beta", "Beta", "Second skill");
    assert_eq!(registry.skills().await.len(), 1);

    let reloaded = registry.reload().await;
    assert_eq!(reloaded.len(), 2);
    assert_eq!(registry.skills().await.len(), 2);
}

#[tokio::test]
async fn missing_root_yields_empty_set() {
    let registry = SkillRegistry::new("/nonexistent/skills/root");
    assert!(registry.skills().await.is_empty());
    let prompt = registry.render_prompt().await;
    assert!(prompt.contains("No skills currently available."));
}
