//! Prompt templates and project-context assembly.
//!
//! Templates are bundled at compile time; a directory named by
//! `PERSONALVIBE_TEMPLATE_DIR`, or a `templates/` directory under cwd,
//! overrides them file-by-file so deployments can patch wording without
//! rebuilding.

use crate::config::{ConfigRecord, Mode};
use crate::error::{Result, VibeError};
use minijinja::{context, Environment};
use std::env;
use std::fs;
use std::path::Path;
use walkdir::WalkDir;
use wildmatch::WildMatch;

pub const MASTER_MD: &str = include_str!("../templates/master.md");
pub const PRD_MD: &str = include_str!("../templates/prd.md");
pub const MILESTONE_MD: &str = include_str!("../templates/milestone.md");
pub const SPRINT_MD: &str = include_str!("../templates/sprint.md");
pub const VALIDATE_MD: &str = include_str!("../templates/validate.md");
pub const BUGFIX_MD: &str = include_str!("../templates/bugfix.md");

/// Override directory for template files.
pub const TEMPLATE_DIR_ENV: &str = "PERSONALVIBE_TEMPLATE_DIR";

fn bundled(name: &str) -> Option<&'static str> {
    match name {
        "master.md" => Some(MASTER_MD),
        "prd.md" => Some(PRD_MD),
        "milestone.md" => Some(MILESTONE_MD),
        "sprint.md" => Some(SPRINT_MD),
        "validate.md" => Some(VALIDATE_MD),
        "bugfix.md" => Some(BUGFIX_MD),
        _ => None,
    }
}

/// Template text by filename, preferring the filesystem overrides: the
/// `PERSONALVIBE_TEMPLATE_DIR` directory first, then `templates/` under cwd,
/// then the bundled copy.
pub fn load_template(name: &str) -> Result<String> {
    if let Ok(dir) = env::var(TEMPLATE_DIR_ENV) {
        let candidate = Path::new(&dir).join(name);
        if candidate.is_file() {
            return Ok(fs::read_to_string(&candidate)?);
        }
    }
    let local = Path::new("templates").join(name);
    if local.is_file() {
        return Ok(fs::read_to_string(&local)?);
    }
    bundled(name)
        .map(str::to_string)
        .ok_or_else(|| VibeError::Internal(format!("no bundled template named {name}")))
}

fn task_template(mode: Mode) -> Result<String> {
    load_template(&format!("{mode}.md"))
}

/// Render the master template for one configuration.
///
/// Deterministic for a given configuration and filesystem snapshot: the only
/// inputs are the record fields and the already-assembled context string.
pub fn render_prompt(config: &ConfigRecord, project_context: &str) -> Result<String> {
    let master = load_template("master.md")?;
    let task_instructions = task_template(config.mode)?;

    let mut env = Environment::new();
    env.add_template("master", &master)
        .map_err(|err| VibeError::Internal(format!("parse master template: {err}")))?;
    let template = env
        .get_template("master")
        .map_err(|err| VibeError::Internal(format!("load master template: {err}")))?;

    template
        .render(context! {
            project_name => &config.project_name,
            user_instructions => &config.user_instructions,
            task_instructions => task_instructions.trim_end(),
            project_context => project_context,
        })
        .map_err(|err| VibeError::Internal(format!("render master template: {err}")))
}

/// Assemble the `project_context` block from ordered path-specs.
///
/// A spec line is a repo-relative glob; a line prefixed `X ` excludes
/// matches. Files are deduplicated in first-seen order and emitted under a
/// `## <path>` banner each.
pub fn gather_project_context(specs: &[String], base: &Path) -> Result<String> {
    let mut includes: Vec<&str> = Vec::new();
    let mut excludes: Vec<WildMatch> = Vec::new();
    for spec in specs {
        let spec = spec.trim();
        if spec.is_empty() {
            continue;
        }
        match spec.strip_prefix("X ") {
            Some(pattern) => excludes.push(WildMatch::new(pattern.trim())),
            None => includes.push(spec),
        }
    }
    if includes.is_empty() {
        return Ok(String::new());
    }

    // One sorted walk; per-include matching preserves the spec ordering.
    let mut files: Vec<String> = Vec::new();
    for entry in WalkDir::new(base).sort_by_file_name() {
        let entry =
            entry.map_err(|err| VibeError::Internal(format!("walk {}: {err}", base.display())))?;
        if !entry.file_type().is_file() {
            continue;
        }
        if let Ok(rel) = entry.path().strip_prefix(base) {
            files.push(rel.to_string_lossy().replace('\\', "/"));
        }
    }

    let mut selected: Vec<String> = Vec::new();
    for include in includes {
        let matcher = WildMatch::new(include);
        for rel in &files {
            if !matcher.matches(rel) {
                continue;
            }
            if excludes.iter().any(|ex| ex.matches(rel)) {
                continue;
            }
            if !selected.contains(rel) {
                selected.push(rel.clone());
            }
        }
    }

    let mut out = String::new();
    for rel in &selected {
        let bytes = fs::read(base.join(rel))?;
        let text = String::from_utf8_lossy(&bytes);
        out.push_str("## ");
        out.push_str(rel);
        out.push('\n');
        out.push_str(&text);
        if !text.ends_with('\n') {
            out.push('\n');
        }
        out.push('\n');
    }
    tracing::debug!(files = selected.len(), bytes = out.len(), "assembled project context");
    Ok(out)
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::fs;

    fn write(base: &Path, rel: &str, content: &str) {
        let path = base.join(rel);
        fs::create_dir_all(path.parent().unwrap()).unwrap();
        fs::write(path, content).unwrap();
    }

    #[test]
    fn gather_includes_and_excludes() {
        let dir = tempfile::tempdir().unwrap();
        write(dir.path(), "src/a.rs", "fn a() {}\n");
        write(dir.path(), "src/b.rs", "fn b() {}\n");
        write(dir.path(), "README.md", "hi\n");

        let specs = vec!["src/*.rs".to_string(), "X src/b.rs".to_string()];
        let out = gather_project_context(&specs, dir.path()).unwrap();
        assert!(out.contains("## src/a.rs"));
        assert!(out.contains("fn a() {}"));
        assert!(!out.contains("b.rs"));
        assert!(!out.contains("README"));
    }

    #[test]
    fn gather_deduplicates_overlapping_specs() {
        let dir = tempfile::tempdir().unwrap();
        write(dir.path(), "src/a.rs", "fn a() {}\n");

        let specs = vec!["src/*.rs".to_string(), "src/a.rs".to_string()];
        let out = gather_project_context(&specs, dir.path()).unwrap();
        assert_eq!(out.matches("## src/a.rs").count(), 1);
    }

    #[test]
    fn gather_empty_specs_yield_empty_context() {
        let dir = tempfile::tempdir().unwrap();
        let out = gather_project_context(&[], dir.path()).unwrap();
        assert!(out.is_empty());
    }

    #[test]
    fn master_template_declares_all_placeholders() {
        for placeholder in [
            "{{ project_name }}",
            "{{ user_instructions }}",
            "{{ task_instructions }}",
            "{{ project_context }}",
        ] {
            assert!(MASTER_MD.contains(placeholder), "missing {placeholder}");
        }
    }
}
