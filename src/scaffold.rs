//! YAML scaffolding for the next milestone, sprint or bugfix.
//!
//! Inspects existing stage files to pick the next version, writes a skeleton
//! configuration under `prompts/<project>/`, and hands it to `$EDITOR` when
//! one is configured.

use crate::config::Mode;
use crate::error::{Result, VibeError};
use crate::stage;
use crate::workspace;
use std::env;
use std::fs;
use std::path::PathBuf;
use std::process::Command;

/// Scaffold `prompts/<project>/<next-version>.yaml` for `mode`.
pub fn scaffold_config(project: Option<&str>, mode: Mode) -> Result<PathBuf> {
    let project = match project {
        Some(name) => name.to_string(),
        None => workspace::detect_project_name(None)?,
    };
    let version = stage::determine_next_version(&project, mode)?;

    let dir = workspace::repo_root()?.join("prompts").join(&project);
    fs::create_dir_all(&dir)?;
    let path = dir.join(format!("{version}.yaml"));
    if path.exists() {
        return Err(VibeError::Config {
            path,
            message: "scaffold target already exists".to_string(),
        });
    }

    fs::write(&path, skeleton(&project, mode))?;
    tracing::info!(config = %path.display(), "scaffolded configuration");
    open_in_editor(&path);
    Ok(path)
}

fn skeleton(project: &str, mode: Mode) -> String {
    format!(
        "# {mode} configuration for {project}\n\
         # Fill in user_instructions, then run: pv run --config {project}/<this file>\n\
         project_name: {project}\n\
         mode: {mode}\n\
         # model: openai/o3\n\
         user_instructions: |\n\
         \x20 TODO describe the work for this {mode}\n\
         project_context_paths:\n\
         \x20 - \"src/*\"\n\
         \x20 # - \"X src/generated/*\"\n"
    )
}

/// Best effort: a missing or failing editor never fails the scaffold.
fn open_in_editor(path: &std::path::Path) {
    let Some(editor) = env::var("EDITOR")
        .or_else(|_| env::var("VISUAL"))
        .ok()
        .filter(|value| !value.trim().is_empty())
    else {
        return;
    };
    let Ok(binary) = which::which(&editor) else {
        tracing::warn!(%editor, "configured editor not found");
        return;
    };
    if let Err(err) = Command::new(binary).arg(path).status() {
        tracing::warn!(%editor, %err, "failed to launch editor");
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::str::FromStr;

    #[test]
    fn skeleton_is_loadable_yaml_with_the_requested_mode() {
        let text = skeleton("demo", Mode::Sprint);
        let value: serde_yaml::Value = serde_yaml::from_str(&text).unwrap();
        assert_eq!(value["project_name"], "demo");
        assert_eq!(value["mode"], "sprint");
        assert!(Mode::from_str(value["mode"].as_str().unwrap()).is_ok());
    }
}
