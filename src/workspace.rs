//! Workspace and project resolution.
//!
//! A workspace roots `data/<project>/prompt_{inputs,outputs}` and `logs/`.
//! The repo root is the nearest ancestor carrying a `prompts/` directory;
//! stage files and scaffolded YAMLs live under it.

use crate::error::{Result, VibeError};
use std::env;
use std::fs;
use std::path::{Path, PathBuf};

/// Environment override for the workspace root.
pub const DATA_DIR_ENV: &str = "PERSONALVIBE_DATA_DIR";

/// Nearest ancestor of `start` containing a `prompts/` directory.
fn checkout_root(start: &Path) -> Option<PathBuf> {
    start
        .ancestors()
        .find(|ancestor| ancestor.join("prompts").is_dir())
        .map(Path::to_path_buf)
}

/// Source-checkout root for the current directory, falling back to cwd.
pub fn repo_root() -> Result<PathBuf> {
    let cwd = env::current_dir()?;
    Ok(checkout_root(&cwd).unwrap_or(cwd))
}

/// Directory rooting `data/` and `logs/`.
///
/// Resolution order: the `PERSONALVIBE_DATA_DIR` override, then the source
/// checkout containing cwd, then cwd itself.
pub fn workspace_root() -> Result<PathBuf> {
    if let Ok(value) = env::var(DATA_DIR_ENV) {
        let trimmed = value.trim();
        if !trimmed.is_empty() {
            let root = PathBuf::from(trimmed);
            fs::create_dir_all(&root)?;
            return Ok(root);
        }
    }
    repo_root()
}

fn ensure_dir(path: PathBuf) -> Result<PathBuf> {
    fs::create_dir_all(&path)?;
    Ok(path)
}

pub fn data_dir(project: &str) -> Result<PathBuf> {
    ensure_dir(workspace_root()?.join("data").join(project))
}

pub fn prompt_inputs_dir(project: &str) -> Result<PathBuf> {
    ensure_dir(data_dir(project)?.join("prompt_inputs"))
}

pub fn prompt_outputs_dir(project: &str) -> Result<PathBuf> {
    ensure_dir(data_dir(project)?.join("prompt_outputs"))
}

pub fn logs_dir() -> Result<PathBuf> {
    ensure_dir(workspace_root()?.join("logs"))
}

/// Infer the project name from the current directory.
///
/// If the path passes through `.../prompts/<name>/...`, that name wins.
/// Otherwise walk ancestors for a `prompts/` directory holding exactly one
/// sub-directory. Ambiguity and absence are user-addressable errors.
pub fn detect_project_name(cwd: Option<&Path>) -> Result<String> {
    let cwd = match cwd {
        Some(path) => path.to_path_buf(),
        None => env::current_dir()?,
    };

    if let Some(name) = project_from_path(&cwd) {
        return Ok(name);
    }

    for ancestor in cwd.ancestors() {
        let prompts = ancestor.join("prompts");
        if !prompts.is_dir() {
            continue;
        }
        let mut subdirs = Vec::new();
        for entry in fs::read_dir(&prompts)? {
            let entry = entry?;
            if entry.file_type()?.is_dir() {
                subdirs.push(entry.file_name().to_string_lossy().into_owned());
            }
        }
        match subdirs.len() {
            0 => {
                return Err(VibeError::Discovery(format!(
                    "{} has no project sub-directories; create prompts/<project>/ first",
                    prompts.display()
                )))
            }
            1 => return Ok(subdirs.remove(0)),
            _ => {
                subdirs.sort();
                return Err(VibeError::Discovery(format!(
                    "multiple projects under {} ({}); pass --project_name",
                    prompts.display(),
                    subdirs.join(", ")
                )));
            }
        }
    }

    Err(VibeError::Discovery(format!(
        "no prompts/ directory found above {}; pass --project_name",
        cwd.display()
    )))
}

/// Project name when `path` contains a `prompts/<name>` segment.
fn project_from_path(path: &Path) -> Option<String> {
    let mut components = path.components().peekable();
    while let Some(component) = components.next() {
        if component.as_os_str() == "prompts" {
            if let Some(next) = components.peek() {
                return Some(next.as_os_str().to_string_lossy().into_owned());
            }
        }
    }
    None
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn project_from_path_picks_prompts_child() {
        let path = Path::new("/repo/prompts/storymaker/stages");
        assert_eq!(project_from_path(path), Some("storymaker".to_string()));
    }

    #[test]
    fn project_from_path_none_without_prompts_segment() {
        assert_eq!(project_from_path(Path::new("/repo/src/lib")), None);
    }

    #[test]
    fn project_from_path_none_when_prompts_is_leaf() {
        assert_eq!(project_from_path(Path::new("/repo/prompts")), None);
    }
}
