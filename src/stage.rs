//! Stage extraction and sprint-counter bumping.
//!
//! A stage file is `prompts/<project>/stages/<M>.<m>.<p>.{py,md}` holding
//! the last fenced code block of the most recent model output. Sprints bump
//! the minor component, bugfixes the patch, milestones the major. Existing
//! stage files are never overwritten.
//!
//! The core functions operate on concrete directories; the project-keyed
//! wrappers resolve those through the workspace.

use crate::config::Mode;
use crate::error::{Result, VibeError};
use crate::workspace;
use regex::Regex;
use std::fs::{self, OpenOptions};
use std::io::{ErrorKind, Write};
use std::path::{Path, PathBuf};
use std::sync::OnceLock;

fn stage_file_re() -> &'static Regex {
    static RE: OnceLock<Regex> = OnceLock::new();
    RE.get_or_init(|| Regex::new(r"^(\d+)\.(\d+)\.(\d+)\.(py|md)$").expect("static regex"))
}

fn fence_re() -> &'static Regex {
    static RE: OnceLock<Regex> = OnceLock::new();
    RE.get_or_init(|| {
        Regex::new(r"(?ms)^```([A-Za-z0-9_+-]*)[ \t]*\r?\n(.*?)^```[ \t]*$").expect("static regex")
    })
}

pub fn stages_dir(project: &str) -> Result<PathBuf> {
    Ok(workspace::repo_root()?
        .join("prompts")
        .join(project)
        .join("stages"))
}

/// Most recent artefact under `data/<project>/prompt_outputs/`.
pub fn find_latest_output(project: &str) -> Result<PathBuf> {
    latest_output_in(&workspace::prompt_outputs_dir(project)?)
}

/// Most recent artefact in `dir`. Timestamps are fixed-width filename
/// prefixes, so the lexicographic maximum is the latest output.
pub fn latest_output_in(dir: &Path) -> Result<PathBuf> {
    let mut latest: Option<PathBuf> = None;
    for entry in fs::read_dir(dir)? {
        let entry = entry?;
        if !entry.file_type()?.is_file() {
            continue;
        }
        let path = entry.path();
        if latest
            .as_ref()
            .is_none_or(|current| path.file_name() > current.file_name())
        {
            latest = Some(path);
        }
    }
    latest.ok_or_else(|| {
        VibeError::Extraction(format!(
            "no model outputs under {}; run the pipeline first",
            dir.display()
        ))
    })
}

/// Parsed `<M>.<m>.<p>` stage filename versions, with their filenames.
fn existing_versions(dir: &Path) -> Result<Vec<((u32, u32, u32), String)>> {
    let mut versions = Vec::new();
    if !dir.exists() {
        return Ok(versions);
    }
    for entry in fs::read_dir(dir)? {
        let entry = entry?;
        let name = entry.file_name().to_string_lossy().into_owned();
        if let Some(caps) = stage_file_re().captures(&name) {
            let parse = |i: usize| caps[i].parse::<u32>().map_err(|_| ());
            if let (Ok(major), Ok(minor), Ok(patch)) = (parse(1), parse(2), parse(3)) {
                versions.push(((major, minor, patch), name));
            }
        }
    }
    Ok(versions)
}

/// Next stage version for `mode`, scanning `prompts/<project>/stages/`.
pub fn determine_next_version(project: &str, mode: Mode) -> Result<String> {
    next_version_in(&stages_dir(project)?, mode)
}

/// Next stage version from the filenames in `dir`.
///
/// An empty (or missing) directory yields `1.1.0`. Ties on the version
/// tuple break lexicographically by filename.
pub fn next_version_in(dir: &Path, mode: Mode) -> Result<String> {
    let mut versions = existing_versions(dir)?;
    if versions.is_empty() {
        return Ok("1.1.0".to_string());
    }
    versions.sort();
    let ((major, minor, patch), _) = versions
        .last()
        .cloned()
        .ok_or_else(|| VibeError::Internal("non-empty version list had no maximum".to_string()))?;

    let (major, minor, patch) = match mode {
        Mode::Sprint => (major, minor + 1, 0),
        Mode::Bugfix => (major, minor, patch + 1),
        Mode::Milestone => (major + 1, 0, 0),
        other => {
            return Err(VibeError::Extraction(format!(
                "mode '{other}' does not advance the stage counter"
            )))
        }
    };
    Ok(format!("{major}.{minor}.{patch}"))
}

/// Last fenced code block matching the mode's language tag: `python` for
/// sprints, untagged for bugfixes.
pub fn extract_code_block(text: &str, mode: Mode) -> Result<String> {
    let wanted_tag = match mode {
        Mode::Sprint => "python",
        Mode::Bugfix => "",
        other => {
            return Err(VibeError::Extraction(format!(
                "mode '{other}' has no stage payload to extract"
            )))
        }
    };
    let block = fence_re()
        .captures_iter(text)
        .filter(|caps| &caps[1] == wanted_tag)
        .last()
        .ok_or_else(|| {
            VibeError::Extraction(match mode {
                Mode::Sprint => "no fenced `python` code block in the latest output".to_string(),
                _ => "no untagged fenced code block in the latest output".to_string(),
            })
        })?;
    Ok(block[2].to_string())
}

/// Read the latest output for `project`, extract its code block, and write
/// the next numbered stage file.
pub fn extract_and_save(project: &str, mode: Mode) -> Result<PathBuf> {
    extract_into(
        &workspace::prompt_outputs_dir(project)?,
        &stages_dir(project)?,
        mode,
    )
}

/// Directory-scoped extraction. Fails fast if the target stage file
/// already exists; this is the invocation's final filesystem mutation.
pub fn extract_into(outputs_dir: &Path, stages_dir: &Path, mode: Mode) -> Result<PathBuf> {
    let latest = latest_output_in(outputs_dir)?;
    let text = fs::read_to_string(&latest)?;
    let block = extract_code_block(&text, mode)?;
    let version = next_version_in(stages_dir, mode)?;
    let extension = match mode {
        Mode::Sprint => "py",
        Mode::Bugfix => "md",
        other => {
            return Err(VibeError::Extraction(format!(
                "mode '{other}' does not produce stage files"
            )))
        }
    };

    fs::create_dir_all(stages_dir)?;
    let path = stages_dir.join(format!("{version}.{extension}"));
    write_stage_file(&path, &block)?;
    tracing::info!(source = %latest.display(), stage = %path.display(), "stage extracted");
    Ok(path)
}

/// Exclusive-create write of a stage file; an existing target is fatal.
pub fn write_stage_file(path: &Path, block: &str) -> Result<()> {
    let mut body = block.trim_end().to_string();
    body.push('\n');
    match OpenOptions::new().write(true).create_new(true).open(path) {
        Ok(mut file) => {
            file.write_all(body.as_bytes())?;
            Ok(())
        }
        Err(err) if err.kind() == ErrorKind::AlreadyExists => Err(VibeError::Extraction(format!(
            "stage file {} already exists; refusing to overwrite",
            path.display()
        ))),
        Err(err) => Err(err.into()),
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn extracts_last_python_block_for_sprint() {
        let text = "intro\n```python\nfirst\n```\nmore\n```python\nsecond\n```\ntail\n";
        let block = extract_code_block(text, Mode::Sprint).unwrap();
        assert_eq!(block, "second\n");
    }

    #[test]
    fn sprint_ignores_untagged_blocks() {
        let text = "```\nplain\n```\n";
        assert!(matches!(
            extract_code_block(text, Mode::Sprint),
            Err(VibeError::Extraction(_))
        ));
    }

    #[test]
    fn bugfix_takes_untagged_block() {
        let text = "```python\ncode\n```\n\n```\nroot cause: off by one\n```\n";
        let block = extract_code_block(text, Mode::Bugfix).unwrap();
        assert_eq!(block, "root cause: off by one\n");
    }

    #[test]
    fn multiline_block_is_captured_whole() {
        let text = "```python\nimport os\n\nprint(os.name)\n```\n";
        let block = extract_code_block(text, Mode::Sprint).unwrap();
        assert_eq!(block, "import os\n\nprint(os.name)\n");
    }

    #[test]
    fn stage_filename_regex_matches_versions_only() {
        let re = stage_file_re();
        assert!(re.is_match("4.3.0.py"));
        assert!(re.is_match("10.0.2.md"));
        assert!(!re.is_match("4.3.py"));
        assert!(!re.is_match("4.3.0.txt"));
        assert!(!re.is_match("v4.3.0.py"));
    }
}
