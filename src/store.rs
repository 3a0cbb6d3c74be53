//! Content-addressed prompt persistence.
//!
//! Artefacts are named `<UTC-timestamp>[_<upstream-hash10>]_<hash10>.md` and
//! de-duplicated by content hash: a directory never holds two files for the
//! same prompt text. Creation is exclusive so concurrent writers collide
//! safely by yielding the identical hash-path.

use crate::error::{Result, VibeError};
use crate::util::content_hash;
use chrono::Utc;
use std::fs::{self, OpenOptions};
use std::io::{ErrorKind, Write};
use std::path::{Path, PathBuf};
use walkdir::WalkDir;

/// Trailing sentinel written to every stored prompt file.
pub const SENTINEL: &str = "### END PROMPT";

/// Fixed-width timestamp prefix; lexicographic order is chronological order.
pub const TIMESTAMP_FORMAT: &str = "%Y%m%dT%H%M%SZ";

/// Persist `prompt` under `dir`, returning the artefact path.
///
/// If an artefact for the same content hash already exists anywhere under
/// `dir`, that path is returned and nothing is written.
pub fn save(prompt: &str, dir: &Path, upstream_hash: Option<&str>) -> Result<PathBuf> {
    let hash = content_hash(prompt);
    fs::create_dir_all(dir)?;

    if let Some(existing) = find_existing(dir, &hash)? {
        tracing::debug!(path = %existing.display(), %hash, "prompt already persisted");
        return Ok(existing);
    }

    let timestamp = Utc::now().format(TIMESTAMP_FORMAT);
    let filename = match upstream_hash {
        Some(upstream) => format!("{timestamp}_{upstream}_{hash}.md"),
        None => format!("{timestamp}_{hash}.md"),
    };
    let path = dir.join(filename);

    let mut body = String::with_capacity(prompt.len() + SENTINEL.len() + 2);
    body.push_str(prompt);
    if !body.ends_with('\n') {
        body.push('\n');
    }
    body.push_str(SENTINEL);
    body.push('\n');

    match OpenOptions::new().write(true).create_new(true).open(&path) {
        Ok(mut file) => {
            file.write_all(body.as_bytes())?;
            Ok(path)
        }
        // A concurrent writer won the race; its file carries the same hash.
        Err(err) if err.kind() == ErrorKind::AlreadyExists => {
            find_existing(dir, &hash)?.ok_or_else(|| {
                VibeError::Internal(format!(
                    "artefact for hash {hash} vanished after create race in {}",
                    dir.display()
                ))
            })
        }
        Err(err) => Err(err.into()),
    }
}

/// Recursive scan for any file whose name embeds `hash10`.
pub fn find_existing(dir: &Path, hash10: &str) -> Result<Option<PathBuf>> {
    if !dir.exists() {
        return Ok(None);
    }
    for entry in WalkDir::new(dir).sort_by_file_name() {
        let entry = entry.map_err(|err| VibeError::Internal(format!("walk {}: {err}", dir.display())))?;
        if !entry.file_type().is_file() {
            continue;
        }
        let name = entry.file_name().to_string_lossy();
        if name.contains(hash10) {
            return Ok(Some(entry.into_path()));
        }
    }
    Ok(None)
}

/// Content hash encoded in an artefact filename (the last `_`-separated
/// segment of the stem).
pub fn hash_from_filename(path: &Path) -> Option<String> {
    let stem = path.file_stem()?.to_str()?;
    let hash = stem.rsplit('_').next()?;
    if hash.len() == 10 && hash.chars().all(|c| c.is_ascii_hexdigit()) {
        Some(hash.to_string())
    } else {
        None
    }
}

/// Artefact text with the trailing sentinel line removed.
pub fn strip_sentinel(text: &str) -> &str {
    let trimmed = text.trim_end();
    match trimmed.strip_suffix(SENTINEL) {
        Some(rest) => rest.trim_end(),
        None => trimmed,
    }
}
