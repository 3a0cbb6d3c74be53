//! Versioned YAML configuration loading.
//!
//! A configuration file is named `<semver>.yaml`; the filename stem becomes
//! the run version. Raw bytes are sanitised before YAML parsing so that
//! stray control characters from copy-pasted instructions cannot poison a
//! run, and UTF-16 surrogates are rejected outright.

use crate::error::{Result, VibeError};
use crate::router::Message;
use crate::workspace;
use regex::Regex;
use serde::Deserialize;
use std::fmt;
use std::fs;
use std::path::{Path, PathBuf};
use std::str::FromStr;
use std::sync::OnceLock;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Mode {
    Prd,
    Milestone,
    Sprint,
    Validate,
    Bugfix,
}

impl Mode {
    pub fn as_str(&self) -> &'static str {
        match self {
            Mode::Prd => "prd",
            Mode::Milestone => "milestone",
            Mode::Sprint => "sprint",
            Mode::Validate => "validate",
            Mode::Bugfix => "bugfix",
        }
    }
}

impl fmt::Display for Mode {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for Mode {
    type Err = String;

    fn from_str(value: &str) -> std::result::Result<Self, Self::Err> {
        match value {
            "prd" => Ok(Mode::Prd),
            "milestone" => Ok(Mode::Milestone),
            "sprint" => Ok(Mode::Sprint),
            "validate" => Ok(Mode::Validate),
            "bugfix" => Ok(Mode::Bugfix),
            other => Err(format!(
                "unknown mode '{other}' (expected prd, milestone, sprint, validate or bugfix)"
            )),
        }
    }
}

/// Immutable record driving one pipeline run.
#[derive(Debug, Clone)]
pub struct ConfigRecord {
    /// Semver string derived from the YAML filename stem.
    pub version: String,
    pub project_name: String,
    pub mode: Mode,
    pub user_instructions: String,
    pub project_context_paths: Vec<String>,
    /// `None` means "use the router default".
    pub model: Option<String>,
    pub conversation_history: Vec<Message>,
    /// Origin file, kept for error reporting.
    pub path: PathBuf,
}

#[derive(Debug, Deserialize)]
struct RawConfig {
    #[serde(default)]
    project_name: Option<String>,
    /// `mode:` and `task:` are aliases; YAMLs in the wild use both.
    #[serde(default)]
    mode: Option<String>,
    #[serde(default)]
    task: Option<String>,
    #[serde(default)]
    model: Option<String>,
    #[serde(default)]
    user_instructions: String,
    #[serde(default)]
    project_context_paths: Vec<String>,
    #[serde(default)]
    conversation_history: Vec<Message>,
    /// Legacy field, accepted and ignored.
    #[serde(default, rename = "milestone_file_name")]
    _milestone_file_name: Option<serde_yaml::Value>,
}

fn config_error(path: &Path, message: impl Into<String>) -> VibeError {
    VibeError::Config {
        path: path.to_path_buf(),
        message: message.into(),
    }
}

pub fn load_config(path: &Path) -> Result<ConfigRecord> {
    load_config_with(path, None)
}

/// Load a configuration, letting a caller-supplied project name pre-empt
/// both the YAML field and auto-detection.
pub fn load_config_with(path: &Path, project_override: Option<&str>) -> Result<ConfigRecord> {
    let bytes = fs::read(path)?;
    let raw_text = decode(&bytes).map_err(|message| config_error(path, message))?;
    let sanitised = sanitise(&raw_text).map_err(|message| config_error(path, message))?;
    let dedented = dedent(&sanitised);

    let raw: RawConfig = serde_yaml::from_str(&dedented)
        .map_err(|err| config_error(path, format!("invalid YAML: {err}")))?;

    let version = path
        .file_stem()
        .and_then(|stem| stem.to_str())
        .filter(|stem| !stem.is_empty())
        .ok_or_else(|| config_error(path, "filename has no usable stem for a version"))?
        .to_string();

    let mode_field = raw
        .mode
        .or(raw.task)
        .ok_or_else(|| config_error(path, "missing required field 'mode' (or 'task')"))?;
    let mode = Mode::from_str(&mode_field).map_err(|message| config_error(path, message))?;

    let model = match raw.model.as_deref() {
        None | Some("") => None,
        Some(value) => {
            validate_model(value)?;
            Some(value.to_string())
        }
    };

    let project_name = match project_override {
        Some(name) => name.to_string(),
        None => match raw.project_name {
            Some(name) if !name.trim().is_empty() => name,
            _ => workspace::detect_project_name(None)?,
        },
    };

    Ok(ConfigRecord {
        version,
        project_name,
        mode,
        user_instructions: raw.user_instructions,
        project_context_paths: raw.project_context_paths,
        model,
        conversation_history: raw.conversation_history,
        path: path.to_path_buf(),
    })
}

/// Reject UTF-16 surrogates before UTF-8 decoding.
///
/// Valid UTF-8 cannot carry a surrogate, but CESU-8 encoders emit them as
/// `ED A0..BF ..` triples which `from_utf8` reports as a generic decode
/// failure; naming the actual defect saves the user a round trip.
fn decode(bytes: &[u8]) -> std::result::Result<String, String> {
    for window in bytes.windows(2) {
        if window[0] == 0xED && (0xA0..=0xBF).contains(&window[1]) {
            return Err("contains a UTF-16 surrogate code point".to_string());
        }
    }
    String::from_utf8(bytes.to_vec()).map_err(|err| format!("invalid UTF-8: {err}"))
}

/// Replace disallowed ASCII control characters with a single space and
/// reject escaped UTF-16 surrogates (`\uD800`..`\uDFFF`) in scalars.
pub fn sanitise(raw: &str) -> std::result::Result<String, String> {
    static SURROGATE_ESCAPE: OnceLock<Regex> = OnceLock::new();
    let surrogate = SURROGATE_ESCAPE
        .get_or_init(|| Regex::new(r"\\u[dD][89a-fA-F][0-9a-fA-F]{2}").expect("static regex"));
    if let Some(found) = surrogate.find(raw) {
        return Err(format!(
            "contains a UTF-16 surrogate escape '{}'",
            found.as_str()
        ));
    }

    Ok(raw
        .chars()
        .map(|c| {
            if c.is_ascii_control() && !matches!(c, '\n' | '\r' | '\t') {
                ' '
            } else {
                c
            }
        })
        .collect())
}

/// Strip the longest common leading whitespace from every non-blank line,
/// tolerating YAML fixtures indented inside test sources.
pub fn dedent(text: &str) -> String {
    let mut prefix: Option<&str> = None;
    for line in text.lines() {
        if line.trim().is_empty() {
            continue;
        }
        let indent_end = line
            .char_indices()
            .find(|(_, c)| !c.is_whitespace())
            .map_or(line.len(), |(i, _)| i);
        let indent = &line[..indent_end];
        prefix = Some(match prefix {
            None => indent,
            Some(current) => common_prefix(current, indent),
        });
        if prefix == Some("") {
            return text.to_string();
        }
    }
    let prefix = match prefix {
        Some(p) if !p.is_empty() => p,
        _ => return text.to_string(),
    };

    let mut out = String::with_capacity(text.len());
    for line in text.split_inclusive('\n') {
        let body = line.trim_end_matches(['\n', '\r']);
        if body.trim().is_empty() {
            out.push_str(line);
        } else {
            out.push_str(line.strip_prefix(prefix).unwrap_or(line));
        }
    }
    out
}

fn common_prefix<'a>(a: &'a str, b: &str) -> &'a str {
    let end = a
        .char_indices()
        .zip(b.chars())
        .take_while(|((_, ca), cb)| ca == cb)
        .map(|((i, ca), _)| i + ca.len_utf8())
        .last()
        .unwrap_or(0);
    &a[..end]
}

/// Model strings must be `<provider>/<model_name>`; empty means default and
/// is handled by the caller.
pub fn validate_model(model: &str) -> Result<()> {
    static MODEL_RE: OnceLock<Regex> = OnceLock::new();
    let re = MODEL_RE.get_or_init(|| Regex::new(r"^[^/]+/.+$").expect("static regex"));
    if re.is_match(model) {
        Ok(())
    } else {
        Err(VibeError::InvalidModel(model.to_string()))
    }
}
