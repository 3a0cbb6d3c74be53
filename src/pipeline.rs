//! End-to-end run orchestration.
//!
//! One invocation = one configuration: render the prompt, persist the input
//! artefact, optionally call the model, persist the response tagged with the
//! input hash so pairs are joinable by filename. The whole run executes
//! inside a log session on `logs/<version>_base.log`.

use crate::config::ConfigRecord;
use crate::error::{Result, VibeError};
use crate::logs::LogSession;
use crate::router::{self, ChatOptions, Message};
use crate::store;
use crate::template;
use crate::util::display_path;
use crate::workspace;
use std::fs;
use std::path::{Path, PathBuf};
use std::time::Duration;

#[derive(Debug, Clone, Default)]
pub struct RunOptions {
    /// Persist the rendered prompt and stop before the model call.
    pub prompt_only: bool,
    pub max_tokens: Option<u32>,
    /// Additional attempts after a transport failure.
    pub max_retries: u32,
    pub timeout: Option<Duration>,
}

#[derive(Debug)]
pub struct RunOutcome {
    pub input_path: PathBuf,
    /// Absent in prompt-only mode.
    pub output_path: Option<PathBuf>,
}

/// Execute one pipeline run under the per-run log session.
pub fn execute(config: &ConfigRecord, options: &RunOptions) -> Result<RunOutcome> {
    let run_id = format!("{}_base", config.version);
    let log_path = workspace::logs_dir()?.join(format!("{run_id}.log"));
    let session = LogSession::begin(&log_path, &run_id)?;
    let outcome = run_inner(config, options);
    session.end()?;
    outcome
}

fn run_inner(config: &ConfigRecord, options: &RunOptions) -> Result<RunOutcome> {
    let inputs_dir = workspace::prompt_inputs_dir(&config.project_name)?;
    let outputs_dir = workspace::prompt_outputs_dir(&config.project_name)?;
    let repo_root = workspace::repo_root()?;

    let context = template::gather_project_context(&config.project_context_paths, &repo_root)?;
    let prompt = template::render_prompt(config, &context)?;
    tracing::info!(
        mode = %config.mode,
        project = %config.project_name,
        prompt_bytes = prompt.len(),
        "prompt rendered"
    );

    let input_path = store::save(&prompt, &inputs_dir, None)?;
    let input_hash = store::hash_from_filename(&input_path).ok_or_else(|| {
        VibeError::Internal(format!(
            "persisted input {} has no hash segment",
            input_path.display()
        ))
    })?;
    tracing::info!(input = %display_path(&input_path, Some(&inputs_dir)), "input persisted");

    if options.prompt_only {
        return Ok(RunOutcome {
            input_path,
            output_path: None,
        });
    }

    // Caller-authored history first, then the ambient artefact context,
    // then the fresh prompt as the final user message.
    let mut messages = config.conversation_history.clone();
    messages.extend(artefact_messages(&inputs_dir, &outputs_dir, &input_path)?);
    messages.push(Message::user(prompt));

    let chat_options = ChatOptions {
        max_tokens: options.max_tokens,
        temperature: None,
        timeout: options.timeout,
    };
    let response = call_with_retries(
        config.model.as_deref(),
        &messages,
        &chat_options,
        options.max_retries,
    )?;
    let text = router::assistant_text(&response);

    let output_path = store::save(&text, &outputs_dir, Some(&input_hash))?;
    tracing::info!(
        model = config.model.as_deref().unwrap_or(router::DEFAULT_MODEL),
        output = %display_path(&output_path, Some(&outputs_dir)),
        "response persisted"
    );
    Ok(RunOutcome {
        input_path,
        output_path: Some(output_path),
    })
}

/// Prior artefacts as chat context: inputs replay as user messages, outputs
/// as assistant messages, merged in filename (timestamp) order. The freshly
/// persisted input is skipped; it becomes the final user message instead.
fn artefact_messages(
    inputs_dir: &Path,
    outputs_dir: &Path,
    fresh_input: &Path,
) -> Result<Vec<Message>> {
    let mut entries: Vec<(String, Message)> = Vec::new();
    collect_artefacts(inputs_dir, fresh_input, true, &mut entries)?;
    collect_artefacts(outputs_dir, fresh_input, false, &mut entries)?;
    entries.sort_by(|a, b| a.0.cmp(&b.0));
    Ok(entries.into_iter().map(|(_, message)| message).collect())
}

fn collect_artefacts(
    dir: &Path,
    skip: &Path,
    as_user: bool,
    entries: &mut Vec<(String, Message)>,
) -> Result<()> {
    if !dir.exists() {
        return Ok(());
    }
    for entry in fs::read_dir(dir)? {
        let entry = entry?;
        let path = entry.path();
        if !entry.file_type()?.is_file() || path == skip {
            continue;
        }
        let name = entry.file_name().to_string_lossy().into_owned();
        let text = fs::read_to_string(&path)?;
        let content = store::strip_sentinel(&text).to_string();
        let message = if as_user {
            Message::user(content)
        } else {
            Message::assistant(content)
        };
        entries.push((name, message));
    }
    Ok(())
}

fn call_with_retries(
    model: Option<&str>,
    messages: &[Message],
    options: &ChatOptions,
    max_retries: u32,
) -> Result<serde_json::Value> {
    let mut attempt = 0;
    loop {
        match router::chat_completion(model, messages, options) {
            Ok(response) => return Ok(response),
            Err(VibeError::Transport(reason)) if attempt < max_retries => {
                attempt += 1;
                tracing::warn!(%reason, attempt, max_retries, "transport failure, retrying");
            }
            Err(err) => return Err(err),
        }
    }
}
