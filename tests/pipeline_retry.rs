//! Transport retry budget of a full pipeline run.
//!
//! One test function: the run owns `PERSONALVIBE_DATA_DIR` and redirects
//! the process-global fds through the log harness.

mod common;

use common::StubSequence;
use personalvibe::config::load_config;
use personalvibe::error::VibeError;
use personalvibe::pipeline::{execute, RunOptions};
use personalvibe::workspace::DATA_DIR_ENV;
use serde_json::json;
use std::env;
use std::fs;
use std::path::{Path, PathBuf};

fn write_config(dir: &Path, name: &str, body: &str) -> PathBuf {
    let path = dir.join(name);
    fs::write(&path, body).unwrap();
    path
}

#[test]
fn only_transport_failures_consume_the_retry_budget() {
    let workspace = tempfile::tempdir().unwrap();
    env::set_var(DATA_DIR_ENV, workspace.path());
    env::set_var("OPENAI_API_KEY", "sk-test");

    let config_dir = tempfile::tempdir().unwrap();
    let sprint_yaml =
        "project_name: demo\ntask: sprint\nuser_instructions: retry me\nproject_context_paths: []\n";

    // One failure with one retry in the budget: the run succeeds and the
    // backend saw both attempts.
    let ok = json!({"choices": [{"message": {"role": "assistant", "content": "done"}}]});
    let stub = StubSequence::spawn(vec![(500, json!({"error": "upstream hiccup"})), (200, ok)]);
    env::set_var("PERSONALVIBE_OPENAI_BASE_URL", &stub.base_url);

    let config = load_config(&write_config(config_dir.path(), "5.1.0.yaml", sprint_yaml)).unwrap();
    let options = RunOptions {
        max_retries: 1,
        ..RunOptions::default()
    };
    let outcome = execute(&config, &options).unwrap();
    assert!(outcome.output_path.is_some());

    let requests = stub.finish();
    assert_eq!(requests.len(), 2);
    assert_eq!(requests[0].path, "/chat/completions");
    assert_eq!(requests[1].path, requests[0].path);

    // Zero budget: the first transport failure is final.
    let stub = StubSequence::spawn(vec![(500, json!({"error": "down"}))]);
    env::set_var("PERSONALVIBE_OPENAI_BASE_URL", &stub.base_url);
    let config = load_config(&write_config(config_dir.path(), "5.2.0.yaml", sprint_yaml)).unwrap();
    let err = execute(&config, &RunOptions::default()).unwrap_err();
    assert!(matches!(err, VibeError::Transport(_)));
    assert_eq!(stub.finish().len(), 1);

    // A missing credential is not a transport failure: it fails immediately
    // even with retries budgeted, and never reaches the network.
    env::remove_var("MISTRAL_API_KEY");
    let config = load_config(&write_config(
        config_dir.path(),
        "5.3.0.yaml",
        "project_name: demo\ntask: sprint\nmodel: mistral/mistral-large\nuser_instructions: x\nproject_context_paths: []\n",
    ))
    .unwrap();
    let options = RunOptions {
        max_retries: 3,
        ..RunOptions::default()
    };
    let err = execute(&config, &options).unwrap_err();
    assert!(matches!(
        err,
        VibeError::MissingCredential("MISTRAL_API_KEY")
    ));
    assert_eq!(err.exit_code(), 2);

    env::remove_var("PERSONALVIBE_OPENAI_BASE_URL");
    env::remove_var("OPENAI_API_KEY");
    env::remove_var(DATA_DIR_ENV);
}
