//! Prompt-only pipeline run end to end.
//!
//! One test function: the run redirects the process-global fds through the
//! log harness and owns `PERSONALVIBE_DATA_DIR`.

use personalvibe::config::load_config;
use personalvibe::pipeline::{execute, RunOptions};
use personalvibe::workspace::DATA_DIR_ENV;
use std::env;
use std::fs;

#[test]
fn prompt_only_run_persists_input_and_log() {
    let workspace = tempfile::tempdir().unwrap();
    env::set_var(DATA_DIR_ENV, workspace.path());

    let config_dir = tempfile::tempdir().unwrap();
    let config_path = config_dir.path().join("2.0.1.yaml");
    fs::write(
        &config_path,
        concat!(
            "project_name: demo\n",
            "task: prd\n",
            "user_instructions: draft the requirements\n",
            "project_context_paths: []\n",
        ),
    )
    .unwrap();

    let config = load_config(&config_path).unwrap();
    let options = RunOptions {
        prompt_only: true,
        ..RunOptions::default()
    };

    let outcome = execute(&config, &options).unwrap();
    assert!(outcome.output_path.is_none());

    // Input artefact lives under the workspace, rendered from the master
    // template, sentinel-terminated.
    let inputs_dir = workspace.path().join("data").join("demo").join("prompt_inputs");
    assert!(outcome.input_path.starts_with(&inputs_dir));
    let prompt = fs::read_to_string(&outcome.input_path).unwrap();
    assert!(prompt.contains("# Project: demo"));
    assert!(prompt.contains("draft the requirements"));
    assert!(prompt.ends_with("### END PROMPT\n"));

    // Per-run log: one-time RUN_ID header plus a session stamp.
    let log_path = workspace.path().join("logs").join("2.0.1_base.log");
    let log = fs::read_to_string(&log_path).unwrap();
    assert!(log.starts_with("RUN_ID=2.0.1_base\n"));
    assert_eq!(log.matches("BEGIN-STAMP ").count(), 1);
    let size_after_first = fs::metadata(&log_path).unwrap().len();

    // Re-running the identical configuration de-duplicates the input and
    // appends a second log session.
    let again = execute(&config, &options).unwrap();
    assert_eq!(again.input_path, outcome.input_path);
    let count = fs::read_dir(&inputs_dir).unwrap().count();
    assert_eq!(count, 1);

    let log = fs::read_to_string(&log_path).unwrap();
    assert_eq!(log.matches("RUN_ID=").count(), 1);
    assert_eq!(log.matches("BEGIN-STAMP ").count(), 2);
    assert!(fs::metadata(&log_path).unwrap().len() > size_after_first);

    env::remove_var(DATA_DIR_ENV);
}
