//! Workspace root resolution.
//!
//! One test function: `PERSONALVIBE_DATA_DIR` is process-global state.

use personalvibe::workspace::{workspace_root, DATA_DIR_ENV};
use std::env;

#[test]
fn env_override_wins_then_cwd_is_the_fallback() {
    let dir = tempfile::tempdir().unwrap();
    env::set_var(DATA_DIR_ENV, dir.path());
    assert_eq!(workspace_root().unwrap(), dir.path());

    // Blank override is ignored.
    env::set_var(DATA_DIR_ENV, "  ");
    let cwd = env::current_dir().unwrap();
    assert_eq!(workspace_root().unwrap(), cwd);

    env::remove_var(DATA_DIR_ENV);
    assert_eq!(workspace_root().unwrap(), cwd);
}
