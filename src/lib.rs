//! Personalvibe: a prompt-pipeline workflow engine.
//!
//! Versioned YAML configurations become rendered LM prompts; every prompt
//! and response is persisted content-addressed under the workspace, and a
//! stage extractor advances the sprint counter from the latest response.

pub mod cli;
pub mod config;
pub mod error;
pub mod logs;
pub mod pipeline;
pub mod router;
pub mod scaffold;
pub mod stage;
pub mod store;
pub mod template;
pub mod util;
pub mod workflow;
pub mod workspace;
