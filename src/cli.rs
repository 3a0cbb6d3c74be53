//! CLI argument parsing for the prompt-pipeline workflow.
//!
//! The CLI is intentionally thin: every sub-command routes into the same
//! pipeline or a single helper, so behaviour lives in the library modules.

use clap::{Parser, Subcommand, ValueEnum};
use std::path::PathBuf;

/// Root CLI entrypoint.
#[derive(Parser, Debug)]
#[command(
    name = "pv",
    version,
    about = "Versioned YAML configurations in, persisted LM prompts out",
    after_help = "Commands:\n  run --config <yaml>        Auto-detect the mode from the YAML and execute\n  prd|milestone|sprint|validate|bugfix --config <yaml>\n                             Execute with an explicit mode\n  parse-stage                Extract the latest output into a numbered stage file\n  new-milestone              Scaffold the next milestone YAML\n  prepare-sprint             Scaffold the next sprint YAML\n  prepare-bugfix             Scaffold the next bugfix YAML\n\nExamples:\n  pv run --config prompts/demo/1.2.3.yaml\n  pv sprint --config prompts/demo/1.3.0.yaml --prompt_only\n  pv parse-stage --mode sprint\n  pv prepare-bugfix --project_name demo",
    subcommand_required = true,
    arg_required_else_help = true
)]
pub struct RootArgs {
    #[command(subcommand)]
    pub command: Command,
}

/// Top-level workflow commands.
#[derive(Subcommand, Debug)]
pub enum Command {
    Run(RunArgs),
    Prd(ModeArgs),
    Milestone(ModeArgs),
    Sprint(ModeArgs),
    Validate(ModeArgs),
    Bugfix(ModeArgs),
    ParseStage(ParseStageArgs),
    NewMilestone(ScaffoldArgs),
    PrepareSprint(ScaffoldArgs),
    PrepareBugfix(ScaffoldArgs),
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, ValueEnum)]
pub enum Verbosity {
    /// Debug-level diagnostics
    Verbose,
    /// No diagnostics at all
    None,
    /// Errors only (default)
    Errors,
}

/// Flags shared by every pipeline-executing sub-command.
#[derive(clap::Args, Debug, Clone)]
pub struct PipelineFlags {
    /// Path to the versioned YAML configuration
    #[arg(long, value_name = "PATH")]
    pub config: PathBuf,

    /// Diagnostic verbosity
    #[arg(long, value_enum, default_value_t = Verbosity::Errors)]
    pub verbosity: Verbosity,

    /// Render and persist the prompt, then stop before the model call
    #[arg(long = "prompt_only")]
    pub prompt_only: bool,

    /// Extra attempts after a transport failure
    #[arg(long = "max_retries", value_name = "N", default_value_t = 0)]
    pub max_retries: u32,

    /// Token budget forwarded to the model
    #[arg(long = "max_tokens", value_name = "N")]
    pub max_tokens: Option<u32>,

    /// Project name (auto-detected from prompts/<name>/ when omitted)
    #[arg(long = "project_name", value_name = "NAME")]
    pub project_name: Option<String>,
}

/// `run` auto-detects the mode from the YAML.
#[derive(Parser, Debug)]
#[command(about = "Execute the pipeline, taking the mode from the YAML")]
pub struct RunArgs {
    #[command(flatten)]
    pub flags: PipelineFlags,

    /// Power-user passthrough: a full `pv` argv to parse and dispatch
    #[arg(long = "raw-argv", value_name = "ARGV")]
    pub raw_argv: Option<String>,
}

/// Explicit-mode execution; overrides whatever mode the YAML declares.
#[derive(Parser, Debug)]
#[command(about = "Execute the pipeline with this sub-command's mode")]
pub struct ModeArgs {
    #[command(flatten)]
    pub flags: PipelineFlags,
}

#[derive(Parser, Debug)]
#[command(about = "Extract the latest model output into a numbered stage file")]
pub struct ParseStageArgs {
    /// Project name (auto-detected when omitted)
    #[arg(long = "project_name", value_name = "NAME")]
    pub project_name: Option<String>,

    /// Stage kind: sprint extracts `python` blocks to .py, bugfix untagged
    /// blocks to .md
    #[arg(long, value_enum, default_value_t = StageMode::Sprint)]
    pub mode: StageMode,

    /// Diagnostic verbosity
    #[arg(long, value_enum, default_value_t = Verbosity::Errors)]
    pub verbosity: Verbosity,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, ValueEnum)]
pub enum StageMode {
    Sprint,
    Bugfix,
}

#[derive(Parser, Debug)]
#[command(about = "Scaffold the next versioned YAML for this project")]
pub struct ScaffoldArgs {
    /// Project name (auto-detected when omitted)
    #[arg(long = "project_name", value_name = "NAME")]
    pub project_name: Option<String>,

    /// Diagnostic verbosity
    #[arg(long, value_enum, default_value_t = Verbosity::Errors)]
    pub verbosity: Verbosity,
}

impl Command {
    /// Verbosity requested by whichever sub-command was parsed.
    pub fn verbosity(&self) -> Verbosity {
        match self {
            Command::Run(args) => args.flags.verbosity,
            Command::Prd(args)
            | Command::Milestone(args)
            | Command::Sprint(args)
            | Command::Validate(args)
            | Command::Bugfix(args) => args.flags.verbosity,
            Command::ParseStage(args) => args.verbosity,
            Command::NewMilestone(args)
            | Command::PrepareSprint(args)
            | Command::PrepareBugfix(args) => args.verbosity,
        }
    }
}
