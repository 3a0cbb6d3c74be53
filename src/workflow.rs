//! Sub-command glue between the CLI surface and the library modules.

use crate::cli::{Command, ModeArgs, ParseStageArgs, PipelineFlags, RunArgs, ScaffoldArgs, StageMode};
use crate::config::{self, Mode};
use crate::error::{Result, VibeError};
use crate::pipeline::{self, RunOptions};
use crate::scaffold;
use crate::stage;
use crate::util::display_path;
use clap::Parser;

pub fn dispatch(command: Command) -> Result<()> {
    match command {
        Command::Run(args) => run_auto(args),
        Command::Prd(args) => run_mode(args, Mode::Prd),
        Command::Milestone(args) => run_mode(args, Mode::Milestone),
        Command::Sprint(args) => run_mode(args, Mode::Sprint),
        Command::Validate(args) => run_mode(args, Mode::Validate),
        Command::Bugfix(args) => run_mode(args, Mode::Bugfix),
        Command::ParseStage(args) => run_parse_stage(args),
        Command::NewMilestone(args) => run_scaffold(args, Mode::Milestone),
        Command::PrepareSprint(args) => run_scaffold(args, Mode::Sprint),
        Command::PrepareBugfix(args) => run_scaffold(args, Mode::Bugfix),
    }
}

/// `run` takes the mode from the YAML; `--raw-argv` re-enters the parser.
fn run_auto(args: RunArgs) -> Result<()> {
    if let Some(raw) = &args.raw_argv {
        let words = shell_words::split(raw)
            .map_err(|err| VibeError::Usage(format!("--raw-argv: {err}")))?;
        let argv = std::iter::once("pv".to_string()).chain(words);
        let reparsed = crate::cli::RootArgs::try_parse_from(argv)
            .map_err(|err| VibeError::Usage(format!("--raw-argv: {err}")))?;
        return dispatch(reparsed.command);
    }
    execute_pipeline(args.flags, None)
}

fn run_mode(args: ModeArgs, mode: Mode) -> Result<()> {
    execute_pipeline(args.flags, Some(mode))
}

fn execute_pipeline(flags: PipelineFlags, forced_mode: Option<Mode>) -> Result<()> {
    let mut config = config::load_config_with(&flags.config, flags.project_name.as_deref())?;
    if let Some(mode) = forced_mode {
        config.mode = mode;
    }

    let options = RunOptions {
        prompt_only: flags.prompt_only,
        max_tokens: flags.max_tokens,
        max_retries: flags.max_retries,
        timeout: None,
    };
    let outcome = pipeline::execute(&config, &options)?;

    println!("input:  {}", display_path(&outcome.input_path, None));
    match outcome.output_path {
        Some(path) => println!("output: {}", display_path(&path, None)),
        None => println!("prompt-only: model call skipped"),
    }
    Ok(())
}

fn run_parse_stage(args: ParseStageArgs) -> Result<()> {
    let project = match args.project_name {
        Some(name) => name,
        None => crate::workspace::detect_project_name(None)?,
    };
    let mode = match args.mode {
        StageMode::Sprint => Mode::Sprint,
        StageMode::Bugfix => Mode::Bugfix,
    };
    let path = stage::extract_and_save(&project, mode)?;
    println!("stage:  {}", display_path(&path, None));
    Ok(())
}

fn run_scaffold(args: ScaffoldArgs, mode: Mode) -> Result<()> {
    let path = scaffold::scaffold_config(args.project_name.as_deref(), mode)?;
    println!("config: {}", display_path(&path, None));
    Ok(())
}
