use clap::Parser;
use personalvibe::cli::{RootArgs, Verbosity};
use personalvibe::workflow;
use tracing_subscriber::{fmt, prelude::*, EnvFilter};

fn init_tracing(verbosity: Verbosity) {
    let default = match verbosity {
        Verbosity::Verbose => "debug",
        Verbosity::None => "off",
        Verbosity::Errors => "error",
    };
    let filter = EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new(default));
    tracing_subscriber::registry()
        .with(fmt::layer())
        .with(filter)
        .init();
}

fn main() {
    let cli = RootArgs::parse();
    init_tracing(cli.command.verbosity());

    if let Err(err) = workflow::dispatch(cli.command) {
        eprintln!("{err}");
        std::process::exit(err.exit_code());
    }
}
