mod cli;
mod commands;

use cli::{Cli, Commands};
use commands::{digitize, series};
use tracing_subscriber::{EnvFilter, fmt};

pub fn run() -> anyhow::Result<()> {
    use clap::Parser;

    let cli = Cli::parse();
    let level = match cli.verbose {
        0 => "info",
        1 => "debug",
        _ => "trace",
    };
    let filter = EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new(level));
    fmt()
        .with_env_filter(filter)
        .with_target(false)
        .with_writer(std::io::stderr)
        .init();

    match &cli.command {
        Commands::Digitize(args) => digitize::run(&cli, args),
        Commands::Series(args) => series::run(&cli, args),
    }
}

fn main() -> anyhow::Result<()> { run() }
