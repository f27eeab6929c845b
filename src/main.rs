mod cli;
mod commands;

use clap::Parser;
use cli::{Cli, Commands};
use hublog::config::Config;
use hublog::observability;

fn main() -> Result<(), Box<dyn std::error::Error + Send + Sync>> {
    let cli = Cli::parse();

    let config = Config::load_with(cli.config.clone())?;
    observability::init(&config.telemetry);

    match cli.command {
        Commands::Cleanup(args) => commands::cleanup(&config, args)?,
        Commands::Query(args) => commands::query(&config, args)?,
        Commands::Log(args) => commands::log(&config, args)?,
    }

    Ok(())
}
