//! Keyforge CLI - mnemonics, HD accounts, keystores and transaction signing.

pub mod commands;
pub mod config;
pub mod output;
pub mod telemetry;

use clap::Parser;

fn main() {
    let cli = commands::Cli::parse();

    if let Err(e) = run(cli) {
        output::print_error(&format!("Error: {:#}", e));
        std::process::exit(1);
    }
}

fn run(cli: commands::Cli) -> anyhow::Result<()> {
    let mut config = config::CliConfig::load(cli.config.as_deref())?;
    if let Some(chain_id) = cli.chain_id {
        config.chain_id = chain_id;
        config.validate()?;
    }

    let log_level = if cli.verbose { "debug" } else { config.log_level.as_str() };
    telemetry::init_telemetry(log_level, config.log_json)?;
    tracing::debug!(chain_id = config.chain_id, "loaded configuration");

    commands::execute(cli.command, &config)
}
