//! quill - hotel review generation from the command line
#![cfg_attr(
    test,
    allow(
        dead_code,
        clippy::expect_used,
        clippy::unwrap_used,
        clippy::panic,
        clippy::missing_panics_doc,
        clippy::missing_errors_doc,
        reason = "Allow for tests"
    )
)]

use anyhow::Result;
use clap::Parser as _;
use cli::{Cli, Commands};

mod cli;
mod handlers;

#[tokio::main]
async fn main() -> Result<()> {
    handlers::init_tracing();
    let cli = Cli::parse();
    let config = cli.config.as_deref();

    match cli.command {
        Commands::Generate(args) => handlers::handle_generate(config, args).await?,
        Commands::Metrics => handlers::handle_metrics(config)?,
        Commands::Providers => handlers::handle_providers(config).await?,
        Commands::InitConfig { force } => handlers::handle_init_config(config, force)?,
    }

    Ok(())
}
