//! blockhub - community blocklist aggregator
//!
//! Fetches every source repository, merges the entries and republishes them
//! in hosts, deny and plain list formats.

use anyhow::Result;
use clap::Parser;
use tracing::Level;
use tracing_subscriber::FmtSubscriber;

use blockhub::cli::{Cli, Commands};

#[tokio::main]
async fn main() -> Result<()> {
    let cli = Cli::parse();

    let log_level = if cli.verbose {
        Level::DEBUG
    } else if cli.quiet {
        Level::ERROR
    } else {
        Level::INFO
    };

    let subscriber = FmtSubscriber::builder()
        .with_max_level(log_level)
        .with_target(false)
        .with_thread_ids(false)
        .without_time()
        .finish();
    tracing::subscriber::set_global_default(subscriber)?;

    let config = cli.config.as_deref();

    match cli.command {
        Commands::Run { output, no_deploy } => {
            blockhub::commands::run::run(config, output, no_deploy).await
        }
        Commands::Sources => blockhub::commands::sources::run(config).await,
        Commands::Generate {
            domains,
            ips,
            output,
        } => blockhub::commands::generate::run(config, domains, ips, output).await,
        Commands::Init { force } => blockhub::commands::init::run(config, force),
        Commands::Version => {
            println!("blockhub {}", env!("CARGO_PKG_VERSION"));
            Ok(())
        }
    }
}
