//! CLI argument parsing with clap.

use clap::{Parser, Subcommand};
use std::path::PathBuf;

#[derive(Parser)]
#[command(name = "blockhub")]
#[command(author, version, about = "Aggregate community blocklists and publish them in every hosts/deny format")]
#[command(propagate_version = true)]
pub struct Cli {
    #[command(subcommand)]
    pub command: Commands,

    /// Config file path (built-in defaults when omitted)
    #[arg(short, long, global = true)]
    pub config: Option<PathBuf>,

    /// Quiet mode (errors only, for CI)
    #[arg(short, long, global = true)]
    pub quiet: bool,

    /// Verbose mode (debug output)
    #[arg(short, long, global = true)]
    pub verbose: bool,
}

#[derive(Subcommand)]
pub enum Commands {
    /// Fetch every source, regenerate all outputs and deploy them
    Run {
        /// Output directory (overrides output.directory)
        #[arg(short, long)]
        output: Option<PathBuf>,

        /// Generate outputs but never commit or notify
        #[arg(long)]
        no_deploy: bool,
    },

    /// List the sources a run would fetch
    Sources,

    /// Render every output format from local domain and IP files
    Generate {
        /// File with one domain per line
        #[arg(long)]
        domains: PathBuf,

        /// File with one IP or CIDR range per line
        #[arg(long)]
        ips: PathBuf,

        /// Output directory (overrides output.directory)
        #[arg(short, long)]
        output: Option<PathBuf>,
    },

    /// Write a commented default configuration file
    Init {
        /// Overwrite an existing file
        #[arg(long)]
        force: bool,
    },

    /// Show version information
    Version,
}
