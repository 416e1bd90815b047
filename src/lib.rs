//! # blockhub - Community Blocklist Aggregator
//!
//! Collects the raw entries of many community maintained blocklist
//! repositories, merges them into one sorted, duplicate-free set of domains
//! and one of IPs, and republishes both in every common blocking format.
//!
//! ## Architecture
//!
//! ```text
//! ┌─────────────────────────────────────────────────────────────┐
//! │                        blockhub                             │
//! ├─────────────────────────────────────────────────────────────┤
//! │  CLI (clap)                                                 │
//! │    └── Commands: run, sources, generate, init, version         │
//! ├─────────────────────────────────────────────────────────────┤
//! │  Config (serde_yaml)                                        │
//! ├─────────────────────────────────────────────────────────────┤
//! │  Sources (GitHub organisation listing + ignore list)        │
//! ├─────────────────────────────────────────────────────────────┤
//! │  Coordinator (futures buffer_unordered)                     │
//! │    └── SourceFetcher (reqwest) → whitelist → classifier     │
//! ├─────────────────────────────────────────────────────────────┤
//! │  Merge (sort + k-way merge + dedup)                         │
//! ├─────────────────────────────────────────────────────────────┤
//! │  Generator (chunked hosts / deny / list outputs + README)   │
//! ├─────────────────────────────────────────────────────────────┤
//! │  Deployer (Publisher trait: git, dry-run)                   │
//! └─────────────────────────────────────────────────────────────┘
//! ```
//!
//! ## Example Usage
//!
//! ```no_run
//! use blockhub::config::Config;
//! use blockhub::pipeline::Pipeline;
//! use blockhub::signal::ShutdownToken;
//! use blockhub::version::RunVersion;
//!
//! #[tokio::main]
//! async fn main() -> anyhow::Result<()> {
//!     let config = Config::load("blockhub.yaml")?;
//!
//!     // Dry run: generate outputs without committing
//!     let pipeline = Pipeline::from_config(&config, true).await?;
//!     let report = pipeline
//!         .run(RunVersion::current(&config.version), &ShutdownToken::new())
//!         .await?;
//!
//!     println!("{} domains, {} IPs", report.domains, report.ips);
//!     Ok(())
//! }
//! ```
//!
//! ## Modules
//!
//! - [`cli`] - Command-line interface definitions
//! - [`cmd_abstraction`] - External command execution (git)
//! - [`commands`] - CLI command implementations
//! - [`config`] - Configuration parsing and validation
//! - [`coordinator`] - Bounded concurrent fetch of all sources
//! - [`deployer`] - Release through git and mirror notification
//! - [`error`] - Typed errors
//! - [`fetcher`] - HTTP downloads and the per-source worker
//! - [`generator`] - Output formats, chunking and the summary document
//! - [`lock`] - Output directory locking
//! - [`merge`] - Canonical set construction
//! - [`pipeline`] - Run orchestration and per-run scratch space
//! - [`record`] - Record classification
//! - [`signal`] - SIGINT/SIGTERM cancellation
//! - [`sources`] - Source enumeration
//! - [`utils`] - Formatting helpers
//! - [`validation`] - Domain and IP syntax
//! - [`version`] - Run version
//! - [`whitelist`] - Whitelist rules

pub mod cli;
pub mod cmd_abstraction;
pub mod commands;
pub mod config;
pub mod coordinator;
pub mod deployer;
pub mod error;
pub mod fetcher;
pub mod generator;
pub mod lock;
pub mod merge;
pub mod pipeline;
pub mod record;
pub mod signal;
pub mod sources;
pub mod utils;
pub mod validation;
pub mod version;
pub mod whitelist;

pub use cli::{Cli, Commands};
pub use config::Config;
