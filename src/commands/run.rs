//! Run command implementation.

use anyhow::{Context, Result};
use std::path::{Path, PathBuf};
use tracing::info;

use crate::config::Config;
use crate::deployer::DeployOutcome;
use crate::pipeline::Pipeline;
use crate::signal::{ShutdownGuard, ShutdownToken};
use crate::utils::format_count;
use crate::version::RunVersion;

/// Run the full pipeline once
pub async fn run(config_path: Option<&Path>, output: Option<PathBuf>, no_deploy: bool) -> Result<()> {
    let mut config = Config::load_or_default(config_path)
        .with_context(|| format!("Failed to load config from {:?}", config_path))?;
    if let Some(dir) = output {
        config.output.directory = dir;
    }

    let _signals = ShutdownGuard::new();
    let token = ShutdownToken::new();

    let pipeline = Pipeline::from_config(&config, no_deploy).await?;
    let version = RunVersion::current(&config.version);
    info!("Writing outputs to {:?}", pipeline.output_root());

    let report = pipeline.run(version, &token).await?;

    let deployment = match report.deployment {
        DeployOutcome::Released if no_deploy || !config.deploy.enabled => "dry-run",
        DeployOutcome::Released => "released",
        DeployOutcome::Skipped => "skipped (already released)",
    };

    println!();
    println!(
        "[OK] {}: {} sources, {} domains, {} IPs, {} files ({})",
        report.version,
        report.sources,
        format_count(report.domains),
        format_count(report.ips),
        report.generation.as_ref().map_or(0, |g| g.file_count()),
        deployment
    );

    Ok(())
}
