//! Generate command implementation.

use anyhow::{Context, Result};
use std::path::{Path, PathBuf};
use tempfile::TempDir;

use crate::config::Config;
use crate::generator::{GenerationReport, OutputGenerator};
use crate::lock::LockGuard;
use crate::merge::{merge_files, MergedSets};
use crate::utils::format_count;
use crate::version::RunVersion;

/// Sort and dedup local record files, then render every output format
pub fn generate_from_files(config: &Config, domains: &Path, ips: &Path) -> Result<GenerationReport> {
    let generator = OutputGenerator::from_config(config)?;
    let _lock = LockGuard::acquire(generator.root())?;

    let work = TempDir::new().context("Failed to create work directory")?;
    let sets = MergedSets {
        domains: merge_files(&[domains.to_path_buf()], &work.path().join("domains.list"))?,
        ips: merge_files(&[ips.to_path_buf()], &work.path().join("ips.list"))?,
    };

    let version = RunVersion::current(&config.version);
    generator.generate_all(&sets, &[], version.as_str())
}

/// Run the generate command
pub async fn run(
    config_path: Option<&Path>,
    domains: PathBuf,
    ips: PathBuf,
    output: Option<PathBuf>,
) -> Result<()> {
    let mut config = Config::load_or_default(config_path)
        .with_context(|| format!("Failed to load config from {:?}", config_path))?;
    if let Some(dir) = output {
        config.output.directory = dir;
    }

    let root = config.output.directory.clone();
    let report = tokio::task::spawn_blocking(move || generate_from_files(&config, &domains, &ips))
        .await
        .context("Generation task panicked")??;

    let records: usize = report.formats.iter().map(|f| f.records).sum();
    println!();
    println!(
        "[OK] {} files written to {:?} ({} lines)",
        report.file_count(),
        root,
        format_count(records)
    );

    Ok(())
}
