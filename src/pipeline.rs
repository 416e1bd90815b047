//! Run orchestration: sources, fetch, merge, generate, deploy.

use anyhow::{Context, Result};
use std::path::{Path, PathBuf};
use std::sync::Arc;
use std::time::Duration;
use tempfile::TempDir;
use tracing::info;

use crate::config::Config;
use crate::coordinator::fetch_all;
use crate::deployer::{create_publisher, DeployOutcome, DeploymentTrigger, Publisher};
use crate::error::RunError;
use crate::fetcher::{build_client, Downloader, HttpDownloader, SourceFetcher};
use crate::generator::{GenerationReport, OutputGenerator};
use crate::lock::LockGuard;
use crate::merge::{merge_results, MergedSets};
use crate::signal::ShutdownToken;
use crate::sources::{create_lister, enumerate_sources, SourceLister};
use crate::version::RunVersion;
use crate::whitelist::{load_whitelist, WhitelistFilter};

/// Per-run scratch space.
///
/// Every temporary file of a run lives below one [`TempDir`]; dropping the
/// context removes them whether the run succeeded, failed or was cancelled.
pub struct RunContext {
    temp: TempDir,
    version: RunVersion,
}

impl RunContext {
    pub fn new(version: RunVersion) -> Result<Self> {
        let temp = tempfile::Builder::new()
            .prefix("blockhub-")
            .tempdir()
            .context("Failed to create run directory")?;

        for sub in ["sources", "info", "merged"] {
            std::fs::create_dir(temp.path().join(sub))
                .with_context(|| format!("Failed to create run directory {}", sub))?;
        }

        Ok(Self { temp, version })
    }

    pub fn version(&self) -> &RunVersion {
        &self.version
    }

    pub fn path(&self) -> &Path {
        self.temp.path()
    }

    /// Per-source record files
    pub fn sources_dir(&self) -> PathBuf {
        self.temp.path().join("sources")
    }

    /// Downloaded metadata documents
    pub fn info_dir(&self) -> PathBuf {
        self.temp.path().join("info")
    }

    /// Canonical sets
    pub fn merged_dir(&self) -> PathBuf {
        self.temp.path().join("merged")
    }
}

/// Tunables of a run that do not belong to a collaborator
#[derive(Debug, Clone)]
pub struct PipelineSettings {
    pub raw_url_template: String,
    pub concurrency: usize,
    pub mirror_url: String,
    pub settle_delay: Duration,
}

/// What a completed run produced
#[derive(Debug)]
pub struct RunReport {
    pub version: RunVersion,
    pub sources: usize,
    pub domains: usize,
    pub ips: usize,
    /// `None` when the version was already released and nothing was fetched
    pub generation: Option<GenerationReport>,
    pub deployment: DeployOutcome,
}

impl RunReport {
    fn skipped(version: RunVersion) -> Self {
        Self {
            version,
            sources: 0,
            domains: 0,
            ips: 0,
            generation: None,
            deployment: DeployOutcome::Skipped,
        }
    }
}

/// Collaborators and settings of a full run, selected once up front
pub struct Pipeline {
    lister: Box<dyn SourceLister>,
    downloader: Arc<dyn Downloader>,
    whitelist: Arc<dyn WhitelistFilter>,
    publisher: Box<dyn Publisher>,
    generator: Arc<OutputGenerator>,
    settings: PipelineSettings,
}

impl Pipeline {
    pub fn new(
        lister: Box<dyn SourceLister>,
        downloader: Arc<dyn Downloader>,
        whitelist: Arc<dyn WhitelistFilter>,
        publisher: Box<dyn Publisher>,
        generator: OutputGenerator,
        settings: PipelineSettings,
    ) -> Self {
        Self {
            lister,
            downloader,
            whitelist,
            publisher,
            generator: Arc::new(generator),
            settings,
        }
    }

    /// Build the production collaborators from configuration.
    ///
    /// Loads the whitelist, so this performs network I/O.
    pub async fn from_config(config: &Config, no_deploy: bool) -> Result<Self> {
        let client = build_client(Duration::from_secs(config.fetch.timeout_secs))?;
        let downloader: Arc<dyn Downloader> =
            Arc::new(HttpDownloader::with_client(client.clone(), &config.fetch));

        let lister = create_lister(
            &config.sources,
            client.clone(),
            config.deploy.get_token(),
            Arc::clone(&downloader),
        );
        let whitelist = load_whitelist(&config.whitelist, downloader.as_ref()).await?;
        let publisher = create_publisher(&config.deploy, no_deploy, &config.output.directory, client);
        let generator = OutputGenerator::from_config(config)?;

        let deploying = config.deploy.enabled && !no_deploy;
        let settings = PipelineSettings {
            raw_url_template: config.sources.raw_url_template.clone(),
            concurrency: config.fetch.concurrency,
            mirror_url: config.deploy.mirror_url.clone(),
            settle_delay: if deploying {
                Duration::from_secs(config.deploy.settle_delay_secs)
            } else {
                Duration::ZERO
            },
        };

        Ok(Self::new(
            lister,
            downloader,
            Arc::new(whitelist),
            publisher,
            generator,
            settings,
        ))
    }

    pub fn output_root(&self) -> &Path {
        self.generator.root()
    }

    /// Run every stage once.
    ///
    /// Nothing under the output root is touched unless every fetch worker
    /// succeeded and the run was not cancelled. A version that was already
    /// released is skipped before any source is fetched.
    pub async fn run(&self, version: RunVersion, token: &ShutdownToken) -> Result<RunReport> {
        let _lock = LockGuard::acquire(self.output_root())?;

        if self.publisher.bypass_check(version.as_str()).await? {
            info!("{} was already released, nothing to do", version);
            return Ok(RunReport::skipped(version));
        }

        let ctx = RunContext::new(version)?;
        info!("Starting run {}", ctx.version());

        let sources = enumerate_sources(self.lister.as_ref()).await?;
        if token.is_cancelled() {
            return Err(RunError::Cancelled.into());
        }

        let fetcher = SourceFetcher::new(
            Arc::clone(&self.downloader),
            Arc::clone(&self.whitelist),
            self.settings.raw_url_template.clone(),
            ctx.sources_dir(),
            ctx.info_dir(),
        );
        let results = fetch_all(&fetcher, &sources, self.settings.concurrency, token).await?;
        if token.is_cancelled() {
            return Err(RunError::Cancelled.into());
        }

        let metadata: Vec<PathBuf> = results
            .iter()
            .filter_map(|r| r.metadata_file.clone())
            .collect();

        let merged_dir = ctx.merged_dir();
        let merged: MergedSets =
            tokio::task::spawn_blocking(move || merge_results(&results, &merged_dir))
                .await
                .context("Merge task panicked")??;

        let generator = Arc::clone(&self.generator);
        let sets = merged.clone();
        let version_text = ctx.version().to_string();
        let generation = tokio::task::spawn_blocking(move || {
            generator.generate_all(&sets, &metadata, &version_text)
        })
        .await
        .context("Generation task panicked")??;
        info!(
            "Wrote {} files under {:?}",
            generation.file_count(),
            self.output_root()
        );

        let mut trigger = DeploymentTrigger::new(
            self.publisher.as_ref(),
            self.settings.mirror_url.clone(),
            self.settings.settle_delay,
        );
        let deployment = trigger.run(ctx.version().as_str()).await?;

        Ok(RunReport {
            version: ctx.version().clone(),
            sources: sources.len(),
            domains: merged.domains.count,
            ips: merged.ips.count,
            generation: Some(generation),
            deployment,
        })
    }
}
