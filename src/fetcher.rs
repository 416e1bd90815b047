//! HTTP downloading and the per-source fetch worker.

use anyhow::{Context, Result};
use async_trait::async_trait;
use reqwest::{Client, StatusCode};
use std::io::{BufWriter, Write};
use std::path::{Path, PathBuf};
use std::sync::Arc;
use std::time::Duration;
use tempfile::Builder;
use tracing::{debug, info, warn};

#[cfg(test)]
use mockall::automock;

use crate::config::FetchConfig;
use crate::error::DownloadError;
use crate::record::{classify, Record, SourceResult};
use crate::utils::{file_stem_for, format_count};
use crate::whitelist::WhitelistFilter;

const RETRY_DELAY_MS: u64 = 2000;

/// Domain-ish artifacts, highest priority first
pub const DOMAIN_ARTIFACTS: [&str; 3] = ["whitelisted.list", "clean.list", "domains.list"];

/// Artifact holding the IP entries of a source
pub const IP_ARTIFACT: &str = "ip.list";

/// Artifact holding the source description used for credits
pub const METADATA_ARTIFACT: &str = "info.json";

/// Fetches a URL to text.
#[cfg_attr(test, automock)]
#[async_trait]
pub trait Downloader: Send + Sync {
    async fn download(&self, url: &str) -> std::result::Result<String, DownloadError>;
}

/// reqwest backed downloader with retries and a size limit
pub struct HttpDownloader {
    client: Client,
    max_retries: u32,
    max_size: usize,
    retry_delay: Duration,
}

impl HttpDownloader {
    /// Create a downloader from the fetch settings
    pub fn new(config: &FetchConfig) -> Result<Self> {
        let client = build_client(Duration::from_secs(config.timeout_secs))?;
        Ok(Self::with_client(client, config))
    }

    /// Create a downloader around an existing client
    pub fn with_client(client: Client, config: &FetchConfig) -> Self {
        Self {
            client,
            max_retries: config.max_retries.max(1),
            max_size: config.max_artifact_bytes,
            retry_delay: Duration::from_millis(RETRY_DELAY_MS),
        }
    }

    /// Override the base delay between attempts
    pub fn with_retry_delay(mut self, delay: Duration) -> Self {
        self.retry_delay = delay;
        self
    }

    async fn attempt(&self, url: &str) -> std::result::Result<String, Attempt> {
        let response = self
            .client
            .get(url)
            .send()
            .await
            .map_err(|e| Attempt::Retry(transport_error(url, &e)))?;

        let status = response.status();
        if status == StatusCode::NOT_FOUND {
            return Err(Attempt::Fatal(DownloadError::NotFound(url.to_string())));
        }
        if !status.is_success() {
            let err = DownloadError::Transport {
                url: url.to_string(),
                reason: format!("HTTP {}", status),
            };
            // Only server-side errors are worth another attempt
            return Err(if status.is_server_error() {
                Attempt::Retry(err)
            } else {
                Attempt::Fatal(err)
            });
        }

        if let Some(len) = response.content_length() {
            if len as usize > self.max_size {
                return Err(Attempt::Fatal(DownloadError::TooLarge {
                    url: url.to_string(),
                    size: len as usize,
                    max: self.max_size,
                }));
            }
        }

        let body = response
            .text()
            .await
            .map_err(|e| Attempt::Retry(transport_error(url, &e)))?;

        if body.len() > self.max_size {
            return Err(Attempt::Fatal(DownloadError::TooLarge {
                url: url.to_string(),
                size: body.len(),
                max: self.max_size,
            }));
        }

        Ok(body)
    }
}

enum Attempt {
    Retry(DownloadError),
    Fatal(DownloadError),
}

fn transport_error(url: &str, err: &reqwest::Error) -> DownloadError {
    if err.is_timeout() {
        DownloadError::Timeout(url.to_string())
    } else {
        DownloadError::Transport {
            url: url.to_string(),
            reason: err.to_string(),
        }
    }
}

#[async_trait]
impl Downloader for HttpDownloader {
    async fn download(&self, url: &str) -> std::result::Result<String, DownloadError> {
        let mut last_error = None;

        for attempt in 0..self.max_retries {
            if attempt > 0 {
                let delay = self.retry_delay * (1 << (attempt - 1));
                debug!("Retry {} after {:?} for {}", attempt, delay, url);
                tokio::time::sleep(delay).await;
            }

            match self.attempt(url).await {
                Ok(body) => return Ok(body),
                Err(Attempt::Fatal(e)) => return Err(e),
                Err(Attempt::Retry(e)) => last_error = Some(e),
            }
        }

        Err(last_error.unwrap_or_else(|| DownloadError::Transport {
            url: url.to_string(),
            reason: "no attempt made".to_string(),
        }))
    }
}

/// Build the HTTP client shared by every network component
pub fn build_client(timeout: Duration) -> Result<Client> {
    Client::builder()
        .timeout(timeout)
        .user_agent(format!("blockhub/{}", env!("CARGO_PKG_VERSION")))
        .build()
        .context("Failed to create HTTP client")
}

/// Downloads, filters and classifies the artifacts of one source.
///
/// Each invocation writes only to uniquely named files inside `work_dir` and
/// `info_dir`; workers share nothing mutable.
pub struct SourceFetcher {
    downloader: Arc<dyn Downloader>,
    whitelist: Arc<dyn WhitelistFilter>,
    raw_url_template: String,
    work_dir: PathBuf,
    info_dir: PathBuf,
}

impl SourceFetcher {
    pub fn new(
        downloader: Arc<dyn Downloader>,
        whitelist: Arc<dyn WhitelistFilter>,
        raw_url_template: impl Into<String>,
        work_dir: impl Into<PathBuf>,
        info_dir: impl Into<PathBuf>,
    ) -> Self {
        Self {
            downloader,
            whitelist,
            raw_url_template: raw_url_template.into(),
            work_dir: work_dir.into(),
            info_dir: info_dir.into(),
        }
    }

    fn artifact_url(&self, source: &str, artifact: &str) -> String {
        let base = self.raw_url_template.replace("{source}", source);
        if base.ends_with('/') {
            format!("{}{}", base, artifact)
        } else {
            format!("{}/{}", base, artifact)
        }
    }

    async fn try_download(&self, source: &str, artifact: &str) -> Option<String> {
        let url = self.artifact_url(source, artifact);
        debug!("[{}] Downloading {}", source, url);

        match self.downloader.download(&url).await {
            Ok(content) => {
                debug!("[{}] Downloaded {} ({} bytes)", source, artifact, content.len());
                Some(content)
            }
            Err(e) => {
                warn!("[{}] Could not download {}: {}", source, artifact, e);
                None
            }
        }
    }

    /// Fetch one source.
    ///
    /// Download misses are logged and skipped. An `Err` is a worker fault
    /// (local I/O or a crashed blocking task) and must abort the run.
    pub async fn fetch(&self, source: &str) -> Result<SourceResult> {
        info!("[{}] Fetching...", source);

        let metadata_file = match self.try_download(source, METADATA_ARTIFACT).await {
            Some(content) => Some(write_private_file(
                &self.info_dir,
                source,
                ".json",
                content.as_bytes(),
            )?),
            None => None,
        };

        let mut domain_content = None;
        for artifact in DOMAIN_ARTIFACTS {
            if let Some(content) = self.try_download(source, artifact).await {
                info!("[{}] Using {} as domain artifact", source, artifact);
                domain_content = Some(content);
                break;
            }
        }

        let ip_content = self.try_download(source, IP_ARTIFACT).await;

        let whitelist = Arc::clone(&self.whitelist);
        let work_dir = self.work_dir.clone();
        let name = source.to_string();

        let (domains_file, ips_file, domain_count, ip_count) =
            tokio::task::spawn_blocking(move || {
                let mut domains = Vec::new();
                let mut ips = Vec::new();

                for content in [domain_content, ip_content].into_iter().flatten() {
                    let lines = content
                        .lines()
                        .map(str::trim)
                        .filter(|line| !line.is_empty())
                        .map(str::to_string)
                        .collect();

                    for line in whitelist.filter(lines) {
                        match classify(&line) {
                            Some(Record::Domain(d)) => domains.push(d),
                            Some(Record::IpAddress(ip)) => ips.push(ip),
                            None => {}
                        }
                    }
                }

                let domains_file = write_lines(&work_dir, &name, ".domains", &domains)?;
                let ips_file = write_lines(&work_dir, &name, ".ips", &ips)?;
                Ok::<_, anyhow::Error>((domains_file, ips_file, domains.len(), ips.len()))
            })
            .await
            .with_context(|| format!("Worker for {} panicked", source))??;

        info!(
            "[{}] Fetched {} domains, {} IPs",
            source,
            format_count(domain_count),
            format_count(ip_count)
        );

        Ok(SourceResult {
            source: source.to_string(),
            domains_file,
            ips_file,
            domain_count,
            ip_count,
            metadata_file,
        })
    }
}

/// Write `contents` to a new uniquely named file in `dir` and keep it.
fn write_private_file(dir: &Path, source: &str, suffix: &str, contents: &[u8]) -> Result<PathBuf> {
    let mut file = Builder::new()
        .prefix(&format!("{}.", file_stem_for(source)))
        .suffix(suffix)
        .tempfile_in(dir)
        .with_context(|| format!("Failed to create file in {:?}", dir))?;
    file.write_all(contents)?;
    let (_, path) = file
        .keep()
        .with_context(|| format!("Failed to keep file for {}", source))?;
    Ok(path)
}

fn write_lines(dir: &Path, source: &str, suffix: &str, lines: &[String]) -> Result<PathBuf> {
    let file = Builder::new()
        .prefix(&format!("{}.", file_stem_for(source)))
        .suffix(suffix)
        .tempfile_in(dir)
        .with_context(|| format!("Failed to create file in {:?}", dir))?;
    let (file, path) = file
        .keep()
        .with_context(|| format!("Failed to keep file for {}", source))?;

    let mut writer = BufWriter::new(file);
    for line in lines {
        writer.write_all(line.as_bytes())?;
        writer.write_all(b"\n")?;
    }
    writer.flush()?;
    Ok(path)
}
