//! Source enumeration: which upstream repositories feed the run.

use anyhow::{Context, Result};
use async_trait::async_trait;
use reqwest::Client;
use serde::Deserialize;
use std::collections::HashSet;
use std::sync::Arc;
use tracing::{debug, info, warn};

#[cfg(test)]
use mockall::automock;

use crate::config::{SecureString, SourcesConfig};
use crate::fetcher::Downloader;

const PER_PAGE: usize = 100;

/// Upper bound on listing pages, guards against a misbehaving API
const MAX_PAGES: usize = 100;

/// Lists candidate sources and the identifiers to skip.
#[cfg_attr(test, automock)]
#[async_trait]
pub trait SourceLister: Send + Sync {
    /// Every candidate source identifier
    async fn list_sources(&self) -> Result<Vec<String>>;

    /// Identifiers that must never be fetched
    async fn ignored_sources(&self) -> Result<HashSet<String>>;
}

#[derive(Debug, Deserialize)]
struct Repository {
    name: String,
}

/// Lists the repositories of a GitHub organisation
pub struct GitHubSourceLister {
    client: Client,
    api_url: String,
    organization: String,
    token: SecureString,
    ignore: Vec<String>,
    ignore_list_url: Option<String>,
    downloader: Arc<dyn Downloader>,
}

impl GitHubSourceLister {
    pub fn new(
        client: Client,
        config: &SourcesConfig,
        token: SecureString,
        downloader: Arc<dyn Downloader>,
    ) -> Self {
        Self {
            client,
            api_url: config.api_url.trim_end_matches('/').to_string(),
            organization: config.organization.clone(),
            token,
            ignore: config.ignore.clone(),
            ignore_list_url: config.ignore_list_url.clone(),
            downloader,
        }
    }

    async fn fetch_page(&self, page: usize) -> Result<Vec<Repository>> {
        let url = format!(
            "{}/orgs/{}/repos?per_page={}&page={}",
            self.api_url, self.organization, PER_PAGE, page
        );
        debug!("Listing {}", url);

        let mut request = self
            .client
            .get(&url)
            .header("Accept", "application/vnd.github+json");
        if !self.token.is_empty() {
            request = request.bearer_auth(self.token.as_str());
        }

        let response = request
            .send()
            .await
            .with_context(|| format!("Failed to list repositories of {}", self.organization))?;

        if !response.status().is_success() {
            anyhow::bail!(
                "Listing repositories of {} failed: HTTP {}",
                self.organization,
                response.status()
            );
        }

        response
            .json::<Vec<Repository>>()
            .await
            .context("Invalid repository listing")
    }
}

#[async_trait]
impl SourceLister for GitHubSourceLister {
    async fn list_sources(&self) -> Result<Vec<String>> {
        let mut names = Vec::new();

        for page in 1..=MAX_PAGES {
            let repos = self.fetch_page(page).await?;
            let count = repos.len();
            names.extend(repos.into_iter().map(|r| r.name));
            if count < PER_PAGE {
                break;
            }
        }

        info!("Found {} repositories in {}", names.len(), self.organization);
        Ok(names)
    }

    async fn ignored_sources(&self) -> Result<HashSet<String>> {
        let mut ignored: HashSet<String> = self.ignore.iter().cloned().collect();

        if let Some(ref url) = self.ignore_list_url {
            match self.downloader.download(url).await {
                Ok(content) => ignored.extend(parse_ignore_list(&content)),
                Err(e) => warn!("Could not download ignore list, using configured list only: {}", e),
            }
        }

        Ok(ignored)
    }
}

/// Fixed source list taken from the configuration
pub struct StaticSourceLister {
    sources: Vec<String>,
    ignored: HashSet<String>,
}

impl StaticSourceLister {
    pub fn new(sources: Vec<String>, ignored: impl IntoIterator<Item = String>) -> Self {
        Self {
            sources,
            ignored: ignored.into_iter().collect(),
        }
    }
}

#[async_trait]
impl SourceLister for StaticSourceLister {
    async fn list_sources(&self) -> Result<Vec<String>> {
        Ok(self.sources.clone())
    }

    async fn ignored_sources(&self) -> Result<HashSet<String>> {
        Ok(self.ignored.clone())
    }
}

/// Pick the lister for this configuration
pub fn create_lister(
    config: &SourcesConfig,
    client: Client,
    token: SecureString,
    downloader: Arc<dyn Downloader>,
) -> Box<dyn SourceLister> {
    if config.explicit.is_empty() {
        Box::new(GitHubSourceLister::new(client, config, token, downloader))
    } else {
        Box::new(StaticSourceLister::new(
            config.explicit.clone(),
            config.ignore.clone(),
        ))
    }
}

/// Parse an ignore file: one identifier per line, `#` starts a comment.
///
/// # Examples
/// ```
/// use blockhub::sources::parse_ignore_list;
/// let ignored = parse_ignore_list("# header\nfoo # old\n\nbar\n");
/// assert_eq!(ignored, vec!["foo", "bar"]);
/// ```
pub fn parse_ignore_list(content: &str) -> Vec<String> {
    content
        .lines()
        .map(|line| line.split('#').next().unwrap_or("").trim())
        .filter(|line| !line.is_empty())
        .map(str::to_string)
        .collect()
}

/// Candidate sources minus the ignored ones, first occurrence wins.
pub async fn enumerate_sources(lister: &dyn SourceLister) -> Result<Vec<String>> {
    let candidates = lister.list_sources().await?;
    let ignored = lister.ignored_sources().await?;

    let mut seen = HashSet::new();
    let sources: Vec<String> = candidates
        .into_iter()
        .filter(|s| !ignored.contains(s))
        .filter(|s| seen.insert(s.clone()))
        .collect();

    info!(
        "{} sources to fetch ({} ignored)",
        sources.len(),
        ignored.len()
    );
    Ok(sources)
}
