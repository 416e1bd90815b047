//! Bounded concurrent fan-out of per-source fetches.

use anyhow::Result;
use async_trait::async_trait;
use futures::stream::{self, StreamExt, TryStreamExt};
use tracing::{error, info};

#[cfg(test)]
use mockall::automock;

use crate::error::RunError;
use crate::fetcher::SourceFetcher;
use crate::record::SourceResult;
use crate::signal::ShutdownToken;
use crate::utils::format_count;

/// Turns one source identifier into a [`SourceResult`].
#[cfg_attr(test, automock)]
#[async_trait]
pub trait FetchWorker: Send + Sync {
    async fn fetch(&self, source: &str) -> Result<SourceResult>;
}

#[async_trait]
impl FetchWorker for SourceFetcher {
    async fn fetch(&self, source: &str) -> Result<SourceResult> {
        SourceFetcher::fetch(self, source).await
    }
}

/// Fetch every source with at most `concurrency` in flight.
///
/// The first worker fault drops every outstanding fetch and is returned as
/// [`RunError::Worker`]. Cancelling `token` stops the fan-out with
/// [`RunError::Cancelled`]. Results are ordered by source identifier.
pub async fn fetch_all(
    worker: &dyn FetchWorker,
    sources: &[String],
    concurrency: usize,
    token: &ShutdownToken,
) -> Result<Vec<SourceResult>> {
    info!(
        "Fetching {} sources ({} at a time)...",
        sources.len(),
        concurrency
    );

    let fetches = stream::iter(sources.iter().map(|source| async move {
        worker.fetch(source).await.map_err(|e| {
            error!("[{}] Worker failed: {:#}", source, e);
            RunError::Worker {
                source_name: source.clone(),
                reason: format!("{:#}", e),
            }
        })
    }))
    .buffer_unordered(concurrency.max(1))
    .try_collect::<Vec<_>>();

    let mut results = tokio::select! {
        results = fetches => results?,
        _ = token.cancelled() => return Err(RunError::Cancelled.into()),
    };

    results.sort_by(|a, b| a.source.cmp(&b.source));

    let domains: usize = results.iter().map(|r| r.domain_count).sum();
    let ips: usize = results.iter().map(|r| r.ip_count).sum();
    info!(
        "Fetched {} sources: {} domains, {} IPs before dedup",
        results.len(),
        format_count(domains),
        format_count(ips)
    );

    Ok(results)
}
