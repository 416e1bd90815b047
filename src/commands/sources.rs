//! Sources command implementation.

use anyhow::{Context, Result};
use std::path::Path;
use std::sync::Arc;
use std::time::Duration;

use crate::config::Config;
use crate::fetcher::{build_client, HttpDownloader};
use crate::sources::{create_lister, enumerate_sources};

/// Print the sources a run would fetch, one per line
pub async fn run(config_path: Option<&Path>) -> Result<()> {
    let config = Config::load_or_default(config_path)
        .with_context(|| format!("Failed to load config from {:?}", config_path))?;

    let client = build_client(Duration::from_secs(config.fetch.timeout_secs))?;
    let downloader = Arc::new(HttpDownloader::with_client(client.clone(), &config.fetch));
    let lister = create_lister(&config.sources, client, config.deploy.get_token(), downloader);

    for source in enumerate_sources(lister.as_ref()).await? {
        println!("{}", source);
    }

    Ok(())
}
