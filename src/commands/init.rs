//! Init command implementation.

use anyhow::Result;
use std::path::Path;
use tracing::info;

use crate::config::Config;

/// Config file written when no `--config` path is given
pub const DEFAULT_CONFIG_FILE: &str = "blockhub.yaml";

/// Write the default configuration to `config_path` (or `blockhub.yaml`)
pub fn run(config_path: Option<&Path>, force: bool) -> Result<()> {
    let path = config_path.unwrap_or(Path::new(DEFAULT_CONFIG_FILE));

    if path.exists() && !force {
        anyhow::bail!(
            "{:?} already exists. Use --force to overwrite it.",
            path
        );
    }

    info!("Creating {:?}...", path);
    Config::write_default(path)?;

    println!("[OK] Default configuration written to {}", path.display());
    Ok(())
}
