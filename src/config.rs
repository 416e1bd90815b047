//! Configuration management for blockhub.

use anyhow::{Context, Result};
use serde::{Deserialize, Serialize};
use std::env;
use std::path::{Path, PathBuf};
use zeroize::{Zeroize, ZeroizeOnDrop};

/// Default per-chunk size ceiling for generated outputs (5 MiB)
pub const DEFAULT_MAX_CHUNK_BYTES: u64 = 5_242_880;

/// Environment variable read for the GitHub token when `token_env` is unset
const DEFAULT_TOKEN_ENV: &str = "GITHUB_TOKEN";

/// Secure string type that zeroizes memory on drop
/// Used for the GitHub token
#[derive(Clone, Default, Serialize, Deserialize, Zeroize, ZeroizeOnDrop)]
#[serde(transparent)]
pub struct SecureString(String);

impl SecureString {
    pub fn new(s: String) -> Self {
        Self(s)
    }

    pub fn as_str(&self) -> &str {
        &self.0
    }

    pub fn is_empty(&self) -> bool {
        self.0.is_empty()
    }
}

impl std::fmt::Debug for SecureString {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str("[REDACTED]")
    }
}

impl From<&str> for SecureString {
    fn from(s: &str) -> Self {
        Self(s.to_string())
    }
}

/// Main configuration structure
#[derive(Debug, Clone, Serialize, Deserialize, Default)]
#[serde(default)]
pub struct Config {
    /// Where sources come from and which ones to skip
    pub sources: SourcesConfig,

    /// Download behaviour
    pub fetch: FetchConfig,

    /// Whitelist rules applied to every source
    pub whitelist: WhitelistConfig,

    /// Generated outputs
    pub output: OutputConfig,

    /// Commit + mirror notification
    pub deploy: DeployConfig,

    /// Release version settings
    pub version: VersionConfig,
}

impl Config {
    /// Load configuration from YAML file
    pub fn load<P: AsRef<Path>>(path: P) -> Result<Self> {
        let content = std::fs::read_to_string(path.as_ref())
            .with_context(|| format!("Failed to read config file: {:?}", path.as_ref()))?;
        let config: Config = serde_yaml::from_str(&content)
            .with_context(|| format!("Failed to parse config file: {:?}", path.as_ref()))?;

        config.validate()?;

        Ok(config)
    }

    /// Load the file when given, fall back to defaults otherwise
    pub fn load_or_default(path: Option<&Path>) -> Result<Self> {
        match path {
            Some(path) => Self::load(path),
            None => {
                let config = Self::default();
                config.validate()?;
                Ok(config)
            }
        }
    }

    /// Validate configuration values
    pub fn validate(&self) -> Result<()> {
        if !self.sources.raw_url_template.contains("{source}") {
            anyhow::bail!(
                "sources.raw_url_template must contain a {{source}} placeholder: {}",
                self.sources.raw_url_template
            );
        }

        require_https("sources.raw_url_template", &self.sources.raw_url_template)?;
        require_https("sources.api_url", &self.sources.api_url)?;
        if let Some(ref url) = self.sources.ignore_list_url {
            require_https("sources.ignore_list_url", url)?;
        }
        if let Some(ref url) = self.whitelist.url {
            require_https("whitelist.url", url)?;
        }
        if self.deploy.enabled {
            require_https("deploy.mirror_url", &self.deploy.mirror_url)?;
        }

        if self.fetch.concurrency == 0 {
            anyhow::bail!("fetch.concurrency must be at least 1");
        }
        if self.fetch.timeout_secs == 0 {
            anyhow::bail!("fetch.timeout_secs must be at least 1");
        }
        if self.fetch.max_artifact_bytes == 0 {
            anyhow::bail!("fetch.max_artifact_bytes must be greater than 0");
        }
        if self.output.max_chunk_bytes == 0 {
            anyhow::bail!("output.max_chunk_bytes must be greater than 0");
        }
        if self.version.prefix.trim().is_empty() {
            anyhow::bail!("version.prefix cannot be empty");
        }

        Ok(())
    }

    /// Write the commented default configuration to `path` atomically.
    ///
    /// Uses tempfile + rename so a crash never leaves a truncated file.
    pub fn write_default<P: AsRef<Path>>(path: P) -> Result<()> {
        use std::io::Write;
        use tempfile::NamedTempFile;

        let path = path.as_ref();
        let parent_dir = match path.parent() {
            Some(p) if !p.as_os_str().is_empty() => p,
            _ => Path::new("."),
        };
        let mut temp_file = NamedTempFile::new_in(parent_dir)
            .context("Failed to create temporary file for config")?;

        temp_file.write_all(Self::generate_default_yaml().as_bytes())?;
        temp_file.as_file().sync_all()?;

        temp_file
            .persist(path)
            .with_context(|| format!("Failed to persist config file: {:?}", path))?;

        Ok(())
    }

    /// Generate default config with comments
    pub fn generate_default_yaml() -> String {
        include_str!("../templates/config.yaml").to_string()
    }
}

fn require_https(field: &str, url: &str) -> Result<()> {
    if !url.starts_with("https://") {
        anyhow::bail!("{} must use HTTPS: {}", field, url);
    }
    Ok(())
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct SourcesConfig {
    /// GitHub organisation whose repositories are the sources
    pub organization: String,

    /// GitHub REST API base URL
    pub api_url: String,

    /// Raw artifact URL; `{source}` is replaced by the source identifier
    pub raw_url_template: String,

    /// Remote ignore file (one identifier per line, `#` comments)
    pub ignore_list_url: Option<String>,

    /// Identifiers that are never fetched
    pub ignore: Vec<String>,

    /// Fixed source list; when non-empty the organisation is not queried
    pub explicit: Vec<String>,
}

impl Default for SourcesConfig {
    fn default() -> Self {
        Self {
            organization: "Ultimate-Hosts-Blacklist".to_string(),
            api_url: "https://api.github.com".to_string(),
            raw_url_template:
                "https://raw.githubusercontent.com/Ultimate-Hosts-Blacklist/{source}/master/"
                    .to_string(),
            ignore_list_url: Some(
                "https://raw.githubusercontent.com/Ultimate-Hosts-Blacklist/dev-center/master/deployment/ignore-repo"
                    .to_string(),
            ),
            ignore: default_ignored_sources(),
            explicit: Vec::new(),
        }
    }
}

fn default_ignored_sources() -> Vec<String> {
    ["cleaning", "dev-center", "repository-structure", "whitelist"]
        .iter()
        .map(|s| s.to_string())
        .collect()
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct FetchConfig {
    /// Timeout of a single download attempt
    pub timeout_secs: u64,

    /// Attempts per artifact on transport errors (404 is never retried)
    pub max_retries: u32,

    /// Sources fetched at the same time
    pub concurrency: usize,

    /// Largest artifact accepted
    pub max_artifact_bytes: usize,
}

impl Default for FetchConfig {
    fn default() -> Self {
        Self {
            timeout_secs: 60,
            max_retries: 3,
            concurrency: 16,
            max_artifact_bytes: 512 * 1024 * 1024,
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct WhitelistConfig {
    /// Remote rule file appended to `rules`
    pub url: Option<String>,

    /// Inline rules (`example.com`, `ALL .example.com`, `REG ^ads\.`)
    pub rules: Vec<String>,
}

impl Default for WhitelistConfig {
    fn default() -> Self {
        Self {
            url: Some(
                "https://raw.githubusercontent.com/Ultimate-Hosts-Blacklist/whitelist/master/domains.list"
                    .to_string(),
            ),
            rules: Vec::new(),
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct OutputConfig {
    /// Root directory receiving every format directory and the summary
    pub directory: PathBuf,

    /// Directory with template overrides
    pub templates_dir: Option<PathBuf>,

    /// Per-chunk size ceiling in bytes
    pub max_chunk_bytes: u64,

    /// File name of the summary document
    pub summary_filename: String,
}

impl Default for OutputConfig {
    fn default() -> Self {
        Self {
            directory: PathBuf::from("."),
            templates_dir: None,
            max_chunk_bytes: DEFAULT_MAX_CHUNK_BYTES,
            summary_filename: "README.md".to_string(),
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct DeployConfig {
    /// Commit and notify after generation
    pub enabled: bool,

    /// Git remote pushed to
    pub remote: String,

    /// Endpoint pinged once the commit is pushed
    pub mirror_url: String,

    /// Delay between push and mirror notification
    pub settle_delay_secs: u64,

    /// Token can be set directly or via GITHUB_TOKEN env var
    pub github_token: SecureString,

    /// Environment variable name to read the token from (optional)
    pub token_env: Option<String>,
}

impl Default for DeployConfig {
    fn default() -> Self {
        Self {
            enabled: false,
            remote: "origin".to_string(),
            mirror_url: "https://hosts.ubuntu101.co.za/update_hosts.php".to_string(),
            settle_delay_secs: 60,
            github_token: SecureString::default(),
            token_env: None,
        }
    }
}

impl DeployConfig {
    /// Get the effective token, checking env vars first
    pub fn get_token(&self) -> SecureString {
        if let Some(ref env_name) = self.token_env {
            if let Ok(val) = env::var(env_name) {
                return SecureString::new(val);
            }
        }
        if let Ok(val) = env::var(DEFAULT_TOKEN_ENV) {
            return SecureString::new(val);
        }
        self.github_token.clone()
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct VersionConfig {
    /// Leading component of every release version
    pub prefix: String,

    /// Environment variable holding the CI build counter
    pub build_number_env: String,
}

impl Default for VersionConfig {
    fn default() -> Self {
        Self {
            prefix: "V2".to_string(),
            build_number_env: "GITHUB_RUN_NUMBER".to_string(),
        }
    }
}
