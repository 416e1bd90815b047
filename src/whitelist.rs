//! Whitelist rules applied to every fetched line before classification.
//!
//! Rule syntax, one per line:
//! - `example.com` - exact match (case-insensitive)
//! - `ALL example.com` - the domain and every subdomain of it
//! - `REG ^ads[0-9]+\.` - regular expression matched against the line
//!
//! Blank lines and lines starting with `#` are ignored.

use anyhow::{Context, Result};
use regex::Regex;
use std::collections::HashSet;
use tracing::{info, warn};

#[cfg(test)]
use mockall::automock;

use crate::config::WhitelistConfig;
use crate::fetcher::Downloader;

/// Removes whitelisted entries from a batch of lines.
///
/// Implementations are called from blocking worker threads and must be
/// shareable across them.
#[cfg_attr(test, automock)]
pub trait WhitelistFilter: Send + Sync {
    /// Return the input with whitelisted lines removed, order preserved
    fn filter(&self, lines: Vec<String>) -> Vec<String>;
}

/// Whitelist built from exact, suffix and regex rules
#[derive(Debug, Default)]
pub struct RuleWhitelist {
    exact: HashSet<String>,
    suffixes: Vec<String>,
    patterns: Vec<Regex>,
}

impl RuleWhitelist {
    /// Build a whitelist from rule lines. Invalid regexes are skipped.
    pub fn from_rules<I, S>(rules: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: AsRef<str>,
    {
        let mut whitelist = Self::default();
        for rule in rules {
            whitelist.add_rule(rule.as_ref());
        }
        whitelist
    }

    fn add_rule(&mut self, rule: &str) {
        let rule = rule.trim();
        if rule.is_empty() || rule.starts_with('#') {
            return;
        }

        if let Some(suffix) = rule.strip_prefix("ALL ") {
            let suffix = suffix.trim().trim_start_matches('.').to_lowercase();
            if !suffix.is_empty() {
                self.suffixes.push(suffix);
            }
        } else if let Some(pattern) = rule.strip_prefix("REG ") {
            match Regex::new(pattern.trim()) {
                Ok(re) => self.patterns.push(re),
                Err(e) => warn!("Skipping invalid whitelist regex '{}': {}", pattern, e),
            }
        } else {
            self.exact.insert(rule.to_lowercase());
        }
    }

    pub fn len(&self) -> usize {
        self.exact.len() + self.suffixes.len() + self.patterns.len()
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }

    /// Check a single trimmed line against every rule
    pub fn is_whitelisted(&self, line: &str) -> bool {
        let lower = line.trim().to_lowercase();
        if lower.is_empty() {
            return false;
        }

        if self.exact.contains(&lower) {
            return true;
        }

        if self.suffixes.iter().any(|suffix| {
            lower == *suffix
                || (lower.len() > suffix.len()
                    && lower.ends_with(suffix.as_str())
                    && lower.as_bytes()[lower.len() - suffix.len() - 1] == b'.')
        }) {
            return true;
        }

        self.patterns.iter().any(|re| re.is_match(line.trim()))
    }
}

impl WhitelistFilter for RuleWhitelist {
    fn filter(&self, lines: Vec<String>) -> Vec<String> {
        if self.is_empty() {
            return lines;
        }
        lines
            .into_iter()
            .filter(|line| !self.is_whitelisted(line))
            .collect()
    }
}

/// Load the whitelist from inline rules plus the remote rule file.
///
/// A configured remote file that cannot be downloaded fails the load:
/// publishing without the whitelist would block legitimate domains.
pub async fn load_whitelist(
    config: &WhitelistConfig,
    downloader: &dyn Downloader,
) -> Result<RuleWhitelist> {
    let mut rules: Vec<String> = config.rules.clone();

    if let Some(ref url) = config.url {
        let content = downloader
            .download(url)
            .await
            .with_context(|| format!("Failed to download whitelist from {}", url))?;
        rules.extend(content.lines().map(str::to_string));
    }

    let whitelist = RuleWhitelist::from_rules(&rules);
    info!("Loaded {} whitelist rules", whitelist.len());
    Ok(whitelist)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::error::DownloadError;
    use crate::fetcher::MockDownloader;

    fn lines(items: &[&str]) -> Vec<String> {
        items.iter().map(|s| s.to_string()).collect()
    }

    #[test]
    fn test_exact_rule() {
        let wl = RuleWhitelist::from_rules(["google.com"]);
        assert!(wl.is_whitelisted("google.com"));
        assert!(wl.is_whitelisted("Google.COM"));
        assert!(!wl.is_whitelisted("mail.google.com"));
    }

    #[test]
    fn test_all_rule_matches_subdomains() {
        let wl = RuleWhitelist::from_rules(["ALL .example.org"]);
        assert!(wl.is_whitelisted("example.org"));
        assert!(wl.is_whitelisted("a.b.example.org"));
        assert!(!wl.is_whitelisted("badexample.org"));
        assert!(!wl.is_whitelisted("example.org.evil.com"));
    }

    #[test]
    fn test_reg_rule() {
        let wl = RuleWhitelist::from_rules([r"REG ^cdn[0-9]+\.example\.net$"]);
        assert!(wl.is_whitelisted("cdn12.example.net"));
        assert!(!wl.is_whitelisted("cdn.example.net"));
    }

    #[test]
    fn test_invalid_regex_skipped() {
        let wl = RuleWhitelist::from_rules(["REG ([", "ok.com"]);
        assert_eq!(wl.len(), 1);
        assert!(wl.is_whitelisted("ok.com"));
    }

    #[test]
    fn test_comments_and_blanks_ignored() {
        let wl = RuleWhitelist::from_rules(["# header", "", "   "]);
        assert!(wl.is_empty());
    }

    #[test]
    fn test_filter_preserves_order() {
        let wl = RuleWhitelist::from_rules(["b.com"]);
        let out = wl.filter(lines(&["c.com", "b.com", "a.com"]));
        assert_eq!(out, lines(&["c.com", "a.com"]));
    }

    #[test]
    fn test_empty_whitelist_is_identity() {
        let wl = RuleWhitelist::default();
        let input = lines(&["x.com", "1.2.3.4"]);
        assert_eq!(wl.filter(input.clone()), input);
    }

    #[tokio::test]
    async fn test_load_combines_inline_and_remote() {
        let mut downloader = MockDownloader::new();
        downloader
            .expect_download()
            .returning(|_| Ok("# remote\nremote.com\nALL trusted.org\n".to_string()));

        let config = WhitelistConfig {
            url: Some("https://example.com/whitelist".to_string()),
            rules: vec!["inline.com".to_string()],
        };
        let wl = load_whitelist(&config, &downloader).await.unwrap();
        assert_eq!(wl.len(), 3);
        assert!(wl.is_whitelisted("inline.com"));
        assert!(wl.is_whitelisted("remote.com"));
        assert!(wl.is_whitelisted("www.trusted.org"));
    }

    #[tokio::test]
    async fn test_load_fails_when_remote_unavailable() {
        let mut downloader = MockDownloader::new();
        downloader
            .expect_download()
            .returning(|u| Err(DownloadError::NotFound(u.to_string())));

        let config = WhitelistConfig {
            url: Some("https://example.com/whitelist".to_string()),
            rules: Vec::new(),
        };
        assert!(load_whitelist(&config, &downloader).await.is_err());
    }

    #[tokio::test]
    async fn test_load_without_url_skips_download() {
        let mut downloader = MockDownloader::new();
        downloader.expect_download().times(0);

        let config = WhitelistConfig {
            url: None,
            rules: vec!["only.com".to_string()],
        };
        let wl = load_whitelist(&config, &downloader).await.unwrap();
        assert_eq!(wl.len(), 1);
    }
}
