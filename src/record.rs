//! Classified blocklist records and per-source results.

use serde::Deserialize;
use std::fmt;
use std::path::PathBuf;

use crate::validation::{is_valid_domain, is_valid_ip};

/// A classified, normalized blocklist entry.
///
/// The textual form is always a single trimmed line.
#[derive(Debug, Clone, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub enum Record {
    Domain(String),
    IpAddress(String),
}

impl Record {
    pub fn as_str(&self) -> &str {
        match self {
            Record::Domain(s) | Record::IpAddress(s) => s,
        }
    }

    pub fn is_domain(&self) -> bool {
        matches!(self, Record::Domain(_))
    }
}

impl fmt::Display for Record {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Classify a raw line as a domain, an IP address or nothing.
///
/// Total and pure: surrounding whitespace is ignored, anything that is
/// neither a valid domain nor a valid IP yields `None`.
///
/// # Examples
/// ```
/// use blockhub::record::{classify, Record};
/// assert_eq!(classify(" bad.com \n"), Some(Record::Domain("bad.com".into())));
/// assert_eq!(classify("1.2.3.4"), Some(Record::IpAddress("1.2.3.4".into())));
/// assert_eq!(classify("# comment"), None);
/// ```
pub fn classify(line: &str) -> Option<Record> {
    let subject = line.trim();
    if subject.is_empty() || subject.contains(['\n', '\r']) {
        return None;
    }

    if is_valid_domain(subject) {
        Some(Record::Domain(subject.to_string()))
    } else if is_valid_ip(subject) {
        Some(Record::IpAddress(subject.to_string()))
    } else {
        None
    }
}

/// Per-source output of the source fetcher.
///
/// Each side lives in a private file inside the run's temporary directory.
#[derive(Debug, Clone)]
pub struct SourceResult {
    pub source: String,
    pub domains_file: PathBuf,
    pub ips_file: PathBuf,
    pub domain_count: usize,
    pub ip_count: usize,
    /// Path of the downloaded `info.json`, if the source has one.
    pub metadata_file: Option<PathBuf>,
}

impl SourceResult {
    pub fn is_empty(&self) -> bool {
        self.domain_count == 0 && self.ip_count == 0
    }
}

/// Per-source metadata document used for the credit table.
#[derive(Debug, Clone, Deserialize, PartialEq, Eq)]
pub struct SourceMetadata {
    pub name: String,
    pub raw_link: String,
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_classify_domain() {
        assert_eq!(
            classify("example.com"),
            Some(Record::Domain("example.com".to_string()))
        );
    }

    #[test]
    fn test_classify_ip() {
        assert_eq!(
            classify("10.0.0.1"),
            Some(Record::IpAddress("10.0.0.1".to_string()))
        );
        assert_eq!(
            classify("10.0.0.0/8"),
            Some(Record::IpAddress("10.0.0.0/8".to_string()))
        );
    }

    #[test]
    fn test_classify_trims_whitespace() {
        assert_eq!(
            classify("\t  evil.net  \r\n"),
            Some(Record::Domain("evil.net".to_string()))
        );
    }

    #[test]
    fn test_classify_preserves_case() {
        assert_eq!(
            classify("Tracker.Example.COM"),
            Some(Record::Domain("Tracker.Example.COM".to_string()))
        );
    }

    #[test]
    fn test_classify_invalid() {
        assert_eq!(classify(""), None);
        assert_eq!(classify("   "), None);
        assert_eq!(classify("# comment"), None);
        assert_eq!(classify("0.0.0.0 example.com"), None);
        assert_eq!(classify("not a subject"), None);
        assert_eq!(classify("a.com\nb.com"), None);
    }

    #[test]
    fn test_record_display() {
        let record = Record::IpAddress("1.2.3.4".to_string());
        assert_eq!(record.to_string(), "1.2.3.4");
        assert!(!record.is_domain());
    }

    #[test]
    fn test_metadata_decode() {
        let json = r#"{"name": "hosts-source", "raw_link": "https://example.com/raw", "extra": 1}"#;
        let meta: SourceMetadata = serde_json::from_str(json).unwrap();
        assert_eq!(meta.name, "hosts-source");
        assert_eq!(meta.raw_link, "https://example.com/raw");
    }

    #[test]
    fn test_metadata_decode_missing_field() {
        let json = r#"{"name": "hosts-source"}"#;
        assert!(serde_json::from_str::<SourceMetadata>(json).is_err());
    }
}
