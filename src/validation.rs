//! Syntax validation for blocklist subjects.
//!
//! This module provides the two syntax checkers used by the record classifier:
//! - [`is_valid_ip`] - IPv4/IPv6 addresses and CIDR ranges
//! - [`is_valid_domain`] - fully qualified domain names

use ipnet::IpNet;
use std::net::IpAddr;

/// Maximum length of a domain name in its textual form
const MAX_DOMAIN_LEN: usize = 253;

/// Maximum length of a single label
const MAX_LABEL_LEN: usize = 63;

/// Check whether the subject is an IP address or a CIDR range.
///
/// # Examples
/// ```
/// use blockhub::validation::is_valid_ip;
/// assert!(is_valid_ip("192.168.1.1"));
/// assert!(is_valid_ip("2001:db8::/32"));
/// assert!(!is_valid_ip("example.com"));
/// ```
pub fn is_valid_ip(subject: &str) -> bool {
    if subject.contains('/') {
        subject.parse::<IpNet>().is_ok()
    } else {
        subject.parse::<IpAddr>().is_ok()
    }
}

/// Check whether the subject is a syntactically valid domain name.
///
/// Rules: at most 253 bytes, at least two labels, labels of 1-63 ASCII
/// alphanumerics, `-` or `_` that neither start nor end with `-`, and an
/// alphabetic (or `xn--`) top level label of at least two characters.
///
/// # Examples
/// ```
/// use blockhub::validation::is_valid_domain;
/// assert!(is_valid_domain("ads.example.com"));
/// assert!(!is_valid_domain("localhost"));
/// assert!(!is_valid_domain("1.2.3.4"));
/// ```
pub fn is_valid_domain(subject: &str) -> bool {
    if subject.is_empty() || subject.len() > MAX_DOMAIN_LEN || !subject.is_ascii() {
        return false;
    }

    let labels: Vec<&str> = subject.split('.').collect();
    if labels.len() < 2 {
        return false;
    }

    if !labels.iter().all(|label| is_valid_label(label)) {
        return false;
    }

    // Safe: labels has at least two elements
    let tld = labels[labels.len() - 1];
    is_valid_tld(tld)
}

fn is_valid_label(label: &str) -> bool {
    !label.is_empty()
        && label.len() <= MAX_LABEL_LEN
        && !label.starts_with('-')
        && !label.ends_with('-')
        && label
            .bytes()
            .all(|b| b.is_ascii_alphanumeric() || b == b'-' || b == b'_')
}

fn is_valid_tld(tld: &str) -> bool {
    if tld.len() < 2 {
        return false;
    }
    if let Some(rest) = tld.strip_prefix("xn--") {
        return !rest.is_empty() && rest.bytes().all(|b| b.is_ascii_alphanumeric() || b == b'-');
    }
    tld.bytes().all(|b| b.is_ascii_alphabetic())
}
