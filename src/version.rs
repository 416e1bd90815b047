//! Release version of a run.

use chrono::{NaiveDate, Utc};
use std::env;
use std::fmt;

use crate::config::VersionConfig;

/// Identifier of one run, embedded in headers and the commit message.
///
/// `<prefix>.<build>.<YYYY>.<MM>.<DD>` with a CI build number,
/// `<prefix>.<YYYY>.<MM>.<DD>` without one. Dates are UTC.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct RunVersion(String);

impl RunVersion {
    /// # Examples
    /// ```
    /// use blockhub::version::RunVersion;
    /// use chrono::NaiveDate;
    /// let date = NaiveDate::from_ymd_opt(2024, 3, 7).unwrap();
    /// assert_eq!(RunVersion::new("V2", Some("812"), date).as_str(), "V2.812.2024.03.07");
    /// assert_eq!(RunVersion::new("V2", None, date).as_str(), "V2.2024.03.07");
    /// ```
    pub fn new(prefix: &str, build: Option<&str>, date: NaiveDate) -> Self {
        let date = date.format("%Y.%m.%d");
        match build.map(str::trim).filter(|b| !b.is_empty()) {
            Some(build) => Self(format!("{}.{}.{}", prefix, build, date)),
            None => Self(format!("{}.{}", prefix, date)),
        }
    }

    /// Version for a run starting now, reading the build number from the
    /// configured environment variable
    pub fn current(config: &VersionConfig) -> Self {
        let build = env::var(&config.build_number_env).ok();
        Self::new(&config.prefix, build.as_deref(), Utc::now().date_naive())
    }

    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl fmt::Display for RunVersion {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0)
    }
}
