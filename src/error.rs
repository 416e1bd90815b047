//! Error types for blockhub.

use thiserror::Error;

/// Why a single artifact could not be downloaded.
///
/// Every variant means "artifact absent" to the source fetcher; none of them
/// aborts a run on its own.
#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum DownloadError {
    #[error("Not found: {0}")]
    NotFound(String),

    #[error("Transport error for {url}: {reason}")]
    Transport { url: String, reason: String },

    #[error("Timed out: {0}")]
    Timeout(String),

    #[error("Response too large for {url}: {size} bytes (max: {max} bytes)")]
    TooLarge { url: String, size: usize, max: usize },
}

/// Failures reported by a publisher capability.
#[derive(Error, Debug)]
pub enum PublishError {
    /// The release for this run version already exists. Not a failure.
    #[error("Release {0} has already been published")]
    AlreadyReleased(String),

    #[error("Command failed: {0}")]
    Command(String),

    #[error("Mirror notification failed: {0}")]
    Notify(String),
}

/// Run-level failures that abort the pipeline before anything is published.
#[derive(Error, Debug)]
pub enum RunError {
    #[error("Worker for source '{source_name}' failed: {reason}")]
    Worker { source_name: String, reason: String },

    #[error("Run cancelled by shutdown signal")]
    Cancelled,
}
