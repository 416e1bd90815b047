//! SIGINT/SIGTERM handling for cancelling a run.
//!
//! A signal sets a process-wide flag; [`ShutdownToken`]s observe it and can
//! also be cancelled on their own.

use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;
use std::time::Duration;
use tokio::signal::unix::{signal, Signal, SignalKind};
use tracing::{info, warn};

static SHUTDOWN_REQUESTED: AtomicBool = AtomicBool::new(false);

/// How often [`ShutdownToken::cancelled`] re-checks the flags
const POLL_INTERVAL: Duration = Duration::from_millis(100);

#[inline]
pub fn is_shutdown_requested() -> bool {
    SHUTDOWN_REQUESTED.load(Ordering::Relaxed)
}

pub fn request_shutdown() {
    SHUTDOWN_REQUESTED.store(true, Ordering::Relaxed);
}

fn register(kind: SignalKind, name: &str) -> Option<Signal> {
    match signal(kind) {
        Ok(s) => Some(s),
        Err(e) => {
            warn!("Failed to register {} handler: {}", name, e);
            None
        }
    }
}

async fn recv_or_pending(sig: &mut Option<Signal>) {
    match sig {
        Some(s) => {
            s.recv().await;
        }
        None => std::future::pending::<()>().await,
    }
}

/// Listens for SIGINT and SIGTERM for as long as the runtime lives.
///
/// Must be created inside a Tokio runtime. Registration failures are
/// logged and leave signal handling disabled.
pub struct ShutdownGuard {
    _marker: (),
}

impl ShutdownGuard {
    pub fn new() -> Self {
        tokio::spawn(async move {
            let mut sigint = register(SignalKind::interrupt(), "SIGINT");
            let mut sigterm = register(SignalKind::terminate(), "SIGTERM");

            if sigint.is_none() && sigterm.is_none() {
                warn!("No signal handlers registered, cancellation disabled");
                return;
            }

            tokio::select! {
                _ = recv_or_pending(&mut sigint) => info!("Received SIGINT, cancelling run..."),
                _ = recv_or_pending(&mut sigterm) => info!("Received SIGTERM, cancelling run..."),
            }
            request_shutdown();
        });

        Self { _marker: () }
    }
}

impl Default for ShutdownGuard {
    fn default() -> Self {
        Self::new()
    }
}

/// Cancellation handle shared by the stages of a run.
#[derive(Clone)]
pub struct ShutdownToken {
    flag: Arc<AtomicBool>,
}

impl ShutdownToken {
    pub fn new() -> Self {
        Self {
            flag: Arc::new(AtomicBool::new(false)),
        }
    }

    /// True once this token was cancelled or a signal arrived
    pub fn is_cancelled(&self) -> bool {
        self.flag.load(Ordering::Relaxed) || is_shutdown_requested()
    }

    pub fn cancel(&self) {
        self.flag.store(true, Ordering::Relaxed);
    }

    /// Resolve once the token is cancelled
    pub async fn cancelled(&self) {
        let mut interval = tokio::time::interval(POLL_INTERVAL);
        loop {
            interval.tick().await;
            if self.is_cancelled() {
                return;
            }
        }
    }
}

impl Default for ShutdownToken {
    fn default() -> Self {
        Self::new()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_token_cancel_is_shared_by_clones() {
        let token = ShutdownToken::new();
        let other = token.clone();
        assert!(!other.is_cancelled());

        token.cancel();
        assert!(other.is_cancelled());
    }

    #[tokio::test]
    async fn test_cancelled_resolves_after_cancel() {
        let token = ShutdownToken::new();
        let waiter = token.clone();
        let handle = tokio::spawn(async move { waiter.cancelled().await });

        token.cancel();
        tokio::time::timeout(Duration::from_secs(2), handle)
            .await
            .expect("cancelled() did not resolve")
            .unwrap();
    }

    #[tokio::test]
    async fn test_cancelled_pends_while_active() {
        let token = ShutdownToken::new();
        let result = tokio::time::timeout(Duration::from_millis(250), token.cancelled()).await;
        assert!(result.is_err());
    }
}
