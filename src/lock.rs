//! Advisory lock on the output directory.
//!
//! Two runs writing the same output tree would interleave chunk files and
//! commits, so each run holds an exclusive flock on `<output>/.blockhub.lock`.

use anyhow::{Context, Result};
use fs2::FileExt;
use std::fs::{self, File, OpenOptions};
use std::os::unix::fs::PermissionsExt;
use std::path::{Path, PathBuf};

pub const LOCK_FILE: &str = ".blockhub.lock";

/// Holds the output lock until dropped
#[derive(Debug)]
pub struct LockGuard {
    _file: File,
    path: PathBuf,
}

impl LockGuard {
    /// Lock `output_dir`, creating it if needed.
    /// Fails immediately if another run holds the lock.
    pub fn acquire(output_dir: &Path) -> Result<Self> {
        fs::create_dir_all(output_dir)
            .with_context(|| format!("Failed to create output directory {:?}", output_dir))?;
        let path = output_dir.join(LOCK_FILE);

        // create+read+write without truncate: no race between creation and locking
        let file = OpenOptions::new()
            .read(true)
            .write(true)
            .create(true)
            .truncate(false)
            .open(&path)
            .with_context(|| format!("Failed to open lock file {:?}", path))?;

        fs::set_permissions(&path, fs::Permissions::from_mode(0o600))
            .context("Failed to set lock file permissions")?;

        file.try_lock_exclusive().map_err(|_| {
            anyhow::anyhow!(
                "Another blockhub run is using {:?}.\n\
                 Wait for it to finish, or remove {:?} if no run is active.",
                output_dir,
                path
            )
        })?;

        Ok(Self { _file: file, path })
    }

    pub fn path(&self) -> &Path {
        &self.path
    }
}
