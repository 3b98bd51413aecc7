//! Advisory lock file shared by every process that runs notifications
//! against the same roster.

use crate::utils::error::{NotifierError, Result};
use fs2::FileExt;
use std::fs;
use std::path::{Path, PathBuf};

#[derive(Debug, Clone)]
pub struct RunLock {
    path: PathBuf,
}

/// Holds the exclusive lock until dropped.
#[derive(Debug)]
pub struct RunLockGuard {
    file: fs::File,
}

impl Drop for RunLockGuard {
    fn drop(&mut self) {
        let _ = FileExt::unlock(&self.file);
    }
}

impl RunLock {
    pub fn new(path: impl Into<PathBuf>) -> Self {
        Self { path: path.into() }
    }

    /// `data/birthdays.json` locks on `data/birthdays.lock`.
    pub fn beside(roster_path: &Path) -> Self {
        Self::new(roster_path.with_extension("lock"))
    }

    pub fn path(&self) -> &Path {
        &self.path
    }

    fn open(&self) -> Result<fs::File> {
        if let Some(parent) = self.path.parent().filter(|p| !p.as_os_str().is_empty()) {
            fs::create_dir_all(parent)?;
        }
        Ok(fs::File::create(&self.path)?)
    }

    /// Takes the lock without waiting, or `None` when another holder has it.
    pub fn try_acquire(&self) -> Result<Option<RunLockGuard>> {
        let file = self.open()?;
        match FileExt::try_lock_exclusive(&file) {
            Ok(()) => Ok(Some(RunLockGuard { file })),
            Err(e) if e.raw_os_error() == fs2::lock_contended_error().raw_os_error() => Ok(None),
            Err(e) => Err(NotifierError::IoError(e)),
        }
    }

    /// Waits on a blocking thread until the current holder releases the lock.
    pub async fn acquire(&self) -> Result<RunLockGuard> {
        let file = self.open()?;
        tokio::task::spawn_blocking(move || {
            FileExt::lock_exclusive(&file)?;
            Ok(RunLockGuard { file })
        })
        .await
        .map_err(|e| NotifierError::scheduler(format!("run lock wait failed: {}", e)))?
    }
}
