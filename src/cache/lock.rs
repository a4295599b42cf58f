//! Advisory file lock guarding mutations of a cache directory
//!
//! `warm` and `invalidate` hold the exclusive lock for their whole critical
//! section. `status` never takes it.

use crate::error::{SmartCacheError, SmartCacheResult};
use fs2::FileExt;
use std::fs::{File, OpenOptions};
use std::io::ErrorKind;
use std::path::{Path, PathBuf};
use std::time::{Duration, Instant};
use tracing::debug;

/// Delay between lock attempts
const LOCK_RETRY_MS: u64 = 100;

/// Held exclusive lock; released when dropped
#[derive(Debug)]
pub struct CacheLock {
    file: File,
    path: PathBuf,
}

impl CacheLock {
    /// Acquire the exclusive lock at `path`, polling until `timeout` elapses
    pub async fn acquire(path: &Path, timeout: Duration) -> SmartCacheResult<Self> {
        if let Some(parent) = path.parent() {
            tokio::fs::create_dir_all(parent).await.map_err(|e| {
                SmartCacheError::io(format!("creating lock directory {}", parent.display()), e)
            })?;
        }

        let file = OpenOptions::new()
            .read(true)
            .write(true)
            .create(true)
            .truncate(false)
            .open(path)
            .map_err(|e| SmartCacheError::io(format!("opening lock file {}", path.display()), e))?;

        let start = Instant::now();
        loop {
            match file.try_lock_exclusive() {
                Ok(()) => break,
                Err(err) if err.kind() == ErrorKind::WouldBlock => {
                    if start.elapsed() >= timeout {
                        return Err(SmartCacheError::LockTimeout {
                            path: path.to_path_buf(),
                            waited: timeout,
                        });
                    }
                    tokio::time::sleep(Duration::from_millis(LOCK_RETRY_MS)).await;
                }
                Err(err) => {
                    return Err(SmartCacheError::io(
                        format!("locking {}", path.display()),
                        err,
                    ))
                }
            }
        }

        debug!("Acquired cache lock {}", path.display());
        Ok(Self {
            file,
            path: path.to_path_buf(),
        })
    }
}

impl Drop for CacheLock {
    fn drop(&mut self) {
        let _ = FileExt::unlock(&self.file);
        debug!("Released cache lock {}", self.path.display());
    }
}
