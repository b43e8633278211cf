//! Per-project sync lock

use crate::error::{ToolingError, ToolingResult};
use fs2::FileExt;
use std::fs::{File, OpenOptions};
use std::path::Path;
use std::time::{Duration, Instant};
use tracing::debug;

const POLL_INTERVAL: Duration = Duration::from_millis(50);

/// Exclusive lock on a project's sync cache, released on drop.
///
/// Acquisition blocks the calling thread; call it from a blocking context.
pub struct SyncLock {
    file: File,
}

impl SyncLock {
    pub fn acquire(path: &Path, timeout: Duration) -> ToolingResult<Self> {
        if let Some(parent) = path.parent() {
            std::fs::create_dir_all(parent)?;
        }

        let file = OpenOptions::new()
            .create(true)
            .read(true)
            .write(true)
            .truncate(false)
            .open(path)
            .map_err(|e| ToolingError::SyncLock(format!("open {}: {}", path.display(), e)))?;

        let start = Instant::now();
        loop {
            if file.try_lock_exclusive().is_ok() {
                debug!("Acquired sync lock {} after {:?}", path.display(), start.elapsed());
                return Ok(Self { file });
            }

            if start.elapsed() >= timeout {
                return Err(ToolingError::SyncLock(format!(
                    "timed out after {}ms waiting for {}",
                    timeout.as_millis(),
                    path.display()
                )));
            }

            std::thread::sleep(POLL_INTERVAL);
        }
    }
}

impl Drop for SyncLock {
    fn drop(&mut self) {
        let _ = self.file.unlock();
    }
}
