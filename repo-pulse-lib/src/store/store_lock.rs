use crate::Result;
use fs4::fs_std::FileExt;
use ohno::IntoAppError;
use std::fs::{File, OpenOptions};
use std::path::Path;

const LOG_TARGET: &str = "     store";

/// Guard that releases the data directory lock when dropped.
#[derive(Debug)]
pub struct StoreLockGuard(File);

impl Drop for StoreLockGuard {
    fn drop(&mut self) {
        if let Err(e) = FileExt::unlock(&self.0) {
            log::warn!(target: LOG_TARGET, "Could not unlock data directory: {e:#}");
        }
    }
}

/// Take an exclusive advisory lock on the data directory, waiting for any other holder.
pub async fn acquire_store_lock(data_dir: &Path) -> Result<StoreLockGuard> {
    let lock_path = data_dir.join("store.lock");

    let file = OpenOptions::new()
        .write(true)
        .create(true)
        .truncate(false)
        .open(&lock_path)
        .into_app_err_with(|| format!("opening store lock file at '{}'", lock_path.display()))?;

    let file = tokio::task::spawn_blocking(move || {
        log::debug!(target: LOG_TARGET, "Waiting for store lock at '{}'", lock_path.display());
        FileExt::lock_exclusive(&file)
            .into_app_err_with(|| format!("acquiring exclusive lock on data directory at '{}'", lock_path.display()))?;
        log::debug!(target: LOG_TARGET, "Acquired store lock at '{}'", lock_path.display());
        Ok::<_, ohno::AppError>(file)
    })
    .await
    .into_app_err("lock task panicked")??;

    Ok(StoreLockGuard(file))
}

#[cfg(test)]
#[cfg_attr(coverage_nightly, coverage(off))]
mod tests {
    use super::*;
    use core::sync::atomic::{AtomicBool, Ordering};
    use core::time::Duration;
    use std::sync::Arc;

    #[tokio::test]
    #[cfg_attr(miri, ignore = "Miri cannot call GetTempPathW")]
    async fn test_lock_creates_lock_file() {
        let temp_dir = tempfile::tempdir().unwrap();
        let guard = acquire_store_lock(temp_dir.path()).await.unwrap();
        assert!(temp_dir.path().join("store.lock").exists());
        drop(guard);
    }

    #[tokio::test]
    #[cfg_attr(miri, ignore = "Miri cannot call GetTempPathW")]
    async fn test_lock_can_be_reacquired_after_drop() {
        let temp_dir = tempfile::tempdir().unwrap();
        drop(acquire_store_lock(temp_dir.path()).await.unwrap());
        drop(acquire_store_lock(temp_dir.path()).await.unwrap());
    }

    #[tokio::test]
    #[cfg_attr(miri, ignore = "Miri cannot call GetFullPathNameW")]
    async fn test_lock_in_missing_directory_fails() {
        let result = acquire_store_lock(Path::new("no_such_data_directory_31337")).await;
        let _ = result.unwrap_err();
    }

    #[tokio::test(flavor = "multi_thread", worker_threads = 2)]
    #[cfg_attr(miri, ignore = "Miri cannot call GetTempPathW")]
    async fn test_second_holder_waits_for_release() {
        let temp_dir = tempfile::tempdir().unwrap();
        let dir = temp_dir.path().to_path_buf();
        let released = Arc::new(AtomicBool::new(false));

        let first = acquire_store_lock(&dir).await.unwrap();

        let waiter = {
            let released = Arc::clone(&released);
            tokio::spawn(async move {
                let guard = acquire_store_lock(&dir).await.unwrap();
                assert!(released.load(Ordering::SeqCst));
                drop(guard);
            })
        };

        tokio::time::sleep(Duration::from_millis(50)).await;
        released.store(true, Ordering::SeqCst);
        drop(first);

        waiter.await.unwrap();
    }
}
