//! Advisory file locking for the scan-state store.

use crate::Result;
use camino::{Utf8Path, Utf8PathBuf};
use fs4::fs_std::FileExt;
use ohno::IntoAppError;
use std::fs::OpenOptions;

const LOG_TARGET: &str = "     state";

/// RAII guard that holds an exclusive advisory lock on the state store.
///
/// The lock is released when the guard is dropped. Only one indexer
/// process can hold the store at a time; a second `run` or `watch`
/// invocation against the same state path blocks here until the first
/// one finishes.
#[derive(Debug)]
pub struct StateLockGuard(std::fs::File);

impl Drop for StateLockGuard {
    fn drop(&mut self) {
        if let Err(e) = self.0.unlock() {
            log::warn!(target: LOG_TARGET, "Failed to unlock state store: {e}");
        }
    }
}

/// Acquire an exclusive lock next to the state store file.
///
/// The lock file lives at `<db_path>.lock` so that the store file itself
/// can be atomically replaced while the lock is held. Blocks until the
/// lock is available.
pub async fn acquire_state_lock(db_path: &Utf8Path) -> Result<StateLockGuard> {
    let lock_path = Utf8PathBuf::from(format!("{db_path}.lock"));

    let file = OpenOptions::new()
        .write(true)
        .create(true)
        .truncate(false)
        .open(&lock_path)
        .into_app_err_with(|| format!("Failed to open state lock file at '{lock_path}'"))?;

    // fs4 lock acquisition blocks, so push it off the async runtime
    let file = tokio::task::spawn_blocking(move || {
        file.lock_exclusive()
            .into_app_err_with(|| format!("Failed to acquire exclusive lock on state store at '{lock_path}'"))?;
        log::debug!(target: LOG_TARGET, "Acquired state lock at '{lock_path}'");
        Ok::<_, ohno::AppError>(file)
    })
    .await
    .into_app_err("Lock task panicked")??;

    Ok(StateLockGuard(file))
}
