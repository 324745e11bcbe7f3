//! Per-destination serialization of header installs.

use std::collections::HashMap;
use std::path::{Path, PathBuf};
use std::sync::{Arc, Mutex, OnceLock, PoisonError};
use tokio::sync::{Mutex as AsyncMutex, OwnedMutexGuard};

type LockTable = Mutex<HashMap<PathBuf, Arc<AsyncMutex<()>>>>;

fn table() -> &'static LockTable {
    static TABLE: OnceLock<LockTable> = OnceLock::new();
    TABLE.get_or_init(Default::default)
}

/// Exclusive write access to one destination directory.
///
/// Released when dropped. The table entry goes with the last guard or
/// waiter for that destination, so the table only holds destinations that
/// are in use.
#[derive(Debug)]
pub(crate) struct DestinationGuard {
    guard: Option<OwnedMutexGuard<()>>,
    destination: PathBuf,
}

impl Drop for DestinationGuard {
    fn drop(&mut self) {
        drop(self.guard.take());

        let mut table = table().lock().unwrap_or_else(PoisonError::into_inner);
        let unused = table
            .get(&self.destination)
            .is_some_and(|mutex| Arc::strong_count(mutex) == 1);
        if unused {
            table.remove(&self.destination);
        }
    }
}

/// Wait until no other run in this process is writing to `destination`.
pub(crate) async fn lock_destination(destination: &Path) -> DestinationGuard {
    let mutex = {
        let mut table = table().lock().unwrap_or_else(PoisonError::into_inner);
        table
            .entry(destination.to_path_buf())
            .or_default()
            .clone()
    };

    if mutex.try_lock().is_err() {
        tracing::debug!(
            destination = %destination.display(),
            "waiting for another install into the same destination"
        );
    }

    DestinationGuard {
        guard: Some(mutex.lock_owned().await),
        destination: destination.to_path_buf(),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::sync::atomic::{AtomicUsize, Ordering};
    use std::time::Duration;

    #[tokio::test(flavor = "multi_thread", worker_threads = 4)]
    async fn test_same_destination_is_serialized() {
        let dest = PathBuf::from("/virtual/lock-test/python39");
        let active = Arc::new(AtomicUsize::new(0));
        let max_seen = Arc::new(AtomicUsize::new(0));

        let tasks: Vec<_> = (0..4)
            .map(|_| {
                let dest = dest.clone();
                let active = active.clone();
                let max_seen = max_seen.clone();
                tokio::spawn(async move {
                    let _guard = lock_destination(&dest).await;
                    let now = active.fetch_add(1, Ordering::SeqCst) + 1;
                    max_seen.fetch_max(now, Ordering::SeqCst);
                    tokio::time::sleep(Duration::from_millis(20)).await;
                    active.fetch_sub(1, Ordering::SeqCst);
                })
            })
            .collect();

        for task in tasks {
            task.await.unwrap();
        }
        assert_eq!(max_seen.load(Ordering::SeqCst), 1);
    }

    #[tokio::test]
    async fn test_different_destinations_do_not_block() {
        let _a = lock_destination(Path::new("/virtual/lock-test/a")).await;
        let acquired = tokio::time::timeout(
            Duration::from_millis(200),
            lock_destination(Path::new("/virtual/lock-test/b")),
        )
        .await;
        assert!(acquired.is_ok());
    }

    #[tokio::test]
    async fn test_guard_release_on_drop() {
        let path = Path::new("/virtual/lock-test/reuse");
        drop(lock_destination(path).await);
        let again = tokio::time::timeout(Duration::from_millis(200), lock_destination(path)).await;
        assert!(again.is_ok());
    }

    fn tracked(path: &Path) -> bool {
        table()
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .contains_key(path)
    }

    #[tokio::test]
    async fn test_entry_removed_after_last_guard() {
        let path = Path::new("/virtual/lock-test/cleanup");
        let first = lock_destination(path).await;
        assert!(tracked(path));

        let waiter = tokio::spawn(async move {
            let _second = lock_destination(path).await;
        });
        tokio::time::sleep(Duration::from_millis(50)).await;
        drop(first);
        assert!(tracked(path), "entry removed while a waiter still uses it");

        waiter.await.unwrap();
        assert!(!tracked(path));
    }
}
