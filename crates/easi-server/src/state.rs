use std::path::{Path, PathBuf};
use std::sync::{Arc, Mutex, MutexGuard, PoisonError};
use std::time::{Duration, SystemTime};
use tokio::sync::broadcast;

/// Shared application state passed to all route handlers.
#[derive(Clone)]
pub struct AppState {
    pub root: PathBuf,
    pub event_tx: broadcast::Sender<()>,
    /// Held across every load-modify-save of an intake manifest, so LCID
    /// allocation sees all earlier writes.
    pub write_lock: Arc<Mutex<()>>,
}

impl AppState {
    pub fn new(root: PathBuf) -> Self {
        let (tx, _) = broadcast::channel(64);
        let state = Self {
            root,
            event_tx: tx.clone(),
            write_lock: Arc::new(Mutex::new(())),
        };

        // Poll intake manifests and broadcast when any of them changes, so
        // edits made through the CLI also reach connected clients.
        // Only spawned inside a Tokio runtime (skipped in sync unit tests).
        if tokio::runtime::Handle::try_current().is_ok() {
            let intakes = easi_core::paths::intakes_dir(&state.root);
            tokio::spawn(async move {
                let mut last = None::<SystemTime>;
                loop {
                    tokio::time::sleep(Duration::from_millis(800)).await;
                    let latest = latest_manifest_mtime(&intakes).await;
                    if latest.is_some() && latest != last {
                        last = latest;
                        let _ = tx.send(());
                    }
                }
            });
        }

        state
    }

    /// Tell subscribers that intake data changed.
    pub fn notify(&self) {
        // No receivers is fine.
        let _ = self.event_tx.send(());
    }
}

/// Take the manifest write lock. A panic in another writer leaves no partial
/// state behind (writes are atomic), so poisoning is ignored.
pub fn lock_writes(lock: &Mutex<()>) -> MutexGuard<'_, ()> {
    lock.lock().unwrap_or_else(PoisonError::into_inner)
}

async fn latest_manifest_mtime(intakes: &Path) -> Option<SystemTime> {
    let mut entries = tokio::fs::read_dir(intakes).await.ok()?;
    let mut latest = None;
    while let Ok(Some(entry)) = entries.next_entry().await {
        let manifest = entry.path().join(easi_core::paths::MANIFEST_FILE);
        if let Ok(mtime) = tokio::fs::metadata(&manifest).await.and_then(|m| m.modified()) {
            latest = latest.max(Some(mtime));
        }
    }
    latest
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn new_state_stores_root() {
        let state = AppState::new(PathBuf::from("/tmp/test"));
        assert_eq!(state.root, PathBuf::from("/tmp/test"));
    }

    #[test]
    fn clones_share_the_write_lock() {
        let state = AppState::new(PathBuf::from("/tmp/test"));
        let clone = state.clone();
        let _guard = lock_writes(&state.write_lock);
        assert!(clone.write_lock.try_lock().is_err());
    }

    #[test]
    fn notify_reaches_subscribers() {
        let state = AppState::new(PathBuf::from("/tmp/test"));
        let mut rx = state.event_tx.subscribe();
        state.notify();
        assert!(rx.try_recv().is_ok());
    }
}
