use actix_web::web;
use std::sync::Arc;
use std::time::Duration;
use tokio::sync::watch;
use tokio::task::JoinHandle;

use crate::store::ContentStore;

pub const DEFAULT_POLL_INTERVAL: Duration = Duration::from_millis(500);

/// Background task that polls the storage's change marker and reloads the
/// store when another process has written. Local subscribers then get a
/// `ChangeOrigin::Storage` signal. Dropping the handle also stops the task.
pub struct ChangeWatcher {
    stop_tx: watch::Sender<bool>,
    handle: JoinHandle<()>,
}

impl ChangeWatcher {
    /// Must be called from within a Tokio (actix) runtime.
    pub fn spawn(store: Arc<ContentStore>, interval: Duration) -> Self {
        let (stop_tx, stop_rx) = watch::channel(false);
        log::info!("Watching {} for external changes every {:?}.", store.storage_description(), interval);
        let handle = tokio::spawn(run_watcher(store, interval, stop_rx));
        Self { stop_tx, handle }
    }

    pub async fn shutdown(self) {
        let _ = self.stop_tx.send(true);
        if let Err(e) = self.handle.await {
            log::error!("Change watcher task ended abnormally: {}", e);
        }
    }
}

async fn run_watcher(store: Arc<ContentStore>, interval: Duration, mut stop_rx: watch::Receiver<bool>) {
    let mut ticker = tokio::time::interval(interval);
    ticker.set_missed_tick_behavior(tokio::time::MissedTickBehavior::Delay);

    loop {
        tokio::select! {
            _ = ticker.tick() => {
                let store = Arc::clone(&store);
                match web::block(move || store.sync_from_storage()).await {
                    Ok(Ok(true)) => log::debug!("Change watcher reloaded content."),
                    Ok(Ok(false)) => {}
                    Ok(Err(e)) => log::warn!("Change watcher could not check storage: {}", e),
                    Err(e) => log::error!("Blocking error in change watcher: {}", e),
                }
            }
            changed = stop_rx.changed() => {
                // A dropped sender means the watcher handle is gone too.
                if changed.is_err() || *stop_rx.borrow() {
                    log::debug!("Change watcher stopping.");
                    break;
                }
            }
        }
    }
}
