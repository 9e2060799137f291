//! SessionSyncListener — forwards session changes made by other contexts
//!
//! Listens on the medium's change channel, ignores its own context's writes
//! and unrelated keys, re-reads the record through the store and hands any
//! identity change to the session actor. Each forwarded change is tagged with
//! the local write counter seen when the notification arrived, so the actor
//! can drop changes that a newer local login/logout already superseded.

use tokio::sync::broadcast::error::RecvError;
use tokio::task::JoinHandle;
use tracing::{debug, info, warn};

use crate::error::SessionError;
use crate::medium::StorageChange;
use crate::session::{SessionHandle, SessionSnapshot};
use crate::store::SessionStore;

/// Spawns the listener task
pub struct SessionSyncListener;

impl SessionSyncListener {
    /// Subscribe immediately and forward changes until stopped
    pub fn spawn(store: SessionStore, session: SessionHandle) -> SyncHandle {
        let changes = store.changes();
        let key = store.key().to_string();
        let task = tokio::spawn(async move {
            let mut changes = changes;
            loop {
                match changes.recv().await {
                    Ok(change) => {
                        if is_relevant(&store, &change) {
                            forward(&store, &session).await;
                        }
                    }
                    Err(RecvError::Lagged(missed)) => {
                        warn!(missed, "Sync listener lagged, re-reading session");
                        forward(&store, &session).await;
                    }
                    Err(RecvError::Closed) => break,
                }
            }
            info!("SessionSyncListener stopped");
        });
        info!(key = %key, "SessionSyncListener spawned");
        SyncHandle { task }
    }
}

fn is_relevant(store: &SessionStore, change: &StorageChange) -> bool {
    change.key == store.key() && change.is_foreign_to(store.context())
}

async fn forward(store: &SessionStore, session: &SessionHandle) {
    // Capture before reading so a local write racing this read is detectable
    let observed = session.current();
    let persisted = store.get().await;
    let incoming = SessionSnapshot::from_session(persisted.as_ref());

    if incoming.same_identity(&observed) {
        debug!("External write left identity unchanged");
        return;
    }

    match session.external_change(persisted, observed.local_writes).await {
        Ok(true) => info!(status = %incoming.status, "External session change applied"),
        Ok(false) => debug!("External session change was a no-op"),
        Err(SessionError::ConcurrentWriteConflict { event_writes, local_writes }) => {
            debug!(event_writes, local_writes, "External change superseded by local write")
        }
        Err(e) => warn!(error = %e, "Failed to forward external session change"),
    }
}

/// Handle to the running listener
pub struct SyncHandle {
    task: JoinHandle<()>,
}

impl SyncHandle {
    pub fn stop(&self) {
        self.task.abort();
    }

    pub fn is_running(&self) -> bool {
        !self.task.is_finished()
    }
}

impl Drop for SyncHandle {
    fn drop(&mut self) {
        self.task.abort();
    }
}
