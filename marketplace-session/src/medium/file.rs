//! File-backed medium — one JSON file per key
//!
//! Writes go to a temp file in the same directory and are renamed into
//! place, so readers never observe a torn record. Other processes writing
//! the directory are detected by a polling task that digests the watched
//! files. The digest of this handle's latest write is remembered until the
//! poller observes it once, so own writes are not reported back as foreign
//! changes while a later foreign write of the same content still is.

use std::collections::HashMap;
use std::io::ErrorKind;
use std::path::{Path, PathBuf};
use std::sync::Arc;
use std::time::Duration;

use async_trait::async_trait;
use parking_lot::Mutex;
use sha2::{Digest, Sha256};
use tokio::sync::broadcast;
use tokio::task::JoinHandle;
use tracing::{debug, info, warn};
use uuid::Uuid;

use crate::config::SessionConfig;
use crate::error::{Result, SessionError};

use super::{ContextId, StorageChange, StorageMedium};

type ContentDigest = Option<[u8; 32]>;

/// Directory-backed medium with polling change detection
pub struct FileMedium {
    root: PathBuf,
    context: ContextId,
    changes: broadcast::Sender<StorageChange>,
    /// Last digest this handle wrote per key (None = removed)
    own_writes: Arc<Mutex<HashMap<String, ContentDigest>>>,
    /// Serializes this handle's writes so read-compare-delete is atomic
    writes: tokio::sync::Mutex<()>,
    poller: Mutex<Option<JoinHandle<()>>>,
}

impl FileMedium {
    /// Open the medium under `config.storage_dir` and start watching
    /// `config.storage_key`
    pub async fn open(config: &SessionConfig) -> Result<Self> {
        tokio::fs::create_dir_all(&config.storage_dir).await?;
        let (changes, _) = broadcast::channel(config.channel_capacity);
        let medium = Self {
            root: config.storage_dir.clone(),
            context: ContextId::new(),
            changes,
            own_writes: Arc::new(Mutex::new(HashMap::new())),
            writes: tokio::sync::Mutex::new(()),
            poller: Mutex::new(None),
        };
        medium
            .watch(&config.storage_key, config.sync_poll_interval)
            .await;
        info!(path = %medium.root.display(), "File medium opened");
        Ok(medium)
    }

    pub fn root(&self) -> &Path {
        &self.root
    }

    fn path(&self, key: &str) -> PathBuf {
        self.root.join(format!("{key}.json"))
    }

    /// Start (or restart) polling one key for foreign writes
    async fn watch(&self, key: &str, interval: Duration) {
        let path = self.path(key);
        let key = key.to_string();
        let mut last_seen = digest_file(&path).await;
        let changes = self.changes.clone();
        let own_writes = Arc::clone(&self.own_writes);

        let handle = tokio::spawn(async move {
            let mut ticker = tokio::time::interval(interval);
            ticker.set_missed_tick_behavior(tokio::time::MissedTickBehavior::Delay);
            loop {
                ticker.tick().await;
                let current = digest_file(&path).await;
                if current == last_seen {
                    // An own write that left the content unchanged is settled
                    let mut own = own_writes.lock();
                    if own.get(&key) == Some(&current) {
                        own.remove(&key);
                    }
                    continue;
                }
                last_seen = current;
                // Each own write suppresses at most one observed change
                if own_writes.lock().remove(&key) == Some(current) {
                    continue;
                }
                debug!(key = %key, "Foreign write detected");
                let _ = changes.send(StorageChange { key: key.clone(), origin: None });
            }
        });

        if let Some(previous) = self.poller.lock().replace(handle) {
            previous.abort();
        }
    }

    fn remember(&self, key: &str, digest: ContentDigest) {
        self.own_writes.lock().insert(key.to_string(), digest);
    }

    /// Drop a remembered write that never reached the disk
    fn forget(&self, key: &str, digest: ContentDigest) {
        let mut own = self.own_writes.lock();
        if own.get(key) == Some(&digest) {
            own.remove(key);
        }
    }

    async fn unlink(&self, key: &str) -> Result<bool> {
        self.remember(key, None);
        match tokio::fs::remove_file(self.path(key)).await {
            Ok(()) => {
                debug!(key, "file remove");
                self.notify(key);
                Ok(true)
            }
            Err(e) if e.kind() == ErrorKind::NotFound => {
                self.forget(key, None);
                Ok(false)
            }
            Err(e) => {
                self.forget(key, None);
                Err(SessionError::Storage(format!("remove {key}: {e}")))
            }
        }
    }

    fn notify(&self, key: &str) {
        let _ = self.changes.send(StorageChange {
            key: key.to_string(),
            origin: Some(self.context),
        });
    }
}

impl Drop for FileMedium {
    fn drop(&mut self) {
        if let Some(handle) = self.poller.lock().take() {
            handle.abort();
        }
    }
}

#[async_trait]
impl StorageMedium for FileMedium {
    fn context(&self) -> ContextId {
        self.context
    }

    async fn get(&self, key: &str) -> Result<Option<String>> {
        match tokio::fs::read_to_string(self.path(key)).await {
            Ok(raw) => Ok(Some(raw)),
            Err(e) if e.kind() == ErrorKind::NotFound => Ok(None),
            Err(e) => Err(SessionError::Storage(format!("read {key}: {e}"))),
        }
    }

    async fn set(&self, key: &str, value: &str) -> Result<()> {
        let _writing = self.writes.lock().await;
        let target = self.path(key);
        let tmp = self.root.join(format!(".{key}.{}.tmp", Uuid::new_v4().simple()));

        // Remember first so the poller never mistakes this write for a foreign one
        let written = Some(digest(value.as_bytes()));
        self.remember(key, written);

        if let Err(e) = tokio::fs::write(&tmp, value.as_bytes()).await {
            self.forget(key, written);
            return Err(SessionError::Storage(format!("write {key}: {e}")));
        }
        if let Err(e) = tokio::fs::rename(&tmp, &target).await {
            self.forget(key, written);
            if let Err(cleanup) = tokio::fs::remove_file(&tmp).await {
                warn!(error = ?cleanup, "Failed to remove temp file");
            }
            return Err(SessionError::Storage(format!("rename {key}: {e}")));
        }

        debug!(key, "file set");
        self.notify(key);
        Ok(())
    }

    async fn remove(&self, key: &str) -> Result<()> {
        let _writing = self.writes.lock().await;
        self.unlink(key).await.map(|_| ())
    }

    async fn remove_if(&self, key: &str, expected: &str) -> Result<bool> {
        let _writing = self.writes.lock().await;
        if self.get(key).await?.as_deref() != Some(expected) {
            debug!(key, "file changed since read, keeping it");
            return Ok(false);
        }
        self.unlink(key).await
    }

    fn subscribe(&self) -> broadcast::Receiver<StorageChange> {
        self.changes.subscribe()
    }
}

fn digest(bytes: &[u8]) -> [u8; 32] {
    Sha256::digest(bytes).into()
}

async fn digest_file(path: &Path) -> ContentDigest {
    tokio::fs::read(path).await.ok().map(|bytes| digest(&bytes))
}
