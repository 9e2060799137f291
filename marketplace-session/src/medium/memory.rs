//! In-process shared medium
//!
//! Several `MemoryMedium` handles can share one map, each writing as its own
//! context — the same shape as browser tabs sharing `localStorage`.

use std::collections::{HashMap, VecDeque};
use std::sync::Arc;
use std::time::Duration;

use async_trait::async_trait;
use parking_lot::{Mutex, RwLock};
use tokio::sync::broadcast;
use tracing::debug;

use crate::error::{Result, SessionError};

use super::{ContextId, StorageChange, StorageMedium};

#[derive(Debug, Default)]
struct Faults {
    deny_reads: bool,
    deny_writes: bool,
    write_delays: VecDeque<Duration>,
}

struct Shared {
    entries: RwLock<HashMap<String, String>>,
    changes: broadcast::Sender<StorageChange>,
    faults: Mutex<Faults>,
}

/// Shared in-memory medium, one handle per context
#[derive(Clone)]
pub struct MemoryMedium {
    shared: Arc<Shared>,
    context: ContextId,
}

impl MemoryMedium {
    pub fn new() -> Self {
        Self::with_capacity(256)
    }

    /// `capacity` bounds how far a slow subscriber may lag
    pub fn with_capacity(capacity: usize) -> Self {
        let (changes, _) = broadcast::channel(capacity.max(1));
        Self {
            shared: Arc::new(Shared {
                entries: RwLock::new(HashMap::new()),
                changes,
                faults: Mutex::new(Faults::default()),
            }),
            context: ContextId::new(),
        }
    }

    /// Another execution context on the same storage
    pub fn open_context(&self) -> Self {
        Self {
            shared: Arc::clone(&self.shared),
            context: ContextId::new(),
        }
    }

    /// Write without a context, like a hand edit in dev tools
    pub fn write_raw(&self, key: &str, value: Option<&str>) {
        let changed = {
            let mut entries = self.shared.entries.write();
            match value {
                Some(v) => entries.insert(key.to_string(), v.to_string()).as_deref() != Some(v),
                None => entries.remove(key).is_some(),
            }
        };
        if changed {
            let _ = self.shared.changes.send(StorageChange { key: key.to_string(), origin: None });
        }
    }

    /// Current value, bypassing faults
    pub fn read_raw(&self, key: &str) -> Option<String> {
        self.shared.entries.read().get(key).cloned()
    }

    pub fn deny_reads(&self, deny: bool) {
        self.shared.faults.lock().deny_reads = deny;
    }

    pub fn deny_writes(&self, deny: bool) {
        self.shared.faults.lock().deny_writes = deny;
    }

    /// Latency for upcoming writes, consumed one per write in order
    pub fn queue_write_delays(&self, delays: impl IntoIterator<Item = Duration>) {
        self.shared.faults.lock().write_delays.extend(delays);
    }

    fn check_writable(&self) -> Result<Option<Duration>> {
        let mut faults = self.shared.faults.lock();
        if faults.deny_writes {
            return Err(SessionError::Storage("write denied".into()));
        }
        Ok(faults.write_delays.pop_front())
    }

    fn notify(&self, key: &str) {
        // No subscribers is not an error
        let _ = self.shared.changes.send(StorageChange {
            key: key.to_string(),
            origin: Some(self.context),
        });
    }
}

impl Default for MemoryMedium {
    fn default() -> Self {
        Self::new()
    }
}

#[async_trait]
impl StorageMedium for MemoryMedium {
    fn context(&self) -> ContextId {
        self.context
    }

    async fn get(&self, key: &str) -> Result<Option<String>> {
        if self.shared.faults.lock().deny_reads {
            return Err(SessionError::Storage("read denied".into()));
        }
        Ok(self.shared.entries.read().get(key).cloned())
    }

    async fn set(&self, key: &str, value: &str) -> Result<()> {
        if let Some(delay) = self.check_writable()? {
            tokio::time::sleep(delay).await;
        }
        let changed = {
            let mut entries = self.shared.entries.write();
            entries.insert(key.to_string(), value.to_string()).as_deref() != Some(value)
        };
        debug!(key, context = %self.context, changed, "memory set");
        if changed {
            self.notify(key);
        }
        Ok(())
    }

    async fn remove(&self, key: &str) -> Result<()> {
        if let Some(delay) = self.check_writable()? {
            tokio::time::sleep(delay).await;
        }
        let removed = self.shared.entries.write().remove(key).is_some();
        debug!(key, context = %self.context, removed, "memory remove");
        if removed {
            self.notify(key);
        }
        Ok(())
    }

    async fn remove_if(&self, key: &str, expected: &str) -> Result<bool> {
        if let Some(delay) = self.check_writable()? {
            tokio::time::sleep(delay).await;
        }
        let removed = {
            let mut entries = self.shared.entries.write();
            if entries.get(key).map(String::as_str) == Some(expected) {
                entries.remove(key).is_some()
            } else {
                false
            }
        };
        debug!(key, context = %self.context, removed, "memory conditional remove");
        if removed {
            self.notify(key);
        }
        Ok(removed)
    }

    fn subscribe(&self) -> broadcast::Receiver<StorageChange> {
        self.shared.changes.subscribe()
    }
}
