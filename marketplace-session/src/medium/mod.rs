//! Storage media — the persistence capability behind `SessionStore`
//!
//! A medium is a small key/value space shared by one or more execution
//! contexts (tabs, processes). Every write is tagged with the writing
//! context so listeners can ignore their own changes.
//!
//! - [`MemoryMedium`]: in-process map shared between contexts, with fault
//!   injection for tests
//! - [`FileMedium`]: one JSON file per key, atomic rename writes, polling
//!   change detection

pub mod memory;
#[cfg(feature = "file-medium")]
pub mod file;

use std::fmt;

use async_trait::async_trait;
use tokio::sync::broadcast;
use uuid::Uuid;

use crate::error::Result;

pub use memory::MemoryMedium;
#[cfg(feature = "file-medium")]
pub use file::FileMedium;

/// Identity of one execution context attached to a medium
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct ContextId(Uuid);

impl ContextId {
    pub fn new() -> Self {
        Self(Uuid::new_v4())
    }
}

impl Default for ContextId {
    fn default() -> Self {
        Self::new()
    }
}

impl fmt::Display for ContextId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.0.simple())
    }
}

/// Notification that a key changed in the medium
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct StorageChange {
    pub key: String,
    /// Writing context; None when the writer is unknown (e.g. a hand edit)
    pub origin: Option<ContextId>,
}

impl StorageChange {
    /// True unless the change was made by `context` itself
    pub fn is_foreign_to(&self, context: ContextId) -> bool {
        self.origin != Some(context)
    }
}

/// Key/value persistence with change notifications
#[async_trait]
pub trait StorageMedium: Send + Sync {
    /// Context this handle writes as
    fn context(&self) -> ContextId;

    async fn get(&self, key: &str) -> Result<Option<String>>;

    /// Replace the whole value in one write
    async fn set(&self, key: &str, value: &str) -> Result<()>;

    /// Remove the key. Removing a missing key succeeds.
    async fn remove(&self, key: &str) -> Result<()>;

    /// Remove the key only while it still holds `expected`, atomically with
    /// respect to this handle's other writes. Returns whether it was removed.
    async fn remove_if(&self, key: &str, expected: &str) -> Result<bool>;

    /// Change notifications from every context, own writes included
    fn subscribe(&self) -> broadcast::Receiver<StorageChange>;
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_foreign_origin() {
        let me = ContextId::new();
        let other = ContextId::new();
        let own = StorageChange { key: "k".into(), origin: Some(me) };
        assert!(!own.is_foreign_to(me));
        assert!(own.is_foreign_to(other));
        let unknown = StorageChange { key: "k".into(), origin: None };
        assert!(unknown.is_foreign_to(me));
    }
}
