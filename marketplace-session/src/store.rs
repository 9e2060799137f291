//! SessionStore — the single persisted session record
//!
//! The only component that touches the storage medium. The whole session is
//! one serialized record under one key, so a reader never sees a credential
//! without its role.
//!
//! # Example
//!
//! ```rust,no_run
//! use std::sync::Arc;
//! use marketplace_session::medium::MemoryMedium;
//! use marketplace_session::session::{Role, Session};
//! use marketplace_session::store::SessionStore;
//!
//! #[tokio::main]
//! async fn main() -> marketplace_session::Result<()> {
//!     let store = SessionStore::new(Arc::new(MemoryMedium::new()), "session.v1");
//!
//!     store.set(&Session::new("u1", Role::Client, "opaque-token")).await?;
//!     assert!(store.get().await.is_some());
//!
//!     store.clear().await?;
//!     assert!(store.get().await.is_none());
//!     Ok(())
//! }
//! ```

use std::sync::Arc;

use tokio::sync::broadcast;
use tracing::{debug, warn};

use crate::error::{Result, SessionError};
use crate::medium::{ContextId, StorageChange, StorageMedium};
use crate::schema;
use crate::session::types::Session;

/// Atomic get/set/clear of the session record
#[derive(Clone)]
pub struct SessionStore {
    medium: Arc<dyn StorageMedium>,
    key: String,
}

impl SessionStore {
    pub fn new(medium: Arc<dyn StorageMedium>, key: impl Into<String>) -> Self {
        Self {
            medium,
            key: key.into(),
        }
    }

    pub fn key(&self) -> &str {
        &self.key
    }

    /// Context this store writes as
    pub fn context(&self) -> ContextId {
        self.medium.context()
    }

    /// Read the session, failing closed.
    ///
    /// Unreadable media and malformed records both yield `None`; a malformed
    /// record is cleared so it cannot fail the next read too, unless it was
    /// replaced after being read.
    pub async fn get(&self) -> Option<Session> {
        match self.load().await {
            Ok(session) => session,
            Err(e) => {
                warn!(key = %self.key, error = %e, "Session record unusable, treating as absent");
                None
            }
        }
    }

    /// Read the session, reporting why it is absent.
    ///
    /// Returns `Storage` when the medium cannot be read and
    /// `InvalidSessionRecord` (after clearing the record) when it is malformed.
    pub async fn load(&self) -> Result<Option<Session>> {
        let Some(raw) = self.medium.get(&self.key).await? else {
            return Ok(None);
        };

        match schema::decode(&raw) {
            Ok(session) => Ok(Some(session)),
            Err(e @ SessionError::InvalidSessionRecord(_)) => {
                // Only the bytes just read; a record written meanwhile stays
                match self.medium.remove_if(&self.key, &raw).await {
                    Ok(true) => debug!(key = %self.key, "Malformed record cleared"),
                    Ok(false) => debug!(key = %self.key, "Record replaced before clearing, kept"),
                    Err(clear_err) => {
                        warn!(key = %self.key, error = %clear_err, "Failed to clear malformed record")
                    }
                }
                Err(e)
            }
            Err(e) => Err(e),
        }
    }

    /// Write the whole record in one operation
    pub async fn set(&self, session: &Session) -> Result<()> {
        let raw = schema::encode(session)?;
        self.medium.set(&self.key, &raw).await?;
        debug!(
            key = %self.key,
            subject_id = %session.subject_id,
            role = %session.role,
            credential = %session.credential_fingerprint(),
            "Session record written"
        );
        Ok(())
    }

    pub async fn clear(&self) -> Result<()> {
        self.medium.remove(&self.key).await?;
        debug!(key = %self.key, "Session record cleared");
        Ok(())
    }

    /// Change notifications of the underlying medium
    pub fn changes(&self) -> broadcast::Receiver<StorageChange> {
        self.medium.subscribe()
    }
}
