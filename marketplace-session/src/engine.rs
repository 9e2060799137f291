//! SessionEngine — wires store, actor, sync listener and guard together

use std::sync::Arc;

use tracing::info;

use crate::config::SessionConfig;
use crate::error::Result;
use crate::guard::RouteGuard;
use crate::medium::StorageMedium;
use crate::policy::RoutePolicy;
use crate::session::{SessionHandle, SessionManager, SessionSnapshot};
use crate::store::SessionStore;
use crate::sync::{SessionSyncListener, SyncHandle};

/// One execution context's session engine
pub struct SessionEngine {
    store: SessionStore,
    session: SessionHandle,
    guard: RouteGuard,
    sync: SyncHandle,
}

impl SessionEngine {
    /// Start the engine on an existing medium. The session stays in
    /// `Restoring` until [`SessionEngine::restore`] is called.
    pub fn start(config: &SessionConfig, medium: Arc<dyn StorageMedium>, policy: RoutePolicy) -> Self {
        let store = SessionStore::new(medium, config.storage_key.clone());
        let session = SessionManager::spawn(store.clone(), config);
        let sync = SessionSyncListener::spawn(store.clone(), session.clone());
        let guard = RouteGuard::new(session.clone(), Arc::new(policy))
            .with_max_redirect_hops(config.max_redirect_hops);
        info!(key = %config.storage_key, context = %store.context(), "Session engine started");
        Self { store, session, guard, sync }
    }

    /// Start on a file medium under `config.storage_dir`
    #[cfg(feature = "file-medium")]
    pub async fn open(config: &SessionConfig, policy: RoutePolicy) -> Result<Self> {
        let medium = crate::medium::FileMedium::open(config).await?;
        Ok(Self::start(config, Arc::new(medium), policy))
    }

    /// Read the persisted session (first call only)
    pub async fn restore(&self) -> Result<SessionSnapshot> {
        self.session.restore().await
    }

    pub fn session(&self) -> &SessionHandle {
        &self.session
    }

    pub fn guard(&self) -> &RouteGuard {
        &self.guard
    }

    pub fn store(&self) -> &SessionStore {
        &self.store
    }

    /// Stop following other contexts
    pub fn stop_sync(&self) {
        self.sync.stop();
    }
}
