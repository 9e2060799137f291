//! SessionManager — Tokio actor owning the current session
//!
//! All operations are processed sequentially via an mpsc channel, so writes
//! to the `SessionStore` happen strictly in issuance order: the last issued
//! `login`/`logout` is the state that persists, whatever the medium's write
//! latency. Snapshots are published on a `watch` channel (latest value, read
//! without awaiting) and a `broadcast` channel (one event per publication).
//!
//! # Usage
//!
//! ```rust,no_run
//! use std::sync::Arc;
//! use marketplace_session::medium::MemoryMedium;
//! use marketplace_session::session::SessionManager;
//! use marketplace_session::store::SessionStore;
//! use marketplace_session::SessionConfig;
//!
//! #[tokio::main]
//! async fn main() -> Result<(), Box<dyn std::error::Error>> {
//!     let config = SessionConfig::default();
//!     let store = SessionStore::new(Arc::new(MemoryMedium::new()), &config.storage_key);
//!     let handle = SessionManager::spawn(store, &config);
//!
//!     // Once per process, before guarded rendering
//!     handle.restore().await?;
//!
//!     // After the backend accepted the credentials
//!     handle.login("u-42".into(), "client".into(), "opaque-token".into(), None).await?;
//!     assert!(handle.current().is_authenticated());
//!
//!     handle.logout().await?;
//!     Ok(())
//! }
//! ```

use std::time::Duration;

use chrono::Utc;
use tokio::sync::{broadcast, mpsc, oneshot, watch};
use tracing::{debug, info, warn};

use crate::config::SessionConfig;
use crate::error::{Result, SessionError};
use crate::store::SessionStore;

use super::types::*;

// ─── Actor Messages ───

enum SessionMsg {
    Restore {
        reply: oneshot::Sender<SessionSnapshot>,
    },
    Login {
        subject_id: String,
        role: Role,
        credential: String,
        display: Option<DisplayAttributes>,
        reply: oneshot::Sender<Result<SessionSnapshot>>,
    },
    Logout {
        reply: oneshot::Sender<Result<SessionSnapshot>>,
    },
    ExternalChange {
        session: Option<Session>,
        observed_writes: u64,
        reply: oneshot::Sender<Result<bool>>,
    },
}

// ─── Actor ───

/// Session actor — sole owner of the in-memory session and sole writer of
/// the store
pub struct SessionManager {
    store: SessionStore,
    session_ttl: Option<Duration>,
    status: SessionStatus,
    session: Option<Session>,
    revision: u64,
    local_writes: u64,
    snapshot_tx: watch::Sender<SessionSnapshot>,
    events_tx: broadcast::Sender<SessionEvent>,
    rx: mpsc::Receiver<SessionMsg>,
}

impl SessionManager {
    /// Spawn the session actor in the `Restoring` state and return a handle
    pub fn spawn(store: SessionStore, config: &SessionConfig) -> SessionHandle {
        let (tx, rx) = mpsc::channel(config.channel_capacity);
        let (snapshot_tx, snapshot_rx) = watch::channel(SessionSnapshot::restoring());
        let (events_tx, _) = broadcast::channel(config.channel_capacity);

        let actor = Self {
            store,
            session_ttl: config.session_ttl,
            status: SessionStatus::Restoring,
            session: None,
            revision: 0,
            local_writes: 0,
            snapshot_tx,
            events_tx: events_tx.clone(),
            rx,
        };

        tokio::spawn(actor.run());
        info!("SessionManager spawned");
        SessionHandle {
            tx,
            snapshot_rx,
            events_tx,
        }
    }

    /// Main event loop
    async fn run(mut self) {
        while let Some(msg) = self.rx.recv().await {
            match msg {
                SessionMsg::Restore { reply } => {
                    let _ = reply.send(self.handle_restore().await);
                }
                SessionMsg::Login { subject_id, role, credential, display, reply } => {
                    let _ = reply.send(self.handle_login(subject_id, role, credential, display).await);
                }
                SessionMsg::Logout { reply } => {
                    let _ = reply.send(self.handle_logout().await);
                }
                SessionMsg::ExternalChange { session, observed_writes, reply } => {
                    let _ = reply.send(self.handle_external_change(session, observed_writes));
                }
            }
        }
        info!("SessionManager stopped");
    }

    // ─── Handler Implementations ───

    async fn handle_restore(&mut self) -> SessionSnapshot {
        if self.status != SessionStatus::Restoring {
            debug!(status = %self.status, "Restore after resolution, returning current state");
            return self.snapshot();
        }

        let restored = match self.store.get().await {
            Some(session) if session.is_expired() => {
                info!(subject_id = %session.subject_id, "Persisted session expired");
                if let Err(e) = self.store.clear().await {
                    warn!(error = %e, "Failed to clear expired session");
                }
                None
            }
            other => other,
        };

        match &restored {
            Some(session) => info!(
                subject_id = %session.subject_id,
                role = %session.role,
                "Session restored"
            ),
            None => info!("No session to restore"),
        }

        self.apply(restored);
        self.publish(SessionEvent::Restored)
    }

    async fn handle_login(
        &mut self,
        subject_id: String,
        role: Role,
        credential: String,
        display: Option<DisplayAttributes>,
    ) -> Result<SessionSnapshot> {
        if subject_id.trim().is_empty() {
            return Err(SessionError::InvalidSession("subject id is empty".into()));
        }
        if credential.trim().is_empty() {
            return Err(SessionError::InvalidSession("credential is empty".into()));
        }

        let now = Utc::now().timestamp_millis();
        let expires_at = self.session_ttl.map(|ttl| {
            now.saturating_add(i64::try_from(ttl.as_millis()).unwrap_or(i64::MAX))
        });
        let session = Session::new(subject_id, role, credential)
            .with_display(display.unwrap_or_default())
            .with_expiry(Some(now), expires_at);

        // A failed write leaves the current state untouched
        self.store.set(&session).await?;
        self.local_writes += 1;

        info!(
            subject_id = %session.subject_id,
            role = %session.role,
            credential = %session.credential_fingerprint(),
            "Login successful"
        );
        self.apply(Some(session));
        Ok(self.publish(SessionEvent::LoggedIn))
    }

    async fn handle_logout(&mut self) -> Result<SessionSnapshot> {
        let cleared = self.store.clear().await;

        if self.status == SessionStatus::Unauthenticated {
            if let Err(e) = cleared {
                warn!(error = %e, "Clear failed during redundant logout");
            }
            debug!("Logout while unauthenticated");
            return Ok(self.snapshot());
        }

        // Fail closed in memory even when the medium refused the clear
        self.local_writes += 1;
        self.apply(None);
        let snapshot = self.publish(SessionEvent::LoggedOut);

        match cleared {
            Ok(()) => {
                info!("Logout successful");
                Ok(snapshot)
            }
            Err(e) => {
                warn!(error = %e, "Logout could not clear persisted session");
                Err(e)
            }
        }
    }

    fn handle_external_change(
        &mut self,
        session: Option<Session>,
        observed_writes: u64,
    ) -> Result<bool> {
        if observed_writes < self.local_writes {
            warn!(
                event_writes = observed_writes,
                local_writes = self.local_writes,
                "Discarding stale external change"
            );
            return Err(SessionError::ConcurrentWriteConflict {
                event_writes: observed_writes,
                local_writes: self.local_writes,
            });
        }

        if self.status == SessionStatus::Restoring {
            // restore() reads the medium itself
            debug!("External change before restore, ignored");
            return Ok(false);
        }

        let incoming = session.filter(|s| !s.is_expired());
        let next = SessionSnapshot::from_session(incoming.as_ref());
        if next.same_identity(&self.snapshot()) {
            // Same actor: refresh non-authoritative fields without republishing
            if incoming.is_some() {
                self.session = incoming;
            }
            debug!("External change with same identity, no-op");
            return Ok(false);
        }

        match &incoming {
            Some(s) => info!(subject_id = %s.subject_id, role = %s.role, "Adopting external session"),
            None => info!("Session ended in another context"),
        }
        self.apply(incoming);
        self.publish(SessionEvent::ExternallyChanged);
        Ok(true)
    }

    // ─── Helpers ───

    fn apply(&mut self, session: Option<Session>) {
        self.status = if session.is_some() {
            SessionStatus::Authenticated
        } else {
            SessionStatus::Unauthenticated
        };
        self.session = session;
    }

    fn snapshot(&self) -> SessionSnapshot {
        let base = match self.status {
            SessionStatus::Restoring => SessionSnapshot::restoring(),
            _ => SessionSnapshot::from_session(self.session.as_ref()),
        };
        base.with_counters(self.revision, self.local_writes)
    }

    fn publish(&mut self, event: fn(SessionSnapshot) -> SessionEvent) -> SessionSnapshot {
        self.revision += 1;
        let snapshot = self.snapshot();
        self.snapshot_tx.send_replace(snapshot.clone());
        let event = event(snapshot.clone());
        debug!(kind = event.kind(), revision = snapshot.revision, "Snapshot published");
        // No subscribers is fine
        let _ = self.events_tx.send(event);
        snapshot
    }
}

// ─── Handle (client-facing API) ───

/// Cloneable handle to the SessionManager actor
#[derive(Clone)]
pub struct SessionHandle {
    tx: mpsc::Sender<SessionMsg>,
    snapshot_rx: watch::Receiver<SessionSnapshot>,
    events_tx: broadcast::Sender<SessionEvent>,
}

impl SessionHandle {
    /// Resolve the persisted session. Only the first call reads storage.
    pub async fn restore(&self) -> Result<SessionSnapshot> {
        let (reply, rx) = oneshot::channel();
        self.tx
            .send(SessionMsg::Restore { reply })
            .await
            .map_err(|_| SessionError::ActorUnavailable("SessionManager".into()))?;
        rx.await
            .map_err(|_| SessionError::ActorUnavailable("SessionManager dropped".into()))
    }

    /// Start a session for an already verified actor.
    ///
    /// `role` comes from the verification response; anything outside the
    /// marketplace roles is rejected before any state is touched.
    pub async fn login(
        &self,
        subject_id: String,
        role: String,
        credential: String,
        display: Option<DisplayAttributes>,
    ) -> Result<SessionSnapshot> {
        let role: Role = role.parse()?;
        let (reply, rx) = oneshot::channel();
        self.tx
            .send(SessionMsg::Login { subject_id, role, credential, display, reply })
            .await
            .map_err(|_| SessionError::ActorUnavailable("SessionManager".into()))?;
        rx.await
            .map_err(|_| SessionError::ActorUnavailable("SessionManager dropped".into()))?
    }

    pub async fn logout(&self) -> Result<SessionSnapshot> {
        let (reply, rx) = oneshot::channel();
        self.tx
            .send(SessionMsg::Logout { reply })
            .await
            .map_err(|_| SessionError::ActorUnavailable("SessionManager".into()))?;
        rx.await
            .map_err(|_| SessionError::ActorUnavailable("SessionManager dropped".into()))?
    }

    /// Report a session change made by another context.
    ///
    /// `observed_writes` is the `local_writes` counter of the snapshot that
    /// was current when the change was noticed. Returns whether the change
    /// was adopted; a change older than a local write is rejected with
    /// `ConcurrentWriteConflict`.
    pub async fn external_change(
        &self,
        session: Option<Session>,
        observed_writes: u64,
    ) -> Result<bool> {
        let (reply, rx) = oneshot::channel();
        self.tx
            .send(SessionMsg::ExternalChange { session, observed_writes, reply })
            .await
            .map_err(|_| SessionError::ActorUnavailable("SessionManager".into()))?;
        rx.await
            .map_err(|_| SessionError::ActorUnavailable("SessionManager dropped".into()))?
    }

    /// Latest published snapshot
    pub fn current(&self) -> SessionSnapshot {
        self.snapshot_rx.borrow().clone()
    }

    /// Receiver that always holds the latest snapshot
    pub fn watch(&self) -> watch::Receiver<SessionSnapshot> {
        self.snapshot_rx.clone()
    }

    /// One event per publication from now on
    pub fn subscribe(&self) -> broadcast::Receiver<SessionEvent> {
        self.events_tx.subscribe()
    }
}
