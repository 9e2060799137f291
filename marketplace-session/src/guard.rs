//! RouteGuard — per-navigation render decision
//!
//! Combines the session actor's latest snapshot with the route policy.
//! While the session is restoring the guard answers `Loading` and never
//! redirects, so a returning user is not bounced to the login page before
//! their session has been read.

use std::sync::Arc;

use tokio::sync::watch;
use tracing::debug;

use crate::error::{Result, SessionError};
use crate::policy::{normalize_path, Decision, Redirect, RoutePolicy};
use crate::session::{SessionHandle, SessionSnapshot};

/// What the view layer should do for a navigation
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum GuardOutcome {
    /// Session still restoring: show a placeholder
    Loading,
    /// Render the (normalized) destination
    Render(String),
    /// Navigate elsewhere without rendering the destination
    Redirect(Redirect),
}

impl GuardOutcome {
    pub fn is_loading(&self) -> bool {
        matches!(self, Self::Loading)
    }

    pub fn redirect(&self) -> Option<&Redirect> {
        match self {
            Self::Redirect(r) => Some(r),
            _ => None,
        }
    }
}

/// Guard for navigations, cheap to clone
#[derive(Clone)]
pub struct RouteGuard {
    session: SessionHandle,
    policy: Arc<RoutePolicy>,
    max_redirect_hops: usize,
}

impl RouteGuard {
    pub fn new(session: SessionHandle, policy: Arc<RoutePolicy>) -> Self {
        Self {
            session,
            policy,
            max_redirect_hops: 8,
        }
    }

    pub fn with_max_redirect_hops(mut self, hops: usize) -> Self {
        self.max_redirect_hops = hops;
        self
    }

    pub fn policy(&self) -> &RoutePolicy {
        &self.policy
    }

    /// Decide one navigation against the current snapshot
    pub fn guard(&self, requested_path: &str) -> GuardOutcome {
        self.evaluate(&self.session.current(), requested_path)
    }

    /// Decide one navigation against a given snapshot
    pub fn evaluate(&self, snapshot: &SessionSnapshot, requested_path: &str) -> GuardOutcome {
        if snapshot.is_restoring() {
            debug!(path = requested_path, "Session restoring, holding navigation");
            return GuardOutcome::Loading;
        }
        match self.policy.decide(snapshot, requested_path) {
            Decision::Allow => GuardOutcome::Render(normalize_path(requested_path)),
            Decision::RedirectTo(redirect) => GuardOutcome::Redirect(redirect),
        }
    }

    /// Follow redirects until something renders (or the session is still
    /// restoring). Exceeding the hop limit reports a misconfigured table.
    pub fn resolve(&self, requested_path: &str) -> Result<GuardOutcome> {
        let snapshot = self.session.current();
        let mut path = requested_path.to_string();
        for _ in 0..=self.max_redirect_hops {
            match self.evaluate(&snapshot, &path) {
                GuardOutcome::Redirect(redirect) => path = redirect.path,
                settled => return Ok(settled),
            }
        }
        Err(SessionError::RedirectLoop {
            path: requested_path.to_string(),
            hops: self.max_redirect_hops,
        })
    }

    /// Keep a route mounted and re-evaluate it as the session changes
    pub fn mount(&self, requested_path: &str) -> MountedRoute {
        let mut snapshots = self.session.watch();
        let snapshot = snapshots.borrow_and_update().clone();
        let outcome = self.evaluate(&snapshot, requested_path);
        MountedRoute {
            guard: self.clone(),
            path: requested_path.to_string(),
            snapshots,
            outcome,
        }
    }
}

/// A route currently on screen
pub struct MountedRoute {
    guard: RouteGuard,
    path: String,
    snapshots: watch::Receiver<SessionSnapshot>,
    outcome: GuardOutcome,
}

impl MountedRoute {
    pub fn path(&self) -> &str {
        &self.path
    }

    pub fn outcome(&self) -> &GuardOutcome {
        &self.outcome
    }

    /// Route change: re-decide for the new path
    pub fn navigate(&mut self, requested_path: &str) -> &GuardOutcome {
        self.path = requested_path.to_string();
        let snapshot = self.snapshots.borrow_and_update().clone();
        self.outcome = self.guard.evaluate(&snapshot, &self.path);
        &self.outcome
    }

    /// Wait for the next published snapshot and re-decide the mounted path
    pub async fn changed(&mut self) -> Result<&GuardOutcome> {
        self.snapshots
            .changed()
            .await
            .map_err(|_| SessionError::ActorUnavailable("SessionManager stopped".into()))?;
        let snapshot = self.snapshots.borrow_and_update().clone();
        self.outcome = self.guard.evaluate(&snapshot, &self.path);
        debug!(path = %self.path, revision = snapshot.revision, "Mounted route re-evaluated");
        Ok(&self.outcome)
    }
}
