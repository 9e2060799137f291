//! # Marketplace Session
//!
//! Session lifecycle and role-based route authorization for the freelancer
//! marketplace front end: who the current actor is, how that identity
//! survives reloads and stays consistent across tabs, and whether each
//! navigation may render.
//!
//! ## Architecture
//!
//! ```text
//! ┌─────────────────────────────────────────────┐
//! │               RouteGuard                    │
//! │   (Loading | Render | Redirect per path)    │
//! ├──────────────────────┬──────────────────────┤
//! │   SessionManager     │     RoutePolicy      │
//! │  (actor: restore,    │  (pure rule table,   │
//! │   login, logout)     │   decide)            │
//! ├──────────────────────┴──────────────────────┤
//! │  SessionStore  ◄──── SessionSyncListener    │
//! │  (one record, one key)   (foreign writes)   │
//! ├─────────────────────────────────────────────┤
//! │    StorageMedium (memory | file)            │
//! └─────────────────────────────────────────────┘
//! ```
//!
//! ## Quick Start
//!
//! ```rust,no_run
//! use marketplace_session::{RoutePolicy, SessionConfig, SessionEngine};
//!
//! #[tokio::main]
//! async fn main() -> Result<(), Box<dyn std::error::Error>> {
//!     let config = SessionConfig::new("/var/lib/marketplace");
//!     let engine = SessionEngine::open(&config, RoutePolicy::marketplace()).await?;
//!
//!     // Loading until the persisted session has been read
//!     assert!(engine.guard().guard("/client/projects").is_loading());
//!     engine.restore().await?;
//!
//!     engine
//!         .session()
//!         .login("u-1".into(), "client".into(), "opaque-token".into(), None)
//!         .await?;
//!     println!("{:?}", engine.guard().guard("/login"));
//!     Ok(())
//! }
//! ```
//!
//! ## Guarantees
//!
//! - **Fail-closed**: malformed, partial or unreadable records are Absent
//! - **Atomic persistence**: the session is one record under one key
//! - **Ordered writes**: the last issued login/logout is what persists
//! - **No flash redirects**: the guard answers `Loading` while restoring
//! - **Cross-tab**: logouts and logins in other contexts propagate
//! - **Railway Programming**: operations return `Result<T, SessionError>`

pub mod config;
pub mod engine;
pub mod error;
pub mod guard;
pub mod medium;
pub mod policy;
pub mod schema;
pub mod session;
pub mod store;
pub mod sync;

// Re-exports for convenience
pub use config::SessionConfig;
pub use engine::SessionEngine;
pub use error::{Result, SessionError};
pub use guard::{GuardOutcome, MountedRoute, RouteGuard};
pub use medium::{MemoryMedium, StorageMedium};
pub use policy::{Decision, Redirect, RoutePolicy, RouteRule, Visibility};
pub use session::{Role, Session, SessionEvent, SessionHandle, SessionManager, SessionSnapshot, SessionStatus};
pub use store::SessionStore;
pub use sync::{SessionSyncListener, SyncHandle};

#[cfg(feature = "file-medium")]
pub use medium::FileMedium;
