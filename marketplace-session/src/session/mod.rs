//! Session module — the current actor's identity and its lifecycle
//!
//! `SessionManager` is the only writer of the persisted record; everything
//! else reads immutable `SessionSnapshot`s.

pub mod types;
pub mod actor;

pub use actor::{SessionHandle, SessionManager};
pub use types::{DisplayAttributes, Role, Session, SessionEvent, SessionSnapshot, SessionStatus};
