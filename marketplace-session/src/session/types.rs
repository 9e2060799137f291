//! Session domain types — Role, Session, SessionSnapshot, SessionEvent
//!
//! Snapshots are immutable values: cheap to clone, safe to hand to any
//! consumer. Only the session actor constructs new ones.

use std::fmt;
use std::str::FromStr;

use chrono::Utc;
use serde::{Deserialize, Serialize};
use sha2::{Digest, Sha256};

use crate::error::SessionError;

/// Marketplace actor roles
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Role {
    Client,
    Freelancer,
    Admin,
}

impl Role {
    pub const ALL: [Role; 3] = [Role::Client, Role::Freelancer, Role::Admin];

    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Client => "client",
            Self::Freelancer => "freelancer",
            Self::Admin => "admin",
        }
    }

    /// Exact wire name only, as written to persisted records.
    /// `FromStr` is the lenient parse used for login input.
    pub fn from_wire(name: &str) -> Option<Self> {
        Self::ALL.into_iter().find(|role| role.as_str() == name)
    }
}

impl FromStr for Role {
    type Err = SessionError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.trim().to_lowercase().as_str() {
            "client" => Ok(Self::Client),
            "freelancer" => Ok(Self::Freelancer),
            "admin" => Ok(Self::Admin),
            _ => Err(SessionError::InvalidRole(s.to_string())),
        }
    }
}

impl fmt::Display for Role {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Non-authoritative UI fields. Never consulted for authorization.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct DisplayAttributes {
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub first_name: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub last_name: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub email: Option<String>,
}

impl DisplayAttributes {
    pub fn is_empty(&self) -> bool {
        self.first_name.is_none() && self.last_name.is_none() && self.email.is_none()
    }
}

/// The authenticated actor's identity
#[derive(Clone, PartialEq, Eq)]
pub struct Session {
    pub subject_id: String,
    pub role: Role,
    pub credential: String,
    pub display_attributes: DisplayAttributes,
    /// Unix epoch milliseconds
    pub issued_at: Option<i64>,
    /// Unix epoch milliseconds; None never expires
    pub expires_at: Option<i64>,
}

impl Session {
    pub fn new(subject_id: impl Into<String>, role: Role, credential: impl Into<String>) -> Self {
        Self {
            subject_id: subject_id.into(),
            role,
            credential: credential.into(),
            display_attributes: DisplayAttributes::default(),
            issued_at: None,
            expires_at: None,
        }
    }

    pub fn with_display(mut self, display: DisplayAttributes) -> Self {
        self.display_attributes = display;
        self
    }

    pub fn with_expiry(mut self, issued_at: Option<i64>, expires_at: Option<i64>) -> Self {
        self.issued_at = issued_at;
        self.expires_at = expires_at;
        self
    }

    /// Expired relative to `now_ms`. Sessions without `expires_at` never expire.
    pub fn is_expired_at(&self, now_ms: i64) -> bool {
        self.expires_at.is_some_and(|exp| exp <= now_ms)
    }

    pub fn is_expired(&self) -> bool {
        self.is_expired_at(Utc::now().timestamp_millis())
    }

    /// Full name, falling back to email, then subject id
    pub fn display_name(&self) -> String {
        let d = &self.display_attributes;
        let name = [d.first_name.as_deref(), d.last_name.as_deref()]
            .into_iter()
            .flatten()
            .collect::<Vec<_>>()
            .join(" ");
        if !name.trim().is_empty() {
            name.trim().to_string()
        } else if let Some(email) = &d.email {
            email.clone()
        } else {
            self.subject_id.clone()
        }
    }

    /// Short digest of the credential, safe for logs
    pub fn credential_fingerprint(&self) -> String {
        let digest = Sha256::digest(self.credential.as_bytes());
        digest.iter().take(6).map(|b| format!("{b:02x}")).collect()
    }
}

impl fmt::Debug for Session {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Session")
            .field("subject_id", &self.subject_id)
            .field("role", &self.role)
            .field("credential", &"<redacted>")
            .field("display_attributes", &self.display_attributes)
            .field("issued_at", &self.issued_at)
            .field("expires_at", &self.expires_at)
            .finish()
    }
}

/// Lifecycle state of the session actor
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum SessionStatus {
    Restoring,
    Authenticated,
    Unauthenticated,
}

impl SessionStatus {
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Restoring => "restoring",
            Self::Authenticated => "authenticated",
            Self::Unauthenticated => "unauthenticated",
        }
    }
}

impl fmt::Display for SessionStatus {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Immutable point-in-time view of the session
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct SessionSnapshot {
    pub status: SessionStatus,
    pub role: Option<Role>,
    pub subject_id: Option<String>,
    pub display: Option<DisplayAttributes>,
    /// Bumped on every publication
    pub revision: u64,
    /// Successful local writes at the time of publication
    pub local_writes: u64,
}

impl SessionSnapshot {
    pub fn restoring() -> Self {
        Self {
            status: SessionStatus::Restoring,
            role: None,
            subject_id: None,
            display: None,
            revision: 0,
            local_writes: 0,
        }
    }

    pub fn unauthenticated() -> Self {
        Self {
            status: SessionStatus::Unauthenticated,
            ..Self::restoring()
        }
    }

    pub fn authenticated(session: &Session) -> Self {
        Self {
            status: SessionStatus::Authenticated,
            role: Some(session.role),
            subject_id: Some(session.subject_id.clone()),
            display: (!session.display_attributes.is_empty())
                .then(|| session.display_attributes.clone()),
            revision: 0,
            local_writes: 0,
        }
    }

    /// Snapshot of an optional session (Absent → unauthenticated)
    pub fn from_session(session: Option<&Session>) -> Self {
        session.map_or_else(Self::unauthenticated, Self::authenticated)
    }

    pub fn is_authenticated(&self) -> bool {
        self.status == SessionStatus::Authenticated && self.role.is_some()
    }

    pub fn is_restoring(&self) -> bool {
        self.status == SessionStatus::Restoring
    }

    /// Role, only when authenticated
    pub fn authenticated_role(&self) -> Option<Role> {
        if self.is_authenticated() {
            self.role
        } else {
            None
        }
    }

    /// Same status, role and subject (counters and display ignored)
    pub fn same_identity(&self, other: &SessionSnapshot) -> bool {
        self.status == other.status && self.role == other.role && self.subject_id == other.subject_id
    }

    pub(crate) fn with_counters(mut self, revision: u64, local_writes: u64) -> Self {
        self.revision = revision;
        self.local_writes = local_writes;
        self
    }
}

/// Published whenever the actor's snapshot changes
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum SessionEvent {
    Restored(SessionSnapshot),
    LoggedIn(SessionSnapshot),
    LoggedOut(SessionSnapshot),
    ExternallyChanged(SessionSnapshot),
}

impl SessionEvent {
    pub fn snapshot(&self) -> &SessionSnapshot {
        match self {
            Self::Restored(s) | Self::LoggedIn(s) | Self::LoggedOut(s) | Self::ExternallyChanged(s) => s,
        }
    }

    pub fn kind(&self) -> &'static str {
        match self {
            Self::Restored(_) => "restored",
            Self::LoggedIn(_) => "logged_in",
            Self::LoggedOut(_) => "logged_out",
            Self::ExternallyChanged(_) => "externally_changed",
        }
    }
}
