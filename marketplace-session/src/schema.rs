//! Persisted session record layout
//!
//! One logical record under one key:
//!
//! ```text
//! {
//!   "subjectId": string,
//!   "role": "client" | "freelancer" | "admin",
//!   "credential": string,
//!   "issuedAt": number | null,
//!   "expiresAt": number | null,
//!   "displayAttributes": { "firstName"?, "lastName"?, "email"? }
//! }
//! ```
//!
//! Decoding is lenient on shape and strict on meaning: every field is read as
//! optional, then validated, so a partial record becomes
//! `InvalidSessionRecord` instead of a half-filled session.

use serde::{Deserialize, Serialize};

use crate::error::{Result, SessionError};
use crate::session::types::{DisplayAttributes, Role, Session};

/// Wire form of the record. All fields optional for validation.
#[derive(Debug, Default, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
struct PersistedSession {
    #[serde(default)]
    subject_id: Option<String>,
    #[serde(default)]
    role: Option<String>,
    #[serde(default)]
    credential: Option<String>,
    #[serde(default)]
    issued_at: Option<i64>,
    #[serde(default)]
    expires_at: Option<i64>,
    #[serde(default)]
    display_attributes: Option<DisplayAttributes>,
}

/// Serialize a session into its single-record form
pub fn encode(session: &Session) -> Result<String> {
    let record = PersistedSession {
        subject_id: Some(session.subject_id.clone()),
        role: Some(session.role.as_str().to_string()),
        credential: Some(session.credential.clone()),
        issued_at: session.issued_at,
        expires_at: session.expires_at,
        display_attributes: Some(session.display_attributes.clone()),
    };
    Ok(serde_json::to_string(&record)?)
}

/// Parse and validate a persisted record
pub fn decode(raw: &str) -> Result<Session> {
    let record: PersistedSession = serde_json::from_str(raw)
        .map_err(|e| SessionError::InvalidSessionRecord(format!("unparseable: {e}")))?;

    let subject_id = non_empty(record.subject_id)
        .ok_or_else(|| SessionError::InvalidSessionRecord("missing subjectId".into()))?;
    let role = record
        .role
        .ok_or_else(|| SessionError::InvalidSessionRecord("missing role".into()))?;
    let role = Role::from_wire(&role)
        .ok_or_else(|| SessionError::InvalidSessionRecord(format!("unknown role {role:?}")))?;
    let credential = non_empty(record.credential)
        .ok_or_else(|| SessionError::InvalidSessionRecord("missing credential".into()))?;

    if let (Some(issued), Some(expires)) = (record.issued_at, record.expires_at) {
        if expires < issued {
            return Err(SessionError::InvalidSessionRecord(
                "expiresAt precedes issuedAt".into(),
            ));
        }
    }

    Ok(Session {
        subject_id,
        role,
        credential,
        display_attributes: record.display_attributes.unwrap_or_default(),
        issued_at: record.issued_at,
        expires_at: record.expires_at,
    })
}

fn non_empty(value: Option<String>) -> Option<String> {
    value.filter(|v| !v.trim().is_empty())
}
