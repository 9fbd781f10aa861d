//! Decoding of identity claims from the stored JWT.
//!
//! The signature is NOT verified here. Claims drive UI decisions only
//! (menu visibility, role-gated screens); the backend re-validates the
//! token on every request and is the sole authorization boundary.

use base64::Engine;
use base64::engine::general_purpose::URL_SAFE_NO_PAD;
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use serde_json::{Map, Value};

use super::SessionError;

/// Identity used when nobody is signed in.
pub const GUEST: &str = "guest";

/// Claims decoded from the token payload.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct UserClaims {
    #[serde(default, deserialize_with = "crate::models::string_or_number")]
    pub user_id: Option<String>,
    #[serde(default)]
    pub role: Option<String>,
    /// Expiry (unix timestamp).
    #[serde(default)]
    pub exp: Option<i64>,
    /// Remaining claims, untouched.
    #[serde(flatten)]
    pub extra: Map<String, Value>,
}

impl UserClaims {
    /// Whether `exp` lies in the past. Tokens without `exp` never expire here.
    pub fn is_expired(&self, now: DateTime<Utc>) -> bool {
        self.exp.is_some_and(|exp| exp <= now.timestamp())
    }

    /// Whether the claimed role matches `role` (case-insensitive).
    ///
    /// For deciding what to show, never what to allow.
    pub fn has_role(&self, role: &str) -> bool {
        self.role
            .as_deref()
            .is_some_and(|r| r.eq_ignore_ascii_case(role))
    }
}

/// The `(user_id, role)` pair a notification subscription is opened for.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct SessionIdentity {
    pub user_id: String,
    pub role: String,
}

impl SessionIdentity {
    pub fn guest() -> Self {
        Self {
            user_id: GUEST.to_string(),
            role: GUEST.to_string(),
        }
    }

    /// Identity from decoded claims, falling back to `guest` per field.
    pub fn from_claims(claims: Option<&UserClaims>) -> Self {
        let user_id = claims
            .and_then(|c| c.user_id.clone())
            .unwrap_or_else(|| GUEST.to_string());
        let role = claims
            .and_then(|c| c.role.clone())
            .filter(|r| !r.is_empty())
            .unwrap_or_else(|| GUEST.to_string());
        Self { user_id, role }
    }

    pub fn is_guest(&self) -> bool {
        self.user_id == GUEST
    }
}

/// Decode the payload segment of a JWT without checking its signature.
pub fn decode_claims(token: &str) -> Result<UserClaims, SessionError> {
    let payload_b64 = token
        .split('.')
        .nth(1)
        .filter(|s| !s.is_empty())
        .ok_or_else(|| SessionError::Decode("missing payload segment".into()))?;

    let payload = URL_SAFE_NO_PAD
        .decode(payload_b64.trim_end_matches('='))
        .map_err(|e| SessionError::Decode(format!("invalid base64url: {e}")))?;

    serde_json::from_slice(&payload)
        .map_err(|e| SessionError::Decode(format!("invalid claims json: {e}")))
}
