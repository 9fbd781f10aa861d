//! Cached user profile used to prefill order forms.

use serde::{Deserialize, Serialize};
use serde_json::{Map, Value};

/// Denormalized snapshot of the signed-in user's profile.
///
/// Written after a profile fetch or an order submission and read back as
/// form prefill data. It may drift from the server until the next refresh.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct CachedUserProfile {
    #[serde(
        default,
        deserialize_with = "super::string_or_number",
        skip_serializing_if = "Option::is_none"
    )]
    pub id: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub name: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub email: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub phone: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub address: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub photo_url: Option<String>,
    /// Any other fields the backend sent (district, coordinates, ...).
    #[serde(flatten)]
    pub extra: Map<String, Value>,
}
