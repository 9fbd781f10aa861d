//! Client-side domain models.
//!
//! These mirror what the backend sends, but in a canonical shape: ids are
//! strings, timestamps are `chrono` values and optional fields are `Option`.

pub mod notification;
pub mod profile;

pub use notification::{NotificationEvent, NotificationId, OrderReference};
pub use profile::CachedUserProfile;

use serde::{Deserialize, Deserializer};
use serde_json::Value;

/// Render a JSON scalar id (`7`, `"7"`) as a string.
pub(crate) fn id_from_value(value: &Value) -> Option<String> {
    match value {
        Value::String(s) if !s.is_empty() => Some(s.clone()),
        Value::Number(n) => Some(n.to_string()),
        _ => None,
    }
}

/// Deserialize an optional id that the backend may send as a string or a number.
pub(crate) fn string_or_number<'de, D>(deserializer: D) -> Result<Option<String>, D::Error>
where
    D: Deserializer<'de>,
{
    let value = Option::<Value>::deserialize(deserializer)?;
    Ok(value.as_ref().and_then(id_from_value))
}
