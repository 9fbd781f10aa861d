//! Mapping of fetched notifications onto [`NotificationEvent`].
//!
//! The backend has used several spellings for the same fields over time.
//! Every known spelling is listed here, in priority order:
//!
//! | Canonical    | Accepted keys                     | When absent          |
//! |--------------|-----------------------------------|----------------------|
//! | `id`         | `id`, `ID`, `_id`                 | new local id         |
//! | `message`    | `message`, `text`                 | `"-"`                |
//! | `read`       | `read`, `isRead`, `is_read`       | `false`              |
//! | `created_at` | `created_at`, `createdAt`, `time` | time of receipt      |
//! | order        | `order` (object)                  | none                 |
//!
//! The mapping is total: any JSON value yields an event.

use chrono::{DateTime, NaiveDateTime, Utc};
use serde_json::Value;
use tracing::debug;

use super::list::NotificationList;
use crate::models::{NotificationEvent, NotificationId, OrderReference, id_from_value};

const ID_KEYS: &[&str] = &["id", "ID", "_id"];
const MESSAGE_KEYS: &[&str] = &["message", "text"];
const READ_KEYS: &[&str] = &["read", "isRead", "is_read"];
const CREATED_AT_KEYS: &[&str] = &["created_at", "createdAt", "time"];

/// Placeholder for notifications without a message.
pub const EMPTY_MESSAGE: &str = "-";

/// One notification as sent by the backend, any spelling.
#[derive(Debug, Clone, Copy)]
pub struct RawNotification<'a> {
    value: &'a Value,
}

impl<'a> RawNotification<'a> {
    pub fn new(value: &'a Value) -> Self {
        Self { value }
    }

    /// First present, non-null value among `keys`.
    fn field(&self, keys: &[&str]) -> Option<&'a Value> {
        let obj = self.value.as_object()?;
        keys.iter()
            .filter_map(|k| obj.get(*k))
            .find(|v| !v.is_null())
    }

    fn id(&self) -> Option<NotificationId> {
        self.field(ID_KEYS)
            .and_then(id_from_value)
            .map(NotificationId::Remote)
    }

    fn message(&self) -> Option<String> {
        self.field(MESSAGE_KEYS).and_then(text_of)
    }

    fn read(&self) -> Option<bool> {
        self.field(READ_KEYS).and_then(flag_of)
    }

    fn created_at(&self) -> Option<DateTime<Utc>> {
        self.field(CREATED_AT_KEYS).and_then(timestamp_of)
    }

    fn order(&self) -> Option<OrderReference> {
        self.field(&["order"]).and_then(OrderReference::from_value)
    }

    /// Canonical event for this notification.
    pub fn normalize(&self) -> NotificationEvent {
        NotificationEvent {
            id: self.id().unwrap_or_else(NotificationId::next_local),
            message: self.message().unwrap_or_else(|| EMPTY_MESSAGE.to_string()),
            order_reference: self.order(),
            read: self.read().unwrap_or(false),
            created_at: self.created_at().unwrap_or_else(Utc::now),
        }
    }
}

/// Normalize the `data` array of a notification response, keeping backend order.
///
/// Anything other than an array yields an empty list.
pub fn normalize_list(data: &Value) -> NotificationList {
    let Some(items) = data.as_array() else {
        debug!("notification response has no data array");
        return NotificationList::new();
    };
    NotificationList::from_events(items.iter().map(|item| RawNotification::new(item).normalize()))
}

/// Render a scalar as display text.
pub(crate) fn text_of(value: &Value) -> Option<String> {
    match value {
        Value::String(s) => Some(s.clone()),
        Value::Number(n) => Some(n.to_string()),
        Value::Bool(b) => Some(b.to_string()),
        _ => None,
    }
}

fn flag_of(value: &Value) -> Option<bool> {
    match value {
        Value::Bool(b) => Some(*b),
        Value::Number(n) => n.as_i64().map(|n| n != 0),
        Value::String(s) => match s.to_ascii_lowercase().as_str() {
            "true" | "1" => Some(true),
            "false" | "0" => Some(false),
            _ => None,
        },
        _ => None,
    }
}

/// RFC 3339, `YYYY-MM-DD HH:MM:SS` (taken as UTC), or unix milliseconds.
fn timestamp_of(value: &Value) -> Option<DateTime<Utc>> {
    match value {
        Value::String(s) => DateTime::parse_from_rfc3339(s)
            .map(|dt| dt.with_timezone(&Utc))
            .ok()
            .or_else(|| {
                NaiveDateTime::parse_from_str(s, "%Y-%m-%d %H:%M:%S")
                    .ok()
                    .map(|naive| naive.and_utc())
            }),
        Value::Number(n) => n.as_i64().and_then(DateTime::from_timestamp_millis),
        _ => None,
    }
}
