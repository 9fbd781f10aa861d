//! Notification domain models.

use std::fmt;
use std::sync::atomic::{AtomicU64, Ordering};

use chrono::{DateTime, Utc};
use serde::Serialize;
use serde_json::Value;

use super::id_from_value;

/// Source of locally assigned notification ids.
static NEXT_LOCAL_ID: AtomicU64 = AtomicU64::new(1);

/// Identifier of a notification.
///
/// Stream-delivered events carry no id, so one is allocated locally at
/// receipt. Fetched events carry the backend's id. The two spaces are never
/// compared against each other: `Local(5)` and `Remote("5")` are different ids.
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize)]
#[serde(untagged)]
pub enum NotificationId {
    Local(u64),
    Remote(String),
}

impl NotificationId {
    /// Allocate a fresh local id. Monotonic and unique within the process.
    pub fn next_local() -> Self {
        Self::Local(NEXT_LOCAL_ID.fetch_add(1, Ordering::Relaxed))
    }

    pub fn is_local(&self) -> bool {
        matches!(self, Self::Local(_))
    }
}

impl fmt::Display for NotificationId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Local(n) => write!(f, "{n}"),
            Self::Remote(s) => f.write_str(s),
        }
    }
}

impl From<&str> for NotificationId {
    fn from(value: &str) -> Self {
        Self::Remote(value.to_string())
    }
}

impl From<String> for NotificationId {
    fn from(value: String) -> Self {
        Self::Remote(value)
    }
}

/// Order details attached to an order notification.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize)]
pub struct OrderReference {
    pub order_id: Option<String>,
    pub order_code: Option<String>,
    pub customer_name: Option<String>,
    pub product: Option<String>,
    pub quantity: Option<String>,
}

impl OrderReference {
    /// Build from the backend's `order` object, accepting its alternate
    /// field names. Returns `None` for anything that is not a JSON object.
    pub fn from_value(value: &Value) -> Option<Self> {
        let obj = value.as_object()?;
        let text = |keys: &[&str]| {
            keys.iter()
                .filter_map(|k| obj.get(*k))
                .find_map(|v| match v {
                    Value::String(s) if !s.is_empty() => Some(s.clone()),
                    Value::Number(n) => Some(n.to_string()),
                    _ => None,
                })
        };
        Some(Self {
            order_id: obj.get("id").and_then(id_from_value),
            order_code: text(&["order_code"]),
            customer_name: text(&["user_name", "name"]),
            product: text(&["product_name", "product"]),
            quantity: text(&["quantity", "qty"]),
        })
    }
}

/// A single notification as held in a [`NotificationList`](crate::notifications::NotificationList).
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct NotificationEvent {
    pub id: NotificationId,
    pub message: String,
    pub order_reference: Option<OrderReference>,
    pub read: bool,
    pub created_at: DateTime<Utc>,
}

impl NotificationEvent {
    /// A new unread event received now, with a freshly allocated local id.
    pub fn received(message: String, order_reference: Option<OrderReference>) -> Self {
        Self {
            id: NotificationId::next_local(),
            message,
            order_reference,
            read: false,
            created_at: Utc::now(),
        }
    }
}
