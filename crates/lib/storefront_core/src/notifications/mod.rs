//! Order notifications: the shared list, backend normalization, optimistic
//! read acknowledgement and the live event stream.

pub mod alert;
pub mod feed;
pub mod list;
pub mod normalize;
pub mod stream;

use thiserror::Error;

pub use alert::{AlertError, AlertGate, AlertSink, Silent, TerminalBell};
pub use feed::{NotificationFeed, ReadAcknowledger};
pub use list::{NotificationList, ReadFilter};
pub use normalize::{RawNotification, normalize_list};
pub use stream::{NotificationCenter, StreamState, Subscription};

use crate::api::ApiError;
use crate::models::NotificationId;

#[derive(Debug, Error)]
pub enum NotificationError {
    #[error("Notification not found: {0}")]
    NotFound(NotificationId),

    #[error("Notification stream already open")]
    AlreadySubscribed,

    /// The backend rejected a read acknowledgement; the flag was rolled back.
    #[error("Read acknowledgement failed: {0}")]
    Ack(#[source] ApiError),

    #[error(transparent)]
    Api(#[from] ApiError),
}
