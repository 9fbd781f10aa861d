//! # storefront_core
//!
//! Core client logic for the storefront: encrypted session storage,
//! authenticated API requests and the live order-notification feed.

pub mod api;
pub mod config;
pub mod models;
pub mod notifications;
pub mod session;

pub use api::{ApiClient, ApiError};
pub use config::ClientConfig;
pub use notifications::{NotificationCenter, NotificationError, NotificationFeed};
pub use session::SessionStore;

/// Returns the crate version.
pub fn version() -> &'static str {
    env!("CARGO_PKG_VERSION")
}
