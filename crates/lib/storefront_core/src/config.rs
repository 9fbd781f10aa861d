//! Client configuration.

use std::path::PathBuf;
use std::time::Duration;

/// Default backend origin.
pub const DEFAULT_BASE_URL: &str = "http://127.0.0.1:8080";

/// Default passphrase for at-rest encryption of the session.
pub const DEFAULT_SECRET_KEY: &str = "storefront-default-dev-key-change-in-production";

/// Default timeout for one-shot requests (the push stream has none).
pub const DEFAULT_REQUEST_TIMEOUT_SECS: u64 = 30;

/// Configuration shared by the session store and the API client.
#[derive(Clone, Debug)]
pub struct ClientConfig {
    /// Backend origin, without a trailing slash (e.g. `https://shop.example.com`).
    pub base_url: String,
    /// Passphrase the storage encryption key is derived from.
    pub secret_key: String,
    /// Location of the persisted key-value file.
    pub storage_path: PathBuf,
    /// Timeout applied to one-shot REST requests.
    pub request_timeout: Duration,
}

impl ClientConfig {
    /// Create a configuration for `base_url` with default values elsewhere.
    pub fn new(base_url: &str, secret_key: &str) -> Self {
        Self {
            base_url: base_url.trim_end_matches('/').to_string(),
            secret_key: secret_key.to_string(),
            storage_path: default_storage_path(),
            request_timeout: Duration::from_secs(DEFAULT_REQUEST_TIMEOUT_SECS),
        }
    }

    /// Reads configuration from environment variables with sensible defaults.
    ///
    /// | Variable                     | Default                                   |
    /// |------------------------------|-------------------------------------------|
    /// | `STOREFRONT_BASE_URL`        | `http://127.0.0.1:8080`                   |
    /// | `STOREFRONT_SECRET_KEY`      | development key                           |
    /// | `STOREFRONT_STORAGE_PATH`    | `<data_dir>/storefront/storage.json`      |
    /// | `STOREFRONT_REQUEST_TIMEOUT` | `30` (seconds)                            |
    pub fn from_env() -> Self {
        let base_url =
            std::env::var("STOREFRONT_BASE_URL").unwrap_or_else(|_| DEFAULT_BASE_URL.into());
        let secret_key =
            std::env::var("STOREFRONT_SECRET_KEY").unwrap_or_else(|_| DEFAULT_SECRET_KEY.into());

        let mut config = Self::new(&base_url, &secret_key);
        if let Ok(path) = std::env::var("STOREFRONT_STORAGE_PATH")
            && !path.is_empty()
        {
            config.storage_path = PathBuf::from(path);
        }
        if let Some(secs) = std::env::var("STOREFRONT_REQUEST_TIMEOUT")
            .ok()
            .and_then(|v| v.parse::<u64>().ok())
        {
            config.request_timeout = Duration::from_secs(secs);
        }
        config
    }

    /// Base URL for REST calls.
    pub fn api_base(&self) -> String {
        format!("{}/api", self.base_url)
    }

    /// URL of the server-push notification stream.
    pub fn events_url(&self) -> String {
        format!("{}/events", self.base_url)
    }
}

/// Path to the persisted session file.
fn default_storage_path() -> PathBuf {
    dirs::data_dir()
        .unwrap_or_else(|| PathBuf::from("."))
        .join("storefront")
        .join("storage.json")
}
