//! Authenticated HTTP access to the storefront backend.
//!
//! All REST calls go through [`ApiClient::request`], which attaches the
//! bearer token from the [`SessionStore`], fails fast when a required token
//! is missing, and turns non-2xx responses into [`ApiError::Backend`].

pub mod auth;
pub mod notifications;
pub mod orders;

use std::sync::Arc;

use reqwest::{Method, RequestBuilder};
use serde::de::DeserializeOwned;
use serde_json::{Map, Value};
use thiserror::Error;
use tracing::error;
use url::Url;

use crate::config::ClientConfig;
use crate::session::SessionStore;

/// Request-level errors. These propagate to the caller.
#[derive(Debug, Error)]
pub enum ApiError {
    #[error("Authorization header required")]
    AuthRequired,

    #[error("HTTP error: {0}")]
    Http(#[from] reqwest::Error),

    #[error("{message} (status {status})")]
    Backend { status: u16, message: String },

    #[error("Invalid URL: {0}")]
    InvalidUrl(String),

    #[error("Unexpected response: {0}")]
    Decode(String),
}

impl From<url::ParseError> for ApiError {
    fn from(e: url::ParseError) -> Self {
        ApiError::InvalidUrl(e.to_string())
    }
}

/// Whether a request carries the bearer token.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum AuthMode {
    /// Never attach a token.
    None,
    /// Attach the token if one is stored.
    Optional,
    /// Attach the token; fail with [`ApiError::AuthRequired`] if there is none.
    Required,
}

/// Client for the storefront REST API.
#[derive(Clone)]
pub struct ApiClient {
    http: reqwest::Client,
    config: ClientConfig,
    session: Arc<SessionStore>,
}

impl ApiClient {
    pub fn new(config: ClientConfig, session: Arc<SessionStore>) -> Self {
        Self::with_client(reqwest::Client::new(), config, session)
    }

    /// Create a client around an existing `reqwest::Client`.
    ///
    /// The client must not carry a global timeout: it is also used for the
    /// long-lived notification stream.
    pub fn with_client(
        http: reqwest::Client,
        config: ClientConfig,
        session: Arc<SessionStore>,
    ) -> Self {
        Self {
            http,
            config,
            session,
        }
    }

    pub fn config(&self) -> &ClientConfig {
        &self.config
    }

    pub fn session(&self) -> &Arc<SessionStore> {
        &self.session
    }

    pub fn http(&self) -> &reqwest::Client {
        &self.http
    }

    /// `{api_base}/{segments...}` with each segment percent-encoded.
    pub fn endpoint(&self, segments: &[&str]) -> Result<Url, ApiError> {
        let mut url = Url::parse(&self.config.api_base())?;
        url.path_segments_mut()
            .map_err(|_| ApiError::InvalidUrl(self.config.api_base()))?
            .pop_if_empty()
            .extend(segments);
        Ok(url)
    }

    /// Attach the bearer token according to `auth`.
    pub fn authorize(
        &self,
        builder: RequestBuilder,
        auth: AuthMode,
    ) -> Result<RequestBuilder, ApiError> {
        let token = match auth {
            AuthMode::None => None,
            AuthMode::Optional => self.stored_token(),
            AuthMode::Required => Some(self.stored_token().ok_or(ApiError::AuthRequired)?),
        };
        Ok(match token {
            Some(token) => builder.bearer_auth(token),
            None => builder,
        })
    }

    /// Send a JSON request and decode the JSON response as `T`.
    ///
    /// An empty or non-JSON body is treated as `{}`. Non-2xx statuses become
    /// [`ApiError::Backend`] carrying the body's `message` field.
    pub async fn request<T: DeserializeOwned>(
        &self,
        method: Method,
        url: Url,
        body: Option<&Value>,
        auth: AuthMode,
    ) -> Result<T, ApiError> {
        let mut builder = self
            .http
            .request(method.clone(), url.clone())
            .timeout(self.config.request_timeout);
        if let Some(body) = body {
            builder = builder.json(body);
        }
        builder = self.authorize(builder, auth).inspect_err(|e| {
            error!(%method, %url, "API error: {e}");
        })?;

        let response = builder.send().await.inspect_err(|e| {
            error!(%method, %url, "API error: {e}");
        })?;
        let status = response.status();
        let bytes = response.bytes().await.inspect_err(|e| {
            error!(%method, %url, "API error: {e}");
        })?;
        let data: Value =
            serde_json::from_slice(&bytes).unwrap_or_else(|_| Value::Object(Map::new()));

        if !status.is_success() {
            let message = data
                .get("message")
                .and_then(Value::as_str)
                .filter(|m| !m.is_empty())
                .unwrap_or("Request failed")
                .to_string();
            error!(%method, %url, status = status.as_u16(), "API error: {message}");
            return Err(ApiError::Backend {
                status: status.as_u16(),
                message,
            });
        }

        serde_json::from_value(data).map_err(|e| ApiError::Decode(e.to_string()))
    }

    fn stored_token(&self) -> Option<String> {
        self.session.get_token().filter(|t| !t.is_empty())
    }
}
