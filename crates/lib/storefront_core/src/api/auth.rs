//! Login, logout and profile synchronisation.

use reqwest::Method;
use serde::Deserialize;
use serde_json::{Value, json};
use tracing::{info, warn};

use super::{ApiClient, ApiError, AuthMode};
use crate::models::CachedUserProfile;

/// Response of `POST /login`.
#[derive(Debug, Clone, Deserialize)]
pub struct LoginResponse {
    #[serde(default)]
    pub token: Option<String>,
    #[serde(default)]
    pub message: Option<String>,
}

#[derive(Debug, Deserialize)]
struct Envelope<T> {
    data: Option<T>,
}

#[derive(Debug, Deserialize)]
struct UserPayload {
    #[serde(default)]
    token: Option<String>,
    #[serde(default)]
    user: Option<CachedUserProfile>,
}

#[derive(Debug, Default, Deserialize)]
struct ActivePayload {
    #[serde(default)]
    is_active: bool,
}

impl ApiClient {
    /// Sign in with phone and password. A returned token is persisted.
    pub async fn login(&self, phone: &str, password: &str) -> Result<LoginResponse, ApiError> {
        let url = self.endpoint(&["login"])?;
        let body = json!({ "phone": phone, "password": password });
        let response: LoginResponse = self
            .request(Method::POST, url, Some(&body), AuthMode::None)
            .await?;

        if let Some(token) = response.token.as_deref().filter(|t| !t.is_empty()) {
            self.session().save_token(token);
            info!("signed in");
        }
        Ok(response)
    }

    /// Whether a token is stored. Says nothing about its validity.
    pub fn is_logged_in(&self) -> bool {
        self.session()
            .get_token()
            .is_some_and(|t| !t.is_empty())
    }

    /// Forget the token. The cached profile stays for form prefill.
    pub fn logout(&self) {
        self.session().clear_session();
        info!("signed out");
    }

    /// Refresh the cached profile of the signed-in user from the backend.
    ///
    /// Saves `data.user` as the cached profile and replaces the stored token
    /// when the backend hands out a different one.
    pub async fn sync_profile(&self) -> Result<CachedUserProfile, ApiError> {
        let user_id = self
            .session()
            .get_user_from_token()
            .and_then(|claims| claims.user_id)
            .ok_or(ApiError::AuthRequired)?;

        let url = self.endpoint(&["users", &user_id])?;
        let envelope: Envelope<UserPayload> = self
            .request(Method::GET, url, None, AuthMode::Required)
            .await?;
        let payload = envelope
            .data
            .ok_or_else(|| ApiError::Decode("response has no data".into()))?;

        if let Some(token) = payload.token.filter(|t| !t.is_empty())
            && self.session().get_token().as_deref() != Some(token.as_str())
        {
            self.session().save_token(&token);
            info!(user_id = %user_id, "stored refreshed token");
        }

        let profile = payload
            .user
            .ok_or_else(|| ApiError::Decode("response has no user".into()))?;
        self.session().save_user(&profile);
        Ok(profile)
    }

    /// Whether the backend reports the account as active. `false` on any error.
    pub async fn check_user_active(&self, user_id: &str) -> bool {
        let result: Result<Envelope<Value>, ApiError> = async {
            let url = self.endpoint(&["users", user_id, "is-active"])?;
            self.request(Method::GET, url, None, AuthMode::Required)
                .await
        }
        .await;
        match result {
            Ok(envelope) => envelope
                .data
                .and_then(|data| serde_json::from_value::<ActivePayload>(data).ok())
                .unwrap_or_default()
                .is_active,
            Err(e) => {
                warn!(user_id, "could not check account status: {e}");
                false
            }
        }
    }
}
