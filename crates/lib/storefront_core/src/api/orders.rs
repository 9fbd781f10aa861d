//! Order submission.

use reqwest::Method;
use serde::Deserialize;
use serde_json::Value;
use tracing::{debug, info};

use super::{ApiClient, ApiError, AuthMode};
use crate::models::CachedUserProfile;

/// Response of `POST /orders`.
#[derive(Debug, Clone, Deserialize)]
pub struct OrderCreated {
    #[serde(default)]
    pub message: Option<String>,
    /// The created order and the customer record, as the backend sent them.
    #[serde(default)]
    pub data: Value,
}

impl OrderCreated {
    pub fn user(&self) -> Option<CachedUserProfile> {
        let user = self.data.get("user").filter(|u| u.is_object())?;
        serde_json::from_value(user.clone())
            .inspect_err(|e| debug!("order response user is unreadable: {e}"))
            .ok()
    }
}

impl ApiClient {
    /// Submit an order inquiry. Guests may order, so no token is sent.
    ///
    /// The customer record in the response (`data.user`) replaces the cached
    /// profile for the next form prefill.
    pub async fn create_order(&self, payload: &Value) -> Result<OrderCreated, ApiError> {
        let url = self.endpoint(&["orders"])?;
        let created: OrderCreated = self
            .request(Method::POST, url, Some(payload), AuthMode::None)
            .await?;

        if let Some(user) = created.user() {
            self.session().save_user(&user);
            info!(user_id = ?user.id, "cached customer profile from order");
        }
        Ok(created)
    }
}
