//! One-shot notification endpoints.

use async_trait::async_trait;
use reqwest::Method;
use serde_json::Value;
use tracing::debug;

use super::{ApiClient, ApiError, AuthMode};
use crate::models::NotificationId;
use crate::notifications::{NotificationList, ReadAcknowledger, normalize_list};

impl ApiClient {
    /// Existing notifications of `user_id`, in backend order.
    pub async fn fetch_initial(&self, user_id: &str) -> Result<NotificationList, ApiError> {
        let mut url = self.endpoint(&["notification"])?;
        url.query_pairs_mut().append_pair("user_id", user_id);
        let body: Value = self.request(Method::GET, url, None, AuthMode::Required).await?;
        let list = normalize_list(&body["data"]);
        debug!(user_id, count = list.len(), "fetched notifications");
        Ok(list)
    }

    /// Every user's notifications (admin view).
    pub async fn fetch_admin(&self) -> Result<NotificationList, ApiError> {
        let url = self.endpoint(&["notification", "admin"])?;
        let body: Value = self.request(Method::GET, url, None, AuthMode::Required).await?;
        Ok(normalize_list(&body["data"]))
    }

    /// `PATCH /notification/{id}/read`.
    pub async fn acknowledge_read(&self, id: &NotificationId) -> Result<(), ApiError> {
        let id = id.to_string();
        let url = self.endpoint(&["notification", &id, "read"])?;
        let _: Value = self
            .request(Method::PATCH, url, None, AuthMode::Required)
            .await?;
        Ok(())
    }
}

#[async_trait]
impl ReadAcknowledger for ApiClient {
    async fn acknowledge(&self, id: &NotificationId) -> Result<(), ApiError> {
        self.acknowledge_read(id).await
    }
}
