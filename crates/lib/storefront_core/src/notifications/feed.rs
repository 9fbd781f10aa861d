//! Shared notification list with optimistic read acknowledgement.

use std::sync::{Arc, PoisonError, RwLock, RwLockReadGuard, RwLockWriteGuard};

use async_trait::async_trait;
use tracing::{debug, warn};

use super::NotificationError;
use super::list::NotificationList;
use crate::api::ApiError;
use crate::models::{NotificationEvent, NotificationId};

/// Confirms to the backend that a notification has been read.
#[async_trait]
pub trait ReadAcknowledger: Send + Sync {
    async fn acknowledge(&self, id: &NotificationId) -> Result<(), ApiError>;
}

/// A notification list shared between its writers (stream, page actions)
/// and readers. Cloning shares the same list.
#[derive(Clone)]
pub struct NotificationFeed {
    list: Arc<RwLock<NotificationList>>,
    ack: Arc<dyn ReadAcknowledger>,
}

impl NotificationFeed {
    pub fn new(list: NotificationList, ack: Arc<dyn ReadAcknowledger>) -> Self {
        Self {
            list: Arc::new(RwLock::new(list)),
            ack,
        }
    }

    /// Copy of the current list.
    pub fn snapshot(&self) -> NotificationList {
        self.read().clone()
    }

    pub fn unread_count(&self) -> usize {
        self.read().unread_count()
    }

    pub fn len(&self) -> usize {
        self.read().len()
    }

    pub fn is_empty(&self) -> bool {
        self.read().is_empty()
    }

    pub fn get(&self, id: &NotificationId) -> Option<NotificationEvent> {
        self.read().get(id).cloned()
    }

    /// Replace the whole list, e.g. with a freshly fetched one.
    pub fn replace(&self, list: NotificationList) {
        *self.write() = list;
    }

    /// Insert at the front; `false` if the id is already present.
    pub fn prepend(&self, event: NotificationEvent) -> bool {
        self.write().prepend(event)
    }

    /// Mark every notification as read. Local only, the backend is not told.
    pub fn mark_all_as_read(&self) {
        self.write().mark_all_read();
    }

    /// Mark one notification as read, optimistically.
    ///
    /// The flag flips before the backend is contacted. If the backend rejects
    /// the acknowledgement, only this notification's flag is restored to its
    /// prior value and the error is returned. Already-read notifications are
    /// not re-acknowledged.
    pub async fn mark_as_read(&self, id: &NotificationId) -> Result<(), NotificationError> {
        let prior = self
            .write()
            .set_read(id, true)
            .ok_or_else(|| NotificationError::NotFound(id.clone()))?;
        if prior {
            debug!(%id, "notification already read");
            return Ok(());
        }

        match self.ack.acknowledge(id).await {
            Ok(()) => Ok(()),
            Err(e) => {
                warn!(%id, "read acknowledgement failed, rolling back: {e}");
                self.write().set_read(id, prior);
                Err(NotificationError::Ack(e))
            }
        }
    }

    fn read(&self) -> RwLockReadGuard<'_, NotificationList> {
        self.list.read().unwrap_or_else(PoisonError::into_inner)
    }

    fn write(&self) -> RwLockWriteGuard<'_, NotificationList> {
        self.list.write().unwrap_or_else(PoisonError::into_inner)
    }
}
