//! Ordered, id-unique list of notifications.

use std::str::FromStr;

use serde::Serialize;

use crate::models::{NotificationEvent, NotificationId};

/// Which notifications to show, as on the notification page's tabs.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum ReadFilter {
    #[default]
    All,
    Unread,
    Read,
}

impl ReadFilter {
    pub fn matches(self, event: &NotificationEvent) -> bool {
        match self {
            ReadFilter::All => true,
            ReadFilter::Unread => !event.read,
            ReadFilter::Read => event.read,
        }
    }
}

impl FromStr for ReadFilter {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.to_ascii_lowercase().as_str() {
            "all" => Ok(ReadFilter::All),
            "unread" | "new" => Ok(ReadFilter::Unread),
            "read" => Ok(ReadFilter::Read),
            other => Err(format!("unknown filter '{other}' (expected all, unread or read)")),
        }
    }
}

/// Notifications in display order. No two entries share an id.
#[derive(Debug, Clone, Default, PartialEq, Serialize)]
#[serde(transparent)]
pub struct NotificationList {
    events: Vec<NotificationEvent>,
}

impl NotificationList {
    pub fn new() -> Self {
        Self::default()
    }

    /// Build from events in the given order; later duplicates of an id are dropped.
    pub fn from_events(events: impl IntoIterator<Item = NotificationEvent>) -> Self {
        let mut list = Self::new();
        for event in events {
            if !list.contains(&event.id) {
                list.events.push(event);
            }
        }
        list
    }

    /// Insert `event` at the front (newest first).
    ///
    /// Returns `false`, leaving the list untouched, if the id is already present.
    pub fn prepend(&mut self, event: NotificationEvent) -> bool {
        if self.contains(&event.id) {
            return false;
        }
        self.events.insert(0, event);
        true
    }

    pub fn contains(&self, id: &NotificationId) -> bool {
        self.events.iter().any(|e| &e.id == id)
    }

    pub fn get(&self, id: &NotificationId) -> Option<&NotificationEvent> {
        self.events.iter().find(|e| &e.id == id)
    }

    /// Set the read flag of one event, returning its previous value.
    pub fn set_read(&mut self, id: &NotificationId, read: bool) -> Option<bool> {
        let event = self.events.iter_mut().find(|e| &e.id == id)?;
        Some(std::mem::replace(&mut event.read, read))
    }

    pub fn mark_all_read(&mut self) {
        for event in &mut self.events {
            event.read = true;
        }
    }

    /// Number of unread events, counted on every call.
    pub fn unread_count(&self) -> usize {
        self.events.iter().filter(|e| !e.read).count()
    }

    pub fn len(&self) -> usize {
        self.events.len()
    }

    pub fn is_empty(&self) -> bool {
        self.events.is_empty()
    }

    pub fn iter(&self) -> impl Iterator<Item = &NotificationEvent> {
        self.events.iter()
    }

    pub fn filter(&self, filter: ReadFilter) -> impl Iterator<Item = &NotificationEvent> {
        self.events.iter().filter(move |e| filter.matches(e))
    }

    pub fn as_slice(&self) -> &[NotificationEvent] {
        &self.events
    }
}

impl IntoIterator for NotificationList {
    type Item = NotificationEvent;
    type IntoIter = std::vec::IntoIter<NotificationEvent>;

    fn into_iter(self) -> Self::IntoIter {
        self.events.into_iter()
    }
}
