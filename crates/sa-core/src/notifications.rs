//! # Notification Roster
//!
//! Per-user inbox: newest first, capped at [`ROSTER_LIMIT`], with read/unread
//! tracking. Fetch never fails; any store trouble degrades to an empty roster.

use std::sync::Arc;

use chrono::Utc;
use serde::Serialize;
use serde_json::{Map, Value};

use crate::error::{AppError, Result};
use crate::models::{decode, encode, NewNotification, Notification};
use crate::traits::{DocRef, Document, DocumentStore, Direction, Query, StoreError};

pub const NOTIFICATIONS: &str = "notifications";
pub const ROSTER_LIMIT: usize = 50;

/// Ordered, capped view of one user's notifications.
#[derive(Debug, Clone, Default, PartialEq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct NotificationRoster {
    pub user_id: String,
    pub notifications: Vec<Notification>,
}

impl NotificationRoster {
    pub fn empty(user_id: impl Into<String>) -> Self {
        Self {
            user_id: user_id.into(),
            notifications: Vec::new(),
        }
    }

    /// Always computed from the entries; never cached.
    pub fn unread_count(&self) -> usize {
        self.notifications.iter().filter(|n| !n.read).count()
    }

    pub fn get(&self, id: &str) -> Option<&Notification> {
        self.notifications.iter().find(|n| n.id == id)
    }

    pub fn len(&self) -> usize {
        self.notifications.len()
    }

    pub fn is_empty(&self) -> bool {
        self.notifications.is_empty()
    }
}

/// Outcome of the two-stage roster query.
#[derive(Debug, Clone, PartialEq)]
pub enum RosterQuery {
    /// Store applied ordering and limit.
    Ordered(Vec<Notification>),
    /// Fallback path: everything for the user, still needs sort + truncate.
    Unordered(Vec<Notification>),
    Empty,
}

impl RosterQuery {
    pub fn into_roster(self, user_id: &str) -> NotificationRoster {
        let notifications = match self {
            RosterQuery::Ordered(mut items) => {
                items.truncate(ROSTER_LIMIT);
                items
            }
            RosterQuery::Unordered(mut items) => {
                items.sort_by(|a, b| b.created_at.cmp(&a.created_at));
                items.truncate(ROSTER_LIMIT);
                items
            }
            RosterQuery::Empty => Vec::new(),
        };
        NotificationRoster {
            user_id: user_id.to_string(),
            notifications,
        }
    }
}

pub struct NotificationService {
    store: Arc<dyn DocumentStore>,
}

impl NotificationService {
    pub fn new(store: Arc<dyn DocumentStore>) -> Self {
        Self { store }
    }

    /// Loads the user's roster, falling back to a client-side sort when the
    /// store lacks the `userId + createdAt` index.
    pub async fn fetch(&self, user_id: &str) -> NotificationRoster {
        self.query_roster(user_id).await.into_roster(user_id)
    }

    async fn query_roster(&self, user_id: &str) -> RosterQuery {
        let by_user = Query::collection(NOTIFICATIONS).filter_eq("userId", user_id);
        let ordered = by_user
            .clone()
            .order_by("createdAt", Direction::Descending)
            .limit(ROSTER_LIMIT);

        match self.store.query(&ordered).await {
            Ok(docs) => RosterQuery::Ordered(decode_all(docs)),
            Err(StoreError::MissingIndex { collection }) => {
                log::warn!("missing index on '{collection}', sorting roster for {user_id} client-side");
                match self.store.query(&by_user).await {
                    Ok(docs) => RosterQuery::Unordered(decode_all(docs)),
                    Err(e) => {
                        log::error!("fallback roster query for {user_id} failed: {e}");
                        RosterQuery::Empty
                    }
                }
            }
            Err(e) => {
                log::error!("roster query for {user_id} failed: {e}");
                RosterQuery::Empty
            }
        }
    }

    /// Marks one roster entry read in the store. The caller re-fetches to
    /// see the new unread count.
    pub async fn mark_read(&self, roster: &NotificationRoster, id: &str) -> Result<()> {
        if roster.get(id).is_none() {
            return Err(AppError::NotFound("Notification".into(), id.to_string()));
        }
        self.store
            .update(&DocRef::new(NOTIFICATIONS, id), read_flag())
            .await?;
        Ok(())
    }

    /// Marks every unread entry read in one atomic batch. Returns how many
    /// records were included; already-read entries are never rewritten.
    pub async fn mark_all_read(&self, roster: &NotificationRoster) -> Result<usize> {
        let updates: Vec<(DocRef, Map<String, Value>)> = roster
            .notifications
            .iter()
            .filter(|n| !n.read)
            .map(|n| (DocRef::new(NOTIFICATIONS, &n.id), read_flag()))
            .collect();

        if updates.is_empty() {
            return Ok(0);
        }
        let count = updates.len();
        self.store.batch_update(updates).await?;
        log::info!("marked {count} notifications read for {}", roster.user_id);
        Ok(count)
    }

    /// Creation helper used by other flows to drop a message into a user's inbox.
    pub async fn notify(&self, user_id: &str, new: NewNotification) -> Result<Notification> {
        let mut notification = Notification {
            id: String::new(),
            title: new.title,
            message: new.message,
            kind: new.kind,
            created_at: Utc::now(),
            read: false,
            user_id: Some(user_id.to_string()),
            link: new.link,
        };
        let id = self
            .store
            .create(NOTIFICATIONS, encode(&notification)?)
            .await?;
        notification.id = id;
        Ok(notification)
    }
}

fn read_flag() -> Map<String, Value> {
    let mut fields = Map::new();
    fields.insert("read".to_string(), Value::Bool(true));
    fields
}

fn decode_all(docs: Vec<Document>) -> Vec<Notification> {
    docs.into_iter()
        .filter_map(|doc| {
            let id = doc.id.clone();
            decode::<Notification>(doc)
                .map_err(|e| log::warn!("skipping malformed notification {id}: {e}"))
                .ok()
        })
        .collect()
}
