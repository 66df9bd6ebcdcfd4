//! # Domain Models
//!
//! These structs represent the persisted entities of shelter-admin.
//! Field names are camelCase on the wire; document ids live outside the body.

use chrono::{DateTime, Utc};
use serde::de::DeserializeOwned;
use serde::{Deserialize, Serialize};
use serde_json::Value;

use crate::traits::{Document, Fields};

/// One action's grant inside a persisted role.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ActionGrant {
    pub name: String,
    pub enabled: bool,
}

/// The grants of one module, in catalog action order.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ModulePermissions {
    pub module: String,
    pub actions: Vec<ActionGrant>,
}

/// A named bundle of permissions assigned to users.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Role {
    /// Absent until the role is first saved
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub id: Option<String>,
    pub name: String,
    #[serde(default)]
    pub permissions: Vec<ModulePermissions>,
}

impl Role {
    /// Looks up a single grant by exact module and action name.
    pub fn grants(&self, module: &str, action: &str) -> bool {
        self.permissions
            .iter()
            .filter(|m| m.module == module)
            .flat_map(|m| m.actions.iter())
            .any(|a| a.name == action && a.enabled)
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum NotificationType {
    Info,
    Success,
    Warning,
    Error,
}

/// An inbox entry. Only `read` ever changes after creation (false -> true).
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Notification {
    pub id: String,
    pub title: String,
    pub message: String,
    #[serde(rename = "type")]
    pub kind: NotificationType,
    /// Stored as epoch milliseconds so stores can order numerically
    #[serde(with = "chrono::serde::ts_milliseconds")]
    pub created_at: DateTime<Utc>,
    pub read: bool,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub user_id: Option<String>,
    /// Client-side navigation target on click
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub link: Option<String>,
}

/// Input for the notification creation helper.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct NewNotification {
    pub title: String,
    pub message: String,
    #[serde(rename = "type")]
    pub kind: NotificationType,
    #[serde(default)]
    pub link: Option<String>,
}

/// Administrative profile of a provisioned user. Credentials live with the
/// authentication provider, not here.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct UserProfile {
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub id: Option<String>,
    pub email: String,
    pub display_name: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub phone: Option<String>,
    pub role_id: String,
    #[serde(with = "chrono::serde::ts_milliseconds")]
    pub created_at: DateTime<Utc>,
}

/// Rebuilds an entity from a stored document, injecting the id field.
pub fn decode<T: DeserializeOwned>(doc: Document) -> serde_json::Result<T> {
    let mut data = doc.data;
    data.insert("id".to_string(), Value::String(doc.id));
    serde_json::from_value(Value::Object(data))
}

/// Flattens an entity into a document body, dropping the id field.
pub fn encode<T: Serialize>(entity: &T) -> serde_json::Result<Fields> {
    match serde_json::to_value(entity)? {
        Value::Object(mut map) => {
            map.remove("id");
            Ok(map)
        }
        _ => Err(serde::ser::Error::custom("entity must serialize to an object")),
    }
}
