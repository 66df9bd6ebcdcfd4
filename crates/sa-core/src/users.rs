//! # User Provisioning
//!
//! Administrative profiles for staff accounts. Credential creation belongs to
//! the authentication provider; this module only validates and records the
//! profile, and resolves callers for capability checks.

use std::sync::Arc;

use chrono::Utc;
use serde::Deserialize;
use validator::{Validate, ValidationError, ValidationErrors};

use crate::error::{AppError, Result};
use crate::models::{decode, encode, UserProfile};
use crate::roles::{Caller, RoleService};
use crate::traits::{DocRef, DocumentStore, Query};

pub const USERS: &str = "users";
pub const USER_MODULE: &str = "User Management";

/// Provisioning form as submitted by an administrator.
#[derive(Debug, Clone, Deserialize, Validate)]
#[serde(rename_all = "camelCase")]
pub struct NewUser {
    #[validate(email(message = "invalid email address"))]
    pub email: String,

    #[validate(custom(function = "validate_display_name"))]
    pub display_name: String,

    #[validate(custom(function = "validate_phone"))]
    pub phone: Option<String>,

    #[validate(length(min = 1, message = "role required"))]
    pub role_id: String,
}

/// Measured after trimming, the same way the name is stored.
fn validate_display_name(name: &str) -> std::result::Result<(), ValidationError> {
    let len = name.trim().chars().count();
    if (1..=80).contains(&len) {
        Ok(())
    } else {
        Err(ValidationError::new("display_name")
            .with_message("display name must be 1-80 characters".into()))
    }
}

/// `+` optional, then 7-15 digits; spaces and dashes are ignored.
fn validate_phone(phone: &str) -> std::result::Result<(), ValidationError> {
    let mut chars = phone.trim().chars().peekable();
    if chars.peek() == Some(&'+') {
        chars.next();
    }
    let mut digits = 0;
    for c in chars {
        match c {
            '0'..='9' => digits += 1,
            ' ' | '-' => {}
            _ => return Err(ValidationError::new("phone").with_message("invalid phone number".into())),
        }
    }
    if (7..=15).contains(&digits) {
        Ok(())
    } else {
        Err(ValidationError::new("phone").with_message("invalid phone number".into()))
    }
}

/// Flattens validator output into one readable message.
fn describe(errors: &ValidationErrors) -> String {
    let mut messages: Vec<String> = errors
        .field_errors()
        .into_iter()
        .flat_map(|(field, errs)| {
            errs.iter().map(move |e| match &e.message {
                Some(msg) => msg.to_string(),
                None => format!("invalid {field}"),
            })
        })
        .collect();
    messages.sort();
    messages.join("; ")
}

pub struct UserService {
    store: Arc<dyn DocumentStore>,
    roles: Arc<RoleService>,
}

impl UserService {
    pub fn new(store: Arc<dyn DocumentStore>, roles: Arc<RoleService>) -> Self {
        Self { store, roles }
    }

    pub async fn provision(&self, caller: &Caller, new: NewUser) -> Result<UserProfile> {
        // 1. Shape checks
        new.validate()
            .map_err(|e| AppError::ValidationError(describe(&e)))?;
        caller.require(USER_MODULE, "Create")?;

        // 2. Referential checks
        let email = new.email.trim().to_lowercase();
        let existing = self
            .store
            .query(&Query::collection(USERS).filter_eq("email", email.as_str()))
            .await?;
        if !existing.is_empty() {
            return Err(AppError::validation(format!("email {email} is already in use")));
        }
        match self.roles.get_role(&new.role_id).await {
            Ok(_) => {}
            Err(AppError::NotFound(..)) => {
                return Err(AppError::validation(format!("unknown role '{}'", new.role_id)))
            }
            Err(e) => return Err(e),
        }

        // 3. Persist
        let mut profile = UserProfile {
            id: None,
            email,
            display_name: new.display_name.trim().to_string(),
            phone: new.phone.map(|p| p.trim().to_string()),
            role_id: new.role_id,
            created_at: Utc::now(),
        };
        let id = self.store.create(USERS, encode(&profile)?).await?;
        log::info!("user {} provisioned as {id} by {}", profile.email, caller.user_id);
        profile.id = Some(id);
        Ok(profile)
    }

    pub async fn get_user(&self, id: &str) -> Result<UserProfile> {
        match self.store.get(&DocRef::new(USERS, id)).await? {
            Some(doc) => Ok(decode(doc)?),
            None => Err(AppError::NotFound("User".into(), id.to_string())),
        }
    }

    pub async fn list_users(&self) -> Result<Vec<UserProfile>> {
        let docs = self.store.query(&Query::collection(USERS)).await?;
        let mut users: Vec<UserProfile> = docs
            .into_iter()
            .filter_map(|doc| {
                let id = doc.id.clone();
                decode::<UserProfile>(doc)
                    .map_err(|e| log::warn!("skipping malformed user {id}: {e}"))
                    .ok()
            })
            .collect();
        users.sort_by(|a, b| a.email.cmp(&b.email));
        Ok(users)
    }

    /// Profile -> role -> `Caller`. Unknown users are denied outright.
    pub async fn resolve_caller(&self, user_id: &str) -> Result<Caller> {
        let profile = match self.get_user(user_id).await {
            Ok(p) => p,
            Err(AppError::NotFound(..)) => {
                return Err(AppError::denied(format!("unknown caller {user_id}")))
            }
            Err(e) => return Err(e),
        };
        let role = self.roles.get_role(&profile.role_id).await?;
        Ok(Caller::new(user_id, role))
    }
}
