//! # Role Editing & Persistence
//!
//! `RoleEditor` holds the in-progress form; `RoleService` validates it and
//! talks to the document store.

use std::sync::Arc;

use crate::catalog::Catalog;
use crate::error::{AppError, Result};
use crate::models::{decode, encode, Role};
use crate::permissions::{PermissionMatrix, Preset};
use crate::traits::{DocRef, DocumentStore, Query};

pub const ROLES: &str = "roles";

/// Role names that can never be deleted or renamed (case-insensitive).
pub const PROTECTED_ROLE_NAMES: &[&str] = &["admin"];

pub const ROLE_MODULE: &str = "Role Management";

pub fn is_protected(name: &str) -> bool {
    let name = name.trim();
    PROTECTED_ROLE_NAMES
        .iter()
        .any(|protected| protected.eq_ignore_ascii_case(name))
}

/// The identity performing a mutation, with the grants of its role.
#[derive(Debug, Clone)]
pub struct Caller {
    pub user_id: String,
    pub role: Role,
}

impl Caller {
    pub fn new(user_id: impl Into<String>, role: Role) -> Self {
        Self {
            user_id: user_id.into(),
            role,
        }
    }

    pub fn can(&self, module: &str, action: &str) -> bool {
        self.role.grants(module, action)
    }

    /// Fails with `PermissionDenied` unless the role grants `module/action`.
    pub fn require(&self, module: &str, action: &str) -> Result<()> {
        if self.can(module, action) {
            Ok(())
        } else {
            Err(AppError::denied(format!(
                "user {} lacks '{module}/{action}'",
                self.user_id
            )))
        }
    }
}

/// In-progress create/edit form for a single role.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct RoleEditor {
    pub id: Option<String>,
    pub name: String,
    pub matrix: PermissionMatrix,
}

impl RoleEditor {
    pub fn new(catalog: Arc<Catalog>) -> Self {
        Self {
            id: None,
            name: String::new(),
            matrix: PermissionMatrix::new(catalog),
        }
    }

    pub fn from_role(catalog: Arc<Catalog>, role: &Role) -> Self {
        Self {
            id: role.id.clone(),
            name: role.name.clone(),
            matrix: PermissionMatrix::from_role(catalog, role),
        }
    }

    /// Applies the preset and adopts its suggested name, if any.
    pub fn apply_preset(&mut self, preset: Preset) {
        if let Some(name) = self.matrix.apply_preset(preset) {
            self.name = name.to_string();
        }
    }

    /// Checks the form and builds the role to persist. Nothing is written.
    pub fn submit(&self) -> Result<Role> {
        let name = self.name.trim();
        if name.is_empty() {
            return Err(AppError::validation("name required"));
        }
        if self.matrix.count_selected_total() == 0 {
            return Err(AppError::validation("at least one permission required"));
        }
        Ok(Role {
            id: self.id.clone(),
            name: name.to_string(),
            permissions: self.matrix.to_permissions(),
        })
    }
}

pub struct RoleService {
    store: Arc<dyn DocumentStore>,
    catalog: Arc<Catalog>,
}

impl RoleService {
    pub fn new(store: Arc<dyn DocumentStore>, catalog: Arc<Catalog>) -> Self {
        Self { store, catalog }
    }

    pub fn catalog(&self) -> &Arc<Catalog> {
        &self.catalog
    }

    /// Blank editor for a new role.
    pub fn editor(&self) -> RoleEditor {
        RoleEditor::new(Arc::clone(&self.catalog))
    }

    /// Editor seeded from a stored role.
    pub async fn editor_for(&self, id: &str) -> Result<RoleEditor> {
        let role = self.get_role(id).await?;
        Ok(RoleEditor::from_role(Arc::clone(&self.catalog), &role))
    }

    /// All roles, sorted by name. Unreadable records are skipped.
    pub async fn list_roles(&self) -> Result<Vec<Role>> {
        let docs = self.store.query(&Query::collection(ROLES)).await?;
        let mut roles: Vec<Role> = docs
            .into_iter()
            .filter_map(|doc| {
                let id = doc.id.clone();
                decode::<Role>(doc)
                    .map_err(|e| log::warn!("skipping malformed role {id}: {e}"))
                    .ok()
            })
            .collect();
        roles.sort_by_key(|r| r.name.to_lowercase());
        Ok(roles)
    }

    pub async fn get_role(&self, id: &str) -> Result<Role> {
        match self.store.get(&DocRef::new(ROLES, id)).await? {
            Some(doc) => Ok(decode(doc)?),
            None => Err(AppError::NotFound("Role".into(), id.to_string())),
        }
    }

    /// Creates the role when the editor has no id, otherwise replaces it whole.
    pub async fn save(&self, caller: &Caller, editor: &RoleEditor) -> Result<Role> {
        // 1. Validate before anything touches the store
        let mut role = editor.submit()?;
        let body = encode(&role)?;

        // 2. Persist
        match role.id.clone() {
            None => {
                caller.require(ROLE_MODULE, "Create")?;
                let id = self.store.create(ROLES, body).await?;
                log::info!("role '{}' created as {id} by {}", role.name, caller.user_id);
                role.id = Some(id);
            }
            Some(id) => {
                caller.require(ROLE_MODULE, "Edit")?;
                let stored = self.get_role(&id).await?;
                // Protected roles keep their name; only its case may change.
                if is_protected(&stored.name)
                    && !stored.name.trim().eq_ignore_ascii_case(role.name.trim())
                {
                    return Err(AppError::denied(format!(
                        "role '{}' is protected and cannot be renamed",
                        stored.name
                    )));
                }
                self.store.set(&DocRef::new(ROLES, &id), body).await?;
                log::info!("role {id} replaced by {}", caller.user_id);
            }
        }
        Ok(role)
    }

    /// Deletes a role. Protected names are refused even for full admins.
    pub async fn delete_role(&self, caller: &Caller, id: &str) -> Result<()> {
        caller.require(ROLE_MODULE, "Delete")?;
        let role = self.get_role(id).await?;
        if is_protected(&role.name) {
            return Err(AppError::denied(format!(
                "role '{}' is protected and cannot be deleted",
                role.name
            )));
        }
        self.store.delete(&DocRef::new(ROLES, id)).await?;
        log::info!("role {id} ('{}') deleted by {}", role.name, caller.user_id);
        Ok(())
    }

    /// Seeds a full-permission "Admin" role into an empty store.
    pub async fn ensure_default_roles(&self) -> Result<Option<Role>> {
        if !self.list_roles().await?.is_empty() {
            return Ok(None);
        }
        let mut editor = self.editor();
        editor.apply_preset(Preset::Admin);
        let mut role = editor.submit()?;
        let id = self.store.create(ROLES, encode(&role)?).await?;
        log::info!("seeded default Admin role as {id}");
        role.id = Some(id);
        Ok(Some(role))
    }
}
