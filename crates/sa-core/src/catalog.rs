//! # Module Catalog
//!
//! The fixed, ordered list of functional areas and their actions.
//! Defined once per deployment; never persisted per role.

use std::collections::HashSet;

use serde::{Deserialize, Serialize};

use crate::error::{AppError, Result};

/// A functional area and its permissible actions, in display order.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ModuleDef {
    pub name: String,
    pub actions: Vec<String>,
}

impl ModuleDef {
    pub fn new(name: &str, actions: &[&str]) -> Self {
        Self {
            name: name.to_string(),
            actions: actions.iter().map(|a| a.to_string()).collect(),
        }
    }
}

/// Validated catalog with precomputed offsets into a flat cell array.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Catalog {
    modules: Vec<ModuleDef>,
    offsets: Vec<usize>,
}

impl Catalog {
    pub fn new(modules: Vec<ModuleDef>) -> Result<Self> {
        let mut seen_modules = HashSet::new();
        for module in &modules {
            if module.name.trim().is_empty() {
                return Err(AppError::validation("module name must not be empty"));
            }
            if !seen_modules.insert(module.name.as_str()) {
                return Err(AppError::validation(format!(
                    "duplicate module '{}' in catalog",
                    module.name
                )));
            }
            let mut seen_actions = HashSet::new();
            for action in &module.actions {
                if action.trim().is_empty() {
                    return Err(AppError::validation(format!(
                        "module '{}' has an empty action name",
                        module.name
                    )));
                }
                if !seen_actions.insert(action.as_str()) {
                    return Err(AppError::validation(format!(
                        "duplicate action '{}' in module '{}'",
                        action, module.name
                    )));
                }
            }
        }

        let mut offsets = Vec::with_capacity(modules.len());
        let mut next = 0;
        for module in &modules {
            offsets.push(next);
            next += module.actions.len();
        }

        Ok(Self { modules, offsets })
    }

    /// The catalog shipped with the shelter deployment.
    pub fn shelter_default() -> Self {
        let modules = vec![
            ModuleDef::new("Dashboard", &["View"]),
            ModuleDef::new("User Management", &["View", "Create", "Edit", "Delete"]),
            ModuleDef::new("Role Management", &["View", "Create", "Edit", "Delete"]),
            ModuleDef::new(
                "Case Management",
                &["View", "Create", "Edit", "Delete", "Assign", "Close"],
            ),
            ModuleDef::new(
                "Animal Care",
                &["View", "Create", "Edit", "Delete", "Medical Records"],
            ),
            ModuleDef::new("Facility Management", &["View", "Create", "Edit", "Delete"]),
            ModuleDef::new("Inventory", &["View", "Create", "Edit", "Delete", "Adjust Stock"]),
            ModuleDef::new("Reports", &["View", "Export"]),
            ModuleDef::new("Notifications", &["View", "Send"]),
            ModuleDef::new("Settings", &["View", "Edit"]),
        ];
        // Static data above is unique by construction.
        match Self::new(modules) {
            Ok(catalog) => catalog,
            Err(e) => unreachable!("built-in catalog is invalid: {e}"),
        }
    }

    pub fn modules(&self) -> &[ModuleDef] {
        &self.modules
    }

    /// Total number of actions across every module.
    pub fn total_actions(&self) -> usize {
        self.modules.iter().map(|m| m.actions.len()).sum()
    }

    pub fn module_index(&self, module: &str) -> Option<usize> {
        self.modules.iter().position(|m| m.name == module)
    }

    /// Flat cell range of a module.
    pub(crate) fn span(&self, module_idx: usize) -> std::ops::Range<usize> {
        let start = self.offsets[module_idx];
        start..start + self.modules[module_idx].actions.len()
    }

    /// Flat cell index of a module/action pair, by exact name match.
    pub(crate) fn cell(&self, module: &str, action: &str) -> Option<usize> {
        let idx = self.module_index(module)?;
        let pos = self.modules[idx].actions.iter().position(|a| a == action)?;
        Some(self.offsets[idx] + pos)
    }
}

impl Serialize for Catalog {
    fn serialize<S>(&self, serializer: S) -> std::result::Result<S::Ok, S::Error>
    where
        S: serde::Serializer,
    {
        self.modules.serialize(serializer)
    }
}

impl<'de> Deserialize<'de> for Catalog {
    fn deserialize<D>(deserializer: D) -> std::result::Result<Self, D::Error>
    where
        D: serde::Deserializer<'de>,
    {
        let modules = Vec::<ModuleDef>::deserialize(deserializer)?;
        Catalog::new(modules).map_err(serde::de::Error::custom)
    }
}
