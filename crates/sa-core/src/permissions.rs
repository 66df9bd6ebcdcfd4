//! # Permission Matrix
//!
//! Editable module/action grant state for one role. Cells are stored flat,
//! one `bool` per catalog action, so every catalog pair is always present
//! and nothing outside the catalog can be.

use std::fmt;
use std::str::FromStr;
use std::sync::Arc;

use serde::{Deserialize, Serialize};

use crate::catalog::Catalog;
use crate::error::{AppError, Result};
use crate::models::{ActionGrant, ModulePermissions, Role};

/// Modules fully granted by the `manager` preset.
pub const MANAGER_MODULES: &[&str] = &[
    "Dashboard",
    "Case Management",
    "Animal Care",
    "Facility Management",
    "Inventory",
];

/// Named bulk-permission templates.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Preset {
    Admin,
    Manager,
    Viewer,
    Clear,
}

impl Preset {
    /// Role name the editor should adopt after applying this preset.
    pub fn suggested_name(self) -> Option<&'static str> {
        match self {
            Preset::Admin => Some("Admin"),
            Preset::Manager => Some("Manager"),
            Preset::Viewer => Some("Viewer"),
            Preset::Clear => None,
        }
    }
}

impl FromStr for Preset {
    type Err = AppError;

    fn from_str(s: &str) -> Result<Self> {
        match s.trim().to_ascii_lowercase().as_str() {
            "admin" => Ok(Preset::Admin),
            "manager" => Ok(Preset::Manager),
            "viewer" => Ok(Preset::Viewer),
            "clear" => Ok(Preset::Clear),
            other => Err(AppError::validation(format!("unknown preset '{other}'"))),
        }
    }
}

impl fmt::Display for Preset {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let name = match self {
            Preset::Admin => "admin",
            Preset::Manager => "manager",
            Preset::Viewer => "viewer",
            Preset::Clear => "clear",
        };
        f.write_str(name)
    }
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct PermissionMatrix {
    catalog: Arc<Catalog>,
    cells: Vec<bool>,
}

impl PermissionMatrix {
    /// All actions disabled.
    pub fn new(catalog: Arc<Catalog>) -> Self {
        let cells = vec![false; catalog.total_actions()];
        Self { catalog, cells }
    }

    /// Seeds from persisted grants. Pairs the catalog doesn't know are
    /// dropped; catalog pairs the role doesn't mention stay disabled.
    pub fn from_permissions(catalog: Arc<Catalog>, permissions: &[ModulePermissions]) -> Self {
        let mut matrix = Self::new(catalog);
        for module in permissions {
            for action in &module.actions {
                if let Some(cell) = matrix.catalog.cell(&module.module, &action.name) {
                    matrix.cells[cell] = action.enabled;
                }
            }
        }
        matrix
    }

    pub fn from_role(catalog: Arc<Catalog>, role: &Role) -> Self {
        Self::from_permissions(catalog, &role.permissions)
    }

    pub fn catalog(&self) -> &Arc<Catalog> {
        &self.catalog
    }

    pub fn is_enabled(&self, module: &str, action: &str) -> bool {
        self.catalog
            .cell(module, action)
            .map(|cell| self.cells[cell])
            .unwrap_or(false)
    }

    /// Flips exactly one cell.
    pub fn toggle(&mut self, module: &str, action: &str) -> Result<()> {
        let cell = self
            .catalog
            .cell(module, action)
            .ok_or_else(|| AppError::NotFound("Action".into(), format!("{module}/{action}")))?;
        self.cells[cell] = !self.cells[cell];
        Ok(())
    }

    /// Disables the module when every action is on, otherwise enables all.
    pub fn toggle_module(&mut self, module: &str) -> Result<()> {
        let idx = self
            .catalog
            .module_index(module)
            .ok_or_else(|| AppError::NotFound("Module".into(), module.to_string()))?;
        let span = self.catalog.span(idx);
        let all_enabled = self.cells[span.clone()].iter().all(|&on| on);
        // An action-less module counts as "all enabled" and stays empty either way.
        self.cells[span].fill(!all_enabled);
        Ok(())
    }

    /// Rewrites the whole matrix. Returns the preset's suggested role name.
    pub fn apply_preset(&mut self, preset: Preset) -> Option<&'static str> {
        let catalog = Arc::clone(&self.catalog);
        for (idx, module) in catalog.modules().iter().enumerate() {
            let span = catalog.span(idx);
            match preset {
                Preset::Admin => self.cells[span].fill(true),
                Preset::Clear => self.cells[span].fill(false),
                Preset::Manager => {
                    let granted = MANAGER_MODULES.contains(&module.name.as_str());
                    self.cells[span].fill(granted);
                }
                Preset::Viewer => {
                    for (cell, action) in span.zip(module.actions.iter()) {
                        self.cells[cell] = action.to_lowercase().contains("view");
                    }
                }
            }
        }
        preset.suggested_name()
    }

    pub fn count_selected(&self, module: &str) -> usize {
        self.catalog
            .module_index(module)
            .map(|idx| self.cells[self.catalog.span(idx)].iter().filter(|&&on| on).count())
            .unwrap_or(0)
    }

    pub fn count_selected_total(&self) -> usize {
        self.cells.iter().filter(|&&on| on).count()
    }

    /// Persisted form, walking this matrix's own catalog.
    pub fn to_permissions(&self) -> Vec<ModulePermissions> {
        self.to_permissions_for(&self.catalog)
    }

    /// Persisted form for `catalog`. Output order and coverage follow
    /// `catalog` exactly, even when it differs from the one this matrix
    /// was loaded with.
    pub fn to_permissions_for(&self, catalog: &Catalog) -> Vec<ModulePermissions> {
        catalog
            .modules()
            .iter()
            .map(|module| ModulePermissions {
                module: module.name.clone(),
                actions: module
                    .actions
                    .iter()
                    .map(|action| ActionGrant {
                        name: action.clone(),
                        enabled: self.is_enabled(&module.name, action),
                    })
                    .collect(),
            })
            .collect()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::catalog::ModuleDef;

    fn small_catalog() -> Arc<Catalog> {
        Arc::new(
            Catalog::new(vec![
                ModuleDef::new("Dashboard", &["View"]),
                ModuleDef::new("Inventory", &["View", "Create", "Delete"]),
                ModuleDef::new("Settings", &["View Settings", "Edit"]),
            ])
            .unwrap(),
        )
    }

    fn grant(name: &str, enabled: bool) -> ActionGrant {
        ActionGrant { name: name.into(), enabled }
    }

    #[test]
    fn from_role_keeps_known_pairs_and_drops_legacy() {
        let catalog = small_catalog();
        let role = Role {
            id: Some("r1".into()),
            name: "Legacy".into(),
            permissions: vec![
                ModulePermissions {
                    module: "Inventory".into(),
                    actions: vec![grant("Delete", true), grant("Archive", true), grant("View", false)],
                },
                ModulePermissions {
                    module: "Kennels".into(),
                    actions: vec![grant("View", true)],
                },
            ],
        };

        let matrix = PermissionMatrix::from_role(catalog.clone(), &role);
        let out = matrix.to_permissions();

        assert_eq!(out.len(), 3);
        assert_eq!(out[0].module, "Dashboard");
        assert_eq!(out[0].actions, vec![grant("View", false)]);
        assert_eq!(
            out[1].actions,
            vec![grant("View", false), grant("Create", false), grant("Delete", true)]
        );
        assert_eq!(matrix.count_selected_total(), 1);
    }

    #[test]
    fn toggle_flips_exactly_one_cell() {
        let mut matrix = PermissionMatrix::new(small_catalog());
        let before = matrix.clone();
        matrix.toggle("Inventory", "Create").unwrap();

        assert!(matrix.is_enabled("Inventory", "Create"));
        assert_eq!(matrix.count_selected_total(), 1);
        assert!(!before.is_enabled("Inventory", "Create"));

        matrix.toggle("Inventory", "Create").unwrap();
        assert_eq!(matrix, before);
    }

    #[test]
    fn toggle_unknown_action_is_not_found() {
        let mut matrix = PermissionMatrix::new(small_catalog());
        assert!(matches!(
            matrix.toggle("Inventory", "Teleport"),
            Err(AppError::NotFound(..))
        ));
        assert!(matches!(matrix.toggle_module("Kennels"), Err(AppError::NotFound(..))));
    }

    #[test]
    fn toggle_module_enables_unless_all_enabled() {
        let mut matrix = PermissionMatrix::new(small_catalog());
        matrix.toggle("Inventory", "View").unwrap();

        // partial -> all on
        matrix.toggle_module("Inventory").unwrap();
        assert_eq!(matrix.count_selected("Inventory"), 3);

        // all on -> all off
        matrix.toggle_module("Inventory").unwrap();
        assert_eq!(matrix.count_selected("Inventory"), 0);

        // none -> all on, restoring the fully-enabled state after two calls
        matrix.toggle_module("Inventory").unwrap();
        assert_eq!(matrix.count_selected("Inventory"), 3);
        assert_eq!(matrix.count_selected("Dashboard"), 0);
    }

    #[test]
    fn admin_and_clear_presets() {
        let catalog = small_catalog();
        let mut matrix = PermissionMatrix::new(catalog.clone());

        assert_eq!(matrix.apply_preset(Preset::Admin), Some("Admin"));
        assert_eq!(matrix.count_selected_total(), catalog.total_actions());

        assert_eq!(matrix.apply_preset(Preset::Clear), None);
        assert_eq!(matrix.count_selected_total(), 0);
    }

    #[test]
    fn manager_preset_grants_only_listed_modules() {
        let mut matrix = PermissionMatrix::new(small_catalog());
        matrix.toggle("Settings", "Edit").unwrap();

        assert_eq!(matrix.apply_preset(Preset::Manager), Some("Manager"));
        assert_eq!(matrix.count_selected("Dashboard"), 1);
        assert_eq!(matrix.count_selected("Inventory"), 3);
        assert_eq!(matrix.count_selected("Settings"), 0);
    }

    #[test]
    fn viewer_preset_matches_view_substring_case_insensitively() {
        let mut matrix = PermissionMatrix::new(small_catalog());
        matrix.apply_preset(Preset::Admin);

        assert_eq!(matrix.apply_preset(Preset::Viewer), Some("Viewer"));
        assert!(matrix.is_enabled("Inventory", "View"));
        assert!(matrix.is_enabled("Settings", "View Settings"));
        assert!(!matrix.is_enabled("Settings", "Edit"));
        assert_eq!(matrix.count_selected_total(), 3);
    }

    #[test]
    fn serializes_against_a_newer_catalog() {
        let old = small_catalog();
        let mut matrix = PermissionMatrix::new(old);
        matrix.toggle("Inventory", "Delete").unwrap();

        let newer = Catalog::new(vec![
            ModuleDef::new("Inventory", &["Delete", "Audit"]),
            ModuleDef::new("Reports", &["View"]),
        ])
        .unwrap();
        let out = matrix.to_permissions_for(&newer);

        assert_eq!(out.len(), 2);
        assert_eq!(out[0].actions, vec![grant("Delete", true), grant("Audit", false)]);
        assert_eq!(out[1].module, "Reports");
        assert_eq!(out[1].actions, vec![grant("View", false)]);
    }

    #[test]
    fn preset_parses_case_insensitively() {
        assert_eq!("Manager".parse::<Preset>().unwrap(), Preset::Manager);
        assert!("owner".parse::<Preset>().is_err());
        assert_eq!(Preset::Viewer.to_string(), "viewer");
    }
}
