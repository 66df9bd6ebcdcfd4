//! # AppConfig
//!
//! Layered settings: built-in defaults, then an optional `shelter-admin.toml`,
//! then `SHELTER__`-prefixed environment variables
//! (e.g. `SHELTER__SERVER__PORT=9000`).

use config::{Config, Environment, File};
use sa_core::{Catalog, ModuleDef};
use serde::Deserialize;

#[derive(Debug, Clone, Deserialize)]
pub struct ServerConfig {
    #[serde(default = "default_host")]
    pub host: String,
    #[serde(default = "default_port")]
    pub port: u16,
    /// Origin of the admin UI; any origin when unset
    #[serde(default)]
    pub allowed_origin: Option<String>,
}

impl Default for ServerConfig {
    fn default() -> Self {
        Self {
            host: default_host(),
            port: default_port(),
            allowed_origin: None,
        }
    }
}

#[derive(Debug, Clone, Deserialize)]
pub struct StoreConfig {
    #[serde(default = "default_database_url")]
    pub database_url: String,
    /// Create the Admin role on an empty store at startup
    #[serde(default = "default_true")]
    pub seed_default_roles: bool,
}

impl Default for StoreConfig {
    fn default() -> Self {
        Self {
            database_url: default_database_url(),
            seed_default_roles: true,
        }
    }
}

#[derive(Debug, Clone, Default, Deserialize)]
pub struct AppConfig {
    #[serde(default)]
    pub server: ServerConfig,
    #[serde(default)]
    pub store: StoreConfig,
    /// Deployment-specific module catalog; the shelter default when absent
    #[serde(default)]
    pub catalog: Option<Vec<ModuleDef>>,
}

fn default_host() -> String {
    "127.0.0.1".to_string()
}

fn default_port() -> u16 {
    8080
}

fn default_database_url() -> String {
    "sqlite:shelter_admin.db".to_string()
}

fn default_true() -> bool {
    true
}

/// `SHELTER__SECTION__KEY` variables.
fn environment() -> Environment {
    Environment::with_prefix("SHELTER")
        .prefix_separator("__")
        .separator("__")
}

impl AppConfig {
    pub fn load() -> anyhow::Result<Self> {
        let settings = Config::builder()
            .add_source(File::with_name("shelter-admin").required(false))
            .add_source(environment())
            .build()?;
        Ok(settings.try_deserialize()?)
    }

    pub fn catalog(&self) -> anyhow::Result<Catalog> {
        match &self.catalog {
            Some(modules) => Ok(Catalog::new(modules.clone())?),
            None => Ok(Catalog::shelter_default()),
        }
    }
}
