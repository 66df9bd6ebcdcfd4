//! # shelter-admin Binary
//!
//! The entry point that assembles the application based on compile-time features.

mod settings;

use std::sync::Arc;

use actix_web::{web, App, HttpServer};
use sa_api::handlers::AppState;
use sa_api::middleware::{cors_policy, standard_middleware};
use sa_core::{DocumentStore, NotificationService, RoleService, UserService};

use crate::settings::AppConfig;

// Feature-gated imports: the store backend is chosen at compile time
#[cfg(feature = "db-sqlite")]
use sa_store_sqlite::SqliteDocumentStore;

#[cfg(all(feature = "store-memory", not(feature = "db-sqlite")))]
use sa_store_memory::MemoryStore;

#[cfg(not(any(feature = "store-memory", feature = "db-sqlite")))]
compile_error!("enable one store backend: `store-memory` or `db-sqlite`");

#[actix_web::main]
async fn main() -> anyhow::Result<()> {
    dotenvy::dotenv().ok();
    env_logger::init_from_env(env_logger::Env::new().default_filter_or("info"));

    let config = AppConfig::load()?;
    let catalog = Arc::new(config.catalog()?);

    // 1. Initialize Store Implementation
    #[cfg(feature = "db-sqlite")]
    let store: Arc<dyn DocumentStore> =
        Arc::new(SqliteDocumentStore::new(&config.store.database_url).await?);

    #[cfg(all(feature = "store-memory", not(feature = "db-sqlite")))]
    let store: Arc<dyn DocumentStore> = {
        log::warn!("using the in-memory store; data is lost on restart");
        Arc::new(MemoryStore::new())
    };

    // 2. Wire services (explicit injection, no globals)
    let roles = Arc::new(RoleService::new(Arc::clone(&store), Arc::clone(&catalog)));
    if config.store.seed_default_roles {
        if let Some(role) = roles.ensure_default_roles().await? {
            log::info!("seeded role '{}'", role.name);
        }
    }

    let state = web::Data::new(AppState {
        catalog,
        roles: Arc::clone(&roles),
        notifications: NotificationService::new(Arc::clone(&store)),
        users: UserService::new(store, roles),
    });

    let bind = (config.server.host.clone(), config.server.port);
    let origin = config.server.allowed_origin.clone();
    log::info!("shelter-admin starting on http://{}:{}", bind.0, bind.1);

    HttpServer::new(move || {
        App::new()
            .app_data(state.clone())
            .wrap(standard_middleware())
            .wrap(cors_policy(origin.as_deref()))
            .configure(sa_api::configure_routes)
    })
    .bind(bind)?
    .run()
    .await?;

    Ok(())
}
