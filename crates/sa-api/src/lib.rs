//! # sa-api
//!
//! The web routing and orchestration layer for shelter-admin.

pub mod handlers;
pub mod middleware;

use actix_web::web;

/// Configures the routes for the admin API.
///
/// # Developer Note
/// We use a scoped configuration to allow the main binary to mount
/// the API under different paths if needed (e.g., /api/v1/).
pub fn configure_routes(cfg: &mut web::ServiceConfig) {
    cfg.service(
        web::scope("")
            .route("/catalog", web::get().to(handlers::get_catalog))
            // Roles
            .route("/roles", web::get().to(handlers::list_roles))
            .route("/roles", web::post().to(handlers::create_role))
            .route("/roles/{id}", web::get().to(handlers::get_role))
            .route("/roles/{id}", web::put().to(handlers::replace_role))
            .route("/roles/{id}", web::delete().to(handlers::delete_role))
            // Users
            .route("/users", web::get().to(handlers::list_users))
            .route("/users", web::post().to(handlers::create_user))
            // Notification inbox of the calling user
            .route("/notifications", web::get().to(handlers::list_notifications))
            .route("/notifications/read-all", web::post().to(handlers::mark_all_read))
            .route("/notifications/{id}/read", web::post().to(handlers::mark_read)),
    );
}
