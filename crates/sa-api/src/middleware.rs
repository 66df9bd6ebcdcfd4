//! shelter-admin/crates/sa-api/src/middleware.rs Middleware
//!
//! Request logging and cross-origin policy for the admin API.

use actix_cors::Cors;
use actix_web::middleware::Logger;

// remote-ip "request-line" status-code response-size plus the acting user.
pub fn standard_middleware() -> Logger {
    Logger::new(r#"%a "%r" %s %b caller=%{X-Caller-Id}i %Dms"#)
}

// The admin UI is served from its own origin.
pub fn cors_policy(allowed_origin: Option<&str>) -> Cors {
    let cors = match allowed_origin {
        Some(origin) => Cors::default().allowed_origin(origin),
        None => Cors::default().allow_any_origin(),
    };
    cors.allowed_methods(vec!["GET", "POST", "PUT", "DELETE"])
        .allow_any_header()
        .max_age(3600)
}
