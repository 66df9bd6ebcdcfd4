//! shelter-admin/crates/sa-core/src/lib.rs
//!
//! The central domain logic and interface definitions for shelter-admin:
//! the role permission matrix, the notification roster, user provisioning,
//! and the document-store port the plugins implement.

pub mod catalog;
pub mod error;
pub mod models;
pub mod notifications;
pub mod permissions;
pub mod roles;
pub mod traits;
pub mod users;

// Re-exporting for easier access in other crates
pub use catalog::*;
pub use error::*;
pub use models::*;
pub use notifications::*;
pub use permissions::*;
pub use roles::*;
pub use traits::*;
pub use users::*;
