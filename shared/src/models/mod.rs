//! Data models
//!
//! Shared between billing-admin and the presentation layer.
//! DB row types use `#[cfg_attr(feature = "db", derive(sqlx::FromRow))]`.
//! All IDs are `i64` (SQLite INTEGER PRIMARY KEY).

pub mod sub_zone;
pub mod zone;

// Re-exports
pub use sub_zone::*;
pub use zone::*;
