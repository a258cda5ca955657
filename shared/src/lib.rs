//! Shared types for the billing admin workspace
//!
//! Zone hierarchy models and small utilities used by more than one crate.

pub mod models;
pub mod util;

// Re-exports
pub use serde::{Deserialize, Serialize};
