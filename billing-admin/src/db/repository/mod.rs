//! Repository Module
//!
//! Narrow capability interface over the zone hierarchy store.
//!
//! - [`HierarchyStore`] - read-only queries plus [`HierarchyStore::begin`]
//! - [`HierarchyTx`] - uniqueness probes and writes inside one transaction
//!
//! Implementations: [`SqliteHierarchyStore`] (sqlx) and
//! [`MemoryHierarchyStore`] (single-writer, in-process).

pub mod memory;
pub mod sqlite;

pub use memory::MemoryHierarchyStore;
pub use sqlite::SqliteHierarchyStore;

use std::fmt;
use std::str::FromStr;

use async_trait::async_trait;
use serde::Serialize;
use shared::models::{
    SubZone, SubZoneCreate, SubZoneSummary, SubZoneUpdate, Zone, ZoneCreate, ZoneSummary,
    ZoneUpdate,
};
use thiserror::Error;

/// Column covered by a uniqueness constraint
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum UniqueField {
    Name,
    Code,
}

impl UniqueField {
    /// Classify a store constraint message such as
    /// `UNIQUE constraint failed: sub_zone.zone_id, sub_zone.name`.
    pub fn from_constraint_message(message: &str) -> Self {
        if message.contains(".code") {
            UniqueField::Code
        } else {
            UniqueField::Name
        }
    }
}

/// Repository error types
#[derive(Debug, Error)]
pub enum RepoError {
    #[error("Not found: {0}")]
    NotFound(String),

    #[error("Unique constraint violated on {0:?}")]
    UniqueViolation(UniqueField),

    #[error("Database error: {0}")]
    Database(String),
}

impl From<sqlx::Error> for RepoError {
    fn from(err: sqlx::Error) -> Self {
        match &err {
            sqlx::Error::RowNotFound => RepoError::NotFound("Record not found".into()),
            sqlx::Error::Database(db) if db.is_unique_violation() => {
                RepoError::UniqueViolation(UniqueField::from_constraint_message(db.message()))
            }
            _ => RepoError::Database(err.to_string()),
        }
    }
}

impl From<sqlx::migrate::MigrateError> for RepoError {
    fn from(err: sqlx::migrate::MigrateError) -> Self {
        RepoError::Database(format!("Failed to apply migrations: {err}"))
    }
}

/// Result type for repository operations
pub type RepoResult<T> = Result<T, RepoError>;

/// Which uniqueness namespace a code belongs to
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum CodeScope {
    /// Codes unique across all zones
    Zone,
    /// Codes unique across all sub-zones, regardless of parent
    SubZone,
}

/// How properties are attributed to a sub-zone when counting dependents
///
/// Properties carry both `zone_id` and an optional `sub_zone_id`. The
/// legacy admin panel counted a sub-zone's properties by its parent zone,
/// while businesses were counted by the sub-zone itself.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum PropertyLinkage {
    /// `property.sub_zone_id = sub_zone.id`
    #[default]
    SubZone,
    /// `property.zone_id = sub_zone.zone_id` (legacy behaviour)
    ParentZone,
}

impl FromStr for PropertyLinkage {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.trim().to_ascii_lowercase().as_str() {
            "sub_zone" | "subzone" => Ok(PropertyLinkage::SubZone),
            "parent_zone" | "zone" => Ok(PropertyLinkage::ParentZone),
            other => Err(format!("Unknown property linkage: {other}")),
        }
    }
}

impl fmt::Display for PropertyLinkage {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            PropertyLinkage::SubZone => f.write_str("sub_zone"),
            PropertyLinkage::ParentZone => f.write_str("parent_zone"),
        }
    }
}

/// Records referencing a zone
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, sqlx::FromRow)]
pub struct ZoneDependents {
    pub sub_zones: i64,
    pub businesses: i64,
    pub properties: i64,
}

/// Records referencing a sub-zone
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, sqlx::FromRow)]
pub struct SubZoneDependents {
    pub businesses: i64,
    pub properties: i64,
}

/// Read side of the store plus the transaction entry point
#[async_trait]
pub trait HierarchyStore: Send + Sync {
    /// Open a write transaction
    async fn begin(&self) -> RepoResult<Box<dyn HierarchyTx>>;

    async fn find_zone(&self, id: i64) -> RepoResult<Option<Zone>>;
    async fn find_sub_zone(&self, id: i64) -> RepoResult<Option<SubZone>>;

    async fn zone_dependents(&self, id: i64) -> RepoResult<ZoneDependents>;
    async fn sub_zone_dependents(
        &self,
        id: i64,
        linkage: PropertyLinkage,
    ) -> RepoResult<SubZoneDependents>;

    /// Zones ordered by name, optionally filtered by a name/code substring
    async fn list_zones(&self, search: Option<&str>) -> RepoResult<Vec<ZoneSummary>>;
    /// Sub-zones of one zone ordered by name
    async fn list_sub_zones(
        &self,
        zone_id: i64,
        linkage: PropertyLinkage,
    ) -> RepoResult<Vec<SubZoneSummary>>;
}

/// One atomic unit of work
///
/// Dropping a transaction without committing discards its writes.
#[async_trait]
pub trait HierarchyTx: Send {
    async fn find_zone(&mut self, id: i64) -> RepoResult<Option<Zone>>;
    async fn find_sub_zone(&mut self, id: i64) -> RepoResult<Option<SubZone>>;

    async fn zone_name_taken(&mut self, name: &str, exclude_id: Option<i64>) -> RepoResult<bool>;
    async fn sub_zone_name_taken(
        &mut self,
        zone_id: i64,
        name: &str,
        exclude_id: Option<i64>,
    ) -> RepoResult<bool>;
    async fn code_taken(
        &mut self,
        scope: CodeScope,
        code: &str,
        exclude_id: Option<i64>,
    ) -> RepoResult<bool>;

    async fn insert_zone(&mut self, data: &ZoneCreate, actor_id: i64, now: i64)
    -> RepoResult<Zone>;
    async fn update_zone(&mut self, id: i64, data: &ZoneUpdate, now: i64) -> RepoResult<Zone>;
    /// Returns the number of rows removed
    async fn delete_zone(&mut self, id: i64) -> RepoResult<u64>;

    async fn insert_sub_zone(
        &mut self,
        data: &SubZoneCreate,
        actor_id: i64,
        now: i64,
    ) -> RepoResult<SubZone>;
    async fn update_sub_zone(
        &mut self,
        id: i64,
        data: &SubZoneUpdate,
        now: i64,
    ) -> RepoResult<SubZone>;
    /// Returns the number of rows removed
    async fn delete_sub_zone(&mut self, id: i64) -> RepoResult<u64>;

    async fn commit(self: Box<Self>) -> RepoResult<()>;
    async fn rollback(self: Box<Self>) -> RepoResult<()>;
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_unique_field_from_constraint_message() {
        assert_eq!(
            UniqueField::from_constraint_message("UNIQUE constraint failed: zone.code"),
            UniqueField::Code
        );
        assert_eq!(
            UniqueField::from_constraint_message("UNIQUE constraint failed: zone.name"),
            UniqueField::Name
        );
        assert_eq!(
            UniqueField::from_constraint_message(
                "UNIQUE constraint failed: sub_zone.zone_id, sub_zone.name"
            ),
            UniqueField::Name
        );
    }

    #[test]
    fn test_property_linkage_parse() {
        assert_eq!("sub_zone".parse::<PropertyLinkage>(), Ok(PropertyLinkage::SubZone));
        assert_eq!(" PARENT_ZONE ".parse::<PropertyLinkage>(), Ok(PropertyLinkage::ParentZone));
        assert!("street".parse::<PropertyLinkage>().is_err());
        assert_eq!(PropertyLinkage::default().to_string(), "sub_zone");
    }
}
