//! Dependency gate for deletions
//!
//! A zone or sub-zone may only be deleted once nothing references it.
//! Nothing is ever cascaded: dependents must be reassigned or removed by
//! an operator first.

use std::sync::Arc;

use crate::db::repository::{HierarchyStore, PropertyLinkage, SubZoneDependents, ZoneDependents};
use crate::utils::{AppError, AppResult};

/// Render non-zero categories, e.g. `3 sub-zone(s), 12 business(es)`
fn enumerate(categories: &[(i64, &str)]) -> Option<String> {
    let parts: Vec<String> = categories
        .iter()
        .filter(|(count, _)| *count > 0)
        .map(|(count, label)| format!("{count} {label}"))
        .collect();
    if parts.is_empty() {
        None
    } else {
        Some(parts.join(", "))
    }
}

impl ZoneDependents {
    pub fn blocking_summary(&self) -> Option<String> {
        enumerate(&[
            (self.sub_zones, "sub-zone(s)"),
            (self.businesses, "business(es)"),
            (self.properties, "property(ies)"),
        ])
    }
}

impl SubZoneDependents {
    pub fn blocking_summary(&self) -> Option<String> {
        enumerate(&[
            (self.businesses, "business(es)"),
            (self.properties, "property(ies)"),
        ])
    }
}

/// Counts references and refuses deletion when any exist
#[derive(Clone)]
pub struct DependencyChecker {
    store: Arc<dyn HierarchyStore>,
    linkage: PropertyLinkage,
}

impl DependencyChecker {
    pub fn new(store: Arc<dyn HierarchyStore>, linkage: PropertyLinkage) -> Self {
        Self { store, linkage }
    }

    pub async fn zone_dependents(&self, zone_id: i64) -> AppResult<ZoneDependents> {
        Ok(self.store.zone_dependents(zone_id).await?)
    }

    pub async fn sub_zone_dependents(&self, sub_zone_id: i64) -> AppResult<SubZoneDependents> {
        Ok(self
            .store
            .sub_zone_dependents(sub_zone_id, self.linkage)
            .await?)
    }

    /// Ok when the zone has no sub-zones, businesses or properties
    pub async fn check_zone(&self, zone_id: i64) -> AppResult<ZoneDependents> {
        let deps = self.zone_dependents(zone_id).await?;
        if let Some(summary) = deps.blocking_summary() {
            tracing::info!(zone_id, %summary, "Zone deletion blocked by dependents");
            return Err(AppError::Dependency(format!(
                "Cannot delete zone: it still has {summary}. Reassign or remove them first."
            )));
        }
        Ok(deps)
    }

    /// Ok when the sub-zone has no businesses or properties
    pub async fn check_sub_zone(&self, sub_zone_id: i64) -> AppResult<SubZoneDependents> {
        let deps = self.sub_zone_dependents(sub_zone_id).await?;
        if let Some(summary) = deps.blocking_summary() {
            tracing::info!(sub_zone_id, %summary, "Sub-zone deletion blocked by dependents");
            return Err(AppError::Dependency(format!(
                "Cannot delete sub-zone: it still has {summary}. Reassign or remove them first."
            )));
        }
        Ok(deps)
    }
}
