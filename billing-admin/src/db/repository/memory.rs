//! In-memory Hierarchy Repository
//!
//! Same constraints as the SQLite schema, with a single-writer lock: a
//! transaction holds the store mutex from `begin` until commit or rollback
//! and works on a private copy that replaces the shared state on commit.

use std::collections::BTreeMap;
use std::sync::Arc;

use async_trait::async_trait;
use shared::models::{
    SubZone, SubZoneCreate, SubZoneSummary, SubZoneUpdate, Zone, ZoneCreate, ZoneSummary,
    ZoneUpdate,
};
use tokio::sync::{Mutex, OwnedMutexGuard};

use super::{
    CodeScope, HierarchyStore, HierarchyTx, PropertyLinkage, RepoError, RepoResult,
    SubZoneDependents, UniqueField, ZoneDependents,
};

const FOREIGN_KEY_FAILED: &str = "FOREIGN KEY constraint failed";

/// A business or property row referencing the hierarchy
#[derive(Debug, Clone, Copy)]
struct Reference {
    zone_id: i64,
    sub_zone_id: Option<i64>,
}

#[derive(Debug, Clone, Default)]
struct HierarchyState {
    zones: BTreeMap<i64, Zone>,
    sub_zones: BTreeMap<i64, SubZone>,
    businesses: Vec<Reference>,
    properties: Vec<Reference>,
    last_id: i64,
}

impl HierarchyState {
    fn next_id(&mut self) -> i64 {
        self.last_id += 1;
        self.last_id
    }

    fn zone_name_taken(&self, name: &str, exclude_id: Option<i64>) -> bool {
        self.zones
            .values()
            .any(|z| z.name == name && Some(z.id) != exclude_id)
    }

    fn sub_zone_name_taken(&self, zone_id: i64, name: &str, exclude_id: Option<i64>) -> bool {
        self.sub_zones
            .values()
            .any(|s| s.zone_id == zone_id && s.name == name && Some(s.id) != exclude_id)
    }

    fn code_taken(&self, scope: CodeScope, code: &str, exclude_id: Option<i64>) -> bool {
        match scope {
            CodeScope::Zone => self
                .zones
                .values()
                .any(|z| z.code.as_deref() == Some(code) && Some(z.id) != exclude_id),
            CodeScope::SubZone => self
                .sub_zones
                .values()
                .any(|s| s.code.as_deref() == Some(code) && Some(s.id) != exclude_id),
        }
    }

    /// Schema-level uniqueness for a zone row
    fn check_zone_unique(&self, name: &str, code: Option<&str>, id: Option<i64>) -> RepoResult<()> {
        if self.zone_name_taken(name, id) {
            return Err(RepoError::UniqueViolation(UniqueField::Name));
        }
        if let Some(code) = code
            && self.code_taken(CodeScope::Zone, code, id)
        {
            return Err(RepoError::UniqueViolation(UniqueField::Code));
        }
        Ok(())
    }

    /// Schema-level uniqueness for a sub-zone row
    fn check_sub_zone_unique(
        &self,
        zone_id: i64,
        name: &str,
        code: Option<&str>,
        id: Option<i64>,
    ) -> RepoResult<()> {
        if self.sub_zone_name_taken(zone_id, name, id) {
            return Err(RepoError::UniqueViolation(UniqueField::Name));
        }
        if let Some(code) = code
            && self.code_taken(CodeScope::SubZone, code, id)
        {
            return Err(RepoError::UniqueViolation(UniqueField::Code));
        }
        Ok(())
    }

    fn zone_dependents(&self, id: i64) -> ZoneDependents {
        ZoneDependents {
            sub_zones: self.sub_zones.values().filter(|s| s.zone_id == id).count() as i64,
            businesses: self.businesses.iter().filter(|r| r.zone_id == id).count() as i64,
            properties: self.properties.iter().filter(|r| r.zone_id == id).count() as i64,
        }
    }

    fn sub_zone_dependents(&self, sub_zone: &SubZone, linkage: PropertyLinkage) -> SubZoneDependents {
        let properties = match linkage {
            PropertyLinkage::SubZone => self
                .properties
                .iter()
                .filter(|r| r.sub_zone_id == Some(sub_zone.id))
                .count(),
            PropertyLinkage::ParentZone => self
                .properties
                .iter()
                .filter(|r| r.zone_id == sub_zone.zone_id)
                .count(),
        };
        SubZoneDependents {
            businesses: self
                .businesses
                .iter()
                .filter(|r| r.sub_zone_id == Some(sub_zone.id))
                .count() as i64,
            properties: properties as i64,
        }
    }
}

/// In-process store for tests and embedding
#[derive(Clone, Default)]
pub struct MemoryHierarchyStore {
    state: Arc<Mutex<HierarchyState>>,
}

impl MemoryHierarchyStore {
    pub fn new() -> Self {
        Self::default()
    }

    /// Register a business referencing a zone and optionally a sub-zone
    pub async fn add_business(&self, zone_id: i64, sub_zone_id: Option<i64>) -> RepoResult<()> {
        let mut state = self.state.lock().await;
        check_reference(&state, zone_id, sub_zone_id)?;
        state.businesses.push(Reference {
            zone_id,
            sub_zone_id,
        });
        Ok(())
    }

    /// Register a property referencing a zone and optionally a sub-zone
    pub async fn add_property(&self, zone_id: i64, sub_zone_id: Option<i64>) -> RepoResult<()> {
        let mut state = self.state.lock().await;
        check_reference(&state, zone_id, sub_zone_id)?;
        state.properties.push(Reference {
            zone_id,
            sub_zone_id,
        });
        Ok(())
    }
}

fn check_reference(state: &HierarchyState, zone_id: i64, sub_zone_id: Option<i64>) -> RepoResult<()> {
    let zone_ok = state.zones.contains_key(&zone_id);
    let sub_zone_ok = sub_zone_id.is_none_or(|id| state.sub_zones.contains_key(&id));
    if zone_ok && sub_zone_ok {
        Ok(())
    } else {
        Err(RepoError::Database(FOREIGN_KEY_FAILED.into()))
    }
}

#[async_trait]
impl HierarchyStore for MemoryHierarchyStore {
    async fn begin(&self) -> RepoResult<Box<dyn HierarchyTx>> {
        let guard = self.state.clone().lock_owned().await;
        let working = guard.clone();
        Ok(Box::new(MemoryHierarchyTx { guard, working }))
    }

    async fn find_zone(&self, id: i64) -> RepoResult<Option<Zone>> {
        Ok(self.state.lock().await.zones.get(&id).cloned())
    }

    async fn find_sub_zone(&self, id: i64) -> RepoResult<Option<SubZone>> {
        Ok(self.state.lock().await.sub_zones.get(&id).cloned())
    }

    async fn zone_dependents(&self, id: i64) -> RepoResult<ZoneDependents> {
        Ok(self.state.lock().await.zone_dependents(id))
    }

    async fn sub_zone_dependents(
        &self,
        id: i64,
        linkage: PropertyLinkage,
    ) -> RepoResult<SubZoneDependents> {
        let state = self.state.lock().await;
        let sub_zone = state
            .sub_zones
            .get(&id)
            .ok_or_else(|| RepoError::NotFound(format!("Sub-zone {id} not found")))?;
        Ok(state.sub_zone_dependents(sub_zone, linkage))
    }

    async fn list_zones(&self, search: Option<&str>) -> RepoResult<Vec<ZoneSummary>> {
        let search = search.map(str::trim).filter(|s| !s.is_empty());
        let state = self.state.lock().await;
        let mut rows: Vec<ZoneSummary> = state
            .zones
            .values()
            .filter(|z| {
                search.is_none_or(|term| {
                    z.name.contains(term) || z.code.as_deref().is_some_and(|c| c.contains(term))
                })
            })
            .map(|z| {
                let deps = state.zone_dependents(z.id);
                ZoneSummary {
                    zone: z.clone(),
                    sub_zone_count: deps.sub_zones,
                    business_count: deps.businesses,
                    property_count: deps.properties,
                }
            })
            .collect();
        rows.sort_by(|a, b| a.zone.name.cmp(&b.zone.name));
        Ok(rows)
    }

    async fn list_sub_zones(
        &self,
        zone_id: i64,
        linkage: PropertyLinkage,
    ) -> RepoResult<Vec<SubZoneSummary>> {
        let state = self.state.lock().await;
        let mut rows: Vec<SubZoneSummary> = state
            .sub_zones
            .values()
            .filter(|s| s.zone_id == zone_id)
            .map(|s| {
                let deps = state.sub_zone_dependents(s, linkage);
                SubZoneSummary {
                    sub_zone: s.clone(),
                    business_count: deps.businesses,
                    property_count: deps.properties,
                }
            })
            .collect();
        rows.sort_by(|a, b| a.sub_zone.name.cmp(&b.sub_zone.name));
        Ok(rows)
    }
}

pub struct MemoryHierarchyTx {
    guard: OwnedMutexGuard<HierarchyState>,
    working: HierarchyState,
}

#[async_trait]
impl HierarchyTx for MemoryHierarchyTx {
    async fn find_zone(&mut self, id: i64) -> RepoResult<Option<Zone>> {
        Ok(self.working.zones.get(&id).cloned())
    }

    async fn find_sub_zone(&mut self, id: i64) -> RepoResult<Option<SubZone>> {
        Ok(self.working.sub_zones.get(&id).cloned())
    }

    async fn zone_name_taken(&mut self, name: &str, exclude_id: Option<i64>) -> RepoResult<bool> {
        Ok(self.working.zone_name_taken(name, exclude_id))
    }

    async fn sub_zone_name_taken(
        &mut self,
        zone_id: i64,
        name: &str,
        exclude_id: Option<i64>,
    ) -> RepoResult<bool> {
        Ok(self.working.sub_zone_name_taken(zone_id, name, exclude_id))
    }

    async fn code_taken(
        &mut self,
        scope: CodeScope,
        code: &str,
        exclude_id: Option<i64>,
    ) -> RepoResult<bool> {
        Ok(self.working.code_taken(scope, code, exclude_id))
    }

    async fn insert_zone(
        &mut self,
        data: &ZoneCreate,
        actor_id: i64,
        now: i64,
    ) -> RepoResult<Zone> {
        self.working
            .check_zone_unique(&data.name, data.code.as_deref(), None)?;
        let zone = Zone {
            id: self.working.next_id(),
            name: data.name.clone(),
            code: data.code.clone(),
            description: data.description.clone(),
            created_by: actor_id,
            created_at: now,
            updated_at: now,
        };
        self.working.zones.insert(zone.id, zone.clone());
        Ok(zone)
    }

    async fn update_zone(&mut self, id: i64, data: &ZoneUpdate, now: i64) -> RepoResult<Zone> {
        self.working
            .check_zone_unique(&data.name, data.code.as_deref(), Some(id))?;
        let zone = self
            .working
            .zones
            .get_mut(&id)
            .ok_or_else(|| RepoError::NotFound(format!("Zone {id} not found")))?;
        zone.name = data.name.clone();
        zone.code = data.code.clone();
        zone.description = data.description.clone();
        zone.updated_at = now;
        Ok(zone.clone())
    }

    async fn delete_zone(&mut self, id: i64) -> RepoResult<u64> {
        let deps = self.working.zone_dependents(id);
        if deps != ZoneDependents::default() {
            return Err(RepoError::Database(FOREIGN_KEY_FAILED.into()));
        }
        Ok(u64::from(self.working.zones.remove(&id).is_some()))
    }

    async fn insert_sub_zone(
        &mut self,
        data: &SubZoneCreate,
        actor_id: i64,
        now: i64,
    ) -> RepoResult<SubZone> {
        if !self.working.zones.contains_key(&data.zone_id) {
            return Err(RepoError::Database(FOREIGN_KEY_FAILED.into()));
        }
        self.working.check_sub_zone_unique(
            data.zone_id,
            &data.name,
            data.code.as_deref(),
            None,
        )?;
        let sub_zone = SubZone {
            id: self.working.next_id(),
            zone_id: data.zone_id,
            name: data.name.clone(),
            code: data.code.clone(),
            description: data.description.clone(),
            created_by: actor_id,
            created_at: now,
            updated_at: now,
        };
        self.working.sub_zones.insert(sub_zone.id, sub_zone.clone());
        Ok(sub_zone)
    }

    async fn update_sub_zone(
        &mut self,
        id: i64,
        data: &SubZoneUpdate,
        now: i64,
    ) -> RepoResult<SubZone> {
        let zone_id = self
            .working
            .sub_zones
            .get(&id)
            .map(|s| s.zone_id)
            .ok_or_else(|| RepoError::NotFound(format!("Sub-zone {id} not found")))?;
        self.working
            .check_sub_zone_unique(zone_id, &data.name, data.code.as_deref(), Some(id))?;
        let sub_zone = self
            .working
            .sub_zones
            .get_mut(&id)
            .ok_or_else(|| RepoError::NotFound(format!("Sub-zone {id} not found")))?;
        sub_zone.name = data.name.clone();
        sub_zone.code = data.code.clone();
        sub_zone.description = data.description.clone();
        sub_zone.updated_at = now;
        Ok(sub_zone.clone())
    }

    async fn delete_sub_zone(&mut self, id: i64) -> RepoResult<u64> {
        let referenced = self
            .working
            .businesses
            .iter()
            .chain(self.working.properties.iter())
            .any(|r| r.sub_zone_id == Some(id));
        if referenced {
            return Err(RepoError::Database(FOREIGN_KEY_FAILED.into()));
        }
        Ok(u64::from(self.working.sub_zones.remove(&id).is_some()))
    }

    async fn commit(self: Box<Self>) -> RepoResult<()> {
        let MemoryHierarchyTx { mut guard, working } = *self;
        *guard = working;
        Ok(())
    }

    async fn rollback(self: Box<Self>) -> RepoResult<()> {
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn zone_create(name: &str, code: Option<&str>) -> ZoneCreate {
        ZoneCreate {
            name: name.to_string(),
            code: code.map(str::to_string),
            description: None,
        }
    }

    #[tokio::test]
    async fn test_commit_publishes_and_rollback_discards() {
        let store = MemoryHierarchyStore::new();

        let mut tx = store.begin().await.unwrap();
        let kept = tx.insert_zone(&zone_create("North", None), 1, 10).await.unwrap();
        tx.commit().await.unwrap();

        let mut tx = store.begin().await.unwrap();
        tx.insert_zone(&zone_create("South", None), 1, 10).await.unwrap();
        tx.rollback().await.unwrap();

        let zones = store.list_zones(None).await.unwrap();
        assert_eq!(zones.len(), 1);
        assert_eq!(zones[0].zone.id, kept.id);
    }

    #[tokio::test]
    async fn test_dropped_transaction_discards_writes() {
        let store = MemoryHierarchyStore::new();
        {
            let mut tx = store.begin().await.unwrap();
            tx.insert_zone(&zone_create("North", None), 1, 10).await.unwrap();
        }
        assert!(store.list_zones(None).await.unwrap().is_empty());
    }

    #[tokio::test]
    async fn test_insert_enforces_uniqueness() {
        let store = MemoryHierarchyStore::new();
        let mut tx = store.begin().await.unwrap();
        tx.insert_zone(&zone_create("North", Some("NO")), 1, 10)
            .await
            .unwrap();
        let err = tx
            .insert_zone(&zone_create("North", None), 1, 10)
            .await
            .unwrap_err();
        assert!(matches!(err, RepoError::UniqueViolation(UniqueField::Name)));
        let err = tx
            .insert_zone(&zone_create("Northern", Some("NO")), 1, 10)
            .await
            .unwrap_err();
        assert!(matches!(err, RepoError::UniqueViolation(UniqueField::Code)));
    }

    #[tokio::test]
    async fn test_references_restrict_delete() {
        let store = MemoryHierarchyStore::new();
        let mut tx = store.begin().await.unwrap();
        let zone = tx.insert_zone(&zone_create("North", None), 1, 10).await.unwrap();
        tx.commit().await.unwrap();

        store.add_property(zone.id, None).await.unwrap();
        assert!(store.add_business(zone.id + 100, None).await.is_err());

        let mut tx = store.begin().await.unwrap();
        assert!(matches!(
            tx.delete_zone(zone.id).await,
            Err(RepoError::Database(_))
        ));
    }
}
