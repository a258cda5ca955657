//! SQLite Hierarchy Repository

use async_trait::async_trait;
use shared::models::{
    SubZone, SubZoneCreate, SubZoneSummary, SubZoneUpdate, Zone, ZoneCreate, ZoneSummary,
    ZoneUpdate,
};
use sqlx::{Sqlite, SqlitePool, Transaction};

use super::{
    CodeScope, HierarchyStore, HierarchyTx, PropertyLinkage, RepoError, RepoResult,
    SubZoneDependents, ZoneDependents,
};

const ZONE_COLUMNS: &str = "id, name, code, description, created_by, created_at, updated_at";
const SUB_ZONE_COLUMNS: &str =
    "id, zone_id, name, code, description, created_by, created_at, updated_at";

/// Property count expression for a sub-zone row aliased `s`
fn sub_zone_property_count(linkage: PropertyLinkage) -> &'static str {
    match linkage {
        PropertyLinkage::SubZone => "(SELECT COUNT(*) FROM property p WHERE p.sub_zone_id = s.id)",
        PropertyLinkage::ParentZone => "(SELECT COUNT(*) FROM property p WHERE p.zone_id = s.zone_id)",
    }
}

/// Escape `%`, `_` and `\` so a search term matches literally under `ESCAPE '\'`
fn escape_like(term: &str) -> String {
    let mut escaped = String::with_capacity(term.len());
    for c in term.chars() {
        if matches!(c, '%' | '_' | '\\') {
            escaped.push('\\');
        }
        escaped.push(c);
    }
    escaped
}

#[derive(Clone)]
pub struct SqliteHierarchyStore {
    pool: SqlitePool,
}

impl SqliteHierarchyStore {
    pub fn new(pool: SqlitePool) -> Self {
        Self { pool }
    }
}

#[async_trait]
impl HierarchyStore for SqliteHierarchyStore {
    /// Write transactions take the database write lock up front, so
    /// concurrent writers wait on `busy_timeout` rather than failing
    /// with `SQLITE_BUSY` at their first write.
    async fn begin(&self) -> RepoResult<Box<dyn HierarchyTx>> {
        let tx = self.pool.begin_with("BEGIN IMMEDIATE").await?;
        Ok(Box::new(SqliteHierarchyTx { tx }))
    }

    async fn find_zone(&self, id: i64) -> RepoResult<Option<Zone>> {
        let zone = sqlx::query_as::<_, Zone>(&format!("SELECT {ZONE_COLUMNS} FROM zone WHERE id = ?"))
            .bind(id)
            .fetch_optional(&self.pool)
            .await?;
        Ok(zone)
    }

    async fn find_sub_zone(&self, id: i64) -> RepoResult<Option<SubZone>> {
        let sub_zone = sqlx::query_as::<_, SubZone>(&format!(
            "SELECT {SUB_ZONE_COLUMNS} FROM sub_zone WHERE id = ?"
        ))
        .bind(id)
        .fetch_optional(&self.pool)
        .await?;
        Ok(sub_zone)
    }

    async fn zone_dependents(&self, id: i64) -> RepoResult<ZoneDependents> {
        let counts = sqlx::query_as::<_, ZoneDependents>(
            r#"
            SELECT
                (SELECT COUNT(*) FROM sub_zone WHERE zone_id = ?) AS sub_zones,
                (SELECT COUNT(*) FROM business WHERE zone_id = ?) AS businesses,
                (SELECT COUNT(*) FROM property WHERE zone_id = ?) AS properties
            "#,
        )
        .bind(id)
        .bind(id)
        .bind(id)
        .fetch_one(&self.pool)
        .await?;
        Ok(counts)
    }

    async fn sub_zone_dependents(
        &self,
        id: i64,
        linkage: PropertyLinkage,
    ) -> RepoResult<SubZoneDependents> {
        let sql = format!(
            r#"
            SELECT
                (SELECT COUNT(*) FROM business b WHERE b.sub_zone_id = s.id) AS businesses,
                {} AS properties
            FROM sub_zone s
            WHERE s.id = ?
            "#,
            sub_zone_property_count(linkage)
        );
        let counts = sqlx::query_as::<_, SubZoneDependents>(&sql)
            .bind(id)
            .fetch_optional(&self.pool)
            .await?;
        counts.ok_or_else(|| RepoError::NotFound(format!("Sub-zone {id} not found")))
    }

    async fn list_zones(&self, search: Option<&str>) -> RepoResult<Vec<ZoneSummary>> {
        let search = search
            .map(str::trim)
            .filter(|s| !s.is_empty())
            .map(escape_like);
        let rows = sqlx::query_as::<_, ZoneSummary>(
            r#"
            SELECT
                z.id, z.name, z.code, z.description, z.created_by, z.created_at, z.updated_at,
                (SELECT COUNT(*) FROM sub_zone s WHERE s.zone_id = z.id) AS sub_zone_count,
                (SELECT COUNT(*) FROM business b WHERE b.zone_id = z.id) AS business_count,
                (SELECT COUNT(*) FROM property p WHERE p.zone_id = z.id) AS property_count
            FROM zone z
            WHERE ? IS NULL
               OR z.name LIKE '%' || ? || '%' ESCAPE '\'
               OR z.code LIKE '%' || ? || '%' ESCAPE '\'
            ORDER BY z.name
            "#,
        )
        .bind(search.as_deref())
        .bind(search.as_deref())
        .bind(search.as_deref())
        .fetch_all(&self.pool)
        .await?;
        Ok(rows)
    }

    async fn list_sub_zones(
        &self,
        zone_id: i64,
        linkage: PropertyLinkage,
    ) -> RepoResult<Vec<SubZoneSummary>> {
        let sql = format!(
            r#"
            SELECT
                s.id, s.zone_id, s.name, s.code, s.description,
                s.created_by, s.created_at, s.updated_at,
                (SELECT COUNT(*) FROM business b WHERE b.sub_zone_id = s.id) AS business_count,
                {} AS property_count
            FROM sub_zone s
            WHERE s.zone_id = ?
            ORDER BY s.name
            "#,
            sub_zone_property_count(linkage)
        );
        let rows = sqlx::query_as::<_, SubZoneSummary>(&sql)
            .bind(zone_id)
            .fetch_all(&self.pool)
            .await?;
        Ok(rows)
    }
}

/// Open write transaction; rolled back on drop unless committed
pub struct SqliteHierarchyTx {
    tx: Transaction<'static, Sqlite>,
}

impl SqliteHierarchyTx {
    /// Run a `COUNT(*)` probe bound as `[extra], text, exclude_id`
    async fn count(
        &mut self,
        sql: &str,
        text: &str,
        extra: Option<i64>,
        exclude_id: Option<i64>,
    ) -> RepoResult<bool> {
        let mut query = sqlx::query_scalar::<_, i64>(sql);
        if let Some(value) = extra {
            query = query.bind(value);
        }
        let count = query
            .bind(text)
            .bind(exclude_id.unwrap_or(0))
            .fetch_one(&mut *self.tx)
            .await?;
        Ok(count > 0)
    }
}

#[async_trait]
impl HierarchyTx for SqliteHierarchyTx {
    async fn find_zone(&mut self, id: i64) -> RepoResult<Option<Zone>> {
        let zone = sqlx::query_as::<_, Zone>(&format!("SELECT {ZONE_COLUMNS} FROM zone WHERE id = ?"))
            .bind(id)
            .fetch_optional(&mut *self.tx)
            .await?;
        Ok(zone)
    }

    async fn find_sub_zone(&mut self, id: i64) -> RepoResult<Option<SubZone>> {
        let sub_zone = sqlx::query_as::<_, SubZone>(&format!(
            "SELECT {SUB_ZONE_COLUMNS} FROM sub_zone WHERE id = ?"
        ))
        .bind(id)
        .fetch_optional(&mut *self.tx)
        .await?;
        Ok(sub_zone)
    }

    async fn zone_name_taken(&mut self, name: &str, exclude_id: Option<i64>) -> RepoResult<bool> {
        self.count(
            "SELECT COUNT(*) FROM zone WHERE name = ? AND id != ?",
            name,
            None,
            exclude_id,
        )
        .await
    }

    async fn sub_zone_name_taken(
        &mut self,
        zone_id: i64,
        name: &str,
        exclude_id: Option<i64>,
    ) -> RepoResult<bool> {
        self.count(
            "SELECT COUNT(*) FROM sub_zone WHERE zone_id = ? AND name = ? AND id != ?",
            name,
            Some(zone_id),
            exclude_id,
        )
        .await
    }

    async fn code_taken(
        &mut self,
        scope: CodeScope,
        code: &str,
        exclude_id: Option<i64>,
    ) -> RepoResult<bool> {
        let sql = match scope {
            CodeScope::Zone => "SELECT COUNT(*) FROM zone WHERE code = ? AND id != ?",
            CodeScope::SubZone => "SELECT COUNT(*) FROM sub_zone WHERE code = ? AND id != ?",
        };
        self.count(sql, code, None, exclude_id).await
    }

    async fn insert_zone(
        &mut self,
        data: &ZoneCreate,
        actor_id: i64,
        now: i64,
    ) -> RepoResult<Zone> {
        let zone = sqlx::query_as::<_, Zone>(&format!(
            r#"
            INSERT INTO zone (name, code, description, created_by, created_at, updated_at)
            VALUES (?, ?, ?, ?, ?, ?)
            RETURNING {ZONE_COLUMNS}
            "#
        ))
        .bind(&data.name)
        .bind(&data.code)
        .bind(&data.description)
        .bind(actor_id)
        .bind(now)
        .bind(now)
        .fetch_one(&mut *self.tx)
        .await?;
        Ok(zone)
    }

    async fn update_zone(&mut self, id: i64, data: &ZoneUpdate, now: i64) -> RepoResult<Zone> {
        let zone = sqlx::query_as::<_, Zone>(&format!(
            r#"
            UPDATE zone SET name = ?, code = ?, description = ?, updated_at = ?
            WHERE id = ?
            RETURNING {ZONE_COLUMNS}
            "#
        ))
        .bind(&data.name)
        .bind(&data.code)
        .bind(&data.description)
        .bind(now)
        .bind(id)
        .fetch_optional(&mut *self.tx)
        .await?;
        zone.ok_or_else(|| RepoError::NotFound(format!("Zone {id} not found")))
    }

    async fn delete_zone(&mut self, id: i64) -> RepoResult<u64> {
        let result = sqlx::query("DELETE FROM zone WHERE id = ?")
            .bind(id)
            .execute(&mut *self.tx)
            .await?;
        Ok(result.rows_affected())
    }

    async fn insert_sub_zone(
        &mut self,
        data: &SubZoneCreate,
        actor_id: i64,
        now: i64,
    ) -> RepoResult<SubZone> {
        let sub_zone = sqlx::query_as::<_, SubZone>(&format!(
            r#"
            INSERT INTO sub_zone (zone_id, name, code, description, created_by, created_at, updated_at)
            VALUES (?, ?, ?, ?, ?, ?, ?)
            RETURNING {SUB_ZONE_COLUMNS}
            "#
        ))
        .bind(data.zone_id)
        .bind(&data.name)
        .bind(&data.code)
        .bind(&data.description)
        .bind(actor_id)
        .bind(now)
        .bind(now)
        .fetch_one(&mut *self.tx)
        .await?;
        Ok(sub_zone)
    }

    async fn update_sub_zone(
        &mut self,
        id: i64,
        data: &SubZoneUpdate,
        now: i64,
    ) -> RepoResult<SubZone> {
        let sub_zone = sqlx::query_as::<_, SubZone>(&format!(
            r#"
            UPDATE sub_zone SET name = ?, code = ?, description = ?, updated_at = ?
            WHERE id = ?
            RETURNING {SUB_ZONE_COLUMNS}
            "#
        ))
        .bind(&data.name)
        .bind(&data.code)
        .bind(&data.description)
        .bind(now)
        .bind(id)
        .fetch_optional(&mut *self.tx)
        .await?;
        sub_zone.ok_or_else(|| RepoError::NotFound(format!("Sub-zone {id} not found")))
    }

    async fn delete_sub_zone(&mut self, id: i64) -> RepoResult<u64> {
        let result = sqlx::query("DELETE FROM sub_zone WHERE id = ?")
            .bind(id)
            .execute(&mut *self.tx)
            .await?;
        Ok(result.rows_affected())
    }

    async fn commit(self: Box<Self>) -> RepoResult<()> {
        self.tx.commit().await?;
        Ok(())
    }

    async fn rollback(self: Box<Self>) -> RepoResult<()> {
        self.tx.rollback().await?;
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::db::repository::UniqueField;
    use crate::db::test_pool;

    fn zone_create(name: &str, code: Option<&str>) -> ZoneCreate {
        ZoneCreate {
            name: name.to_string(),
            code: code.map(str::to_string),
            description: None,
        }
    }

    async fn insert_zone(store: &SqliteHierarchyStore, name: &str, code: Option<&str>) -> Zone {
        let mut tx = store.begin().await.unwrap();
        let zone = tx.insert_zone(&zone_create(name, code), 1, 1_000).await.unwrap();
        tx.commit().await.unwrap();
        zone
    }

    async fn insert_sub_zone(store: &SqliteHierarchyStore, zone_id: i64, name: &str) -> SubZone {
        let mut tx = store.begin().await.unwrap();
        let sub_zone = tx
            .insert_sub_zone(
                &SubZoneCreate {
                    zone_id,
                    name: name.to_string(),
                    code: None,
                    description: None,
                },
                1,
                1_000,
            )
            .await
            .unwrap();
        tx.commit().await.unwrap();
        sub_zone
    }

    #[tokio::test]
    async fn test_insert_and_find_zone() {
        let store = SqliteHierarchyStore::new(test_pool().await);
        let zone = insert_zone(&store, "Central Market", Some("CM")).await;

        let found = store.find_zone(zone.id).await.unwrap().unwrap();
        assert_eq!(found, zone);
        assert_eq!(found.code.as_deref(), Some("CM"));
        assert_eq!(found.created_by, 1);
        assert_eq!(found.created_at, 1_000);
    }

    #[tokio::test]
    async fn test_rollback_discards_insert() {
        let store = SqliteHierarchyStore::new(test_pool().await);
        let mut tx = store.begin().await.unwrap();
        tx.insert_zone(&zone_create("Harbour", None), 1, 1_000)
            .await
            .unwrap();
        tx.rollback().await.unwrap();

        assert!(store.list_zones(None).await.unwrap().is_empty());
    }

    #[tokio::test]
    async fn test_unique_violation_is_classified() {
        let store = SqliteHierarchyStore::new(test_pool().await);
        insert_zone(&store, "Harbour", Some("HA")).await;

        let mut tx = store.begin().await.unwrap();
        let err = tx
            .insert_zone(&zone_create("Harbour East", Some("HA")), 1, 1_000)
            .await
            .unwrap_err();
        assert!(matches!(err, RepoError::UniqueViolation(UniqueField::Code)));
        tx.rollback().await.unwrap();

        let mut tx = store.begin().await.unwrap();
        let err = tx
            .insert_zone(&zone_create("Harbour", None), 1, 1_000)
            .await
            .unwrap_err();
        assert!(matches!(err, RepoError::UniqueViolation(UniqueField::Name)));
        tx.rollback().await.unwrap();
    }

    #[tokio::test]
    async fn test_probes_exclude_own_id() {
        let store = SqliteHierarchyStore::new(test_pool().await);
        let zone = insert_zone(&store, "Harbour", Some("HA")).await;

        let mut tx = store.begin().await.unwrap();
        assert!(tx.zone_name_taken("Harbour", None).await.unwrap());
        assert!(!tx.zone_name_taken("Harbour", Some(zone.id)).await.unwrap());
        assert!(tx.code_taken(CodeScope::Zone, "HA", None).await.unwrap());
        assert!(!tx.code_taken(CodeScope::SubZone, "HA", None).await.unwrap());
        tx.rollback().await.unwrap();
    }

    #[tokio::test]
    async fn test_sub_zone_name_scoped_to_parent() {
        let store = SqliteHierarchyStore::new(test_pool().await);
        let north = insert_zone(&store, "North", None).await;
        let south = insert_zone(&store, "South", None).await;
        insert_sub_zone(&store, north.id, "Stalls").await;

        let mut tx = store.begin().await.unwrap();
        assert!(tx.sub_zone_name_taken(north.id, "Stalls", None).await.unwrap());
        assert!(!tx.sub_zone_name_taken(south.id, "Stalls", None).await.unwrap());
        tx.rollback().await.unwrap();

        insert_sub_zone(&store, south.id, "Stalls").await;
        assert_eq!(store.list_sub_zones(south.id, PropertyLinkage::SubZone).await.unwrap().len(), 1);
    }

    #[tokio::test]
    async fn test_dependents_and_listing_counts() {
        let pool = test_pool().await;
        let store = SqliteHierarchyStore::new(pool.clone());
        let zone = insert_zone(&store, "Central Market", Some("CM")).await;
        let stalls = insert_sub_zone(&store, zone.id, "Stalls").await;
        let annex = insert_sub_zone(&store, zone.id, "Annex").await;

        for _ in 0..3 {
            sqlx::query("INSERT INTO business (name, zone_id, sub_zone_id) VALUES ('Shop', ?, ?)")
                .bind(zone.id)
                .bind(stalls.id)
                .execute(&pool)
                .await
                .unwrap();
        }
        sqlx::query("INSERT INTO property (label, zone_id, sub_zone_id) VALUES ('Lot 1', ?, NULL)")
            .bind(zone.id)
            .execute(&pool)
            .await
            .unwrap();

        let deps = store.zone_dependents(zone.id).await.unwrap();
        assert_eq!(
            deps,
            ZoneDependents {
                sub_zones: 2,
                businesses: 3,
                properties: 1
            }
        );

        let stalls_deps = store
            .sub_zone_dependents(stalls.id, PropertyLinkage::SubZone)
            .await
            .unwrap();
        assert_eq!(stalls_deps.businesses, 3);
        assert_eq!(stalls_deps.properties, 0);

        let legacy = store
            .sub_zone_dependents(annex.id, PropertyLinkage::ParentZone)
            .await
            .unwrap();
        assert_eq!(legacy.businesses, 0);
        assert_eq!(legacy.properties, 1);

        let summaries = store.list_zones(Some("Central")).await.unwrap();
        assert_eq!(summaries.len(), 1);
        assert_eq!(summaries[0].sub_zone_count, 2);
        assert_eq!(summaries[0].business_count, 3);
        assert_eq!(summaries[0].property_count, 1);
        assert!(store.list_zones(Some("Harbour")).await.unwrap().is_empty());

        let subs = store.list_sub_zones(zone.id, PropertyLinkage::SubZone).await.unwrap();
        assert_eq!(subs.len(), 2);
        assert_eq!(subs[0].sub_zone.name, "Annex");
        assert_eq!(subs[1].business_count, 3);
    }

    #[tokio::test]
    async fn test_search_treats_wildcards_literally() {
        let store = SqliteHierarchyStore::new(test_pool().await);
        insert_zone(&store, "Block_A", None).await;
        insert_zone(&store, "BlockXA", None).await;
        insert_zone(&store, "Rate 100%", None).await;

        let found = store.list_zones(Some("k_A")).await.unwrap();
        assert_eq!(found.len(), 1);
        assert_eq!(found[0].zone.name, "Block_A");

        let found = store.list_zones(Some("%")).await.unwrap();
        assert_eq!(found.len(), 1);
        assert_eq!(found[0].zone.name, "Rate 100%");

        assert!(store.list_zones(Some("\\")).await.unwrap().is_empty());
    }

    #[tokio::test]
    async fn test_delete_with_references_is_restricted() {
        let pool = test_pool().await;
        let store = SqliteHierarchyStore::new(pool.clone());
        let zone = insert_zone(&store, "Harbour", None).await;
        insert_sub_zone(&store, zone.id, "Docks").await;

        let mut tx = store.begin().await.unwrap();
        let err = tx.delete_zone(zone.id).await.unwrap_err();
        assert!(matches!(err, RepoError::Database(_)));
        tx.rollback().await.unwrap();

        assert!(store.find_zone(zone.id).await.unwrap().is_some());
    }

    #[tokio::test]
    async fn test_update_missing_zone_is_not_found() {
        let store = SqliteHierarchyStore::new(test_pool().await);
        let mut tx = store.begin().await.unwrap();
        let err = tx
            .update_zone(42, &zone_create("Harbour", None).into(), 2_000)
            .await
            .unwrap_err();
        assert!(matches!(err, RepoError::NotFound(_)));
        tx.rollback().await.unwrap();
    }
}
