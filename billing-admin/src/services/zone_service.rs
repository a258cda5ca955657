//! Zone hierarchy mutations
//!
//! Every write runs in one store transaction:
//!
//! ```text
//! validate → begin → probe name/code → [generate code] → write → commit → audit
//!                         └────────── any error ──────────→ rollback
//! ```
//!
//! Deletes pass the [`DependencyChecker`] before the transaction opens.

use std::sync::Arc;

use shared::models::{
    SubZone, SubZoneCreate, SubZoneForm, SubZoneSummary, SubZoneUpdate, Zone, ZoneCreate,
    ZoneForm, ZoneSummary, ZoneUpdate,
};
use shared::util::now_millis;

use super::code_generator::{
    TxCodeProbe, resolve_unique_code, sub_zone_base_code, zone_base_code,
};
use super::dependency::DependencyChecker;
use crate::audit::{AuditAction, AuditRecord, AuditSink, FieldChange, create_diff, create_snapshot};
use crate::auth::{Actor, permissions};
use crate::core::HierarchyConfig;
use crate::db::repository::{CodeScope, HierarchyStore, HierarchyTx, RepoError, UniqueField};
use crate::utils::validation::{validate_sub_zone_form, validate_zone_form};
use crate::utils::{AppError, AppResult, ConflictField};

/// Result of one create attempt inside a transaction
enum CreateAttempt<T> {
    Created(T),
    /// A generated code was claimed between probe and insert
    CodeTaken(String),
}

fn zone_name_conflict(name: &str) -> AppError {
    AppError::conflict(
        ConflictField::Name,
        format!("A zone named '{name}' already exists"),
    )
}

fn zone_code_conflict(code: &str) -> AppError {
    AppError::conflict(
        ConflictField::Code,
        format!("Zone code '{code}' is already in use"),
    )
}

fn sub_zone_name_conflict(name: &str) -> AppError {
    AppError::conflict(
        ConflictField::Name,
        format!("A sub-zone named '{name}' already exists in this zone"),
    )
}

fn sub_zone_code_conflict(code: &str) -> AppError {
    AppError::conflict(
        ConflictField::Code,
        format!("Sub-zone code '{code}' is already in use"),
    )
}

fn zone_not_found(id: i64) -> AppError {
    AppError::not_found(format!("Zone {id} not found"))
}

fn sub_zone_not_found(id: i64) -> AppError {
    AppError::not_found(format!("Sub-zone {id} not found"))
}

/// Roll back, logging (not propagating) a failed rollback
async fn rollback(tx: Box<dyn HierarchyTx>) {
    if let Err(e) = tx.rollback().await {
        tracing::error!(target: "database", error = %e, "Transaction rollback failed");
    }
}

/// Commit on success, roll back on failure
async fn finish<T>(tx: Box<dyn HierarchyTx>, result: AppResult<T>) -> AppResult<T> {
    match result {
        Ok(value) => {
            tx.commit().await?;
            Ok(value)
        }
        Err(err) => {
            rollback(tx).await;
            Err(err)
        }
    }
}

/// Zone / sub-zone service
#[derive(Clone)]
pub struct ZoneService {
    store: Arc<dyn HierarchyStore>,
    audit: Arc<dyn AuditSink>,
    dependencies: DependencyChecker,
    config: HierarchyConfig,
}

impl ZoneService {
    pub fn new(
        store: Arc<dyn HierarchyStore>,
        audit: Arc<dyn AuditSink>,
        config: HierarchyConfig,
    ) -> Self {
        let dependencies = DependencyChecker::new(store.clone(), config.property_linkage);
        Self {
            store,
            audit,
            dependencies,
            config,
        }
    }

    pub fn dependencies(&self) -> &DependencyChecker {
        &self.dependencies
    }

    // ── Reads ───────────────────────────────────────────────────────

    pub async fn get_zone(&self, id: i64) -> AppResult<Zone> {
        if id <= 0 {
            return Err(zone_not_found(id));
        }
        self.store
            .find_zone(id)
            .await?
            .ok_or_else(|| zone_not_found(id))
    }

    pub async fn get_sub_zone(&self, id: i64) -> AppResult<SubZone> {
        if id <= 0 {
            return Err(sub_zone_not_found(id));
        }
        self.store
            .find_sub_zone(id)
            .await?
            .ok_or_else(|| sub_zone_not_found(id))
    }

    /// Zones with sub-zone / business / property counts
    pub async fn list_zones(&self, search: Option<&str>) -> AppResult<Vec<ZoneSummary>> {
        Ok(self.store.list_zones(search).await?)
    }

    /// Sub-zones of a zone with business / property counts
    pub async fn list_sub_zones(&self, zone_id: i64) -> AppResult<Vec<SubZoneSummary>> {
        self.get_zone(zone_id).await?;
        Ok(self
            .store
            .list_sub_zones(zone_id, self.config.property_linkage)
            .await?)
    }

    // ── Zone mutations ──────────────────────────────────────────────

    pub async fn create_zone(&self, actor: &Actor, form: &ZoneForm) -> AppResult<Zone> {
        actor.require(permissions::ZONES_MANAGE)?;
        let input = validate_zone_form(form).map_err(AppError::Validation)?;
        let attempts = self.config.code_insert_retries.max(1);

        for attempt in 1..=attempts {
            let mut tx = self.store.begin().await?;
            match self.try_create_zone(tx.as_mut(), actor, &input).await {
                Ok(CreateAttempt::Created(zone)) => {
                    tx.commit().await?;
                    tracing::info!(
                        zone_id = zone.id,
                        code = zone.code.as_deref().unwrap_or_default(),
                        actor_id = actor.id,
                        "Zone created"
                    );
                    self.record(actor, AuditAction::CreateZone, zone.id, None, Some(&zone), Vec::new())
                        .await;
                    return Ok(zone);
                }
                Ok(CreateAttempt::CodeTaken(code)) => {
                    rollback(tx).await;
                    tracing::warn!(attempt, %code, "Generated zone code taken at insert, retrying");
                }
                Err(err) => {
                    rollback(tx).await;
                    return Err(err);
                }
            }
        }

        Err(AppError::conflict(
            ConflictField::Code,
            "Could not allocate a unique zone code. Please try again.",
        ))
    }

    async fn try_create_zone(
        &self,
        tx: &mut dyn HierarchyTx,
        actor: &Actor,
        input: &ZoneCreate,
    ) -> AppResult<CreateAttempt<Zone>> {
        if tx.zone_name_taken(&input.name, None).await? {
            return Err(zone_name_conflict(&input.name));
        }

        let generated = input.code.is_none();
        let code = match &input.code {
            Some(code) => {
                if tx.code_taken(CodeScope::Zone, code, None).await? {
                    return Err(zone_code_conflict(code));
                }
                code.clone()
            }
            None => {
                let base = zone_base_code(&input.name);
                let mut probe = TxCodeProbe::new(&mut *tx, CodeScope::Zone);
                resolve_unique_code(&mut probe, &base).await?
            }
        };

        let data = ZoneCreate {
            code: Some(code.clone()),
            ..input.clone()
        };
        match tx.insert_zone(&data, actor.id, now_millis()).await {
            Ok(zone) => Ok(CreateAttempt::Created(zone)),
            Err(RepoError::UniqueViolation(UniqueField::Code)) if generated => {
                Ok(CreateAttempt::CodeTaken(code))
            }
            Err(RepoError::UniqueViolation(UniqueField::Code)) => Err(zone_code_conflict(&code)),
            Err(RepoError::UniqueViolation(UniqueField::Name)) => {
                Err(zone_name_conflict(&input.name))
            }
            Err(e) => Err(e.into()),
        }
    }

    /// Replace name, code and description; a blank code clears it
    pub async fn update_zone(&self, actor: &Actor, id: i64, form: &ZoneForm) -> AppResult<Zone> {
        actor.require(permissions::ZONES_MANAGE)?;
        if id <= 0 {
            return Err(zone_not_found(id));
        }
        let input: ZoneUpdate = validate_zone_form(form).map_err(AppError::Validation)?.into();

        let mut tx = self.store.begin().await?;
        let result = self.try_update_zone(tx.as_mut(), id, &input).await;
        let (before, after) = finish(tx, result).await?;

        tracing::info!(zone_id = id, actor_id = actor.id, "Zone updated");
        let changes = create_diff(&before, &after);
        self.record(actor, AuditAction::UpdateZone, id, Some(&before), Some(&after), changes)
            .await;
        Ok(after)
    }

    async fn try_update_zone(
        &self,
        tx: &mut dyn HierarchyTx,
        id: i64,
        input: &ZoneUpdate,
    ) -> AppResult<(Zone, Zone)> {
        let before = tx.find_zone(id).await?.ok_or_else(|| zone_not_found(id))?;

        if tx.zone_name_taken(&input.name, Some(id)).await? {
            return Err(zone_name_conflict(&input.name));
        }
        if let Some(code) = &input.code
            && tx.code_taken(CodeScope::Zone, code, Some(id)).await?
        {
            return Err(zone_code_conflict(code));
        }

        let after = match tx.update_zone(id, input, now_millis()).await {
            Ok(zone) => zone,
            Err(RepoError::UniqueViolation(UniqueField::Name)) => {
                return Err(zone_name_conflict(&input.name));
            }
            Err(RepoError::UniqueViolation(UniqueField::Code)) => {
                return Err(zone_code_conflict(input.code.as_deref().unwrap_or_default()));
            }
            Err(e) => return Err(e.into()),
        };
        Ok((before, after))
    }

    /// Delete a zone that nothing references; returns the removed row
    pub async fn delete_zone(&self, actor: &Actor, id: i64) -> AppResult<Zone> {
        actor.require(permissions::ZONES_DELETE)?;
        let zone = self.get_zone(id).await?;
        self.dependencies.check_zone(id).await?;

        let mut tx = self.store.begin().await?;
        let result = match tx.delete_zone(id).await {
            Ok(0) => Err(zone_not_found(id)),
            Ok(_) => Ok(()),
            Err(e) => Err(e.into()),
        };
        finish(tx, result).await?;

        tracing::info!(zone_id = id, actor_id = actor.id, "Zone deleted");
        self.record(actor, AuditAction::DeleteZone, id, Some(&zone), None, Vec::new())
            .await;
        Ok(zone)
    }

    // ── Sub-zone mutations ──────────────────────────────────────────

    pub async fn create_sub_zone(&self, actor: &Actor, form: &SubZoneForm) -> AppResult<SubZone> {
        actor.require(permissions::ZONES_MANAGE)?;
        let input = validate_sub_zone_form(form).map_err(AppError::Validation)?;
        let attempts = self.config.code_insert_retries.max(1);

        for attempt in 1..=attempts {
            let mut tx = self.store.begin().await?;
            match self.try_create_sub_zone(tx.as_mut(), actor, &input).await {
                Ok(CreateAttempt::Created(sub_zone)) => {
                    tx.commit().await?;
                    tracing::info!(
                        sub_zone_id = sub_zone.id,
                        zone_id = sub_zone.zone_id,
                        code = sub_zone.code.as_deref().unwrap_or_default(),
                        actor_id = actor.id,
                        "Sub-zone created"
                    );
                    self.record(
                        actor,
                        AuditAction::CreateSubZone,
                        sub_zone.id,
                        None,
                        Some(&sub_zone),
                        Vec::new(),
                    )
                    .await;
                    return Ok(sub_zone);
                }
                Ok(CreateAttempt::CodeTaken(code)) => {
                    rollback(tx).await;
                    tracing::warn!(attempt, %code, "Generated sub-zone code taken at insert, retrying");
                }
                Err(err) => {
                    rollback(tx).await;
                    return Err(err);
                }
            }
        }

        Err(AppError::conflict(
            ConflictField::Code,
            "Could not allocate a unique sub-zone code. Please try again.",
        ))
    }

    async fn try_create_sub_zone(
        &self,
        tx: &mut dyn HierarchyTx,
        actor: &Actor,
        input: &SubZoneCreate,
    ) -> AppResult<CreateAttempt<SubZone>> {
        let zone = tx
            .find_zone(input.zone_id)
            .await?
            .ok_or_else(|| zone_not_found(input.zone_id))?;

        if tx
            .sub_zone_name_taken(input.zone_id, &input.name, None)
            .await?
        {
            return Err(sub_zone_name_conflict(&input.name));
        }

        let generated = input.code.is_none();
        let code = match &input.code {
            Some(code) => {
                if tx.code_taken(CodeScope::SubZone, code, None).await? {
                    return Err(sub_zone_code_conflict(code));
                }
                code.clone()
            }
            None => {
                let base = sub_zone_base_code(&zone, &input.name);
                let mut probe = TxCodeProbe::new(&mut *tx, CodeScope::SubZone);
                resolve_unique_code(&mut probe, &base).await?
            }
        };

        let data = SubZoneCreate {
            code: Some(code.clone()),
            ..input.clone()
        };
        match tx.insert_sub_zone(&data, actor.id, now_millis()).await {
            Ok(sub_zone) => Ok(CreateAttempt::Created(sub_zone)),
            Err(RepoError::UniqueViolation(UniqueField::Code)) if generated => {
                Ok(CreateAttempt::CodeTaken(code))
            }
            Err(RepoError::UniqueViolation(UniqueField::Code)) => {
                Err(sub_zone_code_conflict(&code))
            }
            Err(RepoError::UniqueViolation(UniqueField::Name)) => {
                Err(sub_zone_name_conflict(&input.name))
            }
            Err(e) => Err(e.into()),
        }
    }

    /// Replace name, code and description; the parent zone never changes
    pub async fn update_sub_zone(
        &self,
        actor: &Actor,
        id: i64,
        form: &SubZoneForm,
    ) -> AppResult<SubZone> {
        actor.require(permissions::ZONES_MANAGE)?;
        if id <= 0 {
            return Err(sub_zone_not_found(id));
        }
        let input = validate_sub_zone_form(form).map_err(AppError::Validation)?;

        let mut tx = self.store.begin().await?;
        let result = self.try_update_sub_zone(tx.as_mut(), id, input).await;
        let (before, after) = finish(tx, result).await?;

        tracing::info!(sub_zone_id = id, actor_id = actor.id, "Sub-zone updated");
        let changes = create_diff(&before, &after);
        self.record(
            actor,
            AuditAction::UpdateSubZone,
            id,
            Some(&before),
            Some(&after),
            changes,
        )
        .await;
        Ok(after)
    }

    async fn try_update_sub_zone(
        &self,
        tx: &mut dyn HierarchyTx,
        id: i64,
        input: SubZoneCreate,
    ) -> AppResult<(SubZone, SubZone)> {
        let before = tx
            .find_sub_zone(id)
            .await?
            .ok_or_else(|| sub_zone_not_found(id))?;
        if before.zone_id != input.zone_id {
            return Err(AppError::validation(
                "A sub-zone cannot be moved to another zone",
            ));
        }

        if tx
            .sub_zone_name_taken(before.zone_id, &input.name, Some(id))
            .await?
        {
            return Err(sub_zone_name_conflict(&input.name));
        }
        if let Some(code) = &input.code
            && tx.code_taken(CodeScope::SubZone, code, Some(id)).await?
        {
            return Err(sub_zone_code_conflict(code));
        }

        let update = SubZoneUpdate::from(input);
        let after = match tx.update_sub_zone(id, &update, now_millis()).await {
            Ok(sub_zone) => sub_zone,
            Err(RepoError::UniqueViolation(UniqueField::Name)) => {
                return Err(sub_zone_name_conflict(&update.name));
            }
            Err(RepoError::UniqueViolation(UniqueField::Code)) => {
                return Err(sub_zone_code_conflict(
                    update.code.as_deref().unwrap_or_default(),
                ));
            }
            Err(e) => return Err(e.into()),
        };
        Ok((before, after))
    }

    /// Delete a sub-zone that nothing references; returns the removed row
    pub async fn delete_sub_zone(&self, actor: &Actor, id: i64) -> AppResult<SubZone> {
        actor.require(permissions::ZONES_DELETE)?;
        let sub_zone = self.get_sub_zone(id).await?;
        self.dependencies.check_sub_zone(id).await?;

        let mut tx = self.store.begin().await?;
        let result = match tx.delete_sub_zone(id).await {
            Ok(0) => Err(sub_zone_not_found(id)),
            Ok(_) => Ok(()),
            Err(e) => Err(e.into()),
        };
        finish(tx, result).await?;

        tracing::info!(
            sub_zone_id = id,
            zone_id = sub_zone.zone_id,
            actor_id = actor.id,
            "Sub-zone deleted"
        );
        self.record(
            actor,
            AuditAction::DeleteSubZone,
            id,
            Some(&sub_zone),
            None,
            Vec::new(),
        )
        .await;
        Ok(sub_zone)
    }

    // ── Audit ───────────────────────────────────────────────────────

    /// Append an audit record; failures are logged, the mutation stands
    async fn record<T: serde::Serialize>(
        &self,
        actor: &Actor,
        action: AuditAction,
        record_id: i64,
        before: Option<&T>,
        after: Option<&T>,
        changes: Vec<FieldChange>,
    ) {
        let record = AuditRecord {
            action,
            table: action.table().to_string(),
            record_id,
            actor_id: actor.id,
            actor_name: Some(actor.name.clone()),
            before: before.map(create_snapshot),
            after: after.map(create_snapshot),
            changes,
            created_at: now_millis(),
        };
        if let Err(e) = self.audit.record(record).await {
            tracing::error!(%action, record_id, error = %e, "Failed to write audit record");
        }
    }
}
