//! 审计日志存储
//!
//! [`AuditSink`] is the only way mutations reach the audit trail. Sinks
//! expose append and read; there is no update or delete.

use std::sync::Arc;

use async_trait::async_trait;
use sqlx::SqlitePool;
use thiserror::Error;
use tokio::sync::Mutex;

use super::types::{AuditAction, AuditRecord};

#[derive(Debug, Error)]
pub enum AuditError {
    #[error("Audit storage error: {0}")]
    Storage(String),

    #[error("Audit serialization error: {0}")]
    Serialization(#[from] serde_json::Error),
}

impl From<sqlx::Error> for AuditError {
    fn from(err: sqlx::Error) -> Self {
        AuditError::Storage(err.to_string())
    }
}

/// Receiver of committed mutation snapshots
#[async_trait]
pub trait AuditSink: Send + Sync {
    async fn record(&self, record: AuditRecord) -> Result<(), AuditError>;
}

/// Audit trail in the `audit_log` table
#[derive(Clone)]
pub struct SqliteAuditLog {
    pool: SqlitePool,
}

#[derive(sqlx::FromRow)]
struct AuditRow {
    action: String,
    table_name: String,
    record_id: i64,
    actor_id: i64,
    actor_name: Option<String>,
    before_json: Option<String>,
    after_json: Option<String>,
    changes: Option<String>,
    created_at: i64,
}

impl TryFrom<AuditRow> for AuditRecord {
    type Error = AuditError;

    fn try_from(row: AuditRow) -> Result<Self, Self::Error> {
        let action: AuditAction = row.action.parse().map_err(AuditError::Storage)?;
        let parse = |raw: Option<String>| -> Result<Option<serde_json::Value>, AuditError> {
            raw.map(|s| serde_json::from_str(&s)).transpose().map_err(Into::into)
        };
        Ok(AuditRecord {
            action,
            table: row.table_name,
            record_id: row.record_id,
            actor_id: row.actor_id,
            actor_name: row.actor_name,
            before: parse(row.before_json)?,
            after: parse(row.after_json)?,
            changes: match row.changes {
                Some(raw) => serde_json::from_str(&raw)?,
                None => Vec::new(),
            },
            created_at: row.created_at,
        })
    }
}

impl SqliteAuditLog {
    pub fn new(pool: SqlitePool) -> Self {
        Self { pool }
    }

    /// Entries for one record, oldest first
    pub async fn query(&self, table: &str, record_id: i64) -> Result<Vec<AuditRecord>, AuditError> {
        let rows: Vec<AuditRow> = sqlx::query_as(
            r#"
            SELECT action, table_name, record_id, actor_id, actor_name,
                   before_json, after_json, changes, created_at
            FROM audit_log
            WHERE table_name = ? AND record_id = ?
            ORDER BY id
            "#,
        )
        .bind(table)
        .bind(record_id)
        .fetch_all(&self.pool)
        .await?;
        rows.into_iter().map(AuditRecord::try_from).collect()
    }
}

#[async_trait]
impl AuditSink for SqliteAuditLog {
    async fn record(&self, record: AuditRecord) -> Result<(), AuditError> {
        let before = record.before.as_ref().map(serde_json::to_string).transpose()?;
        let after = record.after.as_ref().map(serde_json::to_string).transpose()?;
        let changes = if record.changes.is_empty() {
            None
        } else {
            Some(serde_json::to_string(&record.changes)?)
        };

        sqlx::query(
            r#"
            INSERT INTO audit_log (
                action, table_name, record_id, actor_id, actor_name,
                before_json, after_json, changes, created_at
            )
            VALUES (?, ?, ?, ?, ?, ?, ?, ?, ?)
            "#,
        )
        .bind(record.action.as_str())
        .bind(&record.table)
        .bind(record.record_id)
        .bind(record.actor_id)
        .bind(&record.actor_name)
        .bind(before)
        .bind(after)
        .bind(changes)
        .bind(record.created_at)
        .execute(&self.pool)
        .await?;
        Ok(())
    }
}

/// In-process audit trail
#[derive(Clone, Default)]
pub struct MemoryAuditLog {
    entries: Arc<Mutex<Vec<AuditRecord>>>,
}

impl MemoryAuditLog {
    pub fn new() -> Self {
        Self::default()
    }

    pub async fn entries(&self) -> Vec<AuditRecord> {
        self.entries.lock().await.clone()
    }
}

#[async_trait]
impl AuditSink for MemoryAuditLog {
    async fn record(&self, record: AuditRecord) -> Result<(), AuditError> {
        self.entries.lock().await.push(record);
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::audit::FieldChange;
    use crate::db::test_pool;
    use serde_json::json;

    fn record(action: AuditAction, before: Option<serde_json::Value>, after: Option<serde_json::Value>) -> AuditRecord {
        AuditRecord {
            action,
            table: action.table().to_string(),
            record_id: 7,
            actor_id: 3,
            actor_name: Some("clerk".to_string()),
            before,
            after,
            changes: Vec::new(),
            created_at: 1_000,
        }
    }

    #[tokio::test]
    async fn test_sqlite_audit_log_round_trip() {
        let log = SqliteAuditLog::new(test_pool().await);
        let created = record(AuditAction::CreateZone, None, Some(json!({"name": "Harbour"})));
        let mut updated = record(
            AuditAction::UpdateZone,
            Some(json!({"name": "Harbour"})),
            Some(json!({"name": "Harbour East"})),
        );
        updated.changes.push(FieldChange {
            field: "name".to_string(),
            from: json!("Harbour"),
            to: json!("Harbour East"),
        });

        log.record(created.clone()).await.unwrap();
        log.record(updated.clone()).await.unwrap();

        let entries = log.query("zone", 7).await.unwrap();
        assert_eq!(entries, vec![created, updated]);
        assert!(log.query("sub_zone", 7).await.unwrap().is_empty());
    }

    #[tokio::test]
    async fn test_sqlite_audit_log_is_append_only() {
        let pool = test_pool().await;
        let log = SqliteAuditLog::new(pool.clone());
        log.record(record(AuditAction::DeleteZone, Some(json!({"name": "Old"})), None))
            .await
            .unwrap();

        assert!(sqlx::query("DELETE FROM audit_log").execute(&pool).await.is_err());
        assert!(
            sqlx::query("UPDATE audit_log SET actor_id = 0")
                .execute(&pool)
                .await
                .is_err()
        );
        assert_eq!(log.query("zone", 7).await.unwrap().len(), 1);
    }
}
