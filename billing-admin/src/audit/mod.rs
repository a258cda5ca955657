//! 审计日志模块
//!
//! Every zone / sub-zone mutation is recorded after its transaction commits:
//!
//! ```text
//! ZoneService (commit) → AuditRecord { before, after, changes } → AuditSink
//!                                                                ├─ SqliteAuditLog (audit_log table)
//!                                                                └─ MemoryAuditLog (tests)
//! ```
//!
//! The `audit_log` table is append-only: triggers reject UPDATE and DELETE.

pub mod diff;
pub mod storage;
pub mod types;

pub use diff::{FieldChange, create_diff, create_snapshot};
pub use storage::{AuditError, AuditSink, MemoryAuditLog, SqliteAuditLog};
pub use types::{AuditAction, AuditRecord};
