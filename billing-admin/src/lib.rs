//! Billing Admin - 市政计费后台的区域层级管理
//!
//! # 架构概述
//!
//! Zones partition the municipality; sub-zones partition a zone. Businesses
//! and properties reference both for billing and reporting.
//!
//! # 模块结构
//!
//! ```text
//! billing-admin/src/
//! ├── core/          # 配置
//! ├── auth/          # 操作者与权限
//! ├── services/      # 区域服务、代码生成、依赖检查
//! ├── audit/         # 审计日志
//! ├── db/            # SQLite 连接池与仓储
//! └── utils/         # 错误、日志、表单校验
//! ```

pub mod audit;
pub mod auth;
pub mod core;
pub mod db;
pub mod services;
pub mod utils;

// Re-export 公共类型
pub use audit::{AuditSink, MemoryAuditLog, SqliteAuditLog};
pub use auth::Actor;
pub use core::{Config, HierarchyConfig};
pub use db::DbService;
pub use db::repository::{HierarchyStore, MemoryHierarchyStore, SqliteHierarchyStore};
pub use services::ZoneService;
pub use utils::{AppError, AppResult};

// Re-export logger functions
pub use utils::logger::{init_logger, init_logger_with_file};
