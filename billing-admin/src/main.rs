use std::sync::Arc;

use anyhow::Context;
use billing_admin::{
    Config, DbService, SqliteAuditLog, SqliteHierarchyStore, ZoneService, init_logger_with_file,
};

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    // 1. 环境变量 (.env 可选)
    dotenv::dotenv().ok();

    // 2. 加载配置
    let config = Config::from_env();

    // 3. 日志
    init_logger_with_file(
        Some(&config.log_level),
        Some(config.log_json),
        config.log_dir.as_deref(),
    );

    tracing::info!(
        environment = %config.environment,
        database = %config.database_path,
        property_linkage = %config.hierarchy.property_linkage,
        code_insert_retries = config.hierarchy.code_insert_retries,
        "Billing admin starting"
    );

    // 4. 数据库 + 迁移
    let db = DbService::new(&config.database_path)
        .await
        .with_context(|| format!("Failed to open database at {}", config.database_path))?;

    let service = ZoneService::new(
        Arc::new(SqliteHierarchyStore::new(db.pool.clone())),
        Arc::new(SqliteAuditLog::new(db.pool.clone())),
        config.hierarchy,
    );

    // 5. 区域概览
    let zones = service
        .list_zones(None)
        .await
        .map_err(|e| anyhow::anyhow!(e.user_message()))?;

    tracing::info!(count = zones.len(), "Zone hierarchy loaded");
    for summary in &zones {
        tracing::info!(
            zone_id = summary.zone.id,
            name = %summary.zone.name,
            code = summary.zone.code.as_deref().unwrap_or("-"),
            sub_zones = summary.sub_zone_count,
            businesses = summary.business_count,
            properties = summary.property_count,
            "Zone"
        );
    }

    db.pool.close().await;
    Ok(())
}
