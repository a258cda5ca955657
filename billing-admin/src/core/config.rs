use crate::db::repository::PropertyLinkage;

/// 服务配置
///
/// # 环境变量
///
/// | 环境变量 | 默认值 | 说明 |
/// |----------|--------|------|
/// | DATABASE_PATH | billing.db | SQLite 数据库文件 |
/// | ENVIRONMENT | development | 运行环境 |
/// | LOG_LEVEL | info | 日志级别 (`RUST_LOG` 优先) |
/// | LOG_JSON | false | JSON 日志格式 |
/// | LOG_DIR | (unset) | 日志目录 (按天滚动) |
/// | CODE_INSERT_RETRIES | 3 | 生成代码插入冲突时的最大尝试次数 |
/// | SUB_ZONE_PROPERTY_LINK | sub_zone | 子区域物业计数方式: sub_zone / parent_zone |
///
/// # 示例
///
/// ```ignore
/// DATABASE_PATH=/data/billing.db LOG_JSON=true cargo run
/// ```
#[derive(Debug, Clone)]
pub struct Config {
    pub database_path: String,
    /// 运行环境: development | staging | production
    pub environment: String,
    pub log_level: String,
    pub log_json: bool,
    pub log_dir: Option<String>,
    pub hierarchy: HierarchyConfig,
}

/// Behaviour knobs for zone hierarchy mutations
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct HierarchyConfig {
    /// Attempts for a create whose generated code loses an insert-time race
    pub code_insert_retries: u32,
    /// How properties are attributed to sub-zones
    pub property_linkage: PropertyLinkage,
}

impl Default for HierarchyConfig {
    fn default() -> Self {
        Self {
            code_insert_retries: 3,
            property_linkage: PropertyLinkage::default(),
        }
    }
}

impl HierarchyConfig {
    /// 从环境变量加载
    pub fn from_env() -> Self {
        let defaults = Self::default();
        Self {
            code_insert_retries: std::env::var("CODE_INSERT_RETRIES")
                .ok()
                .and_then(|v| v.parse().ok())
                .filter(|n: &u32| *n > 0)
                .unwrap_or(defaults.code_insert_retries),
            property_linkage: match std::env::var("SUB_ZONE_PROPERTY_LINK") {
                Ok(raw) => raw.parse().unwrap_or_else(|e| {
                    tracing::warn!("{e}, falling back to {}", defaults.property_linkage);
                    defaults.property_linkage
                }),
                Err(_) => defaults.property_linkage,
            },
        }
    }
}

impl Config {
    /// 从环境变量加载配置
    ///
    /// 如果环境变量未设置，使用默认值
    pub fn from_env() -> Self {
        Self {
            database_path: std::env::var("DATABASE_PATH").unwrap_or_else(|_| "billing.db".into()),
            environment: std::env::var("ENVIRONMENT").unwrap_or_else(|_| "development".into()),
            log_level: std::env::var("LOG_LEVEL").unwrap_or_else(|_| "info".into()),
            log_json: std::env::var("LOG_JSON")
                .ok()
                .and_then(|v| v.parse().ok())
                .unwrap_or(false),
            log_dir: std::env::var("LOG_DIR").ok().filter(|d| !d.is_empty()),
            hierarchy: HierarchyConfig::from_env(),
        }
    }

    /// 是否生产环境
    pub fn is_production(&self) -> bool {
        self.environment == "production"
    }
}

impl Default for Config {
    fn default() -> Self {
        Self::from_env()
    }
}
