//! 业务服务
//!
//! - [`ZoneService`] - 区域 / 子区域的创建、修改、删除
//! - [`DependencyChecker`] - 删除前的引用检查
//! - [`code_generator`] - 短代码生成

pub mod code_generator;
pub mod dependency;
pub mod zone_service;

pub use code_generator::{CodeProbe, TxCodeProbe, resolve_unique_code};
pub use dependency::DependencyChecker;
pub use zone_service::ZoneService;
