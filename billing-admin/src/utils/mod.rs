//! 工具模块 - 通用工具函数和类型
//!
//! - [`AppError`] - 应用错误类型
//! - 日志初始化
//! - 表单校验

pub mod error;
pub mod logger;
pub mod result;
pub mod validation;

pub use error::{AppError, ConflictField, GENERIC_FAILURE_MESSAGE};
pub use result::AppResult;
