//! 审计日志类型定义

use serde::{Deserialize, Serialize};

use super::diff::FieldChange;

/// 审计操作类型（枚举，非自由文本）
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum AuditAction {
    CreateZone,
    UpdateZone,
    DeleteZone,
    CreateSubZone,
    UpdateSubZone,
    DeleteSubZone,
}

impl AuditAction {
    pub fn as_str(&self) -> &'static str {
        match self {
            AuditAction::CreateZone => "CREATE_ZONE",
            AuditAction::UpdateZone => "UPDATE_ZONE",
            AuditAction::DeleteZone => "DELETE_ZONE",
            AuditAction::CreateSubZone => "CREATE_SUB_ZONE",
            AuditAction::UpdateSubZone => "UPDATE_SUB_ZONE",
            AuditAction::DeleteSubZone => "DELETE_SUB_ZONE",
        }
    }

    /// Table the action mutates
    pub fn table(&self) -> &'static str {
        match self {
            AuditAction::CreateZone | AuditAction::UpdateZone | AuditAction::DeleteZone => "zone",
            AuditAction::CreateSubZone
            | AuditAction::UpdateSubZone
            | AuditAction::DeleteSubZone => "sub_zone",
        }
    }
}

impl std::fmt::Display for AuditAction {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.as_str())
    }
}

impl std::str::FromStr for AuditAction {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s {
            "CREATE_ZONE" => Ok(AuditAction::CreateZone),
            "UPDATE_ZONE" => Ok(AuditAction::UpdateZone),
            "DELETE_ZONE" => Ok(AuditAction::DeleteZone),
            "CREATE_SUB_ZONE" => Ok(AuditAction::CreateSubZone),
            "UPDATE_SUB_ZONE" => Ok(AuditAction::UpdateSubZone),
            "DELETE_SUB_ZONE" => Ok(AuditAction::DeleteSubZone),
            other => Err(format!("Unknown audit action: {other}")),
        }
    }
}

/// 审计日志条目（不可变）
///
/// - `before`: `None` for creates
/// - `after`: `None` for deletes
/// - `changes`: field-level diff, only filled for updates
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct AuditRecord {
    pub action: AuditAction,
    pub table: String,
    pub record_id: i64,
    pub actor_id: i64,
    pub actor_name: Option<String>,
    pub before: Option<serde_json::Value>,
    pub after: Option<serde_json::Value>,
    #[serde(default)]
    pub changes: Vec<FieldChange>,
    /// Unix millis
    pub created_at: i64,
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_action_tags() {
        assert_eq!(AuditAction::DeleteSubZone.to_string(), "DELETE_SUB_ZONE");
        assert_eq!(
            serde_json::to_value(AuditAction::CreateZone).unwrap(),
            serde_json::json!("CREATE_ZONE")
        );
        assert_eq!("UPDATE_ZONE".parse::<AuditAction>(), Ok(AuditAction::UpdateZone));
        assert_eq!(AuditAction::UpdateSubZone.table(), "sub_zone");
    }
}
