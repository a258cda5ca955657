//! 审计快照与字段差异
//!
//! Zone records are flat, so the diff compares top-level fields only.

use std::collections::BTreeSet;

use serde::{Deserialize, Serialize};
use serde_json::{Map, Value};

/// Fields left out of snapshots (carried by `record_id` instead)
const SNAPSHOT_EXCLUDE: &[&str] = &["id"];
/// Fields that change on every write and are not reported as changes
const DIFF_EXCLUDE: &[&str] = &["id", "created_at", "updated_at"];

/// 字段变更记录
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct FieldChange {
    pub field: String,
    pub from: Value,
    pub to: Value,
}

fn to_object<T: Serialize>(value: &T, exclude: &[&str]) -> Map<String, Value> {
    match serde_json::to_value(value) {
        Ok(Value::Object(mut obj)) => {
            for field in exclude {
                obj.remove(*field);
            }
            obj
        }
        Ok(other) => {
            let mut obj = Map::new();
            obj.insert("value".to_string(), other);
            obj
        }
        Err(e) => {
            tracing::error!("Failed to serialize audit snapshot: {:?}", e);
            let mut obj = Map::new();
            obj.insert("error".to_string(), Value::from("serialization_failed"));
            obj
        }
    }
}

/// Snapshot of a record for the `before` / `after` columns
pub fn create_snapshot<T: Serialize>(value: &T) -> Value {
    Value::Object(to_object(value, SNAPSHOT_EXCLUDE))
}

/// Field-level changes between two versions of a record, sorted by field
pub fn create_diff<T: Serialize>(from: &T, to: &T) -> Vec<FieldChange> {
    let from = to_object(from, DIFF_EXCLUDE);
    let to = to_object(to, DIFF_EXCLUDE);
    let keys: BTreeSet<&String> = from.keys().chain(to.keys()).collect();

    keys.into_iter()
        .filter_map(|key| {
            let old = from.get(key).cloned().unwrap_or(Value::Null);
            let new = to.get(key).cloned().unwrap_or(Value::Null);
            (old != new).then(|| FieldChange {
                field: key.clone(),
                from: old,
                to: new,
            })
        })
        .collect()
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;
    use shared::models::Zone;

    fn zone(name: &str, code: Option<&str>, updated_at: i64) -> Zone {
        Zone {
            id: 7,
            name: name.to_string(),
            code: code.map(str::to_string),
            description: None,
            created_by: 1,
            created_at: 100,
            updated_at,
        }
    }

    #[test]
    fn test_snapshot_drops_id() {
        let snapshot = create_snapshot(&zone("Harbour", Some("HA"), 100));
        assert_eq!(snapshot["name"], json!("Harbour"));
        assert_eq!(snapshot["code"], json!("HA"));
        assert!(snapshot.get("id").is_none());
    }

    #[test]
    fn test_diff_reports_changed_fields_only() {
        let before = zone("Harbour", Some("HA"), 100);
        let after = zone("Harbour East", None, 200);
        let changes = create_diff(&before, &after);
        assert_eq!(
            changes,
            vec![
                FieldChange {
                    field: "code".to_string(),
                    from: json!("HA"),
                    to: Value::Null,
                },
                FieldChange {
                    field: "name".to_string(),
                    from: json!("Harbour"),
                    to: json!("Harbour East"),
                },
            ]
        );
        assert!(create_diff(&before, &before).is_empty());
    }
}
