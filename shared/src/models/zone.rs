//! Zone Model

use serde::{Deserialize, Serialize};

/// Zone entity (top-level billing area)
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[cfg_attr(feature = "db", derive(sqlx::FromRow))]
pub struct Zone {
    pub id: i64,
    pub name: String,
    pub code: Option<String>,
    pub description: Option<String>,
    pub created_by: i64,
    pub created_at: i64,
    pub updated_at: i64,
}

/// Raw zone form fields as submitted by the presentation layer
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct ZoneForm {
    pub name: String,
    #[serde(default)]
    pub code: String,
    #[serde(default)]
    pub description: String,
}

/// Validated create zone payload
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ZoneCreate {
    pub name: String,
    pub code: Option<String>,
    pub description: Option<String>,
}

/// Validated update zone payload
///
/// Replaces every mutable field. `code: None` clears the code.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ZoneUpdate {
    pub name: String,
    pub code: Option<String>,
    pub description: Option<String>,
}

impl From<ZoneCreate> for ZoneUpdate {
    fn from(data: ZoneCreate) -> Self {
        Self {
            name: data.name,
            code: data.code,
            description: data.description,
        }
    }
}

/// Zone row for the listing surface, with dependent counts
#[derive(Debug, Clone, Serialize, Deserialize)]
#[cfg_attr(feature = "db", derive(sqlx::FromRow))]
pub struct ZoneSummary {
    #[serde(flatten)]
    #[cfg_attr(feature = "db", sqlx(flatten))]
    pub zone: Zone,
    pub sub_zone_count: i64,
    pub business_count: i64,
    pub property_count: i64,
}
