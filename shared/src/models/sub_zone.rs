//! Sub-Zone Model

use serde::{Deserialize, Serialize};

/// Sub-zone entity, a subdivision of exactly one zone
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[cfg_attr(feature = "db", derive(sqlx::FromRow))]
pub struct SubZone {
    pub id: i64,
    /// Parent zone, fixed at creation
    pub zone_id: i64,
    pub name: String,
    pub code: Option<String>,
    pub description: Option<String>,
    pub created_by: i64,
    pub created_at: i64,
    pub updated_at: i64,
}

/// Raw sub-zone form fields as submitted by the presentation layer
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct SubZoneForm {
    pub zone_id: i64,
    pub name: String,
    #[serde(default)]
    pub code: String,
    #[serde(default)]
    pub description: String,
}

/// Validated create sub-zone payload
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct SubZoneCreate {
    pub zone_id: i64,
    pub name: String,
    pub code: Option<String>,
    pub description: Option<String>,
}

/// Validated update sub-zone payload
///
/// There is no `zone_id`: a sub-zone is never re-parented.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct SubZoneUpdate {
    pub name: String,
    pub code: Option<String>,
    pub description: Option<String>,
}

impl From<SubZoneCreate> for SubZoneUpdate {
    fn from(data: SubZoneCreate) -> Self {
        Self {
            name: data.name,
            code: data.code,
            description: data.description,
        }
    }
}

/// Sub-zone row for the listing surface, with dependent counts
#[derive(Debug, Clone, Serialize, Deserialize)]
#[cfg_attr(feature = "db", derive(sqlx::FromRow))]
pub struct SubZoneSummary {
    #[serde(flatten)]
    #[cfg_attr(feature = "db", sqlx(flatten))]
    pub sub_zone: SubZone,
    pub business_count: i64,
    pub property_count: i64,
}
