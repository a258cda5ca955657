//! Permission Definitions
//!
//! Permissions are granted by the session gate outside this crate and
//! arrive on every call inside an [`Actor`](super::Actor).

/// 超级权限
pub const ALL: &str = "all";

/// Create and edit zones and sub-zones
pub const ZONES_MANAGE: &str = "zones:manage";

/// Delete zones and sub-zones
pub const ZONES_DELETE: &str = "zones:delete";

/// Default role permissions
pub const DEFAULT_ADMIN_PERMISSIONS: &[&str] = &[ALL];

/// Zone officers maintain the hierarchy but cannot delete from it
pub const DEFAULT_OFFICER_PERMISSIONS: &[&str] = &[ZONES_MANAGE];

/// Get permissions for a role name
pub fn get_default_permissions(role_name: &str) -> Vec<String> {
    let permissions: &[&str] = match role_name {
        "admin" => DEFAULT_ADMIN_PERMISSIONS,
        "officer" => DEFAULT_OFFICER_PERMISSIONS,
        _ => &[],
    };
    permissions.iter().map(|s| s.to_string()).collect()
}
