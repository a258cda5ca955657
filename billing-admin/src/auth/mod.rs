//! Acting user passed explicitly into every mutation

pub mod permissions;

use serde::{Deserialize, Serialize};

use crate::utils::{AppError, AppResult};

/// Authenticated actor as established by the session gate
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Actor {
    pub id: i64,
    pub name: String,
    pub permissions: Vec<String>,
}

impl Actor {
    pub fn new(id: i64, name: impl Into<String>, permissions: Vec<String>) -> Self {
        Self {
            id,
            name: name.into(),
            permissions,
        }
    }

    /// Actor with the default permissions of a role
    pub fn with_role(id: i64, name: impl Into<String>, role: &str) -> Self {
        Self::new(id, name, permissions::get_default_permissions(role))
    }

    pub fn has_permission(&self, permission: &str) -> bool {
        self.permissions
            .iter()
            .any(|p| p == permissions::ALL || p == permission)
    }

    pub fn require(&self, permission: &str) -> AppResult<()> {
        if self.has_permission(permission) {
            Ok(())
        } else {
            tracing::warn!(actor_id = self.id, permission, "Permission denied");
            Err(AppError::forbidden(format!(
                "You do not have permission to perform this action ({permission})"
            )))
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_role_permissions() {
        let admin = Actor::with_role(1, "admin", "admin");
        assert!(admin.has_permission(permissions::ZONES_DELETE));

        let officer = Actor::with_role(2, "officer", "officer");
        assert!(officer.require(permissions::ZONES_MANAGE).is_ok());
        assert!(matches!(
            officer.require(permissions::ZONES_DELETE),
            Err(AppError::Forbidden(_))
        ));

        let guest = Actor::with_role(3, "guest", "viewer");
        assert!(guest.permissions.is_empty());
    }
}
