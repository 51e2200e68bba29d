use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use utoipa::ToSchema;
use uuid::Uuid;

use crate::audit::{LogTarget, Loggable};
use crate::authz::permissions::GROUPS;
use crate::models::user::UserListing;

// =============================================================================
// ROLE
// =============================================================================

#[derive(Debug, Clone, Serialize, Deserialize, ToSchema)]
pub struct Role {
    pub id: Uuid,
    pub name: String,
    pub color: String,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

impl Loggable for Role {
    fn log_target(&self) -> LogTarget {
        LogTarget::Role(self.id)
    }
}

/// Create and rename/recolor form.
#[derive(Debug, Deserialize, ToSchema)]
pub struct RoleForm {
    #[schema(example = "Ops")]
    pub name: String,
    #[schema(example = "#112233")]
    pub color: String,
}

#[derive(Debug, Serialize, ToSchema)]
pub struct RoleSummary {
    #[serde(flatten)]
    pub role: Role,
    pub member_count: i64,
}

#[derive(Debug, Serialize, ToSchema)]
pub struct RoleDetail {
    pub role: Role,
    pub members: Vec<UserListing>,
    /// Permission ids currently granted to the role.
    pub granted: Vec<Uuid>,
    pub catalog: PermissionGroups,
}

// =============================================================================
// PERMISSION
// =============================================================================

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize, ToSchema)]
pub struct Permission {
    pub id: Uuid,
    #[schema(example = "system.roles.create")]
    pub name: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub description: Option<String>,
}

/// Catalog split the way role pages show it. A permission lands in every
/// group whose keyword it contains.
#[derive(Debug, Default, Serialize, ToSchema)]
pub struct PermissionGroups {
    pub system: Vec<Permission>,
    pub disposition: Vec<Permission>,
    pub management: Vec<Permission>,
}

impl PermissionGroups {
    pub fn from_catalog(mut catalog: Vec<Permission>) -> Self {
        catalog.sort_by(|a, b| a.name.cmp(&b.name));

        let pick = |keyword: &str| -> Vec<Permission> {
            catalog
                .iter()
                .filter(|p| p.name.contains(keyword))
                .cloned()
                .collect()
        };

        let [system, disposition, management] = GROUPS;
        Self {
            system: pick(system),
            disposition: pick(disposition),
            management: pick(management),
        }
    }
}
