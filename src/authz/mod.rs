//! Authorization - the access gate in front of every page.
//!
//! Each route group declares an [`AccessPolicy`]; the [`gate`] middleware loads
//! the acting [`Principal`] fresh from storage and evaluates, in order:
//! authentication, privacy / terms / copyright consent, and the required
//! permission strings. The first failing check redirects to a fixed
//! destination and the handler never runs.

mod evaluator;
pub mod gate;
pub mod policy;
mod principal;

pub use evaluator::{Decision, DefaultPolicyEvaluator, Destination, PolicyEvaluator};
pub use policy::AccessPolicy;
pub use principal::{Consent, ConsentKind, Principal, RoleRef};

/// Name of the fallback role every principal lands in.
pub const STANDARD_ROLE: &str = "Standard";

/// Well-known permission names
pub mod permissions {
    // System administration
    pub const SYSTEM_ACCESS: &str = "system.access";
    pub const SYSTEM_CONFIG_APP: &str = "system.config.app";
    pub const SYSTEM_CONFIG_LOGO: &str = "system.config.logo";
    pub const ROLES_CREATE: &str = "system.roles.create";
    pub const ROLES_RENAME: &str = "system.roles.rename";
    pub const ROLES_DELETE: &str = "system.roles.delete";
    pub const ROLES_PERM: &str = "system.roles.perm";
    pub const USERS_ACCESS: &str = "system.users.access";
    pub const LOGS_ACCESS: &str = "system.logs.access";

    // Disposition
    pub const DISPOSITION_ACCESS: &str = "disposition.access";
    pub const LOCATION_CREATE: &str = "disposition.location.create";
    pub const LOCATION_UPDATE: &str = "disposition.location.update";
    pub const LOCATION_DELETE: &str = "disposition.location.delete";
    pub const VEHICLE_CREATE: &str = "disposition.vehicle.create";
    pub const VEHICLE_UPDATE: &str = "disposition.vehicle.update";
    pub const VEHICLE_DELETE: &str = "disposition.vehicle.delete";

    // Management
    pub const MANAGEMENT_ACCESS: &str = "management.access";

    /// Substrings used to group the catalog on role pages.
    pub const GROUPS: [&str; 3] = ["system", "disposition", "management"];
}
