//! Declarative requirement lists, one per route group.

use super::permissions as perm;
use super::principal::Principal;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct AccessPolicy {
    /// Shows up in gate logs.
    pub name: &'static str,
    /// Anonymous requests are sent to the login page.
    pub login: bool,
    /// All three consents must be given.
    pub consent: bool,
    /// Every one of these must be held by the principal's role.
    pub permissions: &'static [&'static str],
}

impl AccessPolicy {
    pub const fn public(name: &'static str) -> Self {
        Self {
            name,
            login: false,
            consent: false,
            permissions: &[],
        }
    }

    /// Signed in, consents not yet required (the consent pages themselves).
    pub const fn consent_page(name: &'static str) -> Self {
        Self {
            name,
            login: true,
            consent: false,
            permissions: &[],
        }
    }

    pub const fn member(name: &'static str) -> Self {
        Self {
            name,
            login: true,
            consent: true,
            permissions: &[],
        }
    }

    pub const fn restricted(name: &'static str, permissions: &'static [&'static str]) -> Self {
        Self {
            name,
            login: true,
            consent: true,
            permissions,
        }
    }
}

impl AccessPolicy {
    /// Whether `principal` holds every permission this policy names. Used to
    /// decide which actions a page offers; the gate itself goes through the
    /// evaluator.
    pub fn granted_to(&self, principal: &Principal) -> bool {
        self.permissions.iter().all(|p| principal.has_permission(p))
    }
}

pub const PUBLIC: AccessPolicy = AccessPolicy::public("public");
pub const CONSENT: AccessPolicy = AccessPolicy::consent_page("consent");
pub const MEMBER: AccessPolicy = AccessPolicy::member("member");

pub const SYSTEM: AccessPolicy = AccessPolicy::restricted("system", &[perm::SYSTEM_ACCESS]);
pub const SYSTEM_APP: AccessPolicy =
    AccessPolicy::restricted("system.app", &[perm::SYSTEM_ACCESS, perm::SYSTEM_CONFIG_APP]);
pub const SYSTEM_LOGO: AccessPolicy =
    AccessPolicy::restricted("system.logo", &[perm::SYSTEM_ACCESS, perm::SYSTEM_CONFIG_LOGO]);

pub const ROLES: AccessPolicy = AccessPolicy::restricted("roles", &[perm::SYSTEM_ACCESS]);
pub const ROLES_CREATE: AccessPolicy =
    AccessPolicy::restricted("roles.create", &[perm::SYSTEM_ACCESS, perm::ROLES_CREATE]);
pub const ROLES_RENAME: AccessPolicy =
    AccessPolicy::restricted("roles.rename", &[perm::SYSTEM_ACCESS, perm::ROLES_RENAME]);
pub const ROLES_DELETE: AccessPolicy =
    AccessPolicy::restricted("roles.delete", &[perm::SYSTEM_ACCESS, perm::ROLES_DELETE]);
pub const ROLES_PERM: AccessPolicy =
    AccessPolicy::restricted("roles.perm", &[perm::SYSTEM_ACCESS, perm::ROLES_PERM]);

pub const USERS: AccessPolicy = AccessPolicy::restricted("users", &[perm::SYSTEM_ACCESS, perm::USERS_ACCESS]);
pub const LOGS: AccessPolicy = AccessPolicy::restricted("logs", &[perm::SYSTEM_ACCESS, perm::LOGS_ACCESS]);

pub const DISPOSITION: AccessPolicy = AccessPolicy::restricted("disposition", &[perm::DISPOSITION_ACCESS]);
pub const LOCATION_CREATE: AccessPolicy =
    AccessPolicy::restricted("location.create", &[perm::DISPOSITION_ACCESS, perm::LOCATION_CREATE]);
pub const LOCATION_UPDATE: AccessPolicy =
    AccessPolicy::restricted("location.update", &[perm::DISPOSITION_ACCESS, perm::LOCATION_UPDATE]);
pub const LOCATION_DELETE: AccessPolicy =
    AccessPolicy::restricted("location.delete", &[perm::DISPOSITION_ACCESS, perm::LOCATION_DELETE]);
pub const VEHICLE_CREATE: AccessPolicy =
    AccessPolicy::restricted("vehicle.create", &[perm::DISPOSITION_ACCESS, perm::VEHICLE_CREATE]);
pub const VEHICLE_UPDATE: AccessPolicy =
    AccessPolicy::restricted("vehicle.update", &[perm::DISPOSITION_ACCESS, perm::VEHICLE_UPDATE]);
pub const VEHICLE_DELETE: AccessPolicy =
    AccessPolicy::restricted("vehicle.delete", &[perm::DISPOSITION_ACCESS, perm::VEHICLE_DELETE]);
