use std::collections::HashSet;

use serde::Serialize;
use sqlx::{Row, SqlitePool};
use utoipa::ToSchema;
use uuid::Uuid;

use crate::db::row_parsers::parse_uuid;
use crate::errors::AppResult;

/// The three legal consents, in the order the gate checks them.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, ToSchema)]
#[serde(rename_all = "lowercase")]
pub enum ConsentKind {
    Privacy,
    Terms,
    Copyright,
}

impl ConsentKind {
    pub const ORDER: [ConsentKind; 3] = [ConsentKind::Privacy, ConsentKind::Terms, ConsentKind::Copyright];

    pub fn as_str(&self) -> &'static str {
        match self {
            ConsentKind::Privacy => "privacy",
            ConsentKind::Terms => "terms",
            ConsentKind::Copyright => "copyright",
        }
    }

    /// Profile column holding the flag.
    pub fn column(&self) -> &'static str {
        self.as_str()
    }

    pub fn title(&self) -> &'static str {
        match self {
            ConsentKind::Privacy => "privacy policy",
            ConsentKind::Terms => "terms of use",
            ConsentKind::Copyright => "copyright notice",
        }
    }
}

#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, ToSchema)]
pub struct Consent {
    pub privacy: bool,
    pub terms: bool,
    pub copyright: bool,
}

impl Consent {
    pub fn all() -> Self {
        Self {
            privacy: true,
            terms: true,
            copyright: true,
        }
    }

    pub fn has(&self, kind: ConsentKind) -> bool {
        match kind {
            ConsentKind::Privacy => self.privacy,
            ConsentKind::Terms => self.terms,
            ConsentKind::Copyright => self.copyright,
        }
    }

    pub fn first_missing(&self) -> Option<ConsentKind> {
        ConsentKind::ORDER.into_iter().find(|kind| !self.has(*kind))
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, ToSchema)]
pub struct RoleRef {
    pub id: Uuid,
    pub name: String,
}

/// The authenticated user together with the role and consent state current
/// at request time.
#[derive(Debug, Clone)]
pub struct Principal {
    pub user_id: Uuid,
    pub username: String,
    pub role: RoleRef,
    pub permissions: HashSet<String>,
    pub consent: Consent,
}

impl Principal {
    pub fn new(user_id: Uuid, username: impl Into<String>, role: RoleRef) -> Self {
        Self {
            user_id,
            username: username.into(),
            role,
            permissions: HashSet::new(),
            consent: Consent::default(),
        }
    }

    pub fn with_permissions(mut self, perms: impl IntoIterator<Item = String>) -> Self {
        self.permissions = perms.into_iter().collect();
        self
    }

    pub fn with_consent(mut self, consent: Consent) -> Self {
        self.consent = consent;
        self
    }

    pub fn has_permission(&self, permission: &str) -> bool {
        self.permissions.contains(permission)
    }

    /// `@username`, the form used in audit messages.
    pub fn handle(&self) -> String {
        format!("@{}", self.username)
    }

    /// Loads the principal with its role's permission set as stored right now.
    pub async fn load(pool: &SqlitePool, user_id: Uuid) -> AppResult<Option<Self>> {
        let row = sqlx::query(
            r#"
            SELECT u.username, p.privacy, p.terms, p.copyright, r.id AS role_id, r.name AS role_name
            FROM users u
            INNER JOIN profiles p ON p.user_id = u.id
            INNER JOIN roles r ON r.id = p.role_id
            WHERE u.id = ?
            "#,
        )
        .bind(user_id.to_string())
        .fetch_optional(pool)
        .await?;

        let Some(row) = row else {
            return Ok(None);
        };

        let role = RoleRef {
            id: parse_uuid(row.try_get("role_id")?)?,
            name: row.try_get("role_name")?,
        };

        let permissions: Vec<String> = sqlx::query_scalar(
            r#"
            SELECT perm.name
            FROM permissions perm
            INNER JOIN role_permissions rp ON rp.permission_id = perm.id
            WHERE rp.role_id = ?
            "#,
        )
        .bind(role.id.to_string())
        .fetch_all(pool)
        .await?;

        let consent = Consent {
            privacy: row.try_get("privacy")?,
            terms: row.try_get("terms")?,
            copyright: row.try_get("copyright")?,
        };

        Ok(Some(
            Principal::new(user_id, row.try_get::<String, _>("username")?, role)
                .with_permissions(permissions)
                .with_consent(consent),
        ))
    }
}
