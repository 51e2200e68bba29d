//! Role administration.
//!
//! Roles are addressed by name. Every change that lands is written to the
//! audit log in the ADMINISTRATION category after it has been committed.

use std::collections::BTreeSet;

use axum::extract::{Path, State};
use axum::http::HeaderMap;
use axum::routing::get;
use axum::{Extension, Json, Router};
use serde::Serialize;
use sqlx::{QueryBuilder, Sqlite, SqlitePool};
use utoipa::ToSchema;
use uuid::Uuid;

use super::{see_other, SeeOther};
use crate::app::AppState;
use crate::audit::{LogAction, LogCategory, NewLogEntry, RequestContext};
use crate::authz::gate::guard;
use crate::authz::{policy, Principal, STANDARD_ROLE};
use crate::db::row_parsers;
use crate::errors::{AppError, AppResult, Validator};
use crate::extract::Form;
use crate::models::role::{Permission, PermissionGroups, Role, RoleDetail, RoleForm, RoleSummary};
use crate::models::user::UserListing;
use crate::page::{render, Page};
use crate::utils::{encode_query_value, is_hex_color, utc_now};

// =============================================================================
// ROUTER
// =============================================================================

pub fn routes(state: &AppState) -> Router<AppState> {
    let browse = Router::new()
        .route("/roles", get(list_roles))
        .route("/roles/:name", get(role_detail))
        .route("/roles/:name/manage", get(manage_role))
        .route("/roles/:name/users/add", get(members_form).post(update_members));

    Router::new()
        .merge(guard(state, policy::ROLES, browse))
        .merge(guard(
            state,
            policy::ROLES_CREATE,
            Router::new().route("/roles/create", get(create_form).post(create_role)),
        ))
        .merge(guard(
            state,
            policy::ROLES_RENAME,
            Router::new().route("/roles/:name/manage/update", get(update_form).post(update_role)),
        ))
        .merge(guard(
            state,
            policy::ROLES_DELETE,
            Router::new().route("/roles/:name/manage/delete", get(delete_form).post(delete_role)),
        ))
        .merge(guard(
            state,
            policy::ROLES_PERM,
            Router::new().route(
                "/roles/:name/manage/permissions",
                get(permissions_form).post(update_permissions),
            ),
        ))
}

fn role_location(name: &str) -> String {
    format!("/roles/{}", encode_query_value(name))
}

/// Letters, digits, `-` and `_`; names appear in URLs.
fn is_slug(name: &str) -> bool {
    (1..=64).contains(&name.len()) && name.chars().all(|c| c.is_ascii_alphanumeric() || c == '-' || c == '_')
}

/// Multi-valued form fields (`selected_permissions=a&selected_permissions=b`).
fn values_of(pairs: &[(String, String)], key: &str) -> Vec<String> {
    pairs
        .iter()
        .filter(|(k, _)| k == key)
        .map(|(_, v)| v.trim().to_string())
        .filter(|v| !v.is_empty())
        .collect()
}

fn parse_ids(values: Vec<String>, field: &str) -> AppResult<BTreeSet<Uuid>> {
    values
        .iter()
        .map(|v| Uuid::parse_str(v).map_err(|_| AppError::field(field, format!("unknown id {v}"))))
        .collect()
}

// =============================================================================
// QUERIES
// =============================================================================

const ROLE_COLUMNS: &str = "id, name, color, created_at, updated_at";

pub(crate) async fn role_by_name(pool: &SqlitePool, name: &str) -> AppResult<Role> {
    let row = sqlx::query(&format!("SELECT {ROLE_COLUMNS} FROM roles WHERE name = ?"))
        .bind(name)
        .fetch_optional(pool)
        .await?
        .ok_or_else(|| AppError::not_found(format!("role {name} not found")))?;

    row_parsers::role_from_row(&row)
}

async fn name_taken(pool: &SqlitePool, name: &str, except: Option<Uuid>) -> AppResult<bool> {
    let count: i64 = sqlx::query_scalar("SELECT COUNT(1) FROM roles WHERE name = ? COLLATE NOCASE AND id != ?")
        .bind(name)
        .bind(except.map(|id| id.to_string()).unwrap_or_default())
        .fetch_one(pool)
        .await?;
    Ok(count > 0)
}

pub(crate) async fn members_of(pool: &SqlitePool, role_id: Uuid) -> AppResult<Vec<UserListing>> {
    let rows = sqlx::query(
        r#"
        SELECT u.id, u.username, u.first_name, u.last_name, r.id AS role_id, r.name AS role_name
        FROM users u
        INNER JOIN profiles p ON p.user_id = u.id
        INNER JOIN roles r ON r.id = p.role_id
        WHERE r.id = ?
        ORDER BY lower(u.first_name), lower(u.last_name), lower(u.username)
        "#,
    )
    .bind(role_id.to_string())
    .fetch_all(pool)
    .await?;

    rows.iter().map(row_parsers::user_listing_from_row).collect()
}

async fn granted_permissions(pool: &SqlitePool, role_id: Uuid) -> AppResult<BTreeSet<Uuid>> {
    let ids: Vec<String> = sqlx::query_scalar("SELECT permission_id FROM role_permissions WHERE role_id = ?")
        .bind(role_id.to_string())
        .fetch_all(pool)
        .await?;

    ids.into_iter().map(row_parsers::parse_uuid).collect()
}

pub(crate) async fn permission_catalog(pool: &SqlitePool) -> AppResult<Vec<Permission>> {
    let rows = sqlx::query("SELECT id, name, description FROM permissions ORDER BY name")
        .fetch_all(pool)
        .await?;

    rows.iter().map(row_parsers::permission_from_row).collect()
}

async fn detail_of(pool: &SqlitePool, role: Role) -> AppResult<RoleDetail> {
    let members = members_of(pool, role.id).await?;
    let granted = granted_permissions(pool, role.id).await?.into_iter().collect();
    let catalog = PermissionGroups::from_catalog(permission_catalog(pool).await?);

    Ok(RoleDetail {
        role,
        members,
        granted,
        catalog,
    })
}

// =============================================================================
// BROWSE
// =============================================================================

#[utoipa::path(
    get,
    path = "/roles",
    tag = "Roles",
    responses(
        (status = 200, description = "Roles with member counts"),
        (status = 303, description = "Redirect to login, consent or denied")
    ),
    security(("bearerAuth" = []))
)]
pub async fn list_roles(
    State(state): State<AppState>,
    Extension(principal): Extension<Principal>,
) -> AppResult<Json<Page<Vec<RoleSummary>>>> {
    let rows = sqlx::query(
        r#"
        SELECT r.id, r.name, r.color, r.created_at, r.updated_at,
               (SELECT COUNT(1) FROM profiles p WHERE p.role_id = r.id) AS member_count
        FROM roles r
        ORDER BY lower(r.name)
        "#,
    )
    .fetch_all(&state.pool)
    .await?;

    let roles = rows
        .iter()
        .map(|row| {
            Ok(RoleSummary {
                role: row_parsers::role_from_row(row)?,
                member_count: sqlx::Row::try_get(row, "member_count")?,
            })
        })
        .collect::<AppResult<Vec<_>>>()?;

    render(&state.pool, Some(&principal), roles).await
}

#[utoipa::path(
    get,
    path = "/roles/{name}",
    tag = "Roles",
    params(("name" = String, Path, description = "Role name")),
    responses((status = 200, description = "Role with members and permissions"), (status = 404, description = "Unknown role")),
    security(("bearerAuth" = []))
)]
pub async fn role_detail(
    State(state): State<AppState>,
    Extension(principal): Extension<Principal>,
    Path(name): Path<String>,
) -> AppResult<Json<Page<RoleDetail>>> {
    let role = role_by_name(&state.pool, &name).await?;
    let detail = detail_of(&state.pool, role).await?;
    render(&state.pool, Some(&principal), detail).await
}

/// Management view: the detail plus what the viewer may change.
#[derive(Debug, Serialize, ToSchema)]
pub struct RoleManagement {
    #[serde(flatten)]
    pub detail: RoleDetail,
    pub can_rename: bool,
    pub can_delete: bool,
    pub can_edit_permissions: bool,
}

#[utoipa::path(
    get,
    path = "/roles/{name}/manage",
    tag = "Roles",
    params(("name" = String, Path, description = "Role name")),
    responses((status = 200, description = "Role management page"), (status = 404, description = "Unknown role")),
    security(("bearerAuth" = []))
)]
pub async fn manage_role(
    State(state): State<AppState>,
    Extension(principal): Extension<Principal>,
    Path(name): Path<String>,
) -> AppResult<Json<Page<RoleManagement>>> {
    let role = role_by_name(&state.pool, &name).await?;
    let fixed = role.name == STANDARD_ROLE;
    let detail = detail_of(&state.pool, role).await?;

    let management = RoleManagement {
        detail,
        can_rename: policy::ROLES_RENAME.granted_to(&principal),
        can_delete: !fixed && policy::ROLES_DELETE.granted_to(&principal),
        can_edit_permissions: policy::ROLES_PERM.granted_to(&principal),
    };

    render(&state.pool, Some(&principal), management).await
}

// =============================================================================
// CREATE
// =============================================================================

#[derive(Debug, Serialize, ToSchema)]
pub struct RoleFormPage {
    pub role: Option<Role>,
    pub action: String,
}

#[utoipa::path(
    get,
    path = "/roles/create",
    tag = "Roles",
    responses((status = 200, description = "Empty role form"), (status = 303, description = "Redirect to login, consent or denied")),
    security(("bearerAuth" = []))
)]
pub async fn create_form(
    State(state): State<AppState>,
    Extension(principal): Extension<Principal>,
) -> AppResult<Json<Page<RoleFormPage>>> {
    render(
        &state.pool,
        Some(&principal),
        RoleFormPage {
            role: None,
            action: "/roles/create".to_string(),
        },
    )
    .await
}

async fn validate_role_form(pool: &SqlitePool, form: &RoleForm, except: Option<Uuid>) -> AppResult<(String, String)> {
    let name = form.name.trim().to_string();
    let color = form.color.trim().to_lowercase();

    let mut v = Validator::new();
    v.check(!name.is_empty(), "name", "this field is required")
        .check(name.is_empty() || is_slug(&name), "name", "letters, digits, - and _ only (max. 64)")
        .check(is_hex_color(&color), "color", "enter a color as #RRGGBB");
    v.finish()?;

    if name_taken(pool, &name, except).await? {
        return Err(AppError::field("name", "a role with this name already exists"));
    }

    Ok((name, color))
}

#[utoipa::path(
    post,
    path = "/roles/create",
    tag = "Roles",
    request_body(content = RoleForm, content_type = "application/x-www-form-urlencoded"),
    responses(
        (status = 303, description = "Role created; redirect to its page"),
        (status = 422, description = "Field errors")
    ),
    security(("bearerAuth" = []))
)]
pub async fn create_role(
    State(state): State<AppState>,
    Extension(principal): Extension<Principal>,
    headers: HeaderMap,
    Form(form): Form<RoleForm>,
) -> AppResult<SeeOther> {
    let (name, color) = validate_role_form(&state.pool, &form, None).await?;

    let now = utc_now();
    let role = Role {
        id: Uuid::new_v4(),
        name,
        color,
        created_at: now,
        updated_at: now,
    };

    sqlx::query("INSERT INTO roles (id, name, color, created_at, updated_at) VALUES (?, ?, ?, ?, ?)")
        .bind(role.id.to_string())
        .bind(&role.name)
        .bind(&role.color)
        .bind(now.to_rfc3339())
        .bind(now.to_rfc3339())
        .execute(&state.pool)
        .await?;

    tracing::info!(role = %role.name, by = %principal.username, "role created");

    state
        .audit
        .append_all([NewLogEntry::new(
            &principal,
            LogAction::Create,
            LogCategory::Administration,
            format!("{} created the role {}.", principal.handle(), role.name),
        )
        .about(&role)
        .with_context(RequestContext::from_headers(&headers))])
        .await;

    see_other(role_location(&role.name))
}

// =============================================================================
// RENAME / RECOLOR
// =============================================================================

#[utoipa::path(
    get,
    path = "/roles/{name}/manage/update",
    tag = "Roles",
    params(("name" = String, Path, description = "Role name")),
    responses((status = 200, description = "Prefilled role form"), (status = 404, description = "Unknown role")),
    security(("bearerAuth" = []))
)]
pub async fn update_form(
    State(state): State<AppState>,
    Extension(principal): Extension<Principal>,
    Path(name): Path<String>,
) -> AppResult<Json<Page<RoleFormPage>>> {
    let role = role_by_name(&state.pool, &name).await?;
    let action = format!("{}/manage/update", role_location(&role.name));
    render(&state.pool, Some(&principal), RoleFormPage { role: Some(role), action }).await
}

/// One entry per changed attribute: recoloring and renaming in the same
/// submission writes two, saving unchanged values writes none.
#[utoipa::path(
    post,
    path = "/roles/{name}/manage/update",
    tag = "Roles",
    params(("name" = String, Path, description = "Role name")),
    request_body(content = RoleForm, content_type = "application/x-www-form-urlencoded"),
    responses(
        (status = 303, description = "Saved; redirect to the role page"),
        (status = 409, description = "The Standard role cannot be renamed"),
        (status = 422, description = "Field errors")
    ),
    security(("bearerAuth" = []))
)]
pub async fn update_role(
    State(state): State<AppState>,
    Extension(principal): Extension<Principal>,
    Path(name): Path<String>,
    headers: HeaderMap,
    Form(form): Form<RoleForm>,
) -> AppResult<SeeOther> {
    let role = role_by_name(&state.pool, &name).await?;
    let (new_name, new_color) = validate_role_form(&state.pool, &form, Some(role.id)).await?;

    if role.name == STANDARD_ROLE && new_name != role.name {
        return Err(AppError::conflict("the Standard role cannot be renamed"));
    }

    let recolored = new_color != role.color;
    let renamed = new_name != role.name;
    if !recolored && !renamed {
        return see_other(role_location(&role.name));
    }

    sqlx::query("UPDATE roles SET name = ?, color = ?, updated_at = ? WHERE id = ?")
        .bind(&new_name)
        .bind(&new_color)
        .bind(utc_now().to_rfc3339())
        .bind(role.id.to_string())
        .execute(&state.pool)
        .await?;

    let context = RequestContext::from_headers(&headers);
    let mut entries = Vec::with_capacity(2);
    if recolored {
        entries.push(
            NewLogEntry::new(
                &principal,
                LogAction::Update,
                LogCategory::Administration,
                format!("{} recolored '{}'.", principal.handle(), role.name),
            )
            .about(&role)
            .with_context(context.clone()),
        );
    }
    if renamed {
        entries.push(
            NewLogEntry::new(
                &principal,
                LogAction::Update,
                LogCategory::Administration,
                format!("{} renamed '{}' to '{}'.", principal.handle(), role.name, new_name),
            )
            .about(&role)
            .with_context(context),
        );
    }
    state.audit.append_all(entries).await;

    see_other(role_location(&new_name))
}

// =============================================================================
// DELETE
// =============================================================================

#[derive(Debug, Serialize, ToSchema)]
pub struct RoleDeletePage {
    pub role: Role,
    pub member_count: i64,
    /// False for the Standard role and for roles that still have members.
    pub deletable: bool,
}

async fn member_count(pool: &SqlitePool, role_id: Uuid) -> AppResult<i64> {
    Ok(sqlx::query_scalar("SELECT COUNT(1) FROM profiles WHERE role_id = ?")
        .bind(role_id.to_string())
        .fetch_one(pool)
        .await?)
}

#[utoipa::path(
    get,
    path = "/roles/{name}/manage/delete",
    tag = "Roles",
    params(("name" = String, Path, description = "Role name")),
    responses((status = 200, description = "Delete confirmation"), (status = 404, description = "Unknown role")),
    security(("bearerAuth" = []))
)]
pub async fn delete_form(
    State(state): State<AppState>,
    Extension(principal): Extension<Principal>,
    Path(name): Path<String>,
) -> AppResult<Json<Page<RoleDeletePage>>> {
    let role = role_by_name(&state.pool, &name).await?;
    let member_count = member_count(&state.pool, role.id).await?;
    let deletable = role.name != STANDARD_ROLE && member_count == 0;

    render(
        &state.pool,
        Some(&principal),
        RoleDeletePage {
            role,
            member_count,
            deletable,
        },
    )
    .await
}

/// Members are never moved implicitly: a role that still has members is refused.
#[utoipa::path(
    post,
    path = "/roles/{name}/manage/delete",
    tag = "Roles",
    params(("name" = String, Path, description = "Role name")),
    responses(
        (status = 303, description = "Deleted; redirect to /roles"),
        (status = 404, description = "Unknown role"),
        (status = 409, description = "Standard role, or role still has members")
    ),
    security(("bearerAuth" = []))
)]
pub async fn delete_role(
    State(state): State<AppState>,
    Extension(principal): Extension<Principal>,
    Path(name): Path<String>,
    headers: HeaderMap,
) -> AppResult<SeeOther> {
    let role = role_by_name(&state.pool, &name).await?;

    if role.name == STANDARD_ROLE {
        return Err(AppError::conflict("the Standard role cannot be deleted"));
    }

    let members = member_count(&state.pool, role.id).await?;
    if members > 0 {
        return Err(AppError::conflict(format!(
            "role {} still has {} member(s); move them first",
            role.name, members
        )));
    }

    sqlx::query("DELETE FROM roles WHERE id = ?")
        .bind(role.id.to_string())
        .execute(&state.pool)
        .await?;

    tracing::info!(role = %role.name, by = %principal.username, "role deleted");

    state
        .audit
        .append_all([NewLogEntry::new(
            &principal,
            LogAction::Delete,
            LogCategory::Administration,
            format!("{} deleted '{}'.", principal.handle(), role.name),
        )
        .about(&role)
        .with_context(RequestContext::from_headers(&headers))])
        .await;

    see_other("/roles")
}

// =============================================================================
// PERMISSIONS
// =============================================================================

#[utoipa::path(
    get,
    path = "/roles/{name}/manage/permissions",
    tag = "Roles",
    params(("name" = String, Path, description = "Role name")),
    responses((status = 200, description = "Grouped catalog with the role's grants"), (status = 404, description = "Unknown role")),
    security(("bearerAuth" = []))
)]
pub async fn permissions_form(
    State(state): State<AppState>,
    Extension(principal): Extension<Principal>,
    Path(name): Path<String>,
) -> AppResult<Json<Page<RoleDetail>>> {
    let role = role_by_name(&state.pool, &name).await?;
    let detail = detail_of(&state.pool, role).await?;
    render(&state.pool, Some(&principal), detail).await
}

/// Replaces the role's permission set with `selected_permissions`.
#[utoipa::path(
    post,
    path = "/roles/{name}/manage/permissions",
    tag = "Roles",
    params(("name" = String, Path, description = "Role name")),
    responses(
        (status = 303, description = "Saved; redirect to the management page"),
        (status = 422, description = "Unknown permission id")
    ),
    security(("bearerAuth" = []))
)]
pub async fn update_permissions(
    State(state): State<AppState>,
    Extension(principal): Extension<Principal>,
    Path(name): Path<String>,
    headers: HeaderMap,
    Form(pairs): Form<Vec<(String, String)>>,
) -> AppResult<SeeOther> {
    let role = role_by_name(&state.pool, &name).await?;
    let selected = parse_ids(values_of(&pairs, "selected_permissions"), "selected_permissions")?;
    let done = format!("{}/manage", role_location(&role.name));

    let known: BTreeSet<Uuid> = permission_catalog(&state.pool).await?.into_iter().map(|p| p.id).collect();
    if let Some(unknown) = selected.difference(&known).next() {
        return Err(AppError::field("selected_permissions", format!("unknown permission {unknown}")));
    }

    let current = granted_permissions(&state.pool, role.id).await?;
    if current == selected {
        return see_other(done);
    }

    let mut tx = state.pool.begin().await?;
    sqlx::query("DELETE FROM role_permissions WHERE role_id = ?")
        .bind(role.id.to_string())
        .execute(&mut *tx)
        .await?;

    if !selected.is_empty() {
        let mut insert: QueryBuilder<Sqlite> = QueryBuilder::new("INSERT INTO role_permissions (role_id, permission_id) ");
        insert.push_values(&selected, |mut b, permission_id| {
            b.push_bind(role.id.to_string()).push_bind(permission_id.to_string());
        });
        insert.build().execute(&mut *tx).await?;
    }
    tx.commit().await?;

    tracing::info!(
        role = %role.name,
        granted = selected.difference(&current).count(),
        revoked = current.difference(&selected).count(),
        "role permissions changed"
    );

    state
        .audit
        .append_all([NewLogEntry::new(
            &principal,
            LogAction::Update,
            LogCategory::Administration,
            format!("{} changed the permissions of '{}'.", principal.handle(), role.name),
        )
        .about(&role)
        .with_context(RequestContext::from_headers(&headers))])
        .await;

    see_other(done)
}

// =============================================================================
// MEMBERS
// =============================================================================

#[derive(Debug, Serialize, ToSchema)]
pub struct MembersForm {
    pub role: Role,
    pub users: Vec<UserListing>,
    pub selected: Vec<Uuid>,
}

#[utoipa::path(
    get,
    path = "/roles/{name}/users/add",
    tag = "Roles",
    params(("name" = String, Path, description = "Role name")),
    responses((status = 200, description = "All users with the current members selected")),
    security(("bearerAuth" = []))
)]
pub async fn members_form(
    State(state): State<AppState>,
    Extension(principal): Extension<Principal>,
    Path(name): Path<String>,
) -> AppResult<Json<Page<MembersForm>>> {
    let role = role_by_name(&state.pool, &name).await?;
    let selected = members_of(&state.pool, role.id).await?.into_iter().map(|u| u.id).collect();
    let users = super::users::search_users(&state.pool, "", None).await?;

    render(&state.pool, Some(&principal), MembersForm { role, users, selected }).await
}

/// `selected_users` becomes the member list. Users taken out of the role fall
/// back to Standard.
#[utoipa::path(
    post,
    path = "/roles/{name}/users/add",
    tag = "Roles",
    params(("name" = String, Path, description = "Role name")),
    responses(
        (status = 303, description = "Saved; redirect to the role page"),
        (status = 422, description = "Unknown user id")
    ),
    security(("bearerAuth" = []))
)]
pub async fn update_members(
    State(state): State<AppState>,
    Extension(principal): Extension<Principal>,
    Path(name): Path<String>,
    headers: HeaderMap,
    Form(pairs): Form<Vec<(String, String)>>,
) -> AppResult<SeeOther> {
    let role = role_by_name(&state.pool, &name).await?;
    let selected = parse_ids(values_of(&pairs, "selected_users"), "selected_users")?;
    let done = role_location(&role.name);

    let existing: Vec<String> = sqlx::query_scalar("SELECT user_id FROM profiles")
        .fetch_all(&state.pool)
        .await?;
    let existing: BTreeSet<Uuid> = existing
        .into_iter()
        .map(row_parsers::parse_uuid)
        .collect::<AppResult<_>>()?;
    if let Some(unknown) = selected.difference(&existing).next() {
        return Err(AppError::field("selected_users", format!("unknown user {unknown}")));
    }

    let current: BTreeSet<Uuid> = members_of(&state.pool, role.id).await?.into_iter().map(|u| u.id).collect();
    let added: Vec<Uuid> = selected.difference(&current).copied().collect();
    // Nobody can leave Standard through this form: it is the fallback itself.
    let removed: Vec<Uuid> = if role.name == STANDARD_ROLE {
        Vec::new()
    } else {
        current.difference(&selected).copied().collect()
    };

    if added.is_empty() && removed.is_empty() {
        return see_other(done);
    }

    let standard = role_by_name(&state.pool, STANDARD_ROLE).await?;

    let mut tx = state.pool.begin().await?;
    for (users, target) in [(&added, role.id), (&removed, standard.id)] {
        if users.is_empty() {
            continue;
        }
        let mut update: QueryBuilder<Sqlite> = QueryBuilder::new("UPDATE profiles SET role_id = ");
        update.push_bind(target.to_string()).push(" WHERE user_id IN (");
        let mut ids = update.separated(", ");
        for id in users.iter() {
            ids.push_bind(id.to_string());
        }
        ids.push_unseparated(")");
        update.build().execute(&mut *tx).await?;
    }
    tx.commit().await?;

    tracing::info!(role = %role.name, added = added.len(), removed = removed.len(), "role members changed");

    state
        .audit
        .append_all([NewLogEntry::new(
            &principal,
            LogAction::Update,
            LogCategory::Administration,
            format!(
                "{} changed the members of '{}' ({} added, {} moved to {}).",
                principal.handle(),
                role.name,
                added.len(),
                removed.len(),
                STANDARD_ROLE
            ),
        )
        .about(&role)
        .with_context(RequestContext::from_headers(&headers))])
        .await;

    see_other(done)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn slugs() {
        assert!(is_slug("Ops"));
        assert!(is_slug("field-team_2"));
        assert!(!is_slug("Field Team"));
        assert!(!is_slug(""));
        assert!(!is_slug(&"a".repeat(65)));
    }

    #[test]
    fn repeated_form_keys_are_collected() {
        let pairs = vec![
            ("selected_users".to_string(), "a".to_string()),
            ("csrf".to_string(), "x".to_string()),
            ("selected_users".to_string(), " b ".to_string()),
            ("selected_users".to_string(), "".to_string()),
        ];
        assert_eq!(values_of(&pairs, "selected_users"), vec!["a", "b"]);
    }

    #[test]
    fn bad_ids_become_field_errors() {
        let err = parse_ids(vec!["nope".into()], "selected_permissions").unwrap_err();
        assert!(matches!(err, AppError::Validation(f) if f.contains_key("selected_permissions")));
    }
}
