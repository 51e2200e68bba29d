use axum::extract::{Query, State};
use axum::routing::get;
use axum::{Extension, Json, Router};
use serde::{Deserialize, Serialize};
use sqlx::{QueryBuilder, Sqlite, SqlitePool};
use utoipa::{IntoParams, ToSchema};
use uuid::Uuid;

use crate::app::AppState;
use crate::authz::gate::guard;
use crate::authz::{policy, Principal};
use crate::db::row_parsers;
use crate::errors::AppResult;
use crate::models::role::Role;
use crate::models::user::UserListing;
use crate::page::{render, Page};
use crate::utils::non_empty;

pub fn routes(state: &AppState) -> Router<AppState> {
    guard(state, policy::USERS, Router::new().route("/users", get(list_users)))
}

#[derive(Debug, Default, Deserialize, IntoParams)]
#[into_params(parameter_in = Query)]
pub struct UserFilter {
    /// Whitespace separated words; a user matches if any word is part of
    /// their first name, last name or username.
    pub search: Option<String>,
    /// Role id.
    pub role: Option<String>,
}

#[derive(Debug, Serialize, ToSchema)]
pub struct UserDirectory {
    pub users: Vec<UserListing>,
    pub roles: Vec<Role>,
    pub search: String,
    pub role: String,
}

/// Users ordered by role name, then first name, last name and username, all
/// case-insensitively.
pub async fn search_users(pool: &SqlitePool, search: &str, role: Option<Uuid>) -> AppResult<Vec<UserListing>> {
    let mut query: QueryBuilder<Sqlite> = QueryBuilder::new(
        r#"
        SELECT u.id, u.username, u.first_name, u.last_name, r.id AS role_id, r.name AS role_name
        FROM users u
        INNER JOIN profiles p ON p.user_id = u.id
        INNER JOIN roles r ON r.id = p.role_id
        WHERE 1 = 1
        "#,
    );

    let terms: Vec<&str> = search.split_whitespace().collect();
    if !terms.is_empty() {
        query.push(" AND (");
        for (i, term) in terms.iter().enumerate() {
            if i > 0 {
                query.push(" OR ");
            }
            // instr matches literally; `%` and `_` are ordinary characters here.
            let needle = term.to_lowercase();
            query
                .push("instr(lower(u.first_name), ")
                .push_bind(needle.clone())
                .push(") > 0 OR instr(lower(u.last_name), ")
                .push_bind(needle.clone())
                .push(") > 0 OR instr(lower(u.username), ")
                .push_bind(needle)
                .push(") > 0");
        }
        query.push(")");
    }

    if let Some(role) = role {
        query.push(" AND r.id = ").push_bind(role.to_string());
    }

    query.push(" ORDER BY lower(r.name), lower(u.first_name), lower(u.last_name), lower(u.username)");

    let rows = query.build().fetch_all(pool).await?;
    rows.iter().map(row_parsers::user_listing_from_row).collect()
}

#[utoipa::path(
    get,
    path = "/users",
    tag = "Users",
    params(UserFilter),
    responses(
        (status = 200, description = "User directory"),
        (status = 303, description = "Redirect to login, consent or denied")
    ),
    security(("bearerAuth" = []))
)]
pub async fn list_users(
    State(state): State<AppState>,
    Extension(principal): Extension<Principal>,
    Query(filter): Query<UserFilter>,
) -> AppResult<Json<Page<UserDirectory>>> {
    let search = non_empty(filter.search).unwrap_or_default();
    let role_raw = non_empty(filter.role).unwrap_or_default();
    // An unparseable role id matches nobody rather than everybody.
    let role_filter = match role_raw.as_str() {
        "" => None,
        raw => Some(Uuid::parse_str(raw).unwrap_or(Uuid::nil())),
    };

    let users = search_users(&state.pool, &search, role_filter).await?;

    let rows = sqlx::query("SELECT id, name, color, created_at, updated_at FROM roles ORDER BY lower(name)")
        .fetch_all(&state.pool)
        .await?;
    let roles = rows.iter().map(row_parsers::role_from_row).collect::<AppResult<Vec<_>>>()?;

    render(
        &state.pool,
        Some(&principal),
        UserDirectory {
            users,
            roles,
            search,
            role: role_raw,
        },
    )
    .await
}
