//! Administration overview and the application settings singleton.

use axum::extract::{Path, State};
use axum::http::HeaderMap;
use axum::routing::get;
use axum::{Extension, Json, Router};
use serde::Serialize;
use sqlx::SqlitePool;
use utoipa::ToSchema;
use uuid::Uuid;

use super::{see_other, SeeOther};
use crate::app::AppState;
use crate::audit::{LogAction, LogCategory, NewLogEntry, RequestContext};
use crate::authz::gate::guard;
use crate::authz::{policy, Principal};
use crate::db::row_parsers;
use crate::errors::{AppError, AppResult, Validator};
use crate::extract::Form;
use crate::models::office::{AppNameForm, LogoForm, OfficeSettings};
use crate::page::{render, Page};
use crate::utils::{non_empty, utc_now};

pub fn routes(state: &AppState) -> Router<AppState> {
    Router::new()
        .merge(guard(state, policy::SYSTEM, Router::new().route("/system", get(overview))))
        .merge(guard(
            state,
            policy::SYSTEM_APP,
            Router::new().route("/app/rename/:id", get(rename_form).post(rename_app)),
        ))
        .merge(guard(
            state,
            policy::SYSTEM_LOGO,
            Router::new().route("/app/logo/:id/update", get(logo_form).post(update_logo)),
        ))
}

#[derive(Debug, Serialize, ToSchema)]
pub struct SystemOverview {
    pub settings: OfficeSettings,
    pub users: i64,
    pub roles: i64,
    pub log_entries: i64,
}

#[utoipa::path(
    get,
    path = "/system",
    tag = "System",
    responses(
        (status = 200, description = "Administration overview"),
        (status = 303, description = "Redirect to login, consent or denied")
    ),
    security(("bearerAuth" = []))
)]
pub async fn overview(
    State(state): State<AppState>,
    Extension(principal): Extension<Principal>,
) -> AppResult<Json<Page<SystemOverview>>> {
    let settings = crate::page::office_settings(&state.pool).await?;
    let (users, roles, log_entries): (i64, i64, i64) = sqlx::query_as(
        "SELECT (SELECT COUNT(1) FROM users), (SELECT COUNT(1) FROM roles), (SELECT COUNT(1) FROM log_entries)",
    )
    .fetch_one(&state.pool)
    .await?;

    render(
        &state.pool,
        Some(&principal),
        SystemOverview {
            settings,
            users,
            roles,
            log_entries,
        },
    )
    .await
}

async fn settings_by_id(pool: &SqlitePool, id: Uuid) -> AppResult<OfficeSettings> {
    let row = sqlx::query("SELECT id, app, logo, updated_at FROM office_settings WHERE id = ?")
        .bind(id.to_string())
        .fetch_optional(pool)
        .await?
        .ok_or_else(|| AppError::not_found("settings not found"))?;

    row_parsers::office_settings_from_row(&row)
}

#[utoipa::path(
    get,
    path = "/app/rename/{id}",
    tag = "System",
    params(("id" = Uuid, Path, description = "Settings id")),
    responses((status = 200, description = "Rename form"), (status = 404, description = "Unknown settings id")),
    security(("bearerAuth" = []))
)]
pub async fn rename_form(
    State(state): State<AppState>,
    Extension(principal): Extension<Principal>,
    Path(id): Path<Uuid>,
) -> AppResult<Json<Page<OfficeSettings>>> {
    let settings = settings_by_id(&state.pool, id).await?;
    render(&state.pool, Some(&principal), settings).await
}

#[utoipa::path(
    post,
    path = "/app/rename/{id}",
    tag = "System",
    params(("id" = Uuid, Path, description = "Settings id")),
    request_body(content = AppNameForm, content_type = "application/x-www-form-urlencoded"),
    responses(
        (status = 303, description = "Renamed; back to /system"),
        (status = 422, description = "Invalid name")
    ),
    security(("bearerAuth" = []))
)]
pub async fn rename_app(
    State(state): State<AppState>,
    Extension(principal): Extension<Principal>,
    Path(id): Path<Uuid>,
    headers: HeaderMap,
    Form(form): Form<AppNameForm>,
) -> AppResult<SeeOther> {
    let current = settings_by_id(&state.pool, id).await?;
    let app = form.app.trim().to_string();

    let mut v = Validator::new();
    v.check(!app.is_empty(), "app", "this field is required")
        .check(app.chars().count() <= 64, "app", "at most 64 characters");
    v.finish()?;

    if app == current.app {
        return see_other("/system");
    }

    sqlx::query("UPDATE office_settings SET app = ?, updated_at = ? WHERE id = ?")
        .bind(&app)
        .bind(utc_now().to_rfc3339())
        .bind(id.to_string())
        .execute(&state.pool)
        .await?;

    tracing::info!(from = %current.app, to = %app, "application renamed");

    state
        .audit
        .append_all([NewLogEntry::new(
            &principal,
            LogAction::Update,
            LogCategory::Administration,
            format!("{} renamed the application to '{}'.", principal.handle(), app),
        )
        .about(&current)
        .with_context(RequestContext::from_headers(&headers))])
        .await;

    see_other("/system")
}

#[utoipa::path(
    get,
    path = "/app/logo/{id}/update",
    tag = "System",
    params(("id" = Uuid, Path, description = "Settings id")),
    responses((status = 200, description = "Logo form"), (status = 404, description = "Unknown settings id")),
    security(("bearerAuth" = []))
)]
pub async fn logo_form(
    State(state): State<AppState>,
    Extension(principal): Extension<Principal>,
    Path(id): Path<Uuid>,
) -> AppResult<Json<Page<OfficeSettings>>> {
    let settings = settings_by_id(&state.pool, id).await?;
    render(&state.pool, Some(&principal), settings).await
}

#[utoipa::path(
    post,
    path = "/app/logo/{id}/update",
    tag = "System",
    params(("id" = Uuid, Path, description = "Settings id")),
    request_body(content = LogoForm, content_type = "application/x-www-form-urlencoded"),
    responses((status = 303, description = "Logo changed; back to /system")),
    security(("bearerAuth" = []))
)]
pub async fn update_logo(
    State(state): State<AppState>,
    Extension(principal): Extension<Principal>,
    Path(id): Path<Uuid>,
    headers: HeaderMap,
    Form(form): Form<LogoForm>,
) -> AppResult<SeeOther> {
    let current = settings_by_id(&state.pool, id).await?;
    let logo = non_empty(form.logo);

    if logo == current.logo {
        return see_other("/system");
    }

    sqlx::query("UPDATE office_settings SET logo = ?, updated_at = ? WHERE id = ?")
        .bind(&logo)
        .bind(utc_now().to_rfc3339())
        .bind(id.to_string())
        .execute(&state.pool)
        .await?;

    state
        .audit
        .append_all([NewLogEntry::new(
            &principal,
            LogAction::Update,
            LogCategory::Administration,
            format!("{} changed the application logo.", principal.handle()),
        )
        .about(&current)
        .with_context(RequestContext::from_headers(&headers))])
        .await;

    see_other("/system")
}
