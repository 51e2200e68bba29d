//! Per-category audit log pages. `/logs` itself shows SYSTEM entries.

use axum::extract::{Path, State};
use axum::routing::get;
use axum::{Extension, Json, Router};
use serde::Serialize;
use utoipa::ToSchema;

use crate::app::AppState;
use crate::audit::{entries_in, verify_chain, ChainReport, LogCategory};
use crate::authz::gate::guard;
use crate::authz::{policy, Principal};
use crate::errors::{AppError, AppResult};
use crate::models::log::LogEntry;
use crate::page::{render, Page};

pub fn routes(state: &AppState) -> Router<AppState> {
    let logs = Router::new()
        .route("/logs", get(system_logs))
        .route("/logs/verify", get(verify_logs))
        .route("/logs/:category", get(category_logs));

    guard(state, policy::LOGS, logs)
}

#[derive(Debug, Serialize, ToSchema)]
pub struct LogPage {
    pub category: LogCategory,
    pub entries: Vec<LogEntry>,
}

async fn log_page(state: &AppState, principal: &Principal, category: LogCategory) -> AppResult<Json<Page<LogPage>>> {
    let entries = entries_in(&state.pool, category).await?;
    render(&state.pool, Some(principal), LogPage { category, entries }).await
}

#[utoipa::path(
    get,
    path = "/logs",
    tag = "Logs",
    responses(
        (status = 200, description = "SYSTEM entries, newest first"),
        (status = 303, description = "Redirect to login, consent or denied")
    ),
    security(("bearerAuth" = []))
)]
pub async fn system_logs(
    State(state): State<AppState>,
    Extension(principal): Extension<Principal>,
) -> AppResult<Json<Page<LogPage>>> {
    log_page(&state, &principal, LogCategory::System).await
}

#[utoipa::path(
    get,
    path = "/logs/{category}",
    tag = "Logs",
    params(("category" = String, Path, description = "administration, communication, management, disposition or cloud")),
    responses(
        (status = 200, description = "Entries of the category, newest first"),
        (status = 404, description = "Unknown category")
    ),
    security(("bearerAuth" = []))
)]
pub async fn category_logs(
    State(state): State<AppState>,
    Extension(principal): Extension<Principal>,
    Path(category): Path<String>,
) -> AppResult<Json<Page<LogPage>>> {
    let category: LogCategory = category.parse()?;
    if category == LogCategory::System {
        // SYSTEM lives at /logs.
        return Err(AppError::not_found("unknown log category: system"));
    }
    log_page(&state, &principal, category).await
}

#[utoipa::path(
    get,
    path = "/logs/verify",
    tag = "Logs",
    responses((status = 200, description = "Result of recomputing the hash chain", body = ChainReport)),
    security(("bearerAuth" = []))
)]
pub async fn verify_logs(
    State(state): State<AppState>,
    Extension(principal): Extension<Principal>,
) -> AppResult<Json<Page<ChainReport>>> {
    let report = verify_chain(&state.pool).await?;
    render(&state.pool, Some(&principal), report).await
}
