//! Landing, login, denied and the three consent pages.

use axum::extract::{Query, State};
use axum::http::{HeaderMap, Uri};
use axum::routing::{get, post};
use axum::{Extension, Json, Router};
use serde::Serialize;
use utoipa::ToSchema;

use super::{see_other, with_next, NextQuery, SeeOther};
use crate::app::AppState;
use crate::audit::{LogAction, LogCategory, NewLogEntry, RequestContext};
use crate::authz::gate::guard;
use crate::authz::{policy, ConsentKind, Principal};
use crate::errors::{AppError, AppResult};
use crate::models::communication::Announcement;
use crate::page::{render, Page};
use crate::utils::safe_next;
use crate::db::row_parsers;

pub fn routes(state: &AppState) -> Router<AppState> {
    let public = Router::new()
        .route("/login", get(login_page))
        .route("/privacy", get(consent_page))
        .route("/terms", get(consent_page))
        .route("/copyright", get(consent_page));

    let consent = Router::new()
        .route("/privacy/accept", post(accept_consent))
        .route("/terms/accept", post(accept_consent))
        .route("/copyright/accept", post(accept_consent));

    let member = Router::new()
        .route("/", get(home))
        .route("/denied", get(denied));

    Router::new()
        .merge(guard(state, policy::PUBLIC, public))
        .merge(guard(state, policy::CONSENT, consent))
        .merge(guard(state, policy::MEMBER, member))
}

/// `/terms` and `/terms/accept` both name the terms consent.
fn consent_kind(uri: &Uri) -> AppResult<ConsentKind> {
    let first = uri.path().trim_start_matches('/').split('/').next().unwrap_or_default();
    ConsentKind::ORDER
        .into_iter()
        .find(|kind| kind.as_str() == first)
        .ok_or_else(|| AppError::not_found(format!("no consent page at {}", uri.path())))
}

#[derive(Debug, Serialize, ToSchema)]
pub struct HomeData {
    pub permissions: Vec<String>,
    pub latest_announcements: Vec<Announcement>,
}

#[utoipa::path(
    get,
    path = "/",
    tag = "Pages",
    responses(
        (status = 200, description = "Dashboard page"),
        (status = 303, description = "Redirect to login or a consent page")
    ),
    security(("bearerAuth" = []))
)]
pub async fn home(
    State(state): State<AppState>,
    Extension(principal): Extension<Principal>,
) -> AppResult<Json<Page<HomeData>>> {
    let mut permissions: Vec<String> = principal.permissions.iter().cloned().collect();
    permissions.sort();

    let rows = sqlx::query(
        r#"
        SELECT a.id, a.title, a.body, a.author_id, a.created_at,
               EXISTS (SELECT 1 FROM announcement_reads r WHERE r.announcement_id = a.id AND r.user_id = ?) AS read
        FROM announcements a
        ORDER BY a.created_at DESC
        LIMIT 5
        "#,
    )
    .bind(principal.user_id.to_string())
    .fetch_all(&state.pool)
    .await?;

    let latest_announcements = rows
        .iter()
        .map(row_parsers::announcement_from_row)
        .collect::<AppResult<Vec<_>>>()?;

    render(
        &state.pool,
        Some(&principal),
        HomeData {
            permissions,
            latest_announcements,
        },
    )
    .await
}

#[derive(Debug, Serialize, ToSchema)]
pub struct DeniedData {
    pub message: &'static str,
}

#[utoipa::path(
    get,
    path = "/denied",
    tag = "Pages",
    responses((status = 200, description = "Access denied page")),
    security(("bearerAuth" = []))
)]
pub async fn denied(
    State(state): State<AppState>,
    Extension(principal): Extension<Principal>,
) -> AppResult<Json<Page<DeniedData>>> {
    render(
        &state.pool,
        Some(&principal),
        DeniedData {
            message: "Your role does not grant access to this page.",
        },
    )
    .await
}

#[derive(Debug, Serialize, ToSchema)]
pub struct LoginData {
    pub next: Option<String>,
    /// Where credentials are posted.
    pub action: &'static str,
}

#[utoipa::path(
    get,
    path = "/login",
    tag = "Pages",
    params(NextQuery),
    responses((status = 200, description = "Login page"))
)]
pub async fn login_page(
    State(state): State<AppState>,
    principal: Option<Extension<Principal>>,
    Query(query): Query<NextQuery>,
) -> AppResult<Json<Page<LoginData>>> {
    let principal = principal.map(|Extension(p)| p);
    let next = safe_next(query.next.as_deref()).map(str::to_string);

    render(
        &state.pool,
        principal.as_ref(),
        LoginData {
            next,
            action: "/auth/login",
        },
    )
    .await
}

#[derive(Debug, Serialize, ToSchema)]
pub struct ConsentData {
    pub kind: ConsentKind,
    pub title: &'static str,
    /// Whether the viewer already agreed; absent for anonymous viewers.
    pub accepted: Option<bool>,
    pub next: Option<String>,
    pub action: String,
}

#[utoipa::path(
    get,
    path = "/{consent}",
    tag = "Pages",
    params(
        ("consent" = String, Path, description = "privacy, terms or copyright"),
        NextQuery
    ),
    responses(
        (status = 200, description = "Consent page"),
        (status = 404, description = "Unknown consent page")
    )
)]
pub async fn consent_page(
    State(state): State<AppState>,
    principal: Option<Extension<Principal>>,
    uri: Uri,
    Query(query): Query<NextQuery>,
) -> AppResult<Json<Page<ConsentData>>> {
    let kind = consent_kind(&uri)?;
    let principal = principal.map(|Extension(p)| p);
    let next = safe_next(query.next.as_deref()).map(str::to_string);

    render(
        &state.pool,
        principal.as_ref(),
        ConsentData {
            kind,
            title: kind.title(),
            accepted: principal.as_ref().map(|p| p.consent.has(kind)),
            action: with_next(&format!("/{}/accept", kind.as_str()), next.as_deref()),
            next,
        },
    )
    .await
}

/// Records the consent and moves on to the next missing one, or to `next`.
#[utoipa::path(
    post,
    path = "/{consent}/accept",
    tag = "Pages",
    params(
        ("consent" = String, Path, description = "privacy, terms or copyright"),
        NextQuery
    ),
    responses(
        (status = 303, description = "Next consent page or the original destination"),
        (status = 404, description = "Unknown consent page")
    ),
    security(("bearerAuth" = []))
)]
pub async fn accept_consent(
    State(state): State<AppState>,
    Extension(principal): Extension<Principal>,
    uri: Uri,
    headers: HeaderMap,
    Query(query): Query<NextQuery>,
) -> AppResult<SeeOther> {
    let kind = consent_kind(&uri)?;

    let sql = format!(
        "UPDATE profiles SET {col} = 1 WHERE user_id = ? AND {col} = 0",
        col = kind.column()
    );
    let changed = sqlx::query(&sql)
        .bind(principal.user_id.to_string())
        .execute(&state.pool)
        .await?
        .rows_affected();

    if changed > 0 {
        tracing::info!(user_id = %principal.user_id, consent = kind.as_str(), "consent accepted");
        state
            .audit
            .append_all([NewLogEntry::new(
                &principal,
                LogAction::Read,
                LogCategory::System,
                format!("{} accepted the {}.", principal.handle(), kind.title()),
            )
            .with_context(RequestContext::from_headers(&headers))])
            .await;
    }

    let mut consent_now = principal.consent;
    match kind {
        ConsentKind::Privacy => consent_now.privacy = true,
        ConsentKind::Terms => consent_now.terms = true,
        ConsentKind::Copyright => consent_now.copyright = true,
    }

    let next = safe_next(query.next.as_deref());
    let location = match consent_now.first_missing() {
        Some(missing) => with_next(&format!("/{}", missing.as_str()), next),
        None => next.unwrap_or("/").to_string(),
    };

    see_other(location)
}
