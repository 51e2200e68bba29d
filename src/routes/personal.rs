//! The signed-in user's own record: account, profile, payslips, record
//! sections and notes. Nothing here is audited.

use axum::extract::{Path, State};
use axum::routing::{get, post};
use axum::{Extension, Json, Router};
use serde::Serialize;
use sqlx::{QueryBuilder, Sqlite, SqlitePool};
use utoipa::ToSchema;
use uuid::Uuid;

use super::auth::{check_identity, fetch_user_by_id};
use super::{see_other, SeeOther};
use crate::app::AppState;
use crate::authz::gate::guard;
use crate::authz::{policy, Principal};
use crate::db::row_parsers;
use crate::errors::{AppError, AppResult, Validator};
use crate::extract::Form;
use crate::models::personal::{ConfirmSalaryForm, Note, NoteForm, RecordSection, Salary};
use crate::models::user::{AccountForm, Profile, ProfileForm, SocialHandles, User, PROFILE_PICTURES};
use crate::page::{render, Page};
use crate::utils::{is_hex_color, non_empty, utc_now};

const DEFAULT_NOTE_COLOR: &str = "#ffffff";

pub fn routes(state: &AppState) -> Router<AppState> {
    let personal = Router::new()
        .route("/profile", get(profile))
        .route("/profile/update", post(update_profile))
        .route("/account", get(account))
        .route("/account/update", post(update_account))
        .route("/salary", get(salary))
        .route("/salary/confirm", post(confirm_salary))
        .route("/personal", get(personal_overview))
        .route("/personal/:section", get(record_section))
        .route("/notes", get(list_notes))
        .route("/notes/create", post(create_note))
        .route("/notes/:id/update", post(update_note))
        .route("/notes/:id/delete", post(delete_note));

    guard(state, policy::MEMBER, personal)
}

#[derive(Debug, Serialize, ToSchema)]
pub struct ProfilePage {
    pub user: User,
    pub profile: Profile,
    /// Payslips still waiting for the viewer's confirmation.
    pub unconfirmed_salaries: i64,
}

pub async fn count_unconfirmed_salaries(pool: &SqlitePool, user_id: Uuid) -> AppResult<i64> {
    Ok(
        sqlx::query_scalar("SELECT COUNT(1) FROM salaries WHERE user_id = ? AND confirmed = 0")
            .bind(user_id.to_string())
            .fetch_one(pool)
            .await?,
    )
}

async fn load_profile(pool: &SqlitePool, user_id: Uuid) -> AppResult<Profile> {
    let row = sqlx::query(
        r#"
        SELECT p.*, r.name AS role_name
        FROM profiles p
        INNER JOIN roles r ON r.id = p.role_id
        WHERE p.user_id = ?
        "#,
    )
    .bind(user_id.to_string())
    .fetch_optional(pool)
    .await?
    .ok_or_else(|| AppError::not_found("profile not found"))?;

    row_parsers::profile_from_row(&row)
}

#[utoipa::path(
    get,
    path = "/profile",
    tag = "Personal",
    responses((status = 200, description = "Own profile"), (status = 303, description = "Redirect to login or a consent page")),
    security(("bearerAuth" = []))
)]
pub async fn profile(
    State(state): State<AppState>,
    Extension(principal): Extension<Principal>,
) -> AppResult<Json<Page<ProfilePage>>> {
    let user = fetch_user_by_id(&state.pool, principal.user_id).await?.into();
    let profile = load_profile(&state.pool, principal.user_id).await?;
    let unconfirmed_salaries = count_unconfirmed_salaries(&state.pool, principal.user_id).await?;

    render(
        &state.pool,
        Some(&principal),
        ProfilePage {
            user,
            profile,
            unconfirmed_salaries,
        },
    )
    .await
}

#[utoipa::path(
    post,
    path = "/profile/update",
    tag = "Personal",
    request_body(content = ProfileForm, content_type = "application/x-www-form-urlencoded"),
    responses((status = 303, description = "Saved; redirect to /profile"), (status = 422, description = "Field errors")),
    security(("bearerAuth" = []))
)]
pub async fn update_profile(
    State(state): State<AppState>,
    Extension(principal): Extension<Principal>,
    Form(form): Form<ProfileForm>,
) -> AppResult<SeeOther> {
    let biography = non_empty(form.biography);
    let social = form.social.normalized();

    let mut v = Validator::new();
    v.check(
        biography.as_ref().map_or(true, |b| b.chars().count() <= 2000),
        "biography",
        "at most 2000 characters",
    );
    for (column, handle) in SocialHandles::COLUMNS.iter().zip(social.values()) {
        v.check(
            handle.as_ref().map_or(true, |h| h.len() <= 64 && !h.contains(char::is_whitespace)),
            column,
            "at most 64 characters, no spaces",
        );
    }
    v.finish()?;

    let mut update: QueryBuilder<Sqlite> = QueryBuilder::new("UPDATE profiles SET biography = ");
    update.push_bind(biography);
    for (column, handle) in SocialHandles::COLUMNS.iter().zip(social.values()) {
        update.push(format!(", {} = ", column)).push_bind(handle.clone());
    }
    update.push(" WHERE user_id = ").push_bind(principal.user_id.to_string());
    update.build().execute(&state.pool).await?;

    see_other("/profile")
}

// =============================================================================
// ACCOUNT
// =============================================================================

#[derive(Debug, Serialize, ToSchema)]
pub struct AccountPage {
    pub user: User,
    pub picture: Option<String>,
    pub pictures: Vec<&'static str>,
}

#[utoipa::path(
    get,
    path = "/account",
    tag = "Personal",
    responses((status = 200, description = "Account settings form"), (status = 303, description = "Redirect to login or a consent page")),
    security(("bearerAuth" = []))
)]
pub async fn account(
    State(state): State<AppState>,
    Extension(principal): Extension<Principal>,
) -> AppResult<Json<Page<AccountPage>>> {
    let user = fetch_user_by_id(&state.pool, principal.user_id).await?.into();
    let profile = load_profile(&state.pool, principal.user_id).await?;

    render(
        &state.pool,
        Some(&principal),
        AccountPage {
            user,
            picture: profile.picture,
            pictures: PROFILE_PICTURES.to_vec(),
        },
    )
    .await
}

/// Whether another account already uses `username` or `email`.
async fn identity_taken(pool: &SqlitePool, user_id: Uuid, username: &str, email: &str) -> AppResult<(bool, bool)> {
    let others: Vec<(String, String)> =
        sqlx::query_as("SELECT username, email FROM users WHERE (username = ? OR email = ?) AND id != ?")
            .bind(username)
            .bind(email)
            .bind(user_id.to_string())
            .fetch_all(pool)
            .await?;

    Ok((
        others.iter().any(|(u, _)| u == username),
        others.iter().any(|(_, e)| e == email),
    ))
}

#[utoipa::path(
    post,
    path = "/account/update",
    tag = "Personal",
    request_body(content = AccountForm, content_type = "application/x-www-form-urlencoded"),
    responses((status = 303, description = "Saved; redirect home"), (status = 422, description = "Field errors")),
    security(("bearerAuth" = []))
)]
pub async fn update_account(
    State(state): State<AppState>,
    Extension(principal): Extension<Principal>,
    Form(form): Form<AccountForm>,
) -> AppResult<SeeOther> {
    let username = form.username.trim().to_string();
    let email = form.email.trim().to_lowercase();
    let picture = non_empty(form.picture);

    let mut v = Validator::new();
    check_identity(&mut v, &username, &email);
    v.check(
        picture.as_deref().map_or(true, |p| PROFILE_PICTURES.contains(&p)),
        "picture",
        "choose one of the offered pictures",
    );
    let (username_taken, email_taken) = identity_taken(&state.pool, principal.user_id, &username, &email).await?;
    v.check(!username_taken, "username", "a user with that username already exists")
        .check(!email_taken, "email", "a user with that email already exists");
    v.finish()?;

    let mut tx = state.pool.begin().await?;

    sqlx::query("UPDATE users SET username = ?, first_name = ?, last_name = ?, email = ? WHERE id = ?")
        .bind(&username)
        .bind(form.first_name.trim())
        .bind(form.last_name.trim())
        .bind(&email)
        .bind(principal.user_id.to_string())
        .execute(&mut *tx)
        .await?;

    sqlx::query("UPDATE profiles SET picture = ? WHERE user_id = ?")
        .bind(picture)
        .bind(principal.user_id.to_string())
        .execute(&mut *tx)
        .await?;

    tx.commit().await?;

    tracing::info!(user_id = %principal.user_id, username = %username, "account updated");

    see_other("/")
}

// =============================================================================
// SALARY
// =============================================================================

#[derive(Debug, Serialize, ToSchema)]
pub struct SalaryPage {
    pub salaries: Vec<Salary>,
    pub unconfirmed_salaries: i64,
}

#[utoipa::path(
    get,
    path = "/salary",
    tag = "Personal",
    responses((status = 200, description = "Own payslips, newest period first"), (status = 303, description = "Redirect to login or a consent page")),
    security(("bearerAuth" = []))
)]
pub async fn salary(
    State(state): State<AppState>,
    Extension(principal): Extension<Principal>,
) -> AppResult<Json<Page<SalaryPage>>> {
    let rows = sqlx::query(
        r#"
        SELECT id, user_id, period, gross_cents, net_cents, confirmed, confirmed_at, created_at
        FROM salaries
        WHERE user_id = ?
        ORDER BY period DESC, created_at DESC
        "#,
    )
    .bind(principal.user_id.to_string())
    .fetch_all(&state.pool)
    .await?;
    let salaries = rows.iter().map(row_parsers::salary_from_row).collect::<AppResult<Vec<_>>>()?;
    let unconfirmed_salaries = salaries.iter().filter(|s| !s.confirmed).count() as i64;

    render(
        &state.pool,
        Some(&principal),
        SalaryPage {
            salaries,
            unconfirmed_salaries,
        },
    )
    .await
}

#[utoipa::path(
    post,
    path = "/salary/confirm",
    tag = "Personal",
    request_body(content = ConfirmSalaryForm, content_type = "application/x-www-form-urlencoded"),
    responses((status = 303, description = "Confirmed; redirect to /salary"), (status = 404, description = "Not one of the user's payslips")),
    security(("bearerAuth" = []))
)]
pub async fn confirm_salary(
    State(state): State<AppState>,
    Extension(principal): Extension<Principal>,
    Form(form): Form<ConfirmSalaryForm>,
) -> AppResult<SeeOther> {
    // Someone else's payslip looks exactly like a missing one.
    let confirmed: bool = sqlx::query_scalar("SELECT confirmed FROM salaries WHERE id = ? AND user_id = ?")
        .bind(form.salary_id.to_string())
        .bind(principal.user_id.to_string())
        .fetch_optional(&state.pool)
        .await?
        .ok_or_else(|| AppError::not_found("salary not found"))?;

    if !confirmed {
        sqlx::query("UPDATE salaries SET confirmed = 1, confirmed_at = ? WHERE id = ? AND confirmed = 0")
            .bind(utc_now().to_rfc3339())
            .bind(form.salary_id.to_string())
            .execute(&state.pool)
            .await?;
        tracing::info!(user_id = %principal.user_id, salary_id = %form.salary_id, "salary confirmed");
    }

    see_other("/salary")
}

// =============================================================================
// RECORD SECTIONS
// =============================================================================

#[derive(Debug, Serialize, ToSchema)]
pub struct SectionLink {
    pub section: RecordSection,
    pub title: &'static str,
    pub href: String,
}

#[derive(Debug, Serialize, ToSchema)]
pub struct PersonalOverview {
    pub user: User,
    pub sections: Vec<SectionLink>,
    pub unconfirmed_salaries: i64,
}

#[derive(Debug, Serialize, ToSchema)]
pub struct RecordPage {
    pub section: RecordSection,
    pub title: &'static str,
    pub user: User,
    pub profile: Profile,
    pub unconfirmed_salaries: i64,
}

#[utoipa::path(
    get,
    path = "/personal",
    tag = "Personal",
    responses((status = 200, description = "Overview of the personal record"), (status = 303, description = "Redirect to login or a consent page")),
    security(("bearerAuth" = []))
)]
pub async fn personal_overview(
    State(state): State<AppState>,
    Extension(principal): Extension<Principal>,
) -> AppResult<Json<Page<PersonalOverview>>> {
    let user = fetch_user_by_id(&state.pool, principal.user_id).await?.into();
    let sections = RecordSection::ALL
        .into_iter()
        .map(|section| SectionLink {
            section,
            title: section.title(),
            href: format!("/personal/{}", section.as_str()),
        })
        .collect();
    let unconfirmed_salaries = count_unconfirmed_salaries(&state.pool, principal.user_id).await?;

    render(
        &state.pool,
        Some(&principal),
        PersonalOverview {
            user,
            sections,
            unconfirmed_salaries,
        },
    )
    .await
}

#[utoipa::path(
    get,
    path = "/personal/{section}",
    tag = "Personal",
    params(("section" = String, Path, description = "meta, address, health, criminal, work, absence, performance or reprimand")),
    responses((status = 200, description = "One section of the personal record"), (status = 404, description = "Unknown section")),
    security(("bearerAuth" = []))
)]
pub async fn record_section(
    State(state): State<AppState>,
    Extension(principal): Extension<Principal>,
    Path(section): Path<String>,
) -> AppResult<Json<Page<RecordPage>>> {
    let section = RecordSection::parse(&section).ok_or_else(|| AppError::not_found("unknown record section"))?;
    let user = fetch_user_by_id(&state.pool, principal.user_id).await?.into();
    let profile = load_profile(&state.pool, principal.user_id).await?;
    let unconfirmed_salaries = count_unconfirmed_salaries(&state.pool, principal.user_id).await?;

    render(
        &state.pool,
        Some(&principal),
        RecordPage {
            section,
            title: section.title(),
            user,
            profile,
            unconfirmed_salaries,
        },
    )
    .await
}

// =============================================================================
// NOTES
// =============================================================================

async fn own_note(pool: &SqlitePool, user_id: Uuid, id: Uuid) -> AppResult<Note> {
    // Someone else's note looks exactly like a missing one.
    let row = sqlx::query(
        "SELECT id, user_id, title, content, color, created_at, updated_at FROM notes WHERE id = ? AND user_id = ?",
    )
    .bind(id.to_string())
    .bind(user_id.to_string())
    .fetch_optional(pool)
    .await?
    .ok_or_else(|| AppError::not_found("note not found"))?;

    row_parsers::note_from_row(&row)
}

fn validate_note(form: NoteForm) -> AppResult<(String, String, String)> {
    let title = form.title.trim().to_string();
    let color = non_empty(form.color)
        .map(|c| c.to_lowercase())
        .unwrap_or_else(|| DEFAULT_NOTE_COLOR.to_string());

    let mut v = Validator::new();
    v.check(!title.is_empty(), "title", "this field is required")
        .check(title.chars().count() <= 128, "title", "at most 128 characters")
        .check(is_hex_color(&color), "color", "enter a color as #RRGGBB");
    v.finish()?;

    Ok((title, form.content, color))
}

#[utoipa::path(
    get,
    path = "/notes",
    tag = "Personal",
    responses((status = 200, description = "Own notes, most recently edited first")),
    security(("bearerAuth" = []))
)]
pub async fn list_notes(
    State(state): State<AppState>,
    Extension(principal): Extension<Principal>,
) -> AppResult<Json<Page<Vec<Note>>>> {
    let rows = sqlx::query(
        "SELECT id, user_id, title, content, color, created_at, updated_at FROM notes WHERE user_id = ? ORDER BY updated_at DESC",
    )
    .bind(principal.user_id.to_string())
    .fetch_all(&state.pool)
    .await?;
    let notes = rows.iter().map(row_parsers::note_from_row).collect::<AppResult<Vec<_>>>()?;

    render(&state.pool, Some(&principal), notes).await
}

#[utoipa::path(
    post,
    path = "/notes/create",
    tag = "Personal",
    request_body(content = NoteForm, content_type = "application/x-www-form-urlencoded"),
    responses((status = 303, description = "Created; redirect to /notes"), (status = 422, description = "Field errors")),
    security(("bearerAuth" = []))
)]
pub async fn create_note(
    State(state): State<AppState>,
    Extension(principal): Extension<Principal>,
    Form(form): Form<NoteForm>,
) -> AppResult<SeeOther> {
    let (title, content, color) = validate_note(form)?;
    let now = utc_now().to_rfc3339();

    sqlx::query(
        "INSERT INTO notes (id, user_id, title, content, color, created_at, updated_at) VALUES (?, ?, ?, ?, ?, ?, ?)",
    )
    .bind(Uuid::new_v4().to_string())
    .bind(principal.user_id.to_string())
    .bind(title)
    .bind(content)
    .bind(color)
    .bind(&now)
    .bind(&now)
    .execute(&state.pool)
    .await?;

    see_other("/notes")
}

#[utoipa::path(
    post,
    path = "/notes/{id}/update",
    tag = "Personal",
    params(("id" = Uuid, Path, description = "Note id")),
    request_body(content = NoteForm, content_type = "application/x-www-form-urlencoded"),
    responses((status = 303, description = "Saved; redirect to /notes"), (status = 404, description = "Not one of the user's notes")),
    security(("bearerAuth" = []))
)]
pub async fn update_note(
    State(state): State<AppState>,
    Extension(principal): Extension<Principal>,
    Path(id): Path<Uuid>,
    Form(form): Form<NoteForm>,
) -> AppResult<SeeOther> {
    own_note(&state.pool, principal.user_id, id).await?;
    let (title, content, color) = validate_note(form)?;

    sqlx::query("UPDATE notes SET title = ?, content = ?, color = ?, updated_at = ? WHERE id = ?")
        .bind(title)
        .bind(content)
        .bind(color)
        .bind(utc_now().to_rfc3339())
        .bind(id.to_string())
        .execute(&state.pool)
        .await?;

    see_other("/notes")
}

#[utoipa::path(
    post,
    path = "/notes/{id}/delete",
    tag = "Personal",
    params(("id" = Uuid, Path, description = "Note id")),
    responses((status = 303, description = "Deleted; redirect to /notes"), (status = 404, description = "Not one of the user's notes")),
    security(("bearerAuth" = []))
)]
pub async fn delete_note(
    State(state): State<AppState>,
    Extension(principal): Extension<Principal>,
    Path(id): Path<Uuid>,
) -> AppResult<SeeOther> {
    own_note(&state.pool, principal.user_id, id).await?;

    sqlx::query("DELETE FROM notes WHERE id = ?")
        .bind(id.to_string())
        .execute(&state.pool)
        .await?;

    see_other("/notes")
}
