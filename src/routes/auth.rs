use axum::extract::State;
use axum::http::StatusCode;
use axum::Json;
use serde::Serialize;
use sqlx::SqlitePool;
use uuid::Uuid;

use crate::app::AppState;
use crate::authz::STANDARD_ROLE;
use crate::db::row_parsers;
use crate::errors::{AppError, AppResult, Validator};
use crate::jwt::AuthUser;
use crate::models::user::{AuthResponse, DbUser, LoginRequest, RegisterRequest, User};
use crate::utils::{hash_password, utc_now, verify_password};

#[derive(Debug, Serialize)]
pub struct MessageResponse {
    message: String,
}

const USER_COLUMNS: &str = "id, username, first_name, last_name, email, password_hash, created_at";

#[utoipa::path(
    post,
    path = "/auth/register",
    tag = "Auth",
    request_body = RegisterRequest,
    responses(
        (status = 201, description = "User registered", body = AuthResponse),
        (status = 409, description = "Username or email already in use"),
        (status = 422, description = "Invalid username or email")
    )
)]
pub async fn register(
    State(state): State<AppState>,
    Json(payload): Json<RegisterRequest>,
) -> AppResult<(StatusCode, Json<AuthResponse>)> {
    let username = payload.username.trim().to_string();
    let email = payload.email.trim().to_lowercase();

    let mut v = Validator::new();
    check_identity(&mut v, &username, &email);
    v.finish()?;

    ensure_available(&state.pool, &username, &email).await?;

    let password_hash = hash_password(&payload.password)?;
    let now = utc_now();
    let user_id = Uuid::new_v4();

    let standard_role: String = sqlx::query_scalar("SELECT id FROM roles WHERE name = ?")
        .bind(STANDARD_ROLE)
        .fetch_optional(&state.pool)
        .await?
        .ok_or_else(|| AppError::internal("Standard role missing; run migrations"))?;

    let mut tx = state.pool.begin().await?;

    sqlx::query(
        "INSERT INTO users (id, username, first_name, last_name, email, password_hash, created_at) VALUES (?, ?, ?, ?, ?, ?, ?)",
    )
    .bind(user_id.to_string())
    .bind(&username)
    .bind(payload.first_name.trim())
    .bind(payload.last_name.trim())
    .bind(&email)
    .bind(password_hash)
    .bind(now.to_rfc3339())
    .execute(&mut *tx)
    .await?;

    // Consents start out unset; the access gate asks for them on first use.
    sqlx::query("INSERT INTO profiles (user_id, role_id) VALUES (?, ?)")
        .bind(user_id.to_string())
        .bind(standard_role)
        .execute(&mut *tx)
        .await?;

    tx.commit().await?;

    tracing::info!(%user_id, username = %username, "user registered");

    let user: User = fetch_user_by_id(&state.pool, user_id).await?.into();
    let token = state.jwt.encode(user.id)?;

    Ok((StatusCode::CREATED, Json(AuthResponse { token, user })))
}

#[utoipa::path(
    post,
    path = "/auth/login",
    tag = "Auth",
    request_body = LoginRequest,
    responses(
        (status = 200, description = "Login successful", body = AuthResponse),
        (status = 401, description = "Invalid credentials")
    )
)]
pub async fn login(
    State(state): State<AppState>,
    Json(payload): Json<LoginRequest>,
) -> AppResult<Json<AuthResponse>> {
    // Either the username or the email address identifies the account.
    let login = payload.username.trim();
    let row = sqlx::query(&format!(
        "SELECT {USER_COLUMNS} FROM users WHERE username = ? OR email = ?"
    ))
    .bind(login)
    .bind(login.to_lowercase())
    .fetch_optional(&state.pool)
    .await?
    .ok_or_else(|| AppError::unauthorized("invalid credentials"))?;

    let db_user = row_parsers::db_user_from_row(&row)?;

    let password_ok = verify_password(&payload.password, &db_user.password_hash)?;
    if !password_ok {
        tracing::info!(username = %db_user.username, "login rejected");
        return Err(AppError::unauthorized("invalid credentials"));
    }

    let token = state.jwt.encode(db_user.id)?;
    let user: User = db_user.into();

    Ok(Json(AuthResponse { token, user }))
}

#[utoipa::path(
    get,
    path = "/auth/me",
    tag = "Auth",
    responses(
        (status = 200, description = "Current user", body = User),
        (status = 401, description = "Missing or invalid token")
    ),
    security(("bearerAuth" = []))
)]
pub async fn me(State(state): State<AppState>, auth: AuthUser) -> AppResult<Json<User>> {
    let user: User = fetch_user_by_id(&state.pool, auth.user_id).await?.into();
    Ok(Json(user))
}

#[utoipa::path(
    post,
    path = "/auth/logout",
    tag = "Auth",
    responses((status = 200, description = "Logout acknowledged")),
    security(("bearerAuth" = []))
)]
pub async fn logout(_auth: AuthUser) -> AppResult<Json<MessageResponse>> {
    Ok(Json(MessageResponse {
        message: "Logged out".to_string(),
    }))
}

/// Username and email rules shared by sign-up and account settings.
pub(crate) fn check_identity(v: &mut Validator, username: &str, email: &str) {
    v.check(!username.is_empty(), "username", "this field is required")
        .check(
            username.chars().all(|c| c.is_ascii_alphanumeric() || "._-".contains(c)),
            "username",
            "letters, digits and . _ - only",
        )
        .check(email.contains('@'), "email", "enter a valid email address");
}

async fn ensure_available(pool: &SqlitePool, username: &str, email: &str) -> AppResult<()> {
    let taken: Option<(String, String)> =
        sqlx::query_as("SELECT username, email FROM users WHERE username = ? OR email = ? LIMIT 1")
            .bind(username)
            .bind(email)
            .fetch_optional(pool)
            .await?;

    match taken {
        Some((existing, _)) if existing == username => Err(AppError::conflict("username already in use")),
        Some(_) => Err(AppError::conflict("email already in use")),
        None => Ok(()),
    }
}

pub(crate) async fn fetch_user_by_id(pool: &SqlitePool, user_id: Uuid) -> AppResult<DbUser> {
    let row = sqlx::query(&format!("SELECT {USER_COLUMNS} FROM users WHERE id = ?"))
        .bind(user_id.to_string())
        .fetch_optional(pool)
        .await?
        .ok_or_else(|| AppError::not_found("user not found"))?;

    row_parsers::db_user_from_row(&row)
}
