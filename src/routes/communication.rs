//! Announcements and direct messages, the two sources of the unread badge.

use axum::extract::{Path, State};
use axum::http::HeaderMap;
use axum::routing::{get, post};
use axum::{Extension, Json, Router};
use serde::Serialize;
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
use crate::models::communication::{Announcement, Message, MessageForm};
use crate::page::{render, Page};
use crate::utils::utc_now;

pub fn routes(state: &AppState) -> Router<AppState> {
    let communication = Router::new()
        .route("/announcements", get(list_announcements))
        .route("/announcements/:id/read", post(mark_announcement_read))
        .route("/messages", get(list_messages))
        .route("/messages/send", post(send_message))
        .route("/messages/:id/read", post(mark_message_read));

    guard(state, policy::MEMBER, communication)
}

#[utoipa::path(
    get,
    path = "/announcements",
    tag = "Communication",
    responses((status = 200, description = "All announcements with the viewer's read flag, newest first")),
    security(("bearerAuth" = []))
)]
pub async fn list_announcements(
    State(state): State<AppState>,
    Extension(principal): Extension<Principal>,
) -> AppResult<Json<Page<Vec<Announcement>>>> {
    let rows = sqlx::query(
        r#"
        SELECT a.id, a.title, a.body, a.author_id, a.created_at,
               EXISTS (SELECT 1 FROM announcement_reads r WHERE r.announcement_id = a.id AND r.user_id = ?) AS read
        FROM announcements a
        ORDER BY a.created_at DESC
        "#,
    )
    .bind(principal.user_id.to_string())
    .fetch_all(&state.pool)
    .await?;
    let announcements = rows.iter().map(row_parsers::announcement_from_row).collect::<AppResult<Vec<_>>>()?;

    render(&state.pool, Some(&principal), announcements).await
}

#[utoipa::path(
    post,
    path = "/announcements/{id}/read",
    tag = "Communication",
    params(("id" = Uuid, Path, description = "Announcement id")),
    responses((status = 303, description = "Marked; redirect to /announcements"), (status = 404, description = "Unknown announcement")),
    security(("bearerAuth" = []))
)]
pub async fn mark_announcement_read(
    State(state): State<AppState>,
    Extension(principal): Extension<Principal>,
    Path(id): Path<Uuid>,
) -> AppResult<SeeOther> {
    let exists: i64 = sqlx::query_scalar("SELECT COUNT(1) FROM announcements WHERE id = ?")
        .bind(id.to_string())
        .fetch_one(&state.pool)
        .await?;
    if exists == 0 {
        return Err(AppError::not_found("announcement not found"));
    }

    sqlx::query("INSERT OR IGNORE INTO announcement_reads (announcement_id, user_id, read_at) VALUES (?, ?, ?)")
        .bind(id.to_string())
        .bind(principal.user_id.to_string())
        .bind(utc_now().to_rfc3339())
        .execute(&state.pool)
        .await?;

    see_other("/announcements")
}

#[derive(Debug, Serialize, ToSchema)]
pub struct Mailbox {
    pub unread: Vec<Message>,
    pub read: Vec<Message>,
    pub sent: Vec<Message>,
}

const MESSAGE_SELECT: &str = r#"
    SELECT m.id, m.sender_id, s.username AS sender_name, m.receiver_id, m.subject, m.body,
           m.receiver_read, m.created_at
    FROM messages m
    INNER JOIN users s ON s.id = m.sender_id
"#;

#[utoipa::path(
    get,
    path = "/messages",
    tag = "Communication",
    responses((status = 200, description = "Inbox split into unread and read, plus sent messages")),
    security(("bearerAuth" = []))
)]
pub async fn list_messages(
    State(state): State<AppState>,
    Extension(principal): Extension<Principal>,
) -> AppResult<Json<Page<Mailbox>>> {
    let me = principal.user_id.to_string();

    let inbox = sqlx::query(&format!("{MESSAGE_SELECT} WHERE m.receiver_id = ? ORDER BY m.created_at DESC"))
        .bind(&me)
        .fetch_all(&state.pool)
        .await?
        .iter()
        .map(row_parsers::message_from_row)
        .collect::<AppResult<Vec<_>>>()?;

    let sent = sqlx::query(&format!("{MESSAGE_SELECT} WHERE m.sender_id = ? ORDER BY m.created_at DESC"))
        .bind(&me)
        .fetch_all(&state.pool)
        .await?
        .iter()
        .map(row_parsers::message_from_row)
        .collect::<AppResult<Vec<_>>>()?;

    let (read, unread): (Vec<_>, Vec<_>) = inbox.into_iter().partition(|m| m.receiver_read);

    render(&state.pool, Some(&principal), Mailbox { unread, read, sent }).await
}

#[utoipa::path(
    post,
    path = "/messages/send",
    tag = "Communication",
    request_body(content = MessageForm, content_type = "application/x-www-form-urlencoded"),
    responses((status = 303, description = "Sent; redirect to /messages"), (status = 422, description = "Field errors")),
    security(("bearerAuth" = []))
)]
pub async fn send_message(
    State(state): State<AppState>,
    Extension(principal): Extension<Principal>,
    headers: HeaderMap,
    Form(form): Form<MessageForm>,
) -> AppResult<SeeOther> {
    let receiver_name = form.receiver.trim().trim_start_matches('@').to_string();
    let subject = form.subject.trim().to_string();

    let mut v = Validator::new();
    v.check(!receiver_name.is_empty(), "receiver", "this field is required")
        .check(!subject.is_empty(), "subject", "this field is required")
        .check(subject.chars().count() <= 200, "subject", "at most 200 characters");
    v.finish()?;

    let receiver: String = sqlx::query_scalar("SELECT id FROM users WHERE username = ?")
        .bind(&receiver_name)
        .fetch_optional(&state.pool)
        .await?
        .ok_or_else(|| AppError::field("receiver", "no user with this username"))?;
    let receiver_id = row_parsers::parse_uuid(receiver)?;

    let created_at = utc_now();
    let message = Message {
        id: Uuid::new_v4(),
        sender_id: principal.user_id,
        sender_name: principal.username.clone(),
        receiver_id,
        subject,
        body: form.body,
        receiver_read: false,
        created_at,
    };

    sqlx::query(
        "INSERT INTO messages (id, sender_id, receiver_id, subject, body, receiver_read, created_at) VALUES (?, ?, ?, ?, ?, 0, ?)",
    )
    .bind(message.id.to_string())
    .bind(message.sender_id.to_string())
    .bind(message.receiver_id.to_string())
    .bind(&message.subject)
    .bind(&message.body)
    .bind(created_at.to_rfc3339())
    .execute(&state.pool)
    .await?;

    state
        .audit
        .append_all([NewLogEntry::new(
            &principal,
            LogAction::Create,
            LogCategory::Communication,
            format!("{} sent a message to @{}.", principal.handle(), receiver_name),
        )
        .about(&message)
        .with_context(RequestContext::from_headers(&headers))])
        .await;

    see_other("/messages")
}

#[utoipa::path(
    post,
    path = "/messages/{id}/read",
    tag = "Communication",
    params(("id" = Uuid, Path, description = "Message id")),
    responses((status = 303, description = "Marked; redirect to /messages"), (status = 404, description = "Not a message to the viewer")),
    security(("bearerAuth" = []))
)]
pub async fn mark_message_read(
    State(state): State<AppState>,
    Extension(principal): Extension<Principal>,
    Path(id): Path<Uuid>,
) -> AppResult<SeeOther> {
    // Only the receiver can mark a message as read.
    let found: i64 = sqlx::query_scalar("SELECT COUNT(1) FROM messages WHERE id = ? AND receiver_id = ?")
        .bind(id.to_string())
        .bind(principal.user_id.to_string())
        .fetch_one(&state.pool)
        .await?;
    if found == 0 {
        return Err(AppError::not_found("message not found"));
    }

    sqlx::query("UPDATE messages SET receiver_read = 1 WHERE id = ?")
        .bind(id.to_string())
        .execute(&state.pool)
        .await?;

    see_other("/messages")
}
