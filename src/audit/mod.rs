//! Audit log.
//!
//! Handlers call [`AuditRecorder::append`] only after their own write has
//! committed. The audit write is a separate statement: if it fails the change
//! stays in place and the failure is reported through `tracing`.

use std::fmt;
use std::str::FromStr;
use std::sync::Arc;

use chrono::SecondsFormat;
use serde::{Deserialize, Serialize};
use sqlx::{SqliteConnection, SqlitePool};
use tokio::sync::Mutex;
use utoipa::ToSchema;
use uuid::Uuid;

pub mod chain;
pub mod loggable;

pub use chain::{verify_chain, ChainReport};
pub use loggable::{LogTarget, Loggable};

use crate::authz::Principal;
use crate::db::row_parsers;
use crate::errors::{AppError, AppResult};
use crate::models::log::LogEntry;
use crate::utils::utc_now;
use chain::{chain_hash, ChainPayload};

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize, ToSchema)]
#[serde(rename_all = "UPPERCASE")]
pub enum LogAction {
    Create,
    Update,
    Delete,
    Read,
}

impl LogAction {
    pub fn as_str(&self) -> &'static str {
        match self {
            LogAction::Create => "CREATE",
            LogAction::Update => "UPDATE",
            LogAction::Delete => "DELETE",
            LogAction::Read => "READ",
        }
    }
}

impl FromStr for LogAction {
    type Err = AppError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s {
            "CREATE" => Ok(LogAction::Create),
            "UPDATE" => Ok(LogAction::Update),
            "DELETE" => Ok(LogAction::Delete),
            "READ" => Ok(LogAction::Read),
            other => Err(AppError::internal(format!("unknown log action: {other}"))),
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize, ToSchema)]
#[serde(rename_all = "UPPERCASE")]
pub enum LogCategory {
    System,
    Administration,
    Communication,
    Management,
    Disposition,
    Cloud,
}

impl LogCategory {
    pub const ALL: [LogCategory; 6] = [
        LogCategory::System,
        LogCategory::Administration,
        LogCategory::Communication,
        LogCategory::Management,
        LogCategory::Disposition,
        LogCategory::Cloud,
    ];

    pub fn as_str(&self) -> &'static str {
        match self {
            LogCategory::System => "SYSTEM",
            LogCategory::Administration => "ADMINISTRATION",
            LogCategory::Communication => "COMMUNICATION",
            LogCategory::Management => "MANAGEMENT",
            LogCategory::Disposition => "DISPOSITION",
            LogCategory::Cloud => "CLOUD",
        }
    }
}

impl fmt::Display for LogCategory {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for LogCategory {
    type Err = AppError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        LogCategory::ALL
            .into_iter()
            .find(|c| c.as_str().eq_ignore_ascii_case(s))
            .ok_or_else(|| AppError::not_found(format!("unknown log category: {s}")))
    }
}

/// Request context for activity logging (IP, User-Agent, etc.)
#[derive(Debug, Clone, Default, Serialize, Deserialize, ToSchema)]
pub struct RequestContext {
    #[serde(skip_serializing_if = "Option::is_none")]
    pub ip: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub user_agent: Option<String>,
}

impl RequestContext {
    /// Extract context from Axum request headers
    pub fn from_headers(headers: &axum::http::HeaderMap) -> Self {
        let ip = headers
            .get("x-forwarded-for")
            .and_then(|v| v.to_str().ok())
            .map(|s| s.split(',').next().unwrap_or(s).trim().to_string())
            .or_else(|| {
                headers
                    .get("x-real-ip")
                    .and_then(|v| v.to_str().ok())
                    .map(String::from)
            });

        let user_agent = headers
            .get(axum::http::header::USER_AGENT)
            .and_then(|v| v.to_str().ok())
            .map(String::from);

        Self { ip, user_agent }
    }
}

/// An entry waiting to be appended.
#[derive(Debug, Clone)]
pub struct NewLogEntry {
    pub actor_id: Option<Uuid>,
    pub actor_name: String,
    pub action: LogAction,
    pub category: LogCategory,
    pub message: String,
    pub target: Option<LogTarget>,
    pub context: RequestContext,
}

impl NewLogEntry {
    pub fn new(actor: &Principal, action: LogAction, category: LogCategory, message: impl Into<String>) -> Self {
        Self {
            actor_id: Some(actor.user_id),
            actor_name: actor.username.clone(),
            action,
            category,
            message: message.into(),
            target: None,
            context: RequestContext::default(),
        }
    }

    /// Entry written by an operator tool rather than a signed-in user.
    pub fn system(action: LogAction, category: LogCategory, message: impl Into<String>) -> Self {
        Self {
            actor_id: None,
            actor_name: "system".to_string(),
            action,
            category,
            message: message.into(),
            target: None,
            context: RequestContext::default(),
        }
    }

    pub fn about(mut self, entity: &impl Loggable) -> Self {
        self.target = Some(entity.log_target());
        self
    }

    pub fn with_context(mut self, context: RequestContext) -> Self {
        self.context = context;
        self
    }
}

/// Appends entries to `log_entries`, one at a time so the hash chain stays linear.
#[derive(Clone)]
pub struct AuditRecorder {
    pool: SqlitePool,
    append_lock: Arc<Mutex<()>>,
}

impl AuditRecorder {
    pub fn new(pool: SqlitePool) -> Self {
        Self {
            pool,
            append_lock: Arc::new(Mutex::new(())),
        }
    }

    pub async fn append(&self, entry: NewLogEntry) -> AppResult<LogEntry> {
        let _guard = self.append_lock.lock().await;

        let id = Uuid::new_v4().to_string();
        let created_at = utc_now().to_rfc3339_opts(SecondsFormat::Micros, true);

        // IMMEDIATE takes the write lock before the tail is read, so another
        // process appending to the same file waits instead of forking the chain.
        let mut conn = self.pool.acquire().await?;
        sqlx::query("BEGIN IMMEDIATE").execute(&mut *conn).await?;

        let linked = match insert_linked(&mut conn, &entry, &id, &created_at).await {
            Ok(seq) => sqlx::query("COMMIT")
                .execute(&mut *conn)
                .await
                .map(|_| seq)
                .map_err(AppError::from),
            Err(err) => Err(err),
        };
        let seq = match linked {
            Ok(seq) => seq,
            Err(err) => {
                if let Err(rollback) = sqlx::query("ROLLBACK").execute(&mut *conn).await {
                    tracing::warn!(error = %rollback, "audit rollback failed");
                }
                return Err(err);
            }
        };

        tracing::debug!(
            seq,
            action = entry.action.as_str(),
            category = entry.category.as_str(),
            actor = %entry.actor_name,
            "audit entry appended"
        );

        Ok(LogEntry {
            seq,
            id: row_parsers::parse_uuid(id)?,
            actor_id: entry.actor_id,
            actor_name: entry.actor_name,
            action: entry.action,
            category: entry.category,
            message: entry.message,
            target: entry.target,
            context: entry.context,
            created_at: row_parsers::parse_datetime(&created_at)?,
        })
    }

    /// Appends every entry in order and returns how many were written.
    /// Failures are logged, never returned: the change being audited has
    /// already been committed.
    pub async fn append_all(&self, entries: impl IntoIterator<Item = NewLogEntry>) -> usize {
        let mut written = 0;
        for entry in entries {
            let action = entry.action;
            let category = entry.category;
            match self.append(entry).await {
                Ok(_) => written += 1,
                Err(err) => tracing::error!(
                    error = %err,
                    action = action.as_str(),
                    category = category.as_str(),
                    "failed to write audit entry"
                ),
            }
        }
        written
    }
}

/// Reads the chain tail and inserts `entry` after it. Runs inside the
/// caller's write transaction.
async fn insert_linked(conn: &mut SqliteConnection, entry: &NewLogEntry, id: &str, created_at: &str) -> AppResult<i64> {
    let prev_hash: Option<String> = sqlx::query_scalar("SELECT hash FROM log_entries ORDER BY seq DESC LIMIT 1")
        .fetch_optional(&mut *conn)
        .await?;

    let actor_id = entry.actor_id.map(|u| u.to_string());
    let target_kind = entry.target.map(|t| t.kind());
    let target_id = entry.target.map(|t| t.id().to_string());

    let hash = chain_hash(
        prev_hash.as_deref(),
        &ChainPayload {
            id,
            actor_id: actor_id.as_deref(),
            actor_name: &entry.actor_name,
            action: entry.action.as_str(),
            category: entry.category.as_str(),
            message: &entry.message,
            target_kind,
            target_id: target_id.as_deref(),
            created_at,
        },
    );

    let seq = sqlx::query(
        r#"
        INSERT INTO log_entries (id, actor_id, actor_name, action, category, message, target_kind, target_id,
                                 ip, user_agent, created_at, prev_hash, hash)
        VALUES (?, ?, ?, ?, ?, ?, ?, ?, ?, ?, ?, ?, ?)
        "#,
    )
    .bind(id)
    .bind(&actor_id)
    .bind(&entry.actor_name)
    .bind(entry.action.as_str())
    .bind(entry.category.as_str())
    .bind(&entry.message)
    .bind(target_kind)
    .bind(&target_id)
    .bind(&entry.context.ip)
    .bind(&entry.context.user_agent)
    .bind(created_at)
    .bind(&prev_hash)
    .bind(&hash)
    .execute(&mut *conn)
    .await?
    .last_insert_rowid();

    Ok(seq)
}

/// Entries of one category, newest first.
pub async fn entries_in(pool: &SqlitePool, category: LogCategory) -> AppResult<Vec<LogEntry>> {
    let rows = sqlx::query(
        r#"
        SELECT seq, id, actor_id, actor_name, action, category, message, target_kind, target_id,
               ip, user_agent, created_at
        FROM log_entries
        WHERE category = ?
        ORDER BY seq DESC
        "#,
    )
    .bind(category.as_str())
    .fetch_all(pool)
    .await?;

    rows.iter().map(row_parsers::log_entry_from_row).collect()
}
