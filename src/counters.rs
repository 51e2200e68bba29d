use serde::Serialize;
use sqlx::SqlitePool;
use utoipa::ToSchema;
use uuid::Uuid;

use crate::errors::AppResult;

/// Badge shown in the page chrome.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, ToSchema)]
pub struct UnreadCounters {
    pub announcements: i64,
    pub messages: i64,
    pub total: i64,
}

impl UnreadCounters {
    pub fn new(announcements: i64, messages: i64) -> Self {
        Self {
            announcements,
            messages,
            total: announcements + messages,
        }
    }

    /// Announcements the user has not marked as read, plus direct messages to
    /// the user that are still unread. Recomputed on every call.
    pub async fn load(pool: &SqlitePool, user_id: Uuid) -> AppResult<Self> {
        let user_id = user_id.to_string();

        let announcements: i64 = sqlx::query_scalar(
            r#"
            SELECT COUNT(1) FROM announcements a
            WHERE NOT EXISTS (
                SELECT 1 FROM announcement_reads r
                WHERE r.announcement_id = a.id AND r.user_id = ?
            )
            "#,
        )
        .bind(&user_id)
        .fetch_one(pool)
        .await?;

        let messages: i64 =
            sqlx::query_scalar("SELECT COUNT(1) FROM messages WHERE receiver_id = ? AND receiver_read = 0")
                .bind(&user_id)
                .fetch_one(pool)
                .await?;

        Ok(Self::new(announcements, messages))
    }
}
