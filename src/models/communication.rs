use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use utoipa::ToSchema;
use uuid::Uuid;

use crate::audit::{LogTarget, Loggable};

#[derive(Debug, Clone, Serialize, ToSchema)]
pub struct Announcement {
    pub id: Uuid,
    pub title: String,
    pub body: String,
    pub author_id: Option<Uuid>,
    pub created_at: DateTime<Utc>,
    /// Whether the viewing user is in the read-by set.
    pub read: bool,
}

#[derive(Debug, Clone, Serialize, ToSchema)]
pub struct Message {
    pub id: Uuid,
    pub sender_id: Uuid,
    pub sender_name: String,
    pub receiver_id: Uuid,
    pub subject: String,
    pub body: String,
    pub receiver_read: bool,
    pub created_at: DateTime<Utc>,
}

impl Loggable for Message {
    fn log_target(&self) -> LogTarget {
        LogTarget::Message(self.id)
    }
}

#[derive(Debug, Deserialize, ToSchema)]
pub struct MessageForm {
    /// Username of the receiver.
    pub receiver: String,
    pub subject: String,
    #[serde(default)]
    pub body: String,
}
