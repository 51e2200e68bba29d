use chrono::{DateTime, Utc};
use serde::Serialize;
use utoipa::ToSchema;
use uuid::Uuid;

use crate::audit::{LogAction, LogCategory, LogTarget, RequestContext};

/// Immutable audit record.
#[derive(Debug, Clone, Serialize, ToSchema)]
pub struct LogEntry {
    pub seq: i64,
    pub id: Uuid,
    pub actor_id: Option<Uuid>,
    pub actor_name: String,
    pub action: LogAction,
    pub category: LogCategory,
    pub message: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    #[schema(value_type = Option<Object>)]
    pub target: Option<LogTarget>,
    pub context: RequestContext,
    pub created_at: DateTime<Utc>,
}
