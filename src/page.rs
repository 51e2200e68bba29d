//! JSON page documents returned by every GET page.

use axum::Json;
use serde::Serialize;
use sqlx::SqlitePool;
use utoipa::ToSchema;
use uuid::Uuid;

use crate::authz::{Principal, RoleRef};
use crate::counters::UnreadCounters;
use crate::errors::{AppError, AppResult};
use crate::models::office::OfficeSettings;

#[derive(Debug, Clone, Serialize, ToSchema)]
pub struct Branding {
    pub app: String,
    pub logo: Option<String>,
}

#[derive(Debug, Clone, Serialize, ToSchema)]
pub struct Viewer {
    pub user_id: Uuid,
    pub username: String,
    pub role: RoleRef,
}

impl From<&Principal> for Viewer {
    fn from(p: &Principal) -> Self {
        Self {
            user_id: p.user_id,
            username: p.username.clone(),
            role: p.role.clone(),
        }
    }
}

/// Chrome shared by all pages plus the page-specific `data`.
#[derive(Debug, Serialize)]
pub struct Page<T> {
    pub app: Branding,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub viewer: Option<Viewer>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub unread: Option<UnreadCounters>,
    pub data: T,
}

pub async fn office_settings(pool: &SqlitePool) -> AppResult<OfficeSettings> {
    let row = sqlx::query("SELECT id, app, logo, updated_at FROM office_settings ORDER BY updated_at LIMIT 1")
        .fetch_optional(pool)
        .await?
        .ok_or_else(|| AppError::internal("office settings missing"))?;

    crate::db::row_parsers::office_settings_from_row(&row)
}

/// Builds the page for `viewer`. Anonymous pages carry no counters.
pub async fn render<T: Serialize>(pool: &SqlitePool, viewer: Option<&Principal>, data: T) -> AppResult<Json<Page<T>>> {
    let settings = office_settings(pool).await?;

    let unread = match viewer {
        Some(p) => Some(UnreadCounters::load(pool, p.user_id).await?),
        None => None,
    };

    Ok(Json(Page {
        app: Branding {
            app: settings.app,
            logo: settings.logo,
        },
        viewer: viewer.map(Viewer::from),
        unread,
        data,
    }))
}
