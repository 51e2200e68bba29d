use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use utoipa::ToSchema;
use uuid::Uuid;

use crate::audit::{LogTarget, Loggable};

/// Application-wide settings; there is a single row.
#[derive(Debug, Clone, Serialize, ToSchema)]
pub struct OfficeSettings {
    pub id: Uuid,
    pub app: String,
    pub logo: Option<String>,
    pub updated_at: DateTime<Utc>,
}

impl Loggable for OfficeSettings {
    fn log_target(&self) -> LogTarget {
        LogTarget::OfficeSettings(self.id)
    }
}

#[derive(Debug, Deserialize, ToSchema)]
pub struct AppNameForm {
    #[schema(example = "OfficeSync")]
    pub app: String,
}

#[derive(Debug, Deserialize, ToSchema)]
pub struct LogoForm {
    /// Location of the uploaded logo; empty clears it.
    #[schema(example = "/media/logo.png")]
    pub logo: Option<String>,
}
