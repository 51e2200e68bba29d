use axum::extract::State;
use axum::Json;
use serde::Serialize;
use utoipa::ToSchema;

use crate::app::AppState;
use crate::errors::AppResult;

#[derive(Debug, Serialize, ToSchema)]
pub struct HealthResponse {
    pub status: &'static str,
    pub db_ok: bool,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub db_error: Option<String>,
    /// Roles present; zero means the seed migration has not run.
    pub roles: i64,
}

#[utoipa::path(
    get,
    path = "/api/health",
    tag = "Health",
    responses((status = 200, description = "Health check", body = HealthResponse))
)]
pub async fn health(State(state): State<AppState>) -> AppResult<Json<HealthResponse>> {
    let roles = sqlx::query_scalar::<_, i64>("SELECT COUNT(1) FROM roles")
        .fetch_one(&state.pool)
        .await;

    let response = match roles {
        Ok(roles) => HealthResponse {
            status: if roles > 0 { "ok" } else { "degraded" },
            db_ok: true,
            db_error: None,
            roles,
        },
        Err(e) => {
            tracing::warn!(error = %e, "health check failed");
            HealthResponse {
                status: "degraded",
                db_ok: false,
                db_error: Some(e.to_string()),
                roles: 0,
            }
        }
    };

    Ok(Json(response))
}
