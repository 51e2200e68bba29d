use std::sync::Arc;

use axum::http::Method;
use axum::routing::{get, post};
use axum::Router;
use sqlx::SqlitePool;
use tower_http::cors::{Any, CorsLayer};
use tower_http::trace::TraceLayer;

use crate::audit::AuditRecorder;
use crate::authz::{DefaultPolicyEvaluator, PolicyEvaluator};
use crate::errors::AppError;
use crate::jwt::JwtConfig;
use crate::routes::{auth, communication, disposition, health, logs, pages, personal, roles, system, users};

#[derive(Clone)]
pub struct AppState {
    pub pool: SqlitePool,
    pub jwt: Arc<JwtConfig>,
    pub audit: AuditRecorder,
    pub evaluator: Arc<dyn PolicyEvaluator>,
}

impl AppState {
    pub fn new(pool: SqlitePool, jwt: JwtConfig) -> Self {
        Self {
            audit: AuditRecorder::new(pool.clone()),
            pool,
            jwt: Arc::new(jwt),
            evaluator: Arc::new(DefaultPolicyEvaluator::new()),
        }
    }

    pub fn with_evaluator(mut self, evaluator: impl PolicyEvaluator + 'static) -> Self {
        self.evaluator = Arc::new(evaluator);
        self
    }
}

pub async fn create_app(pool: SqlitePool) -> Result<Router, AppError> {
    let jwt_config = JwtConfig::from_env()?;
    let state = AppState::new(pool, jwt_config);
    Ok(build_router(state))
}

/// Every page route group sits behind its own access policy (see each
/// module's `routes`); `/auth` and `/api/health` are outside the gate.
pub fn build_router(state: AppState) -> Router {
    let cors = CorsLayer::new()
        .allow_methods([Method::GET, Method::POST, Method::OPTIONS])
        .allow_origin(Any)
        .allow_headers(Any);

    let auth_routes = Router::new()
        .route("/register", post(auth::register))
        .route("/login", post(auth::login))
        .route("/me", get(auth::me))
        .route("/logout", post(auth::logout));

    Router::new()
        .nest("/auth", auth_routes)
        .route("/api/health", get(health::health))
        .merge(pages::routes(&state))
        .merge(system::routes(&state))
        .merge(roles::routes(&state))
        .merge(users::routes(&state))
        .merge(logs::routes(&state))
        .merge(disposition::routes(&state))
        .merge(personal::routes(&state))
        .merge(communication::routes(&state))
        .with_state(state)
        .layer(cors)
        .layer(TraceLayer::new_for_http())
}
