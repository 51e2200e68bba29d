//! Route-level middleware that runs the access check before any handler.

use axum::extract::{Request, State};
use axum::http::{HeaderMap, Method};
use axum::middleware::{self, Next};
use axum::response::{IntoResponse, Redirect, Response};
use axum::Router;

use super::evaluator::Decision;
use super::policy::AccessPolicy;
use super::principal::Principal;
use crate::app::AppState;
use crate::errors::{AppError, AppResult};
use crate::jwt::bearer_token;

#[derive(Clone)]
pub struct GateState {
    app: AppState,
    policy: AccessPolicy,
}

/// Puts every route of `routes` behind `policy`.
pub fn guard(state: &AppState, policy: AccessPolicy, routes: Router<AppState>) -> Router<AppState> {
    let gate = GateState {
        app: state.clone(),
        policy,
    };
    routes.route_layer(middleware::from_fn_with_state(gate, enforce))
}

/// No token means anonymous; a bad token or a token for a removed user is rejected.
pub async fn resolve_principal(state: &AppState, headers: &HeaderMap) -> AppResult<Option<Principal>> {
    let Some(token) = bearer_token(headers) else {
        return Ok(None);
    };

    let claims = state.jwt.decode(token)?;
    let principal = Principal::load(&state.pool, claims.sub)
        .await?
        .ok_or_else(|| AppError::unauthorized("user no longer exists"))?;

    Ok(Some(principal))
}

pub async fn enforce(State(gate): State<GateState>, mut request: Request, next: Next) -> Response {
    let principal = match resolve_principal(&gate.app, request.headers()).await {
        Ok(principal) => principal,
        Err(err) => return err.into_response(),
    };

    match gate.app.evaluator.evaluate(principal.as_ref(), &gate.policy) {
        Decision::Allow => {
            if let Some(principal) = principal {
                request.extensions_mut().insert(principal);
            }
            next.run(request).await
        }
        Decision::Redirect(destination) => {
            // Only a GET can be resumed later.
            let next_path = (request.method() == Method::GET)
                .then(|| request.uri().path_and_query().map(|pq| pq.as_str().to_string()))
                .flatten();

            tracing::info!(
                policy = gate.policy.name,
                user_id = ?principal.as_ref().map(|p| p.user_id),
                path = %request.uri().path(),
                destination = destination.path(),
                "access gate redirect"
            );

            Redirect::to(&destination.location(next_path.as_deref())).into_response()
        }
    }
}
