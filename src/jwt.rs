use std::sync::Arc;

use axum::async_trait;
use axum::extract::FromRequestParts;
use axum::http::request::Parts;
use axum::http::HeaderMap;
use chrono::{DateTime, Duration, Utc};
use jsonwebtoken::{DecodingKey, EncodingKey, Header, Validation};
use uuid::Uuid;

use crate::app::AppState;
use crate::errors::AppError;

/// Signing secret and session lifetime, read once at startup.
#[derive(Debug, Clone)]
pub struct JwtConfig {
    pub secret: Arc<Vec<u8>>,
    pub ttl: Duration,
}

impl JwtConfig {
    pub fn new(secret: impl Into<Vec<u8>>, ttl: Duration) -> Self {
        Self {
            secret: Arc::new(secret.into()),
            ttl,
        }
    }

    /// `JWT_SECRET` is required; `JWT_EXP_HOURS` defaults to a day.
    pub fn from_env() -> Result<Self, AppError> {
        let secret = std::env::var("JWT_SECRET").map_err(|_| AppError::configuration("JWT_SECRET not set"))?;
        let ttl = match std::env::var("JWT_EXP_HOURS") {
            Ok(raw) => session_ttl(&raw)?,
            Err(_) => Duration::hours(24),
        };

        Ok(Self::new(secret, ttl))
    }

    pub fn encode(&self, user_id: Uuid) -> Result<String, AppError> {
        let claims = Claims::issue(user_id, Utc::now(), self.ttl)
            .ok_or_else(|| AppError::token("session lifetime overflows the clock"))?;
        let key = EncodingKey::from_secret(&self.secret);

        jsonwebtoken::encode(&Header::default(), &claims, &key).map_err(|err| AppError::token(err.to_string()))
    }

    /// Rejects bad signatures and expired tokens.
    pub fn decode(&self, token: &str) -> Result<Claims, AppError> {
        let key = DecodingKey::from_secret(&self.secret);

        jsonwebtoken::decode::<Claims>(token, &key, &Validation::default())
            .map(|data| data.claims)
            .map_err(|err| AppError::token(err.to_string()))
    }
}

#[derive(Debug, Clone, serde::Serialize, serde::Deserialize)]
pub struct Claims {
    pub sub: Uuid,
    pub exp: usize,
    pub iat: usize,
}

impl Claims {
    fn issue(sub: Uuid, now: DateTime<Utc>, ttl: Duration) -> Option<Self> {
        let exp = now.checked_add_signed(ttl)?;
        Some(Self {
            sub,
            iat: now.timestamp() as usize,
            exp: exp.timestamp() as usize,
        })
    }
}

/// Parses `JWT_EXP_HOURS`: a positive whole number of hours that still
/// yields a representable expiry.
fn session_ttl(raw: &str) -> Result<Duration, AppError> {
    let hours = raw
        .trim()
        .parse::<i64>()
        .map_err(|_| AppError::configuration("JWT_EXP_HOURS must be a valid integer"))?;

    Duration::try_hours(hours)
        .filter(|ttl| hours > 0 && Utc::now().checked_add_signed(*ttl).is_some())
        .ok_or_else(|| AppError::configuration("JWT_EXP_HOURS is out of range"))
}

/// Token from an `Authorization: Bearer ...` header, if one was sent.
pub fn bearer_token(headers: &HeaderMap) -> Option<&str> {
    headers
        .get(axum::http::header::AUTHORIZATION)
        .and_then(|value| value.to_str().ok())
        .and_then(|value| value.strip_prefix("Bearer "))
        .map(str::trim)
        .filter(|token| !token.is_empty())
}

/// Bare token identity for the `/auth` endpoints, which sit outside the access gate.
#[derive(Debug, Clone)]
pub struct AuthUser {
    pub user_id: Uuid,
}

#[async_trait]
impl FromRequestParts<AppState> for AuthUser {
    type Rejection = AppError;

    async fn from_request_parts(parts: &mut Parts, state: &AppState) -> Result<Self, Self::Rejection> {
        let token = bearer_token(&parts.headers).ok_or_else(|| AppError::unauthorized("Authorization header missing"))?;

        let claims = state.jwt.decode(token)?;

        Ok(AuthUser {
            user_id: claims.sub,
        })
    }
}
