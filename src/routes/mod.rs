pub mod auth;
pub mod communication;
pub mod disposition;
pub mod health;
pub mod logs;
pub mod pages;
pub mod personal;
pub mod roles;
pub mod system;
pub mod users;

use axum::http::{header, HeaderValue, StatusCode};
use axum::response::{IntoResponse, Response};
use serde::Deserialize;
use utoipa::IntoParams;

use crate::errors::{AppError, AppResult};
use crate::utils::encode_query_value;

/// `?next=` carried through login and consent pages.
#[derive(Debug, Default, Deserialize, IntoParams)]
#[into_params(parameter_in = Query)]
pub struct NextQuery {
    /// Same-site path to continue to.
    pub next: Option<String>,
}

/// `303 See Other` to a location that is known to be a valid header value.
#[derive(Debug, Clone)]
pub struct SeeOther(HeaderValue);

impl IntoResponse for SeeOther {
    fn into_response(self) -> Response {
        (StatusCode::SEE_OTHER, [(header::LOCATION, self.0)]).into_response()
    }
}

/// Redirect-after-POST. Fails instead of panicking when `path` cannot be a
/// `Location` header.
pub(crate) fn see_other(path: impl AsRef<str>) -> AppResult<SeeOther> {
    HeaderValue::try_from(path.as_ref())
        .map(SeeOther)
        .map_err(|_| AppError::bad_request("redirect target is not a valid location"))
}

pub(crate) fn with_next(path: &str, next: Option<&str>) -> String {
    match next {
        Some(next) => format!("{}?next={}", path, encode_query_value(next)),
        None => path.to_string(),
    }
}
