//! Request extractors whose rejections use the crate's JSON error body.

use axum::async_trait;
use axum::extract::rejection::FormRejection;
use axum::extract::{FromRequest, Request};
use serde::de::DeserializeOwned;

use crate::errors::AppError;

/// Urlencoded form body. A field that is missing or cannot be parsed comes
/// back as a 422 with a `fields` map, like any other validation failure.
#[derive(Debug, Clone, Copy, Default)]
pub struct Form<T>(pub T);

#[async_trait]
impl<T, S> FromRequest<S> for Form<T>
where
    T: DeserializeOwned,
    S: Send + Sync,
{
    type Rejection = AppError;

    async fn from_request(req: Request, state: &S) -> Result<Self, Self::Rejection> {
        match axum::Form::<T>::from_request(req, state).await {
            Ok(axum::Form(value)) => Ok(Form(value)),
            Err(rejection) => Err(form_error(rejection)),
        }
    }
}

fn form_error(rejection: FormRejection) -> AppError {
    match rejection {
        FormRejection::FailedToDeserializeForm(_) | FormRejection::FailedToDeserializeFormBody(_) => {
            let detail = rejection.body_text();
            tracing::debug!(%detail, "form rejected");
            field_error(&detail)
        }
        other => AppError::bad_request(other.body_text()),
    }
}

/// Maps ``missing field `color` `` onto that field; other decode failures
/// carry no field name and land on `form`.
fn field_error(detail: &str) -> AppError {
    let reason = detail.split_once(": ").map_or(detail, |(_, reason)| reason);
    match reason.strip_prefix("missing field ").and_then(quoted_name) {
        Some(field) => AppError::field(field, "this field is required"),
        None => AppError::field("form", reason),
    }
}

fn quoted_name(text: &str) -> Option<&str> {
    let start = text.find('`')? + 1;
    let len = text[start..].find('`')?;
    Some(&text[start..start + len])
}
