use std::sync::Arc;

use axum::extract::rejection::JsonRejection;
use axum::http::StatusCode;
use axum::response::{IntoResponse, Response};
use serde::{Deserialize, Serialize};

use crate::application::{auth_service::AuthService, error::AppError, item_service::ItemService};
use crate::config::SessionConfig;
use crate::domain::validation::ValidationErrors;

#[derive(Clone)]
pub struct AppState {
    pub items: Arc<dyn ItemService>,
    pub auth: Arc<dyn AuthService>,
    pub session: Arc<SessionConfig>,
}

impl AppState {
    pub fn new(items: impl ItemService, auth: impl AuthService, session: SessionConfig) -> Self {
        Self { items: Arc::new(items), auth: Arc::new(auth), session: Arc::new(session) }
    }
}

/// Plain `{message}` body for successful calls that return no record.
#[derive(Debug, Serialize, Deserialize)]
pub struct Message {
    pub message: String,
}

/// Every error leaves the server as JSON with a `message`; validation
/// failures add the per-field `errors` map.
#[derive(Debug)]
pub struct ApiError {
    pub status: StatusCode,
    pub message: String,
    pub errors: Option<ValidationErrors>,
}

#[derive(Serialize)]
struct ErrorBody<'a> {
    message: &'a str,
    #[serde(skip_serializing_if = "Option::is_none")]
    errors: Option<&'a ValidationErrors>,
}

impl ApiError {
    pub fn new(status: StatusCode, message: impl Into<String>) -> Self {
        Self { status, message: message.into(), errors: None }
    }
}

/// Laravel's "page expired" status, used for anti-forgery failures.
pub fn token_mismatch_status() -> StatusCode {
    StatusCode::from_u16(419).unwrap_or(StatusCode::FORBIDDEN)
}

impl From<AppError> for ApiError {
    fn from(err: AppError) -> Self {
        let message = err.to_string();
        match err {
            AppError::Unauthenticated => ApiError::new(StatusCode::UNAUTHORIZED, message),
            AppError::Forbidden => ApiError::new(StatusCode::FORBIDDEN, message),
            AppError::NotFound => ApiError::new(StatusCode::NOT_FOUND, message),
            AppError::TokenMismatch => ApiError::new(token_mismatch_status(), message),
            AppError::Validation(errors) => ApiError {
                status: StatusCode::UNPROCESSABLE_ENTITY,
                message: errors.summary(),
                errors: Some(errors),
            },
            AppError::Internal(source) => {
                tracing::error!(error = ?source, "request failed");
                ApiError::new(StatusCode::INTERNAL_SERVER_ERROR, "Server Error")
            }
        }
    }
}

impl From<JsonRejection> for ApiError {
    fn from(rejection: JsonRejection) -> Self {
        ApiError::new(rejection.status(), format!("Malformed JSON body: {}", rejection.body_text()))
    }
}

impl IntoResponse for ApiError {
    fn into_response(self) -> Response {
        let body = ErrorBody { message: &self.message, errors: self.errors.as_ref() };
        (self.status, axum::Json(body)).into_response()
    }
}
