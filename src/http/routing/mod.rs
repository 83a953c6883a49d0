use axum::http::{StatusCode, header};
use axum::response::{IntoResponse, Response};
use axum::{Router, middleware, routing::get};
use tower_http::trace::TraceLayer;

use super::routes;
use super::session::verify_csrf;
use super::types::{ApiError, AppState};

pub fn app(state: AppState) -> Router {
    Router::new()
        .route("/health", get(|| async { "ok" }))
        .merge(routes::auth::router())
        .merge(routes::items::router())
        .fallback(|| async { ApiError::new(StatusCode::NOT_FOUND, "Not Found") })
        .layer(middleware::map_response(method_not_allowed_as_json))
        .layer(middleware::from_fn_with_state(state.clone(), verify_csrf))
        .layer(TraceLayer::new_for_http())
        .with_state(state)
}

/// Axum answers a wrong method with an empty 405; give it the JSON error body
/// and keep its `Allow` header.
async fn method_not_allowed_as_json(response: Response) -> Response {
    if response.status() != StatusCode::METHOD_NOT_ALLOWED {
        return response;
    }
    let allow = response.headers().get(header::ALLOW).cloned();
    let mut json = ApiError::new(StatusCode::METHOD_NOT_ALLOWED, "Method Not Allowed").into_response();
    if let Some(allow) = allow {
        json.headers_mut().insert(header::ALLOW, allow);
    }
    json
}
