use axum::extract::{State, rejection::JsonRejection};
use axum::http::StatusCode;
use axum::response::IntoResponse;
use axum::routing::{get, post};
use axum::{Json, Router};
use axum_extra::extract::cookie::CookieJar;
use serde_json::Value;

use crate::domain::user::User;
use crate::http::session::{self, SessionCookie};
use crate::http::types::{ApiError, AppState};

pub fn router() -> Router<AppState> {
    Router::new()
        .route("/csrf-handshake", get(handshake))
        .route("/register", post(register))
        .route("/login", post(login))
        .route("/logout", post(logout))
        .route("/user", get(current_user))
}

async fn handshake(
    State(state): State<AppState>,
    SessionCookie(current): SessionCookie,
    jar: CookieJar,
) -> Result<impl IntoResponse, ApiError> {
    let session = state.auth.handshake(current).await?;
    Ok((StatusCode::NO_CONTENT, session::issue(&state.session, jar, &session)))
}

async fn register(
    State(state): State<AppState>,
    SessionCookie(current): SessionCookie,
    jar: CookieJar,
    payload: Result<Json<Value>, JsonRejection>,
) -> Result<impl IntoResponse, ApiError> {
    let Json(body) = payload?;
    let (user, session) = state.auth.register(current, &body).await?;
    Ok((StatusCode::CREATED, session::issue(&state.session, jar, &session), Json(user)))
}

async fn login(
    State(state): State<AppState>,
    SessionCookie(current): SessionCookie,
    jar: CookieJar,
    payload: Result<Json<Value>, JsonRejection>,
) -> Result<impl IntoResponse, ApiError> {
    let Json(body) = payload?;
    let (user, session) = state.auth.login(current, &body).await?;
    Ok((StatusCode::OK, session::issue(&state.session, jar, &session), Json(user)))
}

async fn logout(
    State(state): State<AppState>,
    SessionCookie(current): SessionCookie,
    jar: CookieJar,
) -> Result<impl IntoResponse, ApiError> {
    state.auth.logout(current).await?;
    Ok((StatusCode::NO_CONTENT, session::expire(&state.session, jar)))
}

async fn current_user(State(state): State<AppState>, SessionCookie(current): SessionCookie) -> Result<Json<User>, ApiError> {
    Ok(Json(state.auth.current_user(current).await?))
}
