//! Cookie session plumbing: reading the session cookie, issuing and expiring
//! cookies, and the anti-forgery guard in front of every mutating route.

use std::convert::Infallible;

use axum::async_trait;
use axum::extract::{FromRequestParts, Request, State};
use axum::http::{HeaderMap, HeaderName, Method, request::Parts};
use axum::middleware::Next;
use axum::response::{AppendHeaders, Response};
use axum_extra::extract::cookie::{Cookie, CookieJar, SameSite};

use super::types::{ApiError, AppState};
use crate::application::error::AppError;
use crate::config::SessionConfig;
use crate::domain::session::{Session, SessionId};
use crate::domain::user::UserId;

pub const CSRF_HEADER: HeaderName = HeaderName::from_static("x-csrf-token");
pub const XSRF_HEADER: HeaderName = HeaderName::from_static("x-xsrf-token");
pub const XSRF_COOKIE: &str = "XSRF-TOKEN";

/// Session id named by the request's cookie, if it parses. Quoted cookie
/// values are accepted.
pub fn session_id(headers: &HeaderMap, config: &SessionConfig) -> Option<SessionId> {
    CookieJar::from_headers(headers)
        .get(&config.cookie_name)?
        .value_trimmed()
        .parse()
        .ok()
}

fn cookie(config: &SessionConfig, name: String, value: String, http_only: bool) -> Cookie<'static> {
    Cookie::build((name, value))
        .path("/")
        .max_age(time::Duration::minutes(config.lifetime_minutes))
        .same_site(SameSite::Lax)
        .http_only(http_only)
        .secure(config.secure)
        .build()
}

/// Response parts that hand `session` to the client: the session cookie, the
/// script-readable token cookie and the token header.
pub fn issue(
    config: &SessionConfig,
    jar: CookieJar,
    session: &Session,
) -> (CookieJar, AppendHeaders<[(HeaderName, String); 1]>) {
    let jar = jar
        .add(cookie(config, config.cookie_name.clone(), session.id.to_string(), true))
        .add(cookie(config, XSRF_COOKIE.to_string(), session.csrf_token.clone(), false));
    (jar, AppendHeaders([(CSRF_HEADER, session.csrf_token.clone())]))
}

pub fn expire(config: &SessionConfig, jar: CookieJar) -> CookieJar {
    jar.remove(Cookie::build(config.cookie_name.clone()).path("/"))
        .remove(Cookie::build(XSRF_COOKIE).path("/"))
}

/// The session id from the cookie, unverified. Never rejects.
pub struct SessionCookie(pub Option<SessionId>);

#[async_trait]
impl FromRequestParts<AppState> for SessionCookie {
    type Rejection = Infallible;

    async fn from_request_parts(parts: &mut Parts, state: &AppState) -> Result<Self, Self::Rejection> {
        Ok(Self(session_id(&parts.headers, &state.session)))
    }
}

/// The logged-in user behind the session cookie; rejects with 401 otherwise.
/// Reuses the session [`verify_csrf`] already resolved for this request.
pub struct SessionUser(pub UserId);

#[async_trait]
impl FromRequestParts<AppState> for SessionUser {
    type Rejection = ApiError;

    async fn from_request_parts(parts: &mut Parts, state: &AppState) -> Result<Self, Self::Rejection> {
        if let Some(session) = parts.extensions.get::<Session>() {
            return session.user_id.map(Self).ok_or_else(|| AppError::Unauthenticated.into());
        }
        let current = session_id(&parts.headers, &state.session);
        Ok(Self(state.auth.require_user(current).await?))
    }
}

fn is_mutating(method: &Method) -> bool {
    matches!(*method, Method::POST | Method::PUT | Method::PATCH | Method::DELETE)
}

/// Rejects mutating requests whose token header does not match the session.
/// The verified session rides along in the request extensions.
pub async fn verify_csrf(State(state): State<AppState>, mut request: Request, next: Next) -> Result<Response, ApiError> {
    if is_mutating(request.method()) {
        let (current, token) = {
            let headers = request.headers();
            let token = headers
                .get(CSRF_HEADER)
                .or_else(|| headers.get(XSRF_HEADER))
                .and_then(|v| v.to_str().ok())
                .map(str::to_owned);
            (session_id(headers, &state.session), token)
        };
        match state.auth.verify_csrf(current, token.as_deref()).await {
            Ok(session) => {
                request.extensions_mut().insert(session);
            }
            Err(err) => {
                tracing::warn!(method = %request.method(), path = %request.uri().path(), "anti-forgery check failed");
                return Err(err.into());
            }
        }
    }
    Ok(next.run(request).await)
}
