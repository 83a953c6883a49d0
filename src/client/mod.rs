//! HTTP client for the item API.
//!
//! Every call carries the cookie jar, `X-Requested-With: XMLHttpRequest` and
//! `Accept: application/json`. Mutating calls first fetch a fresh token from
//! `/csrf-handshake` and are never sent when that fails. A 401 from any call
//! flips the shared [`AuthState`] to logged out instead of being handled at
//! the call site.

mod auth_state;

use std::collections::BTreeMap;

use http::header::{ACCEPT, HeaderMap, HeaderName, HeaderValue};
use http::{Method, StatusCode};
use serde::de::DeserializeOwned;
use serde::{Deserialize, Serialize};
use serde_json::{Value, json};

pub use auth_state::AuthState;

use crate::domain::item::{Item, ItemId};
use crate::domain::user::User;

const CSRF_HEADER: HeaderName = HeaderName::from_static("x-csrf-token");
const REQUESTED_WITH: HeaderName = HeaderName::from_static("x-requested-with");

#[derive(Debug, thiserror::Error)]
pub enum ClientError {
    #[error("Failed to obtain CSRF token: {0}")]
    Handshake(String),
    #[error("Unauthorized")]
    Unauthenticated,
    #[error("{message}")]
    Api {
        status: StatusCode,
        message: String,
        errors: BTreeMap<String, Vec<String>>,
    },
    #[error(transparent)]
    Transport(#[from] reqwest::Error),
}

/// Fields to change on an item; `None` leaves the field alone.
#[derive(Debug, Clone, Default, Serialize)]
pub struct ItemPatch {
    #[serde(skip_serializing_if = "Option::is_none")]
    pub name: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub completed: Option<bool>,
}

#[derive(Debug, Default, Deserialize)]
struct ErrorBody {
    #[serde(default)]
    message: String,
    #[serde(default)]
    errors: BTreeMap<String, Vec<String>>,
}

#[derive(Debug, Deserialize)]
struct MessageBody {
    message: String,
}

#[derive(Clone)]
pub struct ApiClient {
    http: reqwest::Client,
    base_url: String,
    auth: AuthState,
}

impl ApiClient {
    pub fn new(base_url: impl Into<String>, auth: AuthState) -> Result<Self, ClientError> {
        let mut headers = HeaderMap::new();
        headers.insert(REQUESTED_WITH, HeaderValue::from_static("XMLHttpRequest"));
        headers.insert(ACCEPT, HeaderValue::from_static("application/json"));
        let http = reqwest::Client::builder()
            .cookie_store(true)
            .default_headers(headers)
            .build()?;
        let base_url = base_url.into().trim_end_matches('/').to_string();
        Ok(Self { http, base_url, auth })
    }

    pub fn auth(&self) -> &AuthState {
        &self.auth
    }

    pub async fn list_items(&self) -> Result<Vec<Item>, ClientError> {
        self.call(Method::GET, "/items", None).await
    }

    pub async fn create_item(&self, name: &str) -> Result<Item, ClientError> {
        self.call(Method::POST, "/items", Some(json!({ "item": { "name": name } }))).await
    }

    pub async fn update_item(&self, id: ItemId, patch: &ItemPatch) -> Result<Item, ClientError> {
        self.call(Method::PATCH, &format!("/items/{id}"), Some(json!({ "item": patch }))).await
    }

    pub async fn set_completed(&self, id: ItemId, completed: bool) -> Result<Item, ClientError> {
        self.update_item(id, &ItemPatch { completed: Some(completed), ..ItemPatch::default() }).await
    }

    pub async fn rename_item(&self, id: ItemId, name: &str) -> Result<Item, ClientError> {
        self.update_item(id, &ItemPatch { name: Some(name.to_string()), ..ItemPatch::default() }).await
    }

    /// Returns the server's confirmation message.
    pub async fn delete_item(&self, id: ItemId) -> Result<String, ClientError> {
        let body: MessageBody = self.call(Method::DELETE, &format!("/items/{id}"), None).await?;
        Ok(body.message)
    }

    pub async fn register(&self, name: &str, email: &str, password: &str) -> Result<User, ClientError> {
        let body = json!({ "name": name, "email": email, "password": password });
        let user = self.call(Method::POST, "/register", Some(body)).await?;
        self.auth.set_authenticated(true);
        Ok(user)
    }

    pub async fn login(&self, email: &str, password: &str) -> Result<User, ClientError> {
        let body = json!({ "email": email, "password": password });
        let user = self.call(Method::POST, "/login", Some(body)).await?;
        self.auth.set_authenticated(true);
        Ok(user)
    }

    pub async fn logout(&self) -> Result<(), ClientError> {
        self.send(Method::POST, "/logout", None).await?;
        self.auth.set_authenticated(false);
        Ok(())
    }

    /// Asks the server who the session belongs to; used to restore state at
    /// startup.
    pub async fn current_user(&self) -> Result<User, ClientError> {
        let user = self.call(Method::GET, "/user", None).await?;
        self.auth.set_authenticated(true);
        Ok(user)
    }

    async fn call<T: DeserializeOwned>(&self, method: Method, path: &str, body: Option<Value>) -> Result<T, ClientError> {
        let response = self.send(method, path, body).await?;
        Ok(response.json().await?)
    }

    async fn send(&self, method: Method, path: &str, body: Option<Value>) -> Result<reqwest::Response, ClientError> {
        let mutating = matches!(method, Method::POST | Method::PUT | Method::PATCH | Method::DELETE);
        let mut request = self.http.request(method.clone(), self.url(path));
        if mutating {
            let token = self.handshake().await.inspect_err(|err| {
                tracing::warn!(%method, path, error = %err, "handshake failed; request not sent");
            })?;
            request = request.header(CSRF_HEADER, token);
        }
        if let Some(body) = body {
            request = request.json(&body);
        }

        let response = request.send().await?;
        let status = response.status();
        if status == StatusCode::UNAUTHORIZED {
            tracing::info!(%method, path, "session rejected; logging out");
            self.auth.set_authenticated(false);
            return Err(ClientError::Unauthenticated);
        }
        if !status.is_success() {
            let body: ErrorBody = response.json().await.unwrap_or_default();
            let message = if body.message.is_empty() {
                status.canonical_reason().unwrap_or("Request failed").to_string()
            } else {
                body.message
            };
            return Err(ClientError::Api { status, message, errors: body.errors });
        }
        Ok(response)
    }

    async fn handshake(&self) -> Result<String, ClientError> {
        let response = self
            .http
            .get(self.url("/csrf-handshake"))
            .send()
            .await
            .map_err(|err| ClientError::Handshake(err.to_string()))?;
        if !response.status().is_success() {
            return Err(ClientError::Handshake(format!("server answered {}", response.status())));
        }
        response
            .headers()
            .get(CSRF_HEADER)
            .and_then(|v| v.to_str().ok())
            .map(str::to_owned)
            .ok_or_else(|| ClientError::Handshake("no token in response".into()))
    }

    fn url(&self, path: &str) -> String {
        format!("{}{}", self.base_url, path)
    }
}
