use axum::extract::{Path, State, rejection::JsonRejection};
use axum::http::StatusCode;
use axum::routing::{get, patch};
use axum::{Json, Router};
use serde_json::Value;

use crate::application::error::AppError;
use crate::domain::item::{Item, ItemId};
use crate::http::session::SessionUser;
use crate::http::types::{ApiError, AppState, Message};

pub fn router() -> Router<AppState> {
    Router::new()
        .route("/items", get(list_items).post(create_item))
        .route("/items/:id", patch(update_item).put(update_item).delete(delete_item))
}

async fn list_items(State(state): State<AppState>, SessionUser(user): SessionUser) -> Result<Json<Vec<Item>>, ApiError> {
    Ok(Json(state.items.list(user).await?))
}

async fn create_item(
    State(state): State<AppState>,
    SessionUser(user): SessionUser,
    payload: Result<Json<Value>, JsonRejection>,
) -> Result<(StatusCode, Json<Item>), ApiError> {
    let Json(body) = payload?;
    let item = state.items.create(user, &body).await?;
    Ok((StatusCode::CREATED, Json(item)))
}

async fn update_item(
    State(state): State<AppState>,
    SessionUser(user): SessionUser,
    Path(id): Path<String>,
    payload: Result<Json<Value>, JsonRejection>,
) -> Result<Json<Item>, ApiError> {
    let id = parse_id(&id)?;
    let Json(body) = payload?;
    Ok(Json(state.items.update(user, id, &body).await?))
}

async fn delete_item(
    State(state): State<AppState>,
    SessionUser(user): SessionUser,
    Path(id): Path<String>,
) -> Result<Json<Message>, ApiError> {
    let id = parse_id(&id)?;
    state.items.delete(user, id).await?;
    Ok(Json(Message { message: format!("Item {id} deleted") }))
}

/// Ids are integers; anything else cannot name a row.
fn parse_id(raw: &str) -> Result<ItemId, ApiError> {
    raw.parse::<i64>().map(ItemId).map_err(|_| AppError::NotFound.into())
}
