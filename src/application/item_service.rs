use async_trait::async_trait;
use serde_json::Value;

use super::error::{AppError, AppResult};
use crate::domain;
use crate::domain::item::{Item, ItemId, NewItem};
use crate::domain::repository::ItemRepository;
use crate::domain::user::UserId;
use crate::domain::validation;

/// Item operations on behalf of an already authenticated user. Operations on
/// an existing row check existence, then ownership, and only then look at
/// the request body.
#[async_trait]
pub trait ItemService: Send + Sync + 'static {
    async fn list(&self, user: UserId) -> AppResult<Vec<Item>>;
    async fn create(&self, user: UserId, body: &Value) -> AppResult<Item>;
    async fn update(&self, user: UserId, id: ItemId, body: &Value) -> AppResult<Item>;
    async fn delete(&self, user: UserId, id: ItemId) -> AppResult<()>;
}

#[derive(Clone)]
pub struct ItemServiceImpl<R: ItemRepository> {
    repo: R,
}

impl<R: ItemRepository> ItemServiceImpl<R> {
    pub fn new(repo: R) -> Self { Self { repo } }

    async fn owned_item(&self, user: UserId, id: ItemId) -> AppResult<Item> {
        let item = self.repo.get(id).await?.ok_or(AppError::NotFound)?;
        if !item.is_owned_by(user) {
            tracing::warn!(user_id = %user, item_id = %id, owner = %item.user_id, "rejected access to foreign item");
            return Err(AppError::Forbidden);
        }
        Ok(item)
    }
}

#[async_trait]
impl<R: ItemRepository> ItemService for ItemServiceImpl<R> {
    async fn list(&self, user: UserId) -> AppResult<Vec<Item>> {
        Ok(self.repo.list_for_user(user).await?)
    }

    async fn create(&self, user: UserId, body: &Value) -> AppResult<Item> {
        let name = validation::new_item(body)?;
        let item = self.repo.create(NewItem::new(name, user)).await?;
        tracing::info!(user_id = %user, item_id = %item.id, "item created");
        Ok(item)
    }

    async fn update(&self, user: UserId, id: ItemId, body: &Value) -> AppResult<Item> {
        let mut item = self.owned_item(user, id).await?;
        let changes = validation::item_changes(body)?;
        if item.apply(changes, domain::now()) {
            self.repo.save(&item).await?;
            tracing::info!(user_id = %user, item_id = %id, completed = item.completion.is_complete(), "item updated");
        }
        Ok(item)
    }

    async fn delete(&self, user: UserId, id: ItemId) -> AppResult<()> {
        self.owned_item(user, id).await?;
        if !self.repo.delete(id).await? {
            return Err(AppError::NotFound);
        }
        tracing::info!(user_id = %user, item_id = %id, "item deleted");
        Ok(())
    }
}
