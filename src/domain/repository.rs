use async_trait::async_trait;
use chrono::{DateTime, Utc};

use super::item::{Item, ItemId, NewItem};
use super::session::{Session, SessionId};
use super::user::{NewUser, User, UserId};

#[async_trait]
pub trait ItemRepository: Send + Sync + 'static {
    async fn create(&self, input: NewItem) -> anyhow::Result<Item>;
    async fn get(&self, id: ItemId) -> anyhow::Result<Option<Item>>;
    /// Items owned by `owner`, newest first.
    async fn list_for_user(&self, owner: UserId) -> anyhow::Result<Vec<Item>>;
    async fn save(&self, item: &Item) -> anyhow::Result<()>;
    async fn delete(&self, id: ItemId) -> anyhow::Result<bool>;
}

#[async_trait]
pub trait UserRepository: Send + Sync + 'static {
    /// `None` when the email is already registered.
    async fn create(&self, input: NewUser) -> anyhow::Result<Option<User>>;
    async fn get(&self, id: UserId) -> anyhow::Result<Option<User>>;
    async fn find_by_email(&self, email: &str) -> anyhow::Result<Option<User>>;
}

#[async_trait]
pub trait SessionRepository: Send + Sync + 'static {
    async fn insert(&self, session: &Session) -> anyhow::Result<()>;
    async fn get(&self, id: SessionId) -> anyhow::Result<Option<Session>>;
    async fn save(&self, session: &Session) -> anyhow::Result<()>;
    async fn delete(&self, id: SessionId) -> anyhow::Result<bool>;
    /// Removes sessions last seen before `cutoff`; returns how many.
    async fn purge_idle_since(&self, cutoff: DateTime<Utc>) -> anyhow::Result<u64>;
}
