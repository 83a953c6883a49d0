use std::str::FromStr;
use std::sync::Arc;

use anyhow::{Context, Result};
use async_trait::async_trait;
use chrono::{DateTime, SecondsFormat, Utc};
use sqlx::{
    Pool, Row, Sqlite,
    sqlite::{SqliteConnectOptions, SqlitePoolOptions, SqliteRow},
};

use crate::domain::{
    item::{Completion, Item, ItemId, ItemName, NewItem},
    repository::ItemRepository,
    user::UserId,
};

/// SQLite-backed store for items, users and sessions. Cheap to clone; all
/// clones share one pool.
#[derive(Clone)]
pub struct SqliteStore {
    pub(super) pool: Arc<Pool<Sqlite>>,
}

impl SqliteStore {
    pub async fn connect(database_url: &str) -> Result<Self> {
        let options = SqliteConnectOptions::from_str(database_url)
            .with_context(|| format!("invalid DATABASE_URL {database_url}"))?
            .create_if_missing(true)
            .foreign_keys(true);
        // Every connection to an in-memory database sees its own empty
        // database, so those get exactly one connection that is never recycled.
        let pool = if database_url.contains(":memory:") {
            SqlitePoolOptions::new()
                .max_connections(1)
                .min_connections(1)
                .idle_timeout(None)
                .max_lifetime(None)
                .connect_with(options)
                .await?
        } else {
            SqlitePoolOptions::new()
                .max_connections(5)
                .connect_with(options)
                .await?
        };
        Ok(Self { pool: Arc::new(pool) })
    }

    pub async fn init(&self) -> Result<()> {
        sqlx::query(
            "CREATE TABLE IF NOT EXISTS users (
                id INTEGER PRIMARY KEY AUTOINCREMENT,
                name TEXT NOT NULL,
                email TEXT NOT NULL UNIQUE,
                password_hash TEXT NOT NULL,
                created_at TEXT NOT NULL
            )",
        )
        .execute(&*self.pool)
        .await?;
        sqlx::query(
            "CREATE TABLE IF NOT EXISTS items (
                id INTEGER PRIMARY KEY AUTOINCREMENT,
                name TEXT NOT NULL,
                completed INTEGER NOT NULL DEFAULT 0,
                completed_at TEXT,
                user_id INTEGER NOT NULL REFERENCES users(id) ON DELETE CASCADE,
                created_at TEXT NOT NULL,
                updated_at TEXT NOT NULL
            )",
        )
        .execute(&*self.pool)
        .await?;
        sqlx::query("CREATE INDEX IF NOT EXISTS items_user_created ON items (user_id, created_at)")
            .execute(&*self.pool)
            .await?;
        sqlx::query(
            "CREATE TABLE IF NOT EXISTS sessions (
                id TEXT PRIMARY KEY,
                user_id INTEGER REFERENCES users(id) ON DELETE CASCADE,
                csrf_token TEXT NOT NULL,
                created_at TEXT NOT NULL,
                last_seen_at TEXT NOT NULL
            )",
        )
        .execute(&*self.pool)
        .await?;
        Ok(())
    }
}

#[async_trait]
impl ItemRepository for SqliteStore {
    async fn create(&self, input: NewItem) -> Result<Item> {
        let result = sqlx::query(
            "INSERT INTO items (name, completed, completed_at, user_id, created_at, updated_at)
             VALUES (?1, 0, NULL, ?2, ?3, ?3)",
        )
        .bind(input.name.as_str())
        .bind(input.owner.0)
        .bind(timestamp(input.created_at))
        .execute(&*self.pool)
        .await?;
        Ok(Item {
            id: ItemId(result.last_insert_rowid()),
            name: input.name,
            completion: Completion::Incomplete,
            user_id: input.owner,
            created_at: input.created_at,
            updated_at: input.created_at,
        })
    }

    async fn get(&self, id: ItemId) -> Result<Option<Item>> {
        let row = sqlx::query("SELECT id, name, completed, completed_at, user_id, created_at, updated_at FROM items WHERE id = ?1")
            .bind(id.0)
            .fetch_optional(&*self.pool)
            .await?;
        row.map(row_to_item).transpose()
    }

    async fn list_for_user(&self, owner: UserId) -> Result<Vec<Item>> {
        let rows = sqlx::query(
            "SELECT id, name, completed, completed_at, user_id, created_at, updated_at FROM items
             WHERE user_id = ?1 ORDER BY created_at DESC, id DESC",
        )
        .bind(owner.0)
        .fetch_all(&*self.pool)
        .await?;
        rows.into_iter().map(row_to_item).collect()
    }

    async fn save(&self, item: &Item) -> Result<()> {
        sqlx::query("UPDATE items SET name = ?2, completed = ?3, completed_at = ?4, updated_at = ?5 WHERE id = ?1")
            .bind(item.id.0)
            .bind(item.name.as_str())
            .bind(item.completion.is_complete())
            .bind(item.completion.completed_at().map(timestamp))
            .bind(timestamp(item.updated_at))
            .execute(&*self.pool)
            .await?;
        Ok(())
    }

    async fn delete(&self, id: ItemId) -> Result<bool> {
        let result = sqlx::query("DELETE FROM items WHERE id = ?1")
            .bind(id.0)
            .execute(&*self.pool)
            .await?;
        Ok(result.rows_affected() > 0)
    }
}

fn row_to_item(row: SqliteRow) -> Result<Item> {
    let id = ItemId(row.try_get("id")?);
    let name: String = row.try_get("name")?;
    let completed: bool = row.try_get("completed")?;
    let completed_at: Option<String> = row.try_get("completed_at")?;

    let completion = match (completed, completed_at) {
        (true, Some(at)) => Completion::Complete { at: parse_timestamp(&at)? },
        (false, None) => Completion::Incomplete,
        _ => anyhow::bail!("item {id} has inconsistent completion columns"),
    };

    Ok(Item {
        id,
        name: ItemName::parse(&name).with_context(|| format!("item {id} has an invalid stored name"))?,
        completion,
        user_id: UserId(row.try_get("user_id")?),
        created_at: parse_timestamp(&row.try_get::<String, _>("created_at")?)?,
        updated_at: parse_timestamp(&row.try_get::<String, _>("updated_at")?)?,
    })
}

/// Fixed-width RFC 3339 so that text order is time order.
pub(super) fn timestamp(at: DateTime<Utc>) -> String {
    at.to_rfc3339_opts(SecondsFormat::Micros, true)
}

pub(super) fn parse_timestamp(raw: &str) -> Result<DateTime<Utc>> {
    Ok(DateTime::parse_from_rfc3339(raw)
        .with_context(|| format!("bad stored timestamp {raw}"))?
        .with_timezone(&Utc))
}
