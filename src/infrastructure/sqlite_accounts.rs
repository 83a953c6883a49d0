use anyhow::{Context, Result};
use async_trait::async_trait;
use chrono::{DateTime, Utc};
use sqlx::{Row, sqlite::SqliteRow};

use super::sqlite_repo::{SqliteStore, parse_timestamp, timestamp};
use crate::domain::{
    self,
    repository::{SessionRepository, UserRepository},
    session::{Session, SessionId},
    user::{NewUser, User, UserId},
};

#[async_trait]
impl UserRepository for SqliteStore {
    async fn create(&self, input: NewUser) -> Result<Option<User>> {
        let now = domain::now();
        let inserted = sqlx::query("INSERT INTO users (name, email, password_hash, created_at) VALUES (?1, ?2, ?3, ?4)")
            .bind(&input.name)
            .bind(&input.email)
            .bind(&input.password_hash)
            .bind(timestamp(now))
            .execute(&*self.pool)
            .await;
        let result = match inserted {
            Err(sqlx::Error::Database(err)) if err.is_unique_violation() => return Ok(None),
            other => other?,
        };
        Ok(Some(User {
            id: UserId(result.last_insert_rowid()),
            name: input.name,
            email: input.email,
            password_hash: input.password_hash,
            created_at: now,
        }))
    }

    async fn get(&self, id: UserId) -> Result<Option<User>> {
        let row = sqlx::query("SELECT id, name, email, password_hash, created_at FROM users WHERE id = ?1")
            .bind(id.0)
            .fetch_optional(&*self.pool)
            .await?;
        row.map(row_to_user).transpose()
    }

    async fn find_by_email(&self, email: &str) -> Result<Option<User>> {
        let row = sqlx::query("SELECT id, name, email, password_hash, created_at FROM users WHERE email = ?1")
            .bind(email)
            .fetch_optional(&*self.pool)
            .await?;
        row.map(row_to_user).transpose()
    }
}

#[async_trait]
impl SessionRepository for SqliteStore {
    async fn insert(&self, session: &Session) -> Result<()> {
        sqlx::query(
            "INSERT INTO sessions (id, user_id, csrf_token, created_at, last_seen_at)
             VALUES (?1, ?2, ?3, ?4, ?5)",
        )
        .bind(session.id.to_string())
        .bind(session.user_id.map(|u| u.0))
        .bind(&session.csrf_token)
        .bind(timestamp(session.created_at))
        .bind(timestamp(session.last_seen_at))
        .execute(&*self.pool)
        .await?;
        Ok(())
    }

    async fn get(&self, id: SessionId) -> Result<Option<Session>> {
        let row = sqlx::query("SELECT id, user_id, csrf_token, created_at, last_seen_at FROM sessions WHERE id = ?1")
            .bind(id.to_string())
            .fetch_optional(&*self.pool)
            .await?;
        row.map(row_to_session).transpose()
    }

    async fn save(&self, session: &Session) -> Result<()> {
        sqlx::query("UPDATE sessions SET user_id = ?2, csrf_token = ?3, last_seen_at = ?4 WHERE id = ?1")
            .bind(session.id.to_string())
            .bind(session.user_id.map(|u| u.0))
            .bind(&session.csrf_token)
            .bind(timestamp(session.last_seen_at))
            .execute(&*self.pool)
            .await?;
        Ok(())
    }

    async fn delete(&self, id: SessionId) -> Result<bool> {
        let result = sqlx::query("DELETE FROM sessions WHERE id = ?1")
            .bind(id.to_string())
            .execute(&*self.pool)
            .await?;
        Ok(result.rows_affected() > 0)
    }

    async fn purge_idle_since(&self, cutoff: DateTime<Utc>) -> Result<u64> {
        let result = sqlx::query("DELETE FROM sessions WHERE last_seen_at < ?1")
            .bind(timestamp(cutoff))
            .execute(&*self.pool)
            .await?;
        Ok(result.rows_affected())
    }
}

fn row_to_user(row: SqliteRow) -> Result<User> {
    Ok(User {
        id: UserId(row.try_get("id")?),
        name: row.try_get("name")?,
        email: row.try_get("email")?,
        password_hash: row.try_get("password_hash")?,
        created_at: parse_timestamp(&row.try_get::<String, _>("created_at")?)?,
    })
}

fn row_to_session(row: SqliteRow) -> Result<Session> {
    let id: String = row.try_get("id")?;
    let user_id: Option<i64> = row.try_get("user_id")?;
    Ok(Session {
        id: id.parse().with_context(|| format!("bad stored session id {id}"))?,
        user_id: user_id.map(UserId),
        csrf_token: row.try_get("csrf_token")?,
        created_at: parse_timestamp(&row.try_get::<String, _>("created_at")?)?,
        last_seen_at: parse_timestamp(&row.try_get::<String, _>("last_seen_at")?)?,
    })
}

#[cfg(test)]
mod tests {
    use super::*;

    fn alice() -> NewUser {
        NewUser { name: "Alice".into(), email: "alice@example.com".into(), password_hash: "hash".into() }
    }

    #[tokio::test]
    async fn second_insert_of_an_email_reports_it_taken() {
        let store = SqliteStore::connect("sqlite::memory:").await.unwrap();
        store.init().await.unwrap();

        let user = UserRepository::create(&store, alice()).await.unwrap().unwrap();
        assert!(UserRepository::create(&store, alice()).await.unwrap().is_none());
        assert_eq!(store.find_by_email("alice@example.com").await.unwrap(), Some(user));
    }
}
