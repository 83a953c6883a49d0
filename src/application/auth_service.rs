use async_trait::async_trait;
use chrono::Duration;
use rand::Rng;
use serde_json::Value;

use super::error::{AppError, AppResult};
use super::password::{hash_password, verify_password};
use crate::domain;
use crate::domain::repository::{SessionRepository, UserRepository};
use crate::domain::session::{Session, SessionId};
use crate::domain::user::{NewUser, User, UserId};
use crate::domain::validation::{self, ValidationErrors};

const BAD_CREDENTIALS: &str = "These credentials do not match our records.";
const EMAIL_TAKEN: &str = "The email has already been taken.";

/// Chance that opening an anonymous session also sweeps expired ones.
pub const SWEEP_ODDS: (u32, u32) = (2, 100);

/// Sessions, anti-forgery tokens and accounts.
#[async_trait]
pub trait AuthService: Send + Sync + 'static {
    /// The live session with its current token, or a new anonymous one.
    async fn handshake(&self, current: Option<SessionId>) -> AppResult<Session>;
    /// The live session for `id`, refreshing its idle timer.
    async fn resolve(&self, id: SessionId) -> AppResult<Option<Session>>;
    async fn verify_csrf(&self, current: Option<SessionId>, token: Option<&str>) -> AppResult<Session>;
    async fn require_user(&self, current: Option<SessionId>) -> AppResult<UserId>;
    async fn current_user(&self, current: Option<SessionId>) -> AppResult<User>;
    async fn register(&self, current: Option<SessionId>, body: &Value) -> AppResult<(User, Session)>;
    async fn login(&self, current: Option<SessionId>, body: &Value) -> AppResult<(User, Session)>;
    async fn logout(&self, current: Option<SessionId>) -> AppResult<()>;
    async fn purge_expired(&self) -> AppResult<u64>;
}

#[derive(Clone)]
pub struct AuthServiceImpl<U: UserRepository, S: SessionRepository> {
    users: U,
    sessions: S,
    lifetime: Duration,
    sweep_odds: (u32, u32),
}

impl<U: UserRepository, S: SessionRepository> AuthServiceImpl<U, S> {
    pub fn new(users: U, sessions: S, lifetime: Duration) -> Self {
        Self { users, sessions, lifetime, sweep_odds: SWEEP_ODDS }
    }

    pub fn with_sweep_odds(mut self, numerator: u32, denominator: u32) -> Self {
        let denominator = denominator.max(1);
        self.sweep_odds = (numerator.min(denominator), denominator);
        self
    }

    async fn maybe_sweep(&self) -> AppResult<()> {
        let (numerator, denominator) = self.sweep_odds;
        if rand::thread_rng().gen_ratio(numerator, denominator) {
            let purged = self.purge_expired().await?;
            if purged > 0 {
                tracing::debug!(purged, "swept expired sessions");
            }
        }
        Ok(())
    }

    async fn live(&self, current: Option<SessionId>) -> AppResult<Option<Session>> {
        match current {
            Some(id) => self.resolve(id).await,
            None => Ok(None),
        }
    }

    /// Replaces whatever session the client had with a fresh one bound to `user`.
    async fn start_session(&self, previous: Option<SessionId>, user: &User) -> AppResult<Session> {
        if let Some(old) = previous {
            self.sessions.delete(old).await?;
        }
        let session = Session::regenerated_for(user.id, domain::now());
        self.sessions.insert(&session).await?;
        tracing::info!(user_id = %user.id, "session started");
        Ok(session)
    }
}

#[async_trait]
impl<U: UserRepository, S: SessionRepository> AuthService for AuthServiceImpl<U, S> {
    async fn handshake(&self, current: Option<SessionId>) -> AppResult<Session> {
        if let Some(session) = self.live(current).await? {
            return Ok(session);
        }
        self.maybe_sweep().await?;
        let session = Session::anonymous(domain::now());
        self.sessions.insert(&session).await?;
        tracing::debug!(session = %session.id, "anonymous session opened");
        Ok(session)
    }

    async fn resolve(&self, id: SessionId) -> AppResult<Option<Session>> {
        let Some(mut session) = self.sessions.get(id).await? else { return Ok(None) };
        let now = domain::now();
        if session.is_expired(self.lifetime, now) {
            self.sessions.delete(id).await?;
            return Ok(None);
        }
        session.last_seen_at = now;
        self.sessions.save(&session).await?;
        Ok(Some(session))
    }

    async fn verify_csrf(&self, current: Option<SessionId>, token: Option<&str>) -> AppResult<Session> {
        let session = self.live(current).await?.ok_or(AppError::TokenMismatch)?;
        match token {
            Some(token) if session.token_matches(token) => Ok(session),
            _ => Err(AppError::TokenMismatch),
        }
    }

    async fn require_user(&self, current: Option<SessionId>) -> AppResult<UserId> {
        self.live(current)
            .await?
            .and_then(|s| s.user_id)
            .ok_or(AppError::Unauthenticated)
    }

    async fn current_user(&self, current: Option<SessionId>) -> AppResult<User> {
        let id = self.require_user(current).await?;
        self.users.get(id).await?.ok_or(AppError::Unauthenticated)
    }

    async fn register(&self, current: Option<SessionId>, body: &Value) -> AppResult<(User, Session)> {
        let input = validation::registration(body)?;
        if self.users.find_by_email(&input.email).await?.is_some() {
            return Err(ValidationErrors::single("email", EMAIL_TAKEN).into());
        }
        let password_hash = hash_password(&input.password)?;
        // A concurrent registration can still claim the address first.
        let user = self
            .users
            .create(NewUser { name: input.name, email: input.email, password_hash })
            .await?
            .ok_or_else(|| ValidationErrors::single("email", EMAIL_TAKEN))?;
        tracing::info!(user_id = %user.id, "user registered");
        let session = self.start_session(current, &user).await?;
        Ok((user, session))
    }

    async fn login(&self, current: Option<SessionId>, body: &Value) -> AppResult<(User, Session)> {
        let input = validation::credentials(body)?;
        let user = match self.users.find_by_email(&input.email).await? {
            Some(user) if verify_password(&input.password, &user.password_hash)? => user,
            _ => {
                tracing::warn!(email = %input.email, "failed login");
                return Err(ValidationErrors::single("email", BAD_CREDENTIALS).into());
            }
        };
        let session = self.start_session(current, &user).await?;
        Ok((user, session))
    }

    async fn logout(&self, current: Option<SessionId>) -> AppResult<()> {
        if let Some(id) = current {
            self.sessions.delete(id).await?;
        }
        Ok(())
    }

    async fn purge_expired(&self) -> AppResult<u64> {
        let cutoff = domain::now()
            .checked_sub_signed(self.lifetime)
            .ok_or_else(|| anyhow::anyhow!("session lifetime out of range"))?;
        Ok(self.sessions.purge_idle_since(cutoff).await?)
    }
}
