use std::fmt;
use std::str::FromStr;

use chrono::{DateTime, Duration, Utc};
use rand::distributions::{Alphanumeric, DistString};
use uuid::Uuid;

use super::user::UserId;

const CSRF_TOKEN_LEN: usize = 40;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct SessionId(pub Uuid);

impl SessionId {
    pub fn generate() -> Self {
        Self(Uuid::new_v4())
    }
}

impl fmt::Display for SessionId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.0)
    }
}

impl FromStr for SessionId {
    type Err = uuid::Error;
    fn from_str(s: &str) -> Result<Self, Self::Err> {
        Uuid::parse_str(s).map(SessionId)
    }
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Session {
    pub id: SessionId,
    pub user_id: Option<UserId>,
    pub csrf_token: String,
    pub created_at: DateTime<Utc>,
    pub last_seen_at: DateTime<Utc>,
}

impl Session {
    /// Fresh session with no user attached.
    pub fn anonymous(now: DateTime<Utc>) -> Self {
        Self {
            id: SessionId::generate(),
            user_id: None,
            csrf_token: generate_token(),
            created_at: now,
            last_seen_at: now,
        }
    }

    /// Replacement session for a login, carrying a new id and token.
    pub fn regenerated_for(user: UserId, now: DateTime<Utc>) -> Self {
        Self { user_id: Some(user), ..Self::anonymous(now) }
    }

    pub fn is_expired(&self, lifetime: Duration, now: DateTime<Utc>) -> bool {
        self.last_seen_at
            .checked_add_signed(lifetime)
            .is_some_and(|deadline| deadline < now)
    }

    pub fn token_matches(&self, presented: &str) -> bool {
        constant_time_eq(self.csrf_token.as_bytes(), presented.as_bytes())
    }
}

pub fn generate_token() -> String {
    Alphanumeric.sample_string(&mut rand::thread_rng(), CSRF_TOKEN_LEN)
}

fn constant_time_eq(a: &[u8], b: &[u8]) -> bool {
    if a.len() != b.len() {
        return false;
    }
    a.iter().zip(b).fold(0u8, |acc, (x, y)| acc | (x ^ y)) == 0
}
