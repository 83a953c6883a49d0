pub mod item;
pub mod repository;
pub mod session;
pub mod user;
pub mod validation;

use chrono::{DateTime, SubsecRound, Utc};

/// Current time at the microsecond precision timestamps are stored with.
pub fn now() -> DateTime<Utc> {
    Utc::now().trunc_subsecs(6)
}
