use std::fmt;

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

use super::user::UserId;

pub const MAX_NAME_CHARS: usize = 255;

#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq, Hash)]
#[serde(transparent)]
pub struct ItemId(pub i64);

impl fmt::Display for ItemId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.0)
    }
}

/// A trimmed, non-empty item name of at most [`MAX_NAME_CHARS`] characters.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(try_from = "String", into = "String")]
pub struct ItemName(String);

#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum NameError {
    #[error("name is empty")]
    Empty,
    #[error("name is longer than 255 characters")]
    TooLong,
}

impl ItemName {
    pub fn parse(raw: &str) -> Result<Self, NameError> {
        let trimmed = raw.trim();
        if trimmed.is_empty() {
            return Err(NameError::Empty);
        }
        if trimmed.chars().count() > MAX_NAME_CHARS {
            return Err(NameError::TooLong);
        }
        Ok(Self(trimmed.to_string()))
    }

    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl TryFrom<String> for ItemName {
    type Error = NameError;
    fn try_from(value: String) -> Result<Self, Self::Error> {
        Self::parse(&value)
    }
}

impl From<ItemName> for String {
    fn from(name: ItemName) -> Self {
        name.0
    }
}

impl fmt::Display for ItemName {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0)
    }
}

/// Completion status. The timestamp lives inside the `Complete` variant so a
/// completed item without `completed_at` (or the reverse) cannot exist.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Completion {
    Incomplete,
    Complete { at: DateTime<Utc> },
}

impl Completion {
    pub fn is_complete(&self) -> bool {
        matches!(self, Completion::Complete { .. })
    }

    pub fn completed_at(&self) -> Option<DateTime<Utc>> {
        match self {
            Completion::Incomplete => None,
            Completion::Complete { at } => Some(*at),
        }
    }

    /// Target state for a requested `completed` flag. Completing always
    /// stamps a fresh time, even if the item was already complete.
    pub fn transition(completed: bool, now: DateTime<Utc>) -> Self {
        if completed { Completion::Complete { at: now } } else { Completion::Incomplete }
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(try_from = "ItemWire", into = "ItemWire")]
pub struct Item {
    pub id: ItemId,
    pub name: ItemName,
    pub completion: Completion,
    pub user_id: UserId,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

impl Item {
    pub fn is_owned_by(&self, user: UserId) -> bool {
        self.user_id == user
    }

    /// Applies requested changes. Returns `false` when the request carried no
    /// field at all, in which case nothing was touched.
    pub fn apply(&mut self, changes: ItemChanges, now: DateTime<Utc>) -> bool {
        if changes.is_empty() {
            return false;
        }
        if let Some(name) = changes.name {
            self.name = name;
        }
        if let Some(completed) = changes.completed {
            self.completion = Completion::transition(completed, now);
        }
        self.updated_at = now;
        true
    }
}

/// JSON shape of an item. Kept separate so the flat `completed` /
/// `completed_at` pair is checked whenever an item is read off the wire.
#[derive(Debug, Clone, Serialize, Deserialize)]
struct ItemWire {
    id: ItemId,
    name: String,
    completed: bool,
    completed_at: Option<DateTime<Utc>>,
    user_id: UserId,
    created_at: DateTime<Utc>,
    updated_at: DateTime<Utc>,
}

impl From<Item> for ItemWire {
    fn from(item: Item) -> Self {
        Self {
            id: item.id,
            name: item.name.into(),
            completed: item.completion.is_complete(),
            completed_at: item.completion.completed_at(),
            user_id: item.user_id,
            created_at: item.created_at,
            updated_at: item.updated_at,
        }
    }
}

impl TryFrom<ItemWire> for Item {
    type Error = String;

    fn try_from(wire: ItemWire) -> Result<Self, Self::Error> {
        let completion = match (wire.completed, wire.completed_at) {
            (true, Some(at)) => Completion::Complete { at },
            (false, None) => Completion::Incomplete,
            (true, None) => return Err(format!("item {} is completed without completed_at", wire.id)),
            (false, Some(_)) => return Err(format!("item {} has completed_at but is not completed", wire.id)),
        };
        let name = ItemName::parse(&wire.name).map_err(|e| e.to_string())?;
        Ok(Item {
            id: wire.id,
            name,
            completion,
            user_id: wire.user_id,
            created_at: wire.created_at,
            updated_at: wire.updated_at,
        })
    }
}

/// A not-yet-persisted item. The owner always comes from the session.
#[derive(Debug, Clone)]
pub struct NewItem {
    pub name: ItemName,
    pub owner: UserId,
    pub created_at: DateTime<Utc>,
}

impl NewItem {
    pub fn new(name: ItemName, owner: UserId) -> Self {
        Self { name, owner, created_at: super::now() }
    }
}

#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct ItemChanges {
    pub name: Option<ItemName>,
    pub completed: Option<bool>,
}

impl ItemChanges {
    pub fn is_empty(&self) -> bool {
        self.name.is_none() && self.completed.is_none()
    }
}
