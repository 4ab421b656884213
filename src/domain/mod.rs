//! Domain primitives shared by the upstream client, the scoring services and the API.

use serde::{Deserialize, Serialize};
use std::fmt;

/// Largest entry id the upstream API is queried for.
pub const MAX_ENTRY_ID: i64 = 10_000_000;

/// Identifier of a participant's team in the upstream game.
///
/// # Examples
///
/// ```rust
/// use fplcup::domain::EntryId;
///
/// let id = EntryId::new(555);
/// assert_eq!(id.value(), 555);
/// assert!(id.is_queryable());
/// assert!(!EntryId::new(0).is_queryable());
/// ```
#[derive(
    Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Default, Serialize, Deserialize,
)]
#[serde(transparent)]
pub struct EntryId(i64);

impl EntryId {
    #[must_use]
    pub const fn new(id: i64) -> Self {
        Self(id)
    }

    #[must_use]
    pub const fn value(&self) -> i64 {
        self.0
    }

    /// Whether the id falls in the range the upstream API accepts.
    #[must_use]
    pub const fn is_queryable(&self) -> bool {
        self.0 >= 1 && self.0 <= MAX_ENTRY_ID
    }
}

impl fmt::Display for EntryId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.0)
    }
}

impl From<i64> for EntryId {
    fn from(id: i64) -> Self {
        Self::new(id)
    }
}

impl From<EntryId> for i64 {
    fn from(id: EntryId) -> Self {
        id.0
    }
}

/// Gameweek ("event") number. Seasons run from 1 to [`LAST_GAMEWEEK`].
pub type Gameweek = u32;

pub const LAST_GAMEWEEK: Gameweek = 38;

/// Lifecycle state of a registered participant.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "UPPERCASE")]
pub enum UserStatus {
    Pending,
    Approved,
    Blocked,
}

impl UserStatus {
    #[must_use]
    pub const fn as_str(self) -> &'static str {
        match self {
            Self::Pending => "PENDING",
            Self::Approved => "APPROVED",
            Self::Blocked => "BLOCKED",
        }
    }
}

impl fmt::Display for UserStatus {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl std::str::FromStr for UserStatus {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.to_ascii_uppercase().as_str() {
            "PENDING" => Ok(Self::Pending),
            "APPROVED" => Ok(Self::Approved),
            "BLOCKED" => Ok(Self::Blocked),
            _ => Err(format!("Unknown user status: {s}")),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn entry_id_range() {
        assert!(EntryId::new(1).is_queryable());
        assert!(EntryId::new(MAX_ENTRY_ID).is_queryable());
        assert!(!EntryId::new(MAX_ENTRY_ID + 1).is_queryable());
        assert!(!EntryId::new(-3).is_queryable());
    }

    #[test]
    fn entry_id_serializes_as_number() {
        let json = serde_json::to_string(&EntryId::new(42)).unwrap();
        assert_eq!(json, "42");
        let back: EntryId = serde_json::from_str("42").unwrap();
        assert_eq!(back, EntryId::new(42));
    }

    #[test]
    fn user_status_parsing() {
        assert_eq!("approved".parse::<UserStatus>(), Ok(UserStatus::Approved));
        assert_eq!(UserStatus::Blocked.to_string(), "BLOCKED");
        assert!("deleted".parse::<UserStatus>().is_err());
        assert_eq!(serde_json::to_string(&UserStatus::Pending).unwrap(), "\"PENDING\"");
    }
}
