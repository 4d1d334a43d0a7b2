use serde::{Deserialize, Serialize};
use std::fmt;
use std::str::FromStr;

/// Primary key of a local account (`users.id`, BIGSERIAL)
#[derive(
    Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize, sqlx::Type,
)]
#[serde(transparent)]
#[sqlx(transparent)]
pub struct UserId(pub i64);

impl UserId {
    #[must_use]
    pub const fn as_i64(self) -> i64 {
        self.0
    }
}

impl fmt::Display for UserId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.0)
    }
}

impl From<i64> for UserId {
    fn from(id: i64) -> Self {
        Self(id)
    }
}

#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
#[error("invalid user id: {0:?}")]
pub struct InvalidUserId(pub String);

/// Accepts plain decimal digits that fit the column type; signs are rejected.
impl FromStr for UserId {
    type Err = InvalidUserId;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        if s.is_empty() || !s.bytes().all(|b| b.is_ascii_digit()) {
            return Err(InvalidUserId(s.to_string()));
        }
        s.parse::<i64>()
            .map(Self)
            .map_err(|_| InvalidUserId(s.to_string()))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_parse_user_id() {
        assert_eq!("42".parse::<UserId>().unwrap(), UserId(42));
        assert_eq!("007".parse::<UserId>().unwrap(), UserId(7));
        assert!("".parse::<UserId>().is_err());
        assert!("-1".parse::<UserId>().is_err());
        assert!("+1".parse::<UserId>().is_err());
        assert!("12a".parse::<UserId>().is_err());
        assert!("99999999999999999999".parse::<UserId>().is_err());
    }
}
