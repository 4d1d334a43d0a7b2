use thiserror::Error;

/// Unique constraint names on the `users` table
pub const OPEN_ID_CONSTRAINT: &str = "users_wechat_open_id_key";
pub const USERNAME_CONSTRAINT: &str = "users_username_key";

/// Which uniqueness rule a write collided with
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum UniqueField {
    OpenId,
    Username,
}

impl std::fmt::Display for UniqueField {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Self::OpenId => f.write_str("wechat_open_id"),
            Self::Username => f.write_str("username"),
        }
    }
}

#[derive(Error, Debug)]
pub enum Error {
    #[error("Database error: {0}")]
    Database(sqlx::Error),

    #[error("Authentication error: {0}")]
    Authentication(String),

    #[error("Not found: {0}")]
    NotFound(String),

    #[error("Already exists: {0}")]
    AlreadyExists(String),

    #[error("Unique constraint violated on {0}")]
    UniqueViolation(UniqueField),

    #[error("Invalid input: {0}")]
    InvalidInput(String),

    #[error("Internal error: {0}")]
    Internal(String),
}

impl Error {
    /// The colliding field when this is a uniqueness violation
    #[must_use]
    pub const fn unique_field(&self) -> Option<UniqueField> {
        match self {
            Self::UniqueViolation(field) => Some(*field),
            _ => None,
        }
    }
}

/// Classify a unique violation by constraint name, falling back to the message text
fn classify_unique(constraint: Option<&str>, message: &str) -> Option<UniqueField> {
    match constraint {
        Some(OPEN_ID_CONSTRAINT) => Some(UniqueField::OpenId),
        Some(USERNAME_CONSTRAINT) => Some(UniqueField::Username),
        Some(_) => None,
        None if message.contains(OPEN_ID_CONSTRAINT) => Some(UniqueField::OpenId),
        None if message.contains(USERNAME_CONSTRAINT) => Some(UniqueField::Username),
        None => None,
    }
}

impl From<sqlx::Error> for Error {
    fn from(err: sqlx::Error) -> Self {
        match &err {
            sqlx::Error::RowNotFound => Self::NotFound("Resource not found".to_string()),
            sqlx::Error::Database(db_err) => {
                let code = db_err.code().unwrap_or_default();
                match code.as_ref() {
                    // PostgreSQL unique_violation
                    "23505" => classify_unique(db_err.constraint(), db_err.message()).map_or_else(
                        || Self::AlreadyExists("Resource already exists".to_string()),
                        Self::UniqueViolation,
                    ),
                    // PostgreSQL foreign_key_violation
                    "23503" => Self::NotFound("Referenced resource not found".to_string()),
                    // PostgreSQL not_null_violation
                    "23502" => Self::InvalidInput("Required field is missing".to_string()),
                    _ => Self::Database(err),
                }
            }
            _ => Self::Database(err),
        }
    }
}

pub type Result<T> = std::result::Result<T, Error>;
