use crate::{wechat::ProviderError, Error};

/// Why a sign-in callback (or the URL that starts one) failed
#[derive(Debug, thiserror::Error)]
pub enum FlowError {
    #[error("authorization code is missing")]
    MissingCode,

    #[error("WeChat is not configured: {0}")]
    Configuration(String),

    #[error("{message}")]
    Provider {
        message: String,
        #[source]
        source: ProviderError,
    },

    #[error("{0}")]
    Precondition(String),

    #[error("{0}")]
    AlreadyExists(String),

    #[error("username {0} is already taken, contact an administrator")]
    UsernameConflict(String),

    #[error("{0}")]
    InvalidRequest(String),

    #[error("storage failure: {0}")]
    Storage(#[from] Error),
}

impl FlowError {
    pub fn provider(message: impl Into<String>, source: ProviderError) -> Self {
        Self::Provider {
            message: message.into(),
            source,
        }
    }

    /// Text shown to the user; storage details stay in the logs
    #[must_use]
    pub fn public_message(&self) -> String {
        match self {
            Self::Storage(_) => "internal error, please try again later".to_string(),
            other => other.to_string(),
        }
    }
}

impl From<ProviderError> for FlowError {
    fn from(err: ProviderError) -> Self {
        match err {
            ProviderError::Configuration(message) => Self::Configuration(message),
            other => Self::provider(other.to_string(), other),
        }
    }
}
