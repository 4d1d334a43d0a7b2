//! WeChat identity provider
//!
//! WeChat's web sign-in looks like OAuth2 but is not standard: the app id and
//! secret travel in the query string, the token endpoint is a GET, and errors
//! come back as HTTP 200 with an `errcode` body. [`IdentityProvider`] covers
//! the two remote calls; [`IdentityProviderFactory`] hands out a freshly
//! configured client per callback so credentials are never shared.

pub mod client;
pub mod credentials;

use async_trait::async_trait;
use serde::{Deserialize, Serialize};
use std::fmt;
use std::str::FromStr;

pub use client::{authorization_url, WeChatClient, WeChatClientFactory};
pub use credentials::{mask_secret, CredentialResolver, ProviderCredentials};

pub const DEFAULT_SCOPE: &str = "snsapi_userinfo";
/// Scope the open platform QR login always uses
pub const QR_LOGIN_SCOPE: &str = "snsapi_login";

/// Which WeChat product the app id belongs to
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum AccountType {
    /// Website application on the open platform (QR code login)
    #[default]
    OpenPlatform,
    /// Official account (in-app web authorization)
    OfficialAccount,
}

impl AccountType {
    #[must_use]
    pub const fn as_str(self) -> &'static str {
        match self {
            Self::OpenPlatform => "open_platform",
            Self::OfficialAccount => "official_account",
        }
    }
}

impl fmt::Display for AccountType {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for AccountType {
    type Err = ProviderError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.trim() {
            "open_platform" => Ok(Self::OpenPlatform),
            "official_account" => Ok(Self::OfficialAccount),
            other => Err(ProviderError::Configuration(format!(
                "unknown account type '{other}'"
            ))),
        }
    }
}

/// Result of exchanging an authorization code
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct AccessToken {
    pub access_token: String,
    pub expires_in: i64,
    pub refresh_token: String,
    pub open_id: String,
    pub scope: String,
    pub union_id: Option<String>,
}

/// Profile of the WeChat user who completed authorization
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct RemoteIdentity {
    pub open_id: String,
    pub union_id: Option<String>,
    pub nickname: String,
    pub avatar_url: String,
}

#[derive(Debug, thiserror::Error)]
pub enum ProviderError {
    #[error("request to WeChat failed: {0}")]
    Http(#[from] reqwest::Error),

    #[error("WeChat error {code}: {message}")]
    Api { code: i64, message: String },

    #[error("unexpected WeChat response: {0}")]
    Decode(String),

    #[error("invalid WeChat configuration: {0}")]
    Configuration(String),
}

#[cfg_attr(test, mockall::automock)]
#[async_trait]
pub trait IdentityProvider: Send + Sync {
    /// Trade the authorization code for an access token and the user's open id
    async fn exchange_code(&self, code: &str) -> Result<AccessToken, ProviderError>;

    async fn fetch_profile(
        &self,
        access_token: &str,
        open_id: &str,
    ) -> Result<RemoteIdentity, ProviderError>;
}

#[cfg_attr(test, mockall::automock)]
pub trait IdentityProviderFactory: Send + Sync {
    /// Build a client configured with exactly these credentials
    fn connect(
        &self,
        credentials: &ProviderCredentials,
    ) -> Result<Box<dyn IdentityProvider>, ProviderError>;
}
