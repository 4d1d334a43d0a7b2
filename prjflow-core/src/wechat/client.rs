use async_trait::async_trait;
use reqwest::Client;
use serde::Deserialize;
use std::time::Duration;
use tracing::debug;
use url::Url;

use super::{
    AccessToken, AccountType, IdentityProvider, IdentityProviderFactory, ProviderCredentials,
    ProviderError, RemoteIdentity, QR_LOGIN_SCOPE,
};

const QR_CONNECT_URL: &str = "https://open.weixin.qq.com/connect/qrconnect";
const OAUTH_AUTHORIZE_URL: &str = "https://open.weixin.qq.com/connect/oauth2/authorize";

/// Build the page URL the user opens (or scans) to authorize the app
pub fn authorization_url(
    credentials: &ProviderCredentials,
    redirect_uri: &str,
    state: &str,
) -> Result<Url, ProviderError> {
    let (base, scope) = match credentials.account_type {
        AccountType::OpenPlatform => (QR_CONNECT_URL, QR_LOGIN_SCOPE),
        AccountType::OfficialAccount => (OAUTH_AUTHORIZE_URL, credentials.scope.as_str()),
    };

    let mut url = Url::parse(base).map_err(|e| ProviderError::Configuration(e.to_string()))?;
    url.query_pairs_mut()
        .append_pair("appid", &credentials.app_id)
        .append_pair("redirect_uri", redirect_uri)
        .append_pair("response_type", "code")
        .append_pair("scope", scope)
        .append_pair("state", state);
    url.set_fragment(Some("wechat_redirect"));
    Ok(url)
}

#[derive(Debug, Deserialize)]
struct TokenResponse {
    #[serde(default)]
    errcode: i64,
    #[serde(default)]
    errmsg: String,
    #[serde(default)]
    access_token: String,
    #[serde(default)]
    expires_in: i64,
    #[serde(default)]
    refresh_token: String,
    #[serde(default)]
    openid: String,
    #[serde(default)]
    scope: String,
    unionid: Option<String>,
}

#[derive(Debug, Deserialize)]
struct UserInfoResponse {
    #[serde(default)]
    errcode: i64,
    #[serde(default)]
    errmsg: String,
    #[serde(default)]
    openid: String,
    #[serde(default)]
    nickname: String,
    #[serde(default)]
    headimgurl: String,
    unionid: Option<String>,
}

fn check_errcode(errcode: i64, errmsg: &str) -> Result<(), ProviderError> {
    if errcode == 0 {
        Ok(())
    } else {
        Err(ProviderError::Api {
            code: errcode,
            message: errmsg.to_string(),
        })
    }
}

/// HTTP client for the WeChat SNS endpoints
#[derive(Clone)]
pub struct WeChatClient {
    http: Client,
    api_base: String,
    app_id: String,
    app_secret: String,
    account_type: AccountType,
    scope: String,
}

impl std::fmt::Debug for WeChatClient {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("WeChatClient")
            .field("api_base", &self.api_base)
            .field("app_id", &self.app_id)
            .field("account_type", &self.account_type)
            .field("scope", &self.scope)
            .finish_non_exhaustive()
    }
}

impl WeChatClient {
    /// Client against `api_base` sharing the given connection pool
    pub fn new(http: Client, api_base: &str) -> Self {
        Self {
            http,
            api_base: api_base.trim_end_matches('/').to_string(),
            app_id: String::new(),
            app_secret: String::new(),
            account_type: AccountType::default(),
            scope: super::DEFAULT_SCOPE.to_string(),
        }
    }

    pub fn set_credentials(&mut self, app_id: &str, app_secret: &str) {
        self.app_id = app_id.to_string();
        self.app_secret = app_secret.to_string();
    }

    pub fn set_account_type(&mut self, account_type: AccountType) {
        self.account_type = account_type;
    }

    pub fn set_scope(&mut self, scope: &str) {
        self.scope = scope.to_string();
    }
}

#[async_trait]
impl IdentityProvider for WeChatClient {
    async fn exchange_code(&self, code: &str) -> Result<AccessToken, ProviderError> {
        let url = format!("{}/sns/oauth2/access_token", self.api_base);
        let resp: TokenResponse = self
            .http
            .get(&url)
            .query(&[
                ("appid", self.app_id.as_str()),
                ("secret", self.app_secret.as_str()),
                ("code", code),
                ("grant_type", "authorization_code"),
            ])
            .send()
            .await?
            .error_for_status()?
            .json()
            .await?;

        check_errcode(resp.errcode, &resp.errmsg)?;
        if resp.access_token.is_empty() || resp.openid.is_empty() {
            return Err(ProviderError::Decode(
                "token response is missing access_token or openid".to_string(),
            ));
        }

        debug!(
            app_id = %self.app_id,
            account_type = %self.account_type,
            scope = %resp.scope,
            "Exchanged WeChat authorization code"
        );

        Ok(AccessToken {
            access_token: resp.access_token,
            expires_in: resp.expires_in,
            refresh_token: resp.refresh_token,
            open_id: resp.openid,
            scope: resp.scope,
            union_id: resp.unionid.filter(|u| !u.is_empty()),
        })
    }

    async fn fetch_profile(
        &self,
        access_token: &str,
        open_id: &str,
    ) -> Result<RemoteIdentity, ProviderError> {
        let url = format!("{}/sns/userinfo", self.api_base);
        let resp: UserInfoResponse = self
            .http
            .get(&url)
            .query(&[
                ("access_token", access_token),
                ("openid", open_id),
                ("lang", "zh_CN"),
            ])
            .send()
            .await?
            .error_for_status()?
            .json()
            .await?;

        check_errcode(resp.errcode, &resp.errmsg)?;

        Ok(RemoteIdentity {
            // the profile echoes the open id; the token exchange's value wins
            open_id: if open_id.is_empty() {
                resp.openid
            } else {
                open_id.to_string()
            },
            union_id: resp.unionid.filter(|u| !u.is_empty()),
            nickname: resp.nickname,
            avatar_url: resp.headimgurl,
        })
    }
}

/// Creates [`WeChatClient`]s sharing one connection pool
#[derive(Debug, Clone)]
pub struct WeChatClientFactory {
    http: Client,
    api_base: String,
}

impl WeChatClientFactory {
    pub fn new(api_base: &str, timeout: Duration) -> Result<Self, ProviderError> {
        let http = Client::builder()
            .timeout(timeout)
            .user_agent(concat!("prjflow/", env!("CARGO_PKG_VERSION")))
            .build()?;
        Ok(Self {
            http,
            api_base: api_base.to_string(),
        })
    }
}

impl IdentityProviderFactory for WeChatClientFactory {
    fn connect(
        &self,
        credentials: &ProviderCredentials,
    ) -> Result<Box<dyn IdentityProvider>, ProviderError> {
        let mut client = WeChatClient::new(self.http.clone(), &self.api_base);
        client.set_credentials(&credentials.app_id, &credentials.app_secret);
        client.set_account_type(credentials.account_type);
        client.set_scope(&credentials.scope);
        Ok(Box::new(client))
    }
}
