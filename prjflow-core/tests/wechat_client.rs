//! WeChat SNS client against a mocked API
//!
//! Run with: cargo test --test wechat_client

use std::time::Duration;

use prjflow_core::wechat::{
    AccountType, IdentityProviderFactory, ProviderCredentials, ProviderError,
    WeChatClientFactory,
};
use wiremock::matchers::{method, path, query_param};
use wiremock::{Mock, MockServer, ResponseTemplate};

fn credentials() -> ProviderCredentials {
    ProviderCredentials {
        app_id: "wx-it".to_string(),
        app_secret: "it-secret".to_string(),
        account_type: AccountType::OpenPlatform,
        scope: "snsapi_login".to_string(),
    }
}

async fn factory(server: &MockServer) -> WeChatClientFactory {
    WeChatClientFactory::new(&server.uri(), Duration::from_secs(5)).unwrap()
}

#[tokio::test]
async fn test_exchange_code_and_fetch_profile() {
    let server = MockServer::start().await;

    Mock::given(method("GET"))
        .and(path("/sns/oauth2/access_token"))
        .and(query_param("appid", "wx-it"))
        .and(query_param("secret", "it-secret"))
        .and(query_param("code", "auth-code"))
        .and(query_param("grant_type", "authorization_code"))
        .respond_with(ResponseTemplate::new(200).set_body_json(serde_json::json!({
            "access_token": "at-1",
            "expires_in": 7200,
            "refresh_token": "rt-1",
            "openid": "oIT0000001",
            "scope": "snsapi_login",
            "unionid": "u-1"
        })))
        .expect(1)
        .mount(&server)
        .await;

    Mock::given(method("GET"))
        .and(path("/sns/userinfo"))
        .and(query_param("access_token", "at-1"))
        .and(query_param("openid", "oIT0000001"))
        .and(query_param("lang", "zh_CN"))
        .respond_with(ResponseTemplate::new(200).set_body_json(serde_json::json!({
            "openid": "oIT0000001",
            "nickname": "Tester",
            "headimgurl": "https://thirdwx.qlogo.cn/it.png",
            "unionid": "u-1"
        })))
        .expect(1)
        .mount(&server)
        .await;

    let client = factory(&server).await.connect(&credentials()).unwrap();

    let token = client.exchange_code("auth-code").await.unwrap();
    assert_eq!(token.access_token, "at-1");
    assert_eq!(token.open_id, "oIT0000001");
    assert_eq!(token.expires_in, 7200);
    assert_eq!(token.union_id.as_deref(), Some("u-1"));

    let profile = client
        .fetch_profile(&token.access_token, &token.open_id)
        .await
        .unwrap();
    assert_eq!(profile.open_id, "oIT0000001");
    assert_eq!(profile.nickname, "Tester");
    assert_eq!(profile.avatar_url, "https://thirdwx.qlogo.cn/it.png");
}

#[tokio::test]
async fn test_errcode_in_successful_response() {
    let server = MockServer::start().await;

    Mock::given(method("GET"))
        .and(path("/sns/oauth2/access_token"))
        .respond_with(ResponseTemplate::new(200).set_body_json(serde_json::json!({
            "errcode": 40029,
            "errmsg": "invalid code"
        })))
        .mount(&server)
        .await;

    let client = factory(&server).await.connect(&credentials()).unwrap();
    let err = client.exchange_code("stale").await.unwrap_err();

    match err {
        ProviderError::Api { code, message } => {
            assert_eq!(code, 40029);
            assert_eq!(message, "invalid code");
        }
        other => panic!("unexpected error: {other}"),
    }
}

#[tokio::test]
async fn test_missing_openid_is_a_decode_error() {
    let server = MockServer::start().await;

    Mock::given(method("GET"))
        .and(path("/sns/oauth2/access_token"))
        .respond_with(ResponseTemplate::new(200).set_body_json(serde_json::json!({
            "access_token": "at-1",
            "expires_in": 7200
        })))
        .mount(&server)
        .await;

    let client = factory(&server).await.connect(&credentials()).unwrap();
    let err = client.exchange_code("code").await.unwrap_err();
    assert!(matches!(err, ProviderError::Decode(_)));
}

#[tokio::test]
async fn test_http_error_status() {
    let server = MockServer::start().await;

    Mock::given(method("GET"))
        .and(path("/sns/userinfo"))
        .respond_with(ResponseTemplate::new(502))
        .mount(&server)
        .await;

    let client = factory(&server).await.connect(&credentials()).unwrap();
    let err = client.fetch_profile("at", "oid").await.unwrap_err();
    assert!(matches!(err, ProviderError::Http(_)));
}

#[tokio::test]
async fn test_profile_without_openid_keeps_token_openid() {
    let server = MockServer::start().await;

    Mock::given(method("GET"))
        .and(path("/sns/userinfo"))
        .respond_with(ResponseTemplate::new(200).set_body_json(serde_json::json!({
            "nickname": "NoId"
        })))
        .mount(&server)
        .await;

    let client = factory(&server).await.connect(&credentials()).unwrap();
    let profile = client.fetch_profile("at", "oFromToken").await.unwrap();
    assert_eq!(profile.open_id, "oFromToken");
    assert_eq!(profile.nickname, "NoId");
    assert!(profile.avatar_url.is_empty());
}

#[tokio::test]
async fn test_token_openid_wins_over_profile_echo() {
    let server = MockServer::start().await;

    Mock::given(method("GET"))
        .and(path("/sns/userinfo"))
        .respond_with(ResponseTemplate::new(200).set_body_json(serde_json::json!({
            "openid": "oFromProfile",
            "nickname": "Echo"
        })))
        .mount(&server)
        .await;

    let client = factory(&server).await.connect(&credentials()).unwrap();
    let profile = client.fetch_profile("at", "oFromToken").await.unwrap();
    assert_eq!(profile.open_id, "oFromToken");
}
