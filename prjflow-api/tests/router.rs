//! HTTP routes exercised through the router
//!
//! Run with: cargo test --test router

use std::sync::Arc;
use std::time::Duration;

use axum::{
    body::Body,
    http::{header, Request, StatusCode},
    Router,
};
use prjflow_api::{create_router, AppState};
use prjflow_core::{
    bootstrap::{assemble, Services},
    models::{AccountStatus, NewAccount, UserId, ADMIN_ROLE},
    repository::MemoryStore,
    wechat::WeChatClientFactory,
    Config,
};
use serde_json::Value;
use tower::ServiceExt;
use wiremock::matchers::{method, path};
use wiremock::{Mock, MockServer, ResponseTemplate};

struct TestApp {
    router: Router,
    store: Arc<MemoryStore>,
    services: Services,
    _wechat: MockServer,
}

impl TestApp {
    async fn new() -> Self {
        let wechat = MockServer::start().await;
        Mock::given(method("GET"))
            .and(path("/sns/oauth2/access_token"))
            .respond_with(ResponseTemplate::new(200).set_body_json(serde_json::json!({
                "access_token": "at-router",
                "expires_in": 7200,
                "openid": "oROUTER-11223344",
                "scope": "snsapi_login"
            })))
            .mount(&wechat)
            .await;
        Mock::given(method("GET"))
            .and(path("/sns/userinfo"))
            .respond_with(ResponseTemplate::new(200).set_body_json(serde_json::json!({
                "openid": "oROUTER-11223344",
                "nickname": "Router Admin",
                "headimgurl": "https://thirdwx.qlogo.cn/router.png"
            })))
            .mount(&wechat)
            .await;

        let mut config = Config::default();
        config.database.url = String::new();
        config.wechat.app_id = "wx-router".to_string();
        config.wechat.app_secret = "router-secret-0001".to_string();
        config.wechat.callback_base_url = "https://pm.example.com".to_string();
        config.wechat.api_base = wechat.uri();

        let store = Arc::new(MemoryStore::new());
        let providers =
            WeChatClientFactory::new(&config.wechat.api_base, Duration::from_secs(5)).unwrap();
        let services = assemble(store.clone(), store.clone(), Arc::new(providers), &config);
        let router = create_router(AppState::new(&services, &config));

        Self {
            router,
            store,
            services,
            _wechat: wechat,
        }
    }

    fn user(&self, username: &str, role: Option<&str>) -> (UserId, String) {
        let account = self
            .store
            .seed_account(&NewAccount {
                username: username.to_string(),
                nickname: username.to_string(),
                avatar: String::new(),
                wechat_open_id: None,
                status: AccountStatus::Active,
            })
            .unwrap();
        let roles: Vec<String> = role.into_iter().map(str::to_string).collect();
        for role in &roles {
            self.store.assign_role(account.id, role);
        }
        let token = self.services.tokens.issue(account.id, &roles).unwrap();
        (account.id, token)
    }

    async fn get(&self, uri: &str, token: Option<&str>) -> (StatusCode, String) {
        let mut request = Request::builder().uri(uri);
        if let Some(token) = token {
            request = request.header(header::AUTHORIZATION, format!("Bearer {token}"));
        }
        self.send(request.body(Body::empty()).unwrap()).await
    }

    async fn post_json(&self, uri: &str, token: Option<&str>, body: Value) -> (StatusCode, String) {
        let mut request = Request::builder()
            .method("POST")
            .uri(uri)
            .header(header::CONTENT_TYPE, "application/json");
        if let Some(token) = token {
            request = request.header(header::AUTHORIZATION, format!("Bearer {token}"));
        }
        self.send(request.body(Body::from(body.to_string())).unwrap())
            .await
    }

    async fn send(&self, request: Request<Body>) -> (StatusCode, String) {
        let response = self.router.clone().oneshot(request).await.unwrap();
        let status = response.status();
        let bytes = axum::body::to_bytes(response.into_body(), usize::MAX)
            .await
            .unwrap();
        (status, String::from_utf8(bytes.to_vec()).unwrap())
    }
}

fn json(body: &str) -> Value {
    serde_json::from_str(body).unwrap()
}

#[tokio::test]
async fn test_health() {
    let app = TestApp::new().await;
    let (status, body) = app.get("/health", None).await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(body, "OK");
}

#[tokio::test]
async fn test_initialization_through_callback() {
    let app = TestApp::new().await;

    let (status, body) = app.get("/api/init/status", None).await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(json(&body)["initialized"], Value::Bool(false));

    let (status, body) = app.get("/api/init/qrcode?ticket=boot-1", None).await;
    assert_eq!(status, StatusCode::OK);
    let grant = json(&body);
    assert_eq!(grant["ticket"], "boot-1");
    assert!(grant["auth_url"]
        .as_str()
        .unwrap()
        .contains("state=ticket%3Aboot-1"));

    let mut sub = app.services.hub.subscribe("boot-1");
    let (status, html) = app
        .get("/api/init/callback?code=c1&state=ticket:boot-1", None)
        .await;
    assert_eq!(status, StatusCode::OK);
    assert!(html.contains("&#10003;"));

    let mut last = None;
    while let Ok(Some(msg)) = tokio::time::timeout(Duration::from_millis(50), sub.recv()).await {
        last = Some(msg);
    }
    let last = last.unwrap();
    assert!(last.kind.is_terminal());
    assert!(last.payload.unwrap()["token"].is_string());

    let (_, body) = app.get("/api/init/status", None).await;
    assert_eq!(json(&body)["initialized"], Value::Bool(true));

    let (status, body) = app.get("/api/init/qrcode", None).await;
    assert_eq!(status, StatusCode::FORBIDDEN);
    assert_eq!(json(&body)["status"], 403);
}

#[tokio::test]
async fn test_callback_errors_render_pages() {
    let app = TestApp::new().await;

    let (status, html) = app.get("/api/auth/wechat/callback?state=t", None).await;
    assert_eq!(status, StatusCode::OK);
    assert!(html.contains("&#10007;"));

    let (status, html) = app.get("/api/users/wechat/add/callback", None).await;
    assert_eq!(status, StatusCode::OK);
    assert!(html.contains("<html"));
}

#[tokio::test]
async fn test_callback_with_repeated_query_key_still_runs() {
    let app = TestApp::new().await;
    let mut sub = app.services.hub.subscribe("T1");

    let (status, html) = app
        .get(
            "/api/init/callback?code=c1&state=ticket:T1&state=ticket:T1",
            None,
        )
        .await;
    assert_eq!(status, StatusCode::OK);
    assert!(html.contains("&#10003;"));

    let first = tokio::time::timeout(Duration::from_millis(200), sub.recv())
        .await
        .unwrap()
        .unwrap();
    assert_eq!(first.ticket, "T1");
}

#[tokio::test]
async fn test_login_qrcode_generates_ticket() {
    let app = TestApp::new().await;

    let (status, body) = app.get("/api/auth/wechat/qrcode", None).await;
    assert_eq!(status, StatusCode::OK);
    let grant = json(&body);
    let ticket = grant["ticket"].as_str().unwrap();
    assert!(!ticket.is_empty());
    assert!(grant["auth_url"]
        .as_str()
        .unwrap()
        .starts_with("https://open.weixin.qq.com/connect/qrconnect?appid=wx-router"));

    let (status, _) = app.get("/api/auth/wechat/qrcode?ticket=ticket:x", None).await;
    assert_eq!(status, StatusCode::BAD_REQUEST);
}

#[tokio::test]
async fn test_bind_qrcode_requires_token() {
    let app = TestApp::new().await;

    let (status, body) = app.get("/api/auth/wechat/bind/qrcode", None).await;
    assert_eq!(status, StatusCode::UNAUTHORIZED);
    assert_eq!(json(&body)["status"], 401);

    let (status, _) = app
        .get("/api/auth/wechat/bind/qrcode", Some("not-a-token"))
        .await;
    assert_eq!(status, StatusCode::UNAUTHORIZED);

    let (user_id, token) = app.user("carol", None);
    let (status, body) = app
        .get("/api/auth/wechat/bind/qrcode?ticket=bind-9", Some(&token))
        .await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(json(&body)["ticket"], "bind-9");
    assert_eq!(app.services.bindings.peek("bind-9"), Some(user_id));

    let (_, other_token) = app.user("mallory", None);
    let (status, _) = app
        .get("/api/auth/wechat/bind/qrcode?ticket=bind-9", Some(&other_token))
        .await;
    assert_eq!(status, StatusCode::CONFLICT);
    assert_eq!(app.services.bindings.peek("bind-9"), Some(user_id));
}

#[tokio::test]
async fn test_add_user_qrcode_requires_permission() {
    let app = TestApp::new().await;

    let (_, member_token) = app.user("member", Some("member"));
    let (status, _) = app
        .get("/api/users/wechat/add/qrcode", Some(&member_token))
        .await;
    assert_eq!(status, StatusCode::FORBIDDEN);

    let (admin_id, admin_token) = app.user("boss", Some(ADMIN_ROLE));
    let (status, body) = app
        .get("/api/users/wechat/add/qrcode?ticket=add-1", Some(&admin_token))
        .await;
    assert_eq!(status, StatusCode::OK);
    let expected = format!("state=adduser%3Aadd-1%3A{admin_id}");
    assert!(json(&body)["auth_url"].as_str().unwrap().contains(&expected));
}

#[tokio::test]
async fn test_wechat_config_before_and_after_initialization() {
    let app = TestApp::new().await;

    let (status, _) = app
        .post_json(
            "/api/init/wechat-config",
            None,
            serde_json::json!({ "app_id": "  ", "app_secret": "x" }),
        )
        .await;
    assert_eq!(status, StatusCode::BAD_REQUEST);

    let (status, _) = app
        .post_json(
            "/api/init/wechat-config",
            None,
            serde_json::json!({
                "app_id": "wx-saved",
                "app_secret": "saved-secret-9999",
                "account_type": "official_account",
                "scope": "snsapi_base"
            }),
        )
        .await;
    assert_eq!(status, StatusCode::OK);

    let (_, admin_token) = app.user("boss", Some(ADMIN_ROLE));
    let (status, body) = app
        .get("/api/init/wechat-config", Some(&admin_token))
        .await;
    assert_eq!(status, StatusCode::OK);
    let view = json(&body);
    assert_eq!(view["configured"], Value::Bool(true));
    assert_eq!(view["app_id"], "wx-saved");
    assert_eq!(view["app_secret"], "save****9999");
    assert_eq!(view["account_type"], "official_account");
    assert_eq!(view["scope"], "snsapi_base");

    // the saved settings drive the next authorization URL
    let (_, body) = app.get("/api/auth/wechat/qrcode", None).await;
    let url = json(&body)["auth_url"].as_str().unwrap().to_string();
    assert!(url.starts_with("https://open.weixin.qq.com/connect/oauth2/authorize?appid=wx-saved"));

    app.services
        .settings
        .set_setting("initialized", "true")
        .await
        .unwrap();

    let update = serde_json::json!({ "app_id": "wx-next", "app_secret": "next-secret" });
    let (status, _) = app
        .post_json("/api/init/wechat-config", None, update.clone())
        .await;
    assert_eq!(status, StatusCode::UNAUTHORIZED);

    let (_, member_token) = app.user("member", Some("member"));
    let (status, _) = app
        .post_json("/api/init/wechat-config", Some(&member_token), update.clone())
        .await;
    assert_eq!(status, StatusCode::FORBIDDEN);

    let (status, _) = app
        .post_json("/api/init/wechat-config", Some(&admin_token), update)
        .await;
    assert_eq!(status, StatusCode::OK);
}

#[tokio::test]
async fn test_wechat_config_view_requires_admin() {
    let app = TestApp::new().await;

    let (status, _) = app.get("/api/init/wechat-config", None).await;
    assert_eq!(status, StatusCode::UNAUTHORIZED);

    let (_, token) = app.user("member", Some("member"));
    let (status, _) = app.get("/api/init/wechat-config", Some(&token)).await;
    assert_eq!(status, StatusCode::FORBIDDEN);
}

#[tokio::test]
async fn test_websocket_requires_upgrade() {
    let app = TestApp::new().await;
    let (status, _) = app.get("/ws?ticket=abc", None).await;
    assert!(status.is_client_error());
}
