use std::sync::Arc;

use axum::Router;
use axum::body::Body;
use axum::http::{Method, Request, StatusCode, header};
use http_body_util::BodyExt;
use serde_json::{Value, json};
use tower::ServiceExt;

use taskboard_api::auth::{AppState, AppStateInner};
use taskboard_api::router;
use taskboard_crypto::{SecretHasher, TokenCodec};
use taskboard_db::Database;
use taskboard_invites::{InviteService, InviteSettings, MemoryNotifier};

struct TestApp {
    app: Router,
    mailbox: Arc<MemoryNotifier>,
}

impl TestApp {
    fn new() -> Self {
        let db = Arc::new(Database::open_in_memory().unwrap());
        let mailbox = Arc::new(MemoryNotifier::new());
        let invites = InviteService::new(
            db.clone(),
            TokenCodec::with_cost(1024, 1, 1).unwrap(),
            mailbox.clone(),
            InviteSettings::default(),
        );
        let state: AppState = Arc::new(AppStateInner {
            db,
            invites,
            passwords: SecretHasher::with_cost(1024, 1, 1).unwrap(),
            jwt_secret: "http-flow-test-secret".into(),
        });
        Self {
            app: router(state),
            mailbox,
        }
    }

    async fn call(
        &self,
        method: Method,
        uri: &str,
        token: Option<&str>,
        body: Option<Value>,
    ) -> (StatusCode, Value) {
        let mut req = Request::builder().method(method).uri(uri);
        if let Some(token) = token {
            req = req.header(header::AUTHORIZATION, format!("Bearer {}", token));
        }
        let req = match body {
            Some(body) => req
                .header(header::CONTENT_TYPE, "application/json")
                .body(Body::from(body.to_string()))
                .unwrap(),
            None => req.body(Body::empty()).unwrap(),
        };

        let resp = self.app.clone().oneshot(req).await.unwrap();
        let status = resp.status();
        let bytes = resp.into_body().collect().await.unwrap().to_bytes();
        let json = serde_json::from_slice(&bytes).unwrap_or(Value::Null);
        (status, json)
    }

    /// Registers a user and returns (user_id, bearer token).
    async fn register(&self, username: &str) -> (String, String) {
        let (status, body) = self
            .call(
                Method::POST,
                "/auth/register",
                None,
                Some(json!({ "username": username, "password": "long enough pw" })),
            )
            .await;
        assert_eq!(status, StatusCode::CREATED, "{body}");
        (
            body["user_id"].as_str().unwrap().to_string(),
            body["token"].as_str().unwrap().to_string(),
        )
    }

    async fn create_board(&self, token: &str, title: &str) -> String {
        let (status, body) = self
            .call(Method::POST, "/boards", Some(token), Some(json!({ "title": title })))
            .await;
        assert_eq!(status, StatusCode::CREATED, "{body}");
        body["id"].as_str().unwrap().to_string()
    }

    fn last_token(&self) -> String {
        let email = self.mailbox.last().expect("invite email");
        let start = email.text.find("token=").unwrap() + "token=".len();
        email.text[start..start + 64].to_string()
    }
}

#[tokio::test]
async fn health_is_public() {
    let t = TestApp::new();
    let (status, body) = t.call(Method::GET, "/health", None, None).await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(body["status"], "ok");
}

#[tokio::test]
async fn register_login_and_duplicate_username() {
    let t = TestApp::new();
    let (user_id, _) = t.register("owen").await;

    let (status, body) = t
        .call(
            Method::POST,
            "/auth/register",
            None,
            Some(json!({ "username": "owen", "password": "another password" })),
        )
        .await;
    assert_eq!(status, StatusCode::CONFLICT);
    assert_eq!(body["error"], "username is taken");

    let (status, body) = t
        .call(
            Method::POST,
            "/auth/login",
            None,
            Some(json!({ "username": "owen", "password": "long enough pw" })),
        )
        .await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(body["user_id"], user_id.as_str());
    assert!(body["token"].as_str().is_some());

    let (status, _) = t
        .call(
            Method::POST,
            "/auth/login",
            None,
            Some(json!({ "username": "owen", "password": "wrong password" })),
        )
        .await;
    assert_eq!(status, StatusCode::UNAUTHORIZED);
}

#[tokio::test]
async fn protected_routes_require_a_valid_bearer_token() {
    let t = TestApp::new();
    let (status, body) = t.call(Method::GET, "/boards", None, None).await;
    assert_eq!(status, StatusCode::UNAUTHORIZED);
    assert_eq!(body["error"], "unauthorized");

    let (status, _) = t.call(Method::GET, "/boards", Some("not.a.jwt"), None).await;
    assert_eq!(status, StatusCode::UNAUTHORIZED);
}

#[tokio::test]
async fn invite_round_trip_over_http() {
    let t = TestApp::new();
    let (_, owner) = t.register("owen").await;
    let (guest_id, guest) = t.register("gail").await;
    let board = t.create_board(&owner, "Roadmap").await;

    let (status, body) = t
        .call(
            Method::POST,
            &format!("/boards/{board}/invites"),
            Some(&owner),
            Some(json!({ "email": "gail@example.com", "role": "Editor" })),
        )
        .await;
    assert_eq!(status, StatusCode::CREATED, "{body}");
    assert_eq!(body["delivery"]["status"], "sent");
    assert!(body.get("token").is_none());
    let token = t.last_token();
    assert!(!body.to_string().contains(&token));

    let (status, preview) = t
        .call(Method::GET, &format!("/invites/validate?token={token}"), None, None)
        .await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(preview["board_title"], "Roadmap");
    assert_eq!(preview["email"], "gail@example.com");
    assert_eq!(preview["role"], "Editor");

    let (status, body) = t
        .call(
            Method::POST,
            "/invites/accept",
            Some(&guest),
            Some(json!({ "token": token })),
        )
        .await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(body["board_id"], board.as_str());

    let (status, members) = t
        .call(Method::GET, &format!("/boards/{board}/members"), Some(&guest), None)
        .await;
    assert_eq!(status, StatusCode::OK);
    let gail = members
        .as_array()
        .unwrap()
        .iter()
        .find(|m| m["user_id"] == guest_id.as_str())
        .expect("guest is a member");
    assert_eq!(gail["role"], "Editor");

    let (status, body) = t
        .call(
            Method::POST,
            "/invites/accept",
            Some(&guest),
            Some(json!({ "token": token })),
        )
        .await;
    assert_eq!(status, StatusCode::GONE);
    assert_eq!(body["error"], "invalid or expired invite");

    let (status, _) = t
        .call(Method::GET, &format!("/invites/validate?token={token}"), None, None)
        .await;
    assert_eq!(status, StatusCode::GONE);
}

#[tokio::test]
async fn invite_endpoints_are_owner_only() {
    let t = TestApp::new();
    let (_, owner) = t.register("owen").await;
    let (_, guest) = t.register("gail").await;
    let (_, stranger) = t.register("sam").await;
    let board = t.create_board(&owner, "Roadmap").await;

    let (status, _) = t
        .call(
            Method::POST,
            &format!("/boards/{board}/invites"),
            Some(&stranger),
            Some(json!({ "email": "x@example.com" })),
        )
        .await;
    assert_eq!(status, StatusCode::FORBIDDEN);

    t.call(
        Method::POST,
        &format!("/boards/{board}/invites"),
        Some(&owner),
        Some(json!({ "email": "gail@example.com" })),
    )
    .await;
    let token = t.last_token();
    let (status, _) = t
        .call(Method::POST, "/invites/accept", Some(&guest), Some(json!({ "token": token })))
        .await;
    assert_eq!(status, StatusCode::OK);

    // Viewer membership grants reading, not inviting.
    let (status, _) = t
        .call(Method::GET, &format!("/boards/{board}"), Some(&guest), None)
        .await;
    assert_eq!(status, StatusCode::OK);
    for (method, path) in [
        (Method::GET, format!("/boards/{board}/invites")),
        (Method::GET, format!("/boards/{board}/audit")),
    ] {
        let (status, _) = t.call(method, &path, Some(&guest), None).await;
        assert_eq!(status, StatusCode::FORBIDDEN, "{path}");
    }

    let (status, _) = t
        .call(Method::GET, &format!("/boards/{board}/members"), Some(&stranger), None)
        .await;
    assert_eq!(status, StatusCode::FORBIDDEN);
}

#[tokio::test]
async fn invite_validation_errors_are_bad_requests() {
    let t = TestApp::new();
    let (_, owner) = t.register("owen").await;
    let board = t.create_board(&owner, "Roadmap").await;
    let path = format!("/boards/{board}/invites");

    let (status, body) = t.call(Method::POST, &path, Some(&owner), Some(json!({}))).await;
    assert_eq!(status, StatusCode::BAD_REQUEST);
    assert_eq!(body["error"], "email is required");

    let (status, _) = t
        .call(
            Method::POST,
            &path,
            Some(&owner),
            Some(json!({ "email": "x@example.com", "role": "Owner" })),
        )
        .await;
    assert_eq!(status, StatusCode::BAD_REQUEST);

    let (status, _) = t.call(Method::GET, "/invites/validate", None, None).await;
    assert_eq!(status, StatusCode::BAD_REQUEST);

    let (status, _) = t
        .call(Method::GET, "/invites/validate?token=garbage", None, None)
        .await;
    assert_eq!(status, StatusCode::GONE);

    let missing = uuid::Uuid::new_v4();
    let (status, _) = t
        .call(Method::GET, &format!("/boards/{missing}"), Some(&owner), None)
        .await;
    assert_eq!(status, StatusCode::NOT_FOUND);
}

#[tokio::test]
async fn cancel_resend_and_audit_over_http() {
    let t = TestApp::new();
    let (_, owner) = t.register("owen").await;
    let board = t.create_board(&owner, "Roadmap").await;

    let (_, created) = t
        .call(
            Method::POST,
            &format!("/boards/{board}/invites"),
            Some(&owner),
            Some(json!({ "email": "gail@example.com" })),
        )
        .await;
    let invite = created["invite_id"].as_str().unwrap().to_string();
    let first = t.last_token();

    let (status, body) = t
        .call(
            Method::POST,
            &format!("/boards/{board}/invites/{invite}/resend"),
            Some(&owner),
            None,
        )
        .await;
    assert_eq!(status, StatusCode::OK, "{body}");
    assert_eq!(body["invite_id"], invite.as_str());
    let second = t.last_token();
    assert_ne!(first, second);

    let (status, _) = t
        .call(Method::GET, &format!("/invites/validate?token={first}"), None, None)
        .await;
    assert_eq!(status, StatusCode::GONE);

    let (status, _) = t
        .call(
            Method::POST,
            &format!("/boards/{board}/invites/{invite}/cancel"),
            Some(&owner),
            None,
        )
        .await;
    assert_eq!(status, StatusCode::NO_CONTENT);

    let (status, _) = t
        .call(Method::GET, &format!("/invites/validate?token={second}"), None, None)
        .await;
    assert_eq!(status, StatusCode::GONE);

    let (_, listed) = t
        .call(Method::GET, &format!("/boards/{board}/invites"), Some(&owner), None)
        .await;
    assert_eq!(listed[0]["cancelled"], true);
    assert_eq!(listed[0]["used"], false);

    let (status, events) = t
        .call(Method::GET, &format!("/boards/{board}/audit"), Some(&owner), None)
        .await;
    assert_eq!(status, StatusCode::OK);
    let actions: Vec<&str> = events
        .as_array()
        .unwrap()
        .iter()
        .map(|e| e["action"].as_str().unwrap())
        .collect();
    assert_eq!(
        actions,
        ["invite.cancelled", "invite.resent", "invite.created", "board.created"]
    );
}

#[tokio::test]
async fn list_boards_shows_caller_role() {
    let t = TestApp::new();
    let (_, owner) = t.register("owen").await;
    t.create_board(&owner, "First").await;
    t.create_board(&owner, "Second").await;

    let (status, boards) = t.call(Method::GET, "/boards", Some(&owner), None).await;
    assert_eq!(status, StatusCode::OK);
    let boards = boards.as_array().unwrap();
    assert_eq!(boards.len(), 2);
    assert!(boards.iter().all(|b| b["role"] == "Owner"));

    let (status, _) = t
        .call(Method::POST, "/boards", Some(&owner), Some(json!({ "title": "   " })))
        .await;
    assert_eq!(status, StatusCode::BAD_REQUEST);
}
