use axum::{
    body::Body,
    http::{Request, StatusCode},
    Router,
};
use serde_json::{json, Value};
use tokio::sync::mpsc::error::TryRecvError;
use tower::ServiceExt;
use tradepost_core::{Role, UserId};

use super::{
    core::{AppConfig, AppState},
    realtime::{OutboundFrame, SocketLease},
    router::build_router_with_state,
};

mod companies;
mod messages;

const TEST_IP: &str = "203.0.113.10";

struct TestApp {
    app: Router,
    state: AppState,
}

struct Member {
    user_id: UserId,
    token: String,
}

fn test_config() -> AppConfig {
    AppConfig {
        rate_limit_requests_per_minute: 10_000,
        ..AppConfig::default()
    }
}

fn test_app() -> TestApp {
    test_app_with(&test_config())
}

fn test_app_with(config: &AppConfig) -> TestApp {
    let state = AppState::new(config).unwrap();
    let app = build_router_with_state(config, state.clone()).unwrap();
    TestApp { app, state }
}

impl TestApp {
    fn member(&self) -> Member {
        self.member_with_role(Role::User)
    }

    fn admin(&self) -> Member {
        self.member_with_role(Role::Admin)
    }

    fn member_with_role(&self, role: Role) -> Member {
        let user_id = UserId::new();
        let token = self
            .state
            .issue_access_token(&user_id.to_string(), role.as_str())
            .unwrap();
        Member { user_id, token }
    }

    async fn request(
        &self,
        method: &str,
        uri: &str,
        member: Option<&Member>,
        body: Option<Value>,
    ) -> (StatusCode, Value) {
        let mut builder = Request::builder()
            .method(method)
            .uri(uri)
            .header("x-forwarded-for", TEST_IP);
        if let Some(member) = member {
            builder = builder.header("authorization", format!("Bearer {}", member.token));
        }
        if body.is_some() {
            builder = builder.header("content-type", "application/json");
        }
        let request = builder
            .body(match body {
                Some(payload) => Body::from(payload.to_string()),
                None => Body::empty(),
            })
            .unwrap();
        let response = self.app.clone().oneshot(request).await.unwrap();
        let status = response.status();
        let bytes = axum::body::to_bytes(response.into_body(), usize::MAX)
            .await
            .unwrap();
        let payload = serde_json::from_slice(&bytes).unwrap_or(Value::Null);
        (status, payload)
    }

    async fn get(&self, uri: &str, member: &Member) -> (StatusCode, Value) {
        self.request("GET", uri, Some(member), None).await
    }

    async fn post(&self, uri: &str, member: &Member, body: Value) -> (StatusCode, Value) {
        self.request("POST", uri, Some(member), Some(body)).await
    }

    async fn put(&self, uri: &str, member: &Member) -> (StatusCode, Value) {
        self.request("PUT", uri, Some(member), None).await
    }

    /// Creates a member that owns a company and returns the company id.
    async fn member_with_company(&self, name: &str) -> (Member, String) {
        let member = self.member();
        let (status, company) = self
            .post("/api/companies", &member, json!({ "name": name }))
            .await;
        assert_eq!(status, StatusCode::CREATED, "{company}");
        let company_id = company["id"].as_str().unwrap().to_owned();
        (member, company_id)
    }

    async fn request_connection(&self, from: &Member, to_company: &str) -> (StatusCode, Value) {
        self.post(
            "/api/connections",
            from,
            json!({ "receiverId": to_company, "message": "Let's trade" }),
        )
        .await
    }

    async fn send_message(&self, from: &Member, to: &Member, content: &str) -> Value {
        let (status, message) = self
            .post(
                "/api/messages",
                from,
                json!({ "receiverId": to.user_id.to_string(), "content": content }),
            )
            .await;
        assert_eq!(status, StatusCode::CREATED, "{message}");
        message
    }

    async fn watch(&self, member: &Member) -> SocketLease {
        self.state.registry.register(member.user_id).await
    }
}

/// Pops the next event frame queued for a socket and decodes it.
fn next_event(lease: &mut SocketLease) -> Value {
    match lease.outbound_rx.try_recv() {
        Ok(OutboundFrame::Event(payload)) => serde_json::from_str(&payload).unwrap(),
        other => panic!("expected an event frame, got {other:?}"),
    }
}

fn assert_no_event(lease: &mut SocketLease) {
    assert!(matches!(
        lease.outbound_rx.try_recv(),
        Err(TryRecvError::Empty)
    ));
}

#[tokio::test]
async fn health_and_metrics_are_public() {
    let test = test_app();
    let (status, body) = test.request("GET", "/health", None, None).await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(body, json!({ "status": "ok" }));

    let response = test
        .app
        .clone()
        .oneshot(
            Request::builder()
                .uri("/metrics")
                .header("x-forwarded-for", TEST_IP)
                .body(Body::empty())
                .unwrap(),
        )
        .await
        .unwrap();
    assert_eq!(response.status(), StatusCode::OK);
    let bytes = axum::body::to_bytes(response.into_body(), usize::MAX)
        .await
        .unwrap();
    let text = String::from_utf8(bytes.to_vec()).unwrap();
    assert!(text.contains("tradepost_auth_failures_total"));
}

#[tokio::test]
async fn api_routes_require_a_valid_bearer_token() {
    let test = test_app();
    let (status, body) = test
        .request("GET", "/api/messages/inbox", None, None)
        .await;
    assert_eq!(status, StatusCode::UNAUTHORIZED);
    assert_eq!(body["error"], "unauthorized");

    let forged = Member {
        user_id: UserId::new(),
        token: String::from("v4.local.not-a-real-token"),
    };
    let (status, _) = test.get("/api/connections/sent", &forged).await;
    assert_eq!(status, StatusCode::UNAUTHORIZED);
}

#[tokio::test]
async fn tokens_from_another_key_are_rejected() {
    let issuer = test_app();
    let verifier = test_app();
    let member = issuer.member();
    let (status, _) = verifier.get("/api/messages/unread-count", &member).await;
    assert_eq!(status, StatusCode::UNAUTHORIZED);
}

#[tokio::test]
async fn rate_limit_applies_per_client_address() {
    let test = test_app_with(&AppConfig {
        rate_limit_requests_per_minute: 2,
        ..AppConfig::default()
    });
    for _ in 0..2 {
        let (status, _) = test.request("GET", "/health", None, None).await;
        assert_eq!(status, StatusCode::OK);
    }
    let (status, _) = test.request("GET", "/health", None, None).await;
    assert_eq!(status, StatusCode::TOO_MANY_REQUESTS);
}

#[tokio::test]
async fn unknown_body_fields_are_rejected_as_invalid_content() {
    let test = test_app();
    let member = test.member();
    let (status, body) = test
        .post(
            "/api/companies",
            &member,
            json!({ "name": "Acme", "surprise": true }),
        )
        .await;
    assert_eq!(status, StatusCode::BAD_REQUEST);
    assert_eq!(body["error"], "invalid_content");
    assert_eq!(body["field"], "body");
}
