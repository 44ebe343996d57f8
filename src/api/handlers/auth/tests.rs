//! Auth handler tests against the in-memory store.

use super::{AuthHandler, AuthRequest, AuthResponse, Clock, SESSION_TOKEN_HEADER};
use crate::store::MemoryStore;
use axum::http::{HeaderMap, HeaderValue, Method, StatusCode};
use chrono::{DateTime, Duration, Utc};
use serde_json::{json, Value};
use std::sync::{Arc, Mutex, PoisonError};

struct ManualClock {
    now: Mutex<DateTime<Utc>>,
}

impl ManualClock {
    fn new() -> Self {
        Self {
            now: Mutex::new(Utc::now()),
        }
    }

    fn advance(&self, by: Duration) {
        let mut now = self.now.lock().unwrap_or_else(PoisonError::into_inner);
        *now += by;
    }
}

impl Clock for ManualClock {
    fn now(&self) -> DateTime<Utc> {
        *self.now.lock().unwrap_or_else(PoisonError::into_inner)
    }
}

struct Harness {
    store: MemoryStore,
    clock: Arc<ManualClock>,
    handler: AuthHandler,
}

impl Harness {
    fn new() -> Self {
        let store = MemoryStore::new();
        let clock = Arc::new(ManualClock::new());
        let handler = AuthHandler::new(Arc::new(store.clone())).with_clock(clock.clone());
        Self {
            store,
            clock,
            handler,
        }
    }

    async fn post(&self, body: Value) -> (StatusCode, Value) {
        let response = self.handler.handle(AuthRequest::post(body.to_string())).await;
        assert_eq!(
            self.store.open_connections(),
            0,
            "connection leaked for {body}"
        );
        decode(&response)
    }

    async fn register(&self, username: &str, email: &str, password: &str) -> (StatusCode, Value) {
        self.post(json!({
            "action": "register",
            "username": username,
            "email": email,
            "password": password,
        }))
        .await
    }

    async fn login(&self, username: &str, password: &str) -> (StatusCode, Value) {
        self.post(json!({
            "action": "login",
            "username": username,
            "password": password,
        }))
        .await
    }

    async fn verify(&self, token: &str) -> (StatusCode, Value) {
        self.post(json!({
            "action": "verify",
            "sessionToken": token,
        }))
        .await
    }
}

fn decode(response: &AuthResponse) -> (StatusCode, Value) {
    let body = if response.body.is_empty() {
        Value::Null
    } else {
        serde_json::from_str(&response.body).unwrap_or(Value::Null)
    };
    (response.status, body)
}

fn token(body: &Value) -> String {
    body["sessionToken"].as_str().unwrap_or_default().to_string()
}

fn header<'a>(response: &'a AuthResponse, name: &str) -> Option<&'a str> {
    response
        .headers
        .get(name)
        .and_then(|value| value.to_str().ok())
}

#[tokio::test]
async fn register_then_verify_returns_identity() {
    let harness = Harness::new();

    let (status, body) = harness.register("alice", "a@x.com", "pw123").await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(body["success"], true);
    assert_eq!(body["user"]["username"], "alice");
    assert_eq!(body["user"]["email"], "a@x.com");
    assert_eq!(body["user"]["balance"], 1000.0);
    let t1 = token(&body);
    assert_eq!(t1.len(), 43);

    let (status, verified) = harness.verify(&t1).await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(verified["success"], true);
    assert_eq!(verified["user"], body["user"]);
    assert!(verified.get("sessionToken").is_none());
}

#[tokio::test]
async fn register_stores_salted_digest() {
    let harness = Harness::new();
    harness.register("alice", "a@x.com", "pw123").await;

    let stored = harness.store.password_hash("alice").unwrap_or_default();
    assert!(stored.starts_with("$argon2id$"));
    assert!(!stored.contains("pw123"));
}

#[tokio::test]
async fn duplicate_username_is_a_conflict() {
    let harness = Harness::new();
    harness.register("alice", "a@x.com", "pw123").await;

    let (status, body) = harness.register("alice", "other@x.com", "pw456").await;
    assert_eq!(status, StatusCode::BAD_REQUEST);
    assert_eq!(body, json!({ "error": "Username or email already exists" }));
    assert_eq!(harness.store.user_count(), 1);
    assert_eq!(harness.store.session_count(), 1);
}

#[tokio::test]
async fn duplicate_email_is_a_conflict() {
    let harness = Harness::new();
    harness.register("alice", "a@x.com", "pw123").await;

    let (status, body) = harness.register("bob", "a@x.com", "pw456").await;
    assert_eq!(status, StatusCode::BAD_REQUEST);
    assert_eq!(body["error"], "Username or email already exists");
    assert_eq!(harness.store.user_count(), 1);
}

#[tokio::test]
async fn register_missing_fields() {
    let harness = Harness::new();

    let (status, body) = harness
        .post(json!({ "action": "register", "username": "alice", "password": "pw" }))
        .await;
    assert_eq!(status, StatusCode::BAD_REQUEST);
    assert_eq!(body["error"], "Missing required fields");
    assert_eq!(harness.store.connections_acquired(), 0);
}

#[tokio::test]
async fn login_wrong_password_matches_unknown_user() {
    let harness = Harness::new();
    harness.register("alice", "a@x.com", "pw123").await;

    let wrong_password = harness.login("alice", "wrong").await;
    let unknown_user = harness.login("mallory", "pw123").await;

    assert_eq!(wrong_password.0, StatusCode::UNAUTHORIZED);
    assert_eq!(wrong_password.1, json!({ "error": "Invalid credentials" }));
    assert_eq!(wrong_password, unknown_user);
    assert_eq!(harness.store.session_count(), 1);
}

#[tokio::test]
async fn login_missing_fields() {
    let harness = Harness::new();

    let (status, body) = harness.post(json!({ "action": "login", "username": "alice" })).await;
    assert_eq!(status, StatusCode::BAD_REQUEST);
    assert_eq!(body["error"], "Missing username or password");
}

#[tokio::test]
async fn login_accepts_legacy_digest() {
    let harness = Harness::new();
    // sha256("abc"), as written by the legacy unsalted scheme
    harness.store.insert_user(
        "legacy",
        "legacy@x.com",
        "ba7816bf8f01cfea414140de5dae2223b00361a396177a9cb410ff61f20015ad",
    );

    let (status, body) = harness.login("legacy", "abc").await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(body["user"]["username"], "legacy");

    let (status, _) = harness.login("legacy", "abd").await;
    assert_eq!(status, StatusCode::UNAUTHORIZED);
}

#[tokio::test]
async fn verify_without_token_never_queries() {
    let harness = Harness::new();

    for body in [
        json!({ "action": "verify" }),
        json!({ "action": "verify", "sessionToken": "" }),
    ] {
        let (status, body) = harness.post(body).await;
        assert_eq!(status, StatusCode::UNAUTHORIZED);
        assert_eq!(body["error"], "No session token provided");
    }

    assert_eq!(harness.store.connections_acquired(), 0);
    assert_eq!(harness.store.queries(), 0);
}

#[tokio::test]
async fn verify_unknown_token() {
    let harness = Harness::new();

    let (status, body) = harness.verify("does-not-exist").await;
    assert_eq!(status, StatusCode::UNAUTHORIZED);
    assert_eq!(body["error"], "Invalid or expired session");
}

#[tokio::test]
async fn verify_reads_session_header() {
    let harness = Harness::new();
    let (_, registered) = harness.register("alice", "a@x.com", "pw123").await;

    let mut headers = HeaderMap::new();
    headers.insert(
        SESSION_TOKEN_HEADER,
        HeaderValue::from_str(&token(&registered)).unwrap_or(HeaderValue::from_static("x")),
    );
    let request = AuthRequest {
        method: Method::POST,
        headers,
        body: Some(json!({ "action": "verify" }).to_string()),
    };

    let (status, body) = decode(&harness.handler.handle(request).await);
    assert_eq!(status, StatusCode::OK);
    assert_eq!(body["user"]["username"], "alice");
}

#[tokio::test]
async fn session_lifecycle_scenario() {
    let harness = Harness::new();

    let (status, registered) = harness.register("alice", "a@x.com", "pw123").await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(registered["user"]["balance"], 1000.0);
    let t1 = token(&registered);

    let (status, logged_in) = harness.login("alice", "pw123").await;
    assert_eq!(status, StatusCode::OK);
    let t2 = token(&logged_in);
    assert_ne!(t1, t2);
    assert_eq!(logged_in["user"], registered["user"]);

    assert_eq!(harness.verify(&t1).await.0, StatusCode::OK);
    assert_eq!(harness.verify(&t2).await.0, StatusCode::OK);

    assert_eq!(harness.login("alice", "wrong").await.0, StatusCode::UNAUTHORIZED);

    harness.clock.advance(Duration::days(8));
    let (status, body) = harness.verify(&t1).await;
    assert_eq!(status, StatusCode::UNAUTHORIZED);
    assert_eq!(body["error"], "Invalid or expired session");
}

#[tokio::test]
async fn session_expires_exactly_at_ttl() {
    let harness = Harness::new();
    let (_, registered) = harness.register("alice", "a@x.com", "pw123").await;
    let t1 = token(&registered);

    harness.clock.advance(Duration::days(7) - Duration::seconds(1));
    assert_eq!(harness.verify(&t1).await.0, StatusCode::OK);

    harness.clock.advance(Duration::seconds(1));
    assert_eq!(harness.verify(&t1).await.0, StatusCode::UNAUTHORIZED);
}

#[tokio::test]
async fn configured_session_ttl_is_used() {
    let store = MemoryStore::new();
    let clock = Arc::new(ManualClock::new());
    let handler = AuthHandler::new(Arc::new(store.clone()))
        .with_clock(clock.clone())
        .with_session_ttl(Duration::hours(1));

    let body = json!({
        "action": "register",
        "username": "alice",
        "email": "a@x.com",
        "password": "pw123",
    });
    let (_, registered) = decode(&handler.handle(AuthRequest::post(body.to_string())).await);
    let verify = json!({ "action": "verify", "sessionToken": token(&registered) }).to_string();

    clock.advance(Duration::minutes(59));
    let (status, _) = decode(&handler.handle(AuthRequest::post(verify.clone())).await);
    assert_eq!(status, StatusCode::OK);

    clock.advance(Duration::minutes(2));
    let (status, _) = decode(&handler.handle(AuthRequest::post(verify)).await);
    assert_eq!(status, StatusCode::UNAUTHORIZED);
}

#[tokio::test]
async fn preflight_skips_the_store() {
    let harness = Harness::new();
    let request = AuthRequest {
        method: Method::OPTIONS,
        headers: HeaderMap::new(),
        body: None,
    };

    let response = harness.handler.handle(request).await;
    assert_eq!(response.status, StatusCode::OK);
    assert!(response.body.is_empty());
    assert_eq!(header(&response, "access-control-allow-origin"), Some("*"));
    assert_eq!(
        header(&response, "access-control-allow-methods"),
        Some("POST, OPTIONS")
    );
    assert_eq!(
        header(&response, "access-control-allow-headers"),
        Some("Content-Type, X-Session-Token")
    );
    assert_eq!(header(&response, "access-control-max-age"), Some("86400"));
    assert_eq!(header(&response, "content-type"), None);
    assert_eq!(harness.store.connections_acquired(), 0);
}

#[tokio::test]
async fn non_post_methods_are_rejected() {
    let harness = Harness::new();

    for method in [Method::GET, Method::PUT, Method::DELETE, Method::PATCH] {
        let request = AuthRequest {
            method: method.clone(),
            headers: HeaderMap::new(),
            body: Some(json!({ "action": "verify", "sessionToken": "x" }).to_string()),
        };
        let response = harness.handler.handle(request).await;
        assert_eq!(response.status, StatusCode::METHOD_NOT_ALLOWED, "{method}");
        assert_eq!(header(&response, "content-type"), Some("application/json"));
        assert_eq!(header(&response, "access-control-allow-origin"), Some("*"));
        assert_eq!(decode(&response).1, json!({ "error": "Method not allowed" }));
    }

    assert_eq!(harness.store.connections_acquired(), 0);
}

#[tokio::test]
async fn unknown_action_and_bad_body() {
    let harness = Harness::new();

    let (status, body) = harness.post(json!({ "action": "delete" })).await;
    assert_eq!(status, StatusCode::BAD_REQUEST);
    assert_eq!(body["error"], "Invalid action");

    let response = harness.handler.handle(AuthRequest::post("{oops")).await;
    assert_eq!(response.status, StatusCode::BAD_REQUEST);
    assert_eq!(decode(&response).1["error"], "Invalid request body");
}

#[tokio::test]
async fn every_response_carries_json_and_cors_headers() {
    let harness = Harness::new();
    let body = json!({
        "action": "register",
        "username": "alice",
        "email": "a@x.com",
        "password": "pw123",
    });

    let response = harness.handler.handle(AuthRequest::post(body.to_string())).await;
    assert_eq!(response.status, StatusCode::OK);
    assert_eq!(header(&response, "content-type"), Some("application/json"));
    assert_eq!(header(&response, "access-control-allow-origin"), Some("*"));
}

#[tokio::test]
async fn store_outage_is_a_server_error() {
    let harness = Harness::new();
    harness.store.set_unavailable(true);

    let (status, body) = harness.login("alice", "pw123").await;
    assert_eq!(status, StatusCode::SERVICE_UNAVAILABLE);
    assert_eq!(body, json!({ "error": "Service unavailable" }));

    // Validation still answers without the store.
    let (status, _) = harness.post(json!({ "action": "login" })).await;
    assert_eq!(status, StatusCode::BAD_REQUEST);
}

#[tokio::test]
async fn connections_released_on_every_path() {
    let harness = Harness::new();

    harness.register("alice", "a@x.com", "pw123").await;
    harness.register("alice", "a@x.com", "pw123").await;
    harness.login("alice", "pw123").await;
    harness.login("alice", "nope").await;
    harness.verify("nope").await;

    assert_eq!(harness.store.connections_acquired(), 5);
    assert_eq!(harness.store.open_connections(), 0);
}

#[tokio::test(flavor = "current_thread")]
async fn password_work_leaves_the_async_worker() {
    let worker = std::thread::current().id();

    let ran_on = super::off_worker(|| std::thread::current().id()).await;

    assert!(matches!(ran_on, Ok(id) if id != worker));
}

#[tokio::test(flavor = "current_thread")]
async fn register_and_login_on_a_single_thread_runtime() {
    let harness = Harness::new();

    let (status, _) = harness.register("alice", "a@x.com", "pw123").await;
    assert_eq!(status, StatusCode::OK);

    let (status, _) = harness.login("alice", "pw123").await;
    assert_eq!(status, StatusCode::OK);
    let (status, _) = harness.login("alice", "wrong").await;
    assert_eq!(status, StatusCode::UNAUTHORIZED);
}
