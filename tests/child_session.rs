mod common;

use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;

use async_trait::async_trait;
use axum::http::{Method, StatusCode};
use chrono::{Duration, Utc};
use serde_json::json;
use tokio::sync::Notify;
use uuid::Uuid;

use common::*;
use vibeon::{
    crypto::token::token_digest,
    models::session::ChildSession,
    repositories::{kv::KeyValueStore, memory::MemoryKv},
    services::child_session,
    AppError,
};

#[tokio::test]
async fn correct_pin_opens_a_session() {
    let app = TestApp::new();
    let parent = register_parent(&app, "parent@example.com").await;
    let child_id = create_child(&app, &parent, "Maja", "1234", 60).await;

    let response = verify_pin(&app, child_id, "1234").await;
    assert_eq!(response.status, StatusCode::OK);
    assert_eq!(response.body["success"], true);
    assert_eq!(response.body["child_id"], child_id.to_string());
    assert_eq!(response.body["username"], "Maja");
    assert_eq!(response.body["avatar_color"], "#4F46E5");
    assert_eq!(response.body["parent_id"], parent.parent_id.to_string());
    assert!(!response.body["session_token"].as_str().unwrap().is_empty());

    let attempts = app.store.pin_attempts(child_id).await;
    assert_eq!(attempts.len(), 1);
    assert!(attempts[0].was_successful);
}

#[tokio::test]
async fn near_miss_pins_are_rejected_with_one_message() {
    let app = TestApp::new();
    let parent = register_parent(&app, "parent@example.com").await;
    let child_id = create_child(&app, &parent, "Maja", "1234", 60).await;

    let mut messages = Vec::new();
    for pin in ["1235", "1233", "0234", "4321"] {
        let response = verify_pin(&app, child_id, pin).await;
        assert_eq!(response.status, StatusCode::UNAUTHORIZED, "pin {pin}");
        assert!(response.body.get("session_token").is_none());
        messages.push(response.body["error"].clone());
    }

    let unknown = verify_pin(&app, Uuid::new_v4(), "1234").await;
    assert_eq!(unknown.status, StatusCode::UNAUTHORIZED);
    messages.push(unknown.body["error"].clone());
    assert!(messages.windows(2).all(|pair| pair[0] == pair[1]));

    let attempts = app.store.pin_attempts(child_id).await;
    assert_eq!(attempts.len(), 4);
    assert!(attempts.iter().all(|a| !a.was_successful));
}

#[tokio::test]
async fn malformed_pins_never_reach_verification() {
    let app = TestApp::new();
    let parent = register_parent(&app, "parent@example.com").await;
    let child_id = create_child(&app, &parent, "Maja", "1234", 60).await;

    for pin in ["123", "12345", "12a4", ""] {
        let response = verify_pin(&app, child_id, pin).await;
        assert_eq!(response.status, StatusCode::BAD_REQUEST, "pin {pin:?}");
    }
    assert!(app.store.pin_attempts(child_id).await.is_empty());

    let response = app
        .send(json_request(
            Method::POST,
            "/api/child/verify-pin",
            Some(json!({ "childId": "not-a-uuid", "pin": "1234" })),
        ))
        .await;
    assert_eq!(response.status, StatusCode::BAD_REQUEST);
}

#[tokio::test]
async fn repeated_failures_lock_out_pin_login_when_configured() {
    let mut config = test_config();
    config.pin_max_failed_attempts = 3;
    let app = TestApp::with_config(config);
    let parent = register_parent(&app, "parent@example.com").await;
    let child_id = create_child(&app, &parent, "Maja", "1234", 60).await;

    for _ in 0..3 {
        assert_eq!(
            verify_pin(&app, child_id, "9999").await.status,
            StatusCode::UNAUTHORIZED
        );
    }
    let response = verify_pin(&app, child_id, "1234").await;
    assert_eq!(response.status, StatusCode::TOO_MANY_REQUESTS);
}

#[tokio::test]
async fn successful_login_clears_the_failure_count() {
    let mut config = test_config();
    config.pin_max_failed_attempts = 3;
    let app = TestApp::with_config(config);
    let parent = register_parent(&app, "parent@example.com").await;
    let child_id = create_child(&app, &parent, "Maja", "1234", 60).await;

    for _ in 0..2 {
        verify_pin(&app, child_id, "9999").await;
    }
    login_child(&app, child_id, "1234").await;
    for _ in 0..2 {
        verify_pin(&app, child_id, "9999").await;
    }
    assert_eq!(
        verify_pin(&app, child_id, "1234").await.status,
        StatusCode::OK
    );
}

#[tokio::test]
async fn unknown_and_missing_tokens_are_rejected() {
    let app = TestApp::new();

    let response = app
        .send(json_request(Method::GET, "/api/child/usage", None))
        .await;
    assert_eq!(response.status, StatusCode::UNAUTHORIZED);

    let response = app
        .send(child_request(Method::GET, "/api/child/usage", "forged", None))
        .await;
    assert_eq!(response.status, StatusCode::UNAUTHORIZED);
    assert_eq!(response.body["error"], "Invalid or expired session");
}

#[tokio::test]
async fn logout_invalidates_the_token() {
    let app = TestApp::new();
    let family = family(&app, 60).await;

    let response = app
        .send(child_request(Method::POST, "/api/child/logout", &family.token, None))
        .await;
    assert_eq!(response.status, StatusCode::OK);

    let response = app
        .send(child_request(Method::GET, "/api/child/usage", &family.token, None))
        .await;
    assert_eq!(response.status, StatusCode::UNAUTHORIZED);
}

#[tokio::test]
async fn sessions_die_with_their_child() {
    let app = TestApp::new();
    let family = family(&app, 60).await;

    let response = app
        .send(parent_request(
            Method::DELETE,
            &format!("/api/parent/children/{}", family.child_id),
            &family.parent,
            None,
        ))
        .await;
    assert_eq!(response.status, StatusCode::OK);

    let response = app
        .send(child_request(Method::GET, "/api/child/usage", &family.token, None))
        .await;
    assert_eq!(response.status, StatusCode::UNAUTHORIZED);
}

#[tokio::test]
async fn expired_sessions_are_rejected_and_removed() {
    let app = TestApp::new();
    let family = family(&app, 60).await;
    let now = Utc::now();
    let stale = ChildSession {
        child_id: family.child_id,
        parent_id: family.parent.parent_id,
        created_at: now - Duration::hours(9),
        expires_at: now - Duration::hours(1),
        last_activity: now - Duration::hours(2),
    };
    let key = format!("child_session:{}", token_digest("stale-token"));
    app.state
        .kv
        .set_ex(&key, &serde_json::to_string(&stale).unwrap(), 3600)
        .await
        .unwrap();

    let response = app
        .send(child_request(Method::GET, "/api/child/usage", "stale-token", None))
        .await;
    assert_eq!(response.status, StatusCode::UNAUTHORIZED);
    assert_eq!(response.body["error"], "Invalid or expired session");
    assert_eq!(app.state.kv.get(&key).await.unwrap(), None);
}

#[tokio::test]
async fn a_zero_hour_lifetime_never_admits_a_request() {
    let mut config = test_config();
    config.child_session_hours = 0;
    let app = TestApp::with_config(config);
    let family = family(&app, 60).await;

    let response = app
        .send(child_request(Method::GET, "/api/child/usage", &family.token, None))
        .await;
    assert_eq!(response.status, StatusCode::UNAUTHORIZED);
}

/// Holds the first session refresh until the test lets it through.
#[derive(Default)]
struct GatedKv {
    inner: MemoryKv,
    armed: AtomicBool,
    reached: Notify,
    release: Notify,
}

#[async_trait]
impl KeyValueStore for GatedKv {
    async fn set_ex(&self, key: &str, value: &str, ttl_seconds: u64) -> vibeon::Result<()> {
        self.inner.set_ex(key, value, ttl_seconds).await
    }

    async fn set_ex_if_exists(
        &self,
        key: &str,
        value: &str,
        ttl_seconds: u64,
    ) -> vibeon::Result<bool> {
        if key.starts_with("child_session:") && self.armed.swap(false, Ordering::SeqCst) {
            self.reached.notify_one();
            self.release.notified().await;
        }
        self.inner.set_ex_if_exists(key, value, ttl_seconds).await
    }

    async fn get(&self, key: &str) -> vibeon::Result<Option<String>> {
        self.inner.get(key).await
    }

    async fn del(&self, key: &str) -> vibeon::Result<()> {
        self.inner.del(key).await
    }

    async fn incr(&self, key: &str, ttl_seconds: u64) -> vibeon::Result<i64> {
        self.inner.incr(key, ttl_seconds).await
    }

    async fn ttl(&self, key: &str) -> vibeon::Result<Option<i64>> {
        self.inner.ttl(key).await
    }
}

#[tokio::test]
async fn logout_during_a_request_is_not_undone() {
    let kv = Arc::new(GatedKv::default());
    let app = TestApp::with_kv(test_config(), kv.clone());
    let family = family(&app, 60).await;

    kv.armed.store(true, Ordering::SeqCst);
    let state = app.state.clone();
    let token = family.token.clone();
    let in_flight =
        tokio::spawn(async move { child_session::resolve_session(&state, &token).await });

    kv.reached.notified().await;
    child_session::end_session(&app.state, &family.token)
        .await
        .unwrap();
    kv.release.notify_one();

    let result = in_flight.await.unwrap();
    assert!(matches!(result, Err(AppError::InvalidSession)), "{result:?}");

    let response = app
        .send(child_request(Method::GET, "/api/child/usage", &family.token, None))
        .await;
    assert_eq!(response.status, StatusCode::UNAUTHORIZED);
}
