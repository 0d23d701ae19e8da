#![allow(dead_code)]

use std::sync::{Arc, Mutex};

use async_trait::async_trait;
use axum::{
    body::Body,
    http::{header, HeaderMap, Method, Request, StatusCode},
    Router,
};
use http_body_util::BodyExt;
use serde_json::{json, Value};
use tower::ServiceExt;
use uuid::Uuid;

use vibeon::{
    build_router,
    crypto::password::HashCost,
    models::video::VideoResult,
    repositories::{
        kv::KeyValueStore,
        memory::{MemoryKv, MemoryStore},
    },
    services::search::VideoProvider,
    AppState, Config,
};

pub const PASSWORD: &str = "correct horse battery";

pub fn test_config() -> Config {
    Config {
        database_url: String::new(),
        redis_url: String::new(),
        bind_addr: "127.0.0.1:0".parse().unwrap(),
        allowed_origins: vec!["http://localhost:3000".to_string()],
        secure_cookies: false,
        parent_session_days: 7,
        child_session_hours: 8,
        usage_utc_offset_minutes: 0,
        youtube_api_key: None,
        youtube_api_url: String::new(),
        pin_max_failed_attempts: 0,
        pin_lockout_minutes: 15,
        public_rate_limit_per_second: 0,
        hash_cost: HashCost {
            memory_kib: 64,
            iterations: 1,
            parallelism: 1,
        },
    }
}

pub fn video(id: &str, title: &str) -> VideoResult {
    VideoResult {
        video_id: id.to_string(),
        title: title.to_string(),
        thumbnail: format!("https://i.ytimg.com/vi/{}/mqdefault.jpg", id),
        channel_title: "Kids Channel".to_string(),
    }
}

/// Records every query and answers with a fixed result list.
#[derive(Default)]
pub struct FakeProvider {
    pub queries: Mutex<Vec<String>>,
    pub results: Mutex<Vec<VideoResult>>,
}

impl FakeProvider {
    pub fn with_results(results: Vec<VideoResult>) -> Self {
        Self {
            queries: Mutex::new(Vec::new()),
            results: Mutex::new(results),
        }
    }

    pub fn calls(&self) -> usize {
        self.queries.lock().unwrap().len()
    }
}

#[async_trait]
impl VideoProvider for FakeProvider {
    async fn search(&self, query: &str) -> vibeon::Result<Vec<VideoResult>> {
        self.queries.lock().unwrap().push(query.to_string());
        Ok(self.results.lock().unwrap().clone())
    }
}

pub struct TestApp {
    pub router: Router,
    pub state: AppState,
    pub store: MemoryStore,
    pub provider: Arc<FakeProvider>,
}

impl TestApp {
    pub fn new() -> Self {
        Self::with_config(test_config())
    }

    pub fn with_config(config: Config) -> Self {
        Self::with_kv(config, Arc::new(MemoryKv::new()))
    }

    pub fn with_kv(config: Config, kv: Arc<dyn KeyValueStore>) -> Self {
        let store = MemoryStore::new();
        let provider = Arc::new(FakeProvider::default());
        let state = AppState::with_backend(config, store.clone(), kv, provider.clone());
        Self {
            router: build_router(state.clone()),
            state,
            store,
            provider,
        }
    }

    pub async fn send(&self, request: Request<Body>) -> TestResponse {
        let response = self.router.clone().oneshot(request).await.unwrap();
        let status = response.status();
        let headers = response.headers().clone();
        let bytes = response.into_body().collect().await.unwrap().to_bytes();
        let body = if bytes.is_empty() {
            Value::Null
        } else {
            serde_json::from_slice(&bytes).unwrap_or(Value::Null)
        };
        TestResponse {
            status,
            headers,
            body,
        }
    }
}

pub struct TestResponse {
    pub status: StatusCode,
    pub headers: HeaderMap,
    pub body: Value,
}

pub fn json_request(method: Method, uri: &str, body: Option<Value>) -> Request<Body> {
    let builder = Request::builder().method(method).uri(uri);
    match body {
        Some(body) => builder
            .header(header::CONTENT_TYPE, "application/json")
            .body(Body::from(body.to_string()))
            .unwrap(),
        None => builder.body(Body::empty()).unwrap(),
    }
}

/// The cookies and CSRF token of a logged in parent.
#[derive(Clone)]
pub struct ParentAuth {
    pub parent_id: Uuid,
    pub access_code: String,
    pub cookie_header: String,
    pub csrf_token: String,
}

fn cookies_from(headers: &HeaderMap) -> Vec<(String, String)> {
    headers
        .get_all(header::SET_COOKIE)
        .iter()
        .filter_map(|value| value.to_str().ok())
        .filter_map(|value| value.split(';').next())
        .filter_map(|pair| pair.split_once('='))
        .map(|(name, value)| (name.trim().to_string(), value.trim().to_string()))
        .collect()
}

pub async fn register_parent(app: &TestApp, email: &str) -> ParentAuth {
    let response = app
        .send(json_request(
            Method::POST,
            "/api/auth/register",
            Some(json!({ "email": email, "password": PASSWORD, "display_name": "Parent" })),
        ))
        .await;
    assert_eq!(response.status, StatusCode::CREATED, "{}", response.body);
    parent_auth(&response)
}

pub fn parent_auth(response: &TestResponse) -> ParentAuth {
    let cookies = cookies_from(&response.headers);
    let csrf_token = cookies
        .iter()
        .find(|(name, _)| name == "csrf_token")
        .map(|(_, value)| value.clone())
        .expect("csrf cookie");
    let cookie_header = cookies
        .iter()
        .map(|(name, value)| format!("{}={}", name, value))
        .collect::<Vec<_>>()
        .join("; ");
    let parent = &response.body["parent"];
    ParentAuth {
        parent_id: parent["id"].as_str().unwrap().parse().unwrap(),
        access_code: parent["access_code"].as_str().unwrap().to_string(),
        cookie_header,
        csrf_token,
    }
}

pub fn parent_request(
    method: Method,
    uri: &str,
    auth: &ParentAuth,
    body: Option<Value>,
) -> Request<Body> {
    let mut request = json_request(method, uri, body);
    let headers = request.headers_mut();
    headers.insert(header::COOKIE, auth.cookie_header.parse().unwrap());
    headers.insert("x-csrf-token", auth.csrf_token.parse().unwrap());
    request
}

pub fn child_request(method: Method, uri: &str, token: &str, body: Option<Value>) -> Request<Body> {
    let mut request = json_request(method, uri, body);
    request.headers_mut().insert(
        header::AUTHORIZATION,
        format!("Bearer {}", token).parse().unwrap(),
    );
    request
}

pub async fn create_child(app: &TestApp, auth: &ParentAuth, username: &str, pin: &str, limit: i32) -> Uuid {
    let response = app
        .send(parent_request(
            Method::POST,
            "/api/parent/children",
            auth,
            Some(json!({
                "username": username,
                "pin": pin,
                "avatar_color": "#4F46E5",
                "daily_time_limit_minutes": limit
            })),
        ))
        .await;
    assert_eq!(response.status, StatusCode::CREATED, "{}", response.body);
    response.body["child"]["id"].as_str().unwrap().parse().unwrap()
}

pub async fn verify_pin(app: &TestApp, child_id: Uuid, pin: &str) -> TestResponse {
    app.send(json_request(
        Method::POST,
        "/api/child/verify-pin",
        Some(json!({ "childId": child_id, "pin": pin })),
    ))
    .await
}

pub async fn login_child(app: &TestApp, child_id: Uuid, pin: &str) -> String {
    let response = verify_pin(app, child_id, pin).await;
    assert_eq!(response.status, StatusCode::OK, "{}", response.body);
    response.body["session_token"].as_str().unwrap().to_string()
}

/// A parent with one child, logged in on the child device.
pub struct Family {
    pub parent: ParentAuth,
    pub child_id: Uuid,
    pub token: String,
}

pub async fn family(app: &TestApp, limit: i32) -> Family {
    let parent = register_parent(app, "parent@example.com").await;
    let child_id = create_child(app, &parent, "Maja", "1234", limit).await;
    let token = login_child(app, child_id, "1234").await;
    Family {
        parent,
        child_id,
        token,
    }
}
