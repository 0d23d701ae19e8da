mod common;

use axum::http::{header, Method, StatusCode};
use serde_json::json;

use common::*;

#[tokio::test]
async fn health_reports_ok() {
    let app = TestApp::new();
    let response = app.send(json_request(Method::GET, "/api/health", None)).await;
    assert_eq!(response.status, StatusCode::OK);
    assert_eq!(response.body["status"], "ok");
}

#[tokio::test]
async fn register_sets_session_cookies_and_access_code() {
    let app = TestApp::new();
    let auth = register_parent(&app, "Parent@Example.com").await;
    assert_eq!(auth.access_code.len(), 8);
    assert!(auth.cookie_header.contains("session_id="));

    let response = app
        .send(parent_request(Method::GET, "/api/parent/account", &auth, None))
        .await;
    assert_eq!(response.status, StatusCode::OK);
    assert_eq!(response.body["account"]["email"], "parent@example.com");
    assert_eq!(response.body["account"]["access_code"], auth.access_code);
}

#[tokio::test]
async fn duplicate_email_is_a_conflict() {
    let app = TestApp::new();
    register_parent(&app, "parent@example.com").await;
    let response = app
        .send(json_request(
            Method::POST,
            "/api/auth/register",
            Some(json!({ "email": "PARENT@example.com", "password": PASSWORD })),
        ))
        .await;
    assert_eq!(response.status, StatusCode::CONFLICT);
}

#[tokio::test]
async fn login_failures_share_one_message() {
    let app = TestApp::new();
    register_parent(&app, "parent@example.com").await;

    let wrong_password = app
        .send(json_request(
            Method::POST,
            "/api/auth/login",
            Some(json!({ "email": "parent@example.com", "password": "not the password" })),
        ))
        .await;
    let unknown_email = app
        .send(json_request(
            Method::POST,
            "/api/auth/login",
            Some(json!({ "email": "nobody@example.com", "password": PASSWORD })),
        ))
        .await;
    assert_eq!(wrong_password.status, StatusCode::UNAUTHORIZED);
    assert_eq!(unknown_email.status, StatusCode::UNAUTHORIZED);
    assert_eq!(wrong_password.body["error"], unknown_email.body["error"]);

    let response = app
        .send(json_request(
            Method::POST,
            "/api/auth/login",
            Some(json!({ "email": "parent@example.com", "password": PASSWORD })),
        ))
        .await;
    assert_eq!(response.status, StatusCode::OK);
    let auth = parent_auth(&response);
    let response = app
        .send(parent_request(Method::GET, "/api/parent/children", &auth, None))
        .await;
    assert_eq!(response.status, StatusCode::OK);
}

#[tokio::test]
async fn login_is_rate_limited_per_email() {
    let app = TestApp::new();
    register_parent(&app, "parent@example.com").await;

    for _ in 0..5 {
        app.send(json_request(
            Method::POST,
            "/api/auth/login",
            Some(json!({ "email": "parent@example.com", "password": "not the password" })),
        ))
        .await;
    }
    let response = app
        .send(json_request(
            Method::POST,
            "/api/auth/login",
            Some(json!({ "email": "parent@example.com", "password": PASSWORD })),
        ))
        .await;
    assert_eq!(response.status, StatusCode::TOO_MANY_REQUESTS);
}

#[tokio::test]
async fn mutations_require_the_csrf_header() {
    let app = TestApp::new();
    let auth = register_parent(&app, "parent@example.com").await;

    let mut request = json_request(
        Method::POST,
        "/api/parent/blocked-phrases",
        Some(json!({ "phrase": "minecraft" })),
    );
    request
        .headers_mut()
        .insert(header::COOKIE, auth.cookie_header.parse().unwrap());
    let response = app.send(request).await;
    assert_eq!(response.status, StatusCode::UNAUTHORIZED);

    let mut forged = auth.clone();
    forged.csrf_token = "forged".to_string();
    let response = app
        .send(parent_request(
            Method::POST,
            "/api/parent/blocked-phrases",
            &forged,
            Some(json!({ "phrase": "minecraft" })),
        ))
        .await;
    assert_eq!(response.status, StatusCode::UNAUTHORIZED);

    let response = app
        .send(parent_request(Method::GET, "/api/parent/blocked-phrases", &forged, None))
        .await;
    assert_eq!(response.status, StatusCode::OK);
    assert_eq!(response.body["phrases"], json!([]));
}

#[tokio::test]
async fn logout_ends_the_parent_session() {
    let app = TestApp::new();
    let auth = register_parent(&app, "parent@example.com").await;

    let response = app
        .send(parent_request(Method::POST, "/api/auth/logout", &auth, None))
        .await;
    assert_eq!(response.status, StatusCode::OK);

    let response = app
        .send(parent_request(Method::GET, "/api/parent/account", &auth, None))
        .await;
    assert_eq!(response.status, StatusCode::UNAUTHORIZED);
}

#[tokio::test]
async fn child_crud_validates_and_scopes_to_the_parent() {
    let app = TestApp::new();
    let auth = register_parent(&app, "parent@example.com").await;
    let other = register_parent(&app, "other@example.com").await;

    for body in [
        json!({ "username": "Maja", "pin": "12", "avatar_color": "#4F46E5", "daily_time_limit_minutes": 60 }),
        json!({ "username": "Maja", "pin": "1234", "avatar_color": "blue", "daily_time_limit_minutes": 60 }),
        json!({ "username": "Maja", "pin": "1234", "avatar_color": "#4F46E5", "daily_time_limit_minutes": 5 }),
        json!({ "username": "  ", "pin": "1234", "avatar_color": "#4F46E5", "daily_time_limit_minutes": 60 }),
    ] {
        let response = app
            .send(parent_request(Method::POST, "/api/parent/children", &auth, Some(body)))
            .await;
        assert_eq!(response.status, StatusCode::BAD_REQUEST, "{}", response.body);
    }

    let child_id = create_child(&app, &auth, "Maja", "1234", 60).await;
    let response = app
        .send(parent_request(Method::GET, "/api/parent/children", &auth, None))
        .await;
    let children = response.body["children"].as_array().unwrap();
    assert_eq!(children.len(), 1);
    assert_eq!(children[0]["remaining_minutes"], 60);
    assert!(children[0].get("pin_hash").is_none());

    let path = format!("/api/parent/children/{}", child_id);
    let response = app
        .send(parent_request(Method::DELETE, &path, &other, None))
        .await;
    assert_eq!(response.status, StatusCode::NOT_FOUND);

    let response = app
        .send(parent_request(
            Method::PUT,
            &path,
            &auth,
            Some(json!({ "pin": "4321" })),
        ))
        .await;
    assert_eq!(response.status, StatusCode::OK);
    assert_eq!(
        verify_pin(&app, child_id, "1234").await.status,
        StatusCode::UNAUTHORIZED
    );
    login_child(&app, child_id, "4321").await;
}

#[tokio::test]
async fn access_code_lists_children_without_login() {
    let app = TestApp::new();
    let auth = register_parent(&app, "parent@example.com").await;
    let child_id = create_child(&app, &auth, "Maja", "1234", 60).await;

    let path = format!("/api/children/by-code/{}", auth.access_code.to_lowercase());
    let response = app.send(json_request(Method::GET, &path, None)).await;
    assert_eq!(response.status, StatusCode::OK);
    let children = response.body["children"].as_array().unwrap();
    assert_eq!(children.len(), 1);
    assert_eq!(children[0]["id"], child_id.to_string());
    assert_eq!(children[0]["username"], "Maja");
    assert!(children[0].get("pin_hash").is_none());

    let response = app
        .send(json_request(Method::GET, "/api/children/by-code/ZZZZZZZZ", None))
        .await;
    assert_eq!(response.status, StatusCode::OK);
    assert_eq!(response.body["children"], json!([]));
}

#[tokio::test]
async fn regenerated_code_replaces_the_old_one() {
    let app = TestApp::new();
    let auth = register_parent(&app, "parent@example.com").await;
    create_child(&app, &auth, "Maja", "1234", 60).await;

    let response = app
        .send(parent_request(Method::POST, "/api/parent/access-code", &auth, None))
        .await;
    assert_eq!(response.status, StatusCode::OK);
    let new_code = response.body["access_code"].as_str().unwrap().to_string();
    assert_ne!(new_code, auth.access_code);

    let old = app
        .send(json_request(
            Method::GET,
            &format!("/api/children/by-code/{}", auth.access_code),
            None,
        ))
        .await;
    assert_eq!(old.body["children"], json!([]));

    let new = app
        .send(json_request(
            Method::GET,
            &format!("/api/children/by-code/{}", new_code),
            None,
        ))
        .await;
    assert_eq!(new.body["children"].as_array().unwrap().len(), 1);
}

#[tokio::test]
async fn phrase_blocklist_normalises_and_rejects_duplicates() {
    let app = TestApp::new();
    let auth = register_parent(&app, "parent@example.com").await;

    let response = app
        .send(parent_request(
            Method::POST,
            "/api/parent/blocked-phrases",
            &auth,
            Some(json!({ "phrase": "  MineCraft " })),
        ))
        .await;
    assert_eq!(response.status, StatusCode::CREATED);
    assert_eq!(response.body["phrase"]["phrase"], "minecraft");
    let phrase_id = response.body["phrase"]["id"].as_str().unwrap().to_string();

    let response = app
        .send(parent_request(
            Method::POST,
            "/api/parent/blocked-phrases",
            &auth,
            Some(json!({ "phrase": "minecraft" })),
        ))
        .await;
    assert_eq!(response.status, StatusCode::CONFLICT);

    let response = app
        .send(parent_request(
            Method::DELETE,
            &format!("/api/parent/blocked-phrases/{}", phrase_id),
            &auth,
            None,
        ))
        .await;
    assert_eq!(response.status, StatusCode::OK);

    let response = app
        .send(parent_request(Method::GET, "/api/parent/blocked-phrases", &auth, None))
        .await;
    assert_eq!(response.body["phrases"], json!([]));
}
