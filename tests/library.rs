mod common;

use axum::http::{Method, StatusCode};
use serde_json::json;

use common::*;

fn song() -> serde_json::Value {
    json!({
        "video_id": "abc123",
        "video_title": "Counting song",
        "video_thumbnail": "https://i.ytimg.com/vi/abc123/mqdefault.jpg"
    })
}

#[tokio::test]
async fn favorite_toggle_adds_then_removes() {
    let app = TestApp::new();
    let family = family(&app, 60).await;

    let first = app
        .send(child_request(
            Method::POST,
            "/api/child/favorites/toggle",
            &family.token,
            Some(song()),
        ))
        .await;
    assert_eq!(first.status, StatusCode::OK);
    assert_eq!(first.body["action"], "added");
    assert_eq!(app.store.favorite_count(family.child_id).await, 1);

    let second = app
        .send(child_request(
            Method::POST,
            "/api/child/favorites/toggle",
            &family.token,
            Some(song()),
        ))
        .await;
    assert_eq!(second.body["action"], "removed");
    assert_eq!(app.store.favorite_count(family.child_id).await, 0);
}

#[tokio::test]
async fn concurrent_toggles_never_duplicate() {
    let app = TestApp::new();
    let family = family(&app, 60).await;

    let requests = (0..3).map(|_| {
        app.send(child_request(
            Method::POST,
            "/api/child/favorites/toggle",
            &family.token,
            Some(song()),
        ))
    });
    futures::future::join_all(requests).await;
    assert_eq!(app.store.favorite_count(family.child_id).await, 1);
}

#[tokio::test]
async fn favorites_are_listed_and_removed_by_their_owner() {
    let app = TestApp::new();
    let family = family(&app, 60).await;
    let sibling_id = create_child(&app, &family.parent, "Ola", "5678", 60).await;
    let sibling_token = login_child(&app, sibling_id, "5678").await;

    app.send(child_request(
        Method::POST,
        "/api/child/favorites/toggle",
        &family.token,
        Some(song()),
    ))
    .await;

    let response = app
        .send(child_request(Method::GET, "/api/child/favorites", &family.token, None))
        .await;
    let favorites = response.body["favorites"].as_array().unwrap();
    assert_eq!(favorites.len(), 1);
    let favorite_id = favorites[0]["id"].as_str().unwrap().to_string();
    let path = format!("/api/child/favorites/{}", favorite_id);

    let response = app
        .send(child_request(Method::DELETE, &path, &sibling_token, None))
        .await;
    assert_eq!(response.status, StatusCode::NOT_FOUND);

    let response = app
        .send(child_request(Method::DELETE, &path, &family.token, None))
        .await;
    assert_eq!(response.status, StatusCode::OK);
    assert_eq!(app.store.favorite_count(family.child_id).await, 0);
}

#[tokio::test]
async fn history_is_visible_to_child_and_parent() {
    let app = TestApp::new();
    let family = family(&app, 60).await;

    let mut entry = song();
    entry["search_query"] = json!("counting");
    let response = app
        .send(child_request(
            Method::POST,
            "/api/child/history",
            &family.token,
            Some(entry),
        ))
        .await;
    assert_eq!(response.status, StatusCode::CREATED);
    assert_eq!(response.body["entry"]["search_query"], "counting");

    let response = app
        .send(child_request(Method::GET, "/api/child/history", &family.token, None))
        .await;
    assert_eq!(response.body["history"].as_array().unwrap().len(), 1);

    let path = format!("/api/parent/children/{}/history", family.child_id);
    let response = app
        .send(parent_request(Method::GET, &path, &family.parent, None))
        .await;
    assert_eq!(response.status, StatusCode::OK);
    assert_eq!(response.body["history"][0]["video_id"], "abc123");

    let stranger = register_parent(&app, "stranger@example.com").await;
    let response = app
        .send(parent_request(Method::GET, &path, &stranger, None))
        .await;
    assert_eq!(response.status, StatusCode::NOT_FOUND);
}

#[tokio::test]
async fn history_returns_the_latest_fifty() {
    let app = TestApp::new();
    let family = family(&app, 60).await;

    for i in 0..55 {
        app.send(child_request(
            Method::POST,
            "/api/child/history",
            &family.token,
            Some(json!({ "video_id": format!("vid{i}"), "video_title": format!("Song {i}") })),
        ))
        .await;
    }
    let response = app
        .send(child_request(Method::GET, "/api/child/history", &family.token, None))
        .await;
    let history = response.body["history"].as_array().unwrap();
    assert_eq!(history.len(), 50);
    assert_eq!(history[0]["video_id"], "vid54");
}

#[tokio::test]
async fn missing_video_id_is_rejected() {
    let app = TestApp::new();
    let family = family(&app, 60).await;

    let response = app
        .send(child_request(
            Method::POST,
            "/api/child/favorites/toggle",
            &family.token,
            Some(json!({ "video_id": " ", "video_title": "x" })),
        ))
        .await;
    assert_eq!(response.status, StatusCode::BAD_REQUEST);
}
