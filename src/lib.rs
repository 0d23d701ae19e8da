//! VibeOn: a parental-control music player backend.
//!
//! Parents manage child profiles, daily time limits and blocklists; children
//! log in with a PIN, search filtered videos and have their playback time
//! counted against the day's limit. The [`client`] module holds the pieces
//! that run on the child's device.

use axum::{
    extract::DefaultBodyLimit,
    middleware::from_fn_with_state,
    routing::{delete, get, post, put},
    Router,
};
use http::{header, HeaderName, HeaderValue, Method};
use std::sync::Arc;
use std::time::Duration;
use tower_cookies::CookieManagerLayer;
use tower_governor::{governor::GovernorConfigBuilder, GovernorLayer};
use tower_http::{
    cors::CorsLayer,
    trace::{DefaultMakeSpan, DefaultOnFailure, DefaultOnRequest, DefaultOnResponse, TraceLayer},
};
use tracing::Level;

pub mod client;
pub mod config;
pub mod db;
pub mod error;
pub mod repositories;
pub mod state;

pub mod crypto {
    pub mod password;
    pub mod token;
}

pub mod models {
    pub mod blocklist;
    pub mod child;
    pub mod library;
    pub mod parent;
    pub mod pin_attempt;
    pub mod session;
    pub mod usage;
    pub mod video;
}

pub mod services {
    pub mod auth;
    pub mod blocklist;
    pub mod child_session;
    pub mod children;
    pub mod filter;
    pub mod library;
    pub mod search;
    pub mod usage;
}

pub mod handlers {
    pub mod auth;
    pub mod child;
    pub mod health;
    pub mod parent;
    pub mod search;
}

pub mod middleware_layer {
    pub mod auth;
    pub mod csrf;
    pub mod rate_limit;
}

pub mod validation {
    pub mod auth;
    pub mod ids;
}

pub use config::Config;
pub use error::{AppError, Result};
pub use state::AppState;

/// Largest accepted request body.
const BODY_LIMIT_BYTES: usize = 64 * 1024;

fn cors_layer(origins: &[String]) -> CorsLayer {
    let origins: Vec<HeaderValue> = origins
        .iter()
        .filter_map(|origin| match origin.parse() {
            Ok(value) => Some(value),
            Err(_) => {
                tracing::warn!("Ignoring invalid CORS origin: {}", origin);
                None
            }
        })
        .collect();

    CorsLayer::new()
        .allow_origin(origins)
        .allow_methods([
            Method::GET,
            Method::POST,
            Method::PUT,
            Method::DELETE,
            Method::OPTIONS,
        ])
        .allow_headers([
            header::CONTENT_TYPE,
            header::AUTHORIZATION,
            header::ACCEPT,
            header::COOKIE,
            HeaderName::from_static(middleware_layer::csrf::CSRF_HEADER),
        ])
        .allow_credentials(true)
        .max_age(Duration::from_secs(86400))
}

/// Builds the full HTTP API around `state`.
///
/// The per-IP governor on public routes needs the server to provide
/// `ConnectInfo<SocketAddr>`; it is left out when the configured rate is 0.
pub fn build_router(state: AppState) -> Router {
    let register_routes = Router::new()
        .route("/api/auth/register", post(handlers::auth::register))
        .route_layer(from_fn_with_state(
            state.clone(),
            middleware_layer::rate_limit::rate_limit_register,
        ));

    let login_routes = Router::new()
        .route("/api/auth/login", post(handlers::auth::login))
        .route_layer(from_fn_with_state(
            state.clone(),
            middleware_layer::rate_limit::rate_limit_login,
        ));

    let parent_routes = Router::new()
        .route("/api/auth/logout", post(handlers::auth::logout))
        .route("/api/parent/account", get(handlers::parent::get_account))
        .route(
            "/api/parent/access-code",
            post(handlers::parent::regenerate_access_code),
        )
        .route(
            "/api/parent/children",
            get(handlers::parent::list_children).post(handlers::parent::create_child),
        )
        .route(
            "/api/parent/children/{child_id}",
            put(handlers::parent::update_child).delete(handlers::parent::delete_child),
        )
        .route(
            "/api/parent/children/{child_id}/reset-usage",
            post(handlers::parent::reset_usage),
        )
        .route(
            "/api/parent/children/{child_id}/history",
            get(handlers::parent::child_history),
        )
        .route(
            "/api/parent/blocked-phrases",
            get(handlers::parent::list_phrases).post(handlers::parent::add_phrase),
        )
        .route(
            "/api/parent/blocked-phrases/{id}",
            delete(handlers::parent::remove_phrase),
        )
        .route(
            "/api/parent/blocked-songs",
            get(handlers::parent::list_songs).post(handlers::parent::add_song),
        )
        .route(
            "/api/parent/blocked-songs/{id}",
            delete(handlers::parent::remove_song),
        )
        .route_layer(from_fn_with_state(
            state.clone(),
            middleware_layer::csrf::verify_csrf,
        ))
        .route_layer(from_fn_with_state(
            state.clone(),
            middleware_layer::auth::require_parent,
        ));

    let child_routes = Router::new()
        .route("/api/child/logout", post(handlers::child::logout))
        .route(
            "/api/child/usage",
            get(handlers::child::get_usage).post(handlers::child::increment_usage),
        )
        .route(
            "/api/child/history",
            get(handlers::child::list_history).post(handlers::child::append_history),
        )
        .route("/api/child/favorites", get(handlers::child::list_favorites))
        .route(
            "/api/child/favorites/toggle",
            post(handlers::child::toggle_favorite),
        )
        .route(
            "/api/child/favorites/{favorite_id}",
            delete(handlers::child::remove_favorite),
        )
        .route_layer(from_fn_with_state(
            state.clone(),
            middleware_layer::auth::require_child_session,
        ));

    let mut public_routes = Router::new()
        .route(
            "/api/children/by-code/{code}",
            get(handlers::child::children_by_code),
        )
        .route("/api/child/verify-pin", post(handlers::child::verify_pin))
        .route("/api/search", post(handlers::search::search));

    let rate = state.config.public_rate_limit_per_second;
    if rate > 0 {
        let governor_conf = GovernorConfigBuilder::default()
            .per_millisecond((1000 / rate).max(1))
            .burst_size(u32::try_from(rate).unwrap_or(u32::MAX))
            .use_headers()
            .finish();
        match governor_conf {
            Some(conf) => public_routes = public_routes.layer(GovernorLayer::new(Arc::new(conf))),
            None => tracing::warn!("Invalid public rate limit, governor disabled"),
        }
    }

    let cors = cors_layer(&state.config.allowed_origins);

    Router::new()
        .merge(register_routes)
        .merge(login_routes)
        .merge(parent_routes)
        .merge(child_routes)
        .merge(public_routes)
        .route("/api/health", get(handlers::health::health))
        .layer(
            TraceLayer::new_for_http()
                .make_span_with(DefaultMakeSpan::default().level(Level::INFO))
                .on_request(DefaultOnRequest::default().level(Level::DEBUG))
                .on_response(DefaultOnResponse::default().level(Level::DEBUG))
                .on_failure(DefaultOnFailure::default().level(Level::ERROR)),
        )
        .layer(CookieManagerLayer::new())
        .layer(DefaultBodyLimit::max(BODY_LIMIT_BYTES))
        .layer(cors)
        .with_state(state)
}
