use axum::{
    http::{header, StatusCode},
    response::{IntoResponse, Response},
};
use thiserror::Error;

/// The application's error type.
#[derive(Error, Debug)]
pub enum AppError {
    /// A database error.
    #[error("Database error: {0}")]
    Database(#[from] tokio_postgres::Error),

    /// A connection pool error.
    #[error("Pool error: {0}")]
    Pool(#[from] deadpool_postgres::PoolError),

    /// A Redis error.
    #[error("Redis error: {0}")]
    Redis(#[from] redis::RedisError),

    /// Wrong credentials. The message never says which part was wrong.
    #[error("Authentication failed: {0}")]
    Authentication(String),

    /// The child session token is unknown or past its expiry.
    #[error("Invalid or expired session")]
    InvalidSession,

    /// An authorization error.
    #[error("Authorization failed")]
    Unauthorized,

    /// A resource not found error.
    #[error("Resource not found")]
    NotFound,

    /// A validation error.
    #[error("Validation error: {0}")]
    Validation(String),

    /// The search was stopped by a parent's blocklist.
    #[error("Blocked: {0}")]
    Blocked(String),

    /// The child has used up today's time.
    #[error("Daily time limit reached")]
    TimeLimitReached,

    /// A uniqueness conflict.
    #[error("Conflict: {0}")]
    Conflict(String),

    /// The video provider failed.
    #[error("Upstream error: {0}")]
    Upstream(String),

    /// A credential hashing error.
    #[error("Credential error: {0}")]
    Credential(String),

    /// An internal server error.
    #[error("Internal server error: {0}")]
    Internal(String),

    /// A rate limit exceeded error.
    #[error("Rate limit exceeded: {0}")]
    RateLimitExceeded(String),
}

/// A `Result` type that uses `AppError` as the error type.
pub type Result<T> = std::result::Result<T, AppError>;

impl IntoResponse for AppError {
    fn into_response(self) -> Response {
        let (status, message) = match self {
            AppError::Database(ref e) => {
                tracing::error!("Database error: {}", e);
                (StatusCode::INTERNAL_SERVER_ERROR, "Database error".to_string())
            }

            AppError::Pool(ref e) => {
                tracing::error!("Pool error: {}", e);
                (StatusCode::INTERNAL_SERVER_ERROR, "Database error".to_string())
            }

            AppError::Redis(ref e) => {
                tracing::error!("Redis error: {}", e);
                (StatusCode::INTERNAL_SERVER_ERROR, "Cache error".to_string())
            }

            AppError::Authentication(ref msg) => {
                tracing::warn!("Authentication failed: {}", msg);
                (StatusCode::UNAUTHORIZED, msg.clone())
            }

            AppError::InvalidSession => {
                tracing::warn!("Invalid or expired session");
                (StatusCode::UNAUTHORIZED, "Invalid or expired session".to_string())
            }

            AppError::Unauthorized => {
                tracing::warn!("Authorization failed");
                (StatusCode::FORBIDDEN, "Forbidden".to_string())
            }

            AppError::NotFound => {
                tracing::debug!("Resource not found");
                (StatusCode::NOT_FOUND, "Resource not found".to_string())
            }

            AppError::Validation(ref msg) => {
                tracing::debug!("Validation error: {}", msg);
                (StatusCode::BAD_REQUEST, msg.clone())
            }

            AppError::Blocked(ref msg) => {
                tracing::info!("Search blocked by parent blocklist");
                let body = sonic_rs::to_string(&sonic_rs::json!({
                    "success": false,
                    "error": "Blocked phrase detected",
                    "blocked": true,
                    "message": msg
                }))
                .unwrap_or_else(|_| r#"{"success":false,"blocked":true}"#.to_string());
                return json_response(StatusCode::FORBIDDEN, body);
            }

            AppError::TimeLimitReached => {
                tracing::info!("Daily time limit reached");
                let body = sonic_rs::to_string(&sonic_rs::json!({
                    "success": false,
                    "error": "Daily time limit reached",
                    "is_locked": true
                }))
                .unwrap_or_else(|_| r#"{"success":false,"is_locked":true}"#.to_string());
                return json_response(StatusCode::FORBIDDEN, body);
            }

            AppError::Conflict(ref msg) => {
                tracing::debug!("Conflict: {}", msg);
                (StatusCode::CONFLICT, msg.clone())
            }

            AppError::Upstream(ref msg) => {
                tracing::error!("Upstream error: {}", msg);
                (StatusCode::BAD_GATEWAY, "Search failed".to_string())
            }

            AppError::Credential(ref msg) => {
                tracing::error!("Credential error: {}", msg);
                (StatusCode::INTERNAL_SERVER_ERROR, "Internal server error".to_string())
            }

            AppError::Internal(ref msg) => {
                tracing::error!("Internal error: {}", msg);
                (StatusCode::INTERNAL_SERVER_ERROR, "Internal server error".to_string())
            }

            AppError::RateLimitExceeded(ref msg) => {
                tracing::warn!("Rate limit exceeded: {}", msg);
                (StatusCode::TOO_MANY_REQUESTS, msg.clone())
            }
        };

        let body = sonic_rs::to_string(&sonic_rs::json!({
            "success": false,
            "error": message
        }))
        .unwrap_or_else(|_| r#"{"success":false,"error":"Internal server error"}"#.to_string());

        json_response(status, body)
    }
}

fn json_response(status: StatusCode, body: String) -> Response {
    (status, [(header::CONTENT_TYPE, "application/json")], body).into_response()
}
