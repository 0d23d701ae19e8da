use std::env;
use std::fmt::Display;
use std::net::SocketAddr;
use std::ops::RangeInclusive;
use std::str::FromStr;

use anyhow::{Context, Result};
use chrono::{FixedOffset, Offset, Utc};
use zeroize::Zeroizing;

use crate::crypto::password::HashCost;

/// Default endpoint of the YouTube Data API search resource.
pub const DEFAULT_YOUTUBE_API_URL: &str = "https://www.googleapis.com/youtube/v3/search";

/// The application's configuration.
#[derive(Clone)]
pub struct Config {
    /// The URL of the PostgreSQL database.
    pub database_url: String,
    /// The URL of the Redis server.
    pub redis_url: String,
    /// The address the HTTP server binds to.
    pub bind_addr: SocketAddr,
    /// Origins allowed by the CORS layer.
    pub allowed_origins: Vec<String>,
    /// Whether cookies should carry the `Secure` attribute.
    pub secure_cookies: bool,
    /// The lifetime of a parent session in days.
    pub parent_session_days: i64,
    /// The lifetime of a child session in hours.
    pub child_session_hours: i64,
    /// Offset of the reference timezone used for the daily usage rollover.
    pub usage_utc_offset_minutes: i32,
    /// The YouTube Data API key. Searches fail when it is absent.
    pub youtube_api_key: Option<Zeroizing<String>>,
    /// The YouTube search endpoint.
    pub youtube_api_url: String,
    /// Failed PIN attempts per child before a temporary lockout. `0` disables the lockout.
    pub pin_max_failed_attempts: u32,
    /// How long a PIN lockout lasts, in minutes.
    pub pin_lockout_minutes: i64,
    /// Per-IP request rate on the public routes. `0` disables the limiter.
    pub public_rate_limit_per_second: u64,
    /// Argon2id cost for new password and PIN hashes.
    pub hash_cost: HashCost,
}

impl Config {
    /// Creates a new `Config` from environment variables.
    ///
    /// # Returns
    ///
    /// A `Result` containing the `Config`.
    pub fn from_env() -> Result<Self> {
        let usage_utc_offset_minutes: i32 = parse_var("USAGE_UTC_OFFSET_MINUTES", "0")?;
        if usage_utc_offset_minutes.abs() >= 24 * 60 {
            anyhow::bail!("USAGE_UTC_OFFSET_MINUTES must be within one day of UTC");
        }

        let youtube_api_key = env::var("YOUTUBE_API_KEY")
            .ok()
            .filter(|key| !key.trim().is_empty())
            .map(Zeroizing::new);
        if youtube_api_key.is_none() {
            tracing::warn!("YOUTUBE_API_KEY is not set, searches will fail");
        }

        Ok(Self {
            database_url: env::var("DATABASE_URL").context("DATABASE_URL must be set")?,
            redis_url: env::var("REDIS_URL")
                .unwrap_or_else(|_| "redis://127.0.0.1:6379".to_string()),
            bind_addr: parse_var("BIND_ADDR", "127.0.0.1:3000")?,
            allowed_origins: env::var("ALLOWED_ORIGINS")
                .unwrap_or_else(|_| "http://localhost:3000".to_string())
                .split(',')
                .map(|origin| origin.trim().to_string())
                .filter(|origin| !origin.is_empty())
                .collect(),
            secure_cookies: env::var("APP_ENV")
                .map(|value| value == "production")
                .unwrap_or(false),
            parent_session_days: check_range(
                "PARENT_SESSION_DAYS",
                parse_var("PARENT_SESSION_DAYS", "7")?,
                1..=365,
            )?,
            child_session_hours: check_range(
                "CHILD_SESSION_HOURS",
                parse_var("CHILD_SESSION_HOURS", "8")?,
                1..=720,
            )?,
            usage_utc_offset_minutes,
            youtube_api_key,
            youtube_api_url: env::var("YOUTUBE_API_URL")
                .unwrap_or_else(|_| DEFAULT_YOUTUBE_API_URL.to_string()),
            pin_max_failed_attempts: parse_var("PIN_MAX_FAILED_ATTEMPTS", "0")?,
            pin_lockout_minutes: check_range(
                "PIN_LOCKOUT_MINUTES",
                parse_var("PIN_LOCKOUT_MINUTES", "15")?,
                1..=1440,
            )?,
            public_rate_limit_per_second: parse_var("PUBLIC_RATE_LIMIT_PER_SECOND", "20")?,
            hash_cost: HashCost {
                memory_kib: parse_var("ARGON2_MEMORY_KIB", "19456")?,
                iterations: parse_var("ARGON2_ITERATIONS", "3")?,
                parallelism: parse_var("ARGON2_PARALLELISM", "6")?,
            },
        })
    }

    /// The fixed timezone in which a "day" of usage is counted.
    pub fn usage_timezone(&self) -> FixedOffset {
        FixedOffset::east_opt(self.usage_utc_offset_minutes * 60).unwrap_or_else(|| Utc.fix())
    }
}

fn parse_var<T>(name: &str, default: &str) -> Result<T>
where
    T: FromStr,
    T::Err: std::error::Error + Send + Sync + 'static,
{
    env::var(name)
        .unwrap_or_else(|_| default.to_string())
        .trim()
        .parse()
        .with_context(|| format!("Invalid {}", name))
}

fn check_range<T>(name: &str, value: T, range: RangeInclusive<T>) -> Result<T>
where
    T: PartialOrd + Display,
{
    if !range.contains(&value) {
        anyhow::bail!(
            "{} must be between {} and {}, got {}",
            name,
            range.start(),
            range.end(),
            value
        );
    }
    Ok(value)
}
