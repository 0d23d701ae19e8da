use chrono::{NaiveDate, Utc};

use crate::config::Config;
use crate::error::{AppError, Result};
use crate::models::{session::ChildSession, usage::UsageReport};
use crate::state::AppState;

/// Largest increment accepted in one call, in minutes.
pub const MAX_INCREMENT_MINUTES: i32 = 60;

/// The current calendar day in the usage timezone.
pub fn today(config: &Config) -> NaiveDate {
    Utc::now().with_timezone(&config.usage_timezone()).date_naive()
}

pub async fn get_usage(state: &AppState, session: &ChildSession) -> Result<UsageReport> {
    let usage = state
        .children
        .read_usage(session.child_id, today(&state.config))
        .await?
        .ok_or(AppError::InvalidSession)?;
    Ok(usage.report())
}

/// Adds played minutes. Rollover, increment and lock happen as one atomic step.
pub async fn increment_usage(
    state: &AppState,
    session: &ChildSession,
    minutes: i32,
) -> Result<UsageReport> {
    if !(1..=MAX_INCREMENT_MINUTES).contains(&minutes) {
        return Err(AppError::Validation(format!(
            "minutes_used must be between 1 and {}",
            MAX_INCREMENT_MINUTES
        )));
    }

    let usage = state
        .children
        .increment_usage(session.child_id, minutes, today(&state.config))
        .await?
        .ok_or(AppError::InvalidSession)?;

    if usage.locked {
        tracing::info!(
            "Child {} reached the daily limit ({}/{} minutes)",
            session.child_id,
            usage.used,
            usage.limit
        );
    }
    Ok(usage.report())
}
