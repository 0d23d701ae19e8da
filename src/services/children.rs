//! Parent-side management of child accounts and the child login directory.

use uuid::Uuid;
use zeroize::Zeroizing;

use crate::crypto::password;
use crate::error::{AppError, Result};
use crate::models::{
    child::{
        AvatarColor, ChildAccount, ChildLoginEntry, ChildName, ChildSummary, ChildUpdate,
        DailyLimit, NewChild, Pin,
    },
    library::HistoryEntry,
    parent::normalize_access_code,
    usage::UsageReport,
};
use crate::services::{library, usage};
use crate::state::AppState;

/// Raw fields of a child create request.
#[derive(Debug)]
pub struct ChildInput<'a> {
    pub username: &'a str,
    pub pin: &'a str,
    pub avatar_color: &'a str,
    pub daily_time_limit_minutes: i32,
}

/// Raw fields of a child update request. `None` leaves a field unchanged.
#[derive(Debug, Default)]
pub struct ChildPatch<'a> {
    pub username: Option<&'a str>,
    pub pin: Option<&'a str>,
    pub avatar_color: Option<&'a str>,
    pub daily_time_limit_minutes: Option<i32>,
}

async fn hash_pin(state: &AppState, pin: &Pin) -> Result<String> {
    password::hash_secret(Zeroizing::new(pin.as_str().to_string()), state.config.hash_cost).await
}

/// The parent view of a child, with today's rollover applied.
fn summarize(mut child: ChildAccount, state: &AppState) -> ChildSummary {
    let current = child.usage().rolled_over(usage::today(&state.config));
    child.apply_usage(current);
    ChildSummary::from(&child)
}

/// Loads a child and checks that `parent_id` owns it.
async fn owned_child(state: &AppState, parent_id: Uuid, child_id: Uuid) -> Result<ChildAccount> {
    match state.children.find_child(child_id).await? {
        Some(child) if child.parent_id == parent_id => Ok(child),
        _ => Err(AppError::NotFound),
    }
}

pub async fn create_child(
    state: &AppState,
    parent_id: Uuid,
    input: ChildInput<'_>,
) -> Result<ChildSummary> {
    let username = ChildName::parse(input.username)?;
    let pin = Pin::parse(input.pin)?;
    let avatar_color = AvatarColor::parse(input.avatar_color)?;
    let daily_limit = DailyLimit::new(input.daily_time_limit_minutes)?;

    let child = state
        .children
        .create_child(&NewChild {
            parent_id,
            username,
            pin_hash: hash_pin(state, &pin).await?,
            avatar_color,
            daily_limit,
        })
        .await?;

    tracing::info!("Child {} created for parent {}", child.id, parent_id);
    Ok(summarize(child, state))
}

pub async fn list_children(state: &AppState, parent_id: Uuid) -> Result<Vec<ChildSummary>> {
    let children = state.children.list_children(parent_id).await?;
    Ok(children
        .into_iter()
        .map(|child| summarize(child, state))
        .collect())
}

pub async fn update_child(
    state: &AppState,
    parent_id: Uuid,
    child_id: Uuid,
    patch: ChildPatch<'_>,
) -> Result<ChildSummary> {
    let pin_hash = match patch.pin {
        Some(raw) => Some(hash_pin(state, &Pin::parse(raw)?).await?),
        None => None,
    };
    let update = ChildUpdate {
        username: patch.username.map(ChildName::parse).transpose()?,
        pin_hash,
        avatar_color: patch.avatar_color.map(AvatarColor::parse).transpose()?,
        daily_limit: patch.daily_time_limit_minutes.map(DailyLimit::new).transpose()?,
    };

    let child = state
        .children
        .update_child(child_id, parent_id, &update)
        .await?
        .ok_or(AppError::NotFound)?;

    tracing::info!("Child {} updated", child.id);
    Ok(summarize(child, state))
}

/// Deletes a child with its history, favourites and PIN attempts.
pub async fn delete_child(state: &AppState, parent_id: Uuid, child_id: Uuid) -> Result<()> {
    if !state.children.delete_child(child_id, parent_id).await? {
        return Err(AppError::NotFound);
    }
    tracing::info!("Child {} deleted by parent {}", child_id, parent_id);
    Ok(())
}

pub async fn reset_usage(state: &AppState, parent_id: Uuid, child_id: Uuid) -> Result<UsageReport> {
    let usage = state
        .children
        .reset_usage(child_id, parent_id, usage::today(&state.config))
        .await?
        .ok_or(AppError::NotFound)?;
    tracing::info!("Usage reset for child {}", child_id);
    Ok(usage.report())
}

pub async fn child_history(
    state: &AppState,
    parent_id: Uuid,
    child_id: Uuid,
) -> Result<Vec<HistoryEntry>> {
    let child = owned_child(state, parent_id, child_id).await?;
    library::list_history(state, child.id).await
}

/// Lists the children behind an access code. Unknown codes yield an empty list.
pub async fn children_by_code(state: &AppState, code: &str) -> Result<Vec<ChildLoginEntry>> {
    let Some(code) = normalize_access_code(code) else {
        return Ok(Vec::new());
    };
    let Some(parent) = state.parents.find_parent_by_access_code(&code).await? else {
        return Ok(Vec::new());
    };
    let children = state.children.list_children(parent.id).await?;
    Ok(children.iter().map(ChildLoginEntry::from).collect())
}
