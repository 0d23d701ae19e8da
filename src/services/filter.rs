//! Query validation and parent blocklist matching.
//!
//! Phrases match as case-folded substrings, not whole words: a blocked
//! "cat" also blocks "category".

use std::collections::HashSet;

use crate::{
    error::{AppError, Result},
    models::{
        blocklist::{BlockedPhrase, BlockedSong},
        video::VideoResult,
    },
};

/// Longest accepted search query, in characters.
pub const MAX_QUERY_CHARS: usize = 100;

/// Shown to the child when a search is blocked.
pub const BLOCKED_MESSAGE: &str = "This search has been blocked by your parent.";

fn allowed_query_char(c: char) -> bool {
    c.is_ascii_alphanumeric()
        || c.is_whitespace()
        || ('\u{0100}'..='\u{017F}').contains(&c)
        || ('\u{0400}'..='\u{04FF}').contains(&c)
}

/// Trims and validates a search query.
///
/// Queries with characters outside the accepted set are rejected, never stripped.
pub fn validate_query(raw: &str) -> Result<String> {
    let query = raw.trim();
    if query.is_empty() {
        return Err(AppError::Validation("Query is required".to_string()));
    }
    if query.chars().count() > MAX_QUERY_CHARS {
        return Err(AppError::Validation(format!(
            "Search query too long (max {} characters)",
            MAX_QUERY_CHARS
        )));
    }
    if !query.chars().all(allowed_query_char) {
        return Err(AppError::Validation(
            "Search query contains invalid characters".to_string(),
        ));
    }
    Ok(query.to_string())
}

/// Returns the first phrase contained in `query`, ignoring case.
pub fn find_blocked_phrase<'a, I>(query: &str, phrases: I) -> Option<&'a str>
where
    I: IntoIterator<Item = &'a str>,
{
    let folded = query.to_lowercase();
    phrases
        .into_iter()
        .find(|phrase| !phrase.is_empty() && folded.contains(&phrase.to_lowercase()))
}

/// Fails with `Blocked` when the query hits one of the parent's phrases.
pub fn check_query(query: &str, phrases: &[BlockedPhrase]) -> Result<()> {
    match find_blocked_phrase(query, phrases.iter().map(|p| p.phrase.as_str())) {
        Some(phrase) => {
            tracing::debug!("Query matched blocked phrase {:?}", phrase);
            Err(AppError::Blocked(BLOCKED_MESSAGE.to_string()))
        }
        None => Ok(()),
    }
}

/// Drops results whose video id the parent has blocked. Keeps order.
pub fn filter_results(results: Vec<VideoResult>, songs: &[BlockedSong]) -> Vec<VideoResult> {
    if songs.is_empty() {
        return results;
    }
    let blocked: HashSet<&str> = songs.iter().map(|s| s.video_id.as_str()).collect();
    results
        .into_iter()
        .filter(|r| !blocked.contains(r.video_id.as_str()))
        .collect()
}
