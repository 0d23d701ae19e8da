use axum::{extract::State, Json};
use serde::{Deserialize, Serialize};
use crate::{
    error::{AppError, Result},
    models::video::VideoResult,
    services::search as search_service,
    state::AppState,
    validation::ids::parse_uuid,
};

#[derive(Deserialize)]
pub struct SearchRequest {
    #[serde(default)]
    pub query: String,
    #[serde(alias = "parentId")]
    pub parent_id: Option<String>,
}

#[derive(Serialize)]
pub struct SearchResponse {
    pub results: Vec<VideoResult>,
}

/// Searches videos on behalf of a child, applying the parent's blocklists.
pub async fn search(
    State(state): State<AppState>,
    Json(payload): Json<SearchRequest>,
) -> Result<Json<SearchResponse>> {
    let parent_id = payload
        .parent_id
        .as_deref()
        .ok_or_else(|| AppError::Validation("Parent ID is required".to_string()))
        .and_then(|raw| {
            parse_uuid(raw)
                .ok_or_else(|| AppError::Validation("Invalid parent ID format".to_string()))
        })?;

    let results = search_service::search(&state, &payload.query, parent_id).await?;
    Ok(Json(SearchResponse { results }))
}
