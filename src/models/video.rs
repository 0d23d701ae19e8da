use serde::{Deserialize, Serialize};

/// A search hit as returned to the child client.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct VideoResult {
    pub video_id: String,
    pub title: String,
    pub thumbnail: String,
    pub channel_title: String,
}
