use serde::{Deserialize, Serialize};
use uuid::Uuid;

use crate::services::types::{GroundingChunk, MapInfo};

/// A past scan as kept on disk. Audio is not stored; narration is
/// regenerated on replay.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct HistoryItem {
    pub id: Uuid,
    /// Milliseconds since the Unix epoch.
    pub timestamp: u64,
    pub name: String,
    pub description: String,
    pub image_src: String,
    #[serde(default)]
    pub sources: Vec<GroundingChunk>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub map_info: Option<MapInfo>,
    #[serde(default)]
    pub nearby_places: Vec<GroundingChunk>,
}
