use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use utoipa::ToSchema;

/// One stored `.tex` object
#[derive(Debug, Serialize, Deserialize, ToSchema)]
pub struct TexFileEntry {
    pub name: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub size: Option<u64>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub updated_at: Option<DateTime<Utc>>,
}

#[derive(Debug, Serialize, Deserialize, ToSchema)]
pub struct TexFileListResponse {
    pub files: Vec<TexFileEntry>,
}

/// Content of one stored `.tex` object
#[derive(Debug, Serialize, Deserialize, ToSchema)]
pub struct TexFileResponse {
    pub filename: String,
    pub content: String,
}

/// Replacement content for a stored `.tex` object
#[derive(Debug, Serialize, Deserialize, ToSchema)]
pub struct TexFileUpdateRequest {
    pub content: String,
}

#[derive(Debug, Serialize, Deserialize, ToSchema)]
pub struct SavedResponse {
    pub message: String,
}

/// Time-limited URL granting read access to one compiled PDF
#[derive(Debug, Serialize, Deserialize, ToSchema)]
pub struct SignedUrlResponse {
    pub signed_url: String,
    /// URL lifetime in seconds
    pub expires_in: u64,
}
