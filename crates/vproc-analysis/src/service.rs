//! Analysis service capability set.

use std::path::Path;

use async_trait::async_trait;

use crate::error::ServiceResult;

/// Handle to a media asset uploaded to the analysis service.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct AssetRef {
    /// Resource name used for state queries and deletion (e.g. `files/abc123`)
    pub name: String,
    /// URI referenced from generation requests
    pub uri: String,
    /// MIME type reported by the service
    pub mime_type: Option<String>,
}

/// Server-side readiness of an uploaded asset.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum AssetState {
    Processing,
    Active,
    Failed,
    Unknown(String),
}

impl AssetState {
    /// Parse the service's state string.
    pub fn from_api(raw: &str) -> Self {
        match raw {
            "PROCESSING" => Self::Processing,
            "ACTIVE" => Self::Active,
            "FAILED" => Self::Failed,
            other => Self::Unknown(other.to_string()),
        }
    }
}

/// Media a generation request refers to.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum MediaReference {
    /// A previously uploaded asset
    Asset(AssetRef),
    /// A URL the service fetches itself (e.g. a YouTube link)
    RemoteUrl(String),
}

/// Operations the analysis client needs from the remote service.
#[cfg_attr(test, mockall::automock)]
#[async_trait]
pub trait AnalysisService: Send + Sync {
    /// Upload a local file.
    async fn upload(&self, path: &Path, mime_type: &str, display_name: &str) -> ServiceResult<AssetRef>;

    /// Current readiness of an uploaded asset.
    async fn get_asset_state(&self, asset: &AssetRef) -> ServiceResult<AssetState>;

    /// Run the prompt against the referenced media and return the text answer.
    async fn generate(&self, media: &MediaReference, prompt: &str) -> ServiceResult<String>;

    /// Delete an uploaded asset.
    async fn delete_asset(&self, asset: &AssetRef) -> ServiceResult<()>;
}
