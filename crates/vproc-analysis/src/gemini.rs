//! Gemini client for video analysis.
//!
//! Uploads go through the Files API resumable protocol; analysis goes
//! through `generateContent` with a `file_data` part followed by the prompt.

use std::path::Path;
use std::time::Duration;

use async_trait::async_trait;
use reqwest::{Client, Response};
use serde::{Deserialize, Serialize};
use tracing::{debug, info, warn};

use crate::error::{AnalysisError, ServiceResult};
use crate::service::{AnalysisService, AssetRef, AssetState, MediaReference};

const DEFAULT_BASE_URL: &str = "https://generativelanguage.googleapis.com";
const DEFAULT_MODEL: &str = "gemini-2.0-flash";

/// Gemini client configuration.
#[derive(Debug, Clone)]
pub struct GeminiConfig {
    pub api_key: String,
    /// API root, overridable for tests and proxies
    pub base_url: String,
    /// Primary model
    pub model: String,
    /// Models tried in order when the primary model fails
    pub fallback_models: Vec<String>,
    /// Per-request timeout (uploads of large recordings take a while)
    pub timeout: Duration,
}

impl GeminiConfig {
    /// Create config from environment variables.
    pub fn from_env() -> ServiceResult<Self> {
        let api_key = std::env::var("GEMINI_API_KEY")
            .ok()
            .filter(|s| !s.is_empty())
            .ok_or_else(|| AnalysisError::config_error("GEMINI_API_KEY not set"))?;

        let fallback_models = std::env::var("GEMINI_FALLBACK_MODELS")
            .map(|raw| {
                raw.split(',')
                    .map(str::trim)
                    .filter(|m| !m.is_empty())
                    .map(String::from)
                    .collect()
            })
            .unwrap_or_default();

        let timeout_secs: u64 = std::env::var("GEMINI_TIMEOUT_SECS")
            .ok()
            .and_then(|s| s.parse().ok())
            .unwrap_or(600);

        Ok(Self {
            api_key,
            base_url: std::env::var("GEMINI_BASE_URL")
                .map(|u| u.trim_end_matches('/').to_string())
                .unwrap_or_else(|_| DEFAULT_BASE_URL.to_string()),
            model: std::env::var("GEMINI_MODEL").unwrap_or_else(|_| DEFAULT_MODEL.to_string()),
            fallback_models,
            timeout: Duration::from_secs(timeout_secs),
        })
    }

    /// Primary model followed by the fallbacks, without duplicates.
    fn models(&self) -> Vec<&str> {
        let mut models = vec![self.model.as_str()];
        for m in &self.fallback_models {
            if !models.contains(&m.as_str()) {
                models.push(m.as_str());
            }
        }
        models
    }
}

// =============================================================================
// Wire types
// =============================================================================

#[derive(Debug, Serialize)]
struct UploadStartRequest<'a> {
    file: UploadStartFile<'a>,
}

#[derive(Debug, Serialize)]
struct UploadStartFile<'a> {
    display_name: &'a str,
}

#[derive(Debug, Deserialize)]
struct UploadResponse {
    file: FileResource,
}

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
struct FileResource {
    name: String,
    #[serde(default)]
    uri: Option<String>,
    #[serde(default)]
    mime_type: Option<String>,
    #[serde(default)]
    state: Option<String>,
}

#[derive(Debug, Serialize)]
struct GenerateRequest<'a> {
    contents: Vec<Content<'a>>,
}

#[derive(Debug, Serialize)]
struct Content<'a> {
    parts: Vec<Part<'a>>,
}

#[derive(Debug, Serialize)]
#[serde(untagged)]
enum Part<'a> {
    File { file_data: FileData<'a> },
    Text { text: &'a str },
}

#[derive(Debug, Serialize)]
struct FileData<'a> {
    file_uri: &'a str,
    #[serde(skip_serializing_if = "Option::is_none")]
    mime_type: Option<&'a str>,
}

#[derive(Debug, Deserialize)]
struct GenerateResponse {
    #[serde(default)]
    candidates: Vec<Candidate>,
}

#[derive(Debug, Deserialize)]
struct Candidate {
    content: Option<ResponseContent>,
}

#[derive(Debug, Deserialize)]
struct ResponseContent {
    #[serde(default)]
    parts: Vec<ResponsePart>,
}

#[derive(Debug, Deserialize)]
struct ResponsePart {
    text: Option<String>,
}

impl GenerateResponse {
    /// Concatenated text of the first candidate.
    fn into_text(self) -> Option<String> {
        let content = self.candidates.into_iter().next()?.content?;
        let text: String = content.parts.into_iter().filter_map(|p| p.text).collect();
        if text.is_empty() {
            None
        } else {
            Some(text)
        }
    }
}

// =============================================================================
// Client
// =============================================================================

/// Gemini API client.
#[derive(Clone)]
pub struct GeminiClient {
    config: GeminiConfig,
    http: Client,
}

impl GeminiClient {
    /// Create a new Gemini client.
    pub fn new(config: GeminiConfig) -> ServiceResult<Self> {
        let http = Client::builder()
            .timeout(config.timeout)
            .connect_timeout(Duration::from_secs(10))
            .build()?;

        Ok(Self { config, http })
    }

    /// Create from environment variables.
    pub fn from_env() -> ServiceResult<Self> {
        Self::new(GeminiConfig::from_env()?)
    }

    fn resource_url(&self, name: &str) -> String {
        format!("{}/v1beta/{}", self.config.base_url, name)
    }

    async fn check(response: Response) -> ServiceResult<Response> {
        let status = response.status();
        if status.is_success() {
            return Ok(response);
        }
        let body = response.text().await.unwrap_or_default();
        Err(AnalysisError::api(status.as_u16(), body))
    }

    /// Call `generateContent` on one model.
    async fn generate_with_model(&self, model: &str, request: &GenerateRequest<'_>) -> ServiceResult<String> {
        let url = format!("{}/v1beta/models/{}:generateContent", self.config.base_url, model);

        let response = self
            .http
            .post(&url)
            .query(&[("key", &self.config.api_key)])
            .json(request)
            .send()
            .await?;

        let response: GenerateResponse = Self::check(response)
            .await?
            .json()
            .await
            .map_err(|e| AnalysisError::invalid_response(format!("Failed to parse Gemini response: {}", e)))?;

        response
            .into_text()
            .ok_or_else(|| AnalysisError::invalid_response("No content in Gemini response"))
    }
}

#[async_trait]
impl AnalysisService for GeminiClient {
    async fn upload(&self, path: &Path, mime_type: &str, display_name: &str) -> ServiceResult<AssetRef> {
        let size = tokio::fs::metadata(path).await?.len();

        info!(file = %path.display(), size_bytes = size, "Uploading video to Gemini");

        // Start a resumable session.
        let start = self
            .http
            .post(format!("{}/upload/v1beta/files", self.config.base_url))
            .query(&[("key", &self.config.api_key)])
            .header("X-Goog-Upload-Protocol", "resumable")
            .header("X-Goog-Upload-Command", "start")
            .header("X-Goog-Upload-Header-Content-Length", size.to_string())
            .header("X-Goog-Upload-Header-Content-Type", mime_type)
            .json(&UploadStartRequest {
                file: UploadStartFile { display_name },
            })
            .send()
            .await?;

        let start = Self::check(start).await?;
        let upload_url = start
            .headers()
            .get("x-goog-upload-url")
            .and_then(|v| v.to_str().ok())
            .map(String::from)
            .ok_or_else(|| AnalysisError::upload_failed("Upload session URL missing from response"))?;

        // Send the bytes and finalize in one request.
        let file = tokio::fs::File::open(path).await?;
        let response = self
            .http
            .post(&upload_url)
            .header(reqwest::header::CONTENT_LENGTH, size.to_string())
            .header("X-Goog-Upload-Offset", "0")
            .header("X-Goog-Upload-Command", "upload, finalize")
            .body(reqwest::Body::from(file))
            .send()
            .await?;

        let uploaded: UploadResponse = Self::check(response)
            .await?
            .json()
            .await
            .map_err(|e| AnalysisError::upload_failed(format!("Failed to parse upload response: {}", e)))?;

        let file = uploaded.file;
        let uri = file
            .uri
            .ok_or_else(|| AnalysisError::upload_failed("Uploaded file has no URI"))?;

        debug!(name = %file.name, uri = %uri, state = ?file.state, "Upload complete");

        Ok(AssetRef {
            name: file.name,
            uri,
            mime_type: file.mime_type.or_else(|| Some(mime_type.to_string())),
        })
    }

    async fn get_asset_state(&self, asset: &AssetRef) -> ServiceResult<AssetState> {
        let response = self
            .http
            .get(self.resource_url(&asset.name))
            .query(&[("key", &self.config.api_key)])
            .send()
            .await?;

        let file: FileResource = Self::check(response)
            .await?
            .json()
            .await
            .map_err(|e| AnalysisError::invalid_response(format!("Failed to parse file resource: {}", e)))?;

        // Resources that omit `state` are usable as-is.
        Ok(file.state.as_deref().map_or(AssetState::Active, AssetState::from_api))
    }

    async fn generate(&self, media: &MediaReference, prompt: &str) -> ServiceResult<String> {
        let file_data = match media {
            MediaReference::Asset(asset) => FileData {
                file_uri: &asset.uri,
                mime_type: asset.mime_type.as_deref(),
            },
            MediaReference::RemoteUrl(url) => FileData {
                file_uri: url,
                mime_type: None,
            },
        };

        let request = GenerateRequest {
            contents: vec![Content {
                parts: vec![Part::File { file_data }, Part::Text { text: prompt }],
            }],
        };

        let mut last_error = None;

        for model in self.config.models() {
            info!("Attempting Gemini API with model: {}", model);
            match self.generate_with_model(model, &request).await {
                Ok(text) => {
                    info!(model = %model, chars = text.len(), "Analysis generated");
                    return Ok(text);
                }
                Err(e) => {
                    warn!("Failed with model {}: {}", model, e);
                    last_error = Some(e);
                }
            }
        }

        Err(last_error.unwrap_or_else(|| AnalysisError::config_error("No Gemini model configured")))
    }

    async fn delete_asset(&self, asset: &AssetRef) -> ServiceResult<()> {
        let response = self
            .http
            .delete(self.resource_url(&asset.name))
            .query(&[("key", &self.config.api_key)])
            .send()
            .await?;

        Self::check(response).await?;
        debug!(name = %asset.name, "Gemini file deleted");
        Ok(())
    }
}
