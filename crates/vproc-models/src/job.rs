//! Job descriptors consumed from the processing queue.
//!
//! A queue message wraps one video record as written by the upload API:
//! `{"event": "video.created", "video": {...}}`. The record is kept in its raw
//! shape and only turned into a typed source once the worker decides which
//! pipeline branch to run.

use std::fmt;
use std::path::Path;

use serde::{Deserialize, Deserializer, Serialize};
use thiserror::Error;
use url::Url;

/// MIME type assumed when an uploaded object does not carry one.
pub const DEFAULT_MIME_TYPE: &str = "video/mp4";

/// Unique identifier for a video record, used as the idempotency key for
/// every status and result write.
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(transparent)]
pub struct JobId(pub String);

impl JobId {
    /// Create from an existing string.
    pub fn from_string(s: impl Into<String>) -> Self {
        Self(s.into())
    }

    /// Get the inner string.
    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl fmt::Display for JobId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.0)
    }
}

impl From<&str> for JobId {
    fn from(s: &str) -> Self {
        Self(s.to_string())
    }
}

/// Where a job's media lives.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum SourceKind {
    /// Uploaded to object storage, must be downloaded before analysis.
    #[serde(rename = "s3")]
    ObjectStore,
    /// Hosted on a video site, analysed by reference.
    #[serde(rename = "youtube")]
    RemoteUrl,
}

impl SourceKind {
    /// Wire representation used by the upload API.
    pub fn as_str(&self) -> &'static str {
        match self {
            SourceKind::ObjectStore => "s3",
            SourceKind::RemoteUrl => "youtube",
        }
    }

    /// Parse a wire value. Matching is case-insensitive and also accepts the
    /// descriptive aliases `object_store` and `remote_url`.
    pub fn parse(raw: &str) -> Option<Self> {
        match raw.trim().to_ascii_lowercase().as_str() {
            "s3" | "object_store" => Some(SourceKind::ObjectStore),
            "youtube" | "remote_url" => Some(SourceKind::RemoteUrl),
            _ => None,
        }
    }
}

impl fmt::Display for SourceKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Reasons a job descriptor cannot be processed.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum JobValidationError {
    #[error("Job has no id")]
    MissingId,

    #[error("Unknown source type: {0}")]
    UnknownSourceKind(String),

    #[error("No {0} provided")]
    MissingField(&'static str),

    #[error("Invalid file name: {0}")]
    InvalidFileName(String),

    #[error("Invalid source URL: {0}")]
    InvalidUrl(String),
}

/// Envelope published by the upload API.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct VideoMessage {
    /// Event name, e.g. `video.created`
    #[serde(default)]
    pub event: Option<String>,
    /// The video record to process
    pub video: VideoJob,
}

/// One queued unit of work, exactly as it arrived on the queue.
///
/// Fields not used by the worker (owner, pricing, description) are ignored
/// during deserialization. Informational metadata is read leniently: a value
/// of the wrong type becomes `None` instead of rejecting the message.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct VideoJob {
    /// Video record id
    #[serde(default)]
    pub id: Option<JobId>,
    /// Raw source type (`s3`, `youtube`, ...)
    #[serde(default)]
    pub source_type: Option<String>,

    /// Bucket holding the uploaded object
    #[serde(default)]
    pub bucket: Option<String>,
    /// Object key inside the bucket
    #[serde(default)]
    pub file_key: Option<String>,
    /// Original file name
    #[serde(default)]
    pub file_name: Option<String>,
    /// MIME type of the uploaded file
    #[serde(default)]
    pub file_type: Option<String>,
    /// Size reported by the uploader, in bytes
    #[serde(default, deserialize_with = "lenient_size")]
    pub file_size: Option<u64>,

    /// Remote video URL
    #[serde(default)]
    pub source_url: Option<String>,
    #[serde(default, deserialize_with = "lenient_text")]
    pub youtube_video_id: Option<String>,
    #[serde(default, deserialize_with = "lenient_text")]
    pub youtube_title: Option<String>,
    /// Duration as reported by the hosting site (number or string)
    #[serde(default)]
    pub youtube_duration: Option<serde_json::Value>,
    #[serde(default, deserialize_with = "lenient_text")]
    pub youtube_thumbnail_url: Option<String>,
}

/// Byte count from a number or a numeric string. Anything else is dropped.
fn lenient_size<'de, D>(deserializer: D) -> Result<Option<u64>, D::Error>
where
    D: Deserializer<'de>,
{
    let value = Option::<serde_json::Value>::deserialize(deserializer)?;
    Ok(match value {
        Some(serde_json::Value::Number(n)) => n
            .as_u64()
            .or_else(|| n.as_f64().filter(|f| f.is_finite() && *f >= 0.0).map(|f| f as u64)),
        Some(serde_json::Value::String(s)) => s.trim().parse().ok(),
        _ => None,
    })
}

/// Text from a string, or a scalar rendered as text. Anything else is dropped.
fn lenient_text<'de, D>(deserializer: D) -> Result<Option<String>, D::Error>
where
    D: Deserializer<'de>,
{
    let value = Option::<serde_json::Value>::deserialize(deserializer)?;
    Ok(match value {
        Some(serde_json::Value::String(s)) => Some(s),
        Some(serde_json::Value::Number(n)) => Some(n.to_string()),
        Some(serde_json::Value::Bool(b)) => Some(b.to_string()),
        _ => None,
    })
}

/// Validated fields of an object-store job.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ObjectStoreSource {
    pub bucket: String,
    pub object_key: String,
    /// Bare file name, guaranteed to contain no path separators.
    pub file_name: String,
    pub mime_type: String,
    /// Size reported by the uploader, if any
    pub expected_size: Option<u64>,
}

/// Validated fields of a remote-url job.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct RemoteUrlSource {
    pub url: String,
    pub video_id: Option<String>,
    pub title: Option<String>,
    pub duration: Option<String>,
    pub thumbnail_url: Option<String>,
}

impl VideoJob {
    /// Get the job id, failing when the record carries none.
    pub fn job_id(&self) -> Result<&JobId, JobValidationError> {
        match &self.id {
            Some(id) if !id.as_str().trim().is_empty() => Ok(id),
            _ => Err(JobValidationError::MissingId),
        }
    }

    /// Resolve the source kind of this job.
    pub fn source_kind(&self) -> Result<SourceKind, JobValidationError> {
        let raw = self.source_type.as_deref().unwrap_or_default();
        SourceKind::parse(raw).ok_or_else(|| JobValidationError::UnknownSourceKind(raw.to_string()))
    }

    /// Validate the object-store fields, filling defaults the upload API
    /// leaves out.
    pub fn object_store_source(
        &self,
        default_bucket: &str,
    ) -> Result<ObjectStoreSource, JobValidationError> {
        let object_key = non_empty(&self.file_key).ok_or(JobValidationError::MissingField("file_key"))?;

        let bucket = non_empty(&self.bucket)
            .or_else(|| Some(default_bucket.trim()).filter(|b| !b.is_empty()))
            .ok_or(JobValidationError::MissingField("bucket"))?;

        let raw_name = non_empty(&self.file_name).unwrap_or(object_key);
        let file_name = sanitize_file_name(raw_name)?;

        let mime_type = non_empty(&self.file_type).unwrap_or(DEFAULT_MIME_TYPE);

        Ok(ObjectStoreSource {
            bucket: bucket.to_string(),
            object_key: object_key.to_string(),
            file_name,
            mime_type: mime_type.to_string(),
            expected_size: self.file_size,
        })
    }

    /// Validate the remote-url fields.
    pub fn remote_url_source(&self) -> Result<RemoteUrlSource, JobValidationError> {
        let url = non_empty(&self.source_url).ok_or(JobValidationError::MissingField("source_url"))?;

        let parsed = Url::parse(url).map_err(|e| JobValidationError::InvalidUrl(format!("{}: {}", url, e)))?;
        if !matches!(parsed.scheme(), "http" | "https") {
            return Err(JobValidationError::InvalidUrl(format!(
                "{}: unsupported scheme {}",
                url,
                parsed.scheme()
            )));
        }

        let duration = self.youtube_duration.as_ref().and_then(|v| match v {
            serde_json::Value::Null => None,
            serde_json::Value::String(s) => Some(s.clone()),
            other => Some(other.to_string()),
        });

        Ok(RemoteUrlSource {
            url: url.to_string(),
            video_id: self.youtube_video_id.clone(),
            title: self.youtube_title.clone(),
            duration,
            thumbnail_url: self.youtube_thumbnail_url.clone(),
        })
    }
}

fn non_empty(value: &Option<String>) -> Option<&str> {
    value.as_deref().map(str::trim).filter(|s| !s.is_empty())
}

/// Reduce a client-supplied name to its final path component so it can be
/// joined under a per-job scratch directory.
fn sanitize_file_name(raw: &str) -> Result<String, JobValidationError> {
    let last = raw.rsplit(|c| c == '/' || c == '\\').next().unwrap_or_default().trim();
    if last.is_empty() || last == "." || last == ".." {
        return Err(JobValidationError::InvalidFileName(raw.to_string()));
    }
    // Path::file_name rejects anything that still looks like a traversal.
    match Path::new(last).file_name().and_then(|n| n.to_str()) {
        Some(name) if name == last => Ok(name.to_string()),
        _ => Err(JobValidationError::InvalidFileName(raw.to_string())),
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn s3_job() -> VideoJob {
        VideoJob {
            id: Some(JobId::from("vid-1")),
            source_type: Some("s3".into()),
            bucket: Some("uploads".into()),
            file_key: Some("users/u1/lesson.mp4".into()),
            file_name: Some("lesson.mp4".into()),
            file_type: Some("video/webm".into()),
            ..Default::default()
        }
    }

    #[test]
    fn test_parse_upload_api_message() {
        let body = r#"{
            "event": "video.created",
            "video": {
                "id": "0b7c",
                "user_id": "u1",
                "source_type": "youtube",
                "source_url": "https://www.youtube.com/watch?v=abc",
                "youtube_title": "Intro",
                "youtube_duration": 212,
                "price_per_access": 0.0
            }
        }"#;

        let msg: VideoMessage = serde_json::from_str(body).unwrap();
        assert_eq!(msg.event.as_deref(), Some("video.created"));
        assert_eq!(msg.video.job_id().unwrap().as_str(), "0b7c");
        assert_eq!(msg.video.source_kind().unwrap(), SourceKind::RemoteUrl);

        let source = msg.video.remote_url_source().unwrap();
        assert_eq!(source.duration.as_deref(), Some("212"));
        assert_eq!(source.title.as_deref(), Some("Intro"));
    }

    #[test]
    fn test_mistyped_metadata_does_not_reject_message() {
        let body = r#"{
            "video": {
                "id": "0b7d",
                "source_type": "s3",
                "bucket": "uploads",
                "file_key": "users/u1/demo.mp4",
                "file_size": {"bytes": 12},
                "youtube_video_id": ["abc"],
                "youtube_title": 2024,
                "youtube_thumbnail_url": null
            }
        }"#;

        let msg: VideoMessage = serde_json::from_str(body).unwrap();
        assert_eq!(msg.video.job_id().unwrap().as_str(), "0b7d");
        assert_eq!(msg.video.file_size, None);
        assert_eq!(msg.video.youtube_video_id, None);
        assert_eq!(msg.video.youtube_title.as_deref(), Some("2024"));
        assert_eq!(msg.video.youtube_thumbnail_url, None);
        assert!(msg.video.object_store_source("").is_ok());
    }

    #[test]
    fn test_file_size_accepts_numeric_string() {
        let job: VideoJob = serde_json::from_str(r#"{"id": "v", "file_size": " 12345 "}"#).unwrap();
        assert_eq!(job.file_size, Some(12345));

        let job: VideoJob = serde_json::from_str(r#"{"id": "v", "file_size": 2048}"#).unwrap();
        assert_eq!(job.file_size, Some(2048));

        let job: VideoJob = serde_json::from_str(r#"{"id": "v", "file_size": "large"}"#).unwrap();
        assert_eq!(job.file_size, None);
    }

    #[test]
    fn test_source_kind_parsing() {
        assert_eq!(SourceKind::parse("S3"), Some(SourceKind::ObjectStore));
        assert_eq!(SourceKind::parse("remote_url"), Some(SourceKind::RemoteUrl));
        assert_eq!(SourceKind::parse("url"), None);
        assert_eq!(SourceKind::parse(""), None);
    }

    #[test]
    fn test_unknown_source_kind() {
        let job = VideoJob {
            source_type: Some("vimeo".into()),
            ..s3_job()
        };
        assert_eq!(
            job.source_kind(),
            Err(JobValidationError::UnknownSourceKind("vimeo".into()))
        );

        let job = VideoJob {
            source_type: None,
            ..s3_job()
        };
        assert!(matches!(job.source_kind(), Err(JobValidationError::UnknownSourceKind(_))));
    }

    #[test]
    fn test_missing_id() {
        let job = VideoJob {
            id: Some(JobId::from("  ")),
            ..s3_job()
        };
        assert_eq!(job.job_id(), Err(JobValidationError::MissingId));
    }

    #[test]
    fn test_object_store_source() {
        let source = s3_job().object_store_source("fallback").unwrap();
        assert_eq!(source.bucket, "uploads");
        assert_eq!(source.object_key, "users/u1/lesson.mp4");
        assert_eq!(source.file_name, "lesson.mp4");
        assert_eq!(source.mime_type, "video/webm");
    }

    #[test]
    fn test_object_store_defaults() {
        let job = VideoJob {
            bucket: None,
            file_name: None,
            file_type: Some("".into()),
            ..s3_job()
        };
        let source = job.object_store_source("fallback").unwrap();
        assert_eq!(source.bucket, "fallback");
        assert_eq!(source.file_name, "lesson.mp4");
        assert_eq!(source.mime_type, DEFAULT_MIME_TYPE);
    }

    #[test]
    fn test_object_store_missing_key() {
        let job = VideoJob {
            file_key: None,
            ..s3_job()
        };
        assert_eq!(
            job.object_store_source("fallback"),
            Err(JobValidationError::MissingField("file_key"))
        );
    }

    #[test]
    fn test_file_name_is_confined() {
        let job = VideoJob {
            file_name: Some("../../etc/passwd".into()),
            ..s3_job()
        };
        assert_eq!(job.object_store_source("b").unwrap().file_name, "passwd");

        let job = VideoJob {
            file_name: Some("clips/..".into()),
            ..s3_job()
        };
        assert!(matches!(
            job.object_store_source("b"),
            Err(JobValidationError::InvalidFileName(_))
        ));
    }

    #[test]
    fn test_remote_url_validation() {
        let job = VideoJob {
            id: Some(JobId::from("v")),
            source_type: Some("youtube".into()),
            source_url: Some("".into()),
            ..Default::default()
        };
        assert_eq!(
            job.remote_url_source(),
            Err(JobValidationError::MissingField("source_url"))
        );

        let job = VideoJob {
            source_url: Some("ftp://example.com/video".into()),
            ..job
        };
        assert!(matches!(job.remote_url_source(), Err(JobValidationError::InvalidUrl(_))));
    }
}
