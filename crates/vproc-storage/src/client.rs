//! S3 client implementation.

use std::path::Path;

use async_trait::async_trait;
use aws_config::BehaviorVersion;
use aws_credential_types::Credentials;
use aws_sdk_s3::error::DisplayErrorContext;
use aws_sdk_s3::Client;
use aws_types::region::Region;
use tokio::io::AsyncWriteExt;
use tracing::{debug, info, warn};

use crate::error::{StorageError, StorageResult};
use crate::store::ObjectStore;

/// Configuration for the S3 client.
#[derive(Debug, Clone)]
pub struct S3Config {
    /// AWS region
    pub region: String,
    /// Access key ID (default credential chain when absent)
    pub access_key_id: Option<String>,
    /// Secret access key
    pub secret_access_key: Option<String>,
    /// Custom endpoint for S3-compatible stores
    pub endpoint_url: Option<String>,
    /// Bucket used when a job does not name one
    pub default_bucket: String,
}

impl Default for S3Config {
    fn default() -> Self {
        Self {
            region: "us-east-1".to_string(),
            access_key_id: None,
            secret_access_key: None,
            endpoint_url: None,
            default_bucket: "watchlearn1".to_string(),
        }
    }
}

impl S3Config {
    /// Create config from environment variables.
    pub fn from_env() -> StorageResult<Self> {
        let access_key_id = std::env::var("AWS_ACCESS_KEY_ID").ok().filter(|s| !s.is_empty());
        let secret_access_key = std::env::var("AWS_SECRET_ACCESS_KEY").ok().filter(|s| !s.is_empty());

        if access_key_id.is_some() != secret_access_key.is_some() {
            return Err(StorageError::config_error(
                "AWS_ACCESS_KEY_ID and AWS_SECRET_ACCESS_KEY must be set together",
            ));
        }

        Ok(Self {
            region: std::env::var("AWS_REGION").unwrap_or_else(|_| "us-east-1".to_string()),
            access_key_id,
            secret_access_key,
            endpoint_url: std::env::var("AWS_ENDPOINT_URL").ok().filter(|s| !s.is_empty()),
            default_bucket: std::env::var("AWS_S3_BUCKET").unwrap_or_else(|_| "watchlearn1".to_string()),
        })
    }
}

/// S3 object store client.
#[derive(Clone)]
pub struct S3Client {
    client: Client,
    default_bucket: String,
}

impl S3Client {
    /// Create a new S3 client from configuration.
    pub async fn new(config: S3Config) -> StorageResult<Self> {
        let mut loader = aws_config::defaults(BehaviorVersion::latest()).region(Region::new(config.region.clone()));

        if let (Some(key), Some(secret)) = (&config.access_key_id, &config.secret_access_key) {
            loader = loader.credentials_provider(Credentials::new(key, secret, None, None, "env"));
        }
        if let Some(endpoint) = &config.endpoint_url {
            loader = loader.endpoint_url(endpoint);
        }

        let shared = loader.load().await;
        let s3_config = aws_sdk_s3::config::Builder::from(&shared)
            .force_path_style(config.endpoint_url.is_some())
            .build();

        Ok(Self {
            client: Client::from_conf(s3_config),
            default_bucket: config.default_bucket,
        })
    }

    /// Create from environment variables.
    pub async fn from_env() -> StorageResult<Self> {
        let config = S3Config::from_env()?;
        Self::new(config).await
    }

    /// Bucket used when a job does not name one.
    pub fn default_bucket(&self) -> &str {
        &self.default_bucket
    }

    /// Stream an object body into `destination`.
    async fn stream_to_file(&self, bucket: &str, key: &str, destination: &Path) -> StorageResult<u64> {
        let response = self
            .client
            .get_object()
            .bucket(bucket)
            .key(key)
            .send()
            .await
            .map_err(|e| {
                let no_such_key = e.as_service_error().is_some_and(|se| se.is_no_such_key());
                if no_such_key {
                    StorageError::not_found(format!("s3://{}/{}", bucket, key))
                } else {
                    StorageError::download_failed(DisplayErrorContext(&e).to_string())
                }
            })?;

        let mut body = response.body;
        let mut file = tokio::fs::File::create(destination).await?;
        let mut written: u64 = 0;

        while let Some(chunk) = body
            .try_next()
            .await
            .map_err(|e| StorageError::download_failed(format!("Failed to read object body: {}", e)))?
        {
            file.write_all(&chunk).await?;
            written += chunk.len() as u64;
        }

        file.flush().await?;
        Ok(written)
    }
}

#[async_trait]
impl ObjectStore for S3Client {
    async fn download(&self, bucket: &str, key: &str, destination: &Path) -> StorageResult<u64> {
        debug!("Downloading s3://{}/{} to {}", bucket, key, destination.display());

        if let Some(parent) = destination.parent() {
            tokio::fs::create_dir_all(parent).await.map_err(|e| {
                StorageError::download_failed(format!("Failed to create directory: {}", e))
            })?;
        }

        match self.stream_to_file(bucket, key, destination).await {
            Ok(bytes) => {
                info!("Downloaded s3://{}/{} ({} bytes)", bucket, key, bytes);
                Ok(bytes)
            }
            Err(e) => {
                // Never leave a truncated file behind for the caller to mistake for a download.
                if let Err(rm) = tokio::fs::remove_file(destination).await {
                    if rm.kind() != std::io::ErrorKind::NotFound {
                        warn!("Failed to remove partial download {}: {}", destination.display(), rm);
                    }
                }
                Err(e)
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serial_test::serial;
    use tokio_test::assert_ok;
    use wiremock::matchers::{method, path};
    use wiremock::{Mock, MockServer, ResponseTemplate};

    async fn local_client(server: &MockServer) -> S3Client {
        S3Client::new(S3Config {
            region: "us-east-1".to_string(),
            access_key_id: Some("test-key".to_string()),
            secret_access_key: Some("test-secret".to_string()),
            endpoint_url: Some(server.uri()),
            default_bucket: "uploads".to_string(),
        })
        .await
        .unwrap()
    }

    #[test]
    fn test_config_defaults() {
        let config = S3Config::default();
        assert_eq!(config.region, "us-east-1");
        assert_eq!(config.default_bucket, "watchlearn1");
        assert!(config.endpoint_url.is_none());
    }

    #[test]
    #[serial]
    fn test_config_rejects_half_credentials() {
        std::env::set_var("AWS_ACCESS_KEY_ID", "AKIA");
        std::env::remove_var("AWS_SECRET_ACCESS_KEY");
        let result = S3Config::from_env();
        std::env::remove_var("AWS_ACCESS_KEY_ID");
        assert!(matches!(result, Err(StorageError::ConfigError(_))));
    }

    #[test]
    #[serial]
    fn test_config_from_env() {
        std::env::remove_var("AWS_ACCESS_KEY_ID");
        std::env::remove_var("AWS_SECRET_ACCESS_KEY");
        std::env::set_var("AWS_S3_BUCKET", "lessons");
        std::env::set_var("AWS_REGION", "eu-west-1");
        let config = assert_ok!(S3Config::from_env());
        std::env::remove_var("AWS_S3_BUCKET");
        std::env::remove_var("AWS_REGION");

        assert_eq!(config.default_bucket, "lessons");
        assert_eq!(config.region, "eu-west-1");
        assert!(config.access_key_id.is_none());
    }

    #[tokio::test]
    #[serial]
    async fn test_download_streams_object_into_nested_path() {
        let server = MockServer::start().await;
        let body = vec![7u8; 64 * 1024];
        Mock::given(method("GET"))
            .and(path("/uploads/users/u1/lesson.mp4"))
            .respond_with(
                ResponseTemplate::new(200)
                    .insert_header("content-type", "video/mp4")
                    .set_body_bytes(body.clone()),
            )
            .expect(1)
            .mount(&server)
            .await;

        let dir = tempfile::tempdir().unwrap();
        let destination = dir.path().join("vid-1").join("lesson.mp4");
        let client = local_client(&server).await;

        let bytes = assert_ok!(client.download("uploads", "users/u1/lesson.mp4", &destination).await);
        assert_eq!(bytes, body.len() as u64);
        assert_eq!(tokio::fs::read(&destination).await.unwrap(), body);
    }

    #[tokio::test]
    #[serial]
    async fn test_missing_object_is_not_found_and_leaves_no_file() {
        let server = MockServer::start().await;
        Mock::given(method("GET"))
            .and(path("/uploads/gone.mp4"))
            .respond_with(
                ResponseTemplate::new(404)
                    .insert_header("content-type", "application/xml")
                    .set_body_string(
                        "<?xml version=\"1.0\" encoding=\"UTF-8\"?>\
                         <Error><Code>NoSuchKey</Code>\
                         <Message>The specified key does not exist.</Message>\
                         <Key>gone.mp4</Key><RequestId>req-1</RequestId></Error>",
                    ),
            )
            .mount(&server)
            .await;

        let dir = tempfile::tempdir().unwrap();
        let destination = dir.path().join("gone.mp4");
        tokio::fs::write(&destination, b"stale").await.unwrap();
        let client = local_client(&server).await;

        let result = client.download("uploads", "gone.mp4", &destination).await;
        assert!(matches!(result, Err(StorageError::NotFound(_))), "{:?}", result);
        assert!(!destination.exists());
    }
}
