//! Supabase (PostgREST) status store client.
//!
//! Writes go to a single table keyed by the video id:
//! `PATCH {url}/rest/v1/{table}?id=eq.{id}`. PostgREST answers an update that
//! matched nothing with an empty array, which is reported as a failed write.

use std::time::{Duration, Instant};

use async_trait::async_trait;
use reqwest::{Client, StatusCode};
use serde::Deserialize;
use tracing::{debug, info_span, warn, Instrument};
use vproc_models::ProcessingStatus;

use crate::error::{StatusError, StatusResult};
use crate::metrics::record_request;
use crate::retry::{with_retry, StatusRetryConfig};
use crate::store::{result_patch, status_patch, StatusStore, STATUS_COLUMN};

// =============================================================================
// Configuration
// =============================================================================

/// Supabase client configuration.
#[derive(Debug, Clone)]
pub struct SupabaseConfig {
    /// Project URL, e.g. `https://xyz.supabase.co`
    pub url: String,
    /// Service role key (bypasses row level security)
    pub service_key: String,
    /// Table holding video records
    pub table: String,
    /// Request timeout
    pub timeout: Duration,
    /// Retry configuration
    pub retry: StatusRetryConfig,
}

impl SupabaseConfig {
    /// Create config from environment variables.
    pub fn from_env() -> StatusResult<Self> {
        let url = std::env::var("SUPABASE_URL")
            .or_else(|_| std::env::var("NEXT_PUBLIC_SUPABASE_URL"))
            .map_err(|_| StatusError::config_error("SUPABASE_URL or NEXT_PUBLIC_SUPABASE_URL must be set"))?;

        if url.trim().is_empty() {
            return Err(StatusError::config_error("SUPABASE_URL cannot be empty"));
        }

        let service_key = std::env::var("SUPABASE_SERVICE_ROLE_KEY")
            .map_err(|_| StatusError::config_error("SUPABASE_SERVICE_ROLE_KEY not set"))?;

        let timeout_secs: u64 = std::env::var("SUPABASE_TIMEOUT_SECS")
            .ok()
            .and_then(|s| s.parse().ok())
            .unwrap_or(30);

        Ok(Self {
            url: url.trim_end_matches('/').to_string(),
            service_key,
            table: std::env::var("SUPABASE_VIDEOS_TABLE").unwrap_or_else(|_| "videos".to_string()),
            timeout: Duration::from_secs(timeout_secs),
            retry: StatusRetryConfig::from_env(),
        })
    }
}

// =============================================================================
// Client
// =============================================================================

#[derive(Debug, Deserialize)]
struct StatusRow {
    processing_status: Option<String>,
}

/// Status store backed by the Supabase REST API.
#[derive(Clone)]
pub struct SupabaseStatusStore {
    http: Client,
    config: SupabaseConfig,
    table_url: String,
}

impl SupabaseStatusStore {
    /// Create a new client.
    pub fn new(config: SupabaseConfig) -> StatusResult<Self> {
        let http = Client::builder()
            .timeout(config.timeout)
            .connect_timeout(Duration::from_secs(5))
            .pool_idle_timeout(Duration::from_secs(90))
            .user_agent(concat!("vproc-status/", env!("CARGO_PKG_VERSION")))
            .build()
            .map_err(StatusError::Network)?;

        let table_url = format!("{}/rest/v1/{}", config.url, config.table);

        Ok(Self {
            http,
            config,
            table_url,
        })
    }

    /// Create from environment variables.
    pub fn from_env() -> StatusResult<Self> {
        Self::new(SupabaseConfig::from_env()?)
    }

    fn row_filter(job_id: &str) -> String {
        format!("eq.{}", urlencoding::encode(job_id))
    }

    /// PATCH the record and return how many rows were updated.
    async fn patch(
        &self,
        operation: &str,
        job_id: &str,
        body: &serde_json::Map<String, serde_json::Value>,
    ) -> StatusResult<usize> {
        let url = format!("{}?id={}", self.table_url, Self::row_filter(job_id));
        let url = url.as_str();

        self.execute_request(operation, job_id, async {
            with_retry(&self.config.retry, operation, || async move {
                let response = self
                    .http
                    .patch(url)
                    .header("apikey", &self.config.service_key)
                    .bearer_auth(&self.config.service_key)
                    .header("Prefer", "return=representation")
                    .json(body)
                    .send()
                    .await?;

                let status = response.status();
                if !status.is_success() {
                    return Err(Self::handle_error_response(status, response).await);
                }

                let rows: Vec<serde_json::Value> = response.json().await?;
                Ok(rows.len())
            })
            .await
        })
        .await
    }

    /// Read the current status column of a record.
    async fn fetch_status(&self, job_id: &str) -> StatusResult<Option<ProcessingStatus>> {
        let url = format!(
            "{}?id={}&select={}",
            self.table_url,
            Self::row_filter(job_id),
            STATUS_COLUMN
        );
        let url = url.as_str();

        self.execute_request("get_status", job_id, async {
            with_retry(&self.config.retry, "get_status", || async move {
                let response = self
                    .http
                    .get(url)
                    .header("apikey", &self.config.service_key)
                    .bearer_auth(&self.config.service_key)
                    .send()
                    .await?;

                let status = response.status();
                if !status.is_success() {
                    return Err(Self::handle_error_response(status, response).await);
                }

                let rows: Vec<StatusRow> = response.json().await?;
                let raw = rows.into_iter().next().and_then(|row| row.processing_status);

                match raw {
                    None => Ok(None),
                    Some(s) => s
                        .parse::<ProcessingStatus>()
                        .map(Some)
                        .map_err(|e| StatusError::InvalidResponse(e.to_string())),
                }
            })
            .await
        })
        .await
    }

    /// Execute a request with tracing and metrics.
    async fn execute_request<T, F>(&self, operation: &str, job_id: &str, fut: F) -> StatusResult<T>
    where
        F: std::future::Future<Output = StatusResult<T>>,
    {
        let span = info_span!("status_request", operation = %operation, table = %self.config.table, job_id = %job_id);

        let start = Instant::now();
        let result = fut.instrument(span).await;
        let latency_ms = start.elapsed().as_millis() as f64;

        let status = match &result {
            Ok(_) => 200,
            Err(e) => e.http_status().unwrap_or(500),
        };
        record_request(operation, status, latency_ms);

        result
    }

    async fn handle_error_response(status: StatusCode, response: reqwest::Response) -> StatusError {
        let body = response.text().await.unwrap_or_default();
        StatusError::from_http_status(status.as_u16(), body)
    }
}

#[async_trait]
impl StatusStore for SupabaseStatusStore {
    async fn set_status(
        &self,
        job_id: &str,
        status: ProcessingStatus,
        error_message: Option<&str>,
    ) -> bool {
        let body = status_patch(status, error_message);

        match self.patch("set_status", job_id, &body).await {
            Ok(0) => {
                warn!(job_id = %job_id, status = %status, "Status update matched no record");
                false
            }
            Ok(_) => {
                debug!(job_id = %job_id, status = %status, "Status updated");
                true
            }
            Err(e) => {
                warn!(job_id = %job_id, status = %status, "Failed to update status: {}", e);
                false
            }
        }
    }

    async fn save_result(&self, job_id: &str, analysis_text: &str, mark_processed: bool) -> bool {
        let body = result_patch(analysis_text, mark_processed);

        match self.patch("save_result", job_id, &body).await {
            Ok(0) => {
                warn!(job_id = %job_id, "Result save matched no record");
                false
            }
            Ok(_) => {
                debug!(job_id = %job_id, chars = analysis_text.len(), "Analysis result saved");
                true
            }
            Err(e) => {
                warn!(job_id = %job_id, "Failed to save analysis result: {}", e);
                false
            }
        }
    }

    async fn get_status(&self, job_id: &str) -> Option<ProcessingStatus> {
        match self.fetch_status(job_id).await {
            Ok(status) => status,
            Err(e) => {
                warn!(job_id = %job_id, "Failed to read status: {}", e);
                None
            }
        }
    }
}

// =============================================================================
// Tests
// =============================================================================
