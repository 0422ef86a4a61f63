//! Usage-ingest HTTP client implementation.

use std::io::Write;
use std::time::Duration;

use flate2::write::GzEncoder;
use flate2::Compression;
use reqwest::header::{AUTHORIZATION, CONTENT_ENCODING, CONTENT_TYPE};
use reqwest::Client;
use serde::Serialize;

use crate::error::ClientError;
use crate::types::{
    ApiErrorResponse, ArchiveInput, BulkRequest, HealthStatus, IngestResponse, UsageEventInput,
};

/// Usage-ingest API client.
///
/// Submits bulk batches of usage events and archives.
#[derive(Debug, Clone)]
pub struct IngestClient {
    client: Client,
    base_url: String,
    token: String,
    compress: bool,
}

impl IngestClient {
    /// Create a new client.
    ///
    /// # Arguments
    ///
    /// * `base_url` - Base URL of the ingestion service (e.g., `"http://usage-ingest:8000"`)
    /// * `token` - Bearer token for authentication
    ///
    /// # Errors
    ///
    /// Returns `ClientError::Configuration` if the HTTP client cannot be built.
    pub fn new(base_url: impl Into<String>, token: impl Into<String>) -> Result<Self, ClientError> {
        Self::with_options(base_url, token, ClientOptions::default())
    }

    /// Create a new client with custom options.
    ///
    /// # Errors
    ///
    /// Returns `ClientError::Configuration` if the HTTP client cannot be built.
    pub fn with_options(
        base_url: impl Into<String>,
        token: impl Into<String>,
        options: ClientOptions,
    ) -> Result<Self, ClientError> {
        let client = Client::builder()
            .timeout(Duration::from_secs(options.timeout_seconds))
            .build()
            .map_err(|e| ClientError::Configuration(e.to_string()))?;

        Ok(Self {
            client,
            base_url: base_url.into().trim_end_matches('/').to_string(),
            token: token.into(),
            compress: options.compress,
        })
    }

    /// Submit a batch of usage events.
    ///
    /// # Errors
    ///
    /// Returns an error if the request fails or the server returns an error.
    pub async fn ingest_usage_events(
        &self,
        events: &[UsageEventInput],
    ) -> Result<IngestResponse, ClientError> {
        self.post_bulk("/ingest/requests:bulk", events).await
    }

    /// Submit a batch of message archives.
    ///
    /// # Errors
    ///
    /// Returns an error if the request fails or the server returns an error.
    pub async fn ingest_archives(
        &self,
        archives: &[ArchiveInput],
    ) -> Result<IngestResponse, ClientError> {
        self.post_bulk("/ingest/archives:bulk", archives).await
    }

    /// Query the service health probe.
    ///
    /// # Errors
    ///
    /// Returns an error if the request fails or the server returns an error.
    pub async fn health(&self) -> Result<HealthStatus, ClientError> {
        let url = format!("{}/healthz", self.base_url);
        let response = self.client.get(&url).send().await?;
        self.handle_response(response).await
    }

    async fn post_bulk<T: Serialize>(
        &self,
        path: &str,
        items: &[T],
    ) -> Result<IngestResponse, ClientError> {
        let url = format!("{}{path}", self.base_url);
        let json = serde_json::to_vec(&BulkRequest { items })?;

        let mut request = self
            .client
            .post(&url)
            .header(AUTHORIZATION, format!("Bearer {}", self.token))
            .header(CONTENT_TYPE, "application/json");

        let body = if self.compress {
            request = request.header(CONTENT_ENCODING, "gzip");
            gzip(&json)?
        } else {
            json
        };

        tracing::debug!(
            url = %url,
            items = items.len(),
            body_bytes = body.len(),
            compressed = self.compress,
            "Submitting bulk batch"
        );

        let response = request.body(body).send().await?;
        self.handle_response(response).await
    }

    /// Handle API response and convert errors.
    async fn handle_response<T: serde::de::DeserializeOwned>(
        &self,
        response: reqwest::Response,
    ) -> Result<T, ClientError> {
        let status = response.status();

        if status.is_success() {
            return Ok(response.json().await?);
        }

        // Try to parse error response
        let error_body: Result<ApiErrorResponse, _> = response.json().await;

        match error_body {
            Ok(api_error) => Err(ClientError::Api {
                code: api_error.error.code,
                message: api_error.error.message,
                status: status.as_u16(),
            }),
            Err(_) => Err(ClientError::Api {
                code: "unknown".to_string(),
                message: format!("HTTP {status}"),
                status: status.as_u16(),
            }),
        }
    }
}

fn gzip(data: &[u8]) -> Result<Vec<u8>, ClientError> {
    let mut encoder = GzEncoder::new(Vec::new(), Compression::default());
    encoder.write_all(data)?;
    Ok(encoder.finish()?)
}

/// Client options for customization.
#[derive(Debug, Clone)]
pub struct ClientOptions {
    /// Request timeout in seconds (default: 30).
    pub timeout_seconds: u64,
    /// gzip request bodies (default: true).
    pub compress: bool,
}

impl Default for ClientOptions {
    fn default() -> Self {
        Self {
            timeout_seconds: 30,
            compress: true,
        }
    }
}
