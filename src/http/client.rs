//! HTTP client with built-in retry logic and error handling.

use anyhow::{Context, Result};
use log::{debug, warn};
use reqwest::{Client, Response};
use serde::de::DeserializeOwned;
use std::io::Write;

use super::retry::{MAX_RETRIES, NonRetryableError, RETRY_DELAY_MS, classify_status};

/// Outcome of a completed download.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct DownloadStats {
    /// Bytes actually written.
    pub bytes: u64,
    /// Size announced by the server, if any.
    pub content_length: Option<u64>,
}

/// HTTP client with built-in retry logic for network operations.
#[derive(Clone)]
pub struct HttpClient {
    client: Client,
}

impl HttpClient {
    /// Creates a new HTTP client wrapping the given reqwest Client.
    pub fn new(client: Client) -> Self {
        Self { client }
    }

    /// Performs a GET request and deserializes the JSON response.
    /// Automatically retries on transient errors.
    #[tracing::instrument(skip(self))]
    pub async fn get_json<T: DeserializeOwned>(&self, url: &str) -> Result<T> {
        self.get_json_with_query(url, &[]).await
    }

    /// Performs a GET request with query parameters and deserializes the JSON response.
    /// Automatically retries on transient errors.
    #[tracing::instrument(skip(self, query))]
    pub async fn get_json_with_query<T: DeserializeOwned>(
        &self,
        url: &str,
        query: &[(&str, &str)],
    ) -> Result<T> {
        debug!("GET JSON from {}...", url);

        self.with_retry("GET JSON", || async {
            let response = self
                .client
                .get(url)
                .query(query)
                .send()
                .await
                .context("Failed to send request")?;

            let response = check_status(response).await?;

            response
                .json::<T>()
                .await
                .context("Failed to parse JSON response")
        })
        .await
    }

    /// POSTs a form and deserializes the JSON response.
    ///
    /// Client errors surface as [`NonRetryableError`] carrying the `message`
    /// field of the error body when the server sends one.
    #[tracing::instrument(skip(self, query, form))]
    pub async fn post_form_json<T: DeserializeOwned>(
        &self,
        url: &str,
        query: &[(&str, &str)],
        form: &[(&str, &str)],
    ) -> Result<T> {
        debug!("POST form to {}...", url);

        self.with_retry("POST form", || async {
            let response = self
                .client
                .post(url)
                .query(query)
                .form(form)
                .send()
                .await
                .context("Failed to send request")?;

            let response = check_status(response).await?;

            response
                .json::<T>()
                .await
                .context("Failed to parse JSON response")
        })
        .await
    }

    /// Downloads a URL through a writer created per attempt.
    /// Automatically retries on transient errors.
    /// Uses a writer function to allow for custom file creation (e.g., via Runtime).
    #[tracing::instrument(skip(self, query, create_writer))]
    pub async fn download_file<W, F>(
        &self,
        url: &str,
        query: &[(&str, &str)],
        create_writer: F,
    ) -> Result<DownloadStats>
    where
        W: Write,
        F: Fn() -> Result<W>,
    {
        debug!("Downloading file from {}...", url);

        self.with_retry("Download", || self.download_file_once(url, query, &create_writer))
            .await
    }

    /// Single download attempt without retry.
    async fn download_file_once<W, F>(
        &self,
        url: &str,
        query: &[(&str, &str)],
        create_writer: &F,
    ) -> Result<DownloadStats>
    where
        W: Write,
        F: Fn() -> Result<W>,
    {
        let response = self
            .client
            .get(url)
            .query(query)
            .send()
            .await
            .context("Failed to start download request")?;

        let mut response = check_status(response).await?;
        let content_length = response.content_length();

        let mut writer = create_writer()?;
        let mut downloaded_bytes: u64 = 0;

        while let Some(chunk) = response
            .chunk()
            .await
            .context("Failed to read chunk from download stream")?
        {
            writer
                .write_all(&chunk)
                .context("Failed to write chunk to file")?;
            downloaded_bytes += chunk.len() as u64;
        }
        writer.flush().context("Failed to flush download")?;

        debug!(
            "Downloaded {:.2} MB",
            downloaded_bytes as f64 / (1024.0 * 1024.0)
        );

        Ok(DownloadStats {
            bytes: downloaded_bytes,
            content_length,
        })
    }

    /// Executes an async operation with retry logic.
    async fn with_retry<F, Fut, T>(&self, operation_name: &str, operation: F) -> Result<T>
    where
        F: Fn() -> Fut,
        Fut: std::future::Future<Output = Result<T>>,
    {
        let mut last_error = None;

        for attempt in 1..=MAX_RETRIES {
            match operation().await {
                Ok(result) => return Ok(result),
                Err(e) => {
                    if !is_retryable_error(&e) {
                        debug!("{}: non-retryable error: {}", operation_name, e);
                        return Err(e);
                    }

                    if attempt < MAX_RETRIES {
                        warn!(
                            "{}: attempt {}/{} failed ({}), retrying in {}ms...",
                            operation_name, attempt, MAX_RETRIES, e, RETRY_DELAY_MS
                        );
                        tokio::time::sleep(std::time::Duration::from_millis(RETRY_DELAY_MS)).await;
                    }
                    last_error = Some(e);
                }
            }
        }

        Err(last_error.unwrap_or_else(|| {
            anyhow::anyhow!("{}: failed after {} attempts", operation_name, MAX_RETRIES)
        }))
    }
}

#[derive(serde::Deserialize)]
struct ErrorBody {
    message: Option<String>,
}

/// Turns client-error statuses into [`NonRetryableError`], keeping the
/// server's `message` when the body is JSON.
async fn check_status(response: Response) -> Result<Response> {
    let status = response.status();
    if status.is_success() {
        return Ok(response);
    }
    if status.is_client_error() {
        let body = response.text().await.unwrap_or_default();
        let message = serde_json::from_str::<ErrorBody>(&body)
            .ok()
            .and_then(|b| b.message);
        if let Err(non_retryable) = classify_status(status, message) {
            return Err(non_retryable.into());
        }
    }
    Err(anyhow::anyhow!("HTTP {} from server", status))
}

/// Checks if an anyhow::Error is retryable based on its content.
fn is_retryable_error(e: &anyhow::Error) -> bool {
    e.downcast_ref::<NonRetryableError>().is_none()
}
