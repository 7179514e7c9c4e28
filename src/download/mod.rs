use crate::auth::Credentials;
use crate::http::{DownloadStats, HttpClient};
use crate::runtime::Runtime;
use anyhow::{Context, Result};
use async_trait::async_trait;
use log::info;
#[cfg(test)]
use mockall::automock;
use std::path::Path;
use std::sync::Arc;

/// Fetches a release file from the catalog into a local path.
#[cfg_attr(test, automock)]
#[async_trait]
pub trait Downloader: Send + Sync {
    /// Download `url` to `dest`, authenticating with `credentials`.
    ///
    /// An expired token surfaces as `NonRetryableError::Forbidden`.
    async fn download(
        &self,
        url: &str,
        credentials: &Credentials,
        dest: &Path,
    ) -> Result<DownloadStats>;
}

/// Downloads over HTTP, writing through the runtime.
pub struct HttpDownloader<R: Runtime> {
    runtime: Arc<R>,
    http_client: HttpClient,
}

impl<R: Runtime> HttpDownloader<R> {
    pub fn new(runtime: Arc<R>, http_client: HttpClient) -> Self {
        Self {
            runtime,
            http_client,
        }
    }
}

#[async_trait]
impl<R: Runtime + 'static> Downloader for HttpDownloader<R> {
    #[tracing::instrument(skip(self, credentials, dest))]
    async fn download(
        &self,
        url: &str,
        credentials: &Credentials,
        dest: &Path,
    ) -> Result<DownloadStats> {
        info!("Downloading {}...", url);

        let dest = dest.to_path_buf();
        let stats = self
            .http_client
            .download_file(
                url,
                &[
                    ("username", credentials.username.as_str()),
                    ("token", credentials.token.as_str()),
                ],
                || {
                    self.runtime
                        .create_file(&dest)
                        .with_context(|| format!("Failed to create temporary file at {:?}", dest))
                },
            )
            .await?;

        info!("Download complete ({} bytes).", stats.bytes);
        Ok(stats)
    }
}
