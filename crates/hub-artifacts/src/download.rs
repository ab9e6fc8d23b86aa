//! File downloads from a Hugging Face style model hub.

use futures_util::StreamExt;
use reqwest::StatusCode;
use std::path::{Path, PathBuf};
use tokio::fs::{self, File};
use tokio::io::AsyncWriteExt;

use crate::error::{AcquireError, Result};

/// Public Hugging Face hub
pub const DEFAULT_HUB_URL: &str = "https://huggingface.co";

/// Branch, tag or commit files are resolved against
pub const DEFAULT_REVISION: &str = "main";

/// Client for `<base>/<repo>/resolve/<revision>/<file>` downloads.
///
/// Cheap to clone; clones share the connection pool.
#[derive(Debug, Clone)]
pub struct HubClient {
    http: reqwest::Client,
    base_url: String,
    revision: String,
    token: Option<String>,
}

impl HubClient {
    pub fn new() -> Result<Self> {
        let http = reqwest::Client::builder()
            .redirect(reqwest::redirect::Policy::limited(10))
            .build()
            .map_err(|e| AcquireError::Hub(format!("Failed to build HTTP client: {}", e)))?;

        Ok(Self {
            http,
            base_url: DEFAULT_HUB_URL.to_string(),
            revision: DEFAULT_REVISION.to_string(),
            token: None,
        })
    }

    pub fn with_base_url(mut self, base_url: impl Into<String>) -> Self {
        self.base_url = base_url.into().trim_end_matches('/').to_string();
        self
    }

    pub fn with_revision(mut self, revision: impl Into<String>) -> Self {
        self.revision = revision.into();
        self
    }

    /// Bearer token for gated or private repositories
    pub fn with_token(mut self, token: Option<String>) -> Self {
        self.token = token;
        self
    }

    pub fn file_url(&self, repo: &str, file: &str) -> String {
        format!(
            "{}/{}/resolve/{}/{}",
            self.base_url, repo, self.revision, file
        )
    }

    /// Download `file` from `repo` to `dest`, overwriting any existing file.
    pub async fn fetch(&self, repo: &str, file: &str, dest: &Path) -> Result<PathBuf> {
        self.fetch_optional(repo, file, dest)
            .await?
            .ok_or_else(|| AcquireError::FileNotFound {
                repo: repo.to_string(),
                file: file.to_string(),
            })
    }

    /// Like `fetch`, but a file missing from the repository yields `Ok(None)`.
    ///
    /// The hub answers 401 rather than 404 for repositories that do not
    /// exist (or are private), so both count as missing.
    pub async fn fetch_optional(
        &self,
        repo: &str,
        file: &str,
        dest: &Path,
    ) -> Result<Option<PathBuf>> {
        let url = self.file_url(repo, file);
        tracing::info!("Downloading {}...", file);

        let mut request = self.http.get(&url);
        if let Some(token) = &self.token {
            request = request.bearer_auth(token);
        }

        let response = request
            .send()
            .await
            .map_err(|e| AcquireError::Hub(format!("GET {}: {}", url, e)))?;

        match response.status() {
            StatusCode::NOT_FOUND | StatusCode::UNAUTHORIZED => {
                tracing::debug!("{} not present in {}", file, repo);
                return Ok(None);
            }
            status if !status.is_success() => {
                return Err(AcquireError::Hub(format!(
                    "HTTP {} downloading {}",
                    status, url
                )));
            }
            _ => {}
        }

        write_body(response, dest).await?;
        Ok(Some(dest.to_path_buf()))
    }
}

/// Stream a response body to disk, logging progress for large files.
async fn write_body(response: reqwest::Response, dest: &Path) -> Result<()> {
    if let Some(parent) = dest.parent() {
        fs::create_dir_all(parent).await?;
    }

    let total_size = response.content_length();
    let mut stream = response.bytes_stream();

    let mut file = File::create(dest).await?;
    let mut downloaded: u64 = 0;

    while let Some(chunk) = stream.next().await {
        let chunk = chunk.map_err(|e| AcquireError::Hub(format!("Download interrupted: {}", e)))?;
        file.write_all(&chunk).await?;
        downloaded += chunk.len() as u64;

        // Log progress for large files
        if let Some(total) = total_size {
            if total > 1_000_000 && downloaded % 10_000_000 < chunk.len() as u64 {
                let percent = (downloaded as f64 / total as f64) * 100.0;
                tracing::info!("  Progress: {:.1}%", percent);
            }
        }
    }

    file.flush().await?;
    Ok(())
}
