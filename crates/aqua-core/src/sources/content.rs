//! Files stored in GitHub repositories, such as registries.

use tokio_util::sync::CancellationToken;
use tracing::debug;

use super::{Download, GitHubClient, HttpDownloader, SourceError};

const RAW_BASE_URL: &str = "https://raw.githubusercontent.com";

/// Which file to fetch.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct GitHubContentParam {
    /// Repository owner.
    pub repo_owner: String,
    /// Repository name.
    pub repo_name: String,
    /// Branch, tag or commit.
    pub git_ref: String,
    /// File path in the repository.
    pub path: String,
    /// Private repositories skip the unauthenticated raw endpoint.
    pub private: bool,
}

/// A fetched file: streamed from the raw endpoint, or inline from the
/// Contents API.
#[derive(Debug)]
pub enum ContentFile {
    /// Body streamed from the raw endpoint.
    Stream(Download),
    /// Decoded content from the Contents API.
    Inline(String),
}

impl ContentFile {
    /// The whole file as text.
    ///
    /// # Errors
    ///
    /// Returns stream errors, [`SourceError::Canceled`], or
    /// [`SourceError::InvalidResponse`] when the body is not UTF-8.
    pub async fn into_string(self, cancel: &CancellationToken) -> Result<String, SourceError> {
        match self {
            Self::Inline(s) => Ok(s),
            Self::Stream(dl) => {
                let bytes = dl.bytes(cancel).await?;
                String::from_utf8(bytes.to_vec())
                    .map_err(|e| SourceError::InvalidResponse(e.to_string()))
            }
        }
    }
}

/// Fetches files from GitHub repositories.
#[derive(Debug, Clone)]
pub struct GitHubContentDownloader {
    github: GitHubClient,
    http: HttpDownloader,
    raw_base_url: String,
}

impl GitHubContentDownloader {
    /// Downloader using the public raw endpoint.
    pub fn new(github: GitHubClient, http: HttpDownloader) -> Self {
        Self {
            github,
            http,
            raw_base_url: RAW_BASE_URL.to_string(),
        }
    }

    /// Use another raw endpoint.
    #[must_use]
    pub fn with_raw_base_url(mut self, url: &str) -> Self {
        self.raw_base_url = url.trim_end_matches('/').to_string();
        self
    }

    /// Fetch a file, trying `raw.githubusercontent.com` before the
    /// Contents API.
    ///
    /// # Errors
    ///
    /// Returns the Contents API error when both attempts fail.
    pub async fn download(
        &self,
        param: &GitHubContentParam,
        cancel: &CancellationToken,
    ) -> Result<ContentFile, SourceError> {
        if !param.private {
            let url = format!(
                "{}/{}/{}/{}/{}",
                self.raw_base_url, param.repo_owner, param.repo_name, param.git_ref, param.path
            );
            match self.http.download(&url, cancel).await {
                Ok(dl) => return Ok(ContentFile::Stream(dl)),
                Err(SourceError::Canceled) => return Err(SourceError::Canceled),
                Err(e) => debug!(error = %e, url, "fall back to the GitHub Contents API"),
            }
        }
        let body = self
            .github
            .get_contents(
                &param.repo_owner,
                &param.repo_name,
                &param.path,
                &param.git_ref,
                cancel,
            )
            .await?;
        Ok(ContentFile::Inline(body))
    }
}
