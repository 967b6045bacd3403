//! Remote services aqua reads from: the GitHub API, crates.io and plain
//! HTTP.
//!
//! Every call takes a [`CancellationToken`]. It is checked before each
//! request and while a request or retry delay is pending; a canceled call
//! returns [`SourceError::Canceled`] and no partial result.

mod cargo;
mod content;
mod github;
mod http;

use reqwest::header::{HeaderMap, LINK};
use reqwest::{Client, Response, StatusCode};
use thiserror::Error;
use tokio_util::sync::CancellationToken;
use tracing::warn;

pub use cargo::{CargoSource, CratesIoClient, CrateInfo};
pub use content::{ContentFile, GitHubContentDownloader, GitHubContentParam};
pub use github::{
    GitHubClient, GitHubSource, ListOptions, Page, Release, ReleaseAsset, Repository, Tag,
};
pub use http::{Download, HttpDownloader};

#[cfg(test)]
pub use cargo::MockCargoSource;
#[cfg(test)]
pub use github::MockGitHubSource;

/// Errors from remote sources.
#[derive(Error, Debug)]
pub enum SourceError {
    /// The request failed before a response arrived.
    #[error("Network error: {0}")]
    Network(#[from] reqwest::Error),

    /// The API rate limit is exhausted.
    #[error("Rate limited: retry after {retry_after_secs:?} seconds")]
    RateLimited {
        /// From `Retry-After`, when sent.
        retry_after_secs: Option<u64>,
    },

    /// The resource does not exist.
    #[error("Not found: {0}")]
    NotFound(String),

    /// An unexpected HTTP status.
    #[error("HTTP status code {status}: {url}")]
    Status {
        /// Requested URL.
        url: String,
        /// Response status.
        status: u16,
    },

    /// The response body could not be decoded.
    #[error("Invalid response: {0}")]
    InvalidResponse(String),

    /// The call was canceled.
    #[error("Canceled")]
    Canceled,
}

/// HTTP client shared by every source.
///
/// # Errors
///
/// Returns the builder error when the TLS backend cannot be initialised.
pub fn http_client() -> Result<Client, reqwest::Error> {
    Client::builder().user_agent(crate::USER_AGENT).build()
}

/// `AQUA_GITHUB_TOKEN`, else `GITHUB_TOKEN`.
pub fn github_token_from_env() -> Option<String> {
    ["AQUA_GITHUB_TOKEN", "GITHUB_TOKEN"]
        .into_iter()
        .filter_map(|k| std::env::var(k).ok())
        .find(|t| !t.is_empty())
}

pub(crate) fn ensure_not_canceled(cancel: &CancellationToken) -> Result<(), SourceError> {
    if cancel.is_cancelled() {
        return Err(SourceError::Canceled);
    }
    Ok(())
}

/// Send `req`, giving up as soon as `cancel` fires.
pub(crate) async fn send(
    req: reqwest::RequestBuilder,
    cancel: &CancellationToken,
) -> Result<Response, SourceError> {
    ensure_not_canceled(cancel)?;
    tokio::select! {
        biased;
        () = cancel.cancelled() => Err(SourceError::Canceled),
        resp = req.send() => Ok(resp?),
    }
}

/// Map error statuses of a JSON API response.
pub(crate) fn check_status(resp: Response, what: &str) -> Result<Response, SourceError> {
    let status = resp.status();
    if status.is_success() {
        return Ok(resp);
    }
    if status == StatusCode::NOT_FOUND {
        return Err(SourceError::NotFound(what.to_string()));
    }
    let exhausted = resp
        .headers()
        .get("x-ratelimit-remaining")
        .is_some_and(|v| v == "0");
    if status == StatusCode::TOO_MANY_REQUESTS || (status == StatusCode::FORBIDDEN && exhausted) {
        let retry_after = resp
            .headers()
            .get("retry-after")
            .and_then(|v| v.to_str().ok())
            .and_then(|v| v.parse().ok());
        return Err(SourceError::RateLimited {
            retry_after_secs: retry_after,
        });
    }
    warn!(status = status.as_u16(), url = %resp.url(), "API returned an error status");
    Err(SourceError::Status {
        url: resp.url().to_string(),
        status: status.as_u16(),
    })
}

/// Page number of the `rel="next"` entry of a `Link` header.
pub(crate) fn next_page(headers: &HeaderMap) -> Option<u32> {
    let link = headers.get(LINK)?.to_str().ok()?;
    link.split(',').find_map(|entry| {
        let (target, params) = entry.split_once(';')?;
        if !params.split(';').any(|p| p.trim() == r#"rel="next""#) {
            return None;
        }
        let url = reqwest::Url::parse(target.trim().trim_start_matches('<').trim_end_matches('>'))
            .ok()?;
        url.query_pairs()
            .find(|(k, _)| k == "page")
            .and_then(|(_, v)| v.parse().ok())
    })
}

#[cfg(test)]
mod tests {
    use super::*;
    use reqwest::header::HeaderValue;

    #[test]
    fn test_next_page_from_link_header() {
        let mut headers = HeaderMap::new();
        headers.insert(
            LINK,
            HeaderValue::from_static(
                r#"<https://api.github.com/repos/o/r/releases?per_page=100&page=3>; rel="next", <https://api.github.com/repos/o/r/releases?per_page=100&page=9>; rel="last""#,
            ),
        );
        assert_eq!(next_page(&headers), Some(3));
    }

    #[test]
    fn test_no_next_page() {
        let mut headers = HeaderMap::new();
        assert_eq!(next_page(&headers), None);
        headers.insert(
            LINK,
            HeaderValue::from_static(
                r#"<https://api.github.com/repos/o/r/releases?page=1>; rel="prev", <https://api.github.com/repos/o/r/releases?page=1>; rel="first""#,
            ),
        );
        assert_eq!(next_page(&headers), None);
    }

    #[test]
    fn test_canceled_token() {
        let cancel = CancellationToken::new();
        assert!(ensure_not_canceled(&cancel).is_ok());
        cancel.cancel();
        assert!(matches!(
            ensure_not_canceled(&cancel),
            Err(SourceError::Canceled)
        ));
    }
}
