//! GitHub REST API.

#[cfg(test)]
use mockall::automock;

use base64::Engine;
use base64::engine::general_purpose::STANDARD;
use reqwest::Client;
use serde::Deserialize;
use tokio_util::sync::CancellationToken;
use tracing::warn;

use super::{SourceError, check_status, next_page, send};

/// Default base URL for GitHub API
const DEFAULT_BASE_URL: &str = "https://api.github.com";

/// A GitHub release.
#[derive(Debug, Clone, Default, PartialEq, Eq, Deserialize)]
pub struct Release {
    /// Release id, used to page through its assets.
    #[serde(default)]
    pub id: u64,
    /// Git tag of the release.
    pub tag_name: String,
    /// Title.
    #[serde(default)]
    pub name: Option<String>,
    /// Release notes.
    #[serde(default)]
    pub body: Option<String>,
    /// Release page.
    #[serde(default)]
    pub html_url: String,
    /// Marked as a pre-release.
    #[serde(default)]
    pub prerelease: bool,
    /// Assets can no longer change.
    #[serde(default)]
    pub immutable: bool,
    /// Attached files. The API returns at most one page here.
    #[serde(default)]
    pub assets: Vec<ReleaseAsset>,
}

/// A file attached to a release.
#[derive(Debug, Clone, Default, PartialEq, Eq, Deserialize)]
pub struct ReleaseAsset {
    /// File name.
    pub name: String,
    /// Direct download URL.
    #[serde(default)]
    pub browser_download_url: String,
}

/// A git tag.
#[derive(Debug, Clone, Default, PartialEq, Eq, Deserialize)]
pub struct Tag {
    /// Tag name.
    pub name: String,
}

/// Repository metadata.
#[derive(Debug, Clone, Default, PartialEq, Eq, Deserialize)]
pub struct Repository {
    /// Short description.
    #[serde(default)]
    pub description: Option<String>,
}

/// `page` is 1-based.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct ListOptions {
    /// Page to fetch.
    pub page: u32,
    /// Items per page.
    pub per_page: u32,
}

impl ListOptions {
    /// The first page.
    pub fn first(per_page: u32) -> Self {
        Self { page: 1, per_page }
    }
}

/// One page of a list endpoint.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Page<T> {
    /// Items on this page.
    pub items: Vec<T>,
    /// `None` when this is the last page.
    pub next_page: Option<u32>,
}

/// Read access to the releases and tags of a repository.
#[cfg_attr(test, automock)]
#[async_trait::async_trait]
pub trait GitHubSource: Send + Sync {
    /// The latest non-draft, non-prerelease release.
    async fn get_latest_release(
        &self,
        owner: &str,
        repo: &str,
        cancel: &CancellationToken,
    ) -> Result<Release, SourceError>;

    /// The release for `tag`.
    async fn get_release_by_tag(
        &self,
        owner: &str,
        repo: &str,
        tag: &str,
        cancel: &CancellationToken,
    ) -> Result<Release, SourceError>;

    /// Releases, newest first.
    async fn list_releases(
        &self,
        owner: &str,
        repo: &str,
        opts: ListOptions,
        cancel: &CancellationToken,
    ) -> Result<Page<Release>, SourceError>;

    /// Assets of release `release_id`.
    async fn list_release_assets(
        &self,
        owner: &str,
        repo: &str,
        release_id: u64,
        opts: ListOptions,
        cancel: &CancellationToken,
    ) -> Result<Page<ReleaseAsset>, SourceError>;

    /// Tags, newest first.
    async fn list_tags(
        &self,
        owner: &str,
        repo: &str,
        opts: ListOptions,
        cancel: &CancellationToken,
    ) -> Result<Page<Tag>, SourceError>;

    /// Repository metadata.
    async fn get_repository(
        &self,
        owner: &str,
        repo: &str,
        cancel: &CancellationToken,
    ) -> Result<Repository, SourceError>;
}

#[derive(Debug, Deserialize)]
struct ContentResponse {
    #[serde(rename = "type")]
    content_type: String,
    #[serde(default)]
    content: String,
}

/// [`GitHubSource`] over the REST API.
#[derive(Debug, Clone)]
pub struct GitHubClient {
    client: Client,
    base_url: String,
    token: Option<String>,
}

impl GitHubClient {
    /// Creates a new `GitHubClient` with a custom base URL
    pub fn new(client: Client, base_url: &str) -> Self {
        Self {
            client,
            base_url: base_url.trim_end_matches('/').to_string(),
            token: None,
        }
    }

    /// `api.github.com`, authenticated with `token` when present.
    pub fn github_com(client: Client, token: Option<String>) -> Self {
        Self::new(client, DEFAULT_BASE_URL).with_token(token)
    }

    /// Authenticate with `token`. An empty token is ignored.
    #[must_use]
    pub fn with_token(mut self, token: Option<String>) -> Self {
        self.token = token.filter(|t| !t.is_empty());
        self
    }

    fn request(&self, path: &str) -> reqwest::RequestBuilder {
        let req = self
            .client
            .get(format!("{}{path}", self.base_url))
            .header("Accept", "application/vnd.github+json");
        match &self.token {
            Some(token) => req.bearer_auth(token),
            None => req,
        }
    }

    async fn get_json<T: serde::de::DeserializeOwned>(
        &self,
        req: reqwest::RequestBuilder,
        what: &str,
        cancel: &CancellationToken,
    ) -> Result<(T, Option<u32>), SourceError> {
        let resp = check_status(send(req, cancel).await?, what)?;
        let next = next_page(resp.headers());
        let body = resp.json().await.map_err(|e| {
            warn!(error = %e, "failed to parse a GitHub API response");
            SourceError::InvalidResponse(e.to_string())
        })?;
        Ok((body, next))
    }

    async fn list<T: serde::de::DeserializeOwned>(
        &self,
        path: &str,
        what: &str,
        opts: ListOptions,
        cancel: &CancellationToken,
    ) -> Result<Page<T>, SourceError> {
        let req = self
            .request(path)
            .query(&[("per_page", opts.per_page), ("page", opts.page)]);
        let (items, next_page) = self.get_json(req, what, cancel).await?;
        Ok(Page { items, next_page })
    }

    /// Content of a file through the Contents API, decoded.
    ///
    /// # Errors
    ///
    /// Returns [`SourceError::InvalidResponse`] when `path` is not a file
    /// or its content is not valid base64 UTF-8.
    pub async fn get_contents(
        &self,
        owner: &str,
        repo: &str,
        path: &str,
        git_ref: &str,
        cancel: &CancellationToken,
    ) -> Result<String, SourceError> {
        let what = format!("{owner}/{repo}/{path}@{git_ref}");
        let req = self
            .request(&format!("/repos/{owner}/{repo}/contents/{path}"))
            .query(&[("ref", git_ref)]);
        let (file, _): (ContentResponse, _) = self.get_json(req, &what, cancel).await?;
        if file.content_type != "file" {
            return Err(SourceError::InvalidResponse(format!(
                "{what} is a {}, not a file",
                file.content_type
            )));
        }
        let encoded: String = file.content.split_whitespace().collect();
        let decoded = STANDARD
            .decode(encoded)
            .map_err(|e| SourceError::InvalidResponse(e.to_string()))?;
        String::from_utf8(decoded).map_err(|e| SourceError::InvalidResponse(e.to_string()))
    }
}

#[async_trait::async_trait]
impl GitHubSource for GitHubClient {
    async fn get_latest_release(
        &self,
        owner: &str,
        repo: &str,
        cancel: &CancellationToken,
    ) -> Result<Release, SourceError> {
        let req = self.request(&format!("/repos/{owner}/{repo}/releases/latest"));
        Ok(self.get_json(req, &format!("{owner}/{repo}"), cancel).await?.0)
    }

    async fn get_release_by_tag(
        &self,
        owner: &str,
        repo: &str,
        tag: &str,
        cancel: &CancellationToken,
    ) -> Result<Release, SourceError> {
        let req = self.request(&format!("/repos/{owner}/{repo}/releases/tags/{tag}"));
        Ok(self
            .get_json(req, &format!("{owner}/{repo}@{tag}"), cancel)
            .await?
            .0)
    }

    async fn list_releases(
        &self,
        owner: &str,
        repo: &str,
        opts: ListOptions,
        cancel: &CancellationToken,
    ) -> Result<Page<Release>, SourceError> {
        self.list(
            &format!("/repos/{owner}/{repo}/releases"),
            &format!("{owner}/{repo}"),
            opts,
            cancel,
        )
        .await
    }

    async fn list_release_assets(
        &self,
        owner: &str,
        repo: &str,
        release_id: u64,
        opts: ListOptions,
        cancel: &CancellationToken,
    ) -> Result<Page<ReleaseAsset>, SourceError> {
        self.list(
            &format!("/repos/{owner}/{repo}/releases/{release_id}/assets"),
            &format!("{owner}/{repo} release {release_id}"),
            opts,
            cancel,
        )
        .await
    }

    async fn list_tags(
        &self,
        owner: &str,
        repo: &str,
        opts: ListOptions,
        cancel: &CancellationToken,
    ) -> Result<Page<Tag>, SourceError> {
        self.list(
            &format!("/repos/{owner}/{repo}/tags"),
            &format!("{owner}/{repo}"),
            opts,
            cancel,
        )
        .await
    }

    async fn get_repository(
        &self,
        owner: &str,
        repo: &str,
        cancel: &CancellationToken,
    ) -> Result<Repository, SourceError> {
        let req = self.request(&format!("/repos/{owner}/{repo}"));
        Ok(self.get_json(req, &format!("{owner}/{repo}"), cancel).await?.0)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use mockito::{Matcher, Server};

    fn client(server: &Server) -> GitHubClient {
        GitHubClient::new(Client::new(), &server.url())
    }

    #[tokio::test]
    async fn test_list_releases_reads_next_page() {
        let mut server = Server::new_async().await;
        let next = format!(
            r#"<{}/repos/acme/tool/releases?per_page=2&page=2>; rel="next""#,
            server.url()
        );

        let mock = server
            .mock("GET", "/repos/acme/tool/releases")
            .match_query(Matcher::AllOf(vec![
                Matcher::UrlEncoded("per_page".into(), "2".into()),
                Matcher::UrlEncoded("page".into(), "1".into()),
            ]))
            .match_header("accept", "application/vnd.github+json")
            .with_status(200)
            .with_header("content-type", "application/json")
            .with_header("link", &next)
            .with_body(
                r#"[
                    {"id": 2, "tag_name": "v1.1.0", "prerelease": false, "assets": [{"name": "tool_linux_amd64.tar.gz"}]},
                    {"id": 1, "tag_name": "v1.0.0", "prerelease": true, "immutable": true}
                ]"#,
            )
            .create_async()
            .await;

        let page = client(&server)
            .list_releases("acme", "tool", ListOptions::first(2), &CancellationToken::new())
            .await
            .unwrap();

        mock.assert_async().await;
        assert_eq!(page.next_page, Some(2));
        assert_eq!(page.items.len(), 2);
        assert_eq!(page.items[0].assets[0].name, "tool_linux_amd64.tar.gz");
        assert!(page.items[1].prerelease);
        assert!(page.items[1].immutable);
    }

    #[tokio::test]
    async fn test_not_found() {
        let mut server = Server::new_async().await;

        let mock = server
            .mock("GET", "/repos/nonexistent/repo/releases/latest")
            .with_status(404)
            .with_header("content-type", "application/json")
            .with_body(r#"{"message": "Not Found"}"#)
            .create_async()
            .await;

        let result = client(&server)
            .get_latest_release("nonexistent", "repo", &CancellationToken::new())
            .await;

        mock.assert_async().await;
        assert!(matches!(result, Err(SourceError::NotFound(_))));
    }

    #[tokio::test]
    async fn test_rate_limited() {
        let mut server = Server::new_async().await;

        let mock = server
            .mock("GET", "/repos/acme/tool")
            .with_status(429)
            .with_header("retry-after", "60")
            .with_body(r#"{"message": "API rate limit exceeded"}"#)
            .create_async()
            .await;

        let result = client(&server)
            .get_repository("acme", "tool", &CancellationToken::new())
            .await;

        mock.assert_async().await;
        assert!(matches!(
            result,
            Err(SourceError::RateLimited {
                retry_after_secs: Some(60)
            })
        ));
    }

    #[tokio::test]
    async fn test_token_is_sent() {
        let mut server = Server::new_async().await;

        let mock = server
            .mock("GET", "/repos/acme/tool/releases/tags/v1.0.0")
            .match_header("authorization", "Bearer secret")
            .with_status(200)
            .with_header("content-type", "application/json")
            .with_body(r#"{"id": 7, "tag_name": "v1.0.0"}"#)
            .create_async()
            .await;

        let release = client(&server)
            .with_token(Some("secret".into()))
            .get_release_by_tag("acme", "tool", "v1.0.0", &CancellationToken::new())
            .await
            .unwrap();

        mock.assert_async().await;
        assert_eq!(release.id, 7);
        assert!(release.assets.is_empty());
    }

    #[tokio::test]
    async fn test_get_contents_decodes_base64() {
        let mut server = Server::new_async().await;

        let mock = server
            .mock("GET", "/repos/aquaproj/aqua-registry/contents/registry.yaml")
            .match_query(Matcher::UrlEncoded("ref".into(), "v4.0.0".into()))
            .with_status(200)
            .with_header("content-type", "application/json")
            .with_body(r#"{"type": "file", "encoding": "base64", "content": "cGFja2Fn\nZXM6IFtd\n"}"#)
            .create_async()
            .await;

        let body = client(&server)
            .get_contents(
                "aquaproj",
                "aqua-registry",
                "registry.yaml",
                "v4.0.0",
                &CancellationToken::new(),
            )
            .await
            .unwrap();

        mock.assert_async().await;
        assert_eq!(body, "packages: []");
    }

    #[tokio::test]
    async fn test_canceled_before_request() {
        let server = Server::new_async().await;
        let cancel = CancellationToken::new();
        cancel.cancel();

        let result = client(&server)
            .list_tags("acme", "tool", ListOptions::first(30), &cancel)
            .await;

        assert!(matches!(result, Err(SourceError::Canceled)));
    }
}
