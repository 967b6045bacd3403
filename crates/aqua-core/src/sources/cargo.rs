//! crates.io API.

#[cfg(test)]
use mockall::automock;

use reqwest::Client;
use serde::Deserialize;
use tokio_util::sync::CancellationToken;

use super::{SourceError, send};

const DEFAULT_BASE_URL: &str = "https://crates.io";

/// Metadata used to seed a generated package.
#[derive(Debug, Clone, Default, PartialEq, Eq, Deserialize)]
pub struct CrateInfo {
    /// `homepage` from the crate metadata.
    #[serde(default)]
    pub homepage: Option<String>,
    /// `description` from the crate metadata.
    #[serde(default)]
    pub description: Option<String>,
    /// `repository` from the crate metadata.
    #[serde(default)]
    pub repository: Option<String>,
}

#[derive(Debug, Deserialize)]
struct VersionsPayload {
    versions: Vec<VersionPayload>,
}

#[derive(Debug, Deserialize)]
struct VersionPayload {
    num: String,
}

#[derive(Debug, Deserialize)]
struct CratePayload {
    #[serde(rename = "crate")]
    krate: CrateInfo,
}

/// Read access to a crates registry.
#[cfg_attr(test, automock)]
#[async_trait::async_trait]
pub trait CargoSource: Send + Sync {
    /// Published versions, newest first.
    async fn list_versions(
        &self,
        crate_name: &str,
        cancel: &CancellationToken,
    ) -> Result<Vec<String>, SourceError>;

    /// The first entry of [`list_versions`](Self::list_versions).
    async fn get_latest_version(
        &self,
        crate_name: &str,
        cancel: &CancellationToken,
    ) -> Result<Option<String>, SourceError> {
        Ok(self.list_versions(crate_name, cancel).await?.into_iter().next())
    }

    /// Crate metadata.
    async fn get_crate(
        &self,
        crate_name: &str,
        cancel: &CancellationToken,
    ) -> Result<CrateInfo, SourceError>;
}

/// [`CargoSource`] over the crates.io HTTP API.
#[derive(Debug, Clone)]
pub struct CratesIoClient {
    client: Client,
    base_url: String,
}

impl CratesIoClient {
    /// Client for the API at `base_url`.
    pub fn new(client: Client, base_url: &str) -> Self {
        Self {
            client,
            base_url: base_url.trim_end_matches('/').to_string(),
        }
    }

    /// Client for <https://crates.io>.
    pub fn crates_io(client: Client) -> Self {
        Self::new(client, DEFAULT_BASE_URL)
    }

    async fn get<T: serde::de::DeserializeOwned>(
        &self,
        path: &str,
        cancel: &CancellationToken,
    ) -> Result<T, SourceError> {
        let url = format!("{}/api/v1/crates/{path}", self.base_url);
        // crates.io rejects requests without a User-Agent.
        let req = self.client.get(&url).header("User-Agent", crate::USER_AGENT);
        let resp = send(req, cancel).await?;
        let status = resp.status().as_u16();
        if status >= 300 {
            return Err(SourceError::Status { url, status });
        }
        resp.json()
            .await
            .map_err(|e| SourceError::InvalidResponse(e.to_string()))
    }
}

#[async_trait::async_trait]
impl CargoSource for CratesIoClient {
    async fn list_versions(
        &self,
        crate_name: &str,
        cancel: &CancellationToken,
    ) -> Result<Vec<String>, SourceError> {
        let payload: VersionsPayload = self.get(&format!("{crate_name}/versions"), cancel).await?;
        Ok(payload.versions.into_iter().map(|v| v.num).collect())
    }

    async fn get_crate(
        &self,
        crate_name: &str,
        cancel: &CancellationToken,
    ) -> Result<CrateInfo, SourceError> {
        let payload: CratePayload = self.get(crate_name, cancel).await?;
        Ok(payload.krate)
    }
}
