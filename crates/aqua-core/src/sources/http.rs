use std::fmt;
use std::time::Duration;

use bytes::{Bytes, BytesMut};
use futures::StreamExt;
use futures::stream::BoxStream;
use reqwest::{Client, StatusCode};
use tokio_util::sync::CancellationToken;
use tracing::warn;

use super::{SourceError, ensure_not_canceled, send};

const MAX_ATTEMPTS: usize = 5;
const RETRY_DELAY: Duration = Duration::from_millis(100);

/// A response body being downloaded.
pub struct Download {
    /// Chunks as they arrive.
    pub body: BoxStream<'static, Result<Bytes, SourceError>>,
    /// From `Content-Length`, when the server sent one.
    pub content_length: Option<u64>,
}

impl fmt::Debug for Download {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Download")
            .field("content_length", &self.content_length)
            .finish_non_exhaustive()
    }
}

impl Download {
    /// Buffer the whole body, stopping early if `cancel` fires.
    ///
    /// # Errors
    ///
    /// Returns the first stream error, or [`SourceError::Canceled`].
    pub async fn bytes(mut self, cancel: &CancellationToken) -> Result<Bytes, SourceError> {
        let capacity = self
            .content_length
            .and_then(|n| usize::try_from(n).ok())
            .unwrap_or_default();
        let mut buf = BytesMut::with_capacity(capacity);
        loop {
            let chunk = tokio::select! {
                biased;
                () = cancel.cancelled() => return Err(SourceError::Canceled),
                chunk = self.body.next() => chunk,
            };
            match chunk {
                Some(chunk) => buf.extend_from_slice(&chunk?),
                None => return Ok(buf.freeze()),
            }
        }
    }
}

/// GET with retries on server errors.
#[derive(Debug, Clone)]
pub struct HttpDownloader {
    client: Client,
}

impl HttpDownloader {
    /// Downloader over `client`.
    pub fn new(client: Client) -> Self {
        Self { client }
    }

    /// Start downloading `url`.
    ///
    /// Statuses below 400 succeed. 5xx responses are retried up to five
    /// attempts in total, 100ms apart.
    ///
    /// # Errors
    ///
    /// Returns [`SourceError::Status`] for any other status or when
    /// retries run out, [`SourceError::Network`] when the request cannot be
    /// sent, and [`SourceError::Canceled`].
    pub async fn download(
        &self,
        url: &str,
        cancel: &CancellationToken,
    ) -> Result<Download, SourceError> {
        let mut attempt = 1;
        loop {
            let resp = send(self.client.get(url), cancel).await?;
            let status = resp.status();
            if status < StatusCode::BAD_REQUEST {
                let content_length = resp.content_length();
                let body = resp
                    .bytes_stream()
                    .map(|chunk| chunk.map_err(SourceError::from))
                    .boxed();
                return Ok(Download {
                    body,
                    content_length,
                });
            }
            if attempt < MAX_ATTEMPTS && status.is_server_error() {
                warn!(
                    http_status_code = status.as_u16(),
                    url, "downloading a file failed. Retrying..."
                );
                tokio::select! {
                    biased;
                    () = cancel.cancelled() => return Err(SourceError::Canceled),
                    () = tokio::time::sleep(RETRY_DELAY) => {}
                }
                ensure_not_canceled(cancel)?;
                attempt += 1;
                continue;
            }
            return Err(SourceError::Status {
                url: url.to_string(),
                status: status.as_u16(),
            });
        }
    }
}
