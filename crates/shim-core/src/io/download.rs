//! Streaming HTTP downloads with manual redirect handling and atomic
//! materialization.
//!
//! A download is written to `<dest>.tmp` and renamed onto `<dest>` only once
//! the body has been received completely, so `<dest>` never holds a partial
//! file.

use std::path::Path;
use std::time::Duration;

use futures::StreamExt;
use reqwest::{Client, StatusCode, Url};
use thiserror::Error;
use tokio::fs::File;
use tokio::io::AsyncWriteExt;

use crate::config::{DEFAULT_MAX_REDIRECTS, DEFAULT_TIMEOUT};
use crate::io::tmp_sibling;

#[derive(Error, Debug)]
pub enum DownloadError {
    #[error("Download timed out after {}s", .0.as_secs_f64())]
    Timeout(Duration),

    #[error("HTTP {status} downloading {url}")]
    HttpStatus { status: u16, url: String },

    #[error("Network error: {0}")]
    Network(#[from] reqwest::Error),

    #[error("Too many redirects (limit {limit}) starting at {url}")]
    TooManyRedirects { limit: usize, url: String },

    #[error("Redirect from {url} has no usable Location header")]
    MissingLocation { url: String },

    #[error("Invalid URL '{url}': {reason}")]
    InvalidUrl { url: String, reason: String },

    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),
}

/// Knobs for a [`Downloader`].
#[derive(Debug, Clone)]
pub struct DownloadOptions {
    /// Wall-clock limit for one `fetch`, covering every hop and the body.
    pub timeout: Duration,
    /// Redirect hops allowed before giving up.
    pub max_redirects: usize,
    /// Value of the `User-Agent` header.
    pub user_agent: String,
}

impl Default for DownloadOptions {
    fn default() -> Self {
        Self {
            timeout: DEFAULT_TIMEOUT,
            max_redirects: DEFAULT_MAX_REDIRECTS,
            user_agent: crate::user_agent(env!("CARGO_PKG_VERSION")),
        }
    }
}

/// Fetches URLs to local files.
#[derive(Debug, Clone)]
pub struct Downloader {
    client: Client,
    options: DownloadOptions,
}

impl Downloader {
    /// Build a downloader. Automatic redirects are disabled; [`fetch`](Self::fetch)
    /// follows them itself so the hop limit is enforced in one place.
    pub fn new(options: DownloadOptions) -> Result<Self, DownloadError> {
        let client = Client::builder()
            .redirect(reqwest::redirect::Policy::none())
            .user_agent(options.user_agent.clone())
            .build()?;
        Ok(Self { client, options })
    }

    pub fn options(&self) -> &DownloadOptions {
        &self.options
    }

    /// Download `url` to `dest`.
    ///
    /// On success `dest` holds the complete body. On failure neither `dest`
    /// nor `<dest>.tmp` is left behind by this call.
    pub async fn fetch(&self, url: &str, dest: &Path) -> Result<(), DownloadError> {
        let tmp = tmp_sibling(dest);

        let result = match tokio::time::timeout(self.options.timeout, self.fetch_to(url, &tmp))
            .await
        {
            Ok(result) => result,
            Err(_) => Err(DownloadError::Timeout(self.options.timeout)),
        };

        let result = match result {
            Ok(()) => tokio::fs::rename(&tmp, dest).await.map_err(DownloadError::from),
            Err(e) => Err(e),
        };

        if result.is_err() {
            tokio::fs::remove_file(&tmp).await.ok();
        }
        result
    }

    /// Resolve redirects, then stream the final body into `tmp`.
    async fn fetch_to(&self, url: &str, tmp: &Path) -> Result<(), DownloadError> {
        let mut current = Url::parse(url).map_err(|e| DownloadError::InvalidUrl {
            url: url.to_string(),
            reason: e.to_string(),
        })?;

        for hop in 0..=self.options.max_redirects {
            let response = self.client.get(current.clone()).send().await?;
            let status = response.status();

            if is_redirect(status) {
                let location = response
                    .headers()
                    .get(reqwest::header::LOCATION)
                    .and_then(|v| v.to_str().ok())
                    .ok_or_else(|| DownloadError::MissingLocation {
                        url: current.to_string(),
                    })?;

                let next = current
                    .join(location)
                    .map_err(|e| DownloadError::InvalidUrl {
                        url: location.to_string(),
                        reason: e.to_string(),
                    })?;

                tracing::debug!(hop, from = %current, to = %next, "following redirect");
                current = next;
                continue;
            }

            if status != StatusCode::OK {
                return Err(DownloadError::HttpStatus {
                    status: status.as_u16(),
                    url: current.to_string(),
                });
            }

            let mut file = File::create(tmp).await?;
            let mut stream = response.bytes_stream();
            let mut written: u64 = 0;

            while let Some(chunk) = stream.next().await {
                let chunk = chunk?;
                file.write_all(&chunk).await?;
                written += chunk.len() as u64;
            }

            file.flush().await?;
            file.sync_all().await?;
            tracing::debug!(url = %current, bytes = written, "download complete");
            return Ok(());
        }

        Err(DownloadError::TooManyRedirects {
            limit: self.options.max_redirects,
            url: url.to_string(),
        })
    }
}

fn is_redirect(status: StatusCode) -> bool {
    matches!(
        status,
        StatusCode::MOVED_PERMANENTLY
            | StatusCode::FOUND
            | StatusCode::SEE_OTHER
            | StatusCode::TEMPORARY_REDIRECT
            | StatusCode::PERMANENT_REDIRECT
    )
}
