//! HTTP access to the release feed and release archives.
//!
//! Provides a trait-based abstraction so the catalog parser and the
//! package fetcher can be exercised without network access.

use crate::progress::ProgressTracker;
use std::fs::File;
use std::io::{Read, Write};
use std::path::Path;
use std::time::Duration;

const CHUNK_SIZE: usize = 8192;

/// Trait for retrieving the release feed and release archives.
#[cfg_attr(test, mockall::automock)]
pub trait ReleaseDownloader {
    /// Download the release feed document at `url`.
    ///
    /// # Errors
    ///
    /// Returns an error if the request fails or the body is not text.
    fn download_feed(&self, url: &str) -> Result<String, DownloadError>;

    /// Stream the archive at `url` into `dest`, reporting every chunk to
    /// `progress`. Returns the number of bytes written.
    ///
    /// On failure `dest` may be left holding a partial file.
    ///
    /// # Errors
    ///
    /// Returns an error if the request, the transfer, or the write fails.
    fn download_archive(
        &self,
        url: &str,
        dest: &Path,
        progress: &mut ProgressTracker,
    ) -> Result<u64, DownloadError>;
}

/// Errors arising from download operations.
#[derive(Debug, thiserror::Error)]
pub enum DownloadError {
    /// HTTP request or transfer failed.
    #[error("download failed for {url}: {reason}")]
    HttpError {
        /// The URL that was requested.
        url: String,
        /// A human-readable description of the failure.
        reason: String,
    },

    /// The requested resource was not found (HTTP 404).
    #[error("not found: {url}")]
    NotFound {
        /// The URL that returned 404.
        url: String,
    },

    /// I/O error writing the downloaded file.
    #[error("I/O error writing download: {0}")]
    Io(#[from] std::io::Error),
}

/// HTTP-based downloader using `ureq`.
///
/// The feed is small, so its request is bounded as a whole. Archive
/// transfers only bound connecting and waiting for the response; the body
/// may take as long as the link needs.
#[derive(Debug, Clone)]
pub struct HttpDownloader {
    feed_agent: ureq::Agent,
    archive_agent: ureq::Agent,
}

impl HttpDownloader {
    /// Build a downloader whose requests time out after `timeout`.
    #[must_use]
    pub fn new(timeout: Duration) -> Self {
        let feed_config = ureq::Agent::config_builder()
            .timeout_global(Some(timeout))
            .build();
        let archive_config = ureq::Agent::config_builder()
            .timeout_connect(Some(timeout))
            .timeout_recv_response(Some(timeout))
            .build();
        Self {
            feed_agent: ureq::Agent::new_with_config(feed_config),
            archive_agent: ureq::Agent::new_with_config(archive_config),
        }
    }
}

impl ReleaseDownloader for HttpDownloader {
    fn download_feed(&self, url: &str) -> Result<String, DownloadError> {
        log::debug!("fetching release feed from {url}");
        let response = self
            .feed_agent
            .get(url)
            .call()
            .map_err(|e| map_ureq_error(url, &e))?;
        response
            .into_body()
            .read_to_string()
            .map_err(|e| DownloadError::HttpError {
                url: url.to_owned(),
                reason: e.to_string(),
            })
    }

    fn download_archive(
        &self,
        url: &str,
        dest: &Path,
        progress: &mut ProgressTracker,
    ) -> Result<u64, DownloadError> {
        log::debug!("downloading {url} to {}", dest.display());
        let response = self
            .archive_agent
            .get(url)
            .call()
            .map_err(|e| map_ureq_error(url, &e))?;
        progress.set_total_if_unknown(content_length(response.headers()));

        let mut body = response.into_body();
        let mut reader = body.as_reader();
        let mut file = File::create(dest)?;
        copy_with_progress(&mut reader, &mut file, progress).map_err(|e| {
            DownloadError::HttpError {
                url: url.to_owned(),
                reason: e.to_string(),
            }
        })
    }
}

/// Copy `reader` into `writer` chunk by chunk, advancing `progress`.
///
/// # Errors
///
/// Returns the first read or write error.
pub fn copy_with_progress(
    reader: &mut dyn Read,
    writer: &mut dyn Write,
    progress: &mut ProgressTracker,
) -> std::io::Result<u64> {
    let mut buffer = [0u8; CHUNK_SIZE];
    loop {
        let bytes_read = match reader.read(&mut buffer) {
            Ok(0) => break,
            Ok(n) => n,
            Err(e) if e.kind() == std::io::ErrorKind::Interrupted => continue,
            Err(e) => return Err(e),
        };
        writer.write_all(buffer.get(..bytes_read).unwrap_or_default())?;
        progress.advance(bytes_read as u64);
    }
    writer.flush()?;
    progress.finish();
    Ok(progress.transferred())
}

fn content_length(headers: &ureq::http::HeaderMap) -> Option<u64> {
    headers
        .get("content-length")
        .and_then(|value| value.to_str().ok())
        .and_then(|value| value.trim().parse().ok())
}

/// Map a ureq error to a [`DownloadError`].
fn map_ureq_error(url: &str, err: &ureq::Error) -> DownloadError {
    match err {
        ureq::Error::StatusCode(404) => DownloadError::NotFound {
            url: url.to_owned(),
        },
        other => DownloadError::HttpError {
            url: url.to_owned(),
            reason: other.to_string(),
        },
    }
}
