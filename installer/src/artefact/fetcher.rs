//! Package acquisition with retry, partial-file detection, and integrity
//! verification.
//!
//! [`Fetcher::acquire`] turns a download URL into a local archive inside the
//! scratch directory. A cached file is reused when it can be trusted: a
//! declared digest is always checked after the fact, while a declared size
//! alone is checked up front and a mismatching file is only kept if the user
//! says so. Every retry decision goes through the [`Prompter`]; nothing is
//! retried unattended.

use crate::artefact::digest::{PackageDigest, compute_digest};
use crate::artefact::download::{DownloadError, ReleaseDownloader};
use crate::catalog::ReleaseRecord;
use crate::output::write_stderr_line;
use crate::progress::{ProgressStyle, ProgressTracker};
use crate::prompt::{PromptError, Prompter};
use crate::scratch::{ScratchDir, ScratchError};
use camino::{Utf8Path, Utf8PathBuf};
use std::fs;
use std::io::Write;

/// Default bound on download attempts per acquisition.
pub const DEFAULT_MAX_ATTEMPTS: u32 = 5;

const RETRY_QUESTION: &str = "Failed to complete download. Retry?";

/// What to acquire and what is known about it in advance.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct AcquireRequest<'a> {
    /// Human-readable name used in progress messages.
    pub label: &'a str,
    /// Archive download URL.
    pub url: &'a str,
    /// Key of the cached file inside the scratch directory.
    pub cache_key: &'a str,
    /// Declared archive size in bytes.
    pub declared_size: Option<u64>,
    /// Declared archive digest.
    pub declared_digest: Option<&'a PackageDigest>,
}

impl<'a> AcquireRequest<'a> {
    /// Request for the archive of a catalog release.
    #[must_use]
    pub fn for_release(record: &'a ReleaseRecord, cache_key: &'a str) -> Self {
        Self {
            label: record.name(),
            url: record.url(),
            cache_key,
            declared_size: record.size(),
            declared_digest: record.digest(),
        }
    }
}

/// Errors arising from package acquisition.
#[derive(Debug, thiserror::Error)]
pub enum AcquisitionError {
    /// The download failed and the user chose not to retry.
    #[error("download of {url} failed ({reason}); retry declined")]
    RetryDeclined {
        /// The archive URL.
        url: String,
        /// Description of the last failure.
        reason: String,
    },

    /// Every permitted download attempt failed.
    #[error("download of {url} failed after {attempts} attempts: {reason}")]
    RetriesExhausted {
        /// The archive URL.
        url: String,
        /// Number of attempts made.
        attempts: u32,
        /// Description of the last failure.
        reason: String,
    },

    /// The archive did not match its declared digest and was deleted.
    #[error("digest mismatch for {path}: expected {expected}, got {actual}")]
    DigestMismatch {
        /// The deleted local file.
        path: Utf8PathBuf,
        /// Declared digest.
        expected: PackageDigest,
        /// Digest of the downloaded content.
        actual: PackageDigest,
    },

    /// A local file could not be read or removed.
    #[error("I/O error on {path}: {source}")]
    Io {
        /// The file being accessed.
        path: Utf8PathBuf,
        /// Underlying I/O error.
        #[source]
        source: std::io::Error,
    },

    /// The scratch directory could not be prepared.
    #[error(transparent)]
    Scratch(#[from] ScratchError),

    /// A confirmation prompt could not be answered.
    #[error(transparent)]
    Prompt(#[from] PromptError),
}

/// Why a single download attempt did not produce a usable file.
#[derive(Debug)]
enum AttemptFailure {
    Transport(DownloadError),
    SizeMismatch { expected: u64, actual: u64 },
}

impl std::fmt::Display for AttemptFailure {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Self::Transport(err) => write!(f, "transport error: {err}"),
            Self::SizeMismatch { expected, actual } => {
                write!(f, "size mismatch: expected {expected} bytes, got {actual}")
            }
        }
    }
}

/// Acquires release archives into the scratch directory.
pub struct Fetcher<'a> {
    downloader: &'a dyn ReleaseDownloader,
    prompter: &'a dyn Prompter,
    scratch: &'a ScratchDir,
    max_attempts: u32,
    progress: ProgressStyle,
    quiet: bool,
}

impl<'a> Fetcher<'a> {
    /// Create a fetcher with the default attempt bound and terminal progress.
    #[must_use]
    pub fn new(
        downloader: &'a dyn ReleaseDownloader,
        prompter: &'a dyn Prompter,
        scratch: &'a ScratchDir,
    ) -> Self {
        Self {
            downloader,
            prompter,
            scratch,
            max_attempts: DEFAULT_MAX_ATTEMPTS,
            progress: ProgressStyle::Terminal,
            quiet: false,
        }
    }

    /// Bound the number of download attempts; values below one are raised
    /// to one.
    #[must_use]
    pub fn with_max_attempts(mut self, max_attempts: u32) -> Self {
        self.max_attempts = max_attempts.max(1);
        self
    }

    /// Choose how transfer progress is presented.
    #[must_use]
    pub fn with_progress(mut self, progress: ProgressStyle) -> Self {
        self.progress = progress;
        self
    }

    /// Suppress status lines. Warnings and prompts are still shown.
    #[must_use]
    pub fn quiet(mut self, quiet: bool) -> Self {
        self.quiet = quiet;
        self
    }

    /// Produce a verified local copy of the requested archive.
    ///
    /// Returns the path only when the declared digest matched or no digest
    /// was declared.
    ///
    /// # Errors
    ///
    /// Returns [`AcquisitionError::RetryDeclined`] or
    /// [`AcquisitionError::RetriesExhausted`] when downloading fails,
    /// [`AcquisitionError::DigestMismatch`] after deleting a file whose
    /// content does not match the declared digest, and other variants when
    /// the scratch directory, a local file, or a prompt fails.
    pub fn acquire(
        &self,
        request: &AcquireRequest<'_>,
        out: &mut dyn Write,
    ) -> Result<Utf8PathBuf, AcquisitionError> {
        self.scratch.ensure()?;
        let path = self.scratch.cache_path(request.cache_key);
        let mut attempts = 0u32;

        loop {
            if request.declared_digest.is_none()
                && let Some(expected) = request.declared_size
            {
                self.validate_size(&path, expected, out)?;
            }

            if path.exists() {
                self.status(out, "Using local file.");
                break;
            }

            attempts += 1;
            self.status(out, format!("Downloading {}", request.label));
            self.status(out, "Connecting to download server...");
            let pending = self.scratch.download_area()?;
            let Err(failure) = self.download_once(request, pending, &path) else {
                self.status(out, "Download Complete.");
                break;
            };

            log::warn!(
                "attempt {attempts}/{} for {} failed: {failure}",
                self.max_attempts,
                request.url
            );
            write_stderr_line(
                out,
                format!("Failed to download {}: {failure}", request.url),
            );
            self.prune_partial(&path, request.declared_size, out)?;

            if attempts >= self.max_attempts {
                return Err(AcquisitionError::RetriesExhausted {
                    url: request.url.to_owned(),
                    attempts,
                    reason: failure.to_string(),
                });
            }
            if !self.prompter.confirm(RETRY_QUESTION)? {
                return Err(AcquisitionError::RetryDeclined {
                    url: request.url.to_owned(),
                    reason: failure.to_string(),
                });
            }
        }

        if let Some(expected) = request.declared_digest {
            self.verify(&path, expected, out)?;
        }
        Ok(path)
    }

    /// Download into `pending` and move it under the cache key once it is
    /// complete. A partial transfer is kept under the cache key only when a
    /// size is declared, so that it can be revalidated.
    fn download_once(
        &self,
        request: &AcquireRequest<'_>,
        pending: tempfile::TempPath,
        path: &Utf8Path,
    ) -> Result<(), AttemptFailure> {
        let sink = if self.quiet {
            ProgressStyle::Silent.sink()
        } else {
            self.progress.sink()
        };
        let mut tracker = ProgressTracker::new(request.declared_size, sink);
        let written = match self
            .downloader
            .download_archive(request.url, &pending, &mut tracker)
        {
            Ok(written) => written,
            Err(err) => {
                if request.declared_size.is_some() {
                    persist(pending, path)?;
                }
                return Err(AttemptFailure::Transport(err));
            }
        };

        if let Some(expected) = request.declared_size {
            let actual = fs::metadata(&pending).map_or(written, |meta| meta.len());
            if actual != expected {
                return Err(AttemptFailure::SizeMismatch { expected, actual });
            }
        }
        persist(pending, path)
    }

    /// Ask whether to keep a cached file whose size differs from the
    /// declaration; remove it unless the user agrees.
    fn validate_size(
        &self,
        path: &Utf8Path,
        expected: u64,
        out: &mut dyn Write,
    ) -> Result<(), AcquisitionError> {
        let actual = match fs::metadata(path) {
            Ok(meta) => meta.len(),
            Err(err) if err.kind() == std::io::ErrorKind::NotFound => return Ok(()),
            Err(source) => {
                return Err(AcquisitionError::Io {
                    path: path.to_owned(),
                    source,
                });
            }
        };
        if actual == expected {
            return Ok(());
        }

        let question = format!(
            "Local installation file {path} is incomplete ({actual} of {expected} bytes). Keep anyway?"
        );
        if self.prompter.confirm(&question)? {
            log::debug!("keeping size-mismatched file {path} at user request");
            return Ok(());
        }
        remove_local(path, out)
    }

    /// Deal with whatever a failed attempt left behind.
    fn prune_partial(
        &self,
        path: &Utf8Path,
        declared_size: Option<u64>,
        out: &mut dyn Write,
    ) -> Result<(), AcquisitionError> {
        match declared_size {
            Some(expected) => self.validate_size(path, expected, out),
            None if path.exists() => remove_local(path, out),
            None => Ok(()),
        }
    }

    fn verify(
        &self,
        path: &Utf8Path,
        expected: &PackageDigest,
        out: &mut dyn Write,
    ) -> Result<(), AcquisitionError> {
        self.status(out, "Verifying package authenticity.");
        let actual = compute_digest(path.as_std_path(), expected.algorithm()).map_err(|source| {
            AcquisitionError::Io {
                path: path.to_owned(),
                source,
            }
        })?;

        if actual == *expected {
            self.status(out, "Package authenticity established.");
            return Ok(());
        }

        log::warn!("digest mismatch for {path}: expected {expected}, got {actual}");
        write_stderr_line(
            out,
            format!("Warning! Hash Mismatch for {path}: expected {expected}, got {actual}"),
        );
        remove_local(path, out)?;
        Err(AcquisitionError::DigestMismatch {
            path: path.to_owned(),
            expected: expected.clone(),
            actual,
        })
    }

    fn status(&self, out: &mut dyn Write, message: impl std::fmt::Display) {
        if !self.quiet {
            write_stderr_line(out, message);
        }
    }
}

impl std::fmt::Debug for Fetcher<'_> {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Fetcher")
            .field("scratch", &self.scratch)
            .field("max_attempts", &self.max_attempts)
            .field("progress", &self.progress)
            .field("quiet", &self.quiet)
            .finish_non_exhaustive()
    }
}

fn persist(pending: tempfile::TempPath, path: &Utf8Path) -> Result<(), AttemptFailure> {
    pending
        .persist(path)
        .map_err(|err| AttemptFailure::Transport(DownloadError::Io(err.error)))
}

fn remove_local(path: &Utf8Path, out: &mut dyn Write) -> Result<(), AcquisitionError> {
    write_stderr_line(out, format!("Removing {path}"));
    fs::remove_file(path).map_err(|source| AcquisitionError::Io {
        path: path.to_owned(),
        source,
    })
}

#[cfg(test)]
#[path = "fetcher_tests.rs"]
mod tests;
