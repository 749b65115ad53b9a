//! Error types for the Backdrop installer CLI.
//!
//! Module errors are wrapped here so the binary has one type to report.
//! Every message names the resource involved (version, URL, file, or
//! folder) and the class of failure.

use crate::artefact::digest::{DigestError, PackageDigest};
use crate::artefact::fetcher::AcquisitionError;
use crate::catalog::CatalogError;
use crate::config::ConfigError;
use crate::prompt::PromptError;
use crate::reconcile::ReconcileError;
use crate::scratch::ScratchError;
use crate::stager::StagingError;
use camino::Utf8PathBuf;
use thiserror::Error;

/// Errors that can occur while listing, downloading, or installing.
#[derive(Debug, Error)]
pub enum InstallerError {
    /// Configuration could not be loaded.
    #[error(transparent)]
    Config(#[from] ConfigError),

    /// The release catalog could not be fetched or parsed.
    #[error(transparent)]
    Catalog(#[from] CatalogError),

    /// The requested version is not in the catalog.
    #[error("version {version} not available")]
    UnknownVersion {
        /// The requested version.
        version: String,
    },

    /// The catalog lists no installable releases.
    #[error("no releases available from {feed_url}")]
    EmptyCatalog {
        /// The feed that was queried.
        feed_url: String,
    },

    /// The package could not be acquired.
    #[error(transparent)]
    Acquisition(#[from] AcquisitionError),

    /// The archive could not be staged.
    #[error(transparent)]
    Staging(#[from] StagingError),

    /// The installation directory could not be prepared.
    #[error(transparent)]
    Reconcile(#[from] ReconcileError),

    /// The scratch directory is unavailable.
    #[error(transparent)]
    Scratch(#[from] ScratchError),

    /// A question could not be asked or answered.
    #[error(transparent)]
    Prompt(#[from] PromptError),

    /// A digest given on the command line is malformed.
    #[error(transparent)]
    InvalidDigest(#[from] DigestError),

    /// A local archive does not exist.
    #[error("archive {path} not found")]
    LocalArchiveNotFound {
        /// The missing archive.
        path: Utf8PathBuf,
    },

    /// A local archive does not match the digest given for it.
    #[error("digest mismatch for {path}: expected {expected}, got {actual}")]
    LocalDigestMismatch {
        /// The local archive.
        path: Utf8PathBuf,
        /// The digest given on the command line.
        expected: PackageDigest,
        /// The archive's actual digest.
        actual: PackageDigest,
    },

    /// No installation directory was given.
    #[error("no installation directory given")]
    NoDestination,

    /// The release list could not be serialised.
    #[error("failed to serialise release list: {0}")]
    Serialise(#[from] serde_json::Error),

    /// An I/O operation failed.
    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),

    /// Failed to write output.
    #[error("failed to write output")]
    WriteFailed {
        /// The underlying error that caused the write to fail.
        #[source]
        source: std::io::Error,
    },
}

/// Result type alias for installer operations.
pub type Result<T> = std::result::Result<T, InstallerError>;
