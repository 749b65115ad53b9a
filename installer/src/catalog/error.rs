//! Error types for catalog retrieval and parsing.

use crate::artefact::download::DownloadError;
use thiserror::Error;

/// The release feed could not be retrieved or is not a readable document.
#[derive(Debug, Error)]
pub enum FetchError {
    /// The feed endpoint could not be reached or returned an error status.
    #[error("release feed unavailable: {0}")]
    Transport(#[from] DownloadError),

    /// The feed body is not well-formed XML of the expected shape.
    #[error("release feed at {url} is not a valid document: {reason}")]
    InvalidDocument {
        /// The feed URL.
        url: String,
        /// Description of the parse failure.
        reason: String,
    },
}

/// A release entry is missing a required field or holds an invalid value.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum CatalogParseError {
    /// A required element is absent or empty.
    #[error("release entry #{position} is missing required field <{field}>")]
    MissingField {
        /// One-based position of the entry in the feed.
        position: usize,
        /// Name of the missing element.
        field: &'static str,
    },

    /// An element holds a value that cannot be interpreted.
    #[error("release {version} has invalid <{field}>: {reason}")]
    InvalidField {
        /// Version of the offending entry.
        version: String,
        /// Name of the invalid element.
        field: &'static str,
        /// Description of the problem.
        reason: String,
    },
}

/// Any failure while building a [`super::ReleaseCatalog`].
#[derive(Debug, Error)]
pub enum CatalogError {
    /// Retrieving or reading the feed failed.
    #[error(transparent)]
    Fetch(#[from] FetchError),

    /// A release entry was malformed.
    #[error("malformed release feed: {0}")]
    Parse(#[from] CatalogParseError),
}
