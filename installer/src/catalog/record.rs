//! Release records and their security classification.

use crate::artefact::digest::PackageDigest;
use serde::Serialize;
use std::fmt;

/// Security classification of a release.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize)]
#[serde(rename_all = "lowercase")]
pub enum Security {
    /// Classified, and not marked insecure.
    Nominal,
    /// Marked insecure by the feed; installing requires confirmation.
    Insecure,
    /// The feed carries no classification for this release.
    Unknown,
}

impl Security {
    /// Whether installing this release needs explicit confirmation.
    #[must_use]
    pub const fn requires_confirmation(self) -> bool {
        matches!(self, Self::Insecure)
    }
}

impl fmt::Display for Security {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Nominal => write!(f, "nominal"),
            Self::Insecure => write!(f, "insecure"),
            Self::Unknown => write!(f, "unknown"),
        }
    }
}

/// One published release.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ReleaseRecord {
    pub(crate) version: String,
    pub(crate) name: String,
    pub(crate) url: String,
    pub(crate) filename: String,
    pub(crate) size: Option<u64>,
    pub(crate) digest: Option<PackageDigest>,
    pub(crate) security: Security,
    pub(crate) release_page: Option<String>,
    pub(crate) published: Option<u64>,
}

impl ReleaseRecord {
    /// Version identifier; unique within a catalog.
    #[must_use]
    pub fn version(&self) -> &str {
        &self.version
    }

    /// Display name.
    #[must_use]
    pub fn name(&self) -> &str {
        &self.name
    }

    /// Archive download URL.
    #[must_use]
    pub fn url(&self) -> &str {
        &self.url
    }

    /// Archive filename derived from the URL.
    #[must_use]
    pub fn filename(&self) -> &str {
        &self.filename
    }

    /// Declared archive size in bytes, if published.
    #[must_use]
    pub fn size(&self) -> Option<u64> {
        self.size
    }

    /// Declared archive digest, if published.
    #[must_use]
    pub fn digest(&self) -> Option<&PackageDigest> {
        self.digest.as_ref()
    }

    /// Security classification.
    #[must_use]
    pub fn security(&self) -> Security {
        self.security
    }

    /// Release notes page, if published.
    #[must_use]
    pub fn release_page(&self) -> Option<&str> {
        self.release_page.as_deref()
    }

    /// Publication time as a Unix timestamp, if published.
    #[must_use]
    pub fn published(&self) -> Option<u64> {
        self.published
    }

    /// Key under which the archive is cached in the scratch directory.
    #[must_use]
    pub fn cache_key(&self) -> String {
        format!("{}{}", self.version, self.filename)
    }
}

/// Derive the archive filename from a download URL.
///
/// Returns `None` when the URL has no final path segment.
///
/// # Examples
///
/// ```
/// use backdrop_installer::catalog::filename_from_url;
///
/// assert_eq!(
///     filename_from_url("https://github.com/backdrop/backdrop/releases/download/1.30.0/backdrop.zip?x=1"),
///     Some("backdrop.zip"),
/// );
/// assert_eq!(filename_from_url("https://example.test/"), None);
/// ```
#[must_use]
pub fn filename_from_url(url: &str) -> Option<&str> {
    let without_fragment = url.split('#').next().unwrap_or(url);
    let path = without_fragment
        .split('?')
        .next()
        .unwrap_or(without_fragment);
    path.rsplit('/').next().filter(|name| !name.is_empty())
}
