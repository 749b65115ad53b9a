//! Release catalog retrieval and parsing.
//!
//! The release feed lists published versions newest-first. Parsing walks
//! the entries in feed order and stops at the first entry without a download
//! link: older entries past that point are incomplete by convention and are
//! neither retried nor skipped over. Entries missing a name or version, or
//! carrying an unreadable size or digest, are reported as
//! [`CatalogParseError`]s rather than dropped.
//!
//! # Sub-modules
//!
//! - [`error`] - Fetch and parse error types.
//! - `feed` - Raw XML document shape.
//! - [`record`] - `ReleaseRecord` and `Security`.

pub mod error;
mod feed;
pub mod record;

use crate::artefact::digest::{DigestAlgorithm, PackageDigest};
use crate::artefact::download::ReleaseDownloader;
use feed::{FeedRelease, non_empty, parse_document};
use std::collections::HashMap;

pub use error::{CatalogError, CatalogParseError, FetchError};
pub use record::{ReleaseRecord, Security, filename_from_url};

const INSECURE_TERM: &str = "insecure";

/// Releases keyed by version, plus the feed's newest-first order.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct ReleaseCatalog {
    records: HashMap<String, ReleaseRecord>,
    order: Vec<String>,
}

impl ReleaseCatalog {
    /// Look up a release by version, whether or not it is in the
    /// (possibly truncated) order.
    #[must_use]
    pub fn get(&self, version: &str) -> Option<&ReleaseRecord> {
        self.records.get(version)
    }

    /// Version identifiers in feed order, newest first.
    #[must_use]
    pub fn order(&self) -> &[String] {
        &self.order
    }

    /// The newest release in the order.
    #[must_use]
    pub fn latest(&self) -> Option<&ReleaseRecord> {
        self.order.first().and_then(|version| self.get(version))
    }

    /// Resolve `requested` to a record; `None` selects the newest release.
    ///
    /// Returns `None` when the version is unknown or the catalog is empty.
    #[must_use]
    pub fn resolve(&self, requested: Option<&str>) -> Option<&ReleaseRecord> {
        match requested {
            Some(version) => self.get(version.trim()),
            None => self.latest(),
        }
    }

    /// Records in feed order.
    pub fn iter(&self) -> impl Iterator<Item = &ReleaseRecord> {
        self.order.iter().filter_map(|version| self.get(version))
    }

    /// Number of versions in the order.
    #[must_use]
    pub fn len(&self) -> usize {
        self.order.len()
    }

    /// Whether the order is empty.
    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.order.is_empty()
    }

    /// Number of parsed records available for lookup.
    #[must_use]
    pub fn record_count(&self) -> usize {
        self.records.len()
    }
}

/// Fetch the feed at `feed_url` and build a catalog from it.
///
/// When `limit` is given only the first `limit` versions are kept in the
/// order; every parsed record stays available through
/// [`ReleaseCatalog::get`].
///
/// # Errors
///
/// Returns [`CatalogError::Fetch`] when the feed cannot be retrieved or read,
/// and [`CatalogError::Parse`] when an entry is malformed.
pub fn fetch_catalog(
    downloader: &dyn ReleaseDownloader,
    feed_url: &str,
    limit: Option<usize>,
) -> Result<ReleaseCatalog, CatalogError> {
    let xml = downloader
        .download_feed(feed_url)
        .map_err(FetchError::from)?;
    parse_catalog(&xml, feed_url, limit)
}

/// Build a catalog from feed XML already in memory.
///
/// `source` names the feed in error messages.
///
/// # Errors
///
/// See [`fetch_catalog`].
///
/// # Examples
///
/// ```
/// use backdrop_installer::catalog::parse_catalog;
///
/// let xml = concat!(
///     "<project><releases>",
///     "<release><name>Backdrop 1.30.0</name><version>1.30.0</version>",
///     "<download_link>https://example.test/1.30.0/backdrop.zip</download_link></release>",
///     "<release><name>Backdrop 1.29.2</name><version>1.29.2</version></release>",
///     "</releases></project>",
/// );
/// let catalog = parse_catalog(xml, "inline", None).expect("valid feed");
/// assert_eq!(catalog.order(), ["1.30.0"]);
/// ```
pub fn parse_catalog(
    xml: &str,
    source: &str,
    limit: Option<usize>,
) -> Result<ReleaseCatalog, CatalogError> {
    let document = parse_document(xml).map_err(|e| FetchError::InvalidDocument {
        url: source.to_owned(),
        reason: e.to_string(),
    })?;
    let entries = document
        .releases
        .map(|releases| releases.entries)
        .unwrap_or_default();

    let mut catalog = ReleaseCatalog::default();
    for (index, entry) in entries.into_iter().enumerate() {
        let Some(record) = build_record(index + 1, entry)? else {
            log::debug!(
                "release entry #{} has no download link; ignoring it and older entries",
                index + 1
            );
            break;
        };
        if catalog.records.contains_key(record.version()) {
            log::warn!(
                "duplicate release {} in feed; keeping the newer entry",
                record.version()
            );
            continue;
        }
        catalog.order.push(record.version.clone());
        catalog.records.insert(record.version.clone(), record);
    }

    if let Some(limit) = limit {
        catalog.order.truncate(limit);
    }
    log::debug!(
        "parsed {} releases from {source} ({} listed)",
        catalog.records.len(),
        catalog.order.len()
    );
    Ok(catalog)
}

/// Convert one raw entry; `Ok(None)` marks the stop-at-first-broken entry.
fn build_record(
    position: usize,
    entry: FeedRelease,
) -> Result<Option<ReleaseRecord>, CatalogParseError> {
    let name = required(entry.name.as_deref(), position, "name")?;
    let version = required(entry.version.as_deref(), position, "version")?;
    let Some(url) = non_empty(entry.download_link.as_deref()) else {
        return Ok(None);
    };

    let filename = filename_from_url(url).ok_or_else(|| CatalogParseError::InvalidField {
        version: version.to_owned(),
        field: "download_link",
        reason: format!("no filename in {url}"),
    })?;
    let size = parse_number(entry.filesize.as_deref(), version, "filesize")?;
    let published = parse_number(entry.date.as_deref(), version, "date")?;
    let digest = non_empty(entry.mdhash.as_deref())
        .map(|hex| PackageDigest::parse(DigestAlgorithm::Md5, hex))
        .transpose()
        .map_err(|e| CatalogParseError::InvalidField {
            version: version.to_owned(),
            field: "mdhash",
            reason: e.reason,
        })?;

    Ok(Some(ReleaseRecord {
        version: version.to_owned(),
        name: name.to_owned(),
        url: url.to_owned(),
        filename: filename.to_owned(),
        size,
        digest,
        security: classify(&entry),
        release_page: non_empty(entry.release_link.as_deref()).map(str::to_owned),
        published,
    }))
}

fn required<'a>(
    value: Option<&'a str>,
    position: usize,
    field: &'static str,
) -> Result<&'a str, CatalogParseError> {
    non_empty(value).ok_or(CatalogParseError::MissingField { position, field })
}

fn parse_number(
    value: Option<&str>,
    version: &str,
    field: &'static str,
) -> Result<Option<u64>, CatalogParseError> {
    non_empty(value)
        .map(|text| {
            text.parse::<u64>()
                .map_err(|e| CatalogParseError::InvalidField {
                    version: version.to_owned(),
                    field,
                    reason: format!("\"{text}\" is not a number: {e}"),
                })
        })
        .transpose()
}

fn classify(entry: &FeedRelease) -> Security {
    let Some(terms) = &entry.terms else {
        return Security::Unknown;
    };
    let insecure = terms.entries.iter().any(|term| {
        non_empty(term.value.as_deref()).is_some_and(|value| value.eq_ignore_ascii_case(INSECURE_TERM))
    });
    if insecure {
        Security::Insecure
    } else {
        Security::Nominal
    }
}

#[cfg(test)]
#[path = "catalog_tests.rs"]
mod tests;
