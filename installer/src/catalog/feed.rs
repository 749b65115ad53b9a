//! Raw release-feed document shape.
//!
//! These types mirror the XML release-history document one-to-one and keep
//! every field optional; required-field checks happen when the raw entries
//! are converted into [`super::ReleaseRecord`]s so that a missing field can
//! be reported with the entry's position.

use serde::Deserialize;

/// Root `<project>` element.
#[derive(Debug, Default, Deserialize)]
pub(crate) struct FeedDocument {
    #[serde(default)]
    pub(crate) releases: Option<FeedReleases>,
}

/// The `<releases>` container.
#[derive(Debug, Default, Deserialize)]
pub(crate) struct FeedReleases {
    #[serde(default, rename = "release")]
    pub(crate) entries: Vec<FeedRelease>,
}

/// One `<release>` element.
#[derive(Debug, Default, Deserialize)]
pub(crate) struct FeedRelease {
    #[serde(default)]
    pub(crate) name: Option<String>,
    #[serde(default)]
    pub(crate) version: Option<String>,
    #[serde(default)]
    pub(crate) download_link: Option<String>,
    #[serde(default)]
    pub(crate) release_link: Option<String>,
    #[serde(default)]
    pub(crate) filesize: Option<String>,
    #[serde(default)]
    pub(crate) mdhash: Option<String>,
    #[serde(default)]
    pub(crate) date: Option<String>,
    #[serde(default)]
    pub(crate) terms: Option<FeedTerms>,
}

/// The `<terms>` container of a release.
#[derive(Debug, Default, Deserialize)]
pub(crate) struct FeedTerms {
    #[serde(default, rename = "term")]
    pub(crate) entries: Vec<FeedTerm>,
}

/// One classification `<term>`.
#[derive(Debug, Default, Deserialize)]
pub(crate) struct FeedTerm {
    #[serde(default)]
    pub(crate) value: Option<String>,
}

/// Parse the feed XML into its raw shape.
pub(crate) fn parse_document(xml: &str) -> Result<FeedDocument, quick_xml::DeError> {
    quick_xml::de::from_str(xml)
}

/// Treat empty or whitespace-only text as absent.
pub(crate) fn non_empty(value: Option<&str>) -> Option<&str> {
    value.map(str::trim).filter(|text| !text.is_empty())
}
