//! Output formatting for the installer CLI.
//!
//! Status lines, warnings, and reconciliation reports go to stderr through
//! [`write_stderr_line`]; release listings go to stdout.

use crate::catalog::{ReleaseCatalog, Security};
use crate::reconcile::{EntryOutcome, ReconcileReport};
use serde::Serialize;
use std::io::Write;

/// Write one line, ignoring write failures.
pub fn write_stderr_line(stderr: &mut dyn Write, message: impl std::fmt::Display) {
    if writeln!(stderr, "{message}").is_err() {
        // Best-effort logging; ignore write failures.
    }
}

/// One release as shown by `list --json`.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct ReleaseSummary<'a> {
    /// Version identifier.
    pub version: &'a str,
    /// Display name.
    pub name: &'a str,
    /// Security classification.
    pub security: Security,
    /// Archive download URL.
    pub url: &'a str,
    /// Declared archive size in bytes.
    pub size: Option<u64>,
}

/// Summaries of the listed releases, in feed order.
#[must_use]
pub fn release_summaries(catalog: &ReleaseCatalog) -> Vec<ReleaseSummary<'_>> {
    catalog
        .iter()
        .map(|record| ReleaseSummary {
            version: record.version(),
            name: record.name(),
            security: record.security(),
            url: record.url(),
            size: record.size(),
        })
        .collect()
}

/// Human-readable release listing.
///
/// # Examples
///
/// ```
/// use backdrop_installer::catalog::parse_catalog;
/// use backdrop_installer::output::format_release_list;
///
/// let xml = concat!(
///     "<project><releases>",
///     "<release><name>Backdrop 1.30.0</name><version>1.30.0</version>",
///     "<download_link>https://example.test/backdrop.zip</download_link></release>",
///     "</releases></project>",
/// );
/// let catalog = parse_catalog(xml, "inline", None).expect("valid feed");
/// assert_eq!(format_release_list(&catalog, None), "1 available versions\n1.30.0");
/// ```
#[must_use]
pub fn format_release_list(catalog: &ReleaseCatalog, limit: Option<usize>) -> String {
    let header = match limit {
        Some(limit) => format!("Showing most recent {limit} versions"),
        None => format!("{} available versions", catalog.len()),
    };
    std::iter::once(header)
        .chain(catalog.order().iter().cloned())
        .collect::<Vec<_>>()
        .join("\n")
}

/// Write the per-entry lines and the summary of a reconciliation.
///
/// In quiet mode only skipped entries are reported.
pub fn write_report(stderr: &mut dyn Write, report: &ReconcileReport, quiet: bool) {
    for entry in report.entries() {
        let is_skip = matches!(
            entry.outcome,
            EntryOutcome::SkippedProtected(_) | EntryOutcome::SkippedError { .. }
        );
        if is_skip || !quiet {
            write_stderr_line(stderr, entry);
        }
    }
    if !quiet {
        write_stderr_line(stderr, format!("Done. {}", report.summary()));
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::catalog::parse_catalog;
    use crate::test_utils::{FeedEntry, feed_xml};

    fn catalog(limit: Option<usize>) -> ReleaseCatalog {
        let xml = feed_xml(&[
            FeedEntry::new("1.30.0").insecure().size(100),
            FeedEntry::new("1.29.2"),
            FeedEntry::new("1.29.1").unclassified(),
        ]);
        parse_catalog(&xml, "test", limit).expect("valid feed")
    }

    #[test]
    fn limited_listing_names_the_limit() {
        assert_eq!(
            format_release_list(&catalog(Some(2)), Some(2)),
            "Showing most recent 2 versions\n1.30.0\n1.29.2"
        );
    }

    #[test]
    fn full_listing_counts_versions() {
        let text = format_release_list(&catalog(None), None);
        assert!(text.starts_with("3 available versions\n"));
        assert!(text.ends_with("1.29.1"));
    }

    #[test]
    fn summaries_serialise_with_lowercase_security() {
        let catalog = catalog(None);
        let json = serde_json::to_value(release_summaries(&catalog)).expect("serialise");
        assert_eq!(json[0]["version"], "1.30.0");
        assert_eq!(json[0]["security"], "insecure");
        assert_eq!(json[0]["size"], 100);
        assert_eq!(json[1]["security"], "nominal");
        assert_eq!(json[2]["security"], "unknown");
        assert!(json[2]["size"].is_null());
    }

    #[test]
    fn write_stderr_line_ignores_failures() {
        struct Broken;
        impl Write for Broken {
            fn write(&mut self, _buf: &[u8]) -> std::io::Result<usize> {
                Err(std::io::Error::other("closed"))
            }
            fn flush(&mut self) -> std::io::Result<()> {
                Ok(())
            }
        }
        write_stderr_line(&mut Broken, "ignored");
    }
}
