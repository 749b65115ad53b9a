//! Shared test utilities for the installer crate.

use crate::artefact::download::{DownloadError, ReleaseDownloader};
use crate::progress::ProgressTracker;
use crate::prompt::{PromptError, Prompter, is_affirmative};
use std::cell::RefCell;
use std::collections::VecDeque;
use std::fs::File;
use std::io::Write;
use std::path::Path;

/// A `Prompter` that replays queued answers in order.
///
/// Every question is recorded so tests can assert on what the user was
/// asked. Running out of answers yields [`PromptError::NoAnswer`], which
/// keeps an unexpected prompt from silently defaulting.
#[derive(Debug, Default)]
pub struct ScriptedPrompter {
    answers: RefCell<VecDeque<String>>,
    asked: RefCell<Vec<String>>,
}

impl ScriptedPrompter {
    /// Creates a prompter that will answer with `answers`, in order.
    pub fn new<I, S>(answers: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        Self {
            answers: RefCell::new(answers.into_iter().map(Into::into).collect()),
            asked: RefCell::new(Vec::new()),
        }
    }

    /// Questions asked so far.
    pub fn asked(&self) -> Vec<String> {
        self.asked.borrow().clone()
    }

    /// Number of answers not yet consumed.
    pub fn remaining(&self) -> usize {
        self.answers.borrow().len()
    }

    fn next_answer(&self, question: &str) -> Result<String, PromptError> {
        self.asked.borrow_mut().push(question.to_owned());
        self.answers
            .borrow_mut()
            .pop_front()
            .ok_or_else(|| PromptError::NoAnswer {
                question: question.to_owned(),
            })
    }
}

impl Prompter for ScriptedPrompter {
    fn confirm(&self, question: &str) -> Result<bool, PromptError> {
        self.next_answer(question)
            .map(|answer| is_affirmative(&answer))
    }

    fn ask_text(&self, question: &str) -> Result<String, PromptError> {
        self.next_answer(question)
    }
}

/// Scripted result of one archive download.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum ArchiveResponse {
    /// Serve the full body.
    Serve(Vec<u8>),
    /// Write the leading bytes, then fail with a transport error.
    Interrupt {
        /// Bytes written before the failure.
        partial: Vec<u8>,
        /// Failure description.
        reason: String,
    },
    /// Fail before writing anything.
    Fail(String),
}

/// A `ReleaseDownloader` serving a canned feed and scripted archive
/// responses.
#[derive(Debug, Default)]
pub struct StubDownloader {
    feed: Option<String>,
    archives: RefCell<VecDeque<ArchiveResponse>>,
    feed_requests: RefCell<Vec<String>>,
    archive_requests: RefCell<Vec<String>>,
}

impl StubDownloader {
    /// Creates a downloader whose feed requests return `feed`.
    pub fn with_feed(feed: impl Into<String>) -> Self {
        Self {
            feed: Some(feed.into()),
            ..Self::default()
        }
    }

    /// Queues the response for the next archive download.
    #[must_use]
    pub fn then_archive(self, response: ArchiveResponse) -> Self {
        self.archives.borrow_mut().push_back(response);
        self
    }

    /// URLs requested as feeds.
    pub fn feed_requests(&self) -> Vec<String> {
        self.feed_requests.borrow().clone()
    }

    /// URLs requested as archives.
    pub fn archive_requests(&self) -> Vec<String> {
        self.archive_requests.borrow().clone()
    }
}

impl ReleaseDownloader for StubDownloader {
    fn download_feed(&self, url: &str) -> Result<String, DownloadError> {
        self.feed_requests.borrow_mut().push(url.to_owned());
        self.feed.clone().ok_or_else(|| DownloadError::NotFound {
            url: url.to_owned(),
        })
    }

    fn download_archive(
        &self,
        url: &str,
        dest: &Path,
        progress: &mut ProgressTracker,
    ) -> Result<u64, DownloadError> {
        self.archive_requests.borrow_mut().push(url.to_owned());
        let response = self
            .archives
            .borrow_mut()
            .pop_front()
            .ok_or_else(|| DownloadError::HttpError {
                url: url.to_owned(),
                reason: "no scripted archive response".to_owned(),
            })?;
        match response {
            ArchiveResponse::Serve(body) => {
                let mut file = File::create(dest)?;
                file.write_all(&body)?;
                progress.advance(body.len() as u64);
                progress.finish();
                Ok(body.len() as u64)
            }
            ArchiveResponse::Interrupt { partial, reason } => {
                let mut file = File::create(dest)?;
                file.write_all(&partial)?;
                progress.advance(partial.len() as u64);
                Err(DownloadError::HttpError {
                    url: url.to_owned(),
                    reason,
                })
            }
            ArchiveResponse::Fail(reason) => Err(DownloadError::HttpError {
                url: url.to_owned(),
                reason,
            }),
        }
    }
}

/// Writes a zip archive at `path`.
///
/// Names ending in `/` become directory entries; all other names become
/// files holding the given contents.
///
/// # Errors
///
/// Returns an error if the archive cannot be written.
pub fn zip_fixture(path: &Path, entries: &[(&str, &[u8])]) -> std::io::Result<()> {
    let file = File::create(path)?;
    let mut writer = zip::ZipWriter::new(file);
    let options = zip::write::SimpleFileOptions::default();
    for (name, contents) in entries {
        if name.ends_with('/') {
            writer.add_directory(*name, options).map_err(std::io::Error::other)?;
        } else {
            writer.start_file(*name, options).map_err(std::io::Error::other)?;
            writer.write_all(contents)?;
        }
    }
    writer.finish().map_err(std::io::Error::other)?;
    Ok(())
}

/// Builds zip archive bytes in memory; see [`zip_fixture`].
///
/// # Errors
///
/// Returns an error if the archive cannot be assembled.
pub fn zip_bytes(entries: &[(&str, &[u8])]) -> std::io::Result<Vec<u8>> {
    let temp = tempfile::tempdir()?;
    let path = temp.path().join("fixture.zip");
    zip_fixture(&path, entries)?;
    std::fs::read(path)
}

/// One `<release>` entry for [`feed_xml`].
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct FeedEntry {
    version: String,
    link: bool,
    insecure: bool,
    classified: bool,
    size: Option<u64>,
    md5: Option<String>,
}

impl FeedEntry {
    /// A classified, nominal release with a download link.
    pub fn new(version: impl Into<String>) -> Self {
        Self {
            version: version.into(),
            link: true,
            classified: true,
            ..Self::default()
        }
    }

    /// Marks the release insecure.
    #[must_use]
    pub fn insecure(mut self) -> Self {
        self.insecure = true;
        self
    }

    /// Omits the `<terms>` block.
    #[must_use]
    pub fn unclassified(mut self) -> Self {
        self.classified = false;
        self
    }

    /// Omits the download link.
    #[must_use]
    pub fn without_link(mut self) -> Self {
        self.link = false;
        self
    }

    /// Declares the archive size.
    #[must_use]
    pub fn size(mut self, size: u64) -> Self {
        self.size = Some(size);
        self
    }

    /// Declares the archive MD5 digest.
    #[must_use]
    pub fn md5(mut self, hex: impl Into<String>) -> Self {
        self.md5 = Some(hex.into());
        self
    }

    /// Download URL used for this entry.
    pub fn url(&self) -> String {
        download_url(&self.version)
    }
}

/// Download URL the fixtures use for `version`.
pub fn download_url(version: &str) -> String {
    format!("https://github.com/backdrop/backdrop/releases/download/{version}/backdrop.zip")
}

/// Renders a release feed document holding `entries` in order.
pub fn feed_xml(entries: &[FeedEntry]) -> String {
    let mut xml = String::from("<?xml version=\"1.0\" encoding=\"utf-8\"?>\n");
    xml.push_str("<project><title>Backdrop CMS</title><short_name>backdrop</short_name><releases>");
    for entry in entries {
        let version = &entry.version;
        xml.push_str(&format!(
            "<release><name>Backdrop {version}</name><version>{version}</version>"
        ));
        if entry.link {
            xml.push_str(&format!("<download_link>{}</download_link>", entry.url()));
        }
        if let Some(size) = entry.size {
            xml.push_str(&format!("<filesize>{size}</filesize>"));
        }
        if let Some(md5) = &entry.md5 {
            xml.push_str(&format!("<mdhash>{md5}</mdhash>"));
        }
        if entry.classified {
            let value = if entry.insecure { "Insecure" } else { "Bug fixes" };
            xml.push_str(&format!(
                "<terms><term><name>Release type</name><value>{value}</value></term></terms>"
            ));
        }
        xml.push_str("</release>");
    }
    xml.push_str("</releases></project>");
    xml
}
