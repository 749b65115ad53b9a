//! Archive staging.
//!
//! A release archive holds one top-level folder (`backdrop/`). The stager
//! extracts the archive into a fresh subfolder of the scratch directory,
//! takes the top-level folder from the first entry's path, and lists that
//! folder's immediate children for reconciliation. The staging subfolder is
//! removed when the [`StagedPackage`] is cleaned up or dropped, whether or
//! not reconciliation succeeded.

use crate::artefact::extraction::{ArchiveExtractor, ExtractionError};
use crate::scratch::{ScratchDir, ScratchError};
use camino::{Utf8Path, Utf8PathBuf};
use std::fs;

/// Errors arising from archive staging.
#[derive(Debug, thiserror::Error)]
pub enum StagingError {
    /// The archive could not be opened, read, or written out.
    #[error("cannot extract {archive}: {source}")]
    Unreadable {
        /// The archive being staged.
        archive: Utf8PathBuf,
        /// Underlying extraction error.
        #[source]
        source: ExtractionError,
    },

    /// An entry would be written outside the staging folder.
    #[error("archive {archive} contains unsafe entry {entry}")]
    PathTraversal {
        /// The archive being staged.
        archive: Utf8PathBuf,
        /// The offending entry name.
        entry: String,
    },

    /// The archive has no entries.
    #[error("archive {archive} is empty")]
    EmptyArchive {
        /// The archive being staged.
        archive: Utf8PathBuf,
    },

    /// The first entry does not name a top-level folder.
    #[error("archive {archive} has no top-level folder (first entry {entry})")]
    NoRootFolder {
        /// The archive being staged.
        archive: Utf8PathBuf,
        /// The first entry name.
        entry: String,
    },

    /// The staged tree could not be enumerated.
    #[error("cannot read staged folder {path}: {source}")]
    Io {
        /// The folder being read.
        path: Utf8PathBuf,
        /// Underlying I/O error.
        #[source]
        source: std::io::Error,
    },

    /// The staging subfolder could not be created.
    #[error(transparent)]
    Scratch(#[from] ScratchError),

    /// The staging subfolder path is not valid UTF-8.
    #[error("staging folder {path} is not valid UTF-8")]
    NonUtf8Path {
        /// Lossy rendering of the path.
        path: String,
    },
}

/// An extracted archive awaiting reconciliation.
#[derive(Debug)]
pub struct StagedPackage {
    archive: Utf8PathBuf,
    root: Utf8PathBuf,
    entries: Vec<String>,
    staging: tempfile::TempDir,
}

impl StagedPackage {
    /// The archive this package was extracted from.
    #[must_use]
    pub fn archive(&self) -> &Utf8Path {
        &self.archive
    }

    /// The archive's top-level folder inside the staging area.
    #[must_use]
    pub fn root(&self) -> &Utf8Path {
        &self.root
    }

    /// Names of the top-level folder's immediate children, sorted.
    #[must_use]
    pub fn entries(&self) -> &[String] {
        &self.entries
    }

    /// Remove the staging subfolder now rather than on drop.
    ///
    /// # Errors
    ///
    /// Returns [`StagingError::Io`] when removal fails.
    pub fn cleanup(self) -> Result<(), StagingError> {
        let path = self.staging.path().to_string_lossy().into_owned();
        self.staging.close().map_err(|source| StagingError::Io {
            path: Utf8PathBuf::from(path),
            source,
        })
    }
}

/// Extracts archives into the scratch directory.
pub struct Stager<'a> {
    scratch: &'a ScratchDir,
    extractor: &'a dyn ArchiveExtractor,
}

impl<'a> Stager<'a> {
    /// Create a stager writing below `scratch`.
    #[must_use]
    pub fn new(scratch: &'a ScratchDir, extractor: &'a dyn ArchiveExtractor) -> Self {
        Self { scratch, extractor }
    }

    /// Extract `archive` and list its top-level folder's children.
    ///
    /// # Errors
    ///
    /// Returns a [`StagingError`] when the archive is unreadable, empty,
    /// unsafe, or lacks a top-level folder, or when the staging folder
    /// cannot be prepared or read.
    pub fn stage(&self, archive: &Utf8Path) -> Result<StagedPackage, StagingError> {
        let names = self
            .extractor
            .list_entries(archive.as_std_path())
            .map_err(|source| map_extraction(archive, source))?;
        let first = names.first().ok_or_else(|| StagingError::EmptyArchive {
            archive: archive.to_owned(),
        })?;
        let root_name = root_folder(first).ok_or_else(|| StagingError::NoRootFolder {
            archive: archive.to_owned(),
            entry: first.clone(),
        })?;

        let staging = self.scratch.staging_area()?;
        let staging_path = Utf8Path::from_path(staging.path()).ok_or_else(|| {
            StagingError::NonUtf8Path {
                path: staging.path().to_string_lossy().into_owned(),
            }
        })?;
        self.extractor
            .extract(archive.as_std_path(), staging_path.as_std_path())
            .map_err(|source| map_extraction(archive, source))?;

        let root = staging_path.join(root_name);
        let entries = list_children(&root)?;
        log::debug!(
            "staged {archive} at {root} with {} top-level entries",
            entries.len()
        );
        Ok(StagedPackage {
            archive: archive.to_owned(),
            root,
            entries,
            staging,
        })
    }
}

impl std::fmt::Debug for Stager<'_> {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Stager")
            .field("scratch", &self.scratch)
            .finish_non_exhaustive()
    }
}

/// Top-level folder named by an archive entry path.
fn root_folder(entry: &str) -> Option<&str> {
    entry
        .split(['/', '\\'])
        .find(|part| !part.is_empty())
        .filter(|part| *part != "." && *part != "..")
}

fn list_children(root: &Utf8Path) -> Result<Vec<String>, StagingError> {
    let io_error = |source| StagingError::Io {
        path: root.to_owned(),
        source,
    };
    let mut entries = Vec::new();
    for entry in fs::read_dir(root).map_err(io_error)? {
        let entry = entry.map_err(io_error)?;
        match entry.file_name().into_string() {
            Ok(name) => entries.push(name),
            Err(name) => log::warn!(
                "skipping staged entry with non-UTF-8 name {}",
                name.to_string_lossy()
            ),
        }
    }
    entries.sort();
    Ok(entries)
}

fn map_extraction(archive: &Utf8Path, source: ExtractionError) -> StagingError {
    match source {
        ExtractionError::PathTraversal { path } => StagingError::PathTraversal {
            archive: archive.to_owned(),
            entry: path,
        },
        ExtractionError::EmptyArchive => StagingError::EmptyArchive {
            archive: archive.to_owned(),
        },
        other => StagingError::Unreadable {
            archive: archive.to_owned(),
            source: other,
        },
    }
}
