//! Archive extraction for release packages.
//!
//! Release archives are zip files holding a single top-level folder. Entry
//! paths are validated before anything is written so that a crafted archive
//! cannot escape the destination directory (zip-slip).

use std::fs::{self, File};
use std::io;
use std::path::{Component, Path};

/// Trait for reading and extracting release archives, enabling test mocking.
///
/// # Examples
///
/// ```
/// use backdrop_installer::artefact::extraction::ZipExtractor;
///
/// let extractor = ZipExtractor;
/// // Use extractor.extract(archive_path, dest_dir) in production
/// ```
#[cfg_attr(test, mockall::automock)]
pub trait ArchiveExtractor {
    /// List the entry names of the archive at `archive_path`, in archive
    /// order.
    ///
    /// # Errors
    ///
    /// Returns [`ExtractionError::Zip`] when the archive cannot be read.
    fn list_entries(&self, archive_path: &Path) -> Result<Vec<String>, ExtractionError>;

    /// Extract the archive at `archive_path` into `dest_dir`.
    ///
    /// Returns the number of entries written.
    ///
    /// # Errors
    ///
    /// Returns [`ExtractionError::PathTraversal`] if any entry attempts to
    /// escape the destination directory, [`ExtractionError::EmptyArchive`]
    /// if the archive has no entries, and [`ExtractionError::Io`] or
    /// [`ExtractionError::Zip`] on read or write failures.
    fn extract(&self, archive_path: &Path, dest_dir: &Path) -> Result<usize, ExtractionError>;
}

/// Errors arising from archive extraction.
#[derive(Debug, thiserror::Error)]
pub enum ExtractionError {
    /// I/O error during extraction.
    #[error("extraction I/O error: {0}")]
    Io(#[from] io::Error),

    /// The archive is not a readable zip file.
    #[error("unreadable archive: {0}")]
    Zip(#[from] zip::result::ZipError),

    /// A path in the archive attempts to traverse outside the destination.
    #[error("path traversal detected: {path}")]
    PathTraversal {
        /// The offending path from the archive entry.
        path: String,
    },

    /// The archive contains no entries.
    #[error("archive contains no entries")]
    EmptyArchive,
}

/// Default extractor using the `zip` crate.
#[derive(Debug, Clone, Copy, Default)]
pub struct ZipExtractor;

impl ArchiveExtractor for ZipExtractor {
    fn list_entries(&self, archive_path: &Path) -> Result<Vec<String>, ExtractionError> {
        let mut archive = zip::ZipArchive::new(File::open(archive_path)?)?;
        let mut names = Vec::with_capacity(archive.len());
        for index in 0..archive.len() {
            let entry = archive.by_index_raw(index)?;
            names.push(entry.name().to_owned());
        }
        Ok(names)
    }

    fn extract(&self, archive_path: &Path, dest_dir: &Path) -> Result<usize, ExtractionError> {
        let mut archive = zip::ZipArchive::new(File::open(archive_path)?)?;
        if archive.is_empty() {
            return Err(ExtractionError::EmptyArchive);
        }

        for index in 0..archive.len() {
            let mut entry = archive.by_index(index)?;
            let name = entry.name().to_owned();
            validate_entry_path(Path::new(&name))?;
            let Some(relative) = entry.enclosed_name() else {
                return Err(ExtractionError::PathTraversal { path: name });
            };
            let dest_path = dest_dir.join(relative);

            if entry.is_dir() {
                fs::create_dir_all(&dest_path)?;
                continue;
            }
            if let Some(parent) = dest_path.parent() {
                fs::create_dir_all(parent)?;
            }
            let mut out = File::create(&dest_path)?;
            io::copy(&mut entry, &mut out)?;
            apply_permissions(&dest_path, entry.unix_mode())?;
        }

        log::debug!(
            "extracted {} entries from {} into {}",
            archive.len(),
            archive_path.display(),
            dest_dir.display()
        );
        Ok(archive.len())
    }
}

#[cfg(unix)]
fn apply_permissions(path: &Path, mode: Option<u32>) -> io::Result<()> {
    use std::os::unix::fs::PermissionsExt;

    match mode {
        Some(mode) => fs::set_permissions(path, fs::Permissions::from_mode(mode & 0o777)),
        None => Ok(()),
    }
}

#[cfg(not(unix))]
fn apply_permissions(_path: &Path, _mode: Option<u32>) -> io::Result<()> {
    Ok(())
}

/// Validate that an entry path does not escape the destination
/// directory via `..` components or absolute paths.
fn validate_entry_path(path: &Path) -> Result<(), ExtractionError> {
    let escapes = path.components().any(|component| {
        matches!(
            component,
            Component::ParentDir | Component::RootDir | Component::Prefix(_)
        )
    });
    if escapes {
        return Err(ExtractionError::PathTraversal {
            path: path.display().to_string(),
        });
    }
    Ok(())
}
