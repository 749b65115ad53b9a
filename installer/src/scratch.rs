//! Process-wide scratch directory shared by the fetcher and the stager.
//!
//! The scratch directory doubles as a download cache (archives are kept
//! between runs under a key derived from version and filename) and as the
//! parent of per-run staging folders, which are removed when staging ends.
//! A lock file guards the directory against concurrent runs.

use camino::{Utf8Path, Utf8PathBuf};
use fs2::FileExt;
use std::fs::{self, File, OpenOptions};

const LOCK_FILENAME: &str = ".lock";
const STAGING_PREFIX: &str = "staging-";
const DOWNLOAD_PREFIX: &str = "download-";

/// Errors arising from scratch directory management.
#[derive(Debug, thiserror::Error)]
pub enum ScratchError {
    /// The scratch directory could not be created.
    #[error("failed to create scratch directory {path}: {source}")]
    Create {
        /// Directory that could not be created.
        path: Utf8PathBuf,
        /// Underlying I/O error.
        #[source]
        source: std::io::Error,
    },

    /// Another run currently holds the scratch directory.
    #[error("scratch directory {path} is in use by another run")]
    Locked {
        /// Directory that is locked.
        path: Utf8PathBuf,
    },

    /// The lock file could not be opened or locked.
    #[error("failed to lock scratch directory {path}: {source}")]
    Lock {
        /// Directory that could not be locked.
        path: Utf8PathBuf,
        /// Underlying I/O error.
        #[source]
        source: std::io::Error,
    },
}

/// Handle on the scratch directory.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ScratchDir {
    root: Utf8PathBuf,
}

impl ScratchDir {
    /// Wrap `root` without touching the filesystem.
    #[must_use]
    pub fn new(root: Utf8PathBuf) -> Self {
        Self { root }
    }

    /// The scratch directory path.
    #[must_use]
    pub fn root(&self) -> &Utf8Path {
        &self.root
    }

    /// Create the scratch directory if it does not yet exist.
    ///
    /// # Errors
    ///
    /// Returns [`ScratchError::Create`] when creation fails.
    pub fn ensure(&self) -> Result<(), ScratchError> {
        fs::create_dir_all(&self.root).map_err(|source| ScratchError::Create {
            path: self.root.clone(),
            source,
        })
    }

    /// Take an exclusive lock for the lifetime of the returned guard.
    ///
    /// # Errors
    ///
    /// Returns [`ScratchError::Locked`] when another run holds the lock, or
    /// another [`ScratchError`] when the directory or lock file cannot be
    /// prepared.
    pub fn lock(&self) -> Result<ScratchLock, ScratchError> {
        self.ensure()?;
        let lock_path = self.root.join(LOCK_FILENAME);
        let file = OpenOptions::new()
            .create(true)
            .truncate(false)
            .write(true)
            .open(&lock_path)
            .map_err(|source| ScratchError::Lock {
                path: self.root.clone(),
                source,
            })?;

        match file.try_lock_exclusive() {
            Ok(()) => {
                log::trace!("locked scratch directory {}", self.root);
                let swept = self.sweep_abandoned();
                if swept > 0 {
                    log::debug!("removed {swept} abandoned entries from {}", self.root);
                }
                Ok(ScratchLock { file })
            }
            Err(err) if err.kind() == fs2::lock_contended_error().kind() => {
                Err(ScratchError::Locked {
                    path: self.root.clone(),
                })
            }
            Err(source) => Err(ScratchError::Lock {
                path: self.root.clone(),
                source,
            }),
        }
    }

    /// Deterministic cache location for a downloaded archive.
    ///
    /// Path separators and parent references in `cache_key` are neutralised
    /// so the result always lies directly inside the scratch directory.
    ///
    /// # Examples
    ///
    /// ```
    /// use camino::Utf8PathBuf;
    /// use backdrop_installer::scratch::ScratchDir;
    ///
    /// let scratch = ScratchDir::new(Utf8PathBuf::from("/opt/tool/.tempdir"));
    /// let path = scratch.cache_path("1.30.0backdrop.zip");
    /// assert_eq!(path, Utf8PathBuf::from("/opt/tool/.tempdir/1.30.0backdrop.zip"));
    /// ```
    #[must_use]
    pub fn cache_path(&self, cache_key: &str) -> Utf8PathBuf {
        self.root.join(sanitise_key(cache_key))
    }

    /// Create a uniquely named staging folder inside the scratch directory.
    ///
    /// The folder and everything in it are removed when the returned
    /// [`tempfile::TempDir`] is dropped.
    ///
    /// # Errors
    ///
    /// Returns [`ScratchError::Create`] when the folder cannot be created.
    pub fn staging_area(&self) -> Result<tempfile::TempDir, ScratchError> {
        self.ensure()?;
        tempfile::Builder::new()
            .prefix(STAGING_PREFIX)
            .tempdir_in(&self.root)
            .map_err(|source| ScratchError::Create {
                path: self.root.clone(),
                source,
            })
    }

    /// Reserve a uniquely named file for an in-flight download.
    ///
    /// The file is deleted when the returned [`tempfile::TempPath`] is
    /// dropped, so only a persisted download ever appears under a cache key.
    ///
    /// # Errors
    ///
    /// Returns [`ScratchError::Create`] when the file cannot be created.
    pub fn download_area(&self) -> Result<tempfile::TempPath, ScratchError> {
        self.ensure()?;
        tempfile::Builder::new()
            .prefix(DOWNLOAD_PREFIX)
            .tempfile_in(&self.root)
            .map(tempfile::NamedTempFile::into_temp_path)
            .map_err(|source| ScratchError::Create {
                path: self.root.clone(),
                source,
            })
    }

    /// Remove staging folders and in-flight downloads left by runs that
    /// did not exit cleanly. Only safe while the run lock is held.
    fn sweep_abandoned(&self) -> usize {
        let Ok(entries) = fs::read_dir(&self.root) else {
            return 0;
        };
        let mut removed = 0;
        for entry in entries.filter_map(Result::ok) {
            let Ok(file_type) = entry.file_type() else {
                continue;
            };
            let name = entry.file_name();
            let name = name.to_string_lossy();
            let path = entry.path();
            let result = if file_type.is_dir() && name.starts_with(STAGING_PREFIX) {
                fs::remove_dir_all(&path)
            } else if file_type.is_file() && name.starts_with(DOWNLOAD_PREFIX) {
                fs::remove_file(&path)
            } else {
                continue;
            };
            match result {
                Ok(()) => removed += 1,
                Err(err) => log::warn!("failed to remove abandoned {}: {err}", path.display()),
            }
        }
        removed
    }
}

/// Guard releasing the scratch lock on drop.
#[derive(Debug)]
pub struct ScratchLock {
    file: File,
}

impl Drop for ScratchLock {
    fn drop(&mut self) {
        if let Err(err) = FileExt::unlock(&self.file) {
            log::debug!("failed to release scratch lock: {err}");
        }
    }
}

fn sanitise_key(cache_key: &str) -> String {
    let replaced: String = cache_key
        .chars()
        .map(|c| if matches!(c, '/' | '\\' | ':') { '_' } else { c })
        .collect();
    let trimmed = replaced.trim_start_matches('.');
    if trimmed.is_empty() {
        "_".to_owned()
    } else {
        trimmed.to_owned()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use rstest::rstest;

    fn scratch() -> (tempfile::TempDir, ScratchDir) {
        let temp = tempfile::tempdir().expect("temp dir");
        let root = Utf8PathBuf::try_from(temp.path().join(".tempdir")).expect("UTF-8 path");
        (temp, ScratchDir::new(root))
    }

    #[rstest]
    #[case::plain("1.30.0backdrop.zip", "1.30.0backdrop.zip")]
    #[case::separators("1.30.0/../backdrop.zip", "1.30.0_.._backdrop.zip")]
    #[case::leading_dots("../escape.zip", "_escape.zip")]
    #[case::only_dots("..", "_")]
    fn cache_keys_stay_inside_scratch(#[case] key: &str, #[case] expected: &str) {
        assert_eq!(sanitise_key(key), expected);
    }

    #[test]
    fn ensure_creates_missing_directory() {
        let (_temp, scratch) = scratch();
        assert!(!scratch.root().exists());
        scratch.ensure().expect("ensure");
        assert!(scratch.root().is_dir());
        scratch.ensure().expect("ensure is idempotent");
    }

    #[test]
    fn staging_area_is_removed_on_drop() {
        let (_temp, scratch) = scratch();
        let staging = scratch.staging_area().expect("staging area");
        let path = staging.path().to_path_buf();
        assert!(path.starts_with(scratch.root()));
        drop(staging);
        assert!(!path.exists());
        assert!(scratch.root().exists());
    }

    #[test]
    fn download_area_is_removed_unless_persisted() {
        let (_temp, scratch) = scratch();
        let pending = scratch.download_area().expect("download area");
        let path = pending.to_path_buf();
        assert!(path.starts_with(scratch.root()));
        assert!(!path.ends_with("1.30.0backdrop.zip"));
        drop(pending);
        assert!(!path.exists());
    }

    #[test]
    fn lock_sweeps_leftovers_of_crashed_runs() {
        let (_temp, scratch) = scratch();
        scratch.ensure().expect("ensure");
        let stale_staging = scratch.root().join("staging-abc123");
        fs::create_dir_all(stale_staging.join("backdrop/core")).expect("stale staging");
        let stale_download = scratch.root().join("download-xyz789");
        fs::write(&stale_download, b"trunc").expect("stale download");
        let cached = scratch.cache_path("1.30.0backdrop.zip");
        fs::write(&cached, b"archive").expect("cached archive");

        let _lock = scratch.lock().expect("lock");

        assert!(!stale_staging.exists());
        assert!(!stale_download.exists());
        assert!(cached.exists());
    }

    #[test]
    fn second_lock_is_rejected_until_first_is_released() {
        let (_temp, scratch) = scratch();
        let first = scratch.lock().expect("first lock");
        let second = scratch.lock();
        assert!(matches!(second, Err(ScratchError::Locked { .. })));
        drop(first);
        scratch.lock().expect("lock after release");
    }
}
