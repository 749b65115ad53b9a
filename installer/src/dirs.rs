//! Directory resolution abstraction for platform-specific paths.
//!
//! The installer reads its configuration from the platform configuration
//! directory and, by default, keeps its scratch area beside the executable.
//! Both lookups go through [`BaseDirs`] so tests can substitute fixed paths.

use directories_next::ProjectDirs;
use std::path::PathBuf;

const QUALIFIER: &str = "org";
const ORGANISATION: &str = "backdropcms";
const APPLICATION: &str = "backdrop-installer";

/// Source of the base directories the installer relies on.
#[cfg_attr(test, mockall::automock)]
pub trait BaseDirs {
    /// Directory holding `config.toml`, if the platform defines one.
    fn config_dir(&self) -> Option<PathBuf>;

    /// Directory containing the running executable.
    fn executable_dir(&self) -> Option<PathBuf>;
}

/// [`BaseDirs`] backed by `directories-next` and the current executable.
#[derive(Debug, Clone, Copy, Default)]
pub struct SystemBaseDirs;

impl BaseDirs for SystemBaseDirs {
    fn config_dir(&self) -> Option<PathBuf> {
        ProjectDirs::from(QUALIFIER, ORGANISATION, APPLICATION)
            .map(|dirs| dirs.config_dir().to_path_buf())
    }

    fn executable_dir(&self) -> Option<PathBuf> {
        let exe = std::env::current_exe().ok()?;
        let resolved = exe.canonicalize().unwrap_or(exe);
        resolved.parent().map(PathBuf::from)
    }
}
