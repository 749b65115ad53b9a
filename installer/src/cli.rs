//! CLI argument definitions for the Backdrop installer.
//!
//! This module defines the command-line interface using clap. It is separated
//! from the main entrypoint to keep the binary small and focused on
//! orchestration.

use crate::artefact::digest::{DigestAlgorithm, PackageDigest};
use camino::Utf8PathBuf;
use clap::{Args, Parser, Subcommand};

/// Download and install Backdrop CMS releases.
#[derive(Parser, Debug)]
#[command(name = "backdrop-installer")]
#[command(version, about)]
#[command(long_about = concat!(
    "Download and install Backdrop CMS releases.\n\n",
    "The installer reads the published release history, downloads the chosen ",
    "release into a local cache, checks it against the published size and ",
    "digest, and merges it into an existing installation.\n\n",
    "Site content is never overwritten unless --replace-all is given: the ",
    "files, layouts, modules, sites, and themes folders and the .htaccess, ",
    "settings.php, and sites.php files are left in place when they already ",
    "exist.",
))]
#[command(after_help = concat!(
    "EXAMPLES:\n",
    "  Show the five most recent releases:\n",
    "    $ backdrop-installer list 5\n\n",
    "  Update a site to the newest release:\n",
    "    $ backdrop-installer download -i /var/www/site\n\n",
    "  Install a specific release, replacing everything:\n",
    "    $ backdrop-installer download 1.29.2 -i /var/www/site --replace-all\n\n",
    "  Install from an archive on disk:\n",
    "    $ backdrop-installer install-local ./backdrop.zip -i /var/www/site\n",
))]
pub struct Cli {
    /// Configuration file [default: platform config dir/config.toml].
    #[arg(long, global = true, value_name = "PATH")]
    pub config: Option<Utf8PathBuf>,

    /// Suppress progress output (errors, warnings, and prompts still shown).
    #[arg(short, long, global = true)]
    pub quiet: bool,

    /// Subcommand to execute.
    #[command(subcommand)]
    pub command: Command,
}

/// Available subcommands.
#[derive(Subcommand, Debug, Clone, PartialEq, Eq)]
pub enum Command {
    /// List available releases, newest first.
    List(ListArgs),

    /// Download a release and install it.
    Download(DownloadArgs),

    /// Install a release archive that is already on disk.
    InstallLocal(InstallLocalArgs),
}

/// Arguments for the list command.
#[derive(Args, Debug, Clone, PartialEq, Eq)]
pub struct ListArgs {
    /// Show only the most recent N releases.
    #[arg(value_name = "N")]
    pub limit: Option<usize>,

    /// Output in JSON format for scripting.
    #[arg(long)]
    pub json: bool,
}

/// Options shared by every command that writes into an installation.
#[derive(Args, Debug, Clone, PartialEq, Eq)]
pub struct InstallTarget {
    /// Installation directory [default: prompted].
    #[arg(short, long, value_name = "DIR")]
    pub install: Option<Utf8PathBuf>,

    /// Replace every entry, including protected folders and files.
    #[arg(long)]
    pub replace_all: bool,
}

/// Arguments for the download command.
#[derive(Args, Debug, Clone, PartialEq, Eq)]
pub struct DownloadArgs {
    /// Release version [default: newest].
    #[arg(value_name = "VERSION")]
    pub version: Option<String>,

    /// Installation options.
    #[command(flatten)]
    pub target: InstallTarget,
}

/// Arguments for the install-local command.
#[derive(Args, Debug, Clone, PartialEq, Eq)]
pub struct InstallLocalArgs {
    /// Path to the release archive.
    #[arg(value_name = "PATH")]
    pub path: Utf8PathBuf,

    /// Installation options.
    #[command(flatten)]
    pub target: InstallTarget,

    /// Expected MD5 digest of the archive.
    #[arg(long, value_name = "HEX", conflicts_with = "sha256")]
    pub md5: Option<String>,

    /// Expected SHA-256 digest of the archive.
    #[arg(long, value_name = "HEX")]
    pub sha256: Option<String>,
}

impl InstallLocalArgs {
    /// The digest the archive must match, if one was given.
    ///
    /// # Errors
    ///
    /// Returns [`crate::artefact::digest::DigestError`] when the value is not
    /// a well-formed digest for its algorithm.
    pub fn expected_digest(
        &self,
    ) -> Result<Option<PackageDigest>, crate::artefact::digest::DigestError> {
        match (&self.md5, &self.sha256) {
            (Some(hex), _) => PackageDigest::parse(DigestAlgorithm::Md5, hex).map(Some),
            (None, Some(hex)) => PackageDigest::parse(DigestAlgorithm::Sha256, hex).map(Some),
            (None, None) => Ok(None),
        }
    }
}

#[cfg(test)]
#[path = "cli_tests.rs"]
mod tests;
