//! Command orchestration.
//!
//! Each command wires the catalog, fetcher, stager, and reconciler together
//! through the collaborators held in a [`Context`]. Commands either complete,
//! abort at the user's request ([`RunOutcome::Aborted`]), or fail with an
//! [`InstallerError`].

use crate::artefact::digest::compute_digest;
use crate::artefact::download::ReleaseDownloader;
use crate::artefact::extraction::ArchiveExtractor;
use crate::artefact::fetcher::{AcquireRequest, AcquisitionError, Fetcher};
use crate::catalog::{ReleaseCatalog, ReleaseRecord, fetch_catalog};
use crate::cli::{Command, DownloadArgs, InstallLocalArgs, InstallTarget, ListArgs};
use crate::config::InstallerConfig;
use crate::error::{InstallerError, Result};
use crate::output::{format_release_list, release_summaries, write_report, write_stderr_line};
use crate::progress::ProgressStyle;
use crate::prompt::Prompter;
use crate::reconcile::{ReconcileReport, Reconciler};
use crate::scratch::ScratchDir;
use crate::stager::{Stager, StagingError};
use camino::{Utf8Path, Utf8PathBuf};
use std::io::Write;

const DESTINATION_QUESTION: &str = "Enter installation location:";
const REFETCH_QUESTION: &str = "The downloaded package failed verification. Download it again?";

/// How a command ended when it did not fail.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum RunOutcome {
    /// The command did what was asked.
    Completed,
    /// The user declined to continue.
    Aborted,
}

/// Collaborators shared by every command.
pub struct Context<'a> {
    /// Loaded configuration.
    pub config: &'a InstallerConfig,
    /// Feed and archive transport.
    pub downloader: &'a dyn ReleaseDownloader,
    /// Interactive confirmation.
    pub prompter: &'a dyn Prompter,
    /// Archive reader.
    pub extractor: &'a dyn ArchiveExtractor,
    /// Cache and staging area.
    pub scratch: &'a ScratchDir,
    /// Suppress status lines and progress.
    pub quiet: bool,
}

impl std::fmt::Debug for Context<'_> {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Context")
            .field("config", &self.config)
            .field("scratch", &self.scratch)
            .field("quiet", &self.quiet)
            .finish_non_exhaustive()
    }
}

impl Context<'_> {
    fn status(&self, stderr: &mut dyn Write, message: impl std::fmt::Display) {
        if !self.quiet {
            write_stderr_line(stderr, message);
        }
    }

    fn fetcher(&self) -> Fetcher<'_> {
        let progress = if self.quiet {
            ProgressStyle::Silent
        } else {
            ProgressStyle::Terminal
        };
        Fetcher::new(self.downloader, self.prompter, self.scratch)
            .with_max_attempts(self.config.max_download_attempts)
            .with_progress(progress)
            .quiet(self.quiet)
    }
}

/// Dispatch `command`.
///
/// # Errors
///
/// Returns the error of the dispatched command.
pub fn run(
    context: &Context<'_>,
    command: &Command,
    stdout: &mut dyn Write,
    stderr: &mut dyn Write,
) -> Result<RunOutcome> {
    match command {
        Command::List(args) => run_list(context, args, stdout),
        Command::Download(args) => run_download(context, args, stderr),
        Command::InstallLocal(args) => run_install_local(context, args, stderr),
    }
}

/// Print available releases, newest first.
///
/// # Errors
///
/// Returns an error if the catalog cannot be fetched or parsed, or if
/// writing to stdout fails.
pub fn run_list(
    context: &Context<'_>,
    args: &ListArgs,
    stdout: &mut dyn Write,
) -> Result<RunOutcome> {
    let catalog = fetch_catalog(context.downloader, &context.config.feed_url, args.limit)?;
    let output = if args.json {
        serde_json::to_string_pretty(&release_summaries(&catalog))?
    } else {
        format_release_list(&catalog, args.limit)
    };
    writeln!(stdout, "{output}").map_err(|e| InstallerError::WriteFailed { source: e })?;
    Ok(RunOutcome::Completed)
}

/// Download a release and merge it into an installation.
///
/// # Errors
///
/// Returns [`InstallerError::UnknownVersion`] for a version missing from
/// the catalog, and the underlying error when fetching, staging, or
/// preparing the destination fails. An archive that cannot be unpacked is
/// offered for discard and downloaded once more before its staging error is
/// returned.
pub fn run_download(
    context: &Context<'_>,
    args: &DownloadArgs,
    stderr: &mut dyn Write,
) -> Result<RunOutcome> {
    let feed_url = &context.config.feed_url;
    let catalog = fetch_catalog(context.downloader, feed_url, None)?;
    let record = select_release(&catalog, args.version.as_deref(), feed_url)?;

    if record.security().requires_confirmation() {
        write_stderr_line(
            stderr,
            format!("Warning! Version {} is insecure.", record.version()),
        );
        let question = format!("Version {} is insecure. Proceed anyway?", record.version());
        if !context.prompter.confirm(&question)? {
            write_stderr_line(stderr, "Aborting Installation");
            return Ok(RunOutcome::Aborted);
        }
    }

    let _lock = context.scratch.lock()?;
    let archive = acquire_release(context, record, stderr)?;

    let destination = resolve_destination(context, &args.target)?;
    context.status(stderr, format!("Installing in: {destination}"));
    let replace_all = args.target.replace_all;
    match install_archive(context, &archive, &destination, replace_all, stderr) {
        Err(InstallerError::Staging(err)) if is_suspect_archive(&err) => {
            write_stderr_line(stderr, format!("Warning! {err}"));
            let question = format!(
                "Local file {archive} could not be unpacked. Discard it and download again?"
            );
            if !context.prompter.confirm(&question)? {
                return Err(err.into());
            }
            discard_archive(&archive, stderr)?;
            let archive = acquire_release(context, record, stderr)?;
            install_archive(context, &archive, &destination, replace_all, stderr)?;
        }
        result => {
            result?;
        }
    }
    Ok(RunOutcome::Completed)
}

/// Merge an archive already on disk into an installation.
///
/// # Errors
///
/// Returns an error when the archive is missing or does not match the given
/// digest, or when staging or preparing the destination fails.
pub fn run_install_local(
    context: &Context<'_>,
    args: &InstallLocalArgs,
    stderr: &mut dyn Write,
) -> Result<RunOutcome> {
    if !args.path.is_file() {
        return Err(InstallerError::LocalArchiveNotFound {
            path: args.path.clone(),
        });
    }
    if let Some(expected) = args.expected_digest()? {
        context.status(stderr, "Verifying package authenticity.");
        let actual = compute_digest(args.path.as_std_path(), expected.algorithm())?;
        if actual != expected {
            return Err(InstallerError::LocalDigestMismatch {
                path: args.path.clone(),
                expected,
                actual,
            });
        }
        context.status(stderr, "Package authenticity established.");
    }

    let _lock = context.scratch.lock()?;
    let destination = resolve_destination(context, &args.target)?;
    context.status(stderr, format!("Installing into {destination}"));
    install_archive(context, &args.path, &destination, args.target.replace_all, stderr)?;
    Ok(RunOutcome::Completed)
}

fn select_release<'c>(
    catalog: &'c ReleaseCatalog,
    requested: Option<&str>,
    feed_url: &str,
) -> Result<&'c ReleaseRecord> {
    catalog.resolve(requested).ok_or_else(|| match requested {
        Some(version) => InstallerError::UnknownVersion {
            version: version.trim().to_owned(),
        },
        None => InstallerError::EmptyCatalog {
            feed_url: feed_url.to_owned(),
        },
    })
}

/// Acquire the release archive, offering one re-download after a digest
/// mismatch.
fn acquire_release(
    context: &Context<'_>,
    record: &ReleaseRecord,
    stderr: &mut dyn Write,
) -> Result<Utf8PathBuf> {
    let fetcher = context.fetcher();
    let cache_key = record.cache_key();
    let request = AcquireRequest::for_release(record, &cache_key);

    match fetcher.acquire(&request, stderr) {
        Ok(path) => Ok(path),
        Err(err @ AcquisitionError::DigestMismatch { .. }) => {
            if context.prompter.confirm(REFETCH_QUESTION)? {
                Ok(fetcher.acquire(&request, stderr)?)
            } else {
                Err(err.into())
            }
        }
        Err(err) => Err(err.into()),
    }
}

/// Staging failures caused by the archive content rather than the
/// scratch directory.
fn is_suspect_archive(err: &StagingError) -> bool {
    matches!(
        err,
        StagingError::Unreadable { .. }
            | StagingError::PathTraversal { .. }
            | StagingError::EmptyArchive { .. }
            | StagingError::NoRootFolder { .. }
    )
}

fn discard_archive(archive: &Utf8Path, stderr: &mut dyn Write) -> Result<()> {
    write_stderr_line(stderr, format!("Removing {archive}"));
    match std::fs::remove_file(archive) {
        Ok(()) => Ok(()),
        Err(err) if err.kind() == std::io::ErrorKind::NotFound => Ok(()),
        Err(source) => Err(AcquisitionError::Io {
            path: archive.to_owned(),
            source,
        }
        .into()),
    }
}

fn resolve_destination(context: &Context<'_>, target: &InstallTarget) -> Result<Utf8PathBuf> {
    if let Some(dir) = target.install.as_ref().or(context.config.install_dir.as_ref()) {
        return Ok(dir.clone());
    }
    let answer = context.prompter.ask_text(DESTINATION_QUESTION)?;
    let trimmed = answer.trim();
    if trimmed.is_empty() {
        return Err(InstallerError::NoDestination);
    }
    Ok(Utf8PathBuf::from(trimmed))
}

/// Stage `archive`, reconcile it into `destination`, and report.
///
/// The staging folder is removed whether or not reconciliation succeeded.
fn install_archive(
    context: &Context<'_>,
    archive: &Utf8Path,
    destination: &Utf8Path,
    replace_all: bool,
    stderr: &mut dyn Write,
) -> Result<ReconcileReport> {
    let staged = Stager::new(context.scratch, context.extractor).stage(archive)?;
    let result =
        Reconciler::new(replace_all).reconcile(staged.root(), staged.entries(), destination);
    if let Err(err) = staged.cleanup() {
        log::warn!("failed to remove staging folder: {err}");
    }

    let report = result?;
    write_report(stderr, &report, context.quiet);
    Ok(report)
}

#[cfg(test)]
#[path = "commands_tests.rs"]
mod tests;
