//! Merging a staged package into an installation directory.
//!
//! Each top-level entry of the staged package is handled on its own. The
//! [`MergeDecision`] for an entry depends only on whether the destination
//! already has it, whether replacement is forced, and whether its name is
//! protected. Failures are recorded per entry in the [`ReconcileReport`]
//! and never stop the remaining entries.
//!
//! # Sub-modules
//!
//! - `transfer` - Whole-entry move and removal.

mod transfer;

use camino::{Utf8Path, Utf8PathBuf};
use std::collections::BTreeSet;
use std::fmt;
use std::path::Component;

/// Folder names holding user content and configuration.
pub const PROTECTED_FOLDERS: [&str; 5] = ["files", "layouts", "modules", "sites", "themes"];

/// File names holding access rules, settings, and site routing.
pub const PROTECTED_FILES: [&str; 3] = [".htaccess", "settings.php", "sites.php"];

/// Which protected set an entry name belongs to.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum ProtectedKind {
    /// A protected folder name.
    Folder,
    /// A protected file name.
    File,
}

/// The fixed protected-name policy.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ProtectedNames {
    folders: BTreeSet<&'static str>,
    files: BTreeSet<&'static str>,
}

impl Default for ProtectedNames {
    fn default() -> Self {
        Self {
            folders: PROTECTED_FOLDERS.into_iter().collect(),
            files: PROTECTED_FILES.into_iter().collect(),
        }
    }
}

impl ProtectedNames {
    /// Which protected set, if any, `name` belongs to.
    ///
    /// # Examples
    ///
    /// ```
    /// use backdrop_installer::reconcile::{ProtectedKind, ProtectedNames};
    ///
    /// let names = ProtectedNames::default();
    /// assert_eq!(names.classify("sites"), Some(ProtectedKind::Folder));
    /// assert_eq!(names.classify(".htaccess"), Some(ProtectedKind::File));
    /// assert_eq!(names.classify("core"), None);
    /// ```
    #[must_use]
    pub fn classify(&self, name: &str) -> Option<ProtectedKind> {
        if self.folders.contains(name) {
            Some(ProtectedKind::Folder)
        } else if self.files.contains(name) {
            Some(ProtectedKind::File)
        } else {
            None
        }
    }
}

/// How a single top-level entry is merged.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum MergeDecision {
    /// The destination lacks the entry; move it in.
    Install,
    /// Replacement is forced; remove the existing entry and move in.
    Replace,
    /// The entry is protected and exists; leave it alone.
    ProtectSkip(ProtectedKind),
    /// The entry exists and is not protected; try to replace it.
    AttemptReplace,
}

/// Pure merge policy for one entry.
///
/// # Examples
///
/// ```
/// use backdrop_installer::reconcile::{MergeDecision, ProtectedKind, decide};
///
/// assert_eq!(decide(false, false, Some(ProtectedKind::Folder)), MergeDecision::Install);
/// assert_eq!(decide(true, true, Some(ProtectedKind::Folder)), MergeDecision::Replace);
/// assert_eq!(
///     decide(true, false, Some(ProtectedKind::Folder)),
///     MergeDecision::ProtectSkip(ProtectedKind::Folder),
/// );
/// assert_eq!(decide(true, false, None), MergeDecision::AttemptReplace);
/// ```
#[must_use]
pub const fn decide(
    destination_exists: bool,
    force_replace_all: bool,
    protected: Option<ProtectedKind>,
) -> MergeDecision {
    match (destination_exists, force_replace_all, protected) {
        (false, _, _) => MergeDecision::Install,
        (true, true, _) => MergeDecision::Replace,
        (true, false, Some(kind)) => MergeDecision::ProtectSkip(kind),
        (true, false, None) => MergeDecision::AttemptReplace,
    }
}

/// What happened to one entry.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum EntryOutcome {
    /// Moved into a destination that lacked it.
    Installed,
    /// Replaced an existing destination entry.
    Replaced,
    /// Left untouched because its name is protected.
    SkippedProtected(ProtectedKind),
    /// Left in place because removal or moving failed.
    SkippedError {
        /// Description of the failure.
        reason: String,
    },
}

/// Decision and outcome for one entry.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct EntryReport {
    /// Entry name relative to the package root.
    pub name: String,
    /// Decision taken.
    pub decision: MergeDecision,
    /// Result of applying the decision.
    pub outcome: EntryOutcome,
}

impl fmt::Display for EntryReport {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let name = &self.name;
        match &self.outcome {
            EntryOutcome::Installed => write!(f, "Installed {name}"),
            EntryOutcome::Replaced => write!(f, "Replaced {name}"),
            EntryOutcome::SkippedProtected(ProtectedKind::Folder) => {
                write!(f, "Skipping {name}. Directory already exists.")
            }
            EntryOutcome::SkippedProtected(ProtectedKind::File) => {
                write!(f, "Skipping {name}. File already exists.")
            }
            EntryOutcome::SkippedError { reason } => write!(f, "Skipping {name}: {reason}"),
        }
    }
}

/// Per-entry results of one reconciliation, in processing order.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct ReconcileReport {
    entries: Vec<EntryReport>,
}

impl ReconcileReport {
    /// All entry reports.
    #[must_use]
    pub fn entries(&self) -> &[EntryReport] {
        &self.entries
    }

    /// Outcome recorded for `name`.
    #[must_use]
    pub fn outcome_of(&self, name: &str) -> Option<&EntryOutcome> {
        self.entries
            .iter()
            .find(|entry| entry.name == name)
            .map(|entry| &entry.outcome)
    }

    /// Number of installed entries.
    #[must_use]
    pub fn installed(&self) -> usize {
        self.count(|outcome| matches!(outcome, EntryOutcome::Installed))
    }

    /// Number of replaced entries.
    #[must_use]
    pub fn replaced(&self) -> usize {
        self.count(|outcome| matches!(outcome, EntryOutcome::Replaced))
    }

    /// Number of protected entries left untouched.
    #[must_use]
    pub fn protected(&self) -> usize {
        self.count(|outcome| matches!(outcome, EntryOutcome::SkippedProtected(_)))
    }

    /// Number of entries skipped because of an error.
    #[must_use]
    pub fn failed(&self) -> usize {
        self.count(|outcome| matches!(outcome, EntryOutcome::SkippedError { .. }))
    }

    /// One-line summary of the counts.
    #[must_use]
    pub fn summary(&self) -> String {
        format!(
            "{} installed, {} replaced, {} protected, {} failed",
            self.installed(),
            self.replaced(),
            self.protected(),
            self.failed()
        )
    }

    fn count(&self, predicate: impl Fn(&EntryOutcome) -> bool) -> usize {
        self.entries
            .iter()
            .filter(|entry| predicate(&entry.outcome))
            .count()
    }
}

/// The destination directory could not be prepared.
#[derive(Debug, thiserror::Error)]
#[error("cannot prepare installation directory {path}: {source}")]
pub struct ReconcileError {
    /// The destination directory.
    pub path: Utf8PathBuf,
    /// Underlying I/O error.
    #[source]
    pub source: std::io::Error,
}

/// Applies the merge policy to staged entries.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct Reconciler {
    protected: ProtectedNames,
    force_replace_all: bool,
}

impl Reconciler {
    /// Reconciler with the default protected names.
    #[must_use]
    pub fn new(force_replace_all: bool) -> Self {
        Self {
            protected: ProtectedNames::default(),
            force_replace_all,
        }
    }

    /// Merge `entries` from `staged_root` into `destination`.
    ///
    /// The destination is created when absent. Each entry yields exactly one
    /// [`EntryReport`].
    ///
    /// # Errors
    ///
    /// Returns [`ReconcileError`] only when the destination directory cannot
    /// be created; per-entry failures are reported as
    /// [`EntryOutcome::SkippedError`].
    pub fn reconcile(
        &self,
        staged_root: &Utf8Path,
        entries: &[String],
        destination: &Utf8Path,
    ) -> Result<ReconcileReport, ReconcileError> {
        std::fs::create_dir_all(destination).map_err(|source| ReconcileError {
            path: destination.to_owned(),
            source,
        })?;

        let mut report = ReconcileReport::default();
        for name in entries {
            let entry = self.reconcile_entry(staged_root, name, destination);
            if let EntryOutcome::SkippedError { reason } = &entry.outcome {
                log::warn!("skipped {name}: {reason}");
            } else {
                log::debug!("{name}: {:?} -> {:?}", entry.decision, entry.outcome);
            }
            report.entries.push(entry);
        }
        Ok(report)
    }

    fn reconcile_entry(
        &self,
        staged_root: &Utf8Path,
        name: &str,
        destination: &Utf8Path,
    ) -> EntryReport {
        let target = destination.join(name);
        let exists = std::fs::symlink_metadata(&target).is_ok();
        let decision = decide(exists, self.force_replace_all, self.protected.classify(name));

        let outcome = if is_plain_name(name) {
            apply(decision, &staged_root.join(name), &target)
        } else {
            EntryOutcome::SkippedError {
                reason: "not a plain entry name".to_owned(),
            }
        };
        EntryReport {
            name: name.to_owned(),
            decision,
            outcome,
        }
    }
}

/// Merge `entries` from `staged_root` into `destination` with the default
/// protected names.
///
/// # Errors
///
/// See [`Reconciler::reconcile`].
pub fn reconcile(
    staged_root: &Utf8Path,
    entries: &[String],
    destination: &Utf8Path,
    force_replace_all: bool,
) -> Result<ReconcileReport, ReconcileError> {
    Reconciler::new(force_replace_all).reconcile(staged_root, entries, destination)
}

fn apply(decision: MergeDecision, source: &Utf8Path, target: &Utf8Path) -> EntryOutcome {
    match decision {
        MergeDecision::ProtectSkip(kind) => EntryOutcome::SkippedProtected(kind),
        MergeDecision::Install => match transfer::move_entry(source, target) {
            Ok(()) => EntryOutcome::Installed,
            Err(err) => EntryOutcome::SkippedError {
                reason: format!("cannot move into {target}: {err}"),
            },
        },
        MergeDecision::Replace | MergeDecision::AttemptReplace => {
            if !source.exists() {
                return EntryOutcome::SkippedError {
                    reason: format!("staged entry {source} is missing"),
                };
            }
            if let Err(err) = transfer::remove_entry(target) {
                return EntryOutcome::SkippedError {
                    reason: format!("cannot remove existing {target} (locked?): {err}"),
                };
            }
            match transfer::move_entry(source, target) {
                Ok(()) => EntryOutcome::Replaced,
                Err(err) => EntryOutcome::SkippedError {
                    reason: format!("removed {target} but cannot move replacement in: {err}"),
                },
            }
        }
    }
}

fn is_plain_name(name: &str) -> bool {
    let mut components = std::path::Path::new(name).components();
    matches!(
        (components.next(), components.next()),
        (Some(Component::Normal(_)), None)
    )
}

#[cfg(test)]
#[path = "reconcile_tests.rs"]
mod tests;
