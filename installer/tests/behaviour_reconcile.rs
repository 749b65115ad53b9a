//! Behaviour-driven tests for staging and tree reconciliation.
//!
//! These scenarios extract real zip archives into the scratch directory and
//! merge them into a temporary installation.

use backdrop_installer::artefact::extraction::ZipExtractor;
use backdrop_installer::reconcile::{EntryOutcome, ReconcileReport, Reconciler};
use backdrop_installer::scratch::ScratchDir;
use backdrop_installer::stager::{Stager, StagingError};
use backdrop_installer::test_utils::zip_fixture;
use camino::Utf8PathBuf;
use rstest::fixture;
use rstest_bdd_macros::{given, scenario, then, when};
use std::fs;
use tempfile::TempDir;

const RELEASE_INDEX: &str = "<?php // Backdrop 1.30.0";
const SITE_CONTENT: &str = "site content";

// ---------------------------------------------------------------------------
// World
// ---------------------------------------------------------------------------

struct ReconcileWorld {
    _temp_dir: TempDir,
    scratch: ScratchDir,
    archive: Utf8PathBuf,
    site: Utf8PathBuf,
    site_folders: Vec<String>,
    report: Option<ReconcileReport>,
    staging_error: Option<StagingError>,
}

#[fixture]
fn world() -> ReconcileWorld {
    let temp_dir = TempDir::new().expect("temp dir");
    let root = Utf8PathBuf::try_from(temp_dir.path().to_path_buf()).expect("UTF-8 path");
    ReconcileWorld {
        scratch: ScratchDir::new(root.join(".tempdir")),
        archive: root.join("backdrop.zip"),
        site: root.join("site"),
        site_folders: Vec::new(),
        report: None,
        staging_error: None,
        _temp_dir: temp_dir,
    }
}

fn stage_and_reconcile(world: &mut ReconcileWorld, replace_all: bool) {
    let staged = match Stager::new(&world.scratch, &ZipExtractor).stage(&world.archive) {
        Ok(staged) => staged,
        Err(err) => {
            world.staging_error = Some(err);
            return;
        }
    };
    let report = Reconciler::new(replace_all)
        .reconcile(staged.root(), staged.entries(), &world.site)
        .expect("destination is writable");
    staged.cleanup().expect("staging folder removed");
    world.report = Some(report);
}

fn outcome<'a>(world: &'a ReconcileWorld, name: &str) -> &'a EntryOutcome {
    world
        .report
        .as_ref()
        .expect("reconciliation ran")
        .outcome_of(name)
        .unwrap_or_else(|| panic!("no report for {name}"))
}

// ---------------------------------------------------------------------------
// Step definitions
// ---------------------------------------------------------------------------

#[given("an installation holding its own \"{first}\" and \"{second}\" folders")]
fn given_site_folders(world: &mut ReconcileWorld, first: String, second: String) {
    for folder in [first, second] {
        let dir = world.site.join(&folder);
        fs::create_dir_all(&dir).expect("create site folder");
        fs::write(dir.join("own.txt"), SITE_CONTENT).expect("write site file");
        world.site_folders.push(folder);
    }
}

#[given("an installation holding an outdated \"{name}\"")]
fn given_outdated_file(world: &mut ReconcileWorld, name: String) {
    fs::create_dir_all(&world.site).expect("create site");
    fs::write(world.site.join(name), "<?php // outdated").expect("write outdated file");
}

#[given("an empty installation")]
fn given_empty_site(world: &mut ReconcileWorld) {
    fs::create_dir_all(&world.site).expect("create site");
}

#[given("a release archive")]
fn given_release_archive(world: &mut ReconcileWorld) {
    zip_fixture(
        world.archive.as_std_path(),
        &[
            ("backdrop/", b""),
            ("backdrop/index.php", RELEASE_INDEX.as_bytes()),
            ("backdrop/core/", b""),
            ("backdrop/core/includes/bootstrap.inc", b"bootstrap"),
            ("backdrop/sites/sites.php", b"<?php // upstream"),
            ("backdrop/modules/README.txt", b"upstream modules"),
        ],
    )
    .expect("write release archive");
}

#[given("an empty release archive")]
fn given_empty_archive(world: &mut ReconcileWorld) {
    zip_fixture(world.archive.as_std_path(), &[]).expect("write empty archive");
}

#[when("the release is staged and reconciled")]
fn when_reconciled(world: &mut ReconcileWorld) {
    stage_and_reconcile(world, false);
}

#[when("the release is staged and reconciled again")]
fn when_reconciled_again(world: &mut ReconcileWorld) {
    stage_and_reconcile(world, false);
}

#[when("the release is staged and reconciled with replace-all")]
fn when_reconciled_with_replace_all(world: &mut ReconcileWorld) {
    stage_and_reconcile(world, true);
}

#[then("\"{name}\" is installed")]
fn then_installed(world: &mut ReconcileWorld, name: String) {
    assert_eq!(outcome(world, &name), &EntryOutcome::Installed);
}

#[then("\"{name}\" is replaced")]
fn then_replaced(world: &mut ReconcileWorld, name: String) {
    assert_eq!(outcome(world, &name), &EntryOutcome::Replaced);
}

#[then("\"{name}\" is skipped as protected")]
fn then_protected(world: &mut ReconcileWorld, name: String) {
    assert!(matches!(
        outcome(world, &name),
        EntryOutcome::SkippedProtected(_)
    ));
}

#[then("\"{name}\" holds the release content")]
fn then_release_content(world: &mut ReconcileWorld, name: String) {
    let content = fs::read_to_string(world.site.join(name)).expect("read installed file");
    assert_eq!(content, RELEASE_INDEX);
}

#[then("the installation's own settings are unchanged")]
fn then_site_unchanged(world: &mut ReconcileWorld) {
    for folder in &world.site_folders {
        let content =
            fs::read_to_string(world.site.join(folder).join("own.txt")).expect("site file kept");
        assert_eq!(content, SITE_CONTENT);
    }
}

#[then("the installation's own settings are gone")]
fn then_site_replaced(world: &mut ReconcileWorld) {
    for folder in &world.site_folders {
        assert!(!world.site.join(folder).join("own.txt").exists());
        assert!(world.site.join(folder).is_dir());
    }
}

#[then("staging fails because the archive is empty")]
fn then_empty_archive(world: &mut ReconcileWorld) {
    let err = world.staging_error.as_ref().expect("staging failed");
    assert!(
        matches!(err, StagingError::EmptyArchive { .. }),
        "expected EmptyArchive, got {err:?}"
    );
    assert!(world.report.is_none());
}

// ---------------------------------------------------------------------------
// Scenario bindings
// ---------------------------------------------------------------------------

#[scenario(
    path = "tests/features/reconcile.feature",
    name = "Protected site folders survive an update"
)]
fn scenario_protected_folders(world: ReconcileWorld) {
    let _ = world;
}

#[scenario(
    path = "tests/features/reconcile.feature",
    name = "Replace-all overrides protection"
)]
fn scenario_replace_all(world: ReconcileWorld) {
    let _ = world;
}

#[scenario(
    path = "tests/features/reconcile.feature",
    name = "Existing core files are replaced"
)]
fn scenario_core_replaced(world: ReconcileWorld) {
    let _ = world;
}

#[scenario(
    path = "tests/features/reconcile.feature",
    name = "Reconciling twice changes nothing further"
)]
fn scenario_idempotent(world: ReconcileWorld) {
    let _ = world;
}

#[scenario(
    path = "tests/features/reconcile.feature",
    name = "An empty archive is rejected"
)]
fn scenario_empty_archive(world: ReconcileWorld) {
    let _ = world;
}
