//! Behaviour-driven tests for release catalog parsing.
//!
//! These scenarios exercise feed ordering, truncation, early termination,
//! and security classification using the rstest-bdd mutable world pattern.

use backdrop_installer::catalog::{CatalogError, FetchError, ReleaseCatalog, parse_catalog};
use backdrop_installer::test_utils::{FeedEntry, feed_xml};
use rstest::fixture;
use rstest_bdd_macros::{given, scenario, then, when};

// ---------------------------------------------------------------------------
// World
// ---------------------------------------------------------------------------

#[derive(Default)]
struct CatalogWorld {
    entries: Vec<(String, FeedEntry)>,
    raw_feed: Option<String>,
    result: Option<Result<ReleaseCatalog, CatalogError>>,
}

#[fixture]
fn world() -> CatalogWorld {
    CatalogWorld::default()
}

fn versions(list: &str) -> Vec<String> {
    list.split(',').map(|v| v.trim().to_owned()).collect()
}

fn update_entry(world: &mut CatalogWorld, version: &str, change: fn(FeedEntry) -> FeedEntry) {
    let slot = world
        .entries
        .iter_mut()
        .find(|(v, _)| v == version)
        .expect("release listed in feed");
    slot.1 = change(std::mem::take(&mut slot.1));
}

fn parse(world: &mut CatalogWorld, limit: Option<usize>) {
    let xml = world.raw_feed.clone().unwrap_or_else(|| {
        let entries: Vec<FeedEntry> = world.entries.iter().map(|(_, e)| e.clone()).collect();
        feed_xml(&entries)
    });
    world.result = Some(parse_catalog(&xml, "behaviour", limit));
}

fn catalog(world: &CatalogWorld) -> &ReleaseCatalog {
    match world.result.as_ref().expect("catalog parsed") {
        Ok(catalog) => catalog,
        Err(err) => panic!("expected a catalog, got {err}"),
    }
}

// ---------------------------------------------------------------------------
// Step definitions
// ---------------------------------------------------------------------------

#[given("a feed listing releases \"{list}\"")]
fn given_feed(world: &mut CatalogWorld, list: String) {
    world.entries = versions(&list)
        .into_iter()
        .map(|v| (v.clone(), FeedEntry::new(v)))
        .collect();
}

#[given("release \"{version}\" has no download link")]
fn given_missing_link(world: &mut CatalogWorld, version: String) {
    update_entry(world, &version, FeedEntry::without_link);
}

#[given("release \"{version}\" is marked insecure")]
fn given_insecure(world: &mut CatalogWorld, version: String) {
    update_entry(world, &version, FeedEntry::insecure);
}

#[given("a feed that is not well-formed")]
fn given_malformed_feed(world: &mut CatalogWorld) {
    world.raw_feed = Some("<project><releases>".to_owned());
}

#[when("the catalog is parsed")]
fn when_parsed(world: &mut CatalogWorld) {
    parse(world, None);
}

#[when("the catalog is parsed with a limit of {limit}")]
fn when_parsed_with_limit(world: &mut CatalogWorld, limit: usize) {
    parse(world, Some(limit));
}

#[then("the catalog lists \"{list}\"")]
fn then_catalog_lists(world: &mut CatalogWorld, list: String) {
    assert_eq!(catalog(world).order(), versions(&list).as_slice());
}

#[then("the latest release is \"{version}\"")]
fn then_latest(world: &mut CatalogWorld, version: String) {
    let latest = catalog(world).latest().expect("latest release");
    assert_eq!(latest.version(), version);
}

#[then("release \"{version}\" requires confirmation")]
fn then_requires_confirmation(world: &mut CatalogWorld, version: String) {
    let record = catalog(world).get(&version).expect("release present");
    assert!(record.security().requires_confirmation());
}

#[then("release \"{version}\" does not require confirmation")]
fn then_no_confirmation(world: &mut CatalogWorld, version: String) {
    let record = catalog(world).get(&version).expect("release present");
    assert!(!record.security().requires_confirmation());
}

#[then("parsing fails because the document is invalid")]
fn then_invalid_document(world: &mut CatalogWorld) {
    let result = world.result.as_ref().expect("catalog parsed");
    assert!(
        matches!(
            result,
            Err(CatalogError::Fetch(FetchError::InvalidDocument { .. }))
        ),
        "expected InvalidDocument, got {result:?}"
    );
}

// ---------------------------------------------------------------------------
// Scenario bindings
// ---------------------------------------------------------------------------

#[scenario(
    path = "tests/features/catalog.feature",
    name = "Releases keep feed order"
)]
fn scenario_feed_order(world: CatalogWorld) {
    let _ = world;
}

#[scenario(
    path = "tests/features/catalog.feature",
    name = "A limit keeps only the most recent releases"
)]
fn scenario_limit(world: CatalogWorld) {
    let _ = world;
}

#[scenario(
    path = "tests/features/catalog.feature",
    name = "Parsing stops at a release without a download link"
)]
fn scenario_stop_at_missing_link(world: CatalogWorld) {
    let _ = world;
}

#[scenario(
    path = "tests/features/catalog.feature",
    name = "Insecure releases require confirmation"
)]
fn scenario_insecure(world: CatalogWorld) {
    let _ = world;
}

#[scenario(
    path = "tests/features/catalog.feature",
    name = "A malformed feed is rejected"
)]
fn scenario_malformed(world: CatalogWorld) {
    let _ = world;
}
