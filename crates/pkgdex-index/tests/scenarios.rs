//! End-to-end scenarios: ingest small manifests, then resolve or query.

use pkgdex_core::manifest::ManifestShape;
use pkgdex_core::range::VersionRange;
use pkgdex_core::version::VersionSpec;
use pkgdex_core::warning::Warning;
use pkgdex_index::{Index, IndexBuilder};
use pkgdex_resolver::conflict::Source;
use pkgdex_resolver::resolver::{Resolution, ResolveOptions};
use tracing_subscriber::EnvFilter;

fn init_tracing() {
    let _ = tracing_subscriber::fmt()
        .with_env_filter(EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("warn")))
        .with_test_writer()
        .try_init();
}

fn pkg_info(name: &str, version: &str, requires: &[&str]) -> String {
    let mut text = format!("Metadata-Version: 2.1\nName: {name}\nVersion: {version}\n");
    for req in requires {
        text.push_str(&format!("Requires-Dist: {req}\n"));
    }
    text
}

fn build(blobs: &[String]) -> Index {
    init_tracing();
    let mut builder = IndexBuilder::default();
    let failures = builder.ingest_all(
        blobs
            .iter()
            .enumerate()
            .map(|(i, b)| (format!("blob-{i}"), b.as_bytes(), ManifestShape::Metadata)),
    );
    assert!(failures.is_empty(), "{failures:?}");
    builder.build()
}

fn v(s: &str) -> VersionSpec {
    VersionSpec::parse(s).unwrap()
}

fn assignment(resolution: &Resolution) -> Vec<String> {
    resolution
        .assignment()
        .unwrap_or_else(|| panic!("not resolved: {resolution:?}"))
        .iter()
        .map(|(n, v)| format!("{n} {v}"))
        .collect()
}

#[test]
fn test_resolve_simple_chain() {
    let index = build(&[
        pkg_info("acme", "1.0", &["widget >=1,<2"]),
        pkg_info("widget", "1.2", &[]),
    ]);
    let res = index.resolve(["acme"], &ResolveOptions::default());
    assert_eq!(assignment(&res), vec!["acme 1.0", "widget 1.2"]);
}

#[test]
fn test_resolve_reports_conflict_source() {
    let index = build(&[
        pkg_info("acme", "1.0", &["widget >=2"]),
        pkg_info("widget", "1.2", &[]),
    ]);
    let res = index.resolve(["acme"], &ResolveOptions::default());
    let Resolution::Conflict(report) = res else {
        panic!("expected a conflict, got {res:?}");
    };
    assert_eq!(report.package, "widget");
    assert_eq!(report.len(), 1);
    assert_eq!(report.entries[0].requirement.to_string(), "widget >=2");
    assert_eq!(report.entries[0].source.to_string(), "acme 1.0");
    assert!(report.to_string().contains("widget >=2 (from acme 1.0)"));
}

#[test]
fn test_resolve_tolerates_cycles() {
    let index = build(&[pkg_info("a", "1.0", &["b"]), pkg_info("b", "1.0", &["a"])]);
    let res = index.resolve(["a"], &ResolveOptions::default());
    assert_eq!(assignment(&res), vec!["a 1.0", "b 1.0"]);
}

#[test]
fn test_version_ordering() {
    assert!(v("1.0a1") < v("1.0"));
    assert!(v("1.0.post1") > v("1.0"));
    assert!(v("1.0.dev1") < v("1.0a1"));
}

#[test]
fn test_compatible_release_range() {
    let range = VersionRange::parse("~=1.4").unwrap();
    for inside in ["1.4", "1.4.5", "1.9"] {
        assert!(range.contains(&v(inside)), "{inside} should be in {range}");
    }
    for outside in ["1.3.9", "2.0"] {
        assert!(!range.contains(&v(outside)), "{outside} should not be in {range}");
    }
}

#[test]
fn test_duplicate_record_later_wins() {
    let first = "Metadata-Version: 2.1\nName: acme\nVersion: 1.0\nSummary: first upload\n";
    let second = "Metadata-Version: 2.1\nName: Acme\nVersion: 1.0.0\nSummary: second upload\n";
    let mut builder = IndexBuilder::default();
    builder.ingest("first", first.as_bytes(), ManifestShape::Metadata).unwrap();
    builder.ingest("second", second.as_bytes(), ManifestShape::Metadata).unwrap();
    let index = builder.build();

    let records = index.lookup("acme");
    assert_eq!(records.len(), 1);
    assert_eq!(records[0].summary.as_deref(), Some("second upload"));
    assert_eq!(records[0].source_id, "second");

    let duplicates: Vec<&Warning> = index
        .warnings()
        .iter()
        .filter(|w| matches!(w, Warning::DuplicateRecord { .. }))
        .collect();
    assert_eq!(duplicates.len(), 1);
}

#[test]
fn test_duplicate_record_replaces_edges() {
    let index = build(&[
        pkg_info("acme", "1.0", &["widget"]),
        pkg_info("acme", "1.0", &["gadget"]),
        pkg_info("gadget", "0.3", &[]),
    ]);
    assert!(index.reverse_deps("widget").is_empty());
    let res = index.resolve(["acme"], &ResolveOptions::default());
    assert_eq!(assignment(&res), vec!["acme 1.0", "gadget 0.3"]);
}

#[test]
fn test_unreachable_releases_are_omitted() {
    let index = build(&[
        pkg_info("acme", "1.0", &[]),
        pkg_info("unrelated", "9.9", &["acme"]),
    ]);
    let res = index.resolve(["acme"], &ResolveOptions::default());
    assert_eq!(assignment(&res), vec!["acme 1.0"]);
}

#[test]
fn test_bad_root_requirement_is_dropped_with_warning() {
    let index = build(&[pkg_info("acme", "1.0", &[])]);
    let res = index.resolve(["acme", "widget >=banana"], &ResolveOptions::default());
    let Resolution::Resolved {
        assignment,
        warnings,
    } = res
    else {
        panic!("expected resolution");
    };
    assert_eq!(assignment.len(), 1);
    assert_eq!(warnings.len(), 1);
    assert!(matches!(
        &warnings[0],
        Warning::BadRequirement { source_id, requirement, .. }
            if source_id == "root" && requirement == "widget >=banana"
    ));
}

#[test]
fn test_extras_through_index() {
    let index = build(&[
        pkg_info("acme", "1.0", &["pyyaml ; extra == 'yaml'"]),
        pkg_info("PyYAML", "6.0.1", &[]),
    ]);
    let plain = index.resolve(["acme"], &ResolveOptions::default());
    assert_eq!(assignment(&plain), vec!["acme 1.0"]);
    let with_yaml = index.resolve(["acme[YAML]"], &ResolveOptions::default());
    assert_eq!(assignment(&with_yaml), vec!["acme 1.0", "pyyaml 6.0.1"]);
}

#[test]
fn test_resolution_ignores_ingestion_order() {
    let blobs = vec![
        pkg_info("app", "1.0", &["a", "b"]),
        pkg_info("a", "2.0", &["shared>=2"]),
        pkg_info("a", "1.0", &["shared<2"]),
        pkg_info("b", "1.0", &["shared<2"]),
        pkg_info("shared", "1.0", &[]),
        pkg_info("shared", "2.0", &[]),
    ];
    let mut reversed = blobs.clone();
    reversed.reverse();

    let forward = build(&blobs).resolve(["app"], &ResolveOptions::default());
    let backward = build(&reversed).resolve(["app"], &ResolveOptions::default());
    assert_eq!(forward, backward);
    assert_eq!(
        assignment(&forward),
        vec!["a 1.0", "app 1.0", "b 1.0", "shared 1.0"]
    );
}

#[test]
fn test_root_source_in_conflict() {
    let index = build(&[pkg_info("acme", "1.0", &[])]);
    let res = index.resolve(["acme>=2"], &ResolveOptions::default());
    let Resolution::Conflict(report) = res else {
        panic!("expected conflict");
    };
    assert_eq!(report.sources(), vec![&Source::Root]);
}
