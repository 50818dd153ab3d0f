//! The frozen index and its queries.

use std::collections::{BTreeMap, BTreeSet};

use pkgdex_core::config::IndexConfig;
use pkgdex_core::name::canonicalize;
use pkgdex_core::range::VersionRange;
use pkgdex_core::record::{PackageKey, PackageRecord};
use pkgdex_core::requirement::Requirement;
use pkgdex_core::version::VersionSpec;
use pkgdex_core::warning::Warning;
use pkgdex_resolver::graph::DependencyGraph;
use pkgdex_resolver::resolver::{self, PackageSource, Resolution, ResolveOptions};

/// Read-only view over every ingested record.
///
/// Holds owned data only, so it is `Send + Sync` and can be queried from
/// many threads through an `Arc<Index>`.
#[derive(Debug)]
pub struct Index {
    config: IndexConfig,
    /// Canonical name to records, ascending by version.
    records: BTreeMap<String, BTreeMap<VersionSpec, PackageRecord>>,
    /// Lowercased keyword or classifier to the records carrying it.
    keywords: BTreeMap<String, BTreeSet<PackageKey>>,
    graph: DependencyGraph,
    warnings: Vec<Warning>,
}

impl Index {
    pub(crate) fn new(
        config: IndexConfig,
        records: BTreeMap<String, BTreeMap<VersionSpec, PackageRecord>>,
        graph: DependencyGraph,
        warnings: Vec<Warning>,
    ) -> Self {
        let mut keywords: BTreeMap<String, BTreeSet<PackageKey>> = BTreeMap::new();
        for record in records.values().flat_map(BTreeMap::values) {
            for word in record.keywords.iter().chain(&record.classifiers) {
                keywords
                    .entry(word.trim().to_lowercase())
                    .or_default()
                    .insert(record.key());
            }
        }
        Self {
            config,
            records,
            keywords,
            graph,
            warnings,
        }
    }

    /// Every release of `name`, newest first.
    pub fn lookup(&self, name: &str) -> Vec<&PackageRecord> {
        self.records
            .get(&canonicalize(name))
            .map(|versions| versions.values().rev().collect())
            .unwrap_or_default()
    }

    /// One exact release.
    pub fn get(&self, key: &PackageKey) -> Option<&PackageRecord> {
        self.records.get(&key.name)?.get(&key.version)
    }

    /// The newest release of `name` whose version lies in `range`.
    pub fn find(&self, name: &str, range: &VersionRange) -> Option<&PackageRecord> {
        self.records
            .get(&canonicalize(name))?
            .iter()
            .rev()
            .find(|(version, _)| range.contains(version))
            .map(|(_, record)| record)
    }

    /// Records whose keywords or classifiers include `keyword`, ignoring case.
    /// Ordered by name, then version.
    pub fn search(&self, keyword: &str) -> Vec<&PackageRecord> {
        self.keywords
            .get(&keyword.trim().to_lowercase())
            .into_iter()
            .flatten()
            .filter_map(|key| self.get(key))
            .collect()
    }

    /// Releases that declare a requirement on `name`.
    pub fn reverse_deps(&self, name: &str) -> BTreeSet<PackageKey> {
        self.graph.dependents_of(&canonicalize(name))
    }

    /// Resolve requirement strings against this index.
    ///
    /// Unparseable roots are dropped with a [`Warning::BadRequirement`]. When
    /// `options` sets no step budget the configured `step-budget` applies.
    pub fn resolve<I, S>(&self, roots: I, options: &ResolveOptions) -> Resolution
    where
        I: IntoIterator<Item = S>,
        S: AsRef<str>,
    {
        let mut dropped = Vec::new();
        let mut parsed = Vec::new();
        for text in roots {
            let text = text.as_ref();
            match Requirement::parse(text) {
                Ok(req) => parsed.push(req),
                Err(e) => {
                    tracing::warn!("dropping root requirement '{text}': {e}");
                    dropped.push(Warning::BadRequirement {
                        source_id: "root".to_string(),
                        requirement: text.to_string(),
                        reason: e.to_string(),
                    });
                }
            }
        }

        let mut options = options.clone();
        if options.step_budget.is_none() {
            options.step_budget = self.config.step_budget;
        }

        match resolver::resolve(&parsed, self, &options) {
            Resolution::Resolved {
                assignment,
                warnings,
            } => {
                dropped.extend(warnings);
                Resolution::Resolved {
                    assignment,
                    warnings: dropped,
                }
            }
            other => other,
        }
    }

    /// Canonical names with at least one release, sorted.
    pub fn names(&self) -> impl Iterator<Item = &str> {
        self.records.keys().map(String::as_str)
    }

    /// Every record, ordered by name then ascending version.
    pub fn records(&self) -> impl Iterator<Item = &PackageRecord> {
        self.records.values().flat_map(BTreeMap::values)
    }

    /// Number of records.
    pub fn len(&self) -> usize {
        self.records.values().map(BTreeMap::len).sum()
    }

    pub fn is_empty(&self) -> bool {
        self.records.is_empty()
    }

    /// Warnings raised while the index was built.
    pub fn warnings(&self) -> &[Warning] {
        &self.warnings
    }

    pub fn graph(&self) -> &DependencyGraph {
        &self.graph
    }

    pub fn config(&self) -> &IndexConfig {
        &self.config
    }
}

impl PackageSource for Index {
    fn versions(&self, name: &str) -> Vec<VersionSpec> {
        self.records
            .get(name)
            .map(|versions| versions.keys().cloned().collect())
            .unwrap_or_default()
    }

    fn requirements(
        &self,
        name: &str,
        version: &VersionSpec,
        extras: &BTreeSet<String>,
    ) -> Vec<Requirement> {
        let key = PackageKey::new(name, version.clone());
        self.graph
            .dependencies_of(&key)
            .into_iter()
            .map(|edge| &edge.requirement)
            .filter(|req| req.extra_condition().map_or(true, |e| extras.contains(&e)))
            .cloned()
            .collect()
    }

    fn extras(&self, name: &str, version: &VersionSpec) -> BTreeSet<String> {
        self.records
            .get(name)
            .and_then(|versions| versions.get(version))
            .map(PackageRecord::declared_extras)
            .unwrap_or_default()
    }
}
