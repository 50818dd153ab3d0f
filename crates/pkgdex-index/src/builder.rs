//! Single-producer ingestion of manifests into an [`Index`].

use std::collections::BTreeMap;

use pkgdex_core::config::IndexConfig;
use pkgdex_core::manifest::{self, ManifestShape};
use pkgdex_core::record::{PackageKey, PackageRecord};
use pkgdex_core::version::VersionSpec;
use pkgdex_core::warning::Warning;
use pkgdex_resolver::graph::DependencyGraph;
use pkgdex_util::errors::{PkgdexError, PkgdexResult};

use crate::index::Index;

/// Accumulates records and their dependency edges until [`IndexBuilder::build`].
#[derive(Debug, Default)]
pub struct IndexBuilder {
    config: IndexConfig,
    records: BTreeMap<String, BTreeMap<VersionSpec, PackageRecord>>,
    graph: DependencyGraph,
    warnings: Vec<Warning>,
}

impl IndexBuilder {
    pub fn new(config: IndexConfig) -> Self {
        Self {
            config,
            ..Self::default()
        }
    }

    /// Parse one blob and insert the resulting record.
    ///
    /// Parse warnings are kept in [`IndexBuilder::warnings`]. An error only
    /// concerns this blob; the builder stays usable.
    pub fn ingest(
        &mut self,
        source_id: &str,
        blob: &[u8],
        shape: ManifestShape,
    ) -> PkgdexResult<PackageKey> {
        let parsed = manifest::parse_manifest(source_id, blob, shape)?;
        self.warnings.extend(parsed.warnings);
        self.insert(parsed.record)
    }

    /// Ingest every blob, returning the source ids that failed with their errors.
    pub fn ingest_all<I, S, B>(&mut self, blobs: I) -> Vec<(String, PkgdexError)>
    where
        I: IntoIterator<Item = (S, B, ManifestShape)>,
        S: AsRef<str>,
        B: AsRef<[u8]>,
    {
        let mut failures = Vec::new();
        for (source_id, blob, shape) in blobs {
            let source_id = source_id.as_ref();
            if let Err(e) = self.ingest(source_id, blob.as_ref(), shape) {
                tracing::warn!("skipping {source_id}: {e}");
                failures.push((source_id.to_string(), e));
            }
        }
        failures
    }

    /// Insert an already parsed record.
    ///
    /// A second record with the same `(name, version)` replaces the first and
    /// records a [`Warning::DuplicateRecord`], unless `strict-duplicates` is
    /// set, in which case the first is kept and an error returned.
    pub fn insert(&mut self, record: PackageRecord) -> PkgdexResult<PackageKey> {
        let key = record.key();
        let versions = self.records.entry(key.name.clone()).or_default();

        if let Some(existing) = versions.get(&key.version) {
            if self.config.strict_duplicates {
                return Err(PkgdexError::DuplicateRecord {
                    name: key.name,
                    version: key.version.to_string(),
                });
            }
            tracing::warn!(
                "{key}: {} replaces record from {}",
                record.source_id,
                existing.source_id
            );
            self.warnings.push(Warning::DuplicateRecord {
                name: key.name.clone(),
                version: key.version.to_string(),
                source_id: record.source_id.clone(),
            });
        }

        let config = &self.config;
        let edges = record.requirements.iter().filter(|req| {
            let phantom = config.is_phantom(&req.name);
            if phantom {
                tracing::debug!("{key}: ignoring requirement on phantom name {}", req.name);
            }
            !phantom
        });
        let warnings = self.graph.add_release(key.clone(), edges.cloned());
        self.warnings.extend(warnings);

        tracing::debug!("indexed {key} from {}", record.source_id);
        // `1.0` and `1.0.0` compare equal; keep the later spelling as the key too.
        versions.remove(&key.version);
        versions.insert(key.version.clone(), record);
        Ok(key)
    }

    /// Warnings gathered so far, in ingestion order.
    pub fn warnings(&self) -> &[Warning] {
        &self.warnings
    }

    /// Number of distinct `(name, version)` records held.
    pub fn len(&self) -> usize {
        self.records.values().map(BTreeMap::len).sum()
    }

    pub fn is_empty(&self) -> bool {
        self.records.is_empty()
    }

    /// Freeze the builder into a read-only [`Index`].
    pub fn build(self) -> Index {
        tracing::debug!(
            "building index: {} records, {} edges, {} warnings",
            self.len(),
            self.graph.edge_count(),
            self.warnings.len()
        );
        Index::new(self.config, self.records, self.graph, self.warnings)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    const ACME: &str = "Metadata-Version: 2.1\nName: Acme\nVersion: 1.0\nRequires-Dist: widget (>=1)\nRequires-Dist: json\n";

    #[test]
    fn ingest_records_key_and_edges() {
        let mut builder = IndexBuilder::default();
        let key = builder
            .ingest("acme/PKG-INFO", ACME.as_bytes(), ManifestShape::Metadata)
            .unwrap();
        assert_eq!(key.to_string(), "acme 1.0");
        assert_eq!(builder.len(), 1);
        assert_eq!(builder.graph.edge_count(), 2);
    }

    #[test]
    fn phantom_names_get_no_edges() {
        let config = IndexConfig::default().with_phantom_names(["json"]);
        let mut builder = IndexBuilder::new(config);
        builder
            .ingest("acme/PKG-INFO", ACME.as_bytes(), ManifestShape::Metadata)
            .unwrap();
        assert_eq!(builder.graph.edge_count(), 1);
        assert!(builder.graph.dependents_of("json").is_empty());
    }

    #[test]
    fn malformed_blob_does_not_poison_builder() {
        let mut builder = IndexBuilder::default();
        let err = builder
            .ingest("bad/PKG-INFO", b"Name: nameless-version\n", ManifestShape::Metadata)
            .unwrap_err();
        assert!(matches!(err, PkgdexError::MalformedManifest { .. }));
        assert!(builder.is_empty());
        builder
            .ingest("acme/PKG-INFO", ACME.as_bytes(), ManifestShape::Metadata)
            .unwrap();
        assert_eq!(builder.len(), 1);
    }

    #[test]
    fn strict_duplicates_keep_first() {
        let config = IndexConfig {
            strict_duplicates: true,
            ..IndexConfig::default()
        };
        let mut builder = IndexBuilder::new(config);
        builder
            .ingest("first", ACME.as_bytes(), ManifestShape::Metadata)
            .unwrap();
        let err = builder
            .ingest("second", ACME.as_bytes(), ManifestShape::Metadata)
            .unwrap_err();
        assert!(matches!(err, PkgdexError::DuplicateRecord { .. }));
        let kept = &builder.records["acme"];
        assert_eq!(kept.values().next().unwrap().source_id, "first");
        assert!(builder.warnings().is_empty());
    }
}
