//! Conflict and cancellation reporting.

use std::collections::BTreeMap;
use std::fmt;

use pkgdex_core::record::PackageKey;
use pkgdex_core::requirement::Requirement;
use pkgdex_core::version::VersionSpec;
use serde::{Deserialize, Serialize};

/// Where a constraint came from.
#[derive(Debug, Clone, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
pub enum Source {
    /// The root requirement set passed to the resolver.
    Root,
    /// A requirement declared by an assigned release.
    Package(PackageKey),
}

impl fmt::Display for Source {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Source::Root => f.write_str("root"),
            Source::Package(key) => write!(f, "{key}"),
        }
    }
}

/// A minimal set of constraints that together leave `package` without any
/// acceptable version.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ConflictReport {
    /// Canonical name of the package whose candidates were exhausted.
    pub package: String,
    pub entries: Vec<ConflictEntry>,
}

/// One requirement taking part in a conflict, and who declared it.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ConflictEntry {
    pub requirement: Requirement,
    pub source: Source,
}

impl ConflictReport {
    pub fn new(package: impl Into<String>) -> Self {
        Self {
            package: package.into(),
            entries: Vec::new(),
        }
    }

    pub fn add(&mut self, requirement: Requirement, source: Source) {
        self.entries.push(ConflictEntry {
            requirement,
            source,
        });
    }

    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }

    pub fn len(&self) -> usize {
        self.entries.len()
    }

    /// Sources in entry order, deduplicated.
    pub fn sources(&self) -> Vec<&Source> {
        let mut out: Vec<&Source> = Vec::new();
        for entry in &self.entries {
            if !out.contains(&&entry.source) {
                out.push(&entry.source);
            }
        }
        out
    }
}

impl fmt::Display for ConflictReport {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        writeln!(f, "No version of {} satisfies:", self.package)?;
        for entry in &self.entries {
            writeln!(f, "  {} (from {})", entry.requirement, entry.source)?;
        }
        Ok(())
    }
}

/// Why a resolution stopped before finishing.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum CancelReason {
    StepBudget,
    CancelFlag,
}

impl fmt::Display for CancelReason {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            CancelReason::StepBudget => f.write_str("step budget exhausted"),
            CancelReason::CancelFlag => f.write_str("cancelled"),
        }
    }
}

/// State of the search when it was stopped.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct PartialProgress {
    pub reason: CancelReason,
    /// Candidate visits performed.
    pub steps: u64,
    /// Versions chosen so far.
    pub assignment: BTreeMap<String, VersionSpec>,
    /// Required names not yet assigned, sorted.
    pub frontier: Vec<String>,
}

impl fmt::Display for PartialProgress {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(
            f,
            "{} after {} steps ({} assigned, {} pending)",
            self.reason,
            self.steps,
            self.assignment.len(),
            self.frontier.len()
        )
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn report_display() {
        let mut report = ConflictReport::new("widget");
        report.add(
            Requirement::parse("widget>=2").unwrap(),
            Source::Package(PackageKey::new("acme", VersionSpec::parse("1.0").unwrap())),
        );
        report.add(Requirement::parse("widget<1.5").unwrap(), Source::Root);
        assert_eq!(report.len(), 2);
        assert_eq!(
            report.to_string(),
            "No version of widget satisfies:\n  widget >=2 (from acme 1.0)\n  widget <1.5 (from root)\n"
        );
    }

    #[test]
    fn sources_are_deduplicated() {
        let mut report = ConflictReport::new("widget");
        report.add(Requirement::parse("widget>=2").unwrap(), Source::Root);
        report.add(Requirement::parse("widget!=3").unwrap(), Source::Root);
        assert_eq!(report.sources(), vec![&Source::Root]);
    }

    #[test]
    fn progress_display() {
        let progress = PartialProgress {
            reason: CancelReason::StepBudget,
            steps: 3,
            assignment: BTreeMap::new(),
            frontier: vec!["a".into()],
        };
        assert_eq!(
            progress.to_string(),
            "step budget exhausted after 3 steps (0 assigned, 1 pending)"
        );
    }
}
