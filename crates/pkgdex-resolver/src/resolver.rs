//! Version resolution: backtracking search with forward checking and
//! conflict-directed backjumping.
//!
//! Each decision level assigns one package name. Every constraint remembers
//! the decision levels it depends on; when a level runs out of candidates the
//! union of those levels tells the search how far back it may jump.

use std::cmp::Ordering;
use std::collections::{BTreeMap, BTreeSet, HashMap, VecDeque};
use std::sync::atomic::{self, AtomicBool};
use std::sync::Arc;

use pkgdex_core::record::PackageKey;
use pkgdex_core::requirement::Requirement;
use pkgdex_core::version::VersionSpec;
use pkgdex_core::warning::Warning;

use crate::conflict::{CancelReason, ConflictEntry, ConflictReport, PartialProgress, Source};

/// What the resolver needs to know about the available releases.
pub trait PackageSource {
    /// Every known version of `name`, in any order.
    fn versions(&self, name: &str) -> Vec<VersionSpec>;

    /// Requirements of one release: unconditional ones plus those
    /// conditional on one of `extras`.
    fn requirements(
        &self,
        name: &str,
        version: &VersionSpec,
        extras: &BTreeSet<String>,
    ) -> Vec<Requirement>;

    /// Extras the release declares.
    fn extras(&self, name: &str, version: &VersionSpec) -> BTreeSet<String>;
}

/// Limits on a single resolution.
#[derive(Debug, Clone, Default)]
pub struct ResolveOptions {
    /// Maximum number of candidate visits.
    pub step_budget: Option<u64>,
    /// Checked before every candidate visit.
    pub cancel: Option<Arc<AtomicBool>>,
}

impl ResolveOptions {
    pub fn with_step_budget(mut self, budget: u64) -> Self {
        self.step_budget = Some(budget);
        self
    }

    pub fn with_cancel_flag(mut self, flag: Arc<AtomicBool>) -> Self {
        self.cancel = Some(flag);
        self
    }
}

/// Outcome of [`resolve`].
#[derive(Debug, Clone, PartialEq)]
pub enum Resolution {
    /// One version per required name, consistent with every constraint.
    Resolved {
        assignment: BTreeMap<String, VersionSpec>,
        warnings: Vec<Warning>,
    },
    /// The root set cannot be satisfied.
    Conflict(ConflictReport),
    /// The step budget or cancel flag stopped the search.
    Cancelled(PartialProgress),
}

impl Resolution {
    pub fn is_resolved(&self) -> bool {
        matches!(self, Resolution::Resolved { .. })
    }

    pub fn assignment(&self) -> Option<&BTreeMap<String, VersionSpec>> {
        match self {
            Resolution::Resolved { assignment, .. } => Some(assignment),
            _ => None,
        }
    }
}

/// Resolve `roots` against `source`.
pub fn resolve<S>(roots: &[Requirement], source: &S, options: &ResolveOptions) -> Resolution
where
    S: PackageSource + ?Sized,
{
    let mut search = Search {
        source,
        options,
        versions: HashMap::new(),
        constraints: Vec::new(),
        by_target: HashMap::new(),
        assignment: BTreeMap::new(),
        steps: 0,
    };
    search.add_constraints(roots.iter().cloned().map(|requirement| Constraint {
        requirement,
        source: Source::Root,
        reasons: BTreeSet::new(),
    }));

    match search.search(1) {
        Ok(()) => search.finish(),
        Err(Failure::Conflict { report, .. }) => {
            let report = if search.unsatisfiable(&report.package, &report.entries) {
                report
            } else {
                let preferred = report.package.clone();
                search.explain(roots, &preferred).unwrap_or(report)
            };
            tracing::debug!("resolution failed after {} steps: {report}", search.steps);
            Resolution::Conflict(report)
        }
        Err(Failure::Cancelled(progress)) => {
            tracing::debug!("resolution stopped: {progress}");
            Resolution::Cancelled(progress)
        }
    }
}

/// Candidate order: release tuple descending, final releases before
/// pre-releases, non-dev before dev, then full version descending.
pub fn candidate_order(a: &VersionSpec, b: &VersionSpec) -> Ordering {
    b.base()
        .cmp(&a.base())
        .then(a.is_prerelease().cmp(&b.is_prerelease()))
        .then(a.is_devrelease().cmp(&b.is_devrelease()))
        .then(b.cmp(a))
}

struct Constraint {
    requirement: Requirement,
    source: Source,
    /// Decision levels this constraint's existence depends on.
    reasons: BTreeSet<usize>,
}

struct Assigned {
    version: VersionSpec,
    level: usize,
}

enum Failure {
    Conflict {
        levels: BTreeSet<usize>,
        report: ConflictReport,
    },
    Cancelled(PartialProgress),
}

struct Search<'a, S: ?Sized> {
    source: &'a S,
    options: &'a ResolveOptions,
    /// Known versions per name, in candidate order.
    versions: HashMap<String, Vec<VersionSpec>>,
    /// Active constraints, a stack that grows with the decision level.
    constraints: Vec<Constraint>,
    /// Indices into `constraints`, per target name.
    by_target: HashMap<String, Vec<usize>>,
    assignment: BTreeMap<String, Assigned>,
    steps: u64,
}

impl<S: PackageSource + ?Sized> Search<'_, S> {
    fn search(&mut self, level: usize) -> Result<(), Failure> {
        let Some(name) = self.select()? else {
            return Ok(());
        };
        let candidates = self.candidates(&name);
        let mut conflict_set: BTreeSet<usize> = self
            .constraints_on(&name)
            .flat_map(|c| c.reasons.iter().copied())
            .collect();
        let mut failures: Vec<ConflictReport> = Vec::new();

        for version in candidates {
            self.tick()?;
            let mark = self.constraints.len();
            self.assign(&name, version, level);

            let outcome = match self.forward_check(mark) {
                Some((levels, report)) => Err(Failure::Conflict { levels, report }),
                None => self.search(level + 1),
            };

            match outcome {
                Ok(()) => return Ok(()),
                Err(Failure::Cancelled(progress)) => return Err(Failure::Cancelled(progress)),
                Err(Failure::Conflict { mut levels, report }) => {
                    self.unassign(&name, mark);
                    if !levels.contains(&level) {
                        tracing::debug!(
                            "backjumping over {name} (level {level}) to level {}",
                            levels.last().copied().unwrap_or(0)
                        );
                        return Err(Failure::Conflict { levels, report });
                    }
                    levels.remove(&level);
                    conflict_set.extend(levels);
                    failures.push(report);
                }
            }
        }

        tracing::debug!("{name}: candidates exhausted at level {level}");
        let report = self.exhaustion_report(&name, failures);
        Err(Failure::Conflict {
            levels: conflict_set,
            report,
        })
    }

    /// The report for `name` once every candidate has failed: the first
    /// failure no known version can satisfy, else the constraints on `name`
    /// merged with the failures reported against it, else the first failure.
    fn exhaustion_report(&self, name: &str, mut failures: Vec<ConflictReport>) -> ConflictReport {
        if let Some(i) = failures
            .iter()
            .position(|r| self.unsatisfiable(&r.package, &r.entries))
        {
            return failures.swap_remove(i);
        }

        let mut merged: Vec<ConflictEntry> = self
            .constraints_on(name)
            .map(|c| ConflictEntry {
                requirement: c.requirement.clone(),
                source: c.source.clone(),
            })
            .collect();
        for entry in failures
            .iter()
            .filter(|r| r.package == name)
            .flat_map(|r| r.entries.iter())
        {
            if !merged.contains(entry) {
                merged.push(entry.clone());
            }
        }
        if self.unsatisfiable(name, &merged) {
            return ConflictReport {
                package: name.to_string(),
                entries: self.minimize(name, merged),
            };
        }

        match failures.into_iter().next() {
            Some(report) => report,
            None => self.report_for(name, &self.minimal_conflict(name)),
        }
    }

    /// The unassigned required name with the fewest candidates, ties broken
    /// by name. A name with no candidates at all is a conflict.
    fn select(&self) -> Result<Option<String>, Failure> {
        let mut best: Option<(usize, &String)> = None;
        for (name, indices) in &self.by_target {
            if indices.is_empty() || self.assignment.contains_key(name) {
                continue;
            }
            let count = self.candidates(name).len();
            if best.map_or(true, |(c, n)| (count, name) < (c, n)) {
                best = Some((count, name));
            }
        }
        match best {
            None => Ok(None),
            Some((0, name)) => {
                let culprits = self.minimal_conflict(name);
                Err(Failure::Conflict {
                    levels: self.reasons_of(&culprits),
                    report: self.report_for(name, &culprits),
                })
            }
            Some((_, name)) => Ok(Some(name.clone())),
        }
    }

    fn tick(&mut self) -> Result<(), Failure> {
        if let Some(flag) = &self.options.cancel {
            if flag.load(atomic::Ordering::Relaxed) {
                return Err(Failure::Cancelled(self.progress(CancelReason::CancelFlag)));
            }
        }
        if let Some(budget) = self.options.step_budget {
            if self.steps >= budget {
                return Err(Failure::Cancelled(self.progress(CancelReason::StepBudget)));
            }
        }
        self.steps += 1;
        Ok(())
    }

    fn progress(&self, reason: CancelReason) -> PartialProgress {
        let mut frontier: Vec<String> = self
            .by_target
            .iter()
            .filter(|(name, indices)| !indices.is_empty() && !self.assignment.contains_key(*name))
            .map(|(name, _)| name.clone())
            .collect();
        frontier.sort();
        PartialProgress {
            reason,
            steps: self.steps,
            assignment: self
                .assignment
                .iter()
                .map(|(name, a)| (name.clone(), a.version.clone()))
                .collect(),
            frontier,
        }
    }

    fn assign(&mut self, name: &str, version: VersionSpec, level: usize) {
        let extras = self.requested_extras(name);
        let requirements = self.source.requirements(name, &version, &extras);
        let key = PackageKey::new(name, version.clone());

        let pending: Vec<Constraint> = requirements
            .into_iter()
            .map(|requirement| {
                let mut reasons = BTreeSet::from([level]);
                if let Some(extra) = requirement.extra_condition() {
                    reasons.extend(
                        self.constraints_on(name)
                            .filter(|c| c.requirement.extras.contains(&extra))
                            .flat_map(|c| c.reasons.iter().copied()),
                    );
                }
                Constraint {
                    requirement,
                    source: Source::Package(key.clone()),
                    reasons,
                }
            })
            .collect();

        self.assignment
            .insert(name.to_string(), Assigned { version, level });
        self.add_constraints(pending);
    }

    fn unassign(&mut self, name: &str, mark: usize) {
        for constraint in self.constraints.drain(mark..).rev() {
            if let Some(indices) = self.by_target.get_mut(&constraint.requirement.name) {
                indices.pop();
            }
        }
        self.assignment.remove(name);
    }

    /// Push constraints. A constraint that asks an already assigned release
    /// for a new extra also pushes the requirements that extra enables.
    fn add_constraints<I>(&mut self, constraints: I)
    where
        I: IntoIterator<Item = Constraint>,
    {
        let mut queue: VecDeque<Constraint> = constraints.into_iter().collect();
        while let Some(constraint) = queue.pop_front() {
            let target = constraint.requirement.name.clone();
            self.load_versions(&target);

            let before = self.assignment.get(&target).map(|a| {
                (a.version.clone(), a.level, self.requested_extras(&target))
            });
            let asked = constraint.requirement.extras.clone();
            let reasons = constraint.reasons.clone();

            let idx = self.constraints.len();
            self.by_target.entry(target.clone()).or_default().push(idx);
            self.constraints.push(constraint);

            let Some((version, level, old_extras)) = before else {
                continue;
            };
            if asked.is_subset(&old_extras) {
                continue;
            }
            let now_extras = self.requested_extras(&target);
            let old = self.source.requirements(&target, &version, &old_extras);
            let key = PackageKey::new(target.clone(), version.clone());
            for requirement in self.source.requirements(&target, &version, &now_extras) {
                if old.contains(&requirement) {
                    continue;
                }
                let mut reasons = reasons.clone();
                reasons.insert(level);
                queue.push_back(Constraint {
                    requirement,
                    source: Source::Package(key.clone()),
                    reasons,
                });
            }
        }
    }

    /// Check the constraints pushed since `mark`. Returns the culprit
    /// levels and a report on the first violation.
    fn forward_check(&self, mark: usize) -> Option<(BTreeSet<usize>, ConflictReport)> {
        let mut seen = BTreeSet::new();
        for (offset, constraint) in self.constraints[mark..].iter().enumerate() {
            let target = constraint.requirement.name.as_str();
            match self.assignment.get(target) {
                Some(a) if !constraint.requirement.range.contains(&a.version) => {
                    let mut levels = constraint.reasons.clone();
                    levels.insert(a.level);
                    let mut culprits = self.minimal_conflict(target);
                    if !culprits.contains(&(mark + offset)) {
                        culprits.push(mark + offset);
                    }
                    return Some((levels, self.report_for(target, &culprits)));
                }
                Some(_) => {}
                None => {
                    if seen.insert(target) && self.candidates(target).is_empty() {
                        let culprits = self.minimal_conflict(target);
                        return Some((
                            self.reasons_of(&culprits),
                            self.report_for(target, &culprits),
                        ));
                    }
                }
            }
        }
        None
    }

    fn load_versions(&mut self, name: &str) {
        if self.versions.contains_key(name) {
            return;
        }
        let mut list = self.source.versions(name);
        list.sort_by(candidate_order);
        list.dedup();
        self.versions.insert(name.to_string(), list);
    }

    fn constraints_on<'s>(&'s self, name: &str) -> impl Iterator<Item = &'s Constraint> + 's {
        self.by_target
            .get(name)
            .into_iter()
            .flatten()
            .map(move |&i| &self.constraints[i])
    }

    fn requested_extras(&self, name: &str) -> BTreeSet<String> {
        self.constraints_on(name)
            .flat_map(|c| c.requirement.extras.iter().cloned())
            .collect()
    }

    fn admits_all(&self, indices: &[usize], version: &VersionSpec) -> bool {
        indices
            .iter()
            .all(|&i| self.constraints[i].requirement.range.contains(version))
    }

    fn candidates(&self, name: &str) -> Vec<VersionSpec> {
        let indices: &[usize] = self.by_target.get(name).map(Vec::as_slice).unwrap_or_default();
        self.versions
            .get(name)
            .map(|all| {
                all.iter()
                    .filter(|v| self.admits_all(indices, v))
                    .cloned()
                    .collect()
            })
            .unwrap_or_default()
    }

    /// Shrink the constraints on `name` to a minimal subset that no known
    /// version satisfies, deleting the most recent constraints first. When
    /// the full set is satisfiable it is returned unchanged.
    fn minimal_conflict(&self, name: &str) -> Vec<usize> {
        let all: Vec<usize> = self.by_target.get(name).cloned().unwrap_or_default();
        let versions: &[VersionSpec] = self.versions.get(name).map(Vec::as_slice).unwrap_or_default();
        let unsatisfiable = |set: &[usize]| !versions.iter().any(|v| self.admits_all(set, v));
        if !unsatisfiable(&all) {
            return all;
        }
        let mut kept = all;
        let mut i = kept.len();
        while i > 0 && kept.len() > 1 {
            i -= 1;
            let mut trial = kept.clone();
            trial.remove(i);
            if unsatisfiable(&trial) {
                kept = trial;
            }
        }
        kept
    }

    /// True when no known version of `package` meets every entry.
    fn unsatisfiable(&self, package: &str, entries: &[ConflictEntry]) -> bool {
        let versions: &[VersionSpec] = self.versions.get(package).map(Vec::as_slice).unwrap_or_default();
        !versions
            .iter()
            .any(|v| entries.iter().all(|e| e.requirement.range.contains(v)))
    }

    /// Drop entries, newest first, while the rest stay unsatisfiable.
    fn minimize(&self, package: &str, mut kept: Vec<ConflictEntry>) -> Vec<ConflictEntry> {
        let mut i = kept.len();
        while i > 0 && kept.len() > 1 {
            i -= 1;
            let mut trial = kept.clone();
            trial.remove(i);
            if self.unsatisfiable(package, &trial) {
                kept = trial;
            }
        }
        kept
    }

    /// Collect every requirement reachable from `roots` through any release,
    /// grouped by target, with requested extras grown to a fixpoint. When the
    /// roots have no solution some group admits no version; the first one,
    /// starting at `preferred` and then by name, is returned minimized.
    fn explain(&mut self, roots: &[Requirement], preferred: &str) -> Option<ConflictReport> {
        let mut groups: BTreeMap<String, Vec<ConflictEntry>> = BTreeMap::new();
        let mut extras: HashMap<String, BTreeSet<String>> = HashMap::new();
        for requirement in roots {
            record_entry(&mut groups, &mut extras, requirement.clone(), Source::Root);
        }

        loop {
            let mut changed = false;
            let names: Vec<String> = groups.keys().cloned().collect();
            for name in names {
                self.load_versions(&name);
                let wanted = extras.get(&name).cloned().unwrap_or_default();
                let versions = self.versions.get(&name).cloned().unwrap_or_default();
                for version in versions {
                    let key = PackageKey::new(name.clone(), version.clone());
                    for requirement in self.source.requirements(&name, &version, &wanted) {
                        changed |= record_entry(
                            &mut groups,
                            &mut extras,
                            requirement,
                            Source::Package(key.clone()),
                        );
                    }
                }
            }
            if !changed {
                break;
            }
        }
        for name in groups.keys() {
            self.load_versions(name);
        }

        let mut order = vec![preferred.to_string()];
        order.extend(groups.keys().filter(|n| n.as_str() != preferred).cloned());
        for name in order {
            let Some(entries) = groups.get(&name) else {
                continue;
            };
            if self.unsatisfiable(&name, entries) {
                let entries = self.minimize(&name, entries.clone());
                return Some(ConflictReport {
                    package: name,
                    entries,
                });
            }
        }
        None
    }

    fn reasons_of(&self, indices: &[usize]) -> BTreeSet<usize> {
        indices
            .iter()
            .flat_map(|&i| self.constraints[i].reasons.iter().copied())
            .collect()
    }

    fn report_for(&self, name: &str, indices: &[usize]) -> ConflictReport {
        let mut report = ConflictReport::new(name);
        for &i in indices {
            let c = &self.constraints[i];
            report.add(c.requirement.clone(), c.source.clone());
        }
        report
    }

    fn finish(self) -> Resolution {
        let mut warnings = Vec::new();
        for (name, assigned) in &self.assignment {
            let declared = self.source.extras(name, &assigned.version);
            for extra in self.requested_extras(name) {
                if !declared.contains(&extra) {
                    tracing::warn!("{name} {} does not declare extra '{extra}'", assigned.version);
                    warnings.push(Warning::UnknownExtra {
                        name: name.clone(),
                        version: assigned.version.to_string(),
                        extra,
                    });
                }
            }
        }
        tracing::debug!(
            "resolved {} packages in {} steps",
            self.assignment.len(),
            self.steps
        );
        Resolution::Resolved {
            assignment: self
                .assignment
                .into_iter()
                .map(|(name, a)| (name, a.version))
                .collect(),
            warnings,
        }
    }
}

/// Add `requirement` to its target's group. Returns whether anything new was
/// learned.
fn record_entry(
    groups: &mut BTreeMap<String, Vec<ConflictEntry>>,
    extras: &mut HashMap<String, BTreeSet<String>>,
    requirement: Requirement,
    source: Source,
) -> bool {
    let target = requirement.name.clone();
    let wanted = extras.entry(target.clone()).or_default();
    let before = wanted.len();
    wanted.extend(requirement.extras.iter().cloned());
    let mut changed = wanted.len() != before;

    let entry = ConflictEntry {
        requirement,
        source,
    };
    let group = groups.entry(target).or_default();
    if !group.contains(&entry) {
        group.push(entry);
        changed = true;
    }
    changed
}

#[cfg(test)]
mod tests {
    use super::*;

    /// name → version → requirement strings.
    #[derive(Default)]
    struct Universe(BTreeMap<String, BTreeMap<VersionSpec, Vec<Requirement>>>);

    impl Universe {
        fn with(mut self, name: &str, version: &str, reqs: &[&str]) -> Self {
            self.0.entry(name.to_string()).or_default().insert(
                VersionSpec::parse(version).unwrap(),
                reqs.iter().map(|r| Requirement::parse(r).unwrap()).collect(),
            );
            self
        }
    }

    impl PackageSource for Universe {
        fn versions(&self, name: &str) -> Vec<VersionSpec> {
            self.0
                .get(name)
                .map(|m| m.keys().cloned().collect())
                .unwrap_or_default()
        }

        fn requirements(
            &self,
            name: &str,
            version: &VersionSpec,
            extras: &BTreeSet<String>,
        ) -> Vec<Requirement> {
            self.0[name][version]
                .iter()
                .filter(|r| r.extra_condition().map_or(true, |e| extras.contains(&e)))
                .cloned()
                .collect()
        }

        fn extras(&self, name: &str, version: &VersionSpec) -> BTreeSet<String> {
            self.0[name][version]
                .iter()
                .filter_map(Requirement::extra_condition)
                .collect()
        }
    }

    fn roots(texts: &[&str]) -> Vec<Requirement> {
        texts.iter().map(|t| Requirement::parse(t).unwrap()).collect()
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
    fn candidate_order_prefers_final_releases() {
        let mut versions = vec![v("1.0"), v("2.0rc1"), v("1.0.post1"), v("2.0.dev3"), v("1.5")];
        versions.sort_by(candidate_order);
        let text: Vec<String> = versions.iter().map(|v| v.to_string()).collect();
        assert_eq!(text, vec!["2.0.dev3", "2.0rc1", "1.5", "1.0.post1", "1.0"]);
    }

    #[test]
    fn picks_newest_compatible() {
        let u = Universe::default()
            .with("acme", "1.0", &["widget>=1,<2"])
            .with("widget", "1.2", &[])
            .with("widget", "1.9", &[])
            .with("widget", "2.0", &[]);
        let res = resolve(&roots(&["acme"]), &u, &ResolveOptions::default());
        assert_eq!(assignment(&res), vec!["acme 1.0", "widget 1.9"]);
    }

    #[test]
    fn backtracks_to_older_release() {
        let u = Universe::default()
            .with("acme", "2.0", &["widget>=3"])
            .with("acme", "1.0", &["widget>=1"])
            .with("widget", "1.5", &[]);
        let res = resolve(&roots(&["acme"]), &u, &ResolveOptions::default());
        assert_eq!(assignment(&res), vec!["acme 1.0", "widget 1.5"]);
    }

    #[test]
    fn backtracks_across_shared_dependency() {
        let u = Universe::default()
            .with("app", "1.0", &["a", "b", "z"])
            .with("a", "2.0", &["shared>=2"])
            .with("a", "1.0", &["shared<2"])
            .with("b", "1.0", &["shared<2"])
            .with("z", "1.0", &[])
            .with("z", "2.0", &[])
            .with("z", "3.0", &[])
            .with("shared", "1.0", &[])
            .with("shared", "2.0", &[]);
        let res = resolve(&roots(&["app"]), &u, &ResolveOptions::default());
        assert_eq!(
            assignment(&res),
            vec!["a 1.0", "app 1.0", "b 1.0", "shared 1.0", "z 3.0"]
        );
    }

    #[test]
    fn backjumps_over_unrelated_levels() {
        // `m` is decided between `a` and `w` but plays no part in `w` failing,
        // so its second candidate is never visited.
        let u = Universe::default()
            .with("a", "2.0", &["w>=2"])
            .with("a", "1.0", &[])
            .with("m", "1.0", &[])
            .with("m", "2.0", &[])
            .with("w", "2.0", &["q>=5"])
            .with("w", "3.0", &["q>=5"]);
        let options = ResolveOptions::default().with_step_budget(6);
        let res = resolve(&roots(&["a", "m"]), &u, &options);
        assert_eq!(assignment(&res), vec!["a 1.0", "m 2.0"]);
    }

    #[test]
    fn conflict_names_the_source() {
        let u = Universe::default()
            .with("acme", "1.0", &["widget>=2"])
            .with("widget", "1.2", &[]);
        let res = resolve(&roots(&["acme"]), &u, &ResolveOptions::default());
        let Resolution::Conflict(report) = res else {
            panic!("expected conflict, got {res:?}");
        };
        assert_eq!(report.package, "widget");
        assert_eq!(report.entries.len(), 1);
        assert_eq!(report.entries[0].requirement.to_string(), "widget >=2");
        assert_eq!(report.entries[0].source.to_string(), "acme 1.0");
    }

    #[test]
    fn conflict_report_is_never_satisfiable() {
        // `c 2.0` is tried first and clashes with every `b`; `c 1.0` fails on
        // its own, and that is what gets reported.
        let u = Universe::default()
            .with("c", "2.0", &[])
            .with("c", "1.0", &["x>=5"])
            .with("b", "1.0", &["c<2"])
            .with("b", "2.0", &["c<2"])
            .with("b", "3.0", &["c<2"]);
        let res = resolve(&roots(&["b", "c"]), &u, &ResolveOptions::default());
        let Resolution::Conflict(report) = res else {
            panic!("expected conflict, got {res:?}");
        };
        assert_eq!(report.package, "x");
        assert_eq!(report.entries.len(), 1);
        assert_eq!(report.entries[0].requirement.to_string(), "x >=5");
        assert_eq!(report.entries[0].source.to_string(), "c 1.0");
    }

    #[test]
    fn conflict_merges_failures_across_candidates() {
        // Each release of `a` is rejected by a different dependency; neither
        // rejection alone rules out every version of `a`.
        let u = Universe::default()
            .with("a", "2.0", &["b"])
            .with("a", "1.0", &["c"])
            .with("b", "1.0", &["a==1.0"])
            .with("c", "1.0", &["a==2.0"]);
        let res = resolve(&roots(&["a"]), &u, &ResolveOptions::default());
        let Resolution::Conflict(report) = res else {
            panic!("expected conflict, got {res:?}");
        };
        assert_eq!(report.package, "a");
        let texts: Vec<String> = report
            .entries
            .iter()
            .map(|e| format!("{} ({})", e.requirement, e.source))
            .collect();
        assert_eq!(texts, vec!["a ==1.0 (b 1.0)", "a ==2.0 (c 1.0)"]);
    }

    #[test]
    fn missing_root_package_conflicts() {
        let res = resolve(&roots(&["ghost>=1"]), &Universe::default(), &ResolveOptions::default());
        let Resolution::Conflict(report) = res else {
            panic!("expected conflict");
        };
        assert_eq!(report.package, "ghost");
        assert_eq!(report.entries[0].source, Source::Root);
    }

    #[test]
    fn conflicting_roots_are_minimized() {
        let u = Universe::default().with("a", "1.0", &[]).with("a", "2.0", &[]);
        let res = resolve(&roots(&["a>=1", "a<2", "a>1.5"]), &u, &ResolveOptions::default());
        let Resolution::Conflict(report) = res else {
            panic!("expected conflict");
        };
        let texts: Vec<String> = report.entries.iter().map(|e| e.requirement.to_string()).collect();
        assert_eq!(texts, vec!["a <2", "a >1.5"]);
    }

    #[test]
    fn cycles_resolve() {
        let u = Universe::default()
            .with("a", "1.0", &["b"])
            .with("b", "1.0", &["a"]);
        let res = resolve(&roots(&["a"]), &u, &ResolveOptions::default());
        assert_eq!(assignment(&res), vec!["a 1.0", "b 1.0"]);
    }

    #[test]
    fn extras_enable_requirements() {
        let u = Universe::default()
            .with("acme", "1.0", &["widget", "yaml; extra == 'yaml'"])
            .with("widget", "1.0", &[])
            .with("yaml", "6.0", &[]);
        let plain = resolve(&roots(&["acme"]), &u, &ResolveOptions::default());
        assert_eq!(assignment(&plain), vec!["acme 1.0", "widget 1.0"]);

        let with_extra = resolve(&roots(&["acme[yaml]"]), &u, &ResolveOptions::default());
        assert_eq!(assignment(&with_extra), vec!["acme 1.0", "widget 1.0", "yaml 6.0"]);
    }

    #[test]
    fn extra_requested_after_assignment() {
        let u = Universe::default()
            .with("app", "1.0", &["acme", "zeta"])
            .with("zeta", "1.0", &["acme[yaml]"])
            .with("acme", "1.0", &["yaml; extra == 'yaml'"])
            .with("yaml", "6.0", &[]);
        let res = resolve(&roots(&["app"]), &u, &ResolveOptions::default());
        assert_eq!(
            assignment(&res),
            vec!["acme 1.0", "app 1.0", "yaml 6.0", "zeta 1.0"]
        );
    }

    #[test]
    fn unknown_extra_warns() {
        let u = Universe::default().with("acme", "1.0", &[]);
        let res = resolve(&roots(&["acme[nope]"]), &u, &ResolveOptions::default());
        let Resolution::Resolved { warnings, .. } = res else {
            panic!("expected resolution");
        };
        assert_eq!(
            warnings,
            vec![Warning::UnknownExtra {
                name: "acme".into(),
                version: "1.0".into(),
                extra: "nope".into()
            }]
        );
    }

    #[test]
    fn step_budget_cancels_with_progress() {
        let u = Universe::default()
            .with("acme", "1.0", &["widget"])
            .with("widget", "1.0", &[]);
        let options = ResolveOptions::default().with_step_budget(1);
        let res = resolve(&roots(&["acme"]), &u, &options);
        let Resolution::Cancelled(progress) = res else {
            panic!("expected cancellation, got {res:?}");
        };
        assert_eq!(progress.reason, CancelReason::StepBudget);
        assert_eq!(progress.steps, 1);
        assert_eq!(progress.assignment.len(), 1);
        assert_eq!(progress.frontier, vec!["widget"]);
    }

    #[test]
    fn cancel_flag_stops_immediately() {
        let u = Universe::default().with("acme", "1.0", &[]);
        let flag = Arc::new(AtomicBool::new(true));
        let options = ResolveOptions::default().with_cancel_flag(flag);
        let res = resolve(&roots(&["acme"]), &u, &options);
        let Resolution::Cancelled(progress) = res else {
            panic!("expected cancellation");
        };
        assert_eq!(progress.reason, CancelReason::CancelFlag);
        assert_eq!(progress.steps, 0);
        assert_eq!(progress.frontier, vec!["acme"]);
    }

    #[test]
    fn empty_roots_resolve_to_nothing() {
        let res = resolve(&[], &Universe::default(), &ResolveOptions::default());
        assert_eq!(assignment(&res), Vec::<String>::new());
    }
}
