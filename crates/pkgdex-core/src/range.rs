//! Version range expressions and their set algebra.
//!
//! A [`VersionRange`] is a canonical list of intervals over [`VersionSpec`]:
//! sorted by lower bound, pairwise disjoint, and never touching (touching
//! intervals are merged). Every operation returns a canonical range, so two
//! ranges describing the same set compare equal.
//!
//! Supported clauses: `==`, `!=`, `<`, `<=`, `>`, `>=`, `~=`, `===`, and the
//! `==X.*` / `!=X.*` prefix wildcards. Clauses separated by `,` intersect;
//! groups separated by `||` unite.

use std::cmp::Ordering;
use std::fmt;
use std::str::FromStr;

use pkgdex_util::errors::{PkgdexError, PkgdexResult};
use serde::{Deserialize, Serialize};

use crate::version::VersionSpec;

/// Lower end of an interval.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub enum Lower {
    Unbounded,
    Inclusive(VersionSpec),
    Exclusive(VersionSpec),
}

/// Upper end of an interval.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub enum Upper {
    Unbounded,
    Inclusive(VersionSpec),
    Exclusive(VersionSpec),
}

impl Lower {
    fn admits(&self, v: &VersionSpec) -> bool {
        match self {
            Lower::Unbounded => true,
            Lower::Inclusive(b) => v >= b,
            Lower::Exclusive(b) => v > b,
        }
    }
}

impl Upper {
    fn admits(&self, v: &VersionSpec) -> bool {
        match self {
            Upper::Unbounded => true,
            Upper::Inclusive(b) => v <= b,
            Upper::Exclusive(b) => v < b,
        }
    }
}

/// Orders lower bounds by where they start.
fn cmp_lower(a: &Lower, b: &Lower) -> Ordering {
    match (a, b) {
        (Lower::Unbounded, Lower::Unbounded) => Ordering::Equal,
        (Lower::Unbounded, _) => Ordering::Less,
        (_, Lower::Unbounded) => Ordering::Greater,
        (Lower::Inclusive(x), Lower::Inclusive(y)) | (Lower::Exclusive(x), Lower::Exclusive(y)) => {
            x.cmp(y)
        }
        (Lower::Inclusive(x), Lower::Exclusive(y)) => x.cmp(y).then(Ordering::Less),
        (Lower::Exclusive(x), Lower::Inclusive(y)) => x.cmp(y).then(Ordering::Greater),
    }
}

/// Orders upper bounds by where they end.
fn cmp_upper(a: &Upper, b: &Upper) -> Ordering {
    match (a, b) {
        (Upper::Unbounded, Upper::Unbounded) => Ordering::Equal,
        (Upper::Unbounded, _) => Ordering::Greater,
        (_, Upper::Unbounded) => Ordering::Less,
        (Upper::Inclusive(x), Upper::Inclusive(y)) | (Upper::Exclusive(x), Upper::Exclusive(y)) => {
            x.cmp(y)
        }
        (Upper::Inclusive(x), Upper::Exclusive(y)) => x.cmp(y).then(Ordering::Greater),
        (Upper::Exclusive(x), Upper::Inclusive(y)) => x.cmp(y).then(Ordering::Less),
    }
}

/// Whether an interval ending at `upper` and one starting at `lower` overlap
/// or touch, so that their union is a single interval.
fn joins(upper: &Upper, lower: &Lower) -> bool {
    match (upper, lower) {
        (Upper::Unbounded, _) | (_, Lower::Unbounded) => true,
        (Upper::Exclusive(u), Lower::Exclusive(l)) => l < u,
        (Upper::Inclusive(u), Lower::Inclusive(l))
        | (Upper::Inclusive(u), Lower::Exclusive(l))
        | (Upper::Exclusive(u), Lower::Inclusive(l)) => l <= u,
    }
}

/// One contiguous run of versions.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Interval {
    pub lower: Lower,
    pub upper: Upper,
}

impl Interval {
    pub fn new(lower: Lower, upper: Upper) -> Self {
        Self { lower, upper }
    }

    pub fn is_empty(&self) -> bool {
        match (&self.lower, &self.upper) {
            (Lower::Unbounded, _) | (_, Upper::Unbounded) => false,
            (Lower::Inclusive(l), Upper::Inclusive(u)) => l > u,
            (Lower::Inclusive(l), Upper::Exclusive(u))
            | (Lower::Exclusive(l), Upper::Inclusive(u))
            | (Lower::Exclusive(l), Upper::Exclusive(u)) => l >= u,
        }
    }

    pub fn contains(&self, v: &VersionSpec) -> bool {
        self.lower.admits(v) && self.upper.admits(v)
    }
}

impl fmt::Display for Interval {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match (&self.lower, &self.upper) {
            (Lower::Unbounded, Upper::Unbounded) => f.write_str("*"),
            (Lower::Inclusive(l), Upper::Inclusive(u)) if l == u => write!(f, "=={l}"),
            (lower, upper) => {
                let lower = match lower {
                    Lower::Unbounded => None,
                    Lower::Inclusive(v) => Some(format!(">={v}")),
                    Lower::Exclusive(v) => Some(format!(">{v}")),
                };
                let upper = match upper {
                    Upper::Unbounded => None,
                    Upper::Inclusive(v) => Some(format!("<={v}")),
                    Upper::Exclusive(v) => Some(format!("<{v}")),
                };
                let parts: Vec<String> = lower.into_iter().chain(upper).collect();
                f.write_str(&parts.join(", "))
            }
        }
    }
}

/// A canonical set of acceptable versions.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(from = "Vec<Interval>", into = "Vec<Interval>")]
pub struct VersionRange {
    intervals: Vec<Interval>,
}

impl VersionRange {
    /// Every version.
    pub fn any() -> Self {
        Self {
            intervals: vec![Interval::new(Lower::Unbounded, Upper::Unbounded)],
        }
    }

    /// No version at all.
    pub fn empty() -> Self {
        Self {
            intervals: Vec::new(),
        }
    }

    /// Exactly one version.
    pub fn exact(v: VersionSpec) -> Self {
        Self::from_interval(Interval::new(Lower::Inclusive(v.clone()), Upper::Inclusive(v)))
    }

    pub fn from_interval(interval: Interval) -> Self {
        Self::from_intervals(vec![interval])
    }

    /// Build a canonical range from arbitrary intervals (any order, may overlap).
    pub fn from_intervals(mut intervals: Vec<Interval>) -> Self {
        intervals.retain(|iv| !iv.is_empty());
        intervals.sort_by(|a, b| cmp_lower(&a.lower, &b.lower));

        let mut merged: Vec<Interval> = Vec::with_capacity(intervals.len());
        for iv in intervals {
            match merged.last_mut() {
                Some(last) if joins(&last.upper, &iv.lower) => {
                    if cmp_upper(&iv.upper, &last.upper) == Ordering::Greater {
                        last.upper = iv.upper;
                    }
                }
                _ => merged.push(iv),
            }
        }
        Self { intervals: merged }
    }

    pub fn parse(input: &str) -> PkgdexResult<Self> {
        parse_range(input)
    }

    pub fn intervals(&self) -> &[Interval] {
        &self.intervals
    }

    pub fn is_empty(&self) -> bool {
        self.intervals.is_empty()
    }

    pub fn is_any(&self) -> bool {
        matches!(
            self.intervals.as_slice(),
            [Interval {
                lower: Lower::Unbounded,
                upper: Upper::Unbounded
            }]
        )
    }

    /// Membership test, a binary search over the intervals.
    pub fn contains(&self, v: &VersionSpec) -> bool {
        let idx = self
            .intervals
            .partition_point(|iv| !iv.upper.admits(v));
        self.intervals
            .get(idx)
            .is_some_and(|iv| iv.lower.admits(v))
    }

    pub fn union(&self, other: &Self) -> Self {
        let mut all = self.intervals.clone();
        all.extend(other.intervals.iter().cloned());
        Self::from_intervals(all)
    }

    pub fn intersection(&self, other: &Self) -> Self {
        let mut out = Vec::new();
        let (mut i, mut j) = (0, 0);
        while i < self.intervals.len() && j < other.intervals.len() {
            let a = &self.intervals[i];
            let b = &other.intervals[j];
            let lower = if cmp_lower(&a.lower, &b.lower) == Ordering::Greater {
                a.lower.clone()
            } else {
                b.lower.clone()
            };
            let a_ends_first = cmp_upper(&a.upper, &b.upper) != Ordering::Greater;
            let upper = if a_ends_first {
                a.upper.clone()
            } else {
                b.upper.clone()
            };
            let candidate = Interval::new(lower, upper);
            if !candidate.is_empty() {
                out.push(candidate);
            }
            if a_ends_first {
                i += 1;
            } else {
                j += 1;
            }
        }
        Self::from_intervals(out)
    }

    /// Every version not in this range.
    pub fn complement(&self) -> Self {
        let mut out = Vec::with_capacity(self.intervals.len() + 1);
        let mut next_lower = Lower::Unbounded;
        for iv in &self.intervals {
            let upper = match &iv.lower {
                Lower::Unbounded => None,
                Lower::Inclusive(v) => Some(Upper::Exclusive(v.clone())),
                Lower::Exclusive(v) => Some(Upper::Inclusive(v.clone())),
            };
            if let Some(upper) = upper {
                out.push(Interval::new(next_lower.clone(), upper));
            }
            next_lower = match &iv.upper {
                Upper::Unbounded => return Self::from_intervals(out),
                Upper::Inclusive(v) => Lower::Exclusive(v.clone()),
                Upper::Exclusive(v) => Lower::Inclusive(v.clone()),
            };
        }
        out.push(Interval::new(next_lower, Upper::Unbounded));
        Self::from_intervals(out)
    }
}

impl Default for VersionRange {
    fn default() -> Self {
        Self::any()
    }
}

impl From<Vec<Interval>> for VersionRange {
    fn from(intervals: Vec<Interval>) -> Self {
        Self::from_intervals(intervals)
    }
}

impl From<VersionRange> for Vec<Interval> {
    fn from(range: VersionRange) -> Self {
        range.intervals
    }
}

impl fmt::Display for VersionRange {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        if self.intervals.is_empty() {
            return f.write_str("<empty>");
        }
        for (i, iv) in self.intervals.iter().enumerate() {
            if i > 0 {
                f.write_str(" || ")?;
            }
            write!(f, "{iv}")?;
        }
        Ok(())
    }
}

impl FromStr for VersionRange {
    type Err = PkgdexError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        parse_range(s)
    }
}

/// Comparison operators in match order (longest first).
const OPERATORS: &[&str] = &["===", "~=", "==", "!=", "<=", ">=", "<", ">"];

fn parse_range(input: &str) -> PkgdexResult<VersionRange> {
    let trimmed = input.trim();
    if trimmed.is_empty() || trimmed == "*" {
        return Ok(VersionRange::any());
    }
    let mut result = VersionRange::empty();
    for group in trimmed.split("||") {
        let mut acc = VersionRange::any();
        for clause in group.split(',') {
            let clause = clause.trim();
            if clause.is_empty() {
                return Err(PkgdexError::InvalidRange {
                    input: input.to_string(),
                    reason: "empty clause".to_string(),
                });
            }
            acc = acc.intersection(&parse_clause(input, clause)?);
        }
        result = result.union(&acc);
    }
    Ok(result)
}

fn parse_clause(input: &str, clause: &str) -> PkgdexResult<VersionRange> {
    let invalid = |reason: String| PkgdexError::InvalidRange {
        input: input.to_string(),
        reason,
    };

    if clause == "*" {
        return Ok(VersionRange::any());
    }

    let (op, operand) = OPERATORS
        .iter()
        .find_map(|op| clause.strip_prefix(op).map(|rest| (*op, rest.trim())))
        .unwrap_or(("==", clause));

    if let Some(prefix) = operand.strip_suffix(".*") {
        let prefix = VersionSpec::parse(prefix).map_err(|e| invalid(e.to_string()))?;
        if prefix.pre().is_some() || prefix.post().is_some() || prefix.is_devrelease() {
            return Err(invalid(format!("wildcard prefix '{operand}' must be a plain release")));
        }
        let upper = VersionSpec::prefix_upper(prefix.release())
            .ok_or_else(|| invalid(format!("wildcard prefix '{operand}' has no upper bound")))?;
        let matching = VersionRange::from_interval(Interval::new(
            Lower::Inclusive(VersionSpec::prefix_lower(prefix.release())),
            Upper::Exclusive(upper),
        ));
        return match op {
            "==" => Ok(matching),
            "!=" => Ok(matching.complement()),
            _ => Err(invalid(format!("'{op}' does not accept a wildcard"))),
        };
    }

    let v = VersionSpec::parse(operand).map_err(|e| invalid(e.to_string()))?;
    let range = match op {
        "==" | "===" => VersionRange::exact(v),
        "!=" => VersionRange::exact(v).complement(),
        "<" => VersionRange::from_interval(Interval::new(Lower::Unbounded, Upper::Exclusive(v))),
        "<=" => VersionRange::from_interval(Interval::new(Lower::Unbounded, Upper::Inclusive(v))),
        ">" => VersionRange::from_interval(Interval::new(Lower::Exclusive(v), Upper::Unbounded)),
        ">=" => VersionRange::from_interval(Interval::new(Lower::Inclusive(v), Upper::Unbounded)),
        "~=" => {
            if v.release().len() < 2 {
                return Err(invalid("'~=' needs at least two release components".to_string()));
            }
            let upper = v
                .compatible_upper()
                .ok_or_else(|| invalid(format!("'~={operand}' has no upper bound")))?;
            VersionRange::from_interval(Interval::new(
                Lower::Inclusive(v),
                Upper::Exclusive(upper),
            ))
        }
        other => return Err(invalid(format!("unknown operator '{other}'"))),
    };
    Ok(range)
}
