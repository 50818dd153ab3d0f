//! Version literal parsing and ordering.
//!
//! Versions follow the `N(.N)*[{a|b|rc}N][.postN][.devN]` grammar:
//! - Release components compare numerically, the shorter tuple padded with zeros
//! - A pre-release sorts below its release: `a` < `b` < `rc` < release
//! - A post-release sorts above its release
//! - A dev-release sorts below everything it is attached to, so
//!   `1.0.dev1` < `1.0a1` < `1.0` < `1.0.post1`
//!
//! Common alternative spellings (`1.0-alpha.2`, `1.0_RC1`, `v2`, `1.0-1`,
//! `1.0.rev3`) are accepted and normalized; `Display` always prints the
//! canonical form.

use std::cmp::Ordering;
use std::fmt;
use std::hash::{Hash, Hasher};
use std::str::FromStr;

use pkgdex_util::errors::{PkgdexError, PkgdexResult};
use serde::{Deserialize, Serialize};

/// A parsed version literal.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(try_from = "String", into = "String")]
pub struct VersionSpec {
    release: Vec<u64>,
    pre: Option<(PreKind, u64)>,
    post: Option<u64>,
    dev: Option<u64>,
}

/// Pre-release kinds in ascending order.
#[derive(Debug, Clone, Copy, Eq, PartialEq, Ord, PartialOrd, Hash)]
pub enum PreKind {
    Alpha,
    Beta,
    Rc,
}

impl PreKind {
    fn as_str(self) -> &'static str {
        match self {
            PreKind::Alpha => "a",
            PreKind::Beta => "b",
            PreKind::Rc => "rc",
        }
    }
}

/// Sort key component with explicit infinities.
#[derive(Debug, Clone, Copy, Eq, PartialEq, Ord, PartialOrd)]
enum Marker<T> {
    NegInf,
    At(T),
    PosInf,
}

impl VersionSpec {
    /// A final release with the given components.
    ///
    /// An empty `release` is treated as `0`.
    pub fn new(release: Vec<u64>) -> Self {
        let release = if release.is_empty() { vec![0] } else { release };
        Self {
            release,
            pre: None,
            post: None,
            dev: None,
        }
    }

    pub fn with_pre(mut self, kind: PreKind, number: u64) -> Self {
        self.pre = Some((kind, number));
        self
    }

    pub fn with_post(mut self, number: u64) -> Self {
        self.post = Some(number);
        self
    }

    pub fn with_dev(mut self, number: u64) -> Self {
        self.dev = Some(number);
        self
    }

    pub fn parse(input: &str) -> PkgdexResult<Self> {
        parse_version(input)
    }

    pub fn release(&self) -> &[u64] {
        &self.release
    }

    pub fn pre(&self) -> Option<(PreKind, u64)> {
        self.pre
    }

    pub fn post(&self) -> Option<u64> {
        self.post
    }

    pub fn dev(&self) -> Option<u64> {
        self.dev
    }

    pub fn is_prerelease(&self) -> bool {
        self.pre.is_some()
    }

    pub fn is_devrelease(&self) -> bool {
        self.dev.is_some()
    }

    /// The same release tuple with pre, post and dev parts stripped.
    pub fn base(&self) -> Self {
        Self::new(self.release.clone())
    }

    /// Exclusive upper bound for a compatible-release clause (`~=`).
    ///
    /// `1.4.5` → `1.5`, `1.4` → `2`. Returns `None` for a single component
    /// or when the bumped component would overflow.
    pub fn compatible_upper(&self) -> Option<Self> {
        if self.release.len() < 2 {
            return None;
        }
        let mut bumped = self.release[..self.release.len() - 1].to_vec();
        if let Some(last) = bumped.last_mut() {
            *last = last.checked_add(1)?;
        }
        Some(Self::new(bumped))
    }

    /// The smallest version whose release starts with `prefix`
    /// (`1.4` → `1.4.dev0`).
    pub fn prefix_lower(prefix: &[u64]) -> Self {
        Self::new(prefix.to_vec()).with_dev(0)
    }

    /// The smallest version past every version whose release starts with
    /// `prefix` (`1.4` → `1.5.dev0`), or `None` if its last component is
    /// already `u64::MAX`.
    pub fn prefix_upper(prefix: &[u64]) -> Option<Self> {
        let mut bumped = prefix.to_vec();
        if let Some(last) = bumped.last_mut() {
            *last = last.checked_add(1)?;
        }
        Some(Self::new(bumped).with_dev(0))
    }

    /// Whether the padded release tuple starts with `prefix`.
    pub fn release_starts_with(&self, prefix: &[u64]) -> bool {
        prefix
            .iter()
            .enumerate()
            .all(|(i, p)| self.release.get(i).copied().unwrap_or(0) == *p)
    }

    fn pre_key(&self) -> Marker<(PreKind, u64)> {
        match (self.pre, self.post, self.dev) {
            (Some(pre), _, _) => Marker::At(pre),
            (None, None, Some(_)) => Marker::NegInf,
            _ => Marker::PosInf,
        }
    }

    fn post_key(&self) -> Marker<u64> {
        self.post.map_or(Marker::NegInf, Marker::At)
    }

    fn dev_key(&self) -> Marker<u64> {
        self.dev.map_or(Marker::PosInf, Marker::At)
    }

    fn trimmed_release(&self) -> &[u64] {
        let end = self
            .release
            .iter()
            .rposition(|&n| n != 0)
            .map_or(0, |i| i + 1);
        &self.release[..end]
    }
}

impl PartialEq for VersionSpec {
    fn eq(&self, other: &Self) -> bool {
        self.cmp(other) == Ordering::Equal
    }
}

impl Eq for VersionSpec {}

impl Hash for VersionSpec {
    fn hash<H: Hasher>(&self, state: &mut H) {
        self.trimmed_release().hash(state);
        self.pre.hash(state);
        self.post.hash(state);
        self.dev.hash(state);
    }
}

impl Ord for VersionSpec {
    fn cmp(&self, other: &Self) -> Ordering {
        compare_release(&self.release, &other.release)
            .then_with(|| self.pre_key().cmp(&other.pre_key()))
            .then_with(|| self.post_key().cmp(&other.post_key()))
            .then_with(|| self.dev_key().cmp(&other.dev_key()))
    }
}

impl PartialOrd for VersionSpec {
    fn partial_cmp(&self, other: &Self) -> Option<Ordering> {
        Some(self.cmp(other))
    }
}

fn compare_release(a: &[u64], b: &[u64]) -> Ordering {
    let max_len = a.len().max(b.len());
    for i in 0..max_len {
        let x = a.get(i).copied().unwrap_or(0);
        let y = b.get(i).copied().unwrap_or(0);
        let ord = x.cmp(&y);
        if ord != Ordering::Equal {
            return ord;
        }
    }
    Ordering::Equal
}

impl fmt::Display for VersionSpec {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let mut first = true;
        for n in &self.release {
            if !first {
                f.write_str(".")?;
            }
            write!(f, "{n}")?;
            first = false;
        }
        if let Some((kind, n)) = self.pre {
            write!(f, "{}{n}", kind.as_str())?;
        }
        if let Some(n) = self.post {
            write!(f, ".post{n}")?;
        }
        if let Some(n) = self.dev {
            write!(f, ".dev{n}")?;
        }
        Ok(())
    }
}

impl FromStr for VersionSpec {
    type Err = PkgdexError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        parse_version(s)
    }
}

impl TryFrom<String> for VersionSpec {
    type Error = PkgdexError;

    fn try_from(value: String) -> Result<Self, Self::Error> {
        parse_version(&value)
    }
}

impl From<VersionSpec> for String {
    fn from(value: VersionSpec) -> Self {
        value.to_string()
    }
}

const PRE_WORDS: &[(&str, PreKind)] = &[
    ("alpha", PreKind::Alpha),
    ("a", PreKind::Alpha),
    ("beta", PreKind::Beta),
    ("b", PreKind::Beta),
    ("preview", PreKind::Rc),
    ("pre", PreKind::Rc),
    ("rc", PreKind::Rc),
    ("c", PreKind::Rc),
];

const POST_WORDS: &[&str] = &["post", "rev", "r"];

fn parse_version(input: &str) -> PkgdexResult<VersionSpec> {
    let lowered = input.trim().to_ascii_lowercase();
    let invalid = |reason: String| PkgdexError::InvalidVersion {
        input: input.to_string(),
        reason,
    };

    let mut rest = lowered.strip_prefix('v').unwrap_or(&lowered);

    let mut release = Vec::new();
    loop {
        let (digits, tail) = split_digits(rest);
        if digits.is_empty() {
            return Err(invalid(if release.is_empty() {
                "expected a release number".to_string()
            } else {
                "empty release component".to_string()
            }));
        }
        release.push(parse_number(digits).map_err(&invalid)?);
        rest = tail;
        match rest.strip_prefix('.') {
            Some(tail) if tail.starts_with(|c: char| c.is_ascii_digit()) => rest = tail,
            _ => break,
        }
    }

    let mut pre = None;
    let after_sep = strip_separator(rest);
    if let Some((kind, tail)) = strip_pre_word(after_sep) {
        let (number, tail) = optional_number(strip_separator(tail)).map_err(&invalid)?;
        pre = Some((kind, number));
        rest = tail;
    }

    let mut post = None;
    if let Some(tail) = rest.strip_prefix('-') {
        let (digits, after) = split_digits(tail);
        if !digits.is_empty() {
            post = Some(parse_number(digits).map_err(&invalid)?);
            rest = after;
        }
    }
    if post.is_none() {
        let after_sep = strip_separator(rest);
        if let Some(tail) = strip_word(after_sep, POST_WORDS) {
            let (number, tail) = optional_number(strip_separator(tail)).map_err(&invalid)?;
            post = Some(number);
            rest = tail;
        }
    }

    let mut dev = None;
    let after_sep = strip_separator(rest);
    if let Some(tail) = after_sep.strip_prefix("dev") {
        let (number, tail) = optional_number(strip_separator(tail)).map_err(&invalid)?;
        dev = Some(number);
        rest = tail;
    }

    if !rest.is_empty() {
        return Err(invalid(format!("unexpected trailing '{rest}'")));
    }

    Ok(VersionSpec {
        release,
        pre,
        post,
        dev,
    })
}

fn split_digits(s: &str) -> (&str, &str) {
    let end = s.find(|c: char| !c.is_ascii_digit()).unwrap_or(s.len());
    s.split_at(end)
}

fn parse_number(digits: &str) -> Result<u64, String> {
    digits
        .parse::<u64>()
        .map_err(|e| format!("number '{digits}' out of range: {e}"))
}

/// A run of digits, or `0` when there is none.
fn optional_number(s: &str) -> Result<(u64, &str), String> {
    let (digits, tail) = split_digits(s);
    if digits.is_empty() {
        Ok((0, s))
    } else {
        Ok((parse_number(digits)?, tail))
    }
}

fn strip_separator(s: &str) -> &str {
    s.strip_prefix(['-', '_', '.']).unwrap_or(s)
}

fn strip_pre_word(s: &str) -> Option<(PreKind, &str)> {
    PRE_WORDS
        .iter()
        .find_map(|(word, kind)| s.strip_prefix(word).map(|tail| (*kind, tail)))
}

fn strip_word<'a>(s: &'a str, words: &[&str]) -> Option<&'a str> {
    words.iter().find_map(|word| s.strip_prefix(word))
}

#[cfg(test)]
mod tests {
    use super::*;

    fn v(s: &str) -> VersionSpec {
        VersionSpec::parse(s).unwrap()
    }

    #[test]
    fn basic_ordering() {
        assert!(v("1.0") < v("2.0"));
        assert!(v("1.0.0") < v("1.0.1"));
        assert!(v("1.0.1") < v("1.1.0"));
        assert!(v("1.9") < v("1.10"));
    }

    #[test]
    fn trailing_zeros_equal() {
        assert_eq!(v("1.0"), v("1.0.0"));
        assert_eq!(v("1"), v("1.0.0.0"));
    }

    #[test]
    fn pre_release_ordering() {
        assert!(v("1.0a1") < v("1.0a2"));
        assert!(v("1.0a2") < v("1.0b1"));
        assert!(v("1.0b1") < v("1.0rc1"));
        assert!(v("1.0rc1") < v("1.0"));
    }

    #[test]
    fn post_and_dev_ordering() {
        assert!(v("1.0a1") < v("1.0"));
        assert!(v("1.0.post1") > v("1.0"));
        assert!(v("1.0.dev1") < v("1.0a1"));
        assert!(v("1.0a1.dev1") < v("1.0a1"));
        assert!(v("1.0.post1.dev1") < v("1.0.post1"));
        assert!(v("1.0.post1.dev1") > v("1.0"));
        assert!(v("1.0.post1") < v("1.0.1"));
    }

    #[test]
    fn alternative_spellings_normalize() {
        assert_eq!(v("1.0-alpha.2").to_string(), "1.0a2");
        assert_eq!(v("1.0_RC1").to_string(), "1.0rc1");
        assert_eq!(v("1.0c1").to_string(), "1.0rc1");
        assert_eq!(v("v2.1").to_string(), "2.1");
        assert_eq!(v("1.0-1").to_string(), "1.0.post1");
        assert_eq!(v("1.0.rev3").to_string(), "1.0.post3");
        assert_eq!(v("1.0b").to_string(), "1.0b0");
        assert_eq!(v("1.0.dev").to_string(), "1.0.dev0");
        assert_eq!(v(" 1.2.3 ").to_string(), "1.2.3");
    }

    #[test]
    fn rejects_garbage() {
        assert!(VersionSpec::parse("").is_err());
        assert!(VersionSpec::parse("abc").is_err());
        assert!(VersionSpec::parse("1..2").is_err());
        assert!(VersionSpec::parse("1.0+local").is_err());
        assert!(VersionSpec::parse("1.0-SNAPSHOT").is_err());
    }

    #[test]
    fn display_roundtrip() {
        for s in ["1.0", "1.0a1", "2.3.4rc2.post1.dev5", "0.0.1.dev0"] {
            let parsed = v(s);
            assert_eq!(parsed.to_string(), s);
            assert_eq!(v(&parsed.to_string()), parsed);
        }
    }

    #[test]
    fn compatible_upper_bound() {
        assert_eq!(v("1.4").compatible_upper(), Some(v("2")));
        assert_eq!(v("1.4.5").compatible_upper(), Some(v("1.5")));
        assert_eq!(v("1").compatible_upper(), None);
        assert_eq!(v("18446744073709551615.0").compatible_upper(), None);
    }

    #[test]
    fn prefix_bounds() {
        assert!(VersionSpec::prefix_lower(&[1, 4]) < v("1.4a1"));
        let upper = VersionSpec::prefix_upper(&[1, 4]).unwrap();
        assert!(upper > v("1.4.99.post3"));
        assert!(upper < v("1.5a1"));
        assert_eq!(VersionSpec::prefix_upper(&[1, u64::MAX]), None);
        assert!(v("1.4.2").release_starts_with(&[1, 4]));
        assert!(v("1.4").release_starts_with(&[1, 4, 0]));
        assert!(!v("1.5").release_starts_with(&[1, 4]));
    }

    #[test]
    fn hash_consistent_with_eq() {
        use std::collections::HashSet;
        let mut set = HashSet::new();
        set.insert(v("1.0"));
        assert!(set.contains(&v("1.0.0")));
    }

    #[test]
    fn serde_as_string() {
        let json = serde_json::to_string(&v("1.0rc1")).unwrap();
        assert_eq!(json, "\"1.0rc1\"");
        let back: VersionSpec = serde_json::from_str(&json).unwrap();
        assert_eq!(back, v("1.0rc1"));
    }
}
