//! Requirement strings: `name[extra,...] specifiers ; marker` or `name @ url`.

use std::collections::BTreeSet;
use std::fmt;
use std::str::FromStr;

use pkgdex_util::errors::{PkgdexError, PkgdexResult};
use serde::{Deserialize, Serialize};

use crate::name;
use crate::range::VersionRange;
use crate::version::VersionSpec;

/// A dependency on another package.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Requirement {
    /// Canonical target name.
    pub name: String,
    pub range: VersionRange,
    /// Canonical extra names requested from the target.
    #[serde(default)]
    pub extras: BTreeSet<String>,
    /// Environment marker text after `;`, kept verbatim.
    #[serde(default)]
    pub marker: Option<String>,
    /// Direct reference after `@`.
    #[serde(default)]
    pub url: Option<String>,
}

impl Requirement {
    /// A requirement on `name` accepting any version.
    pub fn any(target: &str) -> Self {
        Self {
            name: name::canonicalize(target),
            range: VersionRange::any(),
            extras: BTreeSet::new(),
            marker: None,
            url: None,
        }
    }

    pub fn parse(input: &str) -> PkgdexResult<Self> {
        parse_requirement(input)
    }

    pub fn satisfied_by(&self, version: &VersionSpec) -> bool {
        self.range.contains(version)
    }

    /// The extra this requirement is conditional on, if its marker contains
    /// an `extra == "..."` comparison.
    pub fn extra_condition(&self) -> Option<String> {
        let marker = self.marker.as_deref()?;
        let at = find_word(marker, "extra")?;
        let rest = marker[at + "extra".len()..].trim_start();
        let rest = rest.strip_prefix("==")?.trim_start();
        let quote = rest.chars().next().filter(|c| *c == '"' || *c == '\'')?;
        let body = &rest[1..];
        let end = body.find(quote)?;
        Some(name::canonicalize(&body[..end]))
    }

    /// Make this requirement conditional on `extra`, keeping any existing marker.
    pub fn with_extra_marker(mut self, extra: &str) -> Self {
        let clause = format!("extra == \"{}\"", name::canonicalize(extra));
        self.marker = Some(match self.marker.take() {
            Some(existing) => format!("({existing}) and {clause}"),
            None => clause,
        });
        self
    }
}

/// Byte offset of `word` in `haystack` where it is not part of a longer identifier.
fn find_word(haystack: &str, word: &str) -> Option<usize> {
    let is_ident = |c: char| c.is_ascii_alphanumeric() || c == '_';
    let mut from = 0;
    while let Some(pos) = haystack[from..].find(word) {
        let start = from + pos;
        let end = start + word.len();
        let before_ok = haystack[..start].chars().next_back().map_or(true, |c| !is_ident(c));
        let after_ok = haystack[end..].chars().next().map_or(true, |c| !is_ident(c));
        if before_ok && after_ok {
            return Some(start);
        }
        from = end;
    }
    None
}

fn parse_requirement(input: &str) -> PkgdexResult<Requirement> {
    let invalid = |reason: &str| PkgdexError::InvalidRequirement {
        input: input.to_string(),
        reason: reason.to_string(),
    };

    let (body, marker) = match input.split_once(';') {
        Some((body, marker)) => {
            let marker = marker.trim();
            (body, (!marker.is_empty()).then(|| marker.to_string()))
        }
        None => (input, None),
    };
    let body = body.trim();

    let name_end = body
        .find(|c: char| !(c.is_ascii_alphanumeric() || matches!(c, '-' | '_' | '.')))
        .unwrap_or(body.len());
    let raw_name = &body[..name_end];
    if !name::is_valid(raw_name) {
        return Err(invalid("missing or invalid package name"));
    }
    let mut rest = body[name_end..].trim_start();

    let mut extras = BTreeSet::new();
    if let Some(after) = rest.strip_prefix('[') {
        let close = after.find(']').ok_or_else(|| invalid("unclosed '['"))?;
        for extra in after[..close].split(',') {
            let extra = extra.trim();
            if extra.is_empty() {
                continue;
            }
            if !name::is_valid(extra) {
                return Err(invalid("invalid extra name"));
            }
            extras.insert(name::canonicalize(extra));
        }
        rest = after[close + 1..].trim_start();
    }

    if let Some(url) = rest.strip_prefix('@') {
        let url = url.trim();
        if url.is_empty() {
            return Err(invalid("empty URL after '@'"));
        }
        return Ok(Requirement {
            name: name::canonicalize(raw_name),
            range: VersionRange::any(),
            extras,
            marker,
            url: Some(url.to_string()),
        });
    }

    let specifiers = match rest.strip_prefix('(') {
        Some(inner) => inner
            .strip_suffix(')')
            .ok_or_else(|| invalid("unclosed '('"))?,
        None => rest,
    };
    let range = VersionRange::parse(specifiers).map_err(|e| invalid(&e.to_string()))?;

    Ok(Requirement {
        name: name::canonicalize(raw_name),
        range,
        extras,
        marker,
        url: None,
    })
}

impl fmt::Display for Requirement {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.name)?;
        if !self.extras.is_empty() {
            let extras: Vec<&str> = self.extras.iter().map(String::as_str).collect();
            write!(f, "[{}]", extras.join(","))?;
        }
        if let Some(url) = &self.url {
            write!(f, " @ {url}")?;
        } else if !self.range.is_any() {
            write!(f, " {}", self.range)?;
        }
        if let Some(marker) = &self.marker {
            write!(f, "; {marker}")?;
        }
        Ok(())
    }
}

impl FromStr for Requirement {
    type Err = PkgdexError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        parse_requirement(s)
    }
}
