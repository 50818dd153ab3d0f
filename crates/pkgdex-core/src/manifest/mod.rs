//! Manifest parsing: three manifest shapes normalized into one [`PackageRecord`].
//!
//! - [`ManifestShape::Metadata`]: RFC-822 style core metadata (`PKG-INFO`, `METADATA`)
//! - [`ManifestShape::SetupScript`]: a `setup.py`, read as text and never executed
//! - [`ManifestShape::Tabular`]: the `[project]` table of a `pyproject.toml`
//!
//! Each shape parser fills a [`RawMetadata`]; [`RawMetadata::finish`] applies
//! the shared normalization and recovery rules.

mod metadata;
mod pyproject;
mod python;
mod setup_script;

use std::collections::{BTreeMap, BTreeSet};

use pkgdex_util::errors::{PkgdexError, PkgdexResult};
use serde::{Deserialize, Serialize};

use crate::name;
use crate::range::VersionRange;
use crate::record::{Identity, IdentityRole, PackageRecord};
use crate::requirement::Requirement;
use crate::version::VersionSpec;
use crate::warning::Warning;

/// Which of the three supported layouts a blob uses.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "kebab-case")]
pub enum ManifestShape {
    Metadata,
    SetupScript,
    Tabular,
}

impl ManifestShape {
    /// Guess the shape from a file name (`PKG-INFO`, `setup.py`, `pyproject.toml`, ...).
    pub fn from_file_name(file_name: &str) -> Option<Self> {
        let base = file_name.rsplit(['/', '\\']).next().unwrap_or(file_name);
        match base {
            "PKG-INFO" | "METADATA" => Some(Self::Metadata),
            "setup.py" => Some(Self::SetupScript),
            "pyproject.toml" => Some(Self::Tabular),
            _ => None,
        }
    }
}

/// A successfully parsed manifest and the problems recovered along the way.
#[derive(Debug, Clone)]
pub struct ParsedManifest {
    pub record: PackageRecord,
    pub warnings: Vec<Warning>,
}

/// Parse a raw blob. The blob must be UTF-8.
pub fn parse_manifest(
    source_id: &str,
    blob: &[u8],
    shape: ManifestShape,
) -> PkgdexResult<ParsedManifest> {
    let text = std::str::from_utf8(blob).map_err(|e| PkgdexError::MalformedManifest {
        source_id: source_id.to_string(),
        message: format!("blob is not valid UTF-8: {e}"),
    })?;
    parse_manifest_str(source_id, text, shape)
}

/// Parse a manifest that is already text.
pub fn parse_manifest_str(
    source_id: &str,
    text: &str,
    shape: ManifestShape,
) -> PkgdexResult<ParsedManifest> {
    let text = text.strip_prefix('\u{feff}').unwrap_or(text);
    let raw = match shape {
        ManifestShape::Metadata => metadata::parse(source_id, text),
        ManifestShape::SetupScript => setup_script::parse(source_id, text)?,
        ManifestShape::Tabular => pyproject::parse(source_id, text)?,
    };
    raw.finish()
}

/// Field values gathered by a shape parser before normalization.
#[derive(Debug, Default)]
pub(crate) struct RawMetadata {
    pub source_id: String,
    pub name: Option<String>,
    pub version: Option<String>,
    pub summary: Option<String>,
    pub description: Option<String>,
    pub license: Option<String>,
    pub url: Option<String>,
    pub project_urls: BTreeMap<String, String>,
    pub identities: Vec<Identity>,
    pub classifiers: Vec<String>,
    pub keywords: Vec<String>,
    /// Requirement strings, each with the extra it is conditional on.
    pub requirements: Vec<(String, Option<String>)>,
    pub python_requires: Option<String>,
    pub entry_points: BTreeMap<String, BTreeMap<String, String>>,
    pub provides_extras: Vec<String>,
    pub extras: BTreeMap<String, serde_json::Value>,
    /// Why `version` is absent, when the shape parser knows.
    pub version_hint: Option<String>,
    pub warnings: Vec<Warning>,
}

impl RawMetadata {
    pub fn new(source_id: &str) -> Self {
        Self {
            source_id: source_id.to_string(),
            ..Self::default()
        }
    }

    /// Keep an unrecognized field and note it.
    pub fn preserve_unknown(&mut self, field: &str, value: serde_json::Value) {
        self.warnings.push(Warning::UnknownField {
            source_id: self.source_id.clone(),
            field: field.to_string(),
        });
        self.extras.insert(field.to_string(), value);
    }

    pub fn unresolved(&mut self, argument: &str) {
        self.warnings.push(Warning::UnresolvedArgument {
            source_id: self.source_id.clone(),
            argument: argument.to_string(),
        });
    }

    pub fn add_identities(&mut self, role: IdentityRole, name: Option<&str>, email: Option<&str>) {
        self.identities.extend(split_identities(role, name, email));
    }

    fn finish(self) -> PkgdexResult<ParsedManifest> {
        let malformed = |message: String| PkgdexError::MalformedManifest {
            source_id: self.source_id.clone(),
            message,
        };

        let display_name = self
            .name
            .as_deref()
            .map(str::trim)
            .filter(|n| !n.is_empty())
            .ok_or_else(|| malformed("missing required field 'name'".to_string()))?
            .to_string();
        if !name::is_valid(&display_name) {
            return Err(malformed(format!("invalid package name '{display_name}'")));
        }

        let version = match self.version.as_deref().map(str::trim) {
            Some(v) if !v.is_empty() => {
                VersionSpec::parse(v).map_err(|e| malformed(e.to_string()))?
            }
            _ => {
                let detail = self
                    .version_hint
                    .as_deref()
                    .map(|hint| format!(" ({hint})"))
                    .unwrap_or_default();
                return Err(malformed(format!("missing required field 'version'{detail}")));
            }
        };

        let mut warnings = self.warnings;

        let mut requirements = Vec::with_capacity(self.requirements.len());
        for (text, extra) in &self.requirements {
            match Requirement::parse(text) {
                Ok(req) => requirements.push(match extra {
                    Some(extra) => req.with_extra_marker(extra),
                    None => req,
                }),
                Err(e) => {
                    tracing::warn!("{}: dropping requirement '{text}': {e}", self.source_id);
                    warnings.push(Warning::BadRequirement {
                        source_id: self.source_id.clone(),
                        requirement: text.clone(),
                        reason: e.to_string(),
                    });
                }
            }
        }

        let python_requires = match self.python_requires.as_deref().map(str::trim) {
            Some(text) if !text.is_empty() => match VersionRange::parse(text) {
                Ok(range) => Some(range),
                Err(e) => {
                    warnings.push(Warning::BadInterpreterRange {
                        source_id: self.source_id.clone(),
                        range: text.to_string(),
                        reason: e.to_string(),
                    });
                    None
                }
            },
            _ => None,
        };

        let keywords = split_keywords(&self.keywords);
        let classifiers: BTreeSet<String> = self
            .classifiers
            .iter()
            .map(|c| c.trim())
            .filter(|c| !c.is_empty())
            .map(str::to_string)
            .collect();
        let provides_extras = self
            .provides_extras
            .iter()
            .map(|e| name::canonicalize(e))
            .filter(|e| !e.is_empty())
            .collect();

        let record = PackageRecord {
            name: name::canonicalize(&display_name),
            display_name,
            version,
            summary: non_empty(self.summary),
            description: non_empty(self.description),
            identities: self.identities,
            license: non_empty(self.license),
            url: non_empty(self.url),
            project_urls: self.project_urls,
            classifiers,
            keywords,
            requirements,
            python_requires,
            entry_points: self.entry_points,
            provides_extras,
            extras: self.extras,
            source_id: self.source_id,
        };
        tracing::debug!("parsed {} from {}", record.key(), record.source_id);
        Ok(ParsedManifest { record, warnings })
    }
}

fn non_empty(value: Option<String>) -> Option<String> {
    value
        .map(|v| v.trim().to_string())
        .filter(|v| !v.is_empty())
}

/// Keywords arrive either as a list or as one string separated by commas
/// (or, failing that, whitespace).
fn split_keywords(raw: &[String]) -> Vec<String> {
    let mut out: Vec<String> = Vec::new();
    for entry in raw {
        let parts: Vec<&str> = if entry.contains(',') {
            entry.split(',').collect()
        } else {
            entry.split_whitespace().collect()
        };
        for part in parts {
            let part = part.trim();
            if !part.is_empty() && !out.iter().any(|k| k == part) {
                out.push(part.to_string());
            }
        }
    }
    out
}

/// Build identities from a name field and an email field. Either may hold a
/// comma-separated list, and emails may use the `Name <address>` form.
fn split_identities(role: IdentityRole, name: Option<&str>, email: Option<&str>) -> Vec<Identity> {
    let name = name.map(str::trim).filter(|n| !n.is_empty());
    let email = email.map(str::trim).filter(|e| !e.is_empty());

    match email {
        Some(emails) if emails.contains('<') => emails
            .split(',')
            .filter_map(|entry| {
                let entry = entry.trim();
                let (who, addr) = match entry.split_once('<') {
                    Some((who, rest)) => (who.trim(), rest.trim_end_matches('>').trim()),
                    None => ("", entry),
                };
                let who = if who.is_empty() { name } else { Some(who) };
                (!addr.is_empty() || who.is_some()).then(|| Identity {
                    role,
                    name: who.map(str::to_string),
                    email: (!addr.is_empty()).then(|| addr.to_string()),
                })
            })
            .collect(),
        _ if name.is_none() && email.is_none() => Vec::new(),
        _ => vec![Identity {
            role,
            name: name.map(str::to_string),
            email: email.map(str::to_string),
        }],
    }
}

/// Parse `name = module:attr [extras]` into `(name, target)`.
pub(crate) fn parse_entry_point(line: &str) -> Option<(String, String)> {
    let (name, target) = line.split_once('=')?;
    let name = name.trim();
    let target = target.trim();
    (!name.is_empty() && !target.is_empty()).then(|| (name.to_string(), target.to_string()))
}

/// Parse INI-style entry points (`[group]` headers followed by `name = target` lines).
pub(crate) fn parse_entry_points_ini(text: &str) -> BTreeMap<String, BTreeMap<String, String>> {
    let mut groups: BTreeMap<String, BTreeMap<String, String>> = BTreeMap::new();
    let mut current: Option<String> = None;
    for line in text.lines() {
        let line = line.trim();
        if line.is_empty() || line.starts_with('#') || line.starts_with(';') {
            continue;
        }
        if let Some(group) = line.strip_prefix('[').and_then(|l| l.strip_suffix(']')) {
            let group = group.trim().to_string();
            groups.entry(group.clone()).or_default();
            current = Some(group);
        } else if let (Some(group), Some((name, target))) = (&current, parse_entry_point(line)) {
            groups.entry(group.clone()).or_default().insert(name, target);
        }
    }
    groups
}
