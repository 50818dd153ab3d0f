//! The uniform, immutable result of parsing one manifest.

use std::collections::{BTreeMap, BTreeSet};
use std::fmt;

use serde::{Deserialize, Serialize};

use crate::range::VersionRange;
use crate::requirement::Requirement;
use crate::version::VersionSpec;

/// `(canonical name, version)`: the identity of one released artifact.
#[derive(Debug, Clone, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
pub struct PackageKey {
    pub name: String,
    pub version: VersionSpec,
}

impl PackageKey {
    pub fn new(name: impl Into<String>, version: VersionSpec) -> Self {
        Self {
            name: name.into(),
            version,
        }
    }
}

impl fmt::Display for PackageKey {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{} {}", self.name, self.version)
    }
}

/// Which role a person plays for a package.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum IdentityRole {
    Author,
    Maintainer,
}

/// A person or organization named in a manifest.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Identity {
    pub role: IdentityRole,
    #[serde(default)]
    pub name: Option<String>,
    #[serde(default)]
    pub email: Option<String>,
}

/// One released artifact, normalized from any manifest shape.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct PackageRecord {
    /// Canonical name.
    pub name: String,
    /// The name exactly as the manifest spelled it.
    pub display_name: String,
    pub version: VersionSpec,
    #[serde(default)]
    pub summary: Option<String>,
    #[serde(default)]
    pub description: Option<String>,
    #[serde(default)]
    pub identities: Vec<Identity>,
    #[serde(default)]
    pub license: Option<String>,
    #[serde(default)]
    pub url: Option<String>,
    #[serde(default)]
    pub project_urls: BTreeMap<String, String>,
    #[serde(default)]
    pub classifiers: BTreeSet<String>,
    #[serde(default)]
    pub keywords: Vec<String>,
    #[serde(default)]
    pub requirements: Vec<Requirement>,
    #[serde(default)]
    pub python_requires: Option<VersionRange>,
    /// group → entry name → target (`module:attr`).
    #[serde(default)]
    pub entry_points: BTreeMap<String, BTreeMap<String, String>>,
    /// Extras declared explicitly by the manifest.
    #[serde(default)]
    pub provides_extras: BTreeSet<String>,
    /// Unrecognized manifest fields, preserved as plain data.
    #[serde(default)]
    pub extras: BTreeMap<String, serde_json::Value>,
    /// Opaque identifier of the blob this record came from.
    pub source_id: String,
}

impl PackageRecord {
    pub fn key(&self) -> PackageKey {
        PackageKey::new(self.name.clone(), self.version.clone())
    }

    pub fn identities_with(&self, role: IdentityRole) -> impl Iterator<Item = &Identity> {
        self.identities.iter().filter(move |i| i.role == role)
    }

    /// Every extra this release knows about: declared ones plus those named
    /// by extra-conditional requirements.
    pub fn declared_extras(&self) -> BTreeSet<String> {
        let mut out = self.provides_extras.clone();
        out.extend(self.requirements.iter().filter_map(Requirement::extra_condition));
        out
    }

    /// Requirements that apply when the release is installed with `extras`:
    /// all unconditional ones plus those conditional on a requested extra.
    pub fn requirements_for<'a>(
        &'a self,
        extras: &'a BTreeSet<String>,
    ) -> impl Iterator<Item = &'a Requirement> + 'a {
        self.requirements
            .iter()
            .filter(move |req| match req.extra_condition() {
                None => true,
                Some(extra) => extras.contains(&extra),
            })
    }

    /// Whether `keyword` (case-insensitive) is one of the keywords or classifiers.
    pub fn matches_keyword(&self, keyword: &str) -> bool {
        let needle = keyword.trim().to_lowercase();
        self.keywords
            .iter()
            .chain(self.classifiers.iter())
            .any(|k| k.to_lowercase() == needle)
    }
}
