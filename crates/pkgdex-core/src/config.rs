use serde::{Deserialize, Serialize};
use std::collections::BTreeSet;
use std::path::Path;

use pkgdex_util::errors::{PkgdexError, PkgdexResult};

use crate::name;

/// Index-building and resolution settings, usually loaded from `pkgdex.toml`.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct IndexConfig {
    /// Reject a second record for the same `(name, version)` instead of
    /// letting the later one win.
    #[serde(default, rename = "strict-duplicates")]
    pub strict_duplicates: bool,

    /// Names that never denote installable packages (standard-library
    /// modules listed as requirements by mistake). Requirements on them are
    /// dropped at ingestion.
    #[serde(default, rename = "phantom-names")]
    pub phantom_names: BTreeSet<String>,

    /// Default number of candidate visits a resolution may take.
    #[serde(default, rename = "step-budget")]
    pub step_budget: Option<u64>,
}

impl IndexConfig {
    /// Load a configuration file.
    pub fn from_path(path: &Path) -> PkgdexResult<Self> {
        let content = std::fs::read_to_string(path).map_err(|e| PkgdexError::Config {
            message: format!("Failed to read {}: {e}", path.display()),
        })?;
        Self::from_toml_str(&content)
    }

    /// Parse a configuration from TOML text. Phantom names are canonicalized.
    pub fn from_toml_str(content: &str) -> PkgdexResult<Self> {
        let mut config: Self = toml::from_str(content).map_err(|e| PkgdexError::Config {
            message: format!("Failed to parse index configuration: {e}"),
        })?;
        config.phantom_names = config
            .phantom_names
            .iter()
            .map(|n| name::canonicalize(n))
            .filter(|n| !n.is_empty())
            .collect();
        Ok(config)
    }

    pub fn with_phantom_names<I, S>(mut self, names: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: AsRef<str>,
    {
        self.phantom_names
            .extend(names.into_iter().map(|n| name::canonicalize(n.as_ref())));
        self
    }

    pub fn is_phantom(&self, canonical_name: &str) -> bool {
        self.phantom_names.contains(canonical_name)
    }
}
