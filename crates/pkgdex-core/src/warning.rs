//! Non-fatal diagnostics collected while parsing, indexing and resolving.

use serde::{Deserialize, Serialize};
use thiserror::Error;

/// A problem that was recovered from. The offending input is kept, dropped,
/// or replaced as described by each variant.
#[derive(Debug, Clone, PartialEq, Eq, Error, Serialize, Deserialize)]
pub enum Warning {
    /// A manifest field outside the recognized set; kept in the record's `extras`.
    #[error("{source_id}: unknown field '{field}' preserved")]
    UnknownField { source_id: String, field: String },

    /// A dependency string that could not be parsed; the requirement was dropped.
    #[error("{source_id}: dropped requirement '{requirement}': {reason}")]
    BadRequirement {
        source_id: String,
        requirement: String,
        reason: String,
    },

    /// The declared interpreter range could not be parsed and was left empty.
    #[error("{source_id}: ignored interpreter range '{range}': {reason}")]
    BadInterpreterRange {
        source_id: String,
        range: String,
        reason: String,
    },

    /// A setup-script argument whose value is not a literal; it was not evaluated.
    #[error("{source_id}: argument '{argument}' is not a literal and was skipped")]
    UnresolvedArgument { source_id: String, argument: String },

    /// A record that requires its own name; the requirement was dropped.
    #[error("{name} {version}: requirement on itself dropped")]
    SelfDependency { name: String, version: String },

    /// The same `(name, version)` was ingested twice; the later record won.
    #[error("duplicate record {name} {version} from {source_id}; later record wins")]
    DuplicateRecord {
        name: String,
        version: String,
        source_id: String,
    },

    /// A requirement asked for an extra the selected release does not declare.
    #[error("{name} {version} does not declare extra '{extra}'")]
    UnknownExtra {
        name: String,
        version: String,
        extra: String,
    },
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn display_names_the_source() {
        let w = Warning::BadRequirement {
            source_id: "acme/setup.py".into(),
            requirement: "widget >=banana".into(),
            reason: "invalid version".into(),
        };
        assert_eq!(
            w.to_string(),
            "acme/setup.py: dropped requirement 'widget >=banana': invalid version"
        );
    }

    #[test]
    fn duplicate_display() {
        let w = Warning::DuplicateRecord {
            name: "acme".into(),
            version: "1.0".into(),
            source_id: "b".into(),
        };
        assert!(w.to_string().contains("later record wins"));
    }
}
