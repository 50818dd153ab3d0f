use miette::Diagnostic;
use thiserror::Error;

/// Unified error type for all pkgdex operations.
#[derive(Debug, Error, Diagnostic)]
pub enum PkgdexError {
    /// I/O operation failed.
    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),

    /// A manifest blob is missing its name or version, or cannot be read at all.
    #[error("Malformed manifest {source_id}: {message}")]
    #[diagnostic(help("Every manifest needs a parseable name and version"))]
    MalformedManifest { source_id: String, message: String },

    /// A version literal does not follow the `N(.N)*[{a|b|rc}N][.postN][.devN]` grammar.
    #[error("Invalid version '{input}': {reason}")]
    InvalidVersion { input: String, reason: String },

    /// A version range expression could not be parsed.
    #[error("Invalid version range '{input}': {reason}")]
    InvalidRange { input: String, reason: String },

    /// A requirement string could not be parsed.
    #[error("Invalid requirement '{input}': {reason}")]
    InvalidRequirement { input: String, reason: String },

    /// The same `(name, version)` was ingested twice while strict mode is on.
    #[error("Duplicate record {name} {version}")]
    #[diagnostic(help("Disable `strict-duplicates` to let the later record win"))]
    DuplicateRecord { name: String, version: String },

    /// Configuration could not be loaded.
    #[error("Configuration error: {message}")]
    Config { message: String },
}

/// Convenience alias for results carrying a [`PkgdexError`].
pub type PkgdexResult<T> = std::result::Result<T, PkgdexError>;
