//! Core data types for pkgdex.
//!
//! This crate defines the types every other pkgdex crate works with:
//! canonical package names, versions and version ranges, requirements,
//! package records, non-fatal warnings, the three-shape manifest parser,
//! and index configuration.
//!
//! This crate is intentionally free of network I/O and never executes
//! manifest content.

pub mod config;
pub mod manifest;
pub mod name;
pub mod range;
pub mod record;
pub mod requirement;
pub mod version;
pub mod warning;
