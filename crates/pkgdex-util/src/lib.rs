//! Shared utilities for pkgdex.
//!
//! This crate provides the cross-cutting error type used by all other pkgdex
//! crates.

pub mod errors;
