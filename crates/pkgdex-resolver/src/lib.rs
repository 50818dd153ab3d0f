//! Dependency graph construction over package releases and version
//! resolution: backtracking search with conflict-directed backjumping that
//! yields an assignment, a minimal conflict report, or partial progress.

pub mod conflict;
pub mod graph;
pub mod resolver;
