//! In-memory package index.
//!
//! [`IndexBuilder`] ingests manifest blobs from a single producer and
//! [`IndexBuilder::build`] freezes them into an [`Index`], which is `Send +
//! Sync` and can be shared behind an `Arc` for lock-free parallel queries.

pub mod builder;
pub mod index;

pub use builder::IndexBuilder;
pub use index::Index;
