//! Commit graph discovery and labeling
//!
//! - `source`: the seam to the object store, plus an in-memory implementation
//! - `commit_node` / `commit_table`: the deduplicated, annotated history
//! - `builder`: backward walks from branch tips that build the table
//! - `prefetch`: parallel, read-once population of a commit cache
//! - `span_assigner`: forward labeling with spans and inferred times
//! - `invariants`: consistency checks over a labeled table

pub mod builder;
pub mod commit_node;
pub mod commit_table;
pub mod invariants;
pub mod prefetch;
pub mod source;
pub mod span_assigner;

#[cfg(test)]
pub(crate) mod test_support;
