//! Commit-graph discovery with span and inferred-time labeling
//!
//! Reads a git repository's loose objects, merges the history behind every
//! branch into one deduplicated DAG, and labels each commit with a lane
//! (span) and a timestamp that strictly increases along every edge.

pub mod areas;
pub mod artifacts;
pub mod commands;
pub mod config;
pub mod errors;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, clap::ValueEnum)]
pub enum ReportFormat {
    #[default]
    Text,
    Json,
}
