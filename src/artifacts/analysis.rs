//! One analysis run over one repository
//!
//! [`RepositoryAnalysis`] owns every table a run touches. Nothing is shared
//! between runs, and the builder and assigner only ever see the state handed
//! to them here.

use crate::artifacts::graph::builder::{DiscoveryLimits, GraphBuilder};
use crate::artifacts::graph::commit_table::CommitTable;
use crate::artifacts::graph::prefetch::prefetch;
use crate::artifacts::graph::source::{CommitSource, NamedRef};
use crate::artifacts::graph::span_assigner::{SpanAssigner, Unassigned};
use crate::artifacts::objects::object_id::ObjectId;
use crate::config::AnalysisConfig;
use crate::errors::GraphError;
use indexmap::IndexMap;
use serde::Serialize;
use std::collections::BTreeMap;
use std::sync::Arc;
use tracing::{info, warn};

/// The references a run started from, plus the roots discovery found
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize)]
pub struct RepositorySnapshot {
    pub branches: BTreeMap<String, ObjectId>,
    pub tags: BTreeMap<String, ObjectId>,
    /// Root hash to the branch that first reached it
    pub roots: IndexMap<ObjectId, String>,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct AnalysisOutcome {
    pub table: CommitTable,
    pub snapshot: RepositorySnapshot,
    pub spans_allocated: u32,
    pub unassigned: Vec<Unassigned>,
    /// Everything that was isolated rather than fatal, in the order found
    pub errors: Vec<GraphError>,
}

impl AnalysisOutcome {
    pub fn is_complete(&self) -> bool {
        self.errors.is_empty() && self.unassigned.is_empty()
    }
}

#[derive(Debug, Clone)]
pub struct RepositoryAnalysis {
    config: AnalysisConfig,
}

fn partition_refs(
    kind: &str,
    refs: Vec<Result<NamedRef, GraphError>>,
    errors: &mut Vec<GraphError>,
) -> Vec<NamedRef> {
    let mut resolved = refs
        .into_iter()
        .filter_map(|reference| match reference {
            Ok(reference) => Some(reference),
            Err(error) => {
                warn!(kind, %error, "skipping unresolved reference");
                errors.push(error);
                None
            }
        })
        .collect::<Vec<_>>();
    resolved.sort();
    resolved
}

impl RepositoryAnalysis {
    pub fn new(config: AnalysisConfig) -> Self {
        RepositoryAnalysis { config }
    }

    pub fn config(&self) -> &AnalysisConfig {
        &self.config
    }

    /// Discover and label the whole history reachable from `source`
    pub fn run<S: CommitSource + ?Sized>(&self, source: &S) -> Result<AnalysisOutcome, GraphError> {
        let mut errors = Vec::new();
        let branches = partition_refs("branch", source.list_branch_tips(), &mut errors);
        let tags = partition_refs("tag", source.list_tags(), &mut errors);

        let limits = DiscoveryLimits {
            max_walk_depth: self.config.max_walk_depth,
            max_commits: self.config.max_commits,
        };
        let mut builder = GraphBuilder::new(source, limits);
        for branch in &branches {
            builder.discover(&branch.oid, &branch.name)?;
        }
        builder.annotate_refs(&branches, &tags);
        let mut discovery = builder.finish();
        errors.append(&mut discovery.errors);
        info!(
            branches = branches.len(),
            commits = discovery.table.len(),
            roots = discovery.roots.len(),
            "discovered history"
        );

        let roots = discovery.roots.keys().cloned().collect::<Vec<_>>();
        let mut assignment =
            SpanAssigner::new(&mut discovery.table, self.config.max_worklist).assign(&roots)?;
        errors.append(&mut assignment.errors);

        let snapshot = RepositorySnapshot {
            branches: branches
                .into_iter()
                .map(|branch| (branch.name, branch.oid))
                .collect(),
            tags: tags.into_iter().map(|tag| (tag.name, tag.oid)).collect(),
            roots: discovery.roots,
        };

        Ok(AnalysisOutcome {
            table: discovery.table,
            snapshot,
            spans_allocated: assignment.spans_allocated,
            unassigned: assignment.unassigned,
            errors,
        })
    }

    /// Same result as [`run`](Self::run), reading commits with `jobs` workers
    pub async fn run_parallel<S: CommitSource + 'static>(
        &self,
        source: Arc<S>,
    ) -> Result<AnalysisOutcome, GraphError> {
        if self.config.jobs <= 1 {
            return self.run(source.as_ref());
        }

        let tips = source
            .list_branch_tips()
            .into_iter()
            .filter_map(Result::ok)
            .collect::<Vec<_>>();
        let cache = prefetch(source, &tips, self.config.jobs, self.config.max_commits).await?;

        self.run(&cache)
    }
}
