//! Error taxonomy for commit-graph analysis
//!
//! Plumbing (object files, refs) reports failures through `anyhow` with
//! context; everything that crosses into the graph core is one of these.

use crate::artifacts::objects::object_id::ObjectId;
use serde::Serialize;

#[derive(Debug, Clone, PartialEq, Eq, Serialize, thiserror::Error)]
#[serde(tag = "kind", rename_all = "snake_case")]
pub enum GraphError {
    /// The version-control layer cannot resolve a referenced hash
    #[error("commit {oid} not found{}", branch_suffix(.branch))]
    CommitNotFound {
        oid: ObjectId,
        branch: Option<String>,
    },

    /// A branch or tag name cannot be mapped to a commit hash
    #[error("cannot resolve reference {name}: {reason}")]
    ReferenceResolution { name: String, reason: String },

    /// A merge commit names a parent that discovery never produced
    #[error("merge commit {commit} has undiscovered parents: {}", join_oids(.missing))]
    DanglingMergeParent {
        commit: ObjectId,
        missing: Vec<ObjectId>,
    },

    /// The DAG assumption is broken: cycle, re-assignment, corrupt links
    #[error("invariant violation: {reason}")]
    InvariantViolation { reason: String },

    #[error("walk of branch {branch} exceeded depth {limit} at {oid}")]
    WalkDepthExceeded {
        branch: String,
        oid: ObjectId,
        limit: usize,
    },

    #[error("commit table exceeded the limit of {limit} commits")]
    CommitLimitExceeded { limit: usize },

    /// Object store or refs failure other than a missing commit
    #[error("storage error: {reason}")]
    Storage { reason: String },
}

impl GraphError {
    /// Fatal errors abort the whole run; the rest are collected per reference
    /// or per subtree while the analysis continues.
    pub fn is_fatal(&self) -> bool {
        matches!(
            self,
            GraphError::InvariantViolation { .. } | GraphError::CommitLimitExceeded { .. }
        )
    }

    pub fn storage(error: anyhow::Error) -> Self {
        GraphError::Storage {
            reason: format!("{error:#}"),
        }
    }

    pub fn invariant(reason: impl Into<String>) -> Self {
        GraphError::InvariantViolation {
            reason: reason.into(),
        }
    }

    /// Attach the branch whose walk hit a missing commit
    pub fn on_branch(self, branch_name: &str) -> Self {
        match self {
            GraphError::CommitNotFound { oid, branch: None } => GraphError::CommitNotFound {
                oid,
                branch: Some(branch_name.to_string()),
            },
            other => other,
        }
    }
}

fn branch_suffix(branch: &Option<String>) -> String {
    branch
        .as_ref()
        .map(|branch| format!(" (reached from {branch})"))
        .unwrap_or_default()
}

fn join_oids(oids: &[ObjectId]) -> String {
    oids.iter()
        .map(|oid| oid.to_short_oid())
        .collect::<Vec<_>>()
        .join(", ")
}
