//! The seam between the graph core and the version-control access layer
//!
//! Discovery pulls everything it needs through [`CommitSource`]: branch tips,
//! tags and, once per hash, a commit's parents and timestamps. The on-disk
//! repository implements it, and so does [`InMemorySource`], which backs the
//! tests and holds the cache filled by parallel prefetch.

use crate::artifacts::objects::object_id::ObjectId;
use crate::errors::GraphError;
use chrono::{DateTime, FixedOffset};
use dashmap::DashMap;
use derive_new::new;
use std::collections::HashMap;

/// What discovery needs to know about one commit
#[derive(Debug, Clone, PartialEq, Eq, new)]
pub struct RawCommit {
    pub oid: ObjectId,
    pub parents: Vec<ObjectId>,
    pub author_time: DateTime<FixedOffset>,
    pub committer_time: DateTime<FixedOffset>,
}

/// A branch or tag name resolved to the commit it points at
#[derive(Debug, Clone, PartialEq, Eq, PartialOrd, Ord, new)]
pub struct NamedRef {
    pub name: String,
    pub oid: ObjectId,
}

pub trait CommitSource: Send + Sync {
    /// Every branch tip; a branch that cannot be resolved is reported as a
    /// `ReferenceResolution` entry without hiding the others.
    fn list_branch_tips(&self) -> Vec<Result<NamedRef, GraphError>>;

    /// Every tag, peeled to the commit it names.
    fn list_tags(&self) -> Vec<Result<NamedRef, GraphError>>;

    /// Fails with `CommitNotFound` when the hash cannot be resolved.
    fn get_commit(&self, oid: &ObjectId) -> Result<RawCommit, GraphError>;
}

/// Commit source held entirely in memory
#[derive(Debug, Default)]
pub struct InMemorySource {
    commits: HashMap<ObjectId, RawCommit>,
    failures: HashMap<ObjectId, GraphError>,
    branches: Vec<Result<NamedRef, GraphError>>,
    tags: Vec<Result<NamedRef, GraphError>>,
    reads: DashMap<ObjectId, usize>,
}

impl InMemorySource {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn insert_commit(&mut self, commit: RawCommit) -> &mut Self {
        self.commits.insert(commit.oid.clone(), commit);
        self
    }

    /// Make `get_commit` fail for this hash with the given error
    pub fn insert_failure(&mut self, oid: ObjectId, error: GraphError) -> &mut Self {
        self.failures.insert(oid, error);
        self
    }

    pub fn insert_branch(&mut self, name: &str, oid: ObjectId) -> &mut Self {
        self.branches.push(Ok(NamedRef::new(name.to_string(), oid)));
        self
    }

    pub fn insert_tag(&mut self, name: &str, oid: ObjectId) -> &mut Self {
        self.tags.push(Ok(NamedRef::new(name.to_string(), oid)));
        self
    }

    pub fn insert_unresolved_branch(&mut self, name: &str, reason: &str) -> &mut Self {
        self.branches.push(Err(GraphError::ReferenceResolution {
            name: name.to_string(),
            reason: reason.to_string(),
        }));
        self
    }

    pub fn set_refs(
        &mut self,
        branches: Vec<Result<NamedRef, GraphError>>,
        tags: Vec<Result<NamedRef, GraphError>>,
    ) -> &mut Self {
        self.branches = branches;
        self.tags = tags;
        self
    }

    pub fn len(&self) -> usize {
        self.commits.len()
    }

    pub fn is_empty(&self) -> bool {
        self.commits.is_empty()
    }

    /// How many times `get_commit` was called for this hash
    pub fn reads_of(&self, oid: &ObjectId) -> usize {
        self.reads.get(oid).map(|count| *count).unwrap_or(0)
    }

    pub fn total_reads(&self) -> usize {
        self.reads.iter().map(|entry| *entry.value()).sum()
    }
}

impl CommitSource for InMemorySource {
    fn list_branch_tips(&self) -> Vec<Result<NamedRef, GraphError>> {
        self.branches.clone()
    }

    fn list_tags(&self) -> Vec<Result<NamedRef, GraphError>> {
        self.tags.clone()
    }

    fn get_commit(&self, oid: &ObjectId) -> Result<RawCommit, GraphError> {
        *self.reads.entry(oid.clone()).or_insert(0) += 1;

        if let Some(error) = self.failures.get(oid) {
            return Err(error.clone());
        }
        self.commits
            .get(oid)
            .cloned()
            .ok_or_else(|| GraphError::CommitNotFound {
                oid: oid.clone(),
                branch: None,
            })
    }
}
