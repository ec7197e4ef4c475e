//! Graph discovery
//!
//! Walks backward from every branch tip along parent pointers and builds one
//! deduplicated commit table. The first walk to reach a hash fetches it from
//! the [`CommitSource`] and keeps going; every later walk only links itself
//! in as a child and stops there, so each commit is read exactly once no
//! matter how many branches share it. Split points (several children) fall
//! out of those later arrivals.
//!
//! The walk is depth-first over an explicit stack, visiting parents in their
//! recorded order, which gives the same child order as the recursive
//! formulation without being bounded by the call stack.
//!
//! A hash the source failed to produce is remembered and never asked for
//! again. A hash cut off by the depth limit remembers the child that reached
//! it, so a later, shallower walk that does store it links that child too.

use crate::artifacts::graph::commit_node::CommitNode;
use crate::artifacts::graph::commit_table::CommitTable;
use crate::artifacts::graph::source::{CommitSource, NamedRef};
use crate::artifacts::objects::object_id::ObjectId;
use crate::errors::GraphError;
use indexmap::IndexMap;
use indexmap::map::Entry;
use std::collections::HashSet;
use tracing::{debug, warn};

#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct DiscoveryLimits {
    pub max_walk_depth: Option<usize>,
    pub max_commits: Option<usize>,
}

/// Result of discovering every branch tip
#[derive(Debug, Default)]
pub struct Discovery {
    pub table: CommitTable,
    /// Root hash to the branch whose walk first reached it
    pub roots: IndexMap<ObjectId, String>,
    /// Non-fatal failures, isolated per subtree
    pub errors: Vec<GraphError>,
}

struct Frame {
    oid: ObjectId,
    child: Option<ObjectId>,
    depth: usize,
}

pub struct GraphBuilder<'s, S: CommitSource + ?Sized> {
    source: &'s S,
    limits: DiscoveryLimits,
    discovery: Discovery,
    /// Hashes `get_commit` already failed on
    failed: HashSet<ObjectId>,
    /// Children of hashes not stored because of `max_walk_depth`
    cut_off: IndexMap<ObjectId, Vec<ObjectId>>,
}

impl<'s, S: CommitSource + ?Sized> GraphBuilder<'s, S> {
    pub fn new(source: &'s S, limits: DiscoveryLimits) -> Self {
        GraphBuilder {
            source,
            limits,
            discovery: Discovery::default(),
            failed: HashSet::new(),
            cut_off: IndexMap::new(),
        }
    }

    /// Walk one branch from its tip towards the roots
    ///
    /// A commit the source cannot resolve is recorded and its subtree skipped;
    /// the rest of the walk continues. Only exceeding `max_commits` is
    /// returned as an error, since it ends the whole run.
    pub fn discover(&mut self, tip: &ObjectId, branch: &str) -> Result<(), GraphError> {
        let mut stack = vec![Frame {
            oid: tip.clone(),
            child: None,
            depth: 0,
        }];
        let mut depth_reported = false;

        while let Some(frame) = stack.pop() {
            let entry = self.discovery.table.entry(frame.oid.clone());

            let vacant = match entry {
                Entry::Occupied(mut occupied) => {
                    let node = occupied.get_mut();
                    node.revisit(frame.child.clone(), branch);
                    if node.is_split() {
                        debug!(commit = %frame.oid, children = node.child_hashes().len(), "found split commit");
                    } else {
                        debug!(commit = %frame.oid, "commit already known");
                    }
                    continue;
                }
                Entry::Vacant(vacant) => vacant,
            };

            if self.failed.contains(&frame.oid) {
                debug!(commit = %frame.oid, branch, "commit already known to be unreadable");
                continue;
            }

            if let Some(limit) = self.limits.max_walk_depth
                && frame.depth > limit
            {
                if let Some(child) = frame.child {
                    let children = self.cut_off.entry(frame.oid.clone()).or_default();
                    if !children.contains(&child) {
                        children.push(child);
                    }
                }
                if !depth_reported {
                    warn!(branch, commit = %frame.oid, limit, "walk depth exceeded");
                    self.discovery.errors.push(GraphError::WalkDepthExceeded {
                        branch: branch.to_string(),
                        oid: frame.oid.clone(),
                        limit,
                    });
                    depth_reported = true;
                }
                continue;
            }

            if let Some(limit) = self.limits.max_commits
                && vacant.index() >= limit
            {
                return Err(GraphError::CommitLimitExceeded { limit });
            }

            let raw = match self.source.get_commit(&frame.oid) {
                Ok(raw) => raw,
                Err(error) => {
                    let error = error.on_branch(branch);
                    warn!(branch, commit = %frame.oid, %error, "skipping unreadable subtree");
                    self.failed.insert(frame.oid);
                    self.discovery.errors.push(error);
                    continue;
                }
            };

            let earlier_children = self.cut_off.shift_remove(&frame.oid).unwrap_or_default();
            let node = vacant.insert(CommitNode::discovered(raw, branch, None));
            for child in earlier_children.into_iter().chain(frame.child) {
                node.link_child(child);
            }
            debug!(commit = %frame.oid, parents = node.parent_hashes().len(), branch, "storing commit");

            if node.parent_hashes().is_empty() {
                debug!(commit = %frame.oid, branch, "reached root commit");
                self.discovery
                    .roots
                    .entry(frame.oid.clone())
                    .or_insert_with(|| branch.to_string());
                continue;
            }
            if node.parent_hashes().len() > 1 {
                debug!(commit = %frame.oid, parents = node.parent_hashes().len(), "merge commit");
            }

            // reversed so the first parent is walked first
            for parent in node.parent_hashes().iter().rev() {
                stack.push(Frame {
                    oid: parent.clone(),
                    child: Some(frame.oid.clone()),
                    depth: frame.depth + 1,
                });
            }
        }

        Ok(())
    }

    /// Mark branch heads and attach tags to the commits they name
    pub fn annotate_refs(&mut self, branches: &[NamedRef], tags: &[NamedRef]) {
        for branch in branches {
            if let Some(node) = self.discovery.table.get_mut(&branch.oid) {
                node.add_branch_head(&branch.name);
            }
        }
        for tag in tags {
            match self.discovery.table.get_mut(&tag.oid) {
                Some(node) => node.add_tag(&tag.name),
                None => warn!(tag = %tag.name, commit = %tag.oid, "tag points outside the discovered history"),
            }
        }
    }

    pub fn finish(self) -> Discovery {
        self.discovery
    }
}
