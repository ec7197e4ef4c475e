use crate::artifacts::graph::commit_node::CommitNode;
use crate::artifacts::objects::object_id::ObjectId;
use indexmap::IndexMap;
use indexmap::map::Entry;
use serde::Serialize;

/// Deduplicated commit table, keyed by hash, in discovery order
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize)]
#[serde(transparent)]
pub struct CommitTable {
    nodes: IndexMap<ObjectId, CommitNode>,
}

impl CommitTable {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn get(&self, oid: &ObjectId) -> Option<&CommitNode> {
        self.nodes.get(oid)
    }

    pub(crate) fn get_mut(&mut self, oid: &ObjectId) -> Option<&mut CommitNode> {
        self.nodes.get_mut(oid)
    }

    pub fn contains(&self, oid: &ObjectId) -> bool {
        self.nodes.contains_key(oid)
    }

    pub fn len(&self) -> usize {
        self.nodes.len()
    }

    pub fn is_empty(&self) -> bool {
        self.nodes.is_empty()
    }

    pub fn iter(&self) -> impl Iterator<Item = &CommitNode> {
        self.nodes.values()
    }

    pub(crate) fn entry(&mut self, oid: ObjectId) -> Entry<'_, ObjectId, CommitNode> {
        self.nodes.entry(oid)
    }

    /// Resolve an abbreviated hash against the table
    ///
    /// Returns every node whose hash starts with `prefix`; more than one
    /// result means the prefix is ambiguous.
    pub fn find_by_prefix(&self, prefix: &str) -> Vec<&CommitNode> {
        self.nodes
            .values()
            .filter(|node| node.hash().starts_with(prefix))
            .collect()
    }

    /// Nodes ordered by inferred time, then hash; unassigned nodes last
    pub fn chronological(&self) -> Vec<&CommitNode> {
        let mut nodes = self.nodes.values().collect::<Vec<_>>();
        nodes.sort_by(|a, b| {
            match (a.inferred_time(), b.inferred_time()) {
                (Some(a_time), Some(b_time)) => a_time.cmp(&b_time),
                (Some(_), None) => std::cmp::Ordering::Less,
                (None, Some(_)) => std::cmp::Ordering::Greater,
                (None, None) => std::cmp::Ordering::Equal,
            }
            .then_with(|| a.hash().cmp(b.hash()))
        });
        nodes
    }
}
