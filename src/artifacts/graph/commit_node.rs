//! One node of the analysis graph
//!
//! A node is created the first time discovery reaches a hash and lives for
//! the rest of the run. History fields (`parent_hashes`, the two recorded
//! timestamps) never change; labeling fields are written exactly once by
//! the span assigner.

use crate::artifacts::graph::source::RawCommit;
use crate::artifacts::objects::object_id::ObjectId;
use crate::errors::GraphError;
use chrono::{DateTime, FixedOffset};
use indexmap::{IndexMap, IndexSet};
use serde::Serialize;

/// Lane identifier; the first allocated span is 1
///
/// An unvisited commit has no span at all (`None`), so there is no numeric
/// sentinel that could be mistaken for a real lane.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize)]
#[serde(transparent)]
pub struct SpanId(u32);

impl SpanId {
    pub const FIRST: SpanId = SpanId(1);

    pub fn new(value: u32) -> Option<Self> {
        (value > 0).then_some(SpanId(value))
    }

    pub fn get(self) -> u32 {
        self.0
    }

    pub(crate) fn next(self) -> Self {
        SpanId(self.0 + 1)
    }
}

impl std::fmt::Display for SpanId {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}", self.0)
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct CommitNode {
    hash: ObjectId,
    parent_hashes: Vec<ObjectId>,
    /// Children in discovery order
    child_hashes: IndexSet<ObjectId>,
    committer_time: DateTime<FixedOffset>,
    author_time: DateTime<FixedOffset>,
    inferred_time: Option<DateTime<FixedOffset>>,
    span: Option<SpanId>,
    parent_spans: Vec<SpanId>,
    child_spans: Vec<SpanId>,
    tags: IndexSet<String>,
    branch_heads: IndexSet<String>,
    is_root: bool,
    /// Diagnostic: how often each branch walk reached this commit
    branch_membership: IndexMap<String, u32>,
}

impl CommitNode {
    pub(crate) fn discovered(raw: RawCommit, branch: &str, child: Option<ObjectId>) -> Self {
        let is_root = raw.parents.is_empty();

        CommitNode {
            hash: raw.oid,
            parent_hashes: raw.parents,
            child_hashes: child.into_iter().collect(),
            committer_time: raw.committer_time,
            author_time: raw.author_time,
            inferred_time: None,
            span: None,
            parent_spans: Vec::new(),
            child_spans: Vec::new(),
            tags: IndexSet::new(),
            branch_heads: IndexSet::new(),
            is_root,
            branch_membership: IndexMap::from([(branch.to_string(), 1)]),
        }
    }

    pub fn hash(&self) -> &ObjectId {
        &self.hash
    }

    pub fn parent_hashes(&self) -> &[ObjectId] {
        &self.parent_hashes
    }

    /// Parents with duplicates removed, in declaration order
    pub fn distinct_parents(&self) -> IndexSet<&ObjectId> {
        self.parent_hashes.iter().collect()
    }

    pub fn child_hashes(&self) -> &IndexSet<ObjectId> {
        &self.child_hashes
    }

    pub fn committer_time(&self) -> DateTime<FixedOffset> {
        self.committer_time
    }

    pub fn author_time(&self) -> DateTime<FixedOffset> {
        self.author_time
    }

    pub fn inferred_time(&self) -> Option<DateTime<FixedOffset>> {
        self.inferred_time
    }

    pub fn span(&self) -> Option<SpanId> {
        self.span
    }

    pub fn parent_spans(&self) -> &[SpanId] {
        &self.parent_spans
    }

    pub fn child_spans(&self) -> &[SpanId] {
        &self.child_spans
    }

    pub fn tags(&self) -> &IndexSet<String> {
        &self.tags
    }

    pub fn branch_heads(&self) -> &IndexSet<String> {
        &self.branch_heads
    }

    pub fn is_root(&self) -> bool {
        self.is_root
    }

    pub fn is_merge(&self) -> bool {
        self.distinct_parents().len() > 1
    }

    pub fn is_split(&self) -> bool {
        self.child_hashes.len() > 1
    }

    pub fn branch_membership(&self) -> &IndexMap<String, u32> {
        &self.branch_membership
    }

    pub fn is_assigned(&self) -> bool {
        self.span.is_some()
    }

    pub(crate) fn link_child(&mut self, child: ObjectId) {
        self.child_hashes.insert(child);
    }

    /// Record another walk arriving at an already known commit
    pub(crate) fn revisit(&mut self, child: Option<ObjectId>, branch: &str) {
        if let Some(child) = child {
            self.link_child(child);
        }
        *self
            .branch_membership
            .entry(branch.to_string())
            .or_insert(0) += 1;
    }

    pub(crate) fn add_tag(&mut self, tag: &str) {
        self.tags.insert(tag.to_string());
    }

    pub(crate) fn add_branch_head(&mut self, branch: &str) {
        self.branch_heads.insert(branch.to_string());
    }

    pub(crate) fn push_parent_span(&mut self, span: SpanId) {
        self.parent_spans.push(span);
    }

    pub(crate) fn push_child_span(&mut self, span: SpanId) {
        self.child_spans.push(span);
    }

    /// Settle the commit's lane and time; a second call is a defect
    pub(crate) fn assign(
        &mut self,
        span: SpanId,
        inferred_time: DateTime<FixedOffset>,
    ) -> Result<(), GraphError> {
        if let Some(existing) = self.span {
            return Err(GraphError::invariant(format!(
                "commit {} already has span {existing}, refusing {span}",
                self.hash
            )));
        }
        self.span = Some(span);
        self.inferred_time = Some(inferred_time);
        Ok(())
    }

    #[cfg(test)]
    pub(crate) fn overwrite_label(&mut self, span: SpanId, inferred_time: DateTime<FixedOffset>) {
        self.span = Some(span);
        self.inferred_time = Some(inferred_time);
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::artifacts::graph::test_support::{oid, raw, ts};

    #[test]
    fn span_zero_is_not_a_span() {
        assert_eq!(SpanId::new(0), None);
        assert_eq!(SpanId::new(1), Some(SpanId::FIRST));
        assert_eq!(SpanId::FIRST.next().get(), 2);
    }

    #[test]
    fn revisits_merge_children_and_count_branches() {
        let mut node = CommitNode::discovered(raw("A", &[], 10), "main", Some(oid("B")));
        node.revisit(Some(oid("C")), "feature");
        node.revisit(Some(oid("B")), "main");
        node.revisit(None, "feature");

        assert!(node.is_root());
        assert!(node.is_split());
        assert_eq!(
            node.child_hashes().iter().cloned().collect::<Vec<_>>(),
            vec![oid("B"), oid("C")]
        );
        assert_eq!(node.branch_membership()["main"], 2);
        assert_eq!(node.branch_membership()["feature"], 2);
    }

    #[test]
    fn second_assignment_is_rejected() {
        let mut node = CommitNode::discovered(raw("A", &[], 10), "main", None);
        node.assign(SpanId::FIRST, ts(10)).unwrap();

        let error = node.assign(SpanId::FIRST.next(), ts(11)).unwrap_err();
        assert!(error.is_fatal());
        assert_eq!(node.span(), Some(SpanId::FIRST));
        assert_eq!(node.inferred_time(), Some(ts(10)));
    }

    #[test]
    fn duplicate_parent_does_not_make_a_merge() {
        let node = CommitNode::discovered(raw("M", &["A", "A"], 10), "main", None);

        assert!(!node.is_merge());
        assert_eq!(node.parent_hashes().len(), 2);
    }
}
