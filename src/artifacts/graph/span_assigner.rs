//! Span and inferred-time labeling
//!
//! A forward, multi-source pass from every root over the discovered table.
//! Each commit carries an outstanding-parent counter; a commit is labeled and
//! queued the moment its last parent settles, so a merge commit waits for all
//! of its parents no matter which order they are reached in, and is entered
//! exactly once.
//!
//! ## Spans
//!
//! - every root opens a new span
//! - a single-parent child continues its parent's span, except at a split:
//!   there only the first child (discovery order) continues it and every
//!   further child opens a new one, recorded in the split's `child_spans` and
//!   the child's `parent_spans`
//! - a merge opens a new span; every parent gets it in `child_spans`, and the
//!   merge records its parents' spans in `parent_spans`, in parent order
//!
//! ## Inferred time
//!
//! The baseline is the parent's inferred time (the latest of them for a
//! merge). A committer time strictly after the baseline is kept, anything
//! else becomes baseline + 1ms, so time strictly increases along every edge.

use crate::artifacts::graph::commit_node::{CommitNode, SpanId};
use crate::artifacts::graph::commit_table::CommitTable;
use crate::artifacts::objects::object_id::ObjectId;
use crate::errors::GraphError;
use chrono::{DateTime, FixedOffset, TimeDelta};
use serde::Serialize;
use std::collections::{HashMap, HashSet, VecDeque};
use tracing::{debug, info, warn};

/// Smallest forward step applied when a committer clock lags its parents
pub const CLOCK_NUDGE: TimeDelta = TimeDelta::milliseconds(1);

/// Why a commit was left without a span
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
#[serde(tag = "reason", rename_all = "snake_case")]
pub enum UnassignedReason {
    /// A merge naming parents that discovery never produced
    DanglingMergeParent { missing: Vec<ObjectId> },
    /// A single-parent commit whose parent could not be read
    MissingParent { missing: ObjectId },
    /// Only reachable through one of the above
    Blocked { by: ObjectId },
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct Unassigned {
    pub commit: ObjectId,
    #[serde(flatten)]
    pub reason: UnassignedReason,
}

#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct Assignment {
    pub spans_allocated: u32,
    pub unassigned: Vec<Unassigned>,
    /// `DanglingMergeParent` errors, one per affected merge
    pub errors: Vec<GraphError>,
}

pub struct SpanAssigner<'t> {
    table: &'t mut CommitTable,
    next_span: SpanId,
    max_worklist: Option<usize>,
}

pub(crate) fn infer_time(
    baseline: DateTime<FixedOffset>,
    committed: DateTime<FixedOffset>,
) -> Result<DateTime<FixedOffset>, GraphError> {
    if committed > baseline {
        return Ok(committed);
    }
    baseline.checked_add_signed(CLOCK_NUDGE).ok_or_else(|| {
        GraphError::invariant(format!(
            "inferred time after {baseline} is past the last representable timestamp"
        ))
    })
}

impl<'t> SpanAssigner<'t> {
    pub fn new(table: &'t mut CommitTable, max_worklist: Option<usize>) -> Self {
        SpanAssigner {
            table,
            next_span: SpanId::FIRST,
            max_worklist,
        }
    }

    fn allocate_span(&mut self) -> SpanId {
        let span = self.next_span;
        self.next_span = span.next();
        span
    }

    fn node_mut(&mut self, oid: &ObjectId) -> Result<&mut CommitNode, GraphError> {
        self.table
            .get_mut(oid)
            .ok_or_else(|| GraphError::invariant(format!("commit {oid} is linked but not in the table")))
    }

    /// Label everything reachable from `roots`
    ///
    /// Any error returned is fatal: the labels written so far cannot be
    /// trusted. Commits that are merely unreachable because of missing
    /// history are reported in [`Assignment::unassigned`].
    pub fn assign<'r>(
        mut self,
        roots: impl IntoIterator<Item = &'r ObjectId>,
    ) -> Result<Assignment, GraphError> {
        let mut outstanding: HashMap<ObjectId, usize> = self
            .table
            .iter()
            .map(|node| (node.hash().clone(), node.distinct_parents().len()))
            .collect();
        let mut worklist = VecDeque::new();

        for root in roots {
            let span = self.allocate_span();
            let node = self.node_mut(root)?;
            if !node.is_root() {
                return Err(GraphError::invariant(format!(
                    "commit {root} was seeded as a root but has parents"
                )));
            }
            let committed = node.committer_time();
            node.assign(span, committed)?;
            debug!(commit = %root, %span, "seeded root");
            worklist.push_back(root.clone());
        }

        while let Some(oid) = worklist.pop_front() {
            let (span, inferred, children) = {
                let node = self.node_mut(&oid)?;
                let (Some(span), Some(inferred)) = (node.span(), node.inferred_time()) else {
                    return Err(GraphError::invariant(format!(
                        "commit {oid} was queued without a label"
                    )));
                };
                (span, inferred, node.child_hashes().iter().cloned().collect::<Vec<_>>())
            };
            let is_split = children.len() > 1;

            for (position, child) in children.iter().enumerate() {
                let remaining = outstanding.get_mut(child).ok_or_else(|| {
                    GraphError::invariant(format!("child {child} of {oid} is not in the table"))
                })?;
                if *remaining == 0 {
                    return Err(GraphError::invariant(format!(
                        "commit {child} had a parent settle after all parents settled"
                    )));
                }
                *remaining -= 1;
                if *remaining > 0 {
                    debug!(commit = %child, waiting_on = *remaining, "merge commit waiting for parents");
                    continue;
                }

                let is_merge = self.node_mut(child)?.is_merge();
                if is_merge {
                    self.label_merge(child)?;
                } else {
                    let child_span = if is_split && position > 0 {
                        let fresh = self.allocate_span();
                        self.node_mut(&oid)?.push_child_span(fresh);
                        self.node_mut(child)?.push_parent_span(span);
                        fresh
                    } else {
                        span
                    };
                    let node = self.node_mut(child)?;
                    let time = infer_time(inferred, node.committer_time())?;
                    node.assign(child_span, time)?;
                    debug!(commit = %child, span = %child_span, inferred = %time, "labeled commit");
                }

                if let Some(limit) = self.max_worklist
                    && worklist.len() >= limit
                {
                    return Err(GraphError::invariant(format!(
                        "worklist grew past {limit} entries"
                    )));
                }
                worklist.push_back(child.clone());
            }
        }

        let spans_allocated = self.next_span.get() - 1;
        let (unassigned, errors) = self.classify_unassigned()?;
        info!(
            commits = self.table.len(),
            spans = spans_allocated,
            unassigned = unassigned.len(),
            "labeled history"
        );

        Ok(Assignment {
            spans_allocated,
            unassigned,
            errors,
        })
    }

    /// Open a span for a merge whose parents have all settled
    fn label_merge(&mut self, merge: &ObjectId) -> Result<(), GraphError> {
        let span = self.allocate_span();
        let parents = self.node_mut(merge)?.parent_hashes().to_vec();

        let mut baseline: Option<DateTime<FixedOffset>> = None;
        let mut parent_spans = Vec::with_capacity(parents.len());
        let mut linked = HashSet::new();
        for parent in &parents {
            let node = self.node_mut(parent)?;
            let (Some(parent_span), Some(parent_time)) = (node.span(), node.inferred_time()) else {
                return Err(GraphError::invariant(format!(
                    "merge {merge} released before parent {parent} was labeled"
                )));
            };
            if linked.insert(parent.clone()) {
                node.push_child_span(span);
            }
            parent_spans.push(parent_span);
            baseline = Some(baseline.map_or(parent_time, |time| time.max(parent_time)));
        }
        let baseline = baseline
            .ok_or_else(|| GraphError::invariant(format!("merge {merge} has no parents")))?;

        let node = self.node_mut(merge)?;
        for parent_span in parent_spans {
            node.push_parent_span(parent_span);
        }
        let time = infer_time(baseline, node.committer_time())?;
        node.assign(span, time)?;
        debug!(commit = %merge, %span, inferred = %time, "labeled merge commit");

        Ok(())
    }

    /// Explain every commit the pass could not reach
    ///
    /// Missing history explains an unlabeled commit; anything left over means
    /// the graph was not a DAG.
    fn classify_unassigned(&self) -> Result<(Vec<Unassigned>, Vec<GraphError>), GraphError> {
        let mut unassigned = Vec::new();
        let mut errors = Vec::new();
        let mut explained = HashSet::new();
        let mut frontier = VecDeque::new();

        for node in self.table.iter().filter(|node| !node.is_assigned()) {
            let missing = node
                .distinct_parents()
                .into_iter()
                .filter(|parent| !self.table.contains(parent))
                .cloned()
                .collect::<Vec<_>>();
            if missing.is_empty() {
                continue;
            }

            let reason = if node.is_merge() {
                let error = GraphError::DanglingMergeParent {
                    commit: node.hash().clone(),
                    missing: missing.clone(),
                };
                warn!(%error, "merge commit left unlabeled");
                errors.push(error);
                UnassignedReason::DanglingMergeParent { missing }
            } else {
                UnassignedReason::MissingParent {
                    missing: missing[0].clone(),
                }
            };
            explained.insert(node.hash().clone());
            frontier.push_back((node.hash().clone(), node.hash().clone()));
            unassigned.push(Unassigned {
                commit: node.hash().clone(),
                reason,
            });
        }

        while let Some((oid, origin)) = frontier.pop_front() {
            let Some(node) = self.table.get(&oid) else {
                continue;
            };
            for child in node.child_hashes() {
                let Some(child_node) = self.table.get(child) else {
                    continue;
                };
                if child_node.is_assigned() || !explained.insert(child.clone()) {
                    continue;
                }
                unassigned.push(Unassigned {
                    commit: child.clone(),
                    reason: UnassignedReason::Blocked { by: origin.clone() },
                });
                frontier.push_back((child.clone(), origin.clone()));
            }
        }

        if let Some(stuck) = self
            .table
            .iter()
            .find(|node| !node.is_assigned() && !explained.contains(node.hash()))
        {
            return Err(GraphError::invariant(format!(
                "commit {} is unreachable from any root although all its parents exist (cycle?)",
                stuck.hash()
            )));
        }

        Ok((unassigned, errors))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::artifacts::graph::builder::{Discovery, DiscoveryLimits, GraphBuilder};
    use crate::artifacts::graph::source::{CommitSource, InMemorySource, RawCommit};
    use crate::artifacts::graph::test_support::{oid, raw, source, ts};
    use pretty_assertions::assert_eq;
    use proptest::prelude::*;

    fn discover(source: &InMemorySource) -> Discovery {
        let mut tips = source
            .list_branch_tips()
            .into_iter()
            .collect::<Result<Vec<_>, _>>()
            .unwrap();
        tips.sort();
        let mut builder = GraphBuilder::new(source, DiscoveryLimits::default());
        for tip in &tips {
            builder.discover(&tip.oid, &tip.name).unwrap();
        }
        builder.finish()
    }

    fn label(source: &InMemorySource) -> (CommitTable, Assignment) {
        let mut discovery = discover(source);
        let roots = discovery.roots.keys().cloned().collect::<Vec<_>>();
        let assignment = SpanAssigner::new(&mut discovery.table, None)
            .assign(&roots)
            .unwrap();
        (discovery.table, assignment)
    }

    fn node<'a>(table: &'a CommitTable, name: &str) -> &'a CommitNode {
        table.get(&oid(name)).unwrap()
    }

    fn span(table: &CommitTable, name: &str) -> u32 {
        node(table, name).span().unwrap().get()
    }

    fn spans(values: &[SpanId]) -> Vec<u32> {
        values.iter().map(|span| span.get()).collect()
    }

    #[test]
    fn linear_history_shares_one_span() {
        let source = source(
            &[("A", &[], 100), ("B", &["A"], 200), ("C", &["B"], 300)],
            &[("main", "C")],
        );

        let (table, assignment) = label(&source);

        assert_eq!(assignment.spans_allocated, 1);
        for name in ["A", "B", "C"] {
            assert_eq!(span(&table, name), 1);
            assert_eq!(
                node(&table, name).inferred_time(),
                Some(node(&table, name).committer_time())
            );
        }
    }

    #[test]
    fn lagging_clocks_are_nudged_forward() {
        // B and C claim to be older than A
        let source = source(
            &[("A", &[], 100), ("B", &["A"], 50), ("C", &["B"], 100)],
            &[("main", "C")],
        );

        let (table, _) = label(&source);

        assert_eq!(node(&table, "A").inferred_time(), Some(ts(100)));
        assert_eq!(node(&table, "B").inferred_time(), Some(ts(100) + CLOCK_NUDGE));
        assert_eq!(
            node(&table, "C").inferred_time(),
            Some(ts(100) + CLOCK_NUDGE + CLOCK_NUDGE)
        );
    }

    #[test]
    fn split_keeps_span_on_first_child_only() {
        // A -> B (discovered first), A -> C
        let source = source(
            &[("A", &[], 1), ("B", &["A"], 2), ("C", &["A"], 3)],
            &[("a-branch", "B"), ("b-branch", "C")],
        );

        let (table, assignment) = label(&source);

        assert_eq!(span(&table, "A"), 1);
        assert_eq!(span(&table, "B"), 1);
        assert_eq!(span(&table, "C"), 2);
        assert_eq!(spans(node(&table, "A").child_spans()), vec![2]);
        assert_eq!(spans(node(&table, "C").parent_spans()), vec![1]);
        assert!(node(&table, "B").parent_spans().is_empty());
        assert_eq!(assignment.spans_allocated, 2);
    }

    #[test]
    fn merge_waits_for_both_parents_and_opens_a_span() {
        //   A
        //  / \
        // B   C
        //  \ /
        //   D
        let source = source(
            &[
                ("A", &[], 10),
                ("B", &["A"], 20),
                ("C", &["A"], 40),
                ("D", &["B", "C"], 30),
            ],
            &[("main", "D")],
        );

        let (table, _) = label(&source);

        let (span_b, span_c, span_d) = (span(&table, "B"), span(&table, "C"), span(&table, "D"));
        assert_eq!((span_b, span_c, span_d), (1, 2, 3));
        assert_eq!(spans(node(&table, "D").parent_spans()), vec![span_b, span_c]);
        assert!(spans(node(&table, "B").child_spans()).contains(&span_d));
        assert_eq!(spans(node(&table, "C").child_spans()), vec![span_d]);
        // D's clock is behind C, so it lands just after the later parent
        assert_eq!(node(&table, "D").inferred_time(), Some(ts(40) + CLOCK_NUDGE));
    }

    #[test]
    fn merge_keeps_its_own_clock_when_already_later() {
        let source = source(
            &[
                ("A", &[], 10),
                ("B", &["A"], 20),
                ("C", &["A"], 40),
                ("D", &["B", "C"], 90),
            ],
            &[("main", "D")],
        );

        let (table, _) = label(&source);

        assert_eq!(node(&table, "D").inferred_time(), Some(ts(90)));
    }

    #[test]
    fn merge_across_two_roots() {
        // R1 - A \
        //         M
        // R2 - B /
        let source = source(
            &[
                ("R1", &[], 1),
                ("A", &["R1"], 2),
                ("R2", &[], 3),
                ("B", &["R2"], 4),
                ("M", &["A", "B"], 5),
            ],
            &[("main", "M")],
        );

        let (table, assignment) = label(&source);

        assert_eq!(span(&table, "R1"), span(&table, "A"));
        assert_eq!(span(&table, "R2"), span(&table, "B"));
        assert_ne!(span(&table, "R1"), span(&table, "R2"));
        assert_eq!(span(&table, "M"), 3);
        assert!(assignment.unassigned.is_empty());
    }

    #[test]
    fn duplicate_parent_is_not_treated_as_merge() {
        let source = source(&[("A", &[], 1), ("B", &["A", "A"], 2)], &[("main", "B")]);

        let (table, assignment) = label(&source);

        assert_eq!(span(&table, "B"), 1);
        assert!(assignment.unassigned.is_empty());
    }

    #[test]
    fn dangling_merge_parent_is_flagged_with_its_descendants() {
        // M names X, which the source cannot provide; N only follows M
        let source = source(
            &[
                ("A", &[], 1),
                ("M", &["A", "X"], 2),
                ("N", &["M"], 3),
                ("B", &["A"], 4),
            ],
            &[("main", "N"), ("other", "B")],
        );
        let mut discovery = discover(&source);
        let roots = discovery.roots.keys().cloned().collect::<Vec<_>>();

        let assignment = SpanAssigner::new(&mut discovery.table, None)
            .assign(&roots)
            .unwrap();

        assert_eq!(
            assignment.errors,
            vec![GraphError::DanglingMergeParent {
                commit: oid("M"),
                missing: vec![oid("X")],
            }]
        );
        assert_eq!(
            assignment.unassigned,
            vec![
                Unassigned {
                    commit: oid("M"),
                    reason: UnassignedReason::DanglingMergeParent {
                        missing: vec![oid("X")]
                    },
                },
                Unassigned {
                    commit: oid("N"),
                    reason: UnassignedReason::Blocked { by: oid("M") },
                },
            ]
        );
        assert_eq!(discovery.table.get(&oid("M")).unwrap().span(), None);
        assert!(discovery.table.get(&oid("B")).unwrap().is_assigned());
    }

    #[test]
    fn missing_single_parent_is_flagged() {
        let source = source(&[("B", &["X"], 2)], &[("main", "B")]);
        let mut discovery = discover(&source);

        let assignment = SpanAssigner::new(&mut discovery.table, None)
            .assign(std::iter::empty::<&ObjectId>())
            .unwrap();

        assert_eq!(
            assignment.unassigned,
            vec![Unassigned {
                commit: oid("B"),
                reason: UnassignedReason::MissingParent { missing: oid("X") },
            }]
        );
        assert!(assignment.errors.is_empty());
    }

    #[test]
    fn cycle_is_an_invariant_violation() {
        // P and Q name each other; nothing reaches them from the root
        let mut source = source(&[("R", &[], 1)], &[("main", "R"), ("loop", "P")]);
        source
            .insert_commit(raw("P", &["Q"], 2))
            .insert_commit(raw("Q", &["P"], 3));
        let mut discovery = discover(&source);
        let roots = discovery.roots.keys().cloned().collect::<Vec<_>>();

        let result = SpanAssigner::new(&mut discovery.table, None).assign(&roots);

        assert!(matches!(result, Err(GraphError::InvariantViolation { .. })));
    }

    #[test]
    fn seeding_the_same_root_twice_is_rejected() {
        let source = source(&[("A", &[], 1)], &[("main", "A")]);
        let mut discovery = discover(&source);

        let result = SpanAssigner::new(&mut discovery.table, None).assign([&oid("A"), &oid("A")]);

        assert!(matches!(result, Err(GraphError::InvariantViolation { .. })));
    }

    #[test]
    fn worklist_limit_is_enforced() {
        let source = source(
            &[("A", &[], 1), ("B", &["A"], 2), ("C", &["A"], 3), ("D", &["A"], 4)],
            &[("b", "B"), ("c", "C"), ("d", "D")],
        );
        let mut discovery = discover(&source);
        let roots = discovery.roots.keys().cloned().collect::<Vec<_>>();

        let result = SpanAssigner::new(&mut discovery.table, Some(2)).assign(&roots);

        assert!(matches!(result, Err(GraphError::InvariantViolation { .. })));
    }

    #[test]
    fn nudge_past_the_last_timestamp_is_an_error_not_a_panic() {
        let last = chrono::DateTime::<chrono::Utc>::MAX_UTC.fixed_offset();
        let mut source = source(&[("B", &["A"], 1)], &[("main", "B")]);
        source.insert_commit(RawCommit::new(oid("A"), Vec::new(), last, last));
        let mut discovery = discover(&source);
        let roots = discovery.roots.keys().cloned().collect::<Vec<_>>();

        let result = SpanAssigner::new(&mut discovery.table, None).assign(&roots);

        assert!(matches!(result, Err(GraphError::InvariantViolation { .. })));
        assert!(infer_time(last, ts(1)).is_err());
        assert_eq!(infer_time(ts(5), ts(1)), Ok(ts(5) + CLOCK_NUDGE));
    }

    /// Random DAG: commit `i` picks up to three parents among `0..i`
    fn arbitrary_history() -> impl Strategy<Value = (Vec<Vec<usize>>, Vec<i64>, Vec<usize>)> {
        (2usize..24).prop_flat_map(|size| {
            let parents = (0..size)
                .map(|i| {
                    if i == 0 {
                        Just(Vec::new()).boxed()
                    } else {
                        proptest::collection::vec(0..i, 0..=3)
                            .prop_map(|mut picked| {
                                picked.sort_unstable();
                                picked.dedup();
                                picked
                            })
                            .prop_shuffle()
                            .boxed()
                    }
                })
                .collect::<Vec<_>>();
            let clocks = proptest::collection::vec(0i64..50, size);
            let tips = proptest::collection::vec(0..size, 1..5);
            (parents, clocks, tips)
        })
    }

    fn build_source(parents: &[Vec<usize>], clocks: &[i64], tips: &[usize]) -> InMemorySource {
        let mut source = InMemorySource::new();
        for (i, picked) in parents.iter().enumerate() {
            let names = picked.iter().map(|p| format!("c{p}")).collect::<Vec<_>>();
            let refs = names.iter().map(String::as_str).collect::<Vec<_>>();
            source.insert_commit(raw(&format!("c{i}"), &refs, clocks[i]));
        }
        // every commit without children is a tip, so the whole DAG is walked
        let mut tipped = tips.to_vec();
        for i in 0..parents.len() {
            if !parents.iter().any(|picked| picked.contains(&i)) {
                tipped.push(i);
            }
        }
        for (n, tip) in tipped.iter().enumerate() {
            source.insert_branch(&format!("b{n:02}"), oid(&format!("c{tip}")));
        }
        source
    }

    proptest! {
        #[test]
        fn labeling_respects_barrier_monotonicity_and_single_assignment(
            (parents, clocks, tips) in arbitrary_history()
        ) {
            let source = build_source(&parents, &clocks, &tips);
            let (table, assignment) = label(&source);

            prop_assert!(assignment.unassigned.is_empty());
            for node in table.iter() {
                let span = node.span();
                prop_assert!(span.is_some());
                let time = node.inferred_time().unwrap();
                for parent in node.parent_hashes() {
                    let parent = table.get(parent).unwrap();
                    prop_assert!(parent.span().is_some());
                    prop_assert!(time > parent.inferred_time().unwrap());
                }
                if node.is_merge() {
                    let expected = node
                        .parent_hashes()
                        .iter()
                        .map(|parent| table.get(parent).unwrap().span().unwrap())
                        .collect::<Vec<_>>();
                    prop_assert_eq!(node.parent_spans(), expected.as_slice());
                    for parent in node.parent_hashes() {
                        prop_assert!(table.get(parent).unwrap().child_spans().contains(&span.unwrap()));
                    }
                }
            }
        }

        #[test]
        fn labeling_is_deterministic(
            (parents, clocks, tips) in arbitrary_history()
        ) {
            let (first, _) = label(&build_source(&parents, &clocks, &tips));
            let (second, _) = label(&build_source(&parents, &clocks, &tips));

            prop_assert_eq!(first, second);
        }
    }
}
