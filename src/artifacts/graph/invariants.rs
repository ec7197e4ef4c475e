//! Post-labeling consistency checks
//!
//! Nothing here is needed to produce a labeled table; it exists for tests and
//! `analyze --verify`, and re-derives every property from the finished
//! table alone.

use crate::artifacts::graph::commit_node::SpanId;
use crate::artifacts::graph::commit_table::CommitTable;
use crate::artifacts::graph::span_assigner::Unassigned;
use crate::artifacts::objects::object_id::ObjectId;
use serde::Serialize;
use std::collections::HashSet;
use thiserror::Error;

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Error)]
#[serde(tag = "violation", rename_all = "snake_case")]
pub enum Violation {
    #[error("{child} is not strictly later than its parent {parent}")]
    NotMonotonic { parent: ObjectId, child: ObjectId },

    #[error("merge {merge} records {recorded} parent spans for {parents} parents")]
    ParentSpansMisaligned {
        merge: ObjectId,
        recorded: usize,
        parents: usize,
    },

    #[error("merge {merge} records span {recorded} for parent {parent} whose span is {actual}")]
    ParentSpanMismatch {
        merge: ObjectId,
        parent: ObjectId,
        recorded: String,
        actual: String,
    },

    #[error("parent {parent} does not list the span of merge {merge}")]
    ChildSpanMissing { parent: ObjectId, merge: ObjectId },

    #[error("{commit} has no span and was not reported as unassigned")]
    Unlabeled { commit: ObjectId },

    #[error("{commit} was reported as unassigned but carries a span")]
    FlaggedButLabeled { commit: ObjectId },

    #[error("{child} is listed as a child of {parent} but does not name it as a parent")]
    StrayChild { parent: ObjectId, child: ObjectId },

    #[error("{child} names {parent} as a parent but is not among its children")]
    MissingChild { parent: ObjectId, child: ObjectId },
}

fn describe(span: Option<SpanId>) -> String {
    span.map_or_else(|| "-".to_string(), |span| span.to_string())
}

/// Every violation found in `table`, in table order
///
/// `flagged` are the commits the assigner reported as unassigned; they are
/// the only ones allowed to lack a span.
pub fn verify(table: &CommitTable, flagged: &[Unassigned]) -> Vec<Violation> {
    let flagged = flagged
        .iter()
        .map(|entry| &entry.commit)
        .collect::<HashSet<&ObjectId>>();
    let mut violations = Vec::new();

    for node in table.iter() {
        let hash = node.hash();

        match (node.is_assigned(), flagged.contains(hash)) {
            (false, false) => violations.push(Violation::Unlabeled {
                commit: hash.clone(),
            }),
            (true, true) => violations.push(Violation::FlaggedButLabeled {
                commit: hash.clone(),
            }),
            _ => {}
        }

        for child in node.child_hashes() {
            match table.get(child) {
                Some(child_node) if child_node.parent_hashes().contains(hash) => {}
                _ => violations.push(Violation::StrayChild {
                    parent: hash.clone(),
                    child: child.clone(),
                }),
            }
        }

        for parent in node.distinct_parents() {
            let Some(parent_node) = table.get(parent) else {
                continue;
            };
            if !parent_node.child_hashes().contains(hash) {
                violations.push(Violation::MissingChild {
                    parent: parent.clone(),
                    child: hash.clone(),
                });
            }
            if let (Some(parent_time), Some(time)) = (parent_node.inferred_time(), node.inferred_time())
                && time <= parent_time
            {
                violations.push(Violation::NotMonotonic {
                    parent: parent.clone(),
                    child: hash.clone(),
                });
            }
        }

        if !node.is_merge() || !node.is_assigned() {
            continue;
        }
        if node.parent_spans().len() != node.parent_hashes().len() {
            violations.push(Violation::ParentSpansMisaligned {
                merge: hash.clone(),
                recorded: node.parent_spans().len(),
                parents: node.parent_hashes().len(),
            });
            continue;
        }
        for (parent, recorded) in node.parent_hashes().iter().zip(node.parent_spans()) {
            let Some(parent_node) = table.get(parent) else {
                continue;
            };
            if parent_node.span() != Some(*recorded) {
                violations.push(Violation::ParentSpanMismatch {
                    merge: hash.clone(),
                    parent: parent.clone(),
                    recorded: recorded.to_string(),
                    actual: describe(parent_node.span()),
                });
            }
            if let Some(span) = node.span()
                && !parent_node.child_spans().contains(&span)
            {
                violations.push(Violation::ChildSpanMissing {
                    parent: parent.clone(),
                    merge: hash.clone(),
                });
            }
        }
    }

    violations
}
