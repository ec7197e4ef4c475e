//! Rendering of an analysis outcome
//!
//! Text output is one line per commit ordered by inferred time, then hash,
//! followed by a summary. JSON carries the same commits in the same order.

use crate::artifacts::analysis::AnalysisOutcome;
use crate::artifacts::graph::commit_node::{CommitNode, SpanId};
use crate::artifacts::graph::commit_table::CommitTable;
use crate::artifacts::graph::invariants::Violation;
use crate::artifacts::graph::span_assigner::{Unassigned, UnassignedReason};
use crate::artifacts::objects::object_id::ObjectId;
use crate::errors::GraphError;
use chrono::{DateTime, FixedOffset};
use colored::Colorize;
use indexmap::IndexMap;
use serde::Serialize;
use std::collections::BTreeMap;
use std::io::Write;

const TIMESTAMP_FORMAT: &str = "%Y-%m-%d %H:%M:%S%.3f %z";
const UNSET: &str = "-";

#[derive(Debug, Serialize)]
struct JsonReport<'a> {
    commits: Vec<&'a CommitNode>,
    roots: &'a IndexMap<ObjectId, String>,
    branches: &'a BTreeMap<String, ObjectId>,
    tags: &'a BTreeMap<String, ObjectId>,
    unassigned: &'a [Unassigned],
    errors: &'a [GraphError],
    #[serde(skip_serializing_if = "Option::is_none")]
    violations: Option<&'a [Violation]>,
}

fn timestamp(time: DateTime<FixedOffset>) -> String {
    time.format(TIMESTAMP_FORMAT).to_string()
}

fn span_label(span: Option<SpanId>) -> String {
    span.map_or_else(|| UNSET.to_string(), |span| span.to_string())
}

fn span_list(spans: &[SpanId]) -> String {
    spans
        .iter()
        .map(SpanId::to_string)
        .collect::<Vec<_>>()
        .join(",")
}

/// ` (main, feature, tag: v1)` in the style of `git log --decorate`
fn decoration(node: &CommitNode) -> String {
    let names = node
        .branch_heads()
        .iter()
        .map(|branch| branch.green().bold().to_string())
        .chain(
            node.tags()
                .iter()
                .map(|tag| format!("tag: {tag}").yellow().bold().to_string()),
        )
        .collect::<Vec<_>>();

    if names.is_empty() {
        String::new()
    } else {
        format!(" ({})", names.join(", "))
    }
}

fn commit_line(node: &CommitNode) -> String {
    let mut line = format!(
        "{} {:>4} {} {}",
        node.hash().as_ref().yellow(),
        span_label(node.span()),
        node.inferred_time()
            .map_or_else(|| UNSET.to_string(), timestamp),
        timestamp(node.committer_time()).dimmed(),
    );
    if !node.parent_spans().is_empty() {
        line.push_str(&format!(" from [{}]", span_list(node.parent_spans())));
    }
    if !node.child_spans().is_empty() {
        line.push_str(&format!(" to [{}]", span_list(node.child_spans())));
    }
    line.push_str(&decoration(node));
    if node.is_root() {
        line.push_str(&format!(" {}", "root".cyan()));
    }
    line
}

fn describe_unassigned(entry: &Unassigned) -> String {
    match &entry.reason {
        UnassignedReason::DanglingMergeParent { missing } => format!(
            "merge with undiscovered parents {}",
            missing
                .iter()
                .map(ObjectId::to_short_oid)
                .collect::<Vec<_>>()
                .join(", ")
        ),
        UnassignedReason::MissingParent { missing } => {
            format!("parent {} could not be read", missing.to_short_oid())
        }
        UnassignedReason::Blocked { by } => format!("only reachable through {}", by.to_short_oid()),
    }
}

pub fn write_text(
    outcome: &AnalysisOutcome,
    violations: Option<&[Violation]>,
    writer: &mut impl Write,
) -> anyhow::Result<()> {
    for node in outcome.table.chronological() {
        writeln!(writer, "{}", commit_line(node))?;
    }

    writeln!(writer)?;
    writeln!(
        writer,
        "commits: {}, roots: {}, spans: {}, unassigned: {}, errors: {}",
        outcome.table.len(),
        outcome.snapshot.roots.len(),
        outcome.spans_allocated,
        outcome.unassigned.len(),
        outcome.errors.len()
    )?;

    for entry in &outcome.unassigned {
        writeln!(
            writer,
            "{} {} {}",
            "unassigned:".yellow(),
            entry.commit,
            describe_unassigned(entry)
        )?;
    }
    for error in &outcome.errors {
        writeln!(writer, "{} {error}", "error:".red().bold())?;
    }
    if let Some(violations) = violations {
        for violation in violations {
            writeln!(writer, "{} {violation}", "violation:".red().bold())?;
        }
    }

    Ok(())
}

pub fn write_json(
    outcome: &AnalysisOutcome,
    violations: Option<&[Violation]>,
    writer: &mut impl Write,
) -> anyhow::Result<()> {
    let report = JsonReport {
        commits: outcome.table.chronological(),
        roots: &outcome.snapshot.roots,
        branches: &outcome.snapshot.branches,
        tags: &outcome.snapshot.tags,
        unassigned: &outcome.unassigned,
        errors: &outcome.errors,
        violations,
    };
    serde_json::to_writer_pretty(&mut *writer, &report)?;
    writeln!(writer)?;

    Ok(())
}

fn linked_commits(table: &CommitTable, hashes: impl IntoIterator<Item = ObjectId>) -> String {
    let linked = hashes
        .into_iter()
        .map(|hash| match table.get(&hash) {
            Some(node) => format!("{} (span {})", hash, span_label(node.span())),
            None => format!("{hash} (missing)"),
        })
        .collect::<Vec<_>>();

    if linked.is_empty() {
        UNSET.to_string()
    } else {
        linked.join("\n           ")
    }
}

/// Medium-format view of one commit, as `show` prints it
pub fn write_commit(
    table: &CommitTable,
    node: &CommitNode,
    writer: &mut impl Write,
) -> anyhow::Result<()> {
    writeln!(
        writer,
        "commit {}{}",
        node.hash().as_ref().yellow(),
        decoration(node)
    )?;
    writeln!(writer, "Span:      {}", span_label(node.span()))?;
    writeln!(
        writer,
        "Inferred:  {}",
        node.inferred_time()
            .map_or_else(|| UNSET.to_string(), timestamp)
    )?;
    writeln!(writer, "Committed: {}", timestamp(node.committer_time()))?;
    writeln!(writer, "Authored:  {}", timestamp(node.author_time()))?;
    writeln!(
        writer,
        "Parents:   {}",
        linked_commits(table, node.parent_hashes().iter().cloned())
    )?;
    writeln!(
        writer,
        "Children:  {}",
        linked_commits(table, node.child_hashes().iter().cloned())
    )?;
    if !node.parent_spans().is_empty() {
        writeln!(writer, "From spans: {}", span_list(node.parent_spans()))?;
    }
    if !node.child_spans().is_empty() {
        writeln!(writer, "To spans:   {}", span_list(node.child_spans()))?;
    }
    if node.is_root() {
        writeln!(writer, "Root commit")?;
    }
    let membership = node
        .branch_membership()
        .iter()
        .map(|(branch, visits)| format!("{branch} x{visits}"))
        .collect::<Vec<_>>()
        .join(", ");
    writeln!(writer, "Reached by: {membership}")?;

    Ok(())
}
