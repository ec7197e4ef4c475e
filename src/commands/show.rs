use crate::areas::repository::Repository;
use crate::artifacts::analysis::AnalysisOutcome;
use crate::artifacts::graph::commit_node::CommitNode;
use crate::artifacts::report;
use crate::commands::analyze::HistoryOptions;
use std::io::Write;

/// Shortest abbreviated hash `show` accepts
pub const MIN_PREFIX_LENGTH: usize = 4;

#[derive(Debug, Clone)]
pub struct ShowOptions {
    pub history: HistoryOptions,
    /// Full or abbreviated hash, or a branch or tag name
    pub revision: String,
}

fn resolve<'o>(outcome: &'o AnalysisOutcome, revision: &str) -> anyhow::Result<&'o CommitNode> {
    let named = outcome
        .snapshot
        .branches
        .get(revision)
        .or_else(|| outcome.snapshot.tags.get(revision));
    if let Some(oid) = named {
        return outcome
            .table
            .get(oid)
            .ok_or_else(|| anyhow::anyhow!("{revision} points outside the discovered history"));
    }

    if revision.len() < MIN_PREFIX_LENGTH || !revision.chars().all(|c| c.is_ascii_hexdigit()) {
        anyhow::bail!(
            "{revision} is neither a reference nor a hash of at least {MIN_PREFIX_LENGTH} hex characters"
        );
    }

    match outcome.table.find_by_prefix(revision).as_slice() {
        [] => anyhow::bail!("no commit matches {revision}"),
        [node] => Ok(*node),
        candidates => {
            let candidates = candidates
                .iter()
                .map(|node| format!("  {}", node.hash()))
                .collect::<Vec<_>>()
                .join("\n");
            anyhow::bail!("short hash {revision} is ambiguous\ncandidates:\n{candidates}")
        }
    }
}

impl Repository {
    pub async fn show(&self, opts: &ShowOptions) -> anyhow::Result<()> {
        let outcome = self.label_history(&opts.history).await?;
        let node = resolve(&outcome, &opts.revision)?;

        report::write_commit(&outcome.table, node, &mut *self.writer())?;
        self.writer().flush()?;

        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::artifacts::analysis::RepositoryAnalysis;
    use crate::artifacts::graph::test_support::{oid, source};
    use crate::config::AnalysisConfig;

    fn outcome() -> AnalysisOutcome {
        // the ids of "ab" and "abc" share the prefix 6162
        let mut history = source(&[("ab", &[], 1), ("abc", &["ab"], 2)], &[("main", "abc")]);
        history.insert_tag("v1", oid("ab"));
        RepositoryAnalysis::new(AnalysisConfig::default())
            .run(&history)
            .unwrap()
    }

    #[test]
    fn prefixes_and_names_resolve() {
        let outcome = outcome();

        assert_eq!(resolve(&outcome, "main").unwrap().hash(), &oid("abc"));
        assert_eq!(resolve(&outcome, "v1").unwrap().hash(), &oid("ab"));
        assert_eq!(resolve(&outcome, "61620").unwrap().hash(), &oid("ab"));
        assert_eq!(resolve(&outcome, "61626").unwrap().hash(), &oid("abc"));
        assert_eq!(
            resolve(&outcome, &oid("abc").to_string()).unwrap().hash(),
            &oid("abc")
        );
    }

    #[test]
    fn short_unknown_and_ambiguous_prefixes_fail() {
        let outcome = outcome();

        assert!(resolve(&outcome, "61").is_err());
        assert!(resolve(&outcome, "ffff").is_err());
        let ambiguous = resolve(&outcome, "6162").unwrap_err().to_string();
        assert!(ambiguous.contains("short hash 6162 is ambiguous"));
    }
}
