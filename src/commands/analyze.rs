use crate::ReportFormat;
use crate::areas::repository::Repository;
use crate::artifacts::analysis::{AnalysisOutcome, RepositoryAnalysis};
use crate::artifacts::graph::invariants::{self, Violation};
use crate::artifacts::report;
use crate::config::AnalysisConfig;
use std::io::Write;
use std::path::PathBuf;
use std::sync::Arc;
use tracing::info;

/// Settings shared by every command that labels the history
#[derive(Debug, Clone, Default)]
pub struct HistoryOptions {
    pub config: Option<PathBuf>,
    pub jobs: Option<usize>,
    pub include_remotes: bool,
}

#[derive(Debug, Clone)]
pub struct AnalyzeOptions {
    pub history: HistoryOptions,
    pub format: ReportFormat,
    pub verify: bool,
}

/// What `analyze` found, for the caller to turn into an exit status
#[derive(Debug)]
pub struct AnalyzeSummary {
    pub errors: usize,
    pub unassigned: usize,
    pub violations: usize,
}

impl AnalyzeSummary {
    pub fn is_clean(&self) -> bool {
        self.errors == 0 && self.unassigned == 0 && self.violations == 0
    }
}

impl Repository {
    /// File config first, then command-line overrides
    pub fn analysis_config(&self, opts: &HistoryOptions) -> anyhow::Result<AnalysisConfig> {
        let mut config = AnalysisConfig::load(opts.config.as_deref(), self.git_dir())?;

        if let Some(jobs) = opts.jobs {
            if jobs == 0 {
                anyhow::bail!("--jobs must be at least 1");
            }
            config.jobs = jobs;
        }
        if opts.include_remotes {
            config.include_remotes = true;
        }

        Ok(config)
    }

    pub async fn label_history(&self, opts: &HistoryOptions) -> anyhow::Result<AnalysisOutcome> {
        let config = self.analysis_config(opts)?;
        let source = Arc::new(self.commit_source(config.include_remotes));
        info!(repository = %self.path().display(), jobs = config.jobs, "analyzing repository");

        Ok(RepositoryAnalysis::new(config).run_parallel(source).await?)
    }

    pub async fn analyze(&self, opts: &AnalyzeOptions) -> anyhow::Result<AnalyzeSummary> {
        let outcome = self.label_history(&opts.history).await?;
        let violations: Option<Vec<Violation>> = opts
            .verify
            .then(|| invariants::verify(&outcome.table, &outcome.unassigned));

        match opts.format {
            ReportFormat::Text => {
                report::write_text(&outcome, violations.as_deref(), &mut *self.writer())?
            }
            ReportFormat::Json => {
                report::write_json(&outcome, violations.as_deref(), &mut *self.writer())?
            }
        }
        self.writer().flush()?;

        Ok(AnalyzeSummary {
            errors: outcome.errors.len(),
            unassigned: outcome.unassigned.len(),
            violations: violations.map_or(0, |violations| violations.len()),
        })
    }
}
