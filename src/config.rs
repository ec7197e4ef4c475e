//! Analysis configuration
//!
//! Supports loading config from (lowest to highest priority):
//! - built-in defaults
//! - `.git/spangraph.toml` inside the analyzed repository
//! - an explicit `--config <file>`
//! - command-line flags

use anyhow::Context;
use serde::{Deserialize, Serialize};
use std::path::Path;

pub const REPOSITORY_CONFIG_FILE: &str = "spangraph.toml";

#[derive(Debug, Clone, PartialEq, Eq, Deserialize, Serialize)]
#[serde(default, deny_unknown_fields)]
pub struct AnalysisConfig {
    /// Discovery workers; 1 walks branches sequentially
    pub jobs: usize,
    /// Deepest ancestor chain a single walk may follow
    pub max_walk_depth: Option<usize>,
    /// Largest commit table a run may build
    pub max_commits: Option<usize>,
    /// Largest worklist the span assigner may hold
    pub max_worklist: Option<usize>,
    /// Also walk `refs/remotes/<remote>/<branch>`
    pub include_remotes: bool,
}

impl Default for AnalysisConfig {
    fn default() -> Self {
        Self {
            jobs: 1,
            max_walk_depth: None,
            max_commits: None,
            max_worklist: None,
            include_remotes: false,
        }
    }
}

impl AnalysisConfig {
    /// Load the file given explicitly, else the repository's own config, else
    /// defaults. A file that exists but does not parse is an error.
    pub fn load(explicit: Option<&Path>, git_dir: &Path) -> anyhow::Result<Self> {
        let path = match explicit {
            Some(path) => path.to_path_buf(),
            None => {
                let path = git_dir.join(REPOSITORY_CONFIG_FILE);
                if !path.exists() {
                    return Ok(Self::default());
                }
                path
            }
        };

        let content = std::fs::read_to_string(&path)
            .with_context(|| format!("Unable to read config file {}", path.display()))?;
        Self::parse(&content).with_context(|| format!("Invalid config file {}", path.display()))
    }

    pub fn parse(content: &str) -> anyhow::Result<Self> {
        let config = toml::from_str::<AnalysisConfig>(content)?;
        if config.jobs == 0 {
            anyhow::bail!("jobs must be at least 1");
        }
        Ok(config)
    }
}
