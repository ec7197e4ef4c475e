use anyhow::Result;
use clap::{ArgAction, Args, Parser, Subcommand};
use spangraph::ReportFormat;
use spangraph::areas::repository::Repository;
use spangraph::commands::analyze::{AnalyzeOptions, HistoryOptions};
use spangraph::commands::show::ShowOptions;
use std::path::{Path, PathBuf};
use tracing_subscriber::{EnvFilter, fmt, prelude::*};

#[derive(Parser)]
#[command(
    name = "spangraph",
    version = "0.1.0",
    author = "Sami Barbut-Dica",
    about = "Label a git history with spans and inferred timestamps",
    long_about = "Reads every branch of a git repository, merges their histories into one \
    commit graph and labels each commit with a span (a lane for drawing or linearizing the \
    graph) and an inferred timestamp that never goes backwards along an edge.",
    help_template = r"
{name} {version} - {about}

USAGE:
    {usage}

OPTIONS:
    {all-args}
",
)]
struct Cli {
    /// Increase log verbosity (-v info, -vv debug, -vvv trace)
    #[arg(short, long, global = true, action = ArgAction::Count)]
    verbose: u8,

    #[command(subcommand)]
    command: Commands,
}

#[derive(Args)]
struct HistoryArgs {
    #[arg(long, help = "TOML config file (defaults to .git/spangraph.toml when present)")]
    config: Option<PathBuf>,
    #[arg(short, long, help = "Number of discovery workers")]
    jobs: Option<usize>,
    #[arg(long, help = "Also walk remote-tracking branches")]
    include_remotes: bool,
}

impl From<HistoryArgs> for HistoryOptions {
    fn from(args: HistoryArgs) -> Self {
        HistoryOptions {
            config: args.config,
            jobs: args.jobs,
            include_remotes: args.include_remotes,
        }
    }
}

#[derive(Subcommand)]
enum Commands {
    #[command(
        name = "analyze",
        about = "Print the annotated commit table",
        long_about = "This command discovers the history of every branch, labels it and prints \
        one line per commit ordered by inferred time, followed by a summary. \
        It exits with an error when any reference or commit could not be processed."
    )]
    Analyze {
        #[arg(index = 1, help = "The path to the repository")]
        path: Option<PathBuf>,
        #[arg(long, value_enum, default_value_t = ReportFormat::Text)]
        format: ReportFormat,
        #[arg(long, help = "Check the labeled table for consistency")]
        verify: bool,
        #[command(flatten)]
        history: HistoryArgs,
    },
    #[command(
        name = "show",
        about = "Print the labels of one commit",
        long_about = "This command prints the span, inferred time and links of one commit. \
        The commit may be given as a branch or tag name or as a hash abbreviated to at least \
        four characters."
    )]
    Show {
        #[arg(index = 1, help = "The commit to show")]
        revision: String,
        #[arg(index = 2, help = "The path to the repository")]
        path: Option<PathBuf>,
        #[command(flatten)]
        history: HistoryArgs,
    },
}

fn init_tracing(verbose: u8) {
    let filter = EnvFilter::try_from_default_env().unwrap_or_else(|_| {
        EnvFilter::new(match verbose {
            0 => "warn",
            1 => "spangraph=info,warn",
            2 => "spangraph=debug,info",
            _ => "spangraph=trace,debug",
        })
    });

    tracing_subscriber::registry()
        .with(filter)
        .with(fmt::layer().compact().with_writer(std::io::stderr))
        .init();
}

fn open_repository(path: Option<&Path>) -> Result<Repository> {
    let path = match path {
        Some(path) => path.to_path_buf(),
        None => std::env::current_dir()?,
    };

    Repository::open(&path, Box::new(std::io::stdout()))
}

#[tokio::main]
async fn main() -> Result<()> {
    let cli = Cli::parse();
    init_tracing(cli.verbose);

    match cli.command {
        Commands::Analyze {
            path,
            format,
            verify,
            history,
        } => {
            let repository = open_repository(path.as_deref())?;
            let summary = repository
                .analyze(&AnalyzeOptions {
                    history: history.into(),
                    format,
                    verify,
                })
                .await?;

            if !summary.is_clean() {
                anyhow::bail!(
                    "analysis incomplete: {} errors, {} unassigned commits, {} violations",
                    summary.errors,
                    summary.unassigned,
                    summary.violations
                );
            }
        }
        Commands::Show {
            revision,
            path,
            history,
        } => {
            let repository = open_repository(path.as_deref())?;
            repository
                .show(&ShowOptions {
                    history: history.into(),
                    revision,
                })
                .await?;
        }
    }

    Ok(())
}
