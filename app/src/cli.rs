//! CLI argument parsing using Clap.

use std::path::PathBuf;

use clap::{Parser, Subcommand};

/// ciw - turn CI test artifacts into tracked issues
#[derive(Parser, Debug)]
#[command(name = "ciw")]
#[command(version, about, long_about = None)]
#[command(after_help = "Examples:
  ciw parse results/*.xml                                  Print the merged run as JSON
  ciw reconcile -c watch.json results/*.xml report.json    Reconcile the service's issues
  ciw reconcile -c watch.json --message \"deploy failed\"    Report a free-text failure
  ciw analyze --stats run_stats.json --thresholds t.json --out analysis.json
  ciw compare previous.json current.json                   Trend between two analyses
")]
pub struct Cli {
    #[command(subcommand)]
    pub command: Commands,
}

#[derive(Subcommand, Debug)]
pub enum Commands {
    /// Parse artifacts and print the aggregated run
    Parse {
        /// JUnit XML, Mocha JSON or performance analysis files
        #[arg(required = true)]
        artifacts: Vec<PathBuf>,
    },

    /// Parse artifacts (or take a message) and reconcile the service's tracked issues
    Reconcile {
        /// Watch config file
        #[arg(short = 'c', long)]
        config: PathBuf,

        /// Free-text failure message used instead of artifacts
        #[arg(short = 'm', long, conflicts_with = "artifacts")]
        message: Option<String>,

        /// Link to the CI run (overrides the config value)
        #[arg(long)]
        source_url: Option<String>,

        /// Decide and print the action without touching the tracker
        #[arg(long)]
        dry_run: bool,

        artifacts: Vec<PathBuf>,
    },

    /// Evaluate run statistics against thresholds and persist the verdicts
    Analyze {
        #[arg(long)]
        stats: PathBuf,

        #[arg(long)]
        thresholds: PathBuf,

        /// Where to write the analysis records
        #[arg(long)]
        out: PathBuf,

        /// Previous analysis to compare against
        #[arg(long)]
        previous: Option<PathBuf>,
    },

    /// Compare two persisted analyses
    Compare { previous: PathBuf, current: PathBuf },
}
