//! ciw - CI incident watch CLI

mod cli;

use std::io;
use std::path::Path;

use clap::Parser;
use ciw_core::aggregate::verify_totals;
use ciw_core::config::load_config;
use ciw_core::error::AppError;
use ciw_core::incident::incident_from_message;
use ciw_core::ingest::parse_artifacts;
use ciw_core::reconcile::decide_with;
use ciw_core::threshold::{
    analyze, compare_analyses, load_run_statistics, load_threshold_spec, read_analysis,
    write_analysis,
};
use ciw_tracker::assignee::{AssigneeResolver, ConfigAssigneeResolver};
use ciw_tracker::reconcile::{dedup_matcher, incident_for_run, reconcile_incident};
use ciw_tracker::tracker::github_issues::GithubIssueTracker;
use ciw_tracker::tracker::IssueTracker;
use serde::Serialize;
use tracing::info;
use tracing_subscriber::EnvFilter;

use crate::cli::{Cli, Commands};

fn main() {
    if let Err(err) = main_impl() {
        eprintln!("error: {err}");
        if err.retryable {
            eprintln!("hint: the failure is transient; rerunning may succeed");
        }
        std::process::exit(1);
    }
}

fn main_impl() -> Result<(), AppError> {
    let cli = Cli::parse();

    tracing_subscriber::fmt()
        .with_env_filter(EnvFilter::from_default_env())
        .with_target(false)
        .with_writer(io::stderr)
        .init();

    match cli.command {
        Commands::Parse { artifacts } => {
            let run = parse_artifacts(&artifacts)?;
            verify_totals(&run)?;
            print_json(&run)
        }
        Commands::Reconcile {
            config,
            message,
            source_url,
            dry_run,
            artifacts,
        } => run_reconcile(&config, message, source_url, dry_run, &artifacts),
        Commands::Analyze {
            stats,
            thresholds,
            out,
            previous,
        } => {
            let stats = load_run_statistics(&stats)?;
            let spec = load_threshold_spec(&thresholds)?;
            let records = analyze(&stats, &spec);
            write_analysis(&out, &records)?;
            let failing = records.iter().filter(|r| r.error).count();
            info!(
                records = records.len(),
                failing,
                out = %out.display(),
                "wrote analysis"
            );
            match previous {
                Some(prev) => print_json(&compare_analyses(&read_analysis(&prev)?, &records)),
                None => print_json(&records),
            }
        }
        Commands::Compare { previous, current } => {
            let trend = compare_analyses(&read_analysis(&previous)?, &read_analysis(&current)?);
            print_json(&trend)
        }
    }
}

fn run_reconcile(
    config: &Path,
    message: Option<String>,
    source_url: Option<String>,
    dry_run: bool,
    artifacts: &[std::path::PathBuf],
) -> Result<(), AppError> {
    let cfg = load_config(config)?;
    let source_url = source_url.or_else(|| cfg.source_url.clone());
    let assignees = ConfigAssigneeResolver::new(cfg.assignees.clone());

    let incident = match message {
        Some(text) => {
            let assignee = assignees.resolve_assignee(&cfg.service)?;
            incident_from_message(&cfg.service, &text, source_url, assignee)
        }
        None => {
            if artifacts.is_empty() {
                return Err(AppError::new(
                    "CONFIG_INVALID",
                    "Nothing to reconcile: pass artifacts or --message",
                ));
            }
            let run = parse_artifacts(artifacts)?;
            verify_totals(&run)?;
            incident_for_run(&cfg.service, &run, &cfg.policy, source_url, &assignees)?
        }
    };
    info!(
        service = %incident.service,
        fail = incident.counts.fail,
        total = incident.counts.total,
        dedup_key = %incident.dedup_key,
        "built incident"
    );

    let tracker = GithubIssueTracker::new(&cfg.tracker)?;
    let matcher = dedup_matcher(cfg.policy.matcher);
    if dry_run {
        let issues = tracker.list_issues(&incident.service)?;
        let action = decide_with(
            &incident.counts,
            &issues,
            &incident.dedup_key,
            matcher,
            &cfg.policy,
        );
        return print_json(&action);
    }

    let outcome = reconcile_incident(&tracker, &incident, matcher, &cfg.policy)?;
    print_json(&outcome)
}

fn print_json<T: Serialize>(value: &T) -> Result<(), AppError> {
    let json = serde_json::to_string_pretty(value).map_err(|e| {
        AppError::new("IO_ENCODE_FAILED", "Failed to encode output").with_details(e.to_string())
    })?;
    println!("{json}");
    Ok(())
}
