// src/cli/commands/build.rs

use anyhow::Result;
use colored::*;
use std::path::PathBuf;
use std::process::ExitCode;
use std::time::Duration;

use crate::core::backend::create_backend;
use crate::core::catalog::RepoSpec;
use crate::core::orchestrator::ParallelOrchestrator;
use crate::infra::t;
use crate::reporting::console::format_progress;

/// Builds (or re-validates from cache) every environment in a split.
/// The whole split always completes; the exit code is nonzero when any
/// repository errored.
pub async fn execute(
    config_path: PathBuf,
    workers: Option<usize>,
    split: String,
    rebuild: bool,
    verbose: bool,
) -> Result<ExitCode> {
    let config = super::load_config(&config_path)?;
    let locale = config.language.clone();
    let catalog = super::load_catalog(&config, &locale)?;
    let specs: Vec<RepoSpec> = catalog.list(&split)?.into_iter().cloned().collect();

    let workers = workers.unwrap_or(config.workers).max(1);
    println!(
        "{}",
        t!(
            "building_split",
            locale = locale,
            count = specs.len(),
            split = split,
            workers = workers
        )
        .bold()
    );

    let token = super::setup_signal_handler(&locale)?;
    let backend = create_backend(&config);
    let orchestrator = ParallelOrchestrator::new(backend, config.repos_dir(), workers, token);

    let reporter = spawn_progress_reporter(&orchestrator, verbose, locale.clone());
    let mut outcomes = orchestrator.run_builds(specs, rebuild).await;
    reporter.abort();

    outcomes.sort_by(|a, b| a.repo_name.cmp(&b.repo_name));
    let mut errored = 0usize;
    for outcome in &outcomes {
        match &outcome.result {
            Ok(env) => println!(
                "  {} {} [{}]",
                "✓".green(),
                outcome.repo_name,
                env.fingerprint.dimmed()
            ),
            Err(e) => {
                errored += 1;
                println!(
                    "  {} {} {}",
                    "✗".red(),
                    outcome.repo_name,
                    format!("[{}] {}", e.kind(), e).red()
                );
                if verbose {
                    if let Some(tail) = e.log_tail() {
                        println!("{}", tail.dimmed());
                    }
                }
            }
        }
    }

    println!(
        "{}",
        t!(
            "build_summary",
            locale = locale,
            done = outcomes.len() - errored,
            errored = errored
        )
        .bold()
    );

    if errored == 0 {
        Ok(ExitCode::SUCCESS)
    } else {
        Ok(ExitCode::FAILURE)
    }
}

/// Periodically prints live job-state counts while a run is in flight.
/// Observation only: the counters are read without taking any lock.
fn spawn_progress_reporter(
    orchestrator: &ParallelOrchestrator,
    verbose: bool,
    locale: String,
) -> tokio::task::JoinHandle<()> {
    let progress = orchestrator.progress();
    tokio::spawn(async move {
        if !verbose {
            return;
        }
        let mut interval = tokio::time::interval(Duration::from_secs(5));
        interval.tick().await;
        loop {
            interval.tick().await;
            println!("{}", format_progress(&progress.snapshot(), &locale).dimmed());
        }
    })
}
