// src/cli/commands/evaluate.rs

use anyhow::{bail, Context, Result};
use colored::*;
use std::fs;
use std::path::PathBuf;
use std::process::ExitCode;
use std::time::Duration;

use crate::core::backend::create_backend;
use crate::core::catalog::RepoSpec;
use crate::core::evaluate::{EvaluationAggregator, RequestOptions};
use crate::core::orchestrator::ParallelOrchestrator;
use crate::infra::t;
use crate::reporting::console::format_progress;
use crate::reporting::{generate_html_report, print_evaluation_summary};

/// Evaluates a whole split and prints the scored report. The run never
/// aborts early: every repository contributes an entry, errored ones with
/// their captured failure. With `--strict` the exit code is successful only
/// for a perfect aggregate; otherwise the report itself is the artifact and
/// the exit code stays 0.
#[allow(clippy::too_many_arguments)]
pub async fn execute(
    config_path: PathBuf,
    split: String,
    branch: Option<String>,
    reference: bool,
    backend_flag: Option<String>,
    timeout: u64,
    cpus: usize,
    workers: Option<usize>,
    coverage: bool,
    rebuild: bool,
    json: Option<PathBuf>,
    html: Option<PathBuf>,
    strict: bool,
) -> Result<ExitCode> {
    let mut config = super::load_config(&config_path)?;
    let locale = config.language.clone();
    config.backend = super::resolve_backend(&config, backend_flag.as_deref(), &locale)?;

    if branch.is_none() && !reference {
        bail!(t!("branch_required", locale = locale).to_string());
    }

    let catalog = super::load_catalog(&config, &locale)?;
    let specs: Vec<RepoSpec> = catalog.list(&split)?.into_iter().cloned().collect();

    let workers = workers.unwrap_or(config.workers).max(1);
    println!(
        "{}",
        t!(
            "evaluating_split",
            locale = locale,
            count = specs.len(),
            split = split,
            workers = workers
        )
        .bold()
    );

    let token = super::setup_signal_handler(&locale)?;
    let backend = create_backend(&config);
    let orchestrator =
        ParallelOrchestrator::new(backend, config.repos_dir(), workers, token);
    let aggregator = EvaluationAggregator::new(orchestrator, config.backend);

    let progress = aggregator.orchestrator().progress();
    let locale_for_reporter = locale.clone();
    let reporter = tokio::spawn(async move {
        let mut interval = tokio::time::interval(Duration::from_secs(5));
        interval.tick().await;
        loop {
            interval.tick().await;
            println!(
                "{}",
                format_progress(&progress.snapshot(), &locale_for_reporter).dimmed()
            );
        }
    });

    let options = RequestOptions {
        branch,
        use_reference: reference,
        timeout_secs: timeout,
        cpu_budget: cpus.max(1),
        want_coverage: coverage,
        rebuild,
    };
    let report = aggregator.evaluate(&split, specs, &options).await;
    reporter.abort();

    print_evaluation_summary(&report, &locale);

    if let Some(path) = &json {
        let serialized = serde_json::to_string_pretty(&report)
            .context("Failed to serialize evaluation report")?;
        fs::write(path, serialized)
            .with_context(|| format!("Failed to write {}", path.display()))?;
        println!(
            "{}",
            t!("json_written", locale = locale, path = path.display())
        );
    }

    if let Some(path) = &html {
        generate_html_report(&report, path, &locale)?;
        println!(
            "{}",
            t!("html_written", locale = locale, path = path.display())
        );
    }

    if strict && !report.is_perfect() {
        Ok(ExitCode::FAILURE)
    } else {
        Ok(ExitCode::SUCCESS)
    }
}
