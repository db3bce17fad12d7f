//! # Console Reporting Module / 控制台报告模块
//!
//! This module handles the generation and display of harness reports in the
//! console. It provides functionality for printing colorful, formatted
//! summaries with internationalization support.
//!
//! 此模块处理控制台中工具报告的生成和显示。
//! 它提供打印彩色格式化摘要的功能，支持国际化。

use colored::*;

use crate::core::errors::JobError;
use crate::core::models::{
    EvaluationReport, ProgressSnapshot, RepoOutcome, TestResult, TestStatus,
};
use crate::infra::t;

/// Prints a formatted summary of a single test invocation.
/// Displays one line per test id with its colored status, followed by the
/// pass count, the wall duration and, when collected, per-file coverage.
///
/// 打印单次测试调用的格式化摘要。
/// 每个测试 id 一行，显示其彩色状态，随后是通过数、墙钟时长，
/// 以及（若收集）按文件的覆盖率。
///
/// # Output Format / 输出格式
/// ```text
/// --- Test Summary ---
///   - passed   | tests/test_event.py::test_succeed
///   - timeout  | tests/test_event.py::test_slow
///   1/2 tests passed in 4.21s
/// ```
pub fn print_test_result(repo_name: &str, result: &TestResult, locale: &str) {
    println!(
        "\n{}",
        t!("test_summary_banner", locale = locale, repo = repo_name).bold()
    );

    for outcome in &result.outcomes {
        let status_colored = match outcome.status {
            TestStatus::Passed => outcome.status.as_str().green(),
            TestStatus::Failed => outcome.status.as_str().red(),
            TestStatus::Error => outcome.status.as_str().red().bold(),
            TestStatus::Timeout => outcome.status.as_str().yellow(),
        };
        println!("  - {:<8} | {}", status_colored, outcome.id);
    }

    if result.outcomes.is_empty() {
        println!("  {}", t!("no_tests_reported", locale = locale).yellow());
    }

    let totals = t!(
        "test_totals",
        locale = locale,
        passed = result.passed_count(),
        total = result.outcomes.len(),
        duration = format!("{:.2?}", result.wall_duration)
    );
    if result.all_passed() {
        println!("  {}", totals.green().bold());
    } else {
        println!("  {}", totals.red().bold());
    }

    if let Some(coverage) = &result.coverage {
        println!("\n{}", t!("coverage_banner", locale = locale).bold());
        for (file, fraction) in coverage {
            println!("  - {:<40} | {:>6.1}%", file, fraction * 100.0);
        }
    }
}

/// Prints the error that terminated one repository's pipeline, with the
/// captured log tail when the failure carries one.
///
/// 打印终止某个仓库流水线的错误，若失败附带捕获日志尾部则一并打印。
pub fn print_job_error(repo_name: &str, error: &JobError, locale: &str) {
    println!(
        "\n{} {}",
        t!("job_error_banner", locale = locale, repo = repo_name).red().bold(),
        format!("[{}]", error.kind()).yellow()
    );
    println!("  {}", error);
    if let Some(tail) = error.log_tail() {
        println!("\n--- {} ---", t!("log_tail_banner", locale = locale).yellow());
        println!("{}", tail);
        println!("{}", "-".repeat(80));
    }
}

/// Prints the per-repository table and aggregate score of an evaluation.
/// Errored repositories are flagged distinctly from genuine test failures.
///
/// 打印一次评估的按仓库表格和聚合得分。
/// 出错仓库与真正的测试失败被明确区分标记。
pub fn print_evaluation_summary(report: &EvaluationReport, locale: &str) {
    println!(
        "\n{}",
        t!(
            "evaluation_banner",
            locale = locale,
            split = report.split,
            backend = report.backend.as_str()
        )
        .bold()
    );

    for entry in &report.entries {
        match &entry.outcome {
            RepoOutcome::Completed { result } => {
                let status = if result.all_passed() {
                    t!("repo_status_passed", locale = locale).green()
                } else {
                    t!("repo_status_failed", locale = locale).red()
                };
                println!(
                    "  - {:<10} | {:<30} | {:>3}/{:<3} | {:>6.1}%",
                    status,
                    entry.repo_name,
                    result.passed_count(),
                    result.outcomes.len(),
                    entry.outcome.score() * 100.0
                );
            }
            RepoOutcome::Errored { kind, message } => {
                println!(
                    "  - {:<10} | {:<30} | {}",
                    t!("repo_status_errored", locale = locale).red().bold(),
                    entry.repo_name,
                    format!("[{kind}] {message}").dimmed()
                );
            }
        }
    }

    let aggregate = t!(
        "aggregate_score",
        locale = locale,
        score = format!("{:.1}", report.aggregate_score * 100.0),
        errored = report.errored_count()
    );
    if report.is_perfect() {
        println!("\n{}", aggregate.green().bold());
    } else {
        println!("\n{}", aggregate.yellow().bold());
    }
}

/// One-line progress report, suitable for periodic printing while a run is
/// in flight.
pub fn format_progress(snapshot: &ProgressSnapshot, locale: &str) -> String {
    t!(
        "progress_line",
        locale = locale,
        queued = snapshot.queued,
        building = snapshot.building,
        testing = snapshot.testing,
        done = snapshot.done,
        errored = snapshot.errored
    )
    .to_string()
}
