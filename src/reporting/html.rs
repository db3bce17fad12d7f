//! # HTML Reporting Module / HTML 报告模块
//!
//! This module handles the generation of HTML evaluation reports.
//! It creates a styled, self-contained page with aggregate statistics and a
//! detailed per-repository table.
//!
//! 此模块处理 HTML 评估报告的生成。
//! 它创建一个带样式的自包含页面，包含聚合统计和详细的按仓库表格。

use anyhow::{Context, Result};
use maud::{html, Markup, PreEscaped, DOCTYPE};
use std::fs;
use std::path::Path;

use crate::core::models::{EvaluationReport, RepoOutcome, ReportEntry};
use crate::infra::t;

/// Embedded CSS styles for HTML reports / HTML 报告的嵌入式 CSS 样式
const HTML_STYLE: &str = include_str!("assets/report.css");

/// Generates a self-contained HTML report for an evaluation.
///
/// # Arguments / 参数
/// * `report` - The finalized evaluation report
///              已定稿的评估报告
/// * `output_path` - The file path where the HTML report will be saved
///                   保存 HTML 报告的文件路径
/// * `locale` - The locale to use for messages
///              用于消息的语言区域设置
pub fn generate_html_report(
    report: &EvaluationReport,
    output_path: &Path,
    locale: &str,
) -> Result<()> {
    let markup = render(report, locale);
    fs::write(output_path, markup.into_string()).with_context(|| {
        format!("Failed to write HTML report to {}", output_path.display())
    })?;
    Ok(())
}

fn render(report: &EvaluationReport, locale: &str) -> Markup {
    let completed = report.entries.len() - report.errored_count();

    html! {
        (DOCTYPE)
        html {
            head {
                meta charset="utf-8";
                title { (t!("html_report_title", locale = locale)) }
                style { (PreEscaped(HTML_STYLE)) }
            }
            body {
                h1 { (t!("html_report_header", locale = locale, split = report.split)) }
                p class="meta" {
                    (report.started_at.format("%Y-%m-%d %H:%M:%S UTC"))
                    " · "
                    (report.backend.as_str())
                    @if let Some(branch) = &report.branch {
                        " · " (branch)
                    }
                }
                div class="summary-container" {
                    div class="summary-item" {
                        span class="count" { (report.entries.len()) }
                        span class="label" { (t!("html_summary_repos", locale = locale)) }
                    }
                    div class="summary-item" {
                        span class="count" { (completed) }
                        span class="label" { (t!("html_summary_completed", locale = locale)) }
                    }
                    div class="summary-item" {
                        span class="count" { (report.errored_count()) }
                        span class="label" { (t!("html_summary_errored", locale = locale)) }
                    }
                    div class="summary-item" {
                        span class="count" { (format!("{:.1}%", report.aggregate_score * 100.0)) }
                        span class="label" { (t!("html_summary_aggregate", locale = locale)) }
                    }
                }
                table {
                    thead {
                        tr {
                            th { (t!("html_col_repo", locale = locale)) }
                            th { (t!("html_col_status", locale = locale)) }
                            th { (t!("html_col_tests", locale = locale)) }
                            th { (t!("html_col_score", locale = locale)) }
                            th { (t!("html_col_detail", locale = locale)) }
                        }
                    }
                    tbody {
                        @for entry in &report.entries {
                            (render_row(entry, locale))
                        }
                    }
                }
            }
        }
    }
}

fn render_row(entry: &ReportEntry, locale: &str) -> Markup {
    match &entry.outcome {
        RepoOutcome::Completed { result } => {
            let class = if result.all_passed() {
                "status-passed"
            } else {
                "status-failed"
            };
            html! {
                tr class=(class) {
                    td { (entry.repo_name) }
                    td {
                        @if result.all_passed() {
                            (t!("repo_status_passed", locale = locale))
                        } @else {
                            (t!("repo_status_failed", locale = locale))
                        }
                    }
                    td { (result.passed_count()) "/" (result.outcomes.len()) }
                    td { (format!("{:.1}%", entry.outcome.score() * 100.0)) }
                    td { (format!("{:.2?}", result.wall_duration)) }
                }
            }
        }
        RepoOutcome::Errored { kind, message } => html! {
            tr class="status-errored" {
                td { (entry.repo_name) }
                td { (t!("repo_status_errored", locale = locale)) }
                td { "-" }
                td { "0.0%" }
                td { code { "[" (kind) "] " (message) } }
            }
        },
    }
}
