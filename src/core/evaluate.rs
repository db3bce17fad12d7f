//! # Evaluation Module / 评估模块
//!
//! Drives the orchestrator across an entire repository split and folds the
//! per-repository outcomes into a scored report. Repositories that errored
//! before producing a result score 0 and stay distinguishable from
//! repositories that ran and genuinely failed tests.
//!
//! 在整个仓库分组上驱动编排器，并将各仓库结果折叠为评分报告。
//! 在产出结果前出错的仓库得 0 分，且始终与真正测试失败的仓库可区分。

use chrono::Utc;

use crate::core::catalog::RepoSpec;
use crate::core::models::{
    BackendKind, EvaluationReport, RepoOutcome, ReportEntry, TestRequest,
};
use crate::core::orchestrator::{BuildJob, ParallelOrchestrator};

/// The per-run knobs shared by every repository of an evaluation.
/// 一次评估中所有仓库共享的运行参数。
#[derive(Debug, Clone)]
pub struct RequestOptions {
    pub branch: Option<String>,
    pub use_reference: bool,
    pub timeout_secs: u64,
    pub cpu_budget: usize,
    pub want_coverage: bool,
    pub rebuild: bool,
}

impl RequestOptions {
    /// The full-suite request this evaluation issues for one repository.
    pub fn request_for(&self, repo_name: &str) -> TestRequest {
        TestRequest {
            repo_name: repo_name.to_string(),
            branch: self.branch.clone(),
            test_ids: Vec::new(),
            timeout_secs: self.timeout_secs,
            cpu_budget: self.cpu_budget,
            want_coverage: self.want_coverage,
            use_reference: self.use_reference,
            rebuild: self.rebuild,
        }
    }
}

/// Sole writer of the evaluation report.
/// 评估报告的唯一写入者。
pub struct EvaluationAggregator {
    orchestrator: ParallelOrchestrator,
    backend_kind: BackendKind,
}

impl EvaluationAggregator {
    pub fn new(orchestrator: ParallelOrchestrator, backend_kind: BackendKind) -> Self {
        Self {
            orchestrator,
            backend_kind,
        }
    }

    pub fn orchestrator(&self) -> &ParallelOrchestrator {
        &self.orchestrator
    }

    /// Evaluates every repository of the split and finalizes the report.
    ///
    /// The whole split always completes: a failing repository contributes
    /// an errored entry, never an early abort. Entries are folded here, on
    /// one task, so each repository is written exactly once; the returned
    /// report is immutable from the caller's point of view.
    pub async fn evaluate(
        &self,
        split: &str,
        specs: Vec<RepoSpec>,
        options: &RequestOptions,
    ) -> EvaluationReport {
        let started_at = Utc::now();
        let jobs: Vec<BuildJob> = specs
            .iter()
            .map(|spec| BuildJob {
                spec: spec.clone(),
                request: options.request_for(&spec.name),
            })
            .collect();

        let outcomes = self.orchestrator.run(jobs).await;

        let mut entries: Vec<ReportEntry> = outcomes
            .into_iter()
            .map(|outcome| ReportEntry {
                repo_name: outcome.repo_name,
                outcome: match outcome.result {
                    Ok(result) => RepoOutcome::Completed { result },
                    Err(e) => RepoOutcome::Errored {
                        kind: e.kind().to_string(),
                        message: e.to_string(),
                    },
                },
            })
            .collect();
        entries.sort_by(|a, b| a.repo_name.cmp(&b.repo_name));

        let aggregate_score = if entries.is_empty() {
            0.0
        } else {
            entries.iter().map(|e| e.outcome.score()).sum::<f64>() / entries.len() as f64
        };

        EvaluationReport {
            split: split.to_string(),
            branch: options.branch.clone().or_else(|| {
                options
                    .use_reference
                    .then(|| "reference".to_string())
            }),
            backend: self.backend_kind,
            started_at,
            entries,
            aggregate_score,
        }
    }
}
