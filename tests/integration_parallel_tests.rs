//! # Orchestration Integration Tests / 编排集成测试
//!
//! Exercises the worker pool and the evaluation fold: failure isolation,
//! the strict concurrency bound and the scoring rules.

mod common;

use async_trait::async_trait;
use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::Arc;
use std::time::Duration;
use tokio_util::sync::CancellationToken;

use fleet_runner::core::backend::{create_backend, Backend};
use fleet_runner::core::catalog::RepoSpec;
use fleet_runner::core::errors::{BuildError, ExecutionError};
use fleet_runner::core::evaluate::{EvaluationAggregator, RequestOptions};
use fleet_runner::core::models::{
    BackendKind, EnvStatus, Environment, ExecutionPayload, RawExecution, TestRequest,
};
use fleet_runner::core::orchestrator::{BuildJob, ParallelOrchestrator};

use common::HarnessFixture;

/// A backend that fabricates instant results while counting how many
/// pipelines are inside it at once.
struct CountingBackend {
    current: AtomicUsize,
    peak: AtomicUsize,
}

impl CountingBackend {
    fn new() -> Arc<Self> {
        Arc::new(Self {
            current: AtomicUsize::new(0),
            peak: AtomicUsize::new(0),
        })
    }

    async fn enter(&self) {
        let now = self.current.fetch_add(1, Ordering::SeqCst) + 1;
        self.peak.fetch_max(now, Ordering::SeqCst);
        tokio::time::sleep(Duration::from_millis(25)).await;
    }

    fn exit(&self) {
        self.current.fetch_sub(1, Ordering::SeqCst);
    }
}

#[async_trait]
impl Backend for CountingBackend {
    fn kind(&self) -> BackendKind {
        BackendKind::Local
    }

    async fn build(&self, spec: &RepoSpec, _rebuild: bool) -> Result<Environment, BuildError> {
        self.enter().await;
        self.exit();
        Ok(Environment {
            repo_name: spec.name.clone(),
            fingerprint: "f".repeat(22),
            backend: BackendKind::Local,
            location: format!("mock://{}", spec.name),
            status: EnvStatus::Ready,
        })
    }

    async fn execute(
        &self,
        _env: &Environment,
        request: &TestRequest,
        _payload: &ExecutionPayload,
    ) -> Result<RawExecution, ExecutionError> {
        self.enter().await;
        self.exit();
        let report = format!(
            r#"{{"tests": [{}]}}"#,
            request
                .test_ids
                .iter()
                .map(|id| format!(r#"{{"id": "{id}", "outcome": "passed"}}"#))
                .collect::<Vec<_>>()
                .join(",")
        );
        Ok(RawExecution {
            exit_code: 0,
            output: String::new(),
            timed_out: false,
            duration: Duration::from_millis(1),
            report: Some(report),
        })
    }
}

fn mock_spec(name: &str) -> RepoSpec {
    use fleet_runner::core::catalog::{SetupRecipe, TestHarnessSpec};
    RepoSpec {
        name: name.to_string(),
        origin: format!("mock://{name}"),
        reference_commit: "0".repeat(40),
        splits: vec![],
        setup: SetupRecipe { commands: vec![] },
        harness: TestHarnessSpec {
            command: "true {tests} {report}".to_string(),
            test_dir: "tests/".to_string(),
            coverage_flag: None,
            test_ids: vec![],
        },
    }
}

fn job_for(name: &str) -> BuildJob {
    BuildJob {
        spec: mock_spec(name),
        request: TestRequest {
            repo_name: name.to_string(),
            branch: None,
            test_ids: vec![format!("tests/{name}.py::ok")],
            timeout_secs: 30,
            cpu_budget: 1,
            want_coverage: false,
            use_reference: true,
            rebuild: false,
        },
    }
}

#[tokio::test]
async fn test_worker_pool_respects_the_width_bound() {
    let backend = CountingBackend::new();
    let orchestrator = ParallelOrchestrator::new(
        Arc::clone(&backend) as Arc<dyn Backend>,
        std::env::temp_dir(),
        2,
        CancellationToken::new(),
    );

    let jobs: Vec<BuildJob> = (0..8).map(|i| job_for(&format!("repo{i}"))).collect();
    let outcomes = orchestrator.run(jobs).await;

    assert_eq!(outcomes.len(), 8);
    assert!(outcomes.iter().all(|o| o.result.is_ok()));
    assert!(
        backend.peak.load(Ordering::SeqCst) <= 2,
        "peak concurrency {} exceeded the pool width",
        backend.peak.load(Ordering::SeqCst)
    );
}

#[tokio::test]
async fn test_width_one_is_strictly_sequential() {
    let backend = CountingBackend::new();
    let orchestrator = ParallelOrchestrator::new(
        Arc::clone(&backend) as Arc<dyn Backend>,
        std::env::temp_dir(),
        1,
        CancellationToken::new(),
    );

    let jobs: Vec<BuildJob> = (0..4).map(|i| job_for(&format!("seq{i}"))).collect();
    orchestrator.run(jobs).await;
    assert_eq!(backend.peak.load(Ordering::SeqCst), 1);
}

#[tokio::test]
async fn test_progress_counts_settle() {
    let backend = CountingBackend::new();
    let orchestrator = ParallelOrchestrator::new(
        Arc::clone(&backend) as Arc<dyn Backend>,
        std::env::temp_dir(),
        4,
        CancellationToken::new(),
    );
    let progress = orchestrator.progress();

    let jobs: Vec<BuildJob> = (0..5).map(|i| job_for(&format!("prog{i}"))).collect();
    orchestrator.run(jobs).await;

    let snapshot = progress.snapshot();
    assert_eq!(snapshot.done, 5);
    assert_eq!(snapshot.errored, 0);
    assert_eq!(snapshot.queued, 0);
    assert_eq!(snapshot.building, 0);
    assert_eq!(snapshot.testing, 0);
}

#[tokio::test]
async fn test_one_broken_repo_does_not_stop_the_split() {
    let fixture = HarnessFixture::new();
    let good_a = fixture.create_repo("good-a", &[("tests/a.py::ok", "passed")]);
    let broken = fixture.create_broken_repo("broken-b");
    let good_c = fixture.create_repo("good-c", &[("tests/c.py::ok", "passed")]);

    let config = fixture.config();
    let backend = create_backend(&config);
    let orchestrator = ParallelOrchestrator::new(
        backend,
        config.repos_dir(),
        2,
        CancellationToken::new(),
    );
    let aggregator = EvaluationAggregator::new(orchestrator, config.backend);

    let options = RequestOptions {
        branch: None,
        use_reference: true,
        timeout_secs: 60,
        cpu_budget: 1,
        want_coverage: false,
        rebuild: false,
    };
    let report = aggregator
        .evaluate("smoke", vec![good_a, broken, good_c], &options)
        .await;

    assert_eq!(report.entries.len(), 3);
    assert_eq!(report.errored_count(), 1);

    let broken_entry = report
        .entries
        .iter()
        .find(|e| e.repo_name == "broken-b")
        .unwrap();
    assert!(broken_entry.outcome.is_errored());
    assert_eq!(broken_entry.outcome.score(), 0.0);

    for name in ["good-a", "good-c"] {
        let entry = report.entries.iter().find(|e| e.repo_name == name).unwrap();
        assert!(!entry.outcome.is_errored(), "{name} should have completed");
        assert_eq!(entry.outcome.score(), 1.0);
    }

    // Mean over all three repositories, the broken one contributing 0.
    assert!((report.aggregate_score - 2.0 / 3.0).abs() < 1e-9);
}

#[tokio::test]
async fn test_entries_are_written_exactly_once_and_sorted() {
    let backend = CountingBackend::new();
    let orchestrator = ParallelOrchestrator::new(
        Arc::clone(&backend) as Arc<dyn Backend>,
        std::env::temp_dir(),
        4,
        CancellationToken::new(),
    );
    let aggregator = EvaluationAggregator::new(orchestrator, BackendKind::Local);

    let specs: Vec<RepoSpec> = ["zulu", "alpha", "mike"]
        .iter()
        .map(|n| mock_spec(n))
        .collect();
    let options = RequestOptions {
        branch: Some("feature".to_string()),
        use_reference: false,
        timeout_secs: 30,
        cpu_budget: 1,
        want_coverage: false,
        rebuild: false,
    };
    let report = aggregator.evaluate("all", specs, &options).await;

    let names: Vec<&str> = report.entries.iter().map(|e| e.repo_name.as_str()).collect();
    assert_eq!(names, vec!["alpha", "mike", "zulu"]);
    assert_eq!(report.branch.as_deref(), Some("feature"));
}

#[tokio::test]
async fn test_cancelled_jobs_are_marked_errored() {
    let backend = CountingBackend::new();
    let token = CancellationToken::new();
    token.cancel();
    let orchestrator = ParallelOrchestrator::new(
        Arc::clone(&backend) as Arc<dyn Backend>,
        std::env::temp_dir(),
        2,
        token,
    );

    let outcomes = orchestrator.run(vec![job_for("cancelled")]).await;
    assert_eq!(outcomes.len(), 1);
    assert!(outcomes[0].result.is_err());
}
