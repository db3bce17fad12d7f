//! # Local Backend Integration Tests / 本地后端集成测试
//!
//! Exercises the real build → sync → execute pipeline against scripted git
//! repositories: cache idempotence, rebuild, failed-build hygiene, branch
//! synchronization and timeout enforcement. Needs `git` and `bash`.

mod common;

use std::sync::Arc;
use std::time::{Duration, Instant};

use fleet_runner::core::backend::{create_backend, Backend};
use fleet_runner::core::environment::{fingerprint, EnvironmentBuilder};
use fleet_runner::core::errors::{BuildError, SyncError};
use fleet_runner::core::models::{EnvStatus, TestRequest, TestStatus};
use fleet_runner::core::runner::TestRunner;
use fleet_runner::core::sync::BranchSynchronizer;

use common::HarnessFixture;

fn request_for(repo: &str, test_ids: &[&str]) -> TestRequest {
    TestRequest {
        repo_name: repo.to_string(),
        branch: None,
        test_ids: test_ids.iter().map(|s| s.to_string()).collect(),
        timeout_secs: 60,
        cpu_budget: 1,
        want_coverage: false,
        use_reference: true,
        rebuild: false,
    }
}

#[tokio::test]
async fn test_build_is_idempotent_for_unchanged_fingerprint() {
    let fixture = HarnessFixture::new();
    let spec = fixture.create_repo("alpha", &[("tests/a.py::ok", "passed")]);
    let backend = create_backend(&fixture.config());

    let first = backend.build(&spec, false).await.unwrap();
    assert_eq!(first.status, EnvStatus::Ready);
    assert_eq!(first.fingerprint, fingerprint(&spec));
    assert_eq!(fixture.setup_runs("alpha"), 1);

    let second = backend.build(&spec, false).await.unwrap();
    assert_eq!(second.fingerprint, first.fingerprint);
    // Cache hit: the recipe did not run again.
    assert_eq!(fixture.setup_runs("alpha"), 1);
}

#[tokio::test]
async fn test_rebuild_reruns_the_recipe() {
    let fixture = HarnessFixture::new();
    let spec = fixture.create_repo("beta", &[("tests/a.py::ok", "passed")]);
    let backend = create_backend(&fixture.config());

    backend.build(&spec, false).await.unwrap();
    backend.build(&spec, true).await.unwrap();
    assert_eq!(fixture.setup_runs("beta"), 2);
}

#[tokio::test]
async fn test_recipe_edit_invalidates_the_cache() {
    let fixture = HarnessFixture::new();
    let mut spec = fixture.create_repo("gamma", &[("tests/a.py::ok", "passed")]);
    let backend = create_backend(&fixture.config());

    backend.build(&spec, false).await.unwrap();
    spec.setup
        .commands
        .push("echo an extra recipe step".to_string());
    let rebuilt = backend.build(&spec, false).await.unwrap();

    assert_eq!(rebuilt.fingerprint, fingerprint(&spec));
    assert_eq!(fixture.setup_runs("gamma"), 2);
}

#[tokio::test]
async fn test_failed_build_is_not_cached() {
    let fixture = HarnessFixture::new();
    let spec = fixture.create_broken_repo("delta");
    let backend = create_backend(&fixture.config());

    let first = backend.build(&spec, false).await;
    match first {
        Err(BuildError::RecipeFailed { logs, .. }) => {
            assert!(logs.contains("about to fail"));
        }
        other => panic!("expected RecipeFailed, got {other:?}"),
    }

    // The failure left nothing behind that a second attempt could mistake
    // for a ready environment.
    let second = backend.build(&spec, false).await;
    assert!(second.is_err());
    assert_eq!(fixture.setup_runs("delta"), 2);
}

#[tokio::test]
async fn test_reference_run_passes_and_is_deterministic() {
    let fixture = HarnessFixture::new();
    let spec = fixture.create_repo(
        "epsilon",
        &[
            ("tests/test_event.py::test_succeed", "passed"),
            ("tests/test_event.py::test_other", "passed"),
        ],
    );
    let backend = create_backend(&fixture.config());
    let builder = EnvironmentBuilder::new(Arc::clone(&backend));
    let synchronizer = BranchSynchronizer::new(fixture.repos_dir());
    let runner = TestRunner::new(Arc::clone(&backend));

    let request = request_for("epsilon", &["tests/test_event.py::test_succeed"]);
    let env = builder.build(&spec, false).await.unwrap();
    let plan = synchronizer.plan(&spec, &request).await.unwrap();

    let first = runner.run(&spec, &env, &request, &plan).await.unwrap();
    let second = runner.run(&spec, &env, &request, &plan).await.unwrap();

    for result in [&first, &second] {
        assert_eq!(result.outcomes.len(), 1);
        assert_eq!(
            result.status_of("tests/test_event.py::test_succeed"),
            Some(TestStatus::Passed)
        );
    }
}

#[tokio::test]
async fn test_branch_synchronization_changes_the_verdict() {
    let fixture = HarnessFixture::new();
    let spec = fixture.create_repo("zeta", &[("tests/test_event.py::test_succeed", "passed")]);
    fixture.add_branch(
        &spec,
        "broken",
        &[("tests/test_event.py::test_succeed", "failed")],
    );

    let backend = create_backend(&fixture.config());
    let builder = EnvironmentBuilder::new(Arc::clone(&backend));
    let synchronizer = BranchSynchronizer::new(fixture.repos_dir());
    let runner = TestRunner::new(Arc::clone(&backend));

    let mut request = request_for("zeta", &["tests/test_event.py::test_succeed"]);
    request.use_reference = false;
    request.branch = Some("broken".to_string());

    let env = builder.build(&spec, false).await.unwrap();
    let plan = synchronizer.plan(&spec, &request).await.unwrap();
    assert!(plan.patch.is_some());

    let result = runner.run(&spec, &env, &request, &plan).await.unwrap();
    assert_eq!(
        result.status_of("tests/test_event.py::test_succeed"),
        Some(TestStatus::Failed)
    );

    // The same environment still grades the reference as passing: the
    // branch run did not leak into the cached tree.
    let reference_request = request_for("zeta", &["tests/test_event.py::test_succeed"]);
    let reference_plan = synchronizer.plan(&spec, &reference_request).await.unwrap();
    let reference_result = runner
        .run(&spec, &env, &reference_request, &reference_plan)
        .await
        .unwrap();
    assert_eq!(
        reference_result.status_of("tests/test_event.py::test_succeed"),
        Some(TestStatus::Passed)
    );
}

#[tokio::test]
async fn test_unknown_branch_is_a_sync_error() {
    let fixture = HarnessFixture::new();
    let spec = fixture.create_repo("eta", &[("tests/a.py::ok", "passed")]);
    let synchronizer = BranchSynchronizer::new(fixture.repos_dir());

    let mut request = request_for("eta", &[]);
    request.use_reference = false;
    request.branch = Some("no-such-branch".to_string());

    match synchronizer.plan(&spec, &request).await {
        Err(SyncError::UnknownBranch { branch, .. }) => {
            assert_eq!(branch, "no-such-branch");
        }
        other => panic!("expected UnknownBranch, got {other:?}"),
    }
}

#[tokio::test]
async fn test_timeout_is_a_status_and_returns_promptly() {
    let fixture = HarnessFixture::new();
    let mut spec = fixture.create_repo("theta", &[("tests/slow.py::sleepy", "passed")]);
    spec.harness.command = "sleep 2000".to_string();

    let backend = create_backend(&fixture.config());
    let builder = EnvironmentBuilder::new(Arc::clone(&backend));
    let synchronizer = BranchSynchronizer::new(fixture.repos_dir());
    let runner = TestRunner::new(Arc::clone(&backend));

    let mut request = request_for("theta", &["tests/slow.py::sleepy"]);
    request.timeout_secs = 2;

    let env = builder.build(&spec, false).await.unwrap();
    let plan = synchronizer.plan(&spec, &request).await.unwrap();

    let started = Instant::now();
    let result = runner.run(&spec, &env, &request, &plan).await.unwrap();
    assert!(
        started.elapsed() < Duration::from_secs(15),
        "timeout enforcement took {:?}",
        started.elapsed()
    );
    assert_eq!(
        result.status_of("tests/slow.py::sleepy"),
        Some(TestStatus::Timeout)
    );
}
