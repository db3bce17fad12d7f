//! # Environment Fingerprint Unit Tests / 环境指纹单元测试
//!
//! The fingerprint is the sole cache key, so its stability properties are
//! what the whole caching design rests on.

use fleet_runner::core::catalog::{RepoSpec, SetupRecipe, TestHarnessSpec};
use fleet_runner::core::environment::fingerprint;

fn sample_spec() -> RepoSpec {
    RepoSpec {
        name: "simpy".to_string(),
        origin: "https://github.com/example/simpy".to_string(),
        reference_commit: "0123456789abcdef0123456789abcdef01234567".to_string(),
        splits: vec!["lite".to_string()],
        setup: SetupRecipe {
            commands: vec!["uv venv".to_string(), "uv pip install -e .".to_string()],
        },
        harness: TestHarnessSpec {
            command: "uv run pytest {tests} --report {report}".to_string(),
            test_dir: "tests/".to_string(),
            coverage_flag: None,
            test_ids: vec![],
        },
    }
}

#[test]
fn test_fingerprint_is_deterministic() {
    assert_eq!(fingerprint(&sample_spec()), fingerprint(&sample_spec()));
}

#[test]
fn test_fingerprint_shape() {
    let fp = fingerprint(&sample_spec());
    assert_eq!(fp.len(), 22);
    assert!(fp.chars().all(|c| c.is_ascii_hexdigit()));
}

#[test]
fn test_recipe_edit_changes_fingerprint() {
    let spec = sample_spec();
    let mut edited = sample_spec();
    edited.setup.commands.push("uv pip install pytest-cov".to_string());
    assert_ne!(fingerprint(&spec), fingerprint(&edited));
}

#[test]
fn test_reference_commit_changes_fingerprint() {
    let spec = sample_spec();
    let mut moved = sample_spec();
    moved.reference_commit = "89abcdef0123456789abcdef0123456789abcdef".to_string();
    assert_ne!(fingerprint(&spec), fingerprint(&moved));
}

#[test]
fn test_harness_command_does_not_change_fingerprint() {
    // The harness command runs per invocation, not at build time, so
    // editing it must not invalidate built environments.
    let spec = sample_spec();
    let mut retargeted = sample_spec();
    retargeted.harness.command = "uv run pytest -x {tests} --report {report}".to_string();
    assert_eq!(fingerprint(&spec), fingerprint(&retargeted));
}
