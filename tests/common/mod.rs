// Shared test helpers for integration tests
//
// A fixture is a temporary harness workspace: a base directory, a canonical
// git repository per fake "project", and a scripted test harness inside each
// project that writes the machine-readable report the runner parses.

use std::fs;
use std::path::{Path, PathBuf};
use std::process::Command;
use tempfile::{tempdir, TempDir};

use fleet_runner::core::catalog::{RepoSpec, SetupRecipe, TestHarnessSpec};
use fleet_runner::core::config::HarnessConfig;
use fleet_runner::core::models::BackendKind;

/// The scripted stand-in for a repository's own test harness. It reads
/// `cases.txt` (lines of `<id> <outcome>`), filters to the requested ids,
/// and writes the JSON report the runner expects.
const RUN_TESTS_SH: &str = r#"#!/bin/bash
set -u
report="$1"
shift
{
  echo '{"tests": ['
  first=1
  while read -r id outcome; do
    [ -z "$id" ] && continue
    if [ "$#" -gt 0 ]; then
      keep=0
      for want in "$@"; do
        [ "$want" = "$id" ] && keep=1
      done
      [ "$keep" = 1 ] || continue
    fi
    [ "$first" = 1 ] || echo ','
    first=0
    printf '{"id": "%s", "outcome": "%s"}' "$id" "$outcome"
  done < cases.txt
  echo ']}'
} > "$report"
"#;

pub struct HarnessFixture {
    pub root: TempDir,
}

impl HarnessFixture {
    pub fn new() -> Self {
        Self {
            root: tempdir().expect("Failed to create temporary directory"),
        }
    }

    pub fn base_dir(&self) -> PathBuf {
        self.root.path().join("fleet")
    }

    pub fn repos_dir(&self) -> PathBuf {
        self.base_dir().join("repos")
    }

    pub fn config(&self) -> HarnessConfig {
        HarnessConfig {
            language: "en".to_string(),
            backend: BackendKind::Local,
            base_dir: self.base_dir().to_string_lossy().into_owned(),
            catalog: self
                .root
                .path()
                .join("Catalog.toml")
                .to_string_lossy()
                .into_owned(),
            workers: 2,
            build_timeout_secs: 120,
            ..HarnessConfig::default()
        }
    }

    /// Creates a canonical git repository with the scripted harness and the
    /// given test cases, committed as the reference state. Returns the spec
    /// pointing at it.
    pub fn create_repo(&self, name: &str, cases: &[(&str, &str)]) -> RepoSpec {
        let dir = self.repos_dir().join(name);
        fs::create_dir_all(&dir).expect("Failed to create repo directory");

        git(&dir, &["init", "--initial-branch=main"]);
        git(&dir, &["config", "user.email", "fixture@example.com"]);
        git(&dir, &["config", "user.name", "Fixture"]);

        fs::write(dir.join("run_tests.sh"), RUN_TESTS_SH).expect("Failed to write harness");
        write_cases(&dir, cases);
        git(&dir, &["add", "."]);
        git(&dir, &["commit", "-m", "reference state"]);
        let reference_commit = git_output(&dir, &["rev-parse", "HEAD"]);

        RepoSpec {
            name: name.to_string(),
            origin: dir.to_string_lossy().into_owned(),
            reference_commit,
            splits: vec!["smoke".to_string()],
            setup: SetupRecipe {
                commands: vec![format!(
                    "echo ran >> {}",
                    self.setup_counter(name).to_string_lossy()
                )],
            },
            harness: TestHarnessSpec {
                command: "bash run_tests.sh {report} {tests}".to_string(),
                test_dir: "tests/".to_string(),
                coverage_flag: None,
                test_ids: cases.iter().map(|(id, _)| id.to_string()).collect(),
            },
        }
    }

    /// A repository whose setup recipe always fails. The counter still
    /// records every attempt, so caching of failures is observable.
    pub fn create_broken_repo(&self, name: &str) -> RepoSpec {
        let mut spec = self.create_repo(name, &[("tests/test_a.py::ok", "passed")]);
        spec.setup = SetupRecipe {
            commands: vec![
                format!(
                    "echo ran >> {}",
                    self.setup_counter(name).to_string_lossy()
                ),
                "echo the recipe is about to fail".to_string(),
                "false".to_string(),
            ],
        };
        spec
    }

    /// Adds a branch to the canonical repository with different case
    /// outcomes, leaving the repository checked out at the reference state.
    pub fn add_branch(&self, spec: &RepoSpec, branch: &str, cases: &[(&str, &str)]) {
        let dir = self.repos_dir().join(&spec.name);
        git(&dir, &["checkout", "-b", branch]);
        write_cases(&dir, cases);
        git(&dir, &["commit", "-am", "branch state"]);
        git(&dir, &["checkout", "main"]);
    }

    /// Path of the file the setup recipe appends to on every run, one line
    /// per execution.
    pub fn setup_counter(&self, name: &str) -> PathBuf {
        self.root.path().join(format!("{name}-setup-count"))
    }

    pub fn setup_runs(&self, name: &str) -> usize {
        fs::read_to_string(self.setup_counter(name))
            .map(|content| content.lines().count())
            .unwrap_or(0)
    }

    /// Writes the fixture's config and a catalog of the given specs to disk,
    /// for tests that exercise the CLI binary.
    pub fn write_config_files(&self, specs: &[&RepoSpec]) {
        let config = self.config();
        let config_toml = toml::to_string_pretty(&config).expect("Failed to serialize config");
        fs::write(self.root.path().join("Harness.toml"), config_toml)
            .expect("Failed to write Harness.toml");

        let mut catalog = String::new();
        for spec in specs {
            catalog.push_str(
                &toml::to_string_pretty(&CatalogEntry { repos: vec![*spec] })
                    .expect("Failed to serialize catalog entry"),
            );
            catalog.push('\n');
        }
        fs::write(self.root.path().join("Catalog.toml"), catalog)
            .expect("Failed to write Catalog.toml");
    }
}

#[derive(serde::Serialize)]
struct CatalogEntry<'a> {
    repos: Vec<&'a RepoSpec>,
}

fn write_cases(dir: &Path, cases: &[(&str, &str)]) {
    let content: String = cases
        .iter()
        .map(|(id, outcome)| format!("{id} {outcome}\n"))
        .collect();
    fs::write(dir.join("cases.txt"), content).expect("Failed to write cases.txt");
}

fn git(dir: &Path, args: &[&str]) {
    let status = Command::new("git")
        .current_dir(dir)
        .args(args)
        .status()
        .expect("Failed to run git");
    assert!(status.success(), "git {args:?} failed in {}", dir.display());
}

fn git_output(dir: &Path, args: &[&str]) -> String {
    let output = Command::new("git")
        .current_dir(dir)
        .args(args)
        .output()
        .expect("Failed to run git");
    assert!(output.status.success(), "git {args:?} failed");
    String::from_utf8_lossy(&output.stdout).trim().to_string()
}
