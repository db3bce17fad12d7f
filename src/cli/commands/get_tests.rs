// src/cli/commands/get_tests.rs

use anyhow::{bail, Result};
use colored::*;
use std::path::PathBuf;
use std::process::ExitCode;

use crate::infra::t;

/// Prints the known test identifiers of a repository, straight from the
/// catalog. No environment is built; this is the id list a `test`
/// invocation can select from.
pub async fn execute(config_path: PathBuf, repo: String) -> Result<ExitCode> {
    let config = super::load_config(&config_path)?;
    let locale = config.language.clone();
    let catalog = super::load_catalog(&config, &locale)?;

    let Some(spec) = catalog.lookup(&repo) else {
        bail!(t!("unknown_repo", locale = locale, name = repo).to_string());
    };

    if spec.harness.test_ids.is_empty() {
        println!(
            "{}",
            t!("no_known_tests", locale = locale, repo = repo).yellow()
        );
        return Ok(ExitCode::SUCCESS);
    }

    println!(
        "{}",
        t!(
            "get_tests_header",
            locale = locale,
            repo = repo.yellow(),
            count = spec.harness.test_ids.len()
        )
        .bold()
    );
    for id in &spec.harness.test_ids {
        println!("{id}");
    }
    Ok(ExitCode::SUCCESS)
}
