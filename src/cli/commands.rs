// src/cli/commands.rs
//
// Shared plumbing for the subcommands: configuration and catalog loading,
// backend selection and Ctrl-C wiring.

use anyhow::{anyhow, Result};
use colored::*;
use std::path::Path;
use tokio::signal;
use tokio_util::sync::CancellationToken;

use crate::core::catalog::Catalog;
use crate::core::config::HarnessConfig;
use crate::core::models::BackendKind;
use crate::infra::t;

pub mod build;
pub mod evaluate;
pub mod get_tests;
pub mod init;

/// Loads the configuration and switches the output language to its choice.
pub(crate) fn load_config(config_path: &Path) -> Result<HarnessConfig> {
    let resolved = crate::infra::fs::absolute_path(config_path)?;
    let config = HarnessConfig::load(&resolved)?;
    rust_i18n::set_locale(&config.language);
    Ok(config)
}

pub(crate) fn load_catalog(config: &HarnessConfig, locale: &str) -> Result<Catalog> {
    let path = config.catalog_path();
    let catalog = Catalog::load(&path)?;
    println!(
        "{}",
        t!(
            "catalog_loaded",
            locale = locale,
            count = catalog.len(),
            path = path.display()
        )
    );
    Ok(catalog)
}

/// The backend for this invocation: the `--backend` flag wins over the
/// configuration file.
pub(crate) fn resolve_backend(
    config: &HarnessConfig,
    flag: Option<&str>,
    locale: &str,
) -> Result<BackendKind> {
    match flag {
        None => Ok(config.backend),
        Some(name) => BackendKind::parse(name)
            .ok_or_else(|| anyhow!(t!("unknown_backend", locale = locale, name = name).to_string())),
    }
}

pub(crate) fn setup_signal_handler(locale: &str) -> Result<CancellationToken> {
    let token = CancellationToken::new();
    let token_clone = token.clone();
    let locale = locale.to_string();

    tokio::spawn(async move {
        signal::ctrl_c().await.expect("Failed to listen for Ctrl-C");
        println!("\n{}", t!("shutdown_signal", locale = &locale).yellow());
        token_clone.cancel();
    });

    Ok(token)
}
