//! # Harness Initialization Module / 工具初始化模块
//!
//! This module provides functionality for initializing a new harness
//! configuration through an interactive command-line wizard. It helps users
//! create a `Harness.toml` file with the backend choice, base directory and
//! worker defaults.
//!
//! 此模块通过交互式命令行向导提供初始化新工具配置的功能。
//! 它帮助用户创建包含后端选择、基础目录和工作者默认值的 `Harness.toml` 文件。

use anyhow::{Context, Result};
use colored::*;
use dialoguer::{theme::ColorfulTheme, Confirm, Input, Select};
use std::fs;
use std::path::Path;

use crate::core::config::HarnessConfig;
use crate::core::models::BackendKind;
use crate::infra::t;

/// Runs the interactive wizard to generate a `Harness.toml` file.
///
/// 运行交互式向导以生成 `Harness.toml` 文件。
pub fn run_init_wizard(language: &str, non_interactive: bool) -> Result<()> {
    let config_path = Path::new("Harness.toml");
    let theme = ColorfulTheme::default();

    if !non_interactive {
        println!(
            "\n{}",
            t!("init_wizard_welcome", locale = language).cyan().bold()
        );
        println!("{}", t!("init_wizard_description", locale = language));
    }

    if config_path.exists() && !non_interactive {
        let confirmation = Confirm::with_theme(&theme)
            .with_prompt(
                t!(
                    "init_overwrite_prompt",
                    locale = language,
                    path = config_path.display()
                )
                .to_string(),
            )
            .default(false)
            .interact()
            .context(t!("init_user_confirmation_failed", locale = language).to_string())?;
        if !confirmation {
            println!("{}", t!("init_aborted", locale = language));
            return Ok(());
        }
    }

    let mut config = HarnessConfig::default();

    if non_interactive {
        return write_config(config_path, &config, language);
    }

    let backends = [BackendKind::Local, BackendKind::Distributed];
    let backend_index = Select::with_theme(&theme)
        .with_prompt(t!("init_prompt_backend", locale = language).to_string())
        .items(&backends.iter().map(|b| b.as_str()).collect::<Vec<_>>())
        .default(0)
        .interact()
        .context(t!("init_user_confirmation_failed", locale = language).to_string())?;
    config.backend = backends[backend_index];

    if config.backend == BackendKind::Distributed {
        config.remote.endpoint = Input::with_theme(&theme)
            .with_prompt(t!("init_prompt_endpoint", locale = language).to_string())
            .default(config.remote.endpoint.clone())
            .interact_text()
            .context(t!("init_user_confirmation_failed", locale = language).to_string())?;
    }

    config.base_dir = Input::with_theme(&theme)
        .with_prompt(t!("init_prompt_base_dir", locale = language).to_string())
        .default(config.base_dir.clone())
        .interact_text()
        .context(t!("init_user_confirmation_failed", locale = language).to_string())?;

    config.catalog = Input::with_theme(&theme)
        .with_prompt(t!("init_prompt_catalog", locale = language).to_string())
        .default(config.catalog.clone())
        .interact_text()
        .context(t!("init_user_confirmation_failed", locale = language).to_string())?;

    config.workers = Input::with_theme(&theme)
        .with_prompt(t!("init_prompt_workers", locale = language).to_string())
        .default(config.workers)
        .interact_text()
        .context(t!("init_user_confirmation_failed", locale = language).to_string())?;

    let languages = ["en", "zh-CN"];
    let language_index = Select::with_theme(&theme)
        .with_prompt(t!("init_prompt_language", locale = language).to_string())
        .items(&languages)
        .default(0)
        .interact()
        .context(t!("init_user_confirmation_failed", locale = language).to_string())?;
    config.language = languages[language_index].to_string();

    write_config(config_path, &config, language)
}

fn write_config(path: &Path, config: &HarnessConfig, language: &str) -> Result<()> {
    let content =
        toml::to_string_pretty(config).context("Failed to serialize configuration")?;
    fs::write(path, content)
        .with_context(|| format!("Failed to write {}", path.display()))?;
    println!(
        "{}",
        t!(
            "init_config_written",
            locale = language,
            path = path.display()
        )
        .green()
    );
    Ok(())
}
