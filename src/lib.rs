//! # Fleet Runner Library / Fleet Runner 库
//!
//! This library provides the core functionality for the Fleet Runner tool,
//! a test harness that builds isolated, cached execution environments for a
//! catalog of repositories and grades their unit tests, either on the local
//! machine or on a distributed execution service.
//!
//! 此库为 Fleet Runner 工具提供核心功能，
//! 这是一个为仓库目录构建隔离、带缓存的执行环境并对其单元测试评分的测试工具，
//! 支持本地执行或分布式执行服务。
//!
//! ## Modules / 模块
//!
//! - `core` - Catalog, environments, backends and the orchestration engine
//! - `infra` - Infrastructure services like command execution, git and file system operations
//! - `reporting` - Result reporting and visualization
//! - `cli` - Command-line interface and commands
//!
//! - `core` - 目录、环境、后端和编排引擎
//! - `infra` - 基础设施服务，如命令执行、git 和文件系统操作
//! - `reporting` - 结果报告和可视化
//! - `cli` - 命令行接口和命令

pub mod core;
pub mod infra;
pub mod reporting;
pub mod cli;

// Re-export commonly used items
pub use self::core::catalog;
pub use self::core::config;
pub use self::core::models;

/// Initializes the application's internationalization (i18n) based on the system locale.
///
/// This function detects the user's system locale and sets the appropriate
/// language for the application's user interface. It attempts to match the full
/// locale (e.g., "zh-CN"), then just the language code (e.g., "en"), and
/// finally falls back to the default language ("en").
pub fn init() {
    // Detect system locale and set it for i18n.
    // Fallback to "en" if detection fails.
    let locale = sys_locale::get_locale().unwrap_or_else(|| "en".to_string());
    let available_locales = rust_i18n::available_locales!();

    // Try to match the full locale first (e.g., "zh-CN")
    // Then try to match the language part only (e.g., "en" from "en-US")
    // Finally, fall back to "en"
    let lang = if available_locales.contains(&locale.as_str()) {
        &locale
    } else {
        locale
            .split('-')
            .next()
            .filter(|lang_code| available_locales.contains(lang_code))
            .unwrap_or("en")
    };

    rust_i18n::set_locale(lang);
}

// Initialize i18n
rust_i18n::i18n!("locales", fallback = "en");
