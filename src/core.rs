//! # Core Module / 核心模块
//!
//! This module contains the harness engine: the repository catalog, the
//! environment lifecycle, the execution backends and the parallel
//! orchestration that drives builds and test runs across many repositories.
//!
//! 此模块包含工具引擎：仓库目录、环境生命周期、执行后端
//! 以及驱动多仓库构建和测试运行的并行编排。

pub mod backend;
pub mod catalog;
pub mod config;
pub mod environment;
pub mod errors;
pub mod evaluate;
pub mod models;
pub mod orchestrator;
pub mod runner;
pub mod sync;

pub use self::backend::Backend;
pub use self::catalog::{Catalog, RepoSpec};
pub use self::config::HarnessConfig;
pub use self::environment::EnvironmentBuilder;
pub use self::models::{EvaluationReport, TestRequest, TestResult, TestStatus};
pub use self::orchestrator::ParallelOrchestrator;
pub use self::runner::TestRunner;
pub use self::sync::BranchSynchronizer;
