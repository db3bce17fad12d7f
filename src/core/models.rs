//! # Data Models Module / 数据模型模块
//!
//! This module defines the core data structures used throughout the harness.
//! It includes models for test requests and results, built environments,
//! orchestrator job states and the final evaluation report.
//!
//! 此模块定义了整个工具中使用的核心数据结构。
//! 它包括测试请求和结果、已构建环境、编排器作业状态以及最终评估报告的模型。

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;
use std::fmt;
use std::time::Duration;

/// Name of the machine-readable report file a harness command must write
/// into the working copy, relative to the repository root.
/// 测试命令必须写入工作副本的机器可读报告文件名，相对于仓库根目录。
pub const REPORT_FILENAME: &str = "fleet-report.json";

/// The execution substrate a request is served by.
/// 请求所使用的执行基底。
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize, Default)]
#[serde(rename_all = "lowercase")]
pub enum BackendKind {
    /// Locally managed isolated processes with a per-fingerprint cache directory.
    /// 本地管理的隔离进程，带有按指纹划分的缓存目录。
    #[default]
    Local,
    /// A remote distributed execution service reached over HTTP.
    /// 通过 HTTP 访问的远程分布式执行服务。
    Distributed,
}

impl BackendKind {
    pub fn as_str(&self) -> &'static str {
        match self {
            BackendKind::Local => "local",
            BackendKind::Distributed => "distributed",
        }
    }

    pub fn parse(s: &str) -> Option<Self> {
        match s {
            "local" => Some(BackendKind::Local),
            "distributed" => Some(BackendKind::Distributed),
            _ => None,
        }
    }
}

impl fmt::Display for BackendKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Lifecycle state of a built environment.
/// 已构建环境的生命周期状态。
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum EnvStatus {
    Building,
    Ready,
    Failed,
}

/// An isolated, reproducible execution environment for one repository.
///
/// One environment exists per (repository, backend kind) at a time. It is
/// created by the backend that owns it and invalidated when the setup-recipe
/// fingerprint changes or a rebuild is requested.
///
/// 单个仓库的隔离、可复现执行环境。
/// 每个（仓库，后端类型）同时只存在一个环境。它由拥有它的后端创建，
/// 当安装配方指纹变化或请求重建时失效。
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Environment {
    /// Name of the repository this environment was built for.
    /// 此环境所属仓库的名称。
    pub repo_name: String,
    /// Content hash of the rendered setup recipe, the sole cache key.
    /// 渲染后安装配方的内容哈希，唯一的缓存键。
    pub fingerprint: String,
    /// The backend that built and owns this environment.
    /// 构建并拥有此环境的后端。
    pub backend: BackendKind,
    /// Backend-specific handle: a cache directory for the local backend,
    /// a service-side environment id for the distributed backend.
    /// 后端特定的句柄：本地后端为缓存目录，分布式后端为服务端环境 id。
    pub location: String,
    pub status: EnvStatus,
}

impl Environment {
    pub fn is_ready(&self) -> bool {
        self.status == EnvStatus::Ready
    }
}

/// A single test invocation, fully described. Immutable value object.
/// 单次测试调用的完整描述。不可变的值对象。
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct TestRequest {
    pub repo_name: String,
    /// Branch whose changes are synchronized into the environment before the
    /// run. Absent means the reference checkout is tested as built.
    /// 在运行前同步到环境中的分支。缺省表示按原样测试参考检出。
    #[serde(default)]
    pub branch: Option<String>,
    /// Ordered test identifiers. Empty means "run the full discovered set".
    /// 有序的测试标识符。为空表示"运行完整的已发现集合"。
    #[serde(default)]
    pub test_ids: Vec<String>,
    pub timeout_secs: u64,
    /// CPU ceiling for the run, enforced by the backend.
    /// 运行的 CPU 上限，由后端强制执行。
    pub cpu_budget: usize,
    #[serde(default)]
    pub want_coverage: bool,
    /// Grade the environment exactly as built, skipping synchronization.
    /// 按构建原样评分环境，跳过同步。
    #[serde(default)]
    pub use_reference: bool,
    /// Distrust the environment cache for this invocation.
    /// 本次调用不信任环境缓存。
    #[serde(default)]
    pub rebuild: bool,
}

impl TestRequest {
    /// A request against the reference baseline with sensible defaults.
    pub fn reference(repo_name: &str, timeout_secs: u64) -> Self {
        Self {
            repo_name: repo_name.to_string(),
            branch: None,
            test_ids: Vec::new(),
            timeout_secs,
            cpu_budget: 1,
            want_coverage: false,
            use_reference: true,
            rebuild: false,
        }
    }
}

/// Terminal status of a single test id.
/// 单个测试 id 的最终状态。
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum TestStatus {
    Passed,
    Failed,
    /// The harness inside the environment errored before producing a verdict
    /// for this id (collection error, crash, unaccounted id).
    /// 环境内的测试框架在为此 id 产出结论前出错（收集错误、崩溃、未记录的 id）。
    Error,
    /// The invocation hit its deadline before this id finished. A status,
    /// never an exception: the call itself completed from the harness's view.
    /// 调用在此 id 完成前到达期限。它是一个状态而非异常。
    Timeout,
}

impl TestStatus {
    pub fn as_str(&self) -> &'static str {
        match self {
            TestStatus::Passed => "passed",
            TestStatus::Failed => "failed",
            TestStatus::Error => "error",
            TestStatus::Timeout => "timeout",
        }
    }
}

/// Status of one requested test id within a result.
/// 结果中单个被请求测试 id 的状态。
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct CaseOutcome {
    pub id: String,
    pub status: TestStatus,
}

/// The outcome of one test invocation. Produced once per request and never
/// mutated afterwards.
///
/// The outcome list covers exactly the requested id set, in request order,
/// or the full discovered set when the request was empty.
///
/// 一次测试调用的结果。每个请求产生一次，之后不再修改。
/// 结果列表按请求顺序精确覆盖被请求的 id 集合；请求为空时覆盖完整的已发现集合。
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct TestResult {
    pub outcomes: Vec<CaseOutcome>,
    pub wall_duration: Duration,
    /// Per-file coverage fractions; present only when coverage was requested.
    /// 按文件的覆盖率；仅当请求覆盖率时存在。
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub coverage: Option<BTreeMap<String, f64>>,
    /// Bounded tail of the captured execution output.
    /// 捕获的执行输出的有界尾部。
    pub output: String,
}

impl TestResult {
    pub fn passed_count(&self) -> usize {
        self.outcomes
            .iter()
            .filter(|o| o.status == TestStatus::Passed)
            .count()
    }

    pub fn all_passed(&self) -> bool {
        !self.outcomes.is_empty() && self.passed_count() == self.outcomes.len()
    }

    /// Fraction of requested ids that passed. An empty outcome set scores 0.
    pub fn pass_fraction(&self) -> f64 {
        if self.outcomes.is_empty() {
            return 0.0;
        }
        self.passed_count() as f64 / self.outcomes.len() as f64
    }

    pub fn status_of(&self, id: &str) -> Option<TestStatus> {
        self.outcomes.iter().find(|o| o.id == id).map(|o| o.status)
    }

    pub fn has_timeout(&self) -> bool {
        self.outcomes
            .iter()
            .any(|o| o.status == TestStatus::Timeout)
    }
}

/// Orchestrator-side state of one repository's pipeline.
/// 编排器侧单个仓库流水线的状态。
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum JobState {
    Queued,
    Building,
    Testing,
    Done,
    Errored,
}

/// Live counts of orchestrator job states, taken without blocking workers.
/// 编排器作业状态的实时计数，获取时不阻塞工作者。
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub struct ProgressSnapshot {
    pub queued: usize,
    pub building: usize,
    pub testing: usize,
    pub done: usize,
    pub errored: usize,
}

impl ProgressSnapshot {
    pub fn finished(&self) -> usize {
        self.done + self.errored
    }

    pub fn total(&self) -> usize {
        self.queued + self.building + self.testing + self.done + self.errored
    }
}

/// What one repository contributed to an evaluation.
/// 单个仓库对一次评估的贡献。
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(tag = "state", rename_all = "lowercase")]
pub enum RepoOutcome {
    /// The pipeline ran to completion and produced a result; tests may still
    /// have failed.
    /// 流水线完整运行并产出结果；测试本身仍可能失败。
    Completed { result: TestResult },
    /// The pipeline errored before producing a result. Flagged distinctly so
    /// infrastructure failures are never conflated with incorrect code.
    /// 流水线在产出结果前出错。单独标记，确保基础设施故障不会与错误代码混淆。
    Errored { kind: String, message: String },
}

impl RepoOutcome {
    /// A repository's score is its passed fraction; errored repositories
    /// score 0.
    pub fn score(&self) -> f64 {
        match self {
            RepoOutcome::Completed { result } => result.pass_fraction(),
            RepoOutcome::Errored { .. } => 0.0,
        }
    }

    pub fn is_errored(&self) -> bool {
        matches!(self, RepoOutcome::Errored { .. })
    }
}

/// One finalized entry of the evaluation report.
/// 评估报告中一条最终条目。
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ReportEntry {
    pub repo_name: String,
    #[serde(flatten)]
    pub outcome: RepoOutcome,
}

/// The aggregated result of evaluating a whole repository split.
/// Immutable once finalized by the aggregator.
///
/// 评估整个仓库分组的聚合结果。由聚合器定稿后不可变。
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct EvaluationReport {
    pub split: String,
    #[serde(default)]
    pub branch: Option<String>,
    pub backend: BackendKind,
    pub started_at: DateTime<Utc>,
    /// One entry per repository, written exactly once, sorted by name.
    /// 每个仓库一条条目，恰好写入一次，按名称排序。
    pub entries: Vec<ReportEntry>,
    /// Mean of per-repository scores.
    /// 各仓库得分的平均值。
    pub aggregate_score: f64,
}

impl EvaluationReport {
    pub fn errored_count(&self) -> usize {
        self.entries.iter().filter(|e| e.outcome.is_errored()).count()
    }

    pub fn is_perfect(&self) -> bool {
        (self.aggregate_score - 1.0).abs() < f64::EPSILON && !self.entries.is_empty()
    }
}

/// The concrete work a backend materializes inside an environment for one
/// test invocation: restore the source tree, optionally apply a branch
/// patch, then run the rendered harness command.
///
/// 后端为一次测试调用在环境内物化的具体工作：恢复源码树，
/// 可选地应用分支补丁，然后运行渲染后的测试命令。
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ExecutionPayload {
    /// Commit the working copy is reset to before anything else runs.
    /// 在任何操作前工作副本重置到的提交。
    pub reset_to: String,
    /// Unified diff applied on top of the reset tree, if a branch is tested.
    /// 若测试分支，则在重置后的树上应用的统一 diff。
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub patch: Option<String>,
    /// Fully rendered test command, report path already substituted.
    /// 完整渲染的测试命令，报告路径已替换。
    pub command: String,
}

/// Raw, uninterpreted outcome of a backend execution. Interpretation into
/// the status taxonomy belongs to the test runner.
/// 后端执行的原始、未解释结果。解释为状态分类由测试运行器负责。
#[derive(Debug, Clone)]
pub struct RawExecution {
    pub exit_code: i32,
    pub output: String,
    pub timed_out: bool,
    pub duration: Duration,
    /// Contents of the machine-readable report file the harness command was
    /// asked to write, when it survived the run.
    /// 测试命令被要求写入的机器可读报告文件内容（若在运行后仍存在）。
    pub report: Option<String>,
}
