use anyhow::{Context, Result};
use serde::{Deserialize, Serialize};
use std::fs;
use std::path::{Path, PathBuf};

use crate::core::models::BackendKind;
use crate::infra::t;

/// Connection settings for the distributed execution service.
/// 分布式执行服务的连接设置。
#[derive(Debug, Clone, Deserialize, Serialize)]
pub struct RemoteConfig {
    /// Base URL of the execution service API.
    /// 执行服务 API 的基础 URL。
    #[serde(default = "default_endpoint")]
    pub endpoint: String,
    /// Seconds between status polls for dispatched builds and runs.
    /// 已派发构建和运行的状态轮询间隔（秒）。
    #[serde(default = "default_poll_interval")]
    pub poll_interval_secs: u64,
    /// How many times a transport-level failure is retried before the
    /// request is surfaced as failed. Well-formed failure responses are
    /// never retried.
    /// 传输层故障在请求被判定失败前的重试次数。格式正确的失败响应从不重试。
    #[serde(default = "default_max_retries")]
    pub max_retries: u32,
}

impl Default for RemoteConfig {
    fn default() -> Self {
        Self {
            endpoint: default_endpoint(),
            poll_interval_secs: default_poll_interval(),
            max_retries: default_max_retries(),
        }
    }
}

/// The harness configuration, loaded once from a TOML file at startup and
/// never mutated afterwards. Threaded explicitly into the components that
/// need it so independent harnesses can coexist in one process.
///
/// 工具配置，启动时从 TOML 文件加载一次，之后不再修改。
/// 显式传入需要它的组件，使独立配置的工具实例可以共存于同一进程。
#[derive(Debug, Clone, Deserialize, Serialize)]
pub struct HarnessConfig {
    /// The language for the runner's output messages (e.g., "en", "zh-CN").
    /// 输出消息的语言（例如 "en", "zh-CN"）。
    #[serde(default = "default_language")]
    pub language: String,

    /// Which execution substrate serves builds and test runs.
    /// 哪个执行基底承载构建和测试运行。
    #[serde(default)]
    pub backend: BackendKind,

    /// Directory holding canonical checkouts, the environment cache and
    /// captured logs. Tilde-expanded.
    /// 存放规范检出、环境缓存和捕获日志的目录。支持波浪号展开。
    #[serde(default = "default_base_dir")]
    pub base_dir: String,

    /// Path of the repository catalog file. Tilde-expanded.
    /// 仓库目录文件的路径。支持波浪号展开。
    #[serde(default = "default_catalog")]
    pub catalog: String,

    /// Default width of the orchestrator worker pool.
    /// 编排器工作池的默认宽度。
    #[serde(default = "default_workers")]
    pub workers: usize,

    /// Deadline for a single environment build, in seconds.
    /// 单次环境构建的期限（秒）。
    #[serde(default = "default_build_timeout")]
    pub build_timeout_secs: u64,

    #[serde(default)]
    pub remote: RemoteConfig,
}

impl Default for HarnessConfig {
    fn default() -> Self {
        Self {
            language: default_language(),
            backend: BackendKind::Local,
            base_dir: default_base_dir(),
            catalog: default_catalog(),
            workers: default_workers(),
            build_timeout_secs: default_build_timeout(),
            remote: RemoteConfig::default(),
        }
    }
}

impl HarnessConfig {
    /// Loads and parses the configuration file.
    pub fn load(path: &Path) -> Result<Self> {
        let content = fs::read_to_string(path).with_context(|| {
            t!("config_read_failed_path", path = path.display()).to_string()
        })?;
        let config: HarnessConfig =
            toml::from_str(&content).with_context(|| t!("config_parse_failed").to_string())?;
        Ok(config)
    }

    pub fn base_dir(&self) -> PathBuf {
        PathBuf::from(shellexpand::tilde(&self.base_dir).into_owned())
    }

    pub fn catalog_path(&self) -> PathBuf {
        PathBuf::from(shellexpand::tilde(&self.catalog).into_owned())
    }

    /// Canonical, never-mutated checkouts used for fingerprinting and diffs.
    pub fn repos_dir(&self) -> PathBuf {
        self.base_dir().join("repos")
    }

    /// Per-fingerprint environment cache of the local backend.
    pub fn envs_dir(&self) -> PathBuf {
        self.base_dir().join("envs")
    }

    /// Captured build and test logs.
    pub fn logs_dir(&self) -> PathBuf {
        self.base_dir().join("logs")
    }
}

fn default_language() -> String {
    "en".to_string()
}

fn default_base_dir() -> String {
    "fleet".to_string()
}

fn default_catalog() -> String {
    "Catalog.toml".to_string()
}

fn default_workers() -> usize {
    num_cpus::get() / 2 + 1
}

fn default_build_timeout() -> u64 {
    3600
}

fn default_endpoint() -> String {
    "http://localhost:9410".to_string()
}

fn default_poll_interval() -> u64 {
    2
}

fn default_max_retries() -> u32 {
    3
}
