//! # Execution Backend Module / 执行后端模块
//!
//! One logical operation set (build an environment, execute a test request
//! inside it) over two substrates: locally managed isolated processes, or a
//! remote distributed execution service. Callers are backend-agnostic; both
//! variants expose identical semantics.
//!
//! 一组逻辑操作（构建环境、在其中执行测试请求）
//! 覆盖两种基底：本地管理的隔离进程，或远程分布式执行服务。
//! 调用方与后端无关；两种变体暴露完全相同的语义。

use async_trait::async_trait;
use std::collections::HashMap;
use std::sync::Arc;

use crate::core::catalog::RepoSpec;
use crate::core::config::HarnessConfig;
use crate::core::errors::{BuildError, ExecutionError};
use crate::core::models::{
    BackendKind, Environment, ExecutionPayload, RawExecution, TestRequest,
};

pub mod local;
pub mod remote;

pub use self::local::LocalBackend;
pub use self::remote::RemoteBackend;

/// The execution substrate contract.
///
/// `build` is idempotent for an unchanged fingerprint and must never
/// duplicate work for concurrent calls on the same repository. `execute`
/// enforces the request's deadline by hard-terminating the underlying
/// process group (or remote run) and enforces the CPU budget as a ceiling.
///
/// 执行基底契约。
/// 对未变化的指纹，`build` 是幂等的，并且对同一仓库的并发调用绝不重复工作。
/// `execute` 通过硬性终止底层进程组（或远程运行）来强制执行请求的期限，
/// 并将 CPU 预算作为上限强制执行。
#[async_trait]
pub trait Backend: Send + Sync {
    fn kind(&self) -> BackendKind;

    /// Returns a Ready environment for the repository, building it if the
    /// cache holds nothing for the current fingerprint. With `rebuild` the
    /// cached environment is discarded first. Failed builds are never
    /// cached; a later attempt starts clean.
    async fn build(&self, spec: &RepoSpec, rebuild: bool) -> Result<Environment, BuildError>;

    /// Runs the payload inside a Ready environment under the request's
    /// timeout and CPU budget, returning the raw captured outcome.
    /// Interpreting it into the status taxonomy is the test runner's job.
    async fn execute(
        &self,
        env: &Environment,
        request: &TestRequest,
        payload: &ExecutionPayload,
    ) -> Result<RawExecution, ExecutionError>;
}

/// Constructs the backend the configuration selects.
pub fn create_backend(config: &HarnessConfig) -> Arc<dyn Backend> {
    match config.backend {
        BackendKind::Local => Arc::new(LocalBackend::new(config)),
        BackendKind::Distributed => Arc::new(RemoteBackend::new(config)),
    }
}

/// Key-scoped mutual exclusion: at most one holder per key, while unrelated
/// keys never contend. The outer map lock is held only long enough to fetch
/// or insert the per-key lock, so a long build on one repository cannot
/// block another repository's builder.
///
/// 键作用域互斥：每个键最多一个持有者，而不相关的键从不竞争。
/// 外层映射锁只在获取或插入每键锁的瞬间持有，
/// 因此一个仓库的长构建不会阻塞另一个仓库的构建者。
#[derive(Default)]
pub struct KeyedLocks {
    locks: tokio::sync::Mutex<HashMap<String, Arc<tokio::sync::Mutex<()>>>>,
}

impl KeyedLocks {
    pub fn new() -> Self {
        Self::default()
    }

    /// Acquires the lock for `key`, creating it on first use. The returned
    /// guard keeps the key locked until dropped.
    pub async fn acquire(&self, key: &str) -> tokio::sync::OwnedMutexGuard<()> {
        let entry = {
            let mut locks = self.locks.lock().await;
            Arc::clone(
                locks
                    .entry(key.to_string())
                    .or_insert_with(|| Arc::new(tokio::sync::Mutex::new(()))),
            )
        };
        entry.lock_owned().await
    }
}
