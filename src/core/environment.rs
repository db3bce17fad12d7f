//! # Environment Lifecycle Module / 环境生命周期模块
//!
//! Computes content-addressed fingerprints for setup recipes and drives the
//! backend's build/cache/rebuild cycle. Fingerprint equality is the sole
//! cache-hit criterion; wall-clock age plays no part.
//!
//! 为安装配方计算内容寻址指纹，并驱动后端的构建/缓存/重建周期。
//! 指纹相等是唯一的缓存命中标准；墙钟时间不参与。

use sha2::{Digest, Sha256};
use std::sync::Arc;

use crate::core::backend::Backend;
use crate::core::catalog::RepoSpec;
use crate::core::errors::BuildError;
use crate::core::models::Environment;

/// 22 hex characters of a SHA-256 digest are still very likely unique
/// across any realistic catalog while staying readable in paths and logs.
/// SHA-256 摘要的 22 个十六进制字符在任何现实目录规模下几乎必然唯一，
/// 同时在路径和日志中保持可读。
const FINGERPRINT_LEN: usize = 22;

/// Content hash of the repository's rendered setup script. Any edit to the
/// recipe, the origin or the reference commit yields a new fingerprint and
/// therefore a fresh environment.
///
/// 仓库渲染后安装脚本的内容哈希。对配方、来源或参考提交的任何修改
/// 都会产生新指纹，从而产生新环境。
pub fn fingerprint(spec: &RepoSpec) -> String {
    let mut hasher = Sha256::new();
    hasher.update(spec.setup_script().as_bytes());
    let digest = hex::encode(hasher.finalize());
    digest[..FINGERPRINT_LEN].to_string()
}

/// Drives a backend to produce Ready environments.
/// 驱动后端产出就绪环境。
#[derive(Clone)]
pub struct EnvironmentBuilder {
    backend: Arc<dyn Backend>,
}

impl EnvironmentBuilder {
    pub fn new(backend: Arc<dyn Backend>) -> Self {
        Self { backend }
    }

    /// Returns a Ready environment for the repository. A cache hit returns
    /// without re-running the recipe; `rebuild` discards the cache first.
    /// A partially built environment is never handed out as Ready.
    pub async fn build(&self, spec: &RepoSpec, rebuild: bool) -> Result<Environment, BuildError> {
        let env = self.backend.build(spec, rebuild).await?;
        if !env.is_ready() {
            return Err(BuildError::Checkout {
                repo: spec.name.clone(),
                message: format!("backend returned a non-ready environment ({:?})", env.status),
            });
        }
        Ok(env)
    }
}
