//! # Branch Synchronization Module / 分支同步模块
//!
//! Materializes a branch's file-level differences from the reference commit
//! as a patch that backends apply inside the ephemeral environment copy just
//! before tests run. The canonical checkout only ever serves reads here
//! (resolution and diffing) and is never mutated.
//!
//! 将分支与参考提交的文件级差异物化为补丁，由后端在测试运行前
//! 应用到临时环境副本中。规范检出在此只承担读取（解析和 diff），
//! 从不被修改。

use std::path::PathBuf;

use crate::core::catalog::RepoSpec;
use crate::core::errors::SyncError;
use crate::core::models::TestRequest;
use crate::infra::{fs as infra_fs, git};

/// Everything a backend needs to reproduce the requested source state:
/// the commit to reset to and, for branch runs, the diff on top of it.
/// Replaying the same plan against a freshly built environment reproduces
/// the same tree.
///
/// 后端复现请求源码状态所需的一切：要重置到的提交，以及分支运行时
/// 叠加其上的 diff。对新构建的环境重放同一计划会复现相同的树。
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct SyncPlan {
    pub reset_to: String,
    pub patch: Option<String>,
}

impl SyncPlan {
    /// The grading-baseline plan: the environment is used exactly as built.
    pub fn reference(spec: &RepoSpec) -> Self {
        Self {
            reset_to: spec.reference_commit.clone(),
            patch: None,
        }
    }
}

#[derive(Debug, Clone)]
pub struct BranchSynchronizer {
    repos_dir: PathBuf,
}

impl BranchSynchronizer {
    pub fn new(repos_dir: PathBuf) -> Self {
        Self { repos_dir }
    }

    /// Computes the synchronization plan for a request.
    ///
    /// Reference requests (or requests naming no branch) skip
    /// synchronization entirely. Branch requests resolve the branch tip in
    /// the canonical checkout, diff it against the reference commit, and
    /// verify the patch applies cleanly onto the reference tree.
    pub async fn plan(
        &self,
        spec: &RepoSpec,
        request: &TestRequest,
    ) -> Result<SyncPlan, SyncError> {
        let branch = match (&request.branch, request.use_reference) {
            (_, true) | (None, _) => return Ok(SyncPlan::reference(spec)),
            (Some(branch), false) => branch,
        };

        let repo_dir = self.repos_dir.join(&spec.name);
        if !infra_fs::is_directory(&repo_dir) {
            return Err(SyncError::DiffFailed {
                repo: spec.name.clone(),
                message: format!(
                    "canonical checkout missing at {}; run `build` first",
                    repo_dir.display()
                ),
            });
        }

        let tip = git::rev_parse(&repo_dir, branch).await.map_err(|_| {
            SyncError::UnknownBranch {
                repo: spec.name.clone(),
                branch: branch.clone(),
            }
        })?;

        let patch = git::diff(&repo_dir, &spec.reference_commit, &tip)
            .await
            .map_err(|e| SyncError::DiffFailed {
                repo: spec.name.clone(),
                message: e.to_string(),
            })?;

        if patch.is_empty() {
            // The branch tip matches the reference tree byte for byte.
            // 分支顶端与参考树逐字节一致。
            return Ok(SyncPlan::reference(spec));
        }

        git::apply_check_at(&repo_dir, &spec.reference_commit, &patch)
            .await
            .map_err(|e| SyncError::PatchUnapplicable {
                branch: branch.clone(),
                message: e.to_string(),
            })?;

        Ok(SyncPlan {
            reset_to: spec.reference_commit.clone(),
            patch: Some(patch),
        })
    }
}
