//! # Git Plumbing Module / Git 底层模块
//!
//! Thin async wrappers over the `git` CLI, used for canonical checkouts,
//! branch resolution and diff computation. The harness never links a git
//! library; the system binary is the contract, as it is for the repositories
//! under test themselves.
//!
//! 对 `git` 命令行的轻量异步封装，用于规范检出、分支解析和 diff 计算。

use std::path::{Path, PathBuf};
use std::process::Stdio;
use thiserror::Error;
use tokio::io::AsyncWriteExt;
use tokio::process::Command;

use crate::infra::command::spawn_and_capture;

#[derive(Error, Debug)]
pub enum GitError {
    #[error("git {command} failed: {output}")]
    Command { command: String, output: String },

    #[error(transparent)]
    Io(#[from] std::io::Error),
}

async fn git(dir: Option<&Path>, args: &[&str]) -> Result<String, GitError> {
    let mut cmd = Command::new("git");
    if let Some(dir) = dir {
        cmd.current_dir(dir);
    }
    cmd.args(args);
    let (status, output) = spawn_and_capture(cmd).await;
    let status = status?;
    if !status.success() {
        return Err(GitError::Command {
            command: args.join(" "),
            output,
        });
    }
    Ok(output)
}

pub async fn clone(origin: &str, dest: &Path) -> Result<(), GitError> {
    git(None, &["clone", origin, &dest.to_string_lossy()]).await?;
    Ok(())
}

pub async fn checkout(dir: &Path, rev: &str) -> Result<(), GitError> {
    git(Some(dir), &["checkout", "--detach", rev]).await?;
    Ok(())
}

/// Resolves a revision to a full commit hash. Fails for unknown branches.
pub async fn rev_parse(dir: &Path, rev: &str) -> Result<String, GitError> {
    let verify = format!("{rev}^{{commit}}");
    let output = git(Some(dir), &["rev-parse", "--verify", "--quiet", &verify]).await?;
    Ok(output.trim().to_string())
}

/// Unified, binary-safe diff from `from` to `to`.
pub async fn diff(dir: &Path, from: &str, to: &str) -> Result<String, GitError> {
    git(Some(dir), &["diff", "--binary", from, to]).await
}

/// Verifies the patch would apply cleanly onto the current tree without
/// touching it.
pub async fn apply_check(dir: &Path, patch: &str) -> Result<(), GitError> {
    let mut cmd = Command::new("git");
    cmd.current_dir(dir)
        .args(["apply", "--check", "--whitespace=nowarn", "-"])
        .stdin(Stdio::piped())
        .stdout(Stdio::piped())
        .stderr(Stdio::piped());
    let mut child = cmd.spawn()?;
    if let Some(mut stdin) = child.stdin.take() {
        stdin.write_all(patch.as_bytes()).await?;
        // Dropping stdin closes the pipe so git sees EOF.
        // 丢弃 stdin 关闭管道，使 git 看到 EOF。
    }
    let out = child.wait_with_output().await?;
    if !out.status.success() {
        return Err(GitError::Command {
            command: "apply --check".to_string(),
            output: format!(
                "{}{}",
                String::from_utf8_lossy(&out.stdout),
                String::from_utf8_lossy(&out.stderr)
            ),
        });
    }
    Ok(())
}

/// Verifies the patch applies cleanly onto the tree at `rev`, using a
/// throwaway worktree so the repository's own working tree is never
/// consulted or touched.
///
/// 使用一次性工作树验证补丁能干净地应用到 `rev` 处的树上，
/// 仓库自身的工作树不被读取也不被改动。
pub async fn apply_check_at(dir: &Path, rev: &str, patch: &str) -> Result<(), GitError> {
    let staging = tempfile::tempdir()?;
    let worktree = staging.path().join("worktree");
    let worktree_str = worktree.to_string_lossy().into_owned();
    git(Some(dir), &["worktree", "add", "--detach", &worktree_str, rev]).await?;
    let result = apply_check(&worktree, patch).await;
    let _ = git(Some(dir), &["worktree", "remove", "--force", &worktree_str]).await;
    result
}

/// Ensures the canonical checkout for a repository exists under `repos_dir`
/// and actually contains the reference commit. Existing checkouts are left
/// exactly as found; their content is never mutated here.
///
/// 确保仓库的规范检出存在于 `repos_dir` 下且确实包含参考提交。
/// 已存在的检出保持原样；此处从不修改其内容。
pub async fn ensure_checkout(
    repos_dir: &Path,
    name: &str,
    origin: &str,
    reference_commit: &str,
) -> Result<PathBuf, GitError> {
    let dir = repos_dir.join(name);
    if !dir.exists() {
        std::fs::create_dir_all(repos_dir)?;
        clone(origin, &dir).await?;
    }
    rev_parse(&dir, reference_commit).await?;
    Ok(dir)
}
