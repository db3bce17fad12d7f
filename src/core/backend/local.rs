//! # Local Backend Module / 本地后端模块
//!
//! Builds environments into a per-fingerprint cache directory and executes
//! test requests as locally isolated process groups. The cache layout is
//!
//! ```text
//! <base_dir>/envs/<repo>/<fingerprint>/
//!     repo/         working copy, reset before every run
//!     setup.sh      rendered setup recipe
//!     fingerprint   marker, written only after a fully successful build
//! ```
//!
//! 将环境构建到按指纹划分的缓存目录，并把测试请求作为本地隔离的进程组执行。

use async_trait::async_trait;
use std::fs;
use std::path::{Path, PathBuf};
use std::time::Duration;

use crate::core::backend::{Backend, KeyedLocks};
use crate::core::catalog::RepoSpec;
use crate::core::config::HarnessConfig;
use crate::core::environment::fingerprint;
use crate::core::errors::{BuildError, ExecutionError};
use crate::core::models::{
    BackendKind, EnvStatus, Environment, ExecutionPayload, RawExecution, TestRequest,
    REPORT_FILENAME,
};
use crate::infra::{command, fs as infra_fs, git};

/// How much of a failed setup log is attached to the build error.
const SETUP_LOG_TAIL: usize = 16 * 1024;

const MARKER_FILE: &str = "fingerprint";
const WORKING_COPY: &str = "repo";

pub struct LocalBackend {
    repos_dir: PathBuf,
    envs_dir: PathBuf,
    logs_dir: PathBuf,
    build_timeout: Duration,
    locks: KeyedLocks,
}

impl LocalBackend {
    pub fn new(config: &HarnessConfig) -> Self {
        Self {
            repos_dir: config.repos_dir(),
            envs_dir: config.envs_dir(),
            logs_dir: config.logs_dir(),
            build_timeout: Duration::from_secs(config.build_timeout_secs),
            locks: KeyedLocks::new(),
        }
    }

    fn env_dir(&self, repo: &str, fp: &str) -> PathBuf {
        self.envs_dir.join(repo).join(fp)
    }

    /// A cache hit is a marker file whose content equals the current
    /// fingerprint. Anything else (absent, unreadable, stale) is a miss.
    fn cached_environment(&self, spec: &RepoSpec, fp: &str) -> Option<Environment> {
        let env_dir = self.env_dir(&spec.name, fp);
        let marker = fs::read_to_string(env_dir.join(MARKER_FILE)).ok()?;
        if marker.trim() != fp {
            return None;
        }
        Some(Environment {
            repo_name: spec.name.clone(),
            fingerprint: fp.to_string(),
            backend: BackendKind::Local,
            location: env_dir.to_string_lossy().into_owned(),
            status: EnvStatus::Ready,
        })
    }

    async fn materialize_working_copy(
        &self,
        spec: &RepoSpec,
        env_dir: &Path,
    ) -> Result<PathBuf, BuildError> {
        let canonical = git::ensure_checkout(
            &self.repos_dir,
            &spec.name,
            &spec.origin,
            &spec.reference_commit,
        )
        .await
        .map_err(|e| BuildError::Checkout {
            repo: spec.name.clone(),
            message: e.to_string(),
        })?;

        fs::create_dir_all(env_dir)?;
        let workdir = env_dir.join(WORKING_COPY);
        git::clone(&canonical.to_string_lossy(), &workdir)
            .await
            .map_err(|e| BuildError::Checkout {
                repo: spec.name.clone(),
                message: e.to_string(),
            })?;
        git::checkout(&workdir, &spec.reference_commit)
            .await
            .map_err(|e| BuildError::Checkout {
                repo: spec.name.clone(),
                message: e.to_string(),
            })?;
        Ok(workdir)
    }

    fn persist_log(&self, category: &str, name: &str, content: &str) {
        let dir = self.logs_dir.join(category);
        // Logs are best-effort; a full disk must not turn into a build error
        // of its own.
        // 日志尽力而为；磁盘写满不应变成一个新的构建错误。
        if fs::create_dir_all(&dir).is_ok() {
            let _ = fs::write(dir.join(format!("{name}.log")), content);
        }
    }

    /// Renders the per-run evaluation script. The tracked tree is reset to
    /// the payload's base commit before any patch applies; the patch goes
    /// through the index, so files it adds are removed again by the next
    /// run's reset. Untracked setup artifacts (virtualenvs, build output)
    /// survive, which is what makes the environment reusable.
    ///
    /// 渲染每次运行的评估脚本。在应用任何补丁前，被跟踪的树会重置到负载的
    /// 基准提交；补丁经过索引应用，因此它新增的文件会被下一次运行的重置移除。
    /// 未跟踪的安装产物（虚拟环境、构建输出）得以保留，这正是环境可复用的原因。
    fn render_eval_script(payload: &ExecutionPayload, patch_file: Option<&Path>) -> String {
        let mut lines = vec![
            "#!/bin/bash".to_string(),
            "set -euxo pipefail".to_string(),
            "echo \"fleet-runner cpus=${FLEET_CPUS:-unrestricted}\"".to_string(),
            format!("git reset --hard {}", payload.reset_to),
            format!("rm -f {REPORT_FILENAME}"),
        ];
        if let Some(patch) = patch_file {
            lines.push(format!(
                "git apply --index --whitespace=nowarn \"{}\"",
                patch.display()
            ));
        }
        lines.push(payload.command.clone());
        lines.join("\n") + "\n"
    }
}

#[async_trait]
impl Backend for LocalBackend {
    fn kind(&self) -> BackendKind {
        BackendKind::Local
    }

    async fn build(&self, spec: &RepoSpec, rebuild: bool) -> Result<Environment, BuildError> {
        let fp = fingerprint(spec);
        let key = format!("{}:{}", self.kind(), spec.name);
        // Single-flight per repository: a second builder for the same key
        // waits here, then sees the first builder's marker as a cache hit.
        // 按仓库单飞：同键的第二个构建者在此等待，随后将第一个构建者的标记视为缓存命中。
        let _guard = self.locks.acquire(&key).await;

        if !rebuild {
            if let Some(env) = self.cached_environment(spec, &fp) {
                return Ok(env);
            }
        }

        // A fingerprint change or an explicit rebuild invalidates every
        // prior environment of this repository, not just the current one.
        // 指纹变化或显式重建会使该仓库之前的所有环境失效，而不只是当前这个。
        infra_fs::remove_dir_if_exists(&self.envs_dir.join(&spec.name))?;

        let env_dir = self.env_dir(&spec.name, &fp);
        let workdir = match self.materialize_working_copy(spec, &env_dir).await {
            Ok(workdir) => workdir,
            Err(e) => {
                let _ = infra_fs::remove_dir_if_exists(&env_dir);
                return Err(e);
            }
        };

        let script_path = env_dir.join("setup.sh");
        infra_fs::atomic_write(&script_path, &spec.setup_script())?;

        let outcome = command::run_with_deadline(
            command::script_command(&script_path, None),
            &workdir,
            Some(self.build_timeout),
        )
        .await?;

        self.persist_log("build", &spec.name, &outcome.output);

        if outcome.timed_out {
            let _ = infra_fs::remove_dir_if_exists(&env_dir);
            return Err(BuildError::DeadlineExceeded(self.build_timeout.as_secs()));
        }
        if outcome.exit_code != 0 {
            // Failed environments move out of the cache tree entirely: a
            // post-mortem copy under logs/, nothing left under envs/ that a
            // later build could mistake for a hit.
            // 失败的环境完全移出缓存树：logs/ 下保留事后检查副本，
            // envs/ 下不留下任何可能被后续构建误认为命中的内容。
            let failed_dir = self.logs_dir.join("failed").join(&spec.name);
            let _ = infra_fs::remove_dir_if_exists(&failed_dir);
            if fs::create_dir_all(&failed_dir).is_ok() {
                let _ = infra_fs::copy_dir_all(&env_dir, &failed_dir);
            }
            let _ = infra_fs::remove_dir_if_exists(&env_dir);
            return Err(BuildError::RecipeFailed {
                repo: spec.name.clone(),
                exit_code: outcome.exit_code,
                logs: command::bounded_tail(&outcome.output, SETUP_LOG_TAIL),
            });
        }

        infra_fs::atomic_write(&env_dir.join(MARKER_FILE), &fp)?;

        Ok(Environment {
            repo_name: spec.name.clone(),
            fingerprint: fp,
            backend: BackendKind::Local,
            location: env_dir.to_string_lossy().into_owned(),
            status: EnvStatus::Ready,
        })
    }

    async fn execute(
        &self,
        env: &Environment,
        request: &TestRequest,
        payload: &ExecutionPayload,
    ) -> Result<RawExecution, ExecutionError> {
        let env_dir = PathBuf::from(&env.location);
        let workdir = env_dir.join(WORKING_COPY);
        if !workdir.is_dir() {
            return Err(ExecutionError::Harness(format!(
                "environment working copy missing at {}; rebuild the environment",
                workdir.display()
            )));
        }

        let patch_file = match &payload.patch {
            Some(patch) => {
                let path = env_dir.join("sync.patch");
                infra_fs::atomic_write(&path, patch)
                    .map_err(|e| ExecutionError::Infrastructure(e.to_string()))?;
                Some(path)
            }
            None => None,
        };

        let script_path = env_dir.join("eval.sh");
        let script = Self::render_eval_script(payload, patch_file.as_deref());
        infra_fs::atomic_write(&script_path, &script)
            .map_err(|e| ExecutionError::Infrastructure(e.to_string()))?;

        let outcome = command::run_with_deadline(
            command::script_command(&script_path, Some(request.cpu_budget)),
            &workdir,
            Some(Duration::from_secs(request.timeout_secs)),
        )
        .await
        .map_err(|e| ExecutionError::Infrastructure(e.to_string()))?;

        let log_name = match &request.branch {
            Some(branch) => format!("{}@{}", request.repo_name, branch.replace('/', "-")),
            None => format!("{}@reference", request.repo_name),
        };
        self.persist_log("test", &log_name, &outcome.output);

        let report_path = workdir.join(REPORT_FILENAME);
        let report = fs::read_to_string(&report_path).ok();
        let _ = fs::remove_file(&report_path);

        Ok(RawExecution {
            exit_code: outcome.exit_code,
            output: outcome.output,
            timed_out: outcome.timed_out,
            duration: outcome.duration,
            report,
        })
    }
}
