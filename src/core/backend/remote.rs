//! # Distributed Backend Module / 分布式后端模块
//!
//! Dispatches the same logical build and execute operations to a remote
//! execution service over HTTP and polls for completion. The service owns
//! environment storage and timeout enforcement; this side keeps only
//! ephemeral request bookkeeping and never touches the local cache.
//!
//! Dispatch endpoints (all JSON):
//!
//! - `POST /api/environments`: submit a build, idempotent per fingerprint
//! - `GET  /api/environments/{id}`: poll build status
//! - `POST /api/runs`: submit a test run against a ready environment
//! - `GET  /api/runs/{id}`: poll run status
//!
//! Connection-level failures are retried a fixed small number of times;
//! well-formed failure responses are surfaced immediately.
//!
//! 通过 HTTP 将相同的逻辑构建和执行操作派发到远程执行服务并轮询完成。
//! 连接层故障重试固定的少量次数；格式正确的失败响应立即上报。

use async_trait::async_trait;
use serde::{Deserialize, Serialize};
use std::time::{Duration, Instant};
use tokio_stream::wrappers::IntervalStream;
use tokio_stream::StreamExt;

use crate::core::backend::{Backend, KeyedLocks};
use crate::core::catalog::RepoSpec;
use crate::core::config::HarnessConfig;
use crate::core::environment::fingerprint;
use crate::core::errors::{BuildError, ExecutionError};
use crate::core::models::{
    BackendKind, EnvStatus, Environment, ExecutionPayload, RawExecution, TestRequest,
};

/// Extra polling slack past the request's own timeout before the run is
/// declared lost on the service side.
const RUN_POLL_GRACE: Duration = Duration::from_secs(60);

pub struct RemoteBackend {
    client: reqwest::Client,
    endpoint: String,
    poll_interval: Duration,
    max_retries: u32,
    build_timeout: Duration,
    locks: KeyedLocks,
}

#[derive(Debug, Serialize)]
struct EnvBuildRequest<'a> {
    repo: &'a str,
    fingerprint: &'a str,
    origin: &'a str,
    reference_commit: &'a str,
    setup_script: String,
    rebuild: bool,
}

#[derive(Debug, Deserialize)]
struct EnvBuildResponse {
    id: String,
}

#[derive(Debug, Deserialize)]
struct EnvStatusResponse {
    status: String,
    #[serde(default)]
    logs: Option<String>,
}

#[derive(Debug, Serialize)]
struct RunSubmitRequest<'a> {
    environment_id: &'a str,
    reset_to: &'a str,
    #[serde(skip_serializing_if = "Option::is_none")]
    patch: Option<&'a str>,
    command: &'a str,
    timeout_secs: u64,
    cpus: usize,
}

#[derive(Debug, Deserialize)]
struct RunSubmitResponse {
    id: String,
}

#[derive(Debug, Deserialize)]
struct RunStatusResponse {
    status: String,
    #[serde(default)]
    exit_code: Option<i32>,
    #[serde(default)]
    output: Option<String>,
    #[serde(default)]
    timed_out: bool,
    #[serde(default)]
    duration_secs: Option<f64>,
    #[serde(default)]
    report: Option<String>,
}

impl RemoteBackend {
    pub fn new(config: &HarnessConfig) -> Self {
        Self {
            client: reqwest::Client::new(),
            endpoint: config.remote.endpoint.trim_end_matches('/').to_string(),
            poll_interval: Duration::from_secs(config.remote.poll_interval_secs.max(1)),
            max_retries: config.remote.max_retries,
            build_timeout: Duration::from_secs(config.build_timeout_secs),
            locks: KeyedLocks::new(),
        }
    }

    fn url(&self, path: &str) -> String {
        format!("{}{}", self.endpoint, path)
    }

    /// Sends a request, retrying connection-level failures with a linear
    /// backoff. Any response the service actually produced, success or
    /// failure, ends the retry loop.
    async fn send_with_retry(
        &self,
        builder: reqwest::RequestBuilder,
    ) -> Result<reqwest::Response, String> {
        let mut attempt = 0;
        loop {
            let request = builder
                .try_clone()
                .ok_or_else(|| "request cannot be retried".to_string())?;
            match request.send().await {
                Ok(response) => return Ok(response),
                Err(e) if (e.is_connect() || e.is_timeout()) && attempt < self.max_retries => {
                    attempt += 1;
                    tokio::time::sleep(self.poll_interval * attempt).await;
                }
                Err(e) => return Err(e.to_string()),
            }
        }
    }

    async fn poll_environment(&self, id: &str) -> Result<EnvStatusResponse, String> {
        let response = self
            .send_with_retry(self.client.get(self.url(&format!("/api/environments/{id}"))))
            .await?;
        if !response.status().is_success() {
            return Err(format!("environment poll returned {}", response.status()));
        }
        response.json().await.map_err(|e| e.to_string())
    }

    async fn poll_run(&self, id: &str) -> Result<RunStatusResponse, ExecutionError> {
        let response = self
            .send_with_retry(self.client.get(self.url(&format!("/api/runs/{id}"))))
            .await
            .map_err(ExecutionError::Infrastructure)?;
        let status = response.status();
        if status.is_server_error() {
            return Err(ExecutionError::Infrastructure(format!(
                "run poll returned {status}"
            )));
        }
        if !status.is_success() {
            return Err(ExecutionError::Harness(format!(
                "run poll returned {status}"
            )));
        }
        response
            .json()
            .await
            .map_err(|e| ExecutionError::Infrastructure(e.to_string()))
    }
}

#[async_trait]
impl Backend for RemoteBackend {
    fn kind(&self) -> BackendKind {
        BackendKind::Distributed
    }

    async fn build(&self, spec: &RepoSpec, rebuild: bool) -> Result<Environment, BuildError> {
        let fp = fingerprint(spec);
        let key = format!("{}:{}", self.kind(), spec.name);
        // One dispatch in flight per repository; the service additionally
        // dedups by fingerprint, making the submit idempotent.
        // 每个仓库同时只有一个派发；服务端还按指纹去重，使提交具有幂等性。
        let _guard = self.locks.acquire(&key).await;

        let body = EnvBuildRequest {
            repo: &spec.name,
            fingerprint: &fp,
            origin: &spec.origin,
            reference_commit: &spec.reference_commit,
            setup_script: spec.setup_script(),
            rebuild,
        };
        let response = self
            .send_with_retry(self.client.post(self.url("/api/environments")).json(&body))
            .await
            .map_err(BuildError::Dispatch)?;
        if !response.status().is_success() {
            return Err(BuildError::Dispatch(format!(
                "build submit returned {}",
                response.status()
            )));
        }
        let submitted: EnvBuildResponse = response
            .json()
            .await
            .map_err(|e| BuildError::Dispatch(e.to_string()))?;

        let deadline = Instant::now() + self.build_timeout;
        let mut polls = IntervalStream::new(tokio::time::interval(self.poll_interval));
        while (polls.next().await).is_some() {
            if Instant::now() > deadline {
                return Err(BuildError::DeadlineExceeded(self.build_timeout.as_secs()));
            }
            let status = self
                .poll_environment(&submitted.id)
                .await
                .map_err(BuildError::Dispatch)?;
            match status.status.as_str() {
                "ready" => {
                    return Ok(Environment {
                        repo_name: spec.name.clone(),
                        fingerprint: fp,
                        backend: BackendKind::Distributed,
                        location: submitted.id.clone(),
                        status: EnvStatus::Ready,
                    });
                }
                // A recipe failure reported by the service is final; only
                // transport faults are retryable.
                // 服务端报告的配方失败是最终结果；只有传输故障可重试。
                "failed" => {
                    return Err(BuildError::RecipeFailed {
                        repo: spec.name.clone(),
                        exit_code: 1,
                        logs: status.logs.unwrap_or_default(),
                    });
                }
                _ => {}
            }
        }
        Err(BuildError::DeadlineExceeded(self.build_timeout.as_secs()))
    }

    async fn execute(
        &self,
        env: &Environment,
        request: &TestRequest,
        payload: &ExecutionPayload,
    ) -> Result<RawExecution, ExecutionError> {
        let body = RunSubmitRequest {
            environment_id: &env.location,
            reset_to: &payload.reset_to,
            patch: payload.patch.as_deref(),
            command: &payload.command,
            timeout_secs: request.timeout_secs,
            cpus: request.cpu_budget,
        };
        let response = self
            .send_with_retry(self.client.post(self.url("/api/runs")).json(&body))
            .await
            .map_err(ExecutionError::Infrastructure)?;
        let status = response.status();
        if status.is_server_error() {
            return Err(ExecutionError::Infrastructure(format!(
                "run submit returned {status}"
            )));
        }
        if !status.is_success() {
            return Err(ExecutionError::Harness(format!(
                "run submit returned {status}"
            )));
        }
        let submitted: RunSubmitResponse = response
            .json()
            .await
            .map_err(|e| ExecutionError::Infrastructure(e.to_string()))?;

        // The service enforces the request's own timeout; the grace window
        // only catches a run the service lost track of.
        // 服务端强制执行请求自身的超时；宽限窗口只用于捕获服务端丢失的运行。
        let deadline =
            Instant::now() + Duration::from_secs(request.timeout_secs) + RUN_POLL_GRACE;
        let started = Instant::now();
        let mut polls = IntervalStream::new(tokio::time::interval(self.poll_interval));
        while (polls.next().await).is_some() {
            if Instant::now() > deadline {
                return Err(ExecutionError::Infrastructure(format!(
                    "remote run {} did not reach a terminal state",
                    submitted.id
                )));
            }
            let run = self.poll_run(&submitted.id).await?;
            if run.status == "finished" {
                return Ok(RawExecution {
                    exit_code: run.exit_code.unwrap_or(-1),
                    output: run.output.unwrap_or_default(),
                    timed_out: run.timed_out,
                    duration: run
                        .duration_secs
                        .map(Duration::from_secs_f64)
                        .unwrap_or_else(|| started.elapsed()),
                    report: run.report,
                });
            }
        }
        Err(ExecutionError::Infrastructure(format!(
            "remote run {} polling ended unexpectedly",
            submitted.id
        )))
    }
}
