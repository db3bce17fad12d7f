//! # Parallel Orchestration Module / 并行编排模块
//!
//! A bounded worker pool drives many repositories through the
//! build → synchronize → test pipeline concurrently. One repository's
//! failure never disturbs another's; the pool itself never aborts on a
//! single job.
//!
//! 有界工作池并发驱动多个仓库完成 构建 → 同步 → 测试 流水线。
//! 一个仓库的失败绝不影响另一个；池本身绝不因单个作业而中止。

use futures::{stream, StreamExt};
use std::path::PathBuf;
use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::Arc;
use tokio_util::sync::CancellationToken;

use crate::core::backend::Backend;
use crate::core::catalog::RepoSpec;
use crate::core::environment::EnvironmentBuilder;
use crate::core::errors::{ExecutionError, JobError};
use crate::core::models::{Environment, JobState, ProgressSnapshot, TestRequest, TestResult};
use crate::core::runner::TestRunner;
use crate::core::sync::BranchSynchronizer;

/// One repository's unit of work: the catalog entry plus the request the
/// pipeline serves. Destroyed once folded into a report.
/// 单个仓库的工作单元：目录条目加上流水线服务的请求。折叠进报告后销毁。
#[derive(Debug, Clone)]
pub struct BuildJob {
    pub spec: RepoSpec,
    pub request: TestRequest,
}

/// Terminal outcome of one job's pipeline.
/// 单个作业流水线的最终结果。
#[derive(Debug)]
pub struct JobOutcome {
    pub repo_name: String,
    pub result: Result<TestResult, JobError>,
}

/// Terminal outcome of a build-only job.
/// 仅构建作业的最终结果。
#[derive(Debug)]
pub struct BuildOutcome {
    pub repo_name: String,
    pub result: Result<Environment, JobError>,
}

/// Lock-free live counts of job states. Workers bump counters as they move
/// through the pipeline; observers read a consistent-enough snapshot at any
/// time without taking any lock.
///
/// 作业状态的无锁实时计数。工作者在流水线中推进时更新计数器；
/// 观察者随时读取快照而无需任何锁。
#[derive(Debug, Default)]
pub struct Progress {
    queued: AtomicUsize,
    building: AtomicUsize,
    testing: AtomicUsize,
    done: AtomicUsize,
    errored: AtomicUsize,
}

impl Progress {
    fn counter(&self, state: JobState) -> &AtomicUsize {
        match state {
            JobState::Queued => &self.queued,
            JobState::Building => &self.building,
            JobState::Testing => &self.testing,
            JobState::Done => &self.done,
            JobState::Errored => &self.errored,
        }
    }

    fn enqueue(&self, count: usize) {
        self.queued.fetch_add(count, Ordering::Relaxed);
    }

    fn transition(&self, from: JobState, to: JobState) {
        self.counter(from).fetch_sub(1, Ordering::Relaxed);
        self.counter(to).fetch_add(1, Ordering::Relaxed);
    }

    pub fn snapshot(&self) -> ProgressSnapshot {
        ProgressSnapshot {
            queued: self.queued.load(Ordering::Relaxed),
            building: self.building.load(Ordering::Relaxed),
            testing: self.testing.load(Ordering::Relaxed),
            done: self.done.load(Ordering::Relaxed),
            errored: self.errored.load(Ordering::Relaxed),
        }
    }
}

/// The bounded worker pool. Width 1 degrades to strictly sequential
/// execution; whatever the width, no more than `workers` repositories are
/// in flight at once.
///
/// 有界工作池。宽度为 1 时退化为严格顺序执行；
/// 无论宽度多少，同时在途的仓库不超过 `workers` 个。
pub struct ParallelOrchestrator {
    builder: EnvironmentBuilder,
    synchronizer: BranchSynchronizer,
    runner: TestRunner,
    workers: usize,
    progress: Arc<Progress>,
    cancel: CancellationToken,
}

impl ParallelOrchestrator {
    pub fn new(
        backend: Arc<dyn Backend>,
        repos_dir: PathBuf,
        workers: usize,
        cancel: CancellationToken,
    ) -> Self {
        Self {
            builder: EnvironmentBuilder::new(Arc::clone(&backend)),
            synchronizer: BranchSynchronizer::new(repos_dir),
            runner: TestRunner::new(backend),
            workers: workers.max(1),
            progress: Arc::new(Progress::default()),
            cancel,
        }
    }

    /// Live progress handle for external reporting.
    pub fn progress(&self) -> Arc<Progress> {
        Arc::clone(&self.progress)
    }

    /// Drives every job through the full pipeline and returns one outcome
    /// per job, in completion order.
    pub async fn run(&self, jobs: Vec<BuildJob>) -> Vec<JobOutcome> {
        self.progress.enqueue(jobs.len());
        let pipelines = jobs.into_iter().map(|job| {
            let builder = self.builder.clone();
            let synchronizer = self.synchronizer.clone();
            let runner = self.runner.clone();
            let progress = Arc::clone(&self.progress);
            let cancel = self.cancel.clone();
            let repo_name = job.spec.name.clone();
            async move {
                // Spawned on first poll, so the pool width caps how many
                // pipelines exist at once.
                // 在首次轮询时派生，因此池宽度限制同时存在的流水线数量。
                let handle = tokio::spawn(run_pipeline(
                    builder,
                    synchronizer,
                    runner,
                    progress,
                    cancel,
                    job,
                ));
                match handle.await {
                    Ok(outcome) => outcome,
                    Err(e) => JobOutcome {
                        repo_name,
                        result: Err(JobError::Execution(ExecutionError::Infrastructure(
                            format!("worker panicked: {e}"),
                        ))),
                    },
                }
            }
        });

        stream::iter(pipelines)
            .buffer_unordered(self.workers)
            .collect()
            .await
    }

    /// Builds every environment without running tests. Used by the `build`
    /// command to warm the cache for a whole split.
    pub async fn run_builds(&self, specs: Vec<RepoSpec>, rebuild: bool) -> Vec<BuildOutcome> {
        self.progress.enqueue(specs.len());
        let builds = specs.into_iter().map(|spec| {
            let builder = self.builder.clone();
            let progress = Arc::clone(&self.progress);
            let cancel = self.cancel.clone();
            let repo_name = spec.name.clone();
            async move {
                let handle = tokio::spawn(async move {
                    let name = spec.name.clone();
                    if cancel.is_cancelled() {
                        progress.transition(JobState::Queued, JobState::Errored);
                        return BuildOutcome {
                            repo_name: name,
                            result: Err(JobError::Cancelled),
                        };
                    }
                    progress.transition(JobState::Queued, JobState::Building);
                    let result = tokio::select! {
                        biased;
                        _ = cancel.cancelled() => Err(JobError::Cancelled),
                        built = builder.build(&spec, rebuild) => built.map_err(JobError::from),
                    };
                    let end_state = if result.is_ok() {
                        JobState::Done
                    } else {
                        JobState::Errored
                    };
                    progress.transition(JobState::Building, end_state);
                    BuildOutcome {
                        repo_name: name,
                        result,
                    }
                });
                match handle.await {
                    Ok(outcome) => outcome,
                    Err(e) => BuildOutcome {
                        repo_name,
                        result: Err(JobError::Execution(ExecutionError::Infrastructure(
                            format!("worker panicked: {e}"),
                        ))),
                    },
                }
            }
        });

        stream::iter(builds)
            .buffer_unordered(self.workers)
            .collect()
            .await
    }
}

/// One worker's sequential pipeline for one repository: build strictly
/// precedes synchronization, which strictly precedes execution. Any error
/// terminates only this job.
async fn run_pipeline(
    builder: EnvironmentBuilder,
    synchronizer: BranchSynchronizer,
    runner: TestRunner,
    progress: Arc<Progress>,
    cancel: CancellationToken,
    job: BuildJob,
) -> JobOutcome {
    let repo_name = job.spec.name.clone();

    if cancel.is_cancelled() {
        progress.transition(JobState::Queued, JobState::Errored);
        return JobOutcome {
            repo_name,
            result: Err(JobError::Cancelled),
        };
    }

    progress.transition(JobState::Queued, JobState::Building);
    let mut state = JobState::Building;

    let pipeline = async {
        let env = builder.build(&job.spec, job.request.rebuild).await?;
        let plan = synchronizer.plan(&job.spec, &job.request).await?;
        progress.transition(JobState::Building, JobState::Testing);
        state = JobState::Testing;
        let result = runner.run(&job.spec, &env, &job.request, &plan).await?;
        Ok::<TestResult, JobError>(result)
    };

    let result = tokio::select! {
        biased;
        _ = cancel.cancelled() => Err(JobError::Cancelled),
        outcome = pipeline => outcome,
    };

    let end_state = if result.is_ok() {
        JobState::Done
    } else {
        JobState::Errored
    };
    progress.transition(state, end_state);

    JobOutcome { repo_name, result }
}
