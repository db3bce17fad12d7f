//! # Test Runner Module / 测试运行器模块
//!
//! Turns a test request into a concrete execution payload, hands it to the
//! backend, and interprets the raw outcome into the status taxonomy. The
//! runner is stateless across invocations: nothing is cached, every call
//! re-executes.
//!
//! 将测试请求转化为具体的执行负载，交给后端，
//! 并将原始结果解释为状态分类。运行器跨调用无状态：不缓存任何内容，每次调用都重新执行。

use serde::Deserialize;
use std::collections::BTreeMap;
use std::sync::Arc;

use crate::core::backend::Backend;
use crate::core::catalog::RepoSpec;
use crate::core::errors::ExecutionError;
use crate::core::models::{
    CaseOutcome, Environment, ExecutionPayload, RawExecution, TestRequest, TestResult,
    TestStatus, REPORT_FILENAME,
};
use crate::core::sync::SyncPlan;
use crate::infra::command::bounded_tail;

/// How much captured output a result retains.
const OUTPUT_TAIL: usize = 64 * 1024;

/// Shape of the machine-readable report the harness command writes inside
/// the environment. Only `passed` and `failed` are verdicts; any other
/// outcome string means the test did not produce one.
/// 测试命令在环境内写入的机器可读报告的结构。
/// 只有 `passed` 和 `failed` 是结论；任何其他结果字符串表示该测试未产出结论。
#[derive(Debug, Deserialize)]
struct SandboxReport {
    #[serde(default)]
    tests: Vec<SandboxCase>,
    #[serde(default)]
    coverage: Option<BTreeMap<String, f64>>,
}

#[derive(Debug, Deserialize)]
struct SandboxCase {
    #[serde(alias = "nodeid")]
    id: String,
    outcome: String,
}

#[derive(Clone)]
pub struct TestRunner {
    backend: Arc<dyn Backend>,
}

impl TestRunner {
    pub fn new(backend: Arc<dyn Backend>) -> Self {
        Self { backend }
    }

    /// Runs the request inside the environment and interprets the outcome.
    pub async fn run(
        &self,
        spec: &RepoSpec,
        env: &Environment,
        request: &TestRequest,
        plan: &SyncPlan,
    ) -> Result<TestResult, ExecutionError> {
        let payload = render_payload(spec, request, plan)?;
        let raw = self.backend.execute(env, request, &payload).await?;
        Ok(interpret_execution(request, raw))
    }
}

/// Renders the repository's command template into a runnable payload.
/// `{tests}` receives the shell-quoted id selection (empty for a full run),
/// `{report}` the report path; the coverage fragment is appended on demand.
pub fn render_payload(
    spec: &RepoSpec,
    request: &TestRequest,
    plan: &SyncPlan,
) -> Result<ExecutionPayload, ExecutionError> {
    let selection = shlex::try_join(request.test_ids.iter().map(String::as_str))
        .map_err(|e| ExecutionError::Harness(format!("malformed test id: {e}")))?;

    let mut command = spec
        .harness
        .command
        .replace("{tests}", &selection)
        .replace("{report}", REPORT_FILENAME);

    if request.want_coverage {
        if let Some(flag) = &spec.harness.coverage_flag {
            command.push(' ');
            command.push_str(flag);
        }
    }

    Ok(ExecutionPayload {
        reset_to: plan.reset_to.clone(),
        patch: plan.patch.clone(),
        command,
    })
}

/// Maps the raw execution onto the requested id set.
///
/// Every requested id receives exactly one status. Ids the report does not
/// account for become Timeout when the run hit its deadline (the queue
/// behind the stuck test never ran) and Error otherwise. An empty request
/// adopts the report's discovered set in report order.
pub fn interpret_execution(request: &TestRequest, raw: RawExecution) -> TestResult {
    let report = raw
        .report
        .as_deref()
        .and_then(|content| serde_json::from_str::<SandboxReport>(content).ok());

    let (cases, coverage) = match report {
        Some(report) => (report.tests, report.coverage),
        None => (Vec::new(), None),
    };

    let verdicts: BTreeMap<&str, TestStatus> = cases
        .iter()
        .map(|case| (case.id.as_str(), parse_outcome(&case.outcome)))
        .collect();

    let fallback = if raw.timed_out {
        TestStatus::Timeout
    } else {
        TestStatus::Error
    };

    let outcomes: Vec<CaseOutcome> = if request.test_ids.is_empty() {
        cases
            .iter()
            .map(|case| CaseOutcome {
                id: case.id.clone(),
                status: parse_outcome(&case.outcome),
            })
            .collect()
    } else {
        request
            .test_ids
            .iter()
            .map(|id| CaseOutcome {
                id: id.clone(),
                status: verdicts.get(id.as_str()).copied().unwrap_or(fallback),
            })
            .collect()
    };

    TestResult {
        outcomes,
        wall_duration: raw.duration,
        coverage: if request.want_coverage { coverage } else { None },
        output: bounded_tail(&raw.output, OUTPUT_TAIL),
    }
}

fn parse_outcome(outcome: &str) -> TestStatus {
    match outcome {
        "passed" => TestStatus::Passed,
        "failed" => TestStatus::Failed,
        _ => TestStatus::Error,
    }
}
