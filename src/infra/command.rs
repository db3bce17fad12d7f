//! # Command Execution Module / 命令执行模块
//!
//! Spawns external processes with merged output capture, a hard wall-clock
//! deadline that terminates the whole process group, and an optional CPU
//! affinity ceiling.
//!
//! 派生外部进程，合并捕获输出，支持终止整个进程组的硬性墙钟期限，
//! 以及可选的 CPU 亲和性上限。

use once_cell::sync::Lazy;
use std::path::{Path, PathBuf};
use std::sync::Arc;
use std::time::{Duration, Instant};
use tokio::io::{AsyncBufReadExt, BufReader};
use tokio::process::{Child, Command};

/// Result of running a command to completion or to its deadline.
/// 命令运行至完成或期限的结果。
#[derive(Debug, Clone)]
pub struct CommandOutcome {
    pub exit_code: i32,
    /// Interleaved stdout and stderr, in arrival order.
    /// 按到达顺序交错的 stdout 和 stderr。
    pub output: String,
    pub timed_out: bool,
    pub duration: Duration,
}

/// Resolved `taskset` binary, probed once. Absent on hosts without it.
static TASKSET: Lazy<Option<PathBuf>> = Lazy::new(|| find_in_path("taskset"));

fn find_in_path(name: &str) -> Option<PathBuf> {
    let path_var = std::env::var_os("PATH")?;
    std::env::split_paths(&path_var)
        .map(|dir| dir.join(name))
        .find(|candidate| candidate.is_file())
}

/// Whether CPU pinning is available on this host.
pub fn can_pin_cpus() -> bool {
    TASKSET.is_some()
}

/// Builds a `bash <script>` command, prefixed with a `taskset` affinity mask
/// when a CPU ceiling is requested and the host supports pinning. The ceiling
/// is always exported as `FLEET_CPUS` so self-limiting harnesses can honor it
/// even without pinning.
///
/// 构建 `bash <script>` 命令；当请求 CPU 上限且主机支持绑定时，
/// 前缀 `taskset` 亲和掩码。上限始终通过 `FLEET_CPUS` 导出，
/// 使可自我限制的测试框架在无绑定时也能遵守。
pub fn script_command(script: &Path, cpus: Option<usize>) -> Command {
    let mut cmd = match (cpus, TASKSET.as_ref()) {
        (Some(n), Some(taskset)) if n > 0 => {
            let mut c = Command::new(taskset);
            c.arg("--cpu-list")
                .arg(format!("0-{}", n.saturating_sub(1)))
                .arg("bash");
            c
        }
        _ => Command::new("bash"),
    };
    cmd.arg(script);
    if let Some(n) = cpus {
        cmd.env("FLEET_CPUS", n.to_string());
    }
    cmd
}

/// Runs a prepared command with full output capture and an optional hard
/// deadline. On expiry the process group receives SIGKILL, so children
/// spawned by the script cannot outlive the run.
///
/// 运行已准备好的命令，完整捕获输出并支持可选的硬性期限。
/// 到期时进程组收到 SIGKILL，脚本派生的子进程无法在运行结束后存活。
pub async fn run_with_deadline(
    mut cmd: Command,
    workdir: &Path,
    deadline: Option<Duration>,
) -> std::io::Result<CommandOutcome> {
    cmd.current_dir(workdir)
        .stdout(std::process::Stdio::piped())
        .stderr(std::process::Stdio::piped());
    #[cfg(unix)]
    cmd.process_group(0);

    let start = Instant::now();
    let mut child = cmd.spawn()?;
    let pid = child.id();

    let (output, stdout_handle, stderr_handle) = capture_streams(&mut child)?;

    let (status, timed_out) = match deadline {
        Some(limit) => match tokio::time::timeout(limit, child.wait()).await {
            Ok(status) => (status?, false),
            Err(_) => {
                kill_process_group(pid, &mut child).await;
                (child.wait().await?, true)
            }
        },
        None => (child.wait().await?, false),
    };

    // Wait for the reader tasks so every line written before the exit (or
    // the kill) is captured.
    // 等待读取任务，确保退出（或终止）前写入的每一行都被捕获。
    let _ = stdout_handle.await;
    let _ = stderr_handle.await;

    Ok(CommandOutcome {
        exit_code: status.code().unwrap_or(-1),
        output: output.lock().await.clone(),
        timed_out,
        duration: start.elapsed(),
    })
}

type SharedOutput = Arc<tokio::sync::Mutex<String>>;

/// Spawns line-reader tasks for stdout and stderr that append into one
/// shared buffer, preserving arrival order between the two streams.
fn capture_streams(
    child: &mut Child,
) -> std::io::Result<(
    SharedOutput,
    tokio::task::JoinHandle<()>,
    tokio::task::JoinHandle<()>,
)> {
    let stdout = child
        .stdout
        .take()
        .ok_or_else(|| std::io::Error::other("failed to capture stdout"))?;
    let stderr = child
        .stderr
        .take()
        .ok_or_else(|| std::io::Error::other("failed to capture stderr"))?;

    let output: SharedOutput = Arc::new(tokio::sync::Mutex::new(String::new()));

    let stdout_output = Arc::clone(&output);
    let stdout_handle = tokio::spawn(async move {
        let mut lines = BufReader::new(stdout).lines();
        while let Ok(Some(line)) = lines.next_line().await {
            let mut buf = stdout_output.lock().await;
            buf.push_str(&line);
            buf.push('\n');
        }
    });

    let stderr_output = Arc::clone(&output);
    let stderr_handle = tokio::spawn(async move {
        let mut lines = BufReader::new(stderr).lines();
        while let Ok(Some(line)) = lines.next_line().await {
            let mut buf = stderr_output.lock().await;
            buf.push_str(&line);
            buf.push('\n');
        }
    });

    Ok((output, stdout_handle, stderr_handle))
}

#[cfg(unix)]
async fn kill_process_group(pid: Option<u32>, child: &mut Child) {
    if let Some(pid) = pid {
        // The child was spawned as its own group leader, so -pgid reaches
        // every descendant.
        // 子进程作为自己的组长派生，因此 -pgid 能到达所有后代。
        unsafe {
            libc::killpg(pid as libc::pid_t, libc::SIGKILL);
        }
    } else {
        let _ = child.start_kill();
    }
}

#[cfg(not(unix))]
async fn kill_process_group(_pid: Option<u32>, child: &mut Child) {
    let _ = child.start_kill();
}

/// Spawns a command, captures its stdout and stderr.
/// The output streams are read concurrently and combined into a single string.
///
/// 派生一个命令，捕获其 stdout 和 stderr。
/// 输出流被并发读取并合并到一个字符串。
pub async fn spawn_and_capture(
    mut cmd: Command,
) -> (std::io::Result<std::process::ExitStatus>, String) {
    cmd.stdout(std::process::Stdio::piped())
        .stderr(std::process::Stdio::piped());
    let mut child = match cmd.spawn() {
        Ok(child) => child,
        Err(e) => return (Err(e), String::new()),
    };

    let (output, stdout_handle, stderr_handle) = match capture_streams(&mut child) {
        Ok(parts) => parts,
        Err(e) => return (Err(e), String::new()),
    };

    let status = child.wait().await;

    let _ = stdout_handle.await;
    let _ = stderr_handle.await;

    let combined = output.lock().await.clone();
    (status, combined)
}

/// Keeps the most recent `max_bytes` of `s`, cut on a character boundary.
/// The head of long outputs is the least interesting part of a failed run.
///
/// 保留 `s` 最近的 `max_bytes` 字节，在字符边界处截断。
pub fn bounded_tail(s: &str, max_bytes: usize) -> String {
    if s.len() <= max_bytes {
        return s.to_string();
    }
    let mut start = s.len() - max_bytes;
    while !s.is_char_boundary(start) {
        start += 1;
    }
    format!("[... output truncated ...]\n{}", &s[start..])
}
