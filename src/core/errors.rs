//! Error taxonomy for the harness engine.
//!
//! Build and sync failures abort only the job that owns them; execution
//! errors distinguish transient infrastructure faults (retryable inside the
//! backend) from harness faults (surfaced as-is). A timeout is a
//! `TestStatus`, never an error.

use thiserror::Error;

/// Failure while producing a ready environment.
#[derive(Error, Debug)]
pub enum BuildError {
    /// The setup recipe itself failed. Carries the captured setup log tail.
    #[error("setup recipe failed for {repo} (exit {exit_code})")]
    RecipeFailed {
        repo: String,
        exit_code: i32,
        logs: String,
    },

    /// The canonical checkout could not be produced or did not contain the
    /// reference commit.
    #[error("canonical checkout failed for {repo}: {message}")]
    Checkout { repo: String, message: String },

    /// The environment cache could not be read or written.
    #[error("environment cache I/O failure: {0}")]
    Io(#[from] std::io::Error),

    /// The remote service rejected or lost the build after all transport
    /// retries were exhausted.
    #[error("remote build dispatch failed: {0}")]
    Dispatch(String),

    /// The build did not reach a terminal state before the build deadline.
    #[error("build timed out after {0} seconds")]
    DeadlineExceeded(u64),
}

impl BuildError {
    /// Captured setup logs, when the failure carries any.
    pub fn logs(&self) -> Option<&str> {
        match self {
            BuildError::RecipeFailed { logs, .. } => Some(logs),
            _ => None,
        }
    }
}

/// Failure while materializing a branch's changes into an environment.
#[derive(Error, Debug)]
pub enum SyncError {
    #[error("unknown branch '{branch}' in repository {repo}")]
    UnknownBranch { repo: String, branch: String },

    #[error("diff against reference failed for {repo}: {message}")]
    DiffFailed { repo: String, message: String },

    /// The computed diff does not apply cleanly onto the reference tree.
    #[error("branch '{branch}' produces a patch that does not apply: {message}")]
    PatchUnapplicable {
        branch: String,
        message: String,
    },
}

/// Failure while executing tests inside a ready environment.
#[derive(Error, Debug)]
pub enum ExecutionError {
    /// Transient fault of the execution substrate (connection loss, spawn
    /// failure). Retried a bounded number of times inside the backend.
    #[error("infrastructure failure: {0}")]
    Infrastructure(String),

    /// The request or the environment-side harness is broken in a way a
    /// retry cannot fix (malformed test id, missing working copy).
    #[error("harness failure: {0}")]
    Harness(String),
}

impl ExecutionError {
    pub fn is_retryable(&self) -> bool {
        matches!(self, ExecutionError::Infrastructure(_))
    }
}

/// Any error that terminates one repository's pipeline. Never propagates
/// past the orchestrator.
#[derive(Error, Debug)]
pub enum JobError {
    #[error(transparent)]
    Build(#[from] BuildError),

    #[error(transparent)]
    Sync(#[from] SyncError),

    #[error(transparent)]
    Execution(#[from] ExecutionError),

    /// The run was cancelled before this job produced a result.
    #[error("cancelled before completion")]
    Cancelled,
}

impl JobError {
    /// Stable short name of the error class, used in reports.
    pub fn kind(&self) -> &'static str {
        match self {
            JobError::Build(_) => "build",
            JobError::Sync(_) => "sync",
            JobError::Execution(ExecutionError::Infrastructure(_)) => "infrastructure",
            JobError::Execution(ExecutionError::Harness(_)) => "execution",
            JobError::Cancelled => "cancelled",
        }
    }

    /// Captured log tail attached to the failure, when any exists.
    pub fn log_tail(&self) -> Option<&str> {
        match self {
            JobError::Build(e) => e.logs(),
            _ => None,
        }
    }
}
