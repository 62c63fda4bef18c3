//! Error types and exit codes for external solver processes.

use ensys_core::EnsysError;
use std::fmt;
use std::process::ExitStatus;
use thiserror::Error;

/// How a solver process terminated.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ExitCode {
    Success,
    /// Non-zero exit code.
    Failure(i32),
    /// Killed by a signal (no exit code).
    Signaled,
}

impl ExitCode {
    pub fn from_raw(code: Option<i32>) -> Self {
        match code {
            Some(0) => ExitCode::Success,
            Some(code) => ExitCode::Failure(code),
            None => ExitCode::Signaled,
        }
    }

    pub fn from_status(status: ExitStatus) -> Self {
        Self::from_raw(status.code())
    }

    pub fn is_success(&self) -> bool {
        matches!(self, ExitCode::Success)
    }
}

impl fmt::Display for ExitCode {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            ExitCode::Success => f.write_str("exit code 0"),
            ExitCode::Failure(code) => write!(f, "exit code {}", code),
            ExitCode::Signaled => f.write_str("a signal"),
        }
    }
}

#[derive(Debug, Error)]
pub enum SolverError {
    #[error("unknown native solver '{0}' (expected cbc or highs)")]
    UnknownSolver(String),

    #[error("{solver} is not installed: no `{hint}` binary in ~/.ensys/solvers or on PATH")]
    NotInstalled {
        solver: crate::SolverId,
        hint: String,
    },

    #[error("could not spawn solver: {0}")]
    ProcessStart(#[source] std::io::Error),

    #[error("solver terminated by {exit_code}: {message}")]
    ProcessFailed {
        exit_code: ExitCode,
        message: String,
    },

    #[error("no solution within {seconds} s")]
    Timeout { seconds: u64 },

    /// The solution file is missing or cannot be interpreted.
    #[error("unreadable solution: {0}")]
    MalformedSolution(String),

    #[error("solver scratch I/O: {0}")]
    Io(#[from] std::io::Error),
}

pub type SolverResult<T> = Result<T, SolverError>;

impl From<SolverError> for EnsysError {
    fn from(err: SolverError) -> Self {
        match err {
            SolverError::Timeout { seconds } => EnsysError::SolverTimeout { seconds },
            other => EnsysError::Solver(other.to_string()),
        }
    }
}
