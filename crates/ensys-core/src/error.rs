//! Error types shared by every stage of the ensys pipeline.
//!
//! Every error carries the [`Stage`] that raised it so a failed run can be
//! diagnosed from the message alone.
//!
//! # Example
//!
//! ```
//! use ensys_core::{EnsysError, EnsysResult, Stage};
//!
//! fn check_periods(periods: usize) -> EnsysResult<()> {
//!     if periods == 0 {
//!         return Err(EnsysError::config(Stage::TimeIndex, "period count must be positive"));
//!     }
//!     Ok(())
//! }
//!
//! assert!(check_periods(0).is_err());
//! ```

use serde::Serialize;
use std::fmt;
use thiserror::Error;

/// Pipeline stage that produced an error.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize)]
#[serde(rename_all = "kebab-case")]
pub enum Stage {
    /// Scenario/configuration loading done by a driver.
    Scenario,
    TimeIndex,
    Network,
    Compile,
    Solve,
    Extract,
    Persist,
}

impl Stage {
    pub fn as_str(&self) -> &'static str {
        match self {
            Stage::Scenario => "scenario",
            Stage::TimeIndex => "time-index",
            Stage::Network => "network",
            Stage::Compile => "compile",
            Stage::Solve => "solve",
            Stage::Extract => "extract",
            Stage::Persist => "persist",
        }
    }
}

impl fmt::Display for Stage {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

type BoxedSource = Box<dyn std::error::Error + Send + Sync + 'static>;

/// Unified error type for all ensys operations.
#[derive(Error, Debug)]
pub enum EnsysError {
    /// Malformed or inconsistent input, detected before compilation.
    #[error("[{stage}] configuration error: {message}")]
    Config { stage: Stage, message: String },

    /// Structurally invalid network, or extraction from an unsolved model.
    #[error("[{stage}] model build error: {message}")]
    ModelBuild { stage: Stage, message: String },

    /// The solver process failed (crash, bad exit code, unreadable output).
    #[error("[solve] solver error: {0}")]
    Solver(String),

    /// The solver did not finish within its time limit.
    #[error("[solve] solver timed out after {seconds} seconds")]
    SolverTimeout { seconds: u64 },

    /// Snapshot could not be written or read back.
    #[error("[persist] persistence error: {message}")]
    Persistence {
        message: String,
        #[source]
        source: Option<BoxedSource>,
    },

    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),
}

/// Convenience type alias for Results using EnsysError.
pub type EnsysResult<T> = Result<T, EnsysError>;

impl EnsysError {
    pub fn config(stage: Stage, message: impl Into<String>) -> Self {
        EnsysError::Config {
            stage,
            message: message.into(),
        }
    }

    pub fn model_build(stage: Stage, message: impl Into<String>) -> Self {
        EnsysError::ModelBuild {
            stage,
            message: message.into(),
        }
    }

    pub fn persistence(message: impl Into<String>) -> Self {
        EnsysError::Persistence {
            message: message.into(),
            source: None,
        }
    }

    /// Persistence error wrapping the lower-level cause.
    pub fn persistence_with<E>(message: impl Into<String>, source: E) -> Self
    where
        E: std::error::Error + Send + Sync + 'static,
    {
        EnsysError::Persistence {
            message: message.into(),
            source: Some(Box::new(source)),
        }
    }

    /// Stage the error originated from, when known.
    pub fn stage(&self) -> Option<Stage> {
        match self {
            EnsysError::Config { stage, .. } | EnsysError::ModelBuild { stage, .. } => {
                Some(*stage)
            }
            EnsysError::Solver(_) | EnsysError::SolverTimeout { .. } => Some(Stage::Solve),
            EnsysError::Persistence { .. } => Some(Stage::Persist),
            EnsysError::Io(_) => None,
        }
    }

    pub fn is_config(&self) -> bool {
        matches!(self, EnsysError::Config { .. })
    }

    pub fn is_model_build(&self) -> bool {
        matches!(self, EnsysError::ModelBuild { .. })
    }

    pub fn is_timeout(&self) -> bool {
        matches!(self, EnsysError::SolverTimeout { .. })
    }
}
