//! Linear-program plumbing shared by ensys solver backends.
//!
//! Native solvers run as subprocesses: the model is written as a CPLEX LP file
//! into a scratch directory, the solver binary is spawned on it, and the
//! solution file it leaves behind is parsed back into column values.
//!
//! ```text
//! ensys ──model.lp──> cbc / highs (subprocess)
//!       <─sol.txt───
//!       <─stdout──── (forwarded to tracing)
//! ```
//!
//! | Solver | Binary | Solution file |
//! |--------|--------|---------------|
//! | CBC    | `cbc`   | `solu` report |
//! | HiGHS  | `highs` | `--solution_file` raw format |

pub mod error;
pub mod lp;
pub mod solution;
pub mod subprocess;

pub use error::{ExitCode, SolverError, SolverResult};
pub use lp::{Column, LinearProgram, Row, RowSense};
pub use solution::NativeSolution;
pub use subprocess::SolverProcess;

use std::fmt;
use std::str::FromStr;

/// Native LP solvers that can be driven through LP files.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, serde::Serialize, serde::Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum SolverId {
    /// COIN-OR Branch and Cut, used here for its dual simplex LP solver.
    Cbc,
    /// HiGHS dual revised simplex.
    Highs,
}

impl SolverId {
    pub fn binary_name(&self) -> &'static str {
        match self {
            SolverId::Cbc => "cbc",
            SolverId::Highs => "highs",
        }
    }

    pub fn display_name(&self) -> &'static str {
        match self {
            SolverId::Cbc => "CBC",
            SolverId::Highs => "HiGHS",
        }
    }

    pub fn all() -> &'static [SolverId] {
        &[SolverId::Cbc, SolverId::Highs]
    }
}

impl fmt::Display for SolverId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.binary_name())
    }
}

impl FromStr for SolverId {
    type Err = SolverError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.trim().to_ascii_lowercase().as_str() {
            "cbc" => Ok(SolverId::Cbc),
            "highs" => Ok(SolverId::Highs),
            other => Err(SolverError::UnknownSolver(other.to_string())),
        }
    }
}
