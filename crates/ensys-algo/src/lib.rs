//! Compile, solve and extract stages of the ensys pipeline.
//!
//! ```no_run
//! use ensys_algo::{ModelCompiler, ResultsExtractor, SolverAdapter};
//! use ensys_core::{Diagnostics, Flow, NetworkBuilder, TimeIndexBuilder};
//!
//! # fn main() -> ensys_core::EnsysResult<()> {
//! let index = TimeIndexBuilder::new("2022-01-01").periods(24).freq("h").build()?;
//! let system = NetworkBuilder::new(index)
//!     .bus("electricity")
//!     .excess("excess_bel", "electricity")
//!     .source("pv", "electricity", Flow::fixed(vec![0.5; 24], 700.0))
//!     .build()?;
//!
//! let mut diag = Diagnostics::new();
//! let model = ModelCompiler::default().compile(&system, &mut diag)?;
//! let solved = SolverAdapter::default().solve(model)?;
//! let results = ResultsExtractor::new().extract(&solved, &system)?;
//! # Ok(())
//! # }
//! ```

pub mod compile;
mod presolve;
pub mod results;
pub mod solve;

pub use compile::{CompileOptions, Model, ModelCompiler};
pub use results::ResultsExtractor;
pub use solve::{default_lp_dump_path, SolveOptions, SolvedModel, SolverAdapter, SolverBackend};
