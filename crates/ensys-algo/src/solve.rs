//! Solver dispatch for compiled models.
//!
//! Two kinds of backend:
//! - `clarabel`: pure-Rust interior point solver driven in-process through
//!   `good_lp` (feature `solver-clarabel`, on by default)
//! - `cbc` / `highs`: native binaries fed an LP file, see
//!   [`ensys_solver_common::SolverProcess`]
//!
//! Infeasible and unbounded models are reported through [`SolveStatus`];
//! only process-level failures are errors.

use crate::compile::Model;
use crate::presolve::{presolve, Presolved};
use ensys_core::{EnsysError, EnsysResult, SolveStatus, Stage};
use ensys_solver_common::{LinearProgram, SolverId, SolverProcess};
use std::fmt;
use std::path::PathBuf;
use std::str::FromStr;
use std::time::Instant;
use tracing::{debug, info, warn};

/// Relative row violation above which a returned solution is logged.
const BALANCE_TOLERANCE: f64 = 1e-6;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SolverBackend {
    Clarabel,
    Native(SolverId),
}

impl SolverBackend {
    pub fn all() -> Vec<SolverBackend> {
        let mut backends = vec![SolverBackend::Clarabel];
        backends.extend(SolverId::all().iter().copied().map(SolverBackend::Native));
        backends
    }

    pub fn name(&self) -> &'static str {
        match self {
            SolverBackend::Clarabel => "clarabel",
            SolverBackend::Native(id) => id.binary_name(),
        }
    }

    pub fn description(&self) -> &'static str {
        match self {
            SolverBackend::Clarabel => "pure-Rust interior point (in-process)",
            SolverBackend::Native(SolverId::Cbc) => "COIN-OR CBC (subprocess)",
            SolverBackend::Native(SolverId::Highs) => "HiGHS dual simplex (subprocess)",
        }
    }

    pub fn is_available(&self) -> bool {
        match self {
            SolverBackend::Clarabel => cfg!(feature = "solver-clarabel"),
            SolverBackend::Native(id) => SolverProcess::is_installed(*id),
        }
    }
}

impl fmt::Display for SolverBackend {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.name())
    }
}

impl FromStr for SolverBackend {
    type Err = EnsysError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        let name = s.trim().to_ascii_lowercase();
        if name == "clarabel" {
            return Ok(SolverBackend::Clarabel);
        }
        name.parse::<SolverId>()
            .map(SolverBackend::Native)
            .map_err(|_| {
                EnsysError::config(
                    Stage::Solve,
                    format!("unknown solver '{}'; expected clarabel, cbc or highs", s.trim()),
                )
            })
    }
}

#[derive(Debug, Clone)]
pub struct SolveOptions {
    pub solver: SolverBackend,
    /// Forward solver output at info level.
    pub verbose: bool,
    /// Wall-clock limit for any backend. `None` waits indefinitely.
    pub timeout_seconds: Option<u64>,
    /// Write the LP formulation here before solving.
    pub lp_dump: Option<PathBuf>,
}

impl Default for SolveOptions {
    fn default() -> Self {
        Self {
            solver: SolverBackend::Clarabel,
            verbose: false,
            timeout_seconds: None,
            lp_dump: None,
        }
    }
}

/// `~/.ensys/lp_files/model.lp`, falling back to the working directory when
/// no home directory is known.
pub fn default_lp_dump_path() -> PathBuf {
    dirs::home_dir()
        .unwrap_or_else(|| PathBuf::from("."))
        .join(".ensys")
        .join("lp_files")
        .join("model.lp")
}

/// A model together with its solve outcome.
#[derive(Debug, Clone)]
pub struct SolvedModel {
    pub model: Model,
    pub status: SolveStatus,
    /// One value per LP column; empty unless optimal.
    pub values: Vec<f64>,
    pub objective: Option<f64>,
    pub solve_time_ms: Option<u64>,
    pub solver: String,
    /// Solver-provided reason for a non-optimal status.
    pub message: Option<String>,
}

impl SolvedModel {
    pub fn is_optimal(&self) -> bool {
        self.status.is_optimal()
    }
}

#[derive(Debug, Clone, Default)]
pub struct SolverAdapter {
    options: SolveOptions,
}

impl SolverAdapter {
    pub fn new(options: SolveOptions) -> Self {
        Self { options }
    }

    pub fn options(&self) -> &SolveOptions {
        &self.options
    }

    /// Solve `model`. Blocks until the backend returns or times out.
    pub fn solve(&self, model: Model) -> EnsysResult<SolvedModel> {
        let backend = self.options.solver;
        let lp = model.lp();

        if let Some(path) = &self.options.lp_dump {
            lp.write_lp_file(path).map_err(|e| {
                EnsysError::config(
                    Stage::Solve,
                    format!("cannot write LP file {}: {}", path.display(), e),
                )
            })?;
            info!(path = %path.display(), "wrote LP formulation");
        }

        if !backend.is_available() {
            return Err(EnsysError::Solver(format!(
                "solver '{}' is not available",
                backend
            )));
        }

        let start = Instant::now();
        let pre = presolve(lp);
        debug!(
            free = pre.num_free(),
            active_rows = pre.active_rows.len(),
            "presolve finished"
        );

        let (status, values, message) = if let Some(reason) = pre.infeasible.clone() {
            info!(reason = %reason, "presolve proved the model infeasible");
            (SolveStatus::Infeasible, Vec::new(), Some(reason))
        } else if pre.is_complete() {
            info!("presolve fixed every column; no solver call needed");
            let values = pre.values.iter().map(|v| v.unwrap_or(0.0)).collect();
            (SolveStatus::Optimal, values, None)
        } else {
            info!(
                solver = %backend,
                free = pre.num_free(),
                rows = pre.active_rows.len(),
                "solving"
            );
            match backend {
                SolverBackend::Clarabel => solve_clarabel(lp, &pre, &self.options)?,
                SolverBackend::Native(id) => self.solve_native(id, lp)?,
            }
        };
        let solve_time_ms = start.elapsed().as_millis() as u64;

        let objective = status.is_optimal().then(|| lp.objective_value(&values));
        if status.is_optimal() {
            let violation = lp.max_violation(&values);
            let scale = values.iter().fold(1.0f64, |m, v| m.max(v.abs()));
            if violation > BALANCE_TOLERANCE * scale {
                warn!(violation, "solution violates balance rows beyond tolerance");
            }
        }

        info!(
            status = %status,
            objective = objective.unwrap_or(f64::NAN),
            solve_time_ms,
            "solve finished"
        );

        Ok(SolvedModel {
            model,
            status,
            values,
            objective,
            solve_time_ms: Some(solve_time_ms),
            solver: backend.name().to_string(),
            message,
        })
    }

    fn solve_native(
        &self,
        id: SolverId,
        lp: &LinearProgram,
    ) -> EnsysResult<(SolveStatus, Vec<f64>, Option<String>)> {
        let process = SolverProcess::locate(id, self.options.timeout_seconds)?
            .verbose(self.options.verbose);
        let solution = process.solve_blocking(lp)?;
        if solution.status.is_optimal() && solution.values.len() != lp.num_columns() {
            return Err(EnsysError::Solver(format!(
                "{} returned {} values for {} columns",
                id.display_name(),
                solution.values.len(),
                lp.num_columns()
            )));
        }
        let message = (!solution.status.is_optimal())
            .then(|| format!("{} reported {}", id.display_name(), solution.status));
        Ok((solution.status, solution.values, message))
    }
}

#[cfg(feature = "solver-clarabel")]
fn solve_clarabel(
    lp: &LinearProgram,
    pre: &Presolved,
    options: &SolveOptions,
) -> EnsysResult<(SolveStatus, Vec<f64>, Option<String>)> {
    use ensys_solver_common::RowSense;
    use good_lp::solvers::clarabel::clarabel;
    use good_lp::{
        constraint, variable, variables, Expression, ResolutionError, Solution, SolverModel,
        Variable,
    };

    let mut vars = variables!();
    let mut free: Vec<Option<Variable>> = vec![None; lp.num_columns()];
    for (i, column) in lp.columns.iter().enumerate() {
        if pre.values[i].is_none() {
            let mut def = variable();
            if column.lower.is_finite() {
                def = def.min(column.lower);
            }
            if column.upper.is_finite() {
                def = def.max(column.upper);
            }
            free[i] = Some(vars.add(def));
        }
    }

    let mut objective = Expression::from(0.0);
    for (column, var) in lp.columns.iter().zip(&free) {
        if let Some(var) = var {
            if column.cost != 0.0 {
                objective += column.cost * *var;
            }
        }
    }

    let mut problem = vars.minimise(objective).using(clarabel);
    if let Some(seconds) = options.timeout_seconds {
        problem.settings().time_limit(seconds as f64);
    }
    for &r in &pre.active_rows {
        let row = &lp.rows[r];
        let mut lhs = Expression::from(0.0);
        let mut rhs = row.rhs;
        for &(c, a) in &row.terms {
            match free[c] {
                Some(var) => lhs += a * var,
                None => rhs -= a * pre.values[c].unwrap_or(0.0),
            }
        }
        problem = match row.sense {
            RowSense::Equal => problem.with(constraint!(lhs == rhs)),
            RowSense::LessEqual => problem.with(constraint!(lhs <= rhs)),
            RowSense::GreaterEqual => problem.with(constraint!(lhs >= rhs)),
        };
    }

    if options.verbose {
        info!(
            variables = free.iter().filter(|v| v.is_some()).count(),
            constraints = pre.active_rows.len(),
            "clarabel problem assembled"
        );
    }

    match problem.solve() {
        Ok(solution) => {
            let values = lp
                .columns
                .iter()
                .enumerate()
                .map(|(i, column)| match free[i] {
                    // Interior point iterates sit a hair inside or outside bounds.
                    Some(var) => solution.value(var).clamp(column.lower, column.upper),
                    None => pre.values[i].unwrap_or(0.0),
                })
                .collect();
            Ok((SolveStatus::Optimal, values, None))
        }
        Err(ResolutionError::Infeasible) => Ok((
            SolveStatus::Infeasible,
            Vec::new(),
            Some("clarabel reported primal infeasibility".to_string()),
        )),
        Err(ResolutionError::Unbounded) => Ok((
            SolveStatus::Unbounded,
            Vec::new(),
            Some("clarabel reported an unbounded objective".to_string()),
        )),
        // good_lp reports clarabel's MaxTime status under this message.
        Err(ResolutionError::Other("Time limit reached")) => {
            let seconds = options.timeout_seconds.unwrap_or(0);
            warn!(seconds, "clarabel stopped on its time limit");
            Err(EnsysError::SolverTimeout { seconds })
        }
        Err(e) => Err(EnsysError::Solver(format!("clarabel failed: {}", e))),
    }
}

#[cfg(not(feature = "solver-clarabel"))]
fn solve_clarabel(
    _lp: &LinearProgram,
    _pre: &Presolved,
    _options: &SolveOptions,
) -> EnsysResult<(SolveStatus, Vec<f64>, Option<String>)> {
    Err(EnsysError::Solver(
        "clarabel support is not compiled in; enable the solver-clarabel feature".to_string(),
    ))
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::compile::ModelCompiler;
    use ensys_core::{Diagnostics, EnergySystem, Flow, NetworkBuilder, TimeIndexBuilder};

    fn compile(system: &EnergySystem) -> Model {
        ModelCompiler::default()
            .compile(system, &mut Diagnostics::new())
            .unwrap()
    }

    fn index(periods: i64) -> ensys_core::TimeIndex {
        TimeIndexBuilder::new("2022-01-01")
            .periods(periods)
            .build()
            .unwrap()
    }

    #[test]
    fn test_backend_names() {
        assert_eq!("clarabel".parse::<SolverBackend>().unwrap(), SolverBackend::Clarabel);
        assert_eq!(
            "HiGHS".parse::<SolverBackend>().unwrap(),
            SolverBackend::Native(SolverId::Highs)
        );
        let err = "glpk".parse::<SolverBackend>().unwrap_err();
        assert!(err.is_config());
        assert_eq!(SolverBackend::all().len(), 3);
    }

    #[test]
    fn test_fully_fixed_model_skips_solver() {
        let system = NetworkBuilder::new(index(2))
            .bus("b")
            .source("s", "b", Flow::fixed(vec![1.0, 2.0], 10.0))
            .excess("x", "b")
            .build()
            .unwrap();
        let solved = SolverAdapter::default().solve(compile(&system)).unwrap();
        assert!(solved.is_optimal());
        assert_eq!(solved.values, vec![10.0, 20.0, 10.0, 20.0]);
        assert_eq!(solved.objective, Some(0.0));
    }

    #[test]
    fn test_shortage_is_infeasible_data() {
        let system = NetworkBuilder::new(index(1))
            .bus("b")
            .source("gen", "b", Flow::unrestricted().with_nominal_value(100.0))
            .sink("demand", "b", Flow::fixed(vec![150.0], 1.0))
            .build()
            .unwrap();
        let solved = SolverAdapter::default().solve(compile(&system)).unwrap();
        assert_eq!(solved.status, SolveStatus::Infeasible);
        assert!(solved.values.is_empty());
        assert!(solved.objective.is_none());
        assert!(solved.message.is_some());
    }

    #[test]
    fn test_lp_dump_written_before_solve() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("lp_files").join("basic_example.lp");
        let system = NetworkBuilder::new(index(3))
            .bus("electricity")
            .source("pv", "electricity", Flow::fixed(vec![1.0, 1.0, 1.0], 5.0))
            .excess("excess", "electricity")
            .build()
            .unwrap();
        let adapter = SolverAdapter::new(SolveOptions {
            lp_dump: Some(path.clone()),
            ..SolveOptions::default()
        });
        adapter.solve(compile(&system)).unwrap();

        let text = std::fs::read_to_string(&path).unwrap();
        assert_eq!(text.matches("balance_0_electricity_").count(), 3);
        assert!(text.contains("flow_0_pv_electricity_2 = 5"));
    }

    #[test]
    fn test_default_dump_path() {
        let path = default_lp_dump_path();
        assert!(path.ends_with(".ensys/lp_files/model.lp"));
    }

    #[cfg(feature = "solver-clarabel")]
    #[test]
    fn test_clarabel_merit_order() {
        let system = NetworkBuilder::new(index(1))
            .bus("b")
            .source(
                "cheap",
                "b",
                Flow::unrestricted()
                    .with_nominal_value(100.0)
                    .with_variable_cost(1.0),
            )
            .source(
                "dear",
                "b",
                Flow::unrestricted()
                    .with_nominal_value(100.0)
                    .with_variable_cost(2.0),
            )
            .sink("demand", "b", Flow::fixed(vec![150.0], 1.0))
            .build()
            .unwrap();
        let solved = SolverAdapter::default().solve(compile(&system)).unwrap();
        assert!(solved.is_optimal());
        let objective = solved.objective.unwrap();
        assert!((objective - 200.0).abs() < 1e-3, "objective {objective}");
        assert!((solved.values[0] - 100.0).abs() < 1e-3);
        assert!((solved.values[1] - 50.0).abs() < 1e-3);
    }

    #[cfg(feature = "solver-clarabel")]
    #[test]
    fn test_clarabel_zero_time_limit_times_out() {
        let system = NetworkBuilder::new(index(1))
            .bus("b")
            .source(
                "cheap",
                "b",
                Flow::unrestricted()
                    .with_nominal_value(100.0)
                    .with_variable_cost(1.0),
            )
            .source(
                "dear",
                "b",
                Flow::unrestricted()
                    .with_nominal_value(100.0)
                    .with_variable_cost(2.0),
            )
            .sink("demand", "b", Flow::fixed(vec![150.0], 1.0))
            .build()
            .unwrap();
        let adapter = SolverAdapter::new(SolveOptions {
            timeout_seconds: Some(0),
            ..SolveOptions::default()
        });
        let err = adapter.solve(compile(&system)).unwrap_err();
        assert!(err.is_timeout(), "unexpected error {err}");
        assert!(matches!(err, EnsysError::SolverTimeout { seconds: 0 }));

        let relaxed = SolverAdapter::new(SolveOptions {
            timeout_seconds: Some(60),
            ..SolveOptions::default()
        });
        assert!(relaxed.solve(compile(&system)).unwrap().is_optimal());
    }

    #[cfg(feature = "solver-clarabel")]
    #[test]
    fn test_clarabel_unbounded() {
        let system = NetworkBuilder::new(index(1))
            .bus("b")
            .source("gen", "b", Flow::unrestricted().with_variable_cost(-1.0))
            .excess("dump", "b")
            .build()
            .unwrap();
        let solved = SolverAdapter::default().solve(compile(&system)).unwrap();
        assert_eq!(solved.status, SolveStatus::Unbounded);
    }

    #[test]
    fn test_unavailable_native_solver_is_error_when_missing() {
        let system = NetworkBuilder::new(index(1))
            .bus("b")
            .source("gen", "b", Flow::unrestricted().with_nominal_value(1.0))
            .excess("x", "b")
            .build()
            .unwrap();
        for id in SolverId::all() {
            if SolverProcess::is_installed(*id) {
                continue;
            }
            let adapter = SolverAdapter::new(SolveOptions {
                solver: SolverBackend::Native(*id),
                ..SolveOptions::default()
            });
            let err = adapter.solve(compile(&system)).unwrap_err();
            assert!(matches!(err, EnsysError::Solver(_)));
        }
    }
}
