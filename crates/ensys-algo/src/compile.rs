//! Translation of an [`EnergySystem`] into a [`LinearProgram`].
//!
//! One column per flow per timestep, one equality row per bus per timestep:
//!
//! ```text
//! min  Σ_f Σ_t cost_f(t) · x_f(t)
//! s.t. Σ_{f into b} x_f(t) − Σ_{f out of b} x_f(t) = 0     ∀ b, t
//!      lower_f(t) ≤ x_f(t) ≤ upper_f(t)                     ∀ f, t
//! ```
//!
//! Fixed flows keep their column with equal bounds so every row is assembled
//! the same way.

use ensys_core::{Diagnostics, EnergySystem, EnsysError, EnsysResult, Stage};
use ensys_solver_common::lp::sanitize_name;
use ensys_solver_common::{LinearProgram, RowSense};
use tracing::{debug, info, warn};

/// Compiler settings.
#[derive(Debug, Clone, Copy, Default)]
pub struct CompileOptions {
    /// Treat a bus without flows as an error instead of a warning.
    pub strict_buses: bool,
}

/// Compiled linear program plus the mapping back to flows.
#[derive(Debug, Clone)]
pub struct Model {
    lp: LinearProgram,
    columns: Vec<Vec<usize>>,
    flow_labels: Vec<(String, String)>,
    balance_rows: Vec<(String, usize)>,
    periods: usize,
}

impl Model {
    pub fn lp(&self) -> &LinearProgram {
        &self.lp
    }

    pub fn periods(&self) -> usize {
        self.periods
    }

    pub fn num_flows(&self) -> usize {
        self.columns.len()
    }

    pub fn num_variables(&self) -> usize {
        self.lp.num_columns()
    }

    pub fn num_constraints(&self) -> usize {
        self.lp.num_rows()
    }

    /// Column index of flow `flow` at timestep `t`.
    pub fn column(&self, flow: usize, t: usize) -> Option<usize> {
        self.columns.get(flow).and_then(|cols| cols.get(t)).copied()
    }

    /// `(from, to)` labels of every flow, in flow order.
    pub fn flow_labels(&self) -> &[(String, String)] {
        &self.flow_labels
    }

    /// `(bus label, timestep)` for every balance row, in row order.
    pub fn balance_rows(&self) -> &[(String, usize)] {
        &self.balance_rows
    }
}

#[derive(Debug, Clone, Default)]
pub struct ModelCompiler {
    options: CompileOptions,
}

impl ModelCompiler {
    pub fn new(options: CompileOptions) -> Self {
        Self { options }
    }

    pub fn compile(&self, system: &EnergySystem, diag: &mut Diagnostics) -> EnsysResult<Model> {
        let periods = system.periods();
        let mut lp = LinearProgram::new("ensys energy balance model");

        let mut columns = Vec::with_capacity(system.num_flows());
        let mut flow_labels = Vec::with_capacity(system.num_flows());
        for flow in system.flows() {
            let stem = format!(
                "flow_{}_{}_{}",
                flow.index,
                sanitize_name(flow.from),
                sanitize_name(flow.to)
            );
            let mut cols = Vec::with_capacity(periods);
            for t in 0..periods {
                let (lower, upper) = flow.flow.bounds(t);
                if lower.is_nan() || upper.is_nan() || lower > upper {
                    return Err(EnsysError::model_build(
                        Stage::Compile,
                        format!(
                            "flow '{}' has empty bounds [{}, {}] at t={}",
                            flow.name(),
                            lower,
                            upper,
                            t
                        ),
                    ));
                }
                cols.push(lp.add_column(format!("{}_{}", stem, t), lower, upper, flow.flow.cost(t)));
            }
            columns.push(cols);
            flow_labels.push((flow.from.to_string(), flow.to.to_string()));
        }

        let mut balance_rows = Vec::new();
        for (bus_idx, bus) in system.buses() {
            let (inflows, outflows) = system.bus_edges(bus_idx);
            if inflows.is_empty() && outflows.is_empty() {
                if self.options.strict_buses {
                    diag.error(Stage::Compile, "bus has no attached flows").on(&bus.label);
                    return Err(EnsysError::model_build(
                        Stage::Compile,
                        format!("bus '{}' has no attached flows", bus.label),
                    ));
                }
                warn!(bus = %bus.label, "bus has no attached flows; no balance rows emitted");
                diag.warn(Stage::Compile, "bus has no attached flows").on(&bus.label);
                continue;
            }

            let row_stem = format!("balance_{}_{}", bus_idx.index(), sanitize_name(&bus.label));
            for t in 0..periods {
                let terms: Vec<(usize, f64)> = inflows
                    .iter()
                    .map(|e| (columns[e.index()][t], 1.0))
                    .chain(outflows.iter().map(|e| (columns[e.index()][t], -1.0)))
                    .collect();
                lp.add_row(format!("{}_{}", row_stem, t), terms, RowSense::Equal, 0.0);
                balance_rows.push((bus.label.clone(), t));
            }
        }

        info!(
            variables = lp.num_columns(),
            constraints = lp.num_rows(),
            "compiled model"
        );
        debug!(
            fixed = lp.columns.iter().filter(|c| c.is_fixed()).count(),
            "fixed columns"
        );

        Ok(Model {
            lp,
            columns,
            flow_labels,
            balance_rows,
            periods,
        })
    }
}
