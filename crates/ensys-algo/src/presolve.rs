//! Removal of fixed columns and forced rows before a backend sees the LP.
//!
//! Fixed columns (equal bounds) become constants. Rows whose columns are all
//! known are checked directly, and equality rows with a single unknown column
//! pin that column. This repeats until nothing changes. A violated row or a
//! pinned value outside its column bounds proves the LP infeasible.

use ensys_solver_common::{LinearProgram, RowSense};

const TOLERANCE: f64 = 1e-9;

#[derive(Debug, Clone)]
pub(crate) struct Presolved {
    /// Known column values; `None` for columns a backend still has to solve.
    pub values: Vec<Option<f64>>,
    /// Rows that still contain unknown columns.
    pub active_rows: Vec<usize>,
    /// Set when presolve proved infeasibility.
    pub infeasible: Option<String>,
}

impl Presolved {
    pub fn num_free(&self) -> usize {
        self.values.iter().filter(|v| v.is_none()).count()
    }

    pub fn is_complete(&self) -> bool {
        self.values.iter().all(Option::is_some)
    }
}

fn tolerance(scale: f64) -> f64 {
    TOLERANCE * scale.abs().max(1.0)
}

pub(crate) fn presolve(lp: &LinearProgram) -> Presolved {
    let mut values: Vec<Option<f64>> = lp
        .columns
        .iter()
        .map(|c| c.is_fixed().then_some(c.lower))
        .collect();
    let mut resolved = vec![false; lp.num_rows()];

    loop {
        let mut changed = false;
        for (r, row) in lp.rows.iter().enumerate() {
            if resolved[r] {
                continue;
            }

            let mut residual = row.rhs;
            let mut free: Vec<(usize, f64)> = Vec::new();
            for &(c, a) in &row.terms {
                match values[c] {
                    Some(x) => residual -= a * x,
                    None => match free.iter_mut().find(|(fc, _)| *fc == c) {
                        Some(entry) => entry.1 += a,
                        None => free.push((c, a)),
                    },
                }
            }
            free.retain(|&(_, a)| a != 0.0);

            match free.as_slice() {
                [] => {
                    if !row.sense.holds(0.0, residual, tolerance(row.rhs)) {
                        return Presolved {
                            values,
                            active_rows: Vec::new(),
                            infeasible: Some(format!(
                                "row '{}' is violated by {} with every column fixed",
                                row.name, -residual
                            )),
                        };
                    }
                    resolved[r] = true;
                    changed = true;
                }
                [(c, a)] if row.sense == RowSense::Equal => {
                    let column = &lp.columns[*c];
                    let x = residual / a;
                    let tol = tolerance(x);
                    if x < column.lower - tol || x > column.upper + tol {
                        return Presolved {
                            values,
                            active_rows: Vec::new(),
                            infeasible: Some(format!(
                                "row '{}' forces column '{}' to {}, outside [{}, {}]",
                                row.name, column.name, x, column.lower, column.upper
                            )),
                        };
                    }
                    values[*c] = Some(x.clamp(column.lower, column.upper));
                    resolved[r] = true;
                    changed = true;
                }
                _ => {}
            }
        }
        if !changed {
            break;
        }
    }

    let active_rows = (0..lp.num_rows()).filter(|&r| !resolved[r]).collect();
    Presolved {
        values,
        active_rows,
        infeasible: None,
    }
}
