//! Solver-agnostic linear program and its CPLEX LP file form.
//!
//! The LP file is what native solvers read and what the debug dump writes:
//!
//! ```text
//! \ ensys energy balance model
//! Minimize
//!  obj: 0 flow_0_pv_electricity_0 + 0 flow_1_electricity_demand_0
//! Subject To
//!  balance_0_electricity_0: + 1 flow_0_pv_electricity_0 - 1 flow_1_electricity_demand_0 = 0
//! Bounds
//!  flow_0_pv_electricity_0 = 146300
//!  0 <= flow_1_electricity_demand_0 <= 700
//! End
//! ```

use std::fs;
use std::io::{self, Write};
use std::path::Path;

/// Terms per line before wrapping; keeps lines short for strict readers.
const TERMS_PER_LINE: usize = 8;

#[derive(Debug, Clone, PartialEq)]
pub struct Column {
    pub name: String,
    pub lower: f64,
    pub upper: f64,
    pub cost: f64,
}

impl Column {
    pub fn is_fixed(&self) -> bool {
        self.lower == self.upper
    }
}

/// Linear row `sum(coef * column) (= | <= | >=) rhs`.
#[derive(Debug, Clone, PartialEq)]
pub struct Row {
    pub name: String,
    pub terms: Vec<(usize, f64)>,
    pub sense: RowSense,
    pub rhs: f64,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum RowSense {
    Equal,
    LessEqual,
    GreaterEqual,
}

impl RowSense {
    fn symbol(&self) -> &'static str {
        match self {
            RowSense::Equal => "=",
            RowSense::LessEqual => "<=",
            RowSense::GreaterEqual => ">=",
        }
    }

    /// Whether `lhs` satisfies the row against `rhs` within `tol`.
    pub fn holds(&self, lhs: f64, rhs: f64, tol: f64) -> bool {
        match self {
            RowSense::Equal => (lhs - rhs).abs() <= tol,
            RowSense::LessEqual => lhs <= rhs + tol,
            RowSense::GreaterEqual => lhs >= rhs - tol,
        }
    }
}

/// Minimization LP with bounded continuous columns.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct LinearProgram {
    pub name: String,
    pub columns: Vec<Column>,
    pub rows: Vec<Row>,
}

impl LinearProgram {
    pub fn new(name: impl Into<String>) -> Self {
        Self {
            name: name.into(),
            columns: Vec::new(),
            rows: Vec::new(),
        }
    }

    pub fn add_column(&mut self, name: String, lower: f64, upper: f64, cost: f64) -> usize {
        self.columns.push(Column {
            name,
            lower,
            upper,
            cost,
        });
        self.columns.len() - 1
    }

    pub fn add_row(&mut self, name: String, terms: Vec<(usize, f64)>, sense: RowSense, rhs: f64) {
        self.rows.push(Row {
            name,
            terms,
            sense,
            rhs,
        });
    }

    pub fn num_columns(&self) -> usize {
        self.columns.len()
    }

    pub fn num_rows(&self) -> usize {
        self.rows.len()
    }

    pub fn column_index(&self, name: &str) -> Option<usize> {
        self.columns.iter().position(|c| c.name == name)
    }

    pub fn objective_value(&self, values: &[f64]) -> f64 {
        self.columns
            .iter()
            .zip(values)
            .map(|(c, v)| c.cost * v)
            .sum()
    }

    /// Largest absolute row violation for the given assignment.
    pub fn max_violation(&self, values: &[f64]) -> f64 {
        self.rows
            .iter()
            .map(|row| {
                let lhs: f64 = row.terms.iter().map(|&(c, a)| a * values[c]).sum();
                let diff = lhs - row.rhs;
                match row.sense {
                    RowSense::Equal => diff.abs(),
                    RowSense::LessEqual => diff.max(0.0),
                    RowSense::GreaterEqual => (-diff).max(0.0),
                }
            })
            .fold(0.0, f64::max)
    }

    pub fn write_lp<W: Write>(&self, mut w: W) -> io::Result<()> {
        writeln!(w, "\\ {}", self.name)?;
        writeln!(w, "Minimize")?;
        write!(w, " obj:")?;
        if self.columns.is_empty() {
            write!(w, " 0")?;
        }
        for (i, column) in self.columns.iter().enumerate() {
            if i > 0 && i % TERMS_PER_LINE == 0 {
                write!(w, "\n     ")?;
            }
            write_term(&mut w, column.cost, &column.name, i == 0)?;
        }
        writeln!(w)?;

        writeln!(w, "Subject To")?;
        for row in &self.rows {
            write!(w, " {}:", row.name)?;
            if row.terms.is_empty() {
                write!(w, " 0 {}", self.columns.first().map_or("", |c| c.name.as_str()))?;
            }
            for (i, &(col, coef)) in row.terms.iter().enumerate() {
                if i > 0 && i % TERMS_PER_LINE == 0 {
                    write!(w, "\n    ")?;
                }
                write_term(&mut w, coef, &self.columns[col].name, false)?;
            }
            writeln!(w, " {} {}", row.sense.symbol(), fmt_num(row.rhs))?;
        }

        writeln!(w, "Bounds")?;
        for column in &self.columns {
            let (lo, up) = (column.lower, column.upper);
            if lo == up {
                writeln!(w, " {} = {}", column.name, fmt_num(lo))?;
            } else if lo == f64::NEG_INFINITY && up == f64::INFINITY {
                writeln!(w, " {} free", column.name)?;
            } else if up == f64::INFINITY {
                writeln!(w, " {} >= {}", column.name, fmt_num(lo))?;
            } else {
                writeln!(w, " {} <= {} <= {}", fmt_num(lo), column.name, fmt_num(up))?;
            }
        }
        writeln!(w, "End")?;
        Ok(())
    }

    pub fn to_lp_string(&self) -> String {
        let mut buf = Vec::new();
        // Writing into a Vec cannot fail.
        let _ = self.write_lp(&mut buf);
        String::from_utf8_lossy(&buf).into_owned()
    }

    /// Write the LP file, creating parent directories as needed.
    pub fn write_lp_file(&self, path: &Path) -> io::Result<()> {
        if let Some(parent) = path.parent() {
            if !parent.as_os_str().is_empty() {
                fs::create_dir_all(parent)?;
            }
        }
        let file = fs::File::create(path)?;
        let mut writer = io::BufWriter::new(file);
        self.write_lp(&mut writer)?;
        writer.flush()
    }
}

fn write_term<W: Write>(w: &mut W, coef: f64, name: &str, first: bool) -> io::Result<()> {
    if coef < 0.0 {
        write!(w, " - {} {}", fmt_num(-coef), name)
    } else if first {
        write!(w, " {} {}", fmt_num(coef), name)
    } else {
        write!(w, " + {} {}", fmt_num(coef), name)
    }
}

/// Format a number for the LP file. Rust's shortest round-trip `Display`
/// never uses exponents, which keeps every reader happy.
pub fn fmt_num(v: f64) -> String {
    if v == f64::INFINITY {
        "+inf".to_string()
    } else if v == f64::NEG_INFINITY {
        "-inf".to_string()
    } else if v == 0.0 {
        "0".to_string()
    } else {
        format!("{}", v)
    }
}

/// Make an LP-safe identifier fragment: ASCII alphanumerics and `_` only.
pub fn sanitize_name(raw: &str) -> String {
    let cleaned: String = raw
        .chars()
        .map(|c| if c.is_ascii_alphanumeric() { c } else { '_' })
        .collect();
    if cleaned.is_empty() {
        "_".to_string()
    } else {
        cleaned
    }
}
