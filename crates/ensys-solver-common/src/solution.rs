//! Parsers for the solution files written by native solvers.

use crate::error::{SolverError, SolverResult};
use crate::lp::LinearProgram;
use ensys_core::SolveStatus;
use std::collections::HashMap;

/// Column values read back from a native solver, in LP column order.
#[derive(Debug, Clone, PartialEq)]
pub struct NativeSolution {
    pub status: SolveStatus,
    pub objective: Option<f64>,
    /// Empty unless the status is optimal.
    pub values: Vec<f64>,
    pub solve_time_ms: u64,
    /// The solver stopped on its own time limit rather than finishing.
    pub time_limited: bool,
}

fn column_lookup(lp: &LinearProgram) -> HashMap<&str, usize> {
    lp.columns
        .iter()
        .enumerate()
        .map(|(i, c)| (c.name.as_str(), i))
        .collect()
}

fn classify(status_text: &str) -> SolveStatus {
    let lower = status_text.to_ascii_lowercase();
    if lower.contains("infeasible") {
        SolveStatus::Infeasible
    } else if lower.contains("unbounded") {
        SolveStatus::Unbounded
    } else if lower.starts_with("optimal") {
        SolveStatus::Optimal
    } else {
        SolveStatus::Error
    }
}

/// CBC: `Stopped on time - objective value ...`; HiGHS: `Time limit reached`.
fn is_time_limit(status_text: &str) -> bool {
    let lower = status_text.to_ascii_lowercase();
    lower.starts_with("stopped on time") || lower.starts_with("time limit")
}

fn parse_number(token: &str, context: &str) -> SolverResult<f64> {
    token.parse::<f64>().map_err(|_| {
        SolverError::MalformedSolution(format!("cannot parse '{}' as a number in {}", token, context))
    })
}

/// Parse a CBC `solu` report.
///
/// The first line carries the status and objective
/// (`Optimal - objective value 12.5`); each following line is
/// `index name value reduced_cost`, optionally prefixed by `**` when the
/// entry violates a bound. Columns CBC omits are zero.
pub fn parse_cbc(text: &str, lp: &LinearProgram) -> SolverResult<NativeSolution> {
    let mut lines = text.lines().filter(|l| !l.trim().is_empty());
    let header = lines
        .next()
        .ok_or_else(|| SolverError::MalformedSolution("empty CBC solution file".to_string()))?;

    let status = classify(header.trim());
    let time_limited = is_time_limit(header.trim());
    let objective = header
        .split("objective value")
        .nth(1)
        .map(|rest| parse_number(rest.trim(), "CBC objective"))
        .transpose()?;

    if !status.is_optimal() {
        return Ok(NativeSolution {
            status,
            objective,
            values: Vec::new(),
            solve_time_ms: 0,
            time_limited,
        });
    }

    let lookup = column_lookup(lp);
    let mut values = vec![0.0; lp.num_columns()];
    for line in lines {
        let cleaned = line.trim().trim_start_matches("**").trim();
        let tokens: Vec<&str> = cleaned.split_whitespace().collect();
        if tokens.len() < 3 {
            return Err(SolverError::MalformedSolution(format!(
                "unexpected CBC solution line '{}'",
                line.trim()
            )));
        }
        // Row activities share the file with columns; only columns matter here.
        if let Some(&col) = lookup.get(tokens[1]) {
            values[col] = parse_number(tokens[2], "CBC column value")?;
        }
    }

    Ok(NativeSolution {
        status,
        objective,
        values,
        solve_time_ms: 0,
        time_limited: false,
    })
}

/// Parse a HiGHS raw solution file (`--solution_file`).
pub fn parse_highs(text: &str, lp: &LinearProgram) -> SolverResult<NativeSolution> {
    let lines: Vec<&str> = text.lines().map(str::trim).collect();

    let status_pos = lines
        .iter()
        .position(|l| *l == "Model status")
        .ok_or_else(|| SolverError::MalformedSolution("missing 'Model status' in HiGHS solution".to_string()))?;
    let status_text = lines[status_pos + 1..]
        .iter()
        .find(|l| !l.is_empty())
        .ok_or_else(|| SolverError::MalformedSolution("missing HiGHS model status value".to_string()))?;
    let status = classify(status_text);
    let time_limited = is_time_limit(status_text);

    let objective = lines
        .iter()
        .find_map(|l| l.strip_prefix("Objective "))
        .map(|v| parse_number(v.trim(), "HiGHS objective"))
        .transpose()?;

    if !status.is_optimal() {
        return Ok(NativeSolution {
            status,
            objective,
            values: Vec::new(),
            solve_time_ms: 0,
            time_limited,
        });
    }

    let (header_pos, count) = lines
        .iter()
        .enumerate()
        .find_map(|(i, l)| {
            l.strip_prefix("# Columns ")
                .and_then(|n| n.trim().parse::<usize>().ok())
                .map(|n| (i, n))
        })
        .ok_or_else(|| SolverError::MalformedSolution("missing '# Columns' section in HiGHS solution".to_string()))?;

    if count != lp.num_columns() {
        return Err(SolverError::MalformedSolution(format!(
            "HiGHS reported {} columns, model has {}",
            count,
            lp.num_columns()
        )));
    }

    let lookup = column_lookup(lp);
    let mut values: Vec<Option<f64>> = vec![None; lp.num_columns()];
    for line in lines.iter().skip(header_pos + 1).take(count) {
        let mut tokens = line.split_whitespace();
        let (Some(name), Some(value)) = (tokens.next(), tokens.next()) else {
            return Err(SolverError::MalformedSolution(format!(
                "unexpected HiGHS column line '{}'",
                line
            )));
        };
        let col = lookup.get(name).ok_or_else(|| {
            SolverError::MalformedSolution(format!("HiGHS reported unknown column '{}'", name))
        })?;
        values[*col] = Some(parse_number(value, "HiGHS column value")?);
    }

    let values = values
        .into_iter()
        .enumerate()
        .map(|(i, v)| {
            v.ok_or_else(|| {
                SolverError::MalformedSolution(format!(
                    "HiGHS solution has no value for column '{}'",
                    lp.columns[i].name
                ))
            })
        })
        .collect::<SolverResult<Vec<f64>>>()?;

    Ok(NativeSolution {
        status,
        objective,
        values,
        solve_time_ms: 0,
        time_limited: false,
    })
}
