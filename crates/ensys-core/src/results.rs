//! Solved flow values and solve metadata.

use serde::{Deserialize, Serialize};
use std::fmt;

/// Outcome classification of a solve attempt.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum SolveStatus {
    Optimal,
    Infeasible,
    Unbounded,
    Error,
}

impl SolveStatus {
    /// Only optimal solves carry flow values.
    pub fn is_optimal(&self) -> bool {
        matches!(self, SolveStatus::Optimal)
    }
}

impl fmt::Display for SolveStatus {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(match self {
            SolveStatus::Optimal => "optimal",
            SolveStatus::Infeasible => "infeasible",
            SolveStatus::Unbounded => "unbounded",
            SolveStatus::Error => "error",
        })
    }
}

/// Scalars describing the solve that produced a [`ResultsSet`].
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct SolveMeta {
    /// Objective value reported for the solve; 0 when none was computed.
    pub objective: f64,
    pub status: SolveStatus,
    /// Backend name, e.g. `clarabel` or `cbc`.
    pub solver: String,
    /// Wall-clock solve time, when measured.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub solve_time_ms: Option<u64>,
    /// LP columns, one per flow and timestep.
    pub num_variables: usize,
    /// LP rows, one per non-degenerate bus and timestep.
    pub num_constraints: usize,
}

/// Solved values of one flow, aligned to the time index.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct FlowSeries {
    /// Label of the node the flow leaves.
    pub from: String,
    /// Label of the node the flow enters.
    pub to: String,
    pub values: Vec<f64>,
}

impl FlowSeries {
    /// `from -> to`, as used in tables and CSV headers.
    pub fn name(&self) -> String {
        format!("{} -> {}", self.from, self.to)
    }

    /// Sum over all timesteps.
    pub fn total(&self) -> f64 {
        self.values.iter().sum()
    }
}

/// Every solved flow plus solve metadata. Produced by the results extractor
/// and restored from snapshots.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ResultsSet {
    /// One entry per flow, in the system's flow order.
    pub flows: Vec<FlowSeries>,
    pub meta: SolveMeta,
}

impl ResultsSet {
    /// Series of the flow from `from` to `to`.
    pub fn flow(&self, from: &str, to: &str) -> Option<&FlowSeries> {
        self.flows.iter().find(|f| f.from == from && f.to == to)
    }

    /// Flows that start or end at `label`.
    pub fn touching<'a>(&'a self, label: &'a str) -> impl Iterator<Item = &'a FlowSeries> {
        self.flows
            .iter()
            .filter(move |f| f.from == label || f.to == label)
    }

    /// Flows into and out of `bus`. `None` if no flow touches it.
    pub fn bus_view(&self, bus: &str) -> Option<BusView<'_>> {
        let inflows: Vec<&FlowSeries> = self.flows.iter().filter(|f| f.to == bus).collect();
        let outflows: Vec<&FlowSeries> = self.flows.iter().filter(|f| f.from == bus).collect();
        if inflows.is_empty() && outflows.is_empty() {
            return None;
        }
        Some(BusView {
            bus: bus.to_string(),
            inflows,
            outflows,
        })
    }

    /// Timesteps covered; 0 for a system without flows.
    pub fn periods(&self) -> usize {
        self.flows.first().map_or(0, |f| f.values.len())
    }
}

/// All flows around one bus.
#[derive(Debug, Clone)]
pub struct BusView<'a> {
    pub bus: String,
    pub inflows: Vec<&'a FlowSeries>,
    pub outflows: Vec<&'a FlowSeries>,
}

impl BusView<'_> {
    /// `sum(inflows) - sum(outflows)` at timestep `t`.
    pub fn residual(&self, t: usize) -> f64 {
        let inflow: f64 = self.inflows.iter().map(|f| f.values[t]).sum();
        let outflow: f64 = self.outflows.iter().map(|f| f.values[t]).sum();
        inflow - outflow
    }

    /// Inflows then outflows.
    pub fn columns(&self) -> impl Iterator<Item = &FlowSeries> {
        self.inflows.iter().chain(self.outflows.iter()).copied()
    }
}
