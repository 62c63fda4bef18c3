//! Core data model for ensys energy-balance models.
//!
//! An [`EnergySystem`] is a [`TimeIndex`] plus a directed graph of [`Node`]s
//! (buses, sources, sinks) connected by [`Flow`]s. Systems are assembled and
//! validated by [`NetworkBuilder`]; solved values come back as a [`ResultsSet`].

pub mod builder;
pub mod diagnostics;
pub mod error;
pub mod results;
pub mod time_index;

pub use builder::{NetworkBuilder, NodeSpec};
pub use diagnostics::{DiagnosticIssue, Diagnostics, Severity};
pub use error::{EnsysError, EnsysResult, Stage};
pub use results::{BusView, FlowSeries, ResultsSet, SolveMeta, SolveStatus};
pub use time_index::{Frequency, FrequencyUnit, TimeIndex, TimeIndexBuilder};

use petgraph::graph::{DiGraph, EdgeIndex, NodeIndex};
use petgraph::visit::EdgeRef;
use petgraph::Direction;
use serde::{Deserialize, Serialize};
use std::fmt;

/// A flow parameter given either once for all timesteps or per timestep.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(untagged)]
pub enum Sequence {
    Scalar(f64),
    Series(Vec<f64>),
}

impl Sequence {
    /// Value at timestep `t`.
    ///
    /// Panics if `t` is past the end of a series; validated flows always have
    /// one entry per timestep.
    pub fn at(&self, t: usize) -> f64 {
        match self {
            Sequence::Scalar(v) => *v,
            Sequence::Series(values) => values[t],
        }
    }

    /// Length of a per-timestep series; `None` for a scalar.
    pub fn series_len(&self) -> Option<usize> {
        match self {
            Sequence::Scalar(_) => None,
            Sequence::Series(values) => Some(values.len()),
        }
    }

    /// Every stored value: one for a scalar, the whole series otherwise.
    pub fn values(&self) -> Box<dyn Iterator<Item = f64> + '_> {
        match self {
            Sequence::Scalar(v) => Box::new(std::iter::once(*v)),
            Sequence::Series(values) => Box::new(values.iter().copied()),
        }
    }

    pub fn is_zero(&self) -> bool {
        self.values().all(|v| v == 0.0)
    }
}

impl From<f64> for Sequence {
    fn from(v: f64) -> Self {
        Sequence::Scalar(v)
    }
}

impl From<Vec<f64>> for Sequence {
    fn from(values: Vec<f64>) -> Self {
        Sequence::Series(values)
    }
}

fn default_min() -> Sequence {
    Sequence::Scalar(0.0)
}

fn default_max() -> Sequence {
    Sequence::Scalar(1.0)
}

fn default_cost() -> Sequence {
    Sequence::Scalar(0.0)
}

/// Directed edge between a source/sink and a bus.
///
/// Per-timestep bounds:
/// - fixed: `fix[t] * nominal` for both bounds
/// - free with a nominal value: `[min(t) * nominal, max(t) * nominal]`
/// - free without a nominal value: `[0, +inf)`
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Flow {
    /// Capacity that `fix`, `min` and `max` are scaled by.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub nominal_value: Option<f64>,
    /// Relative profile, one entry per timestep. Ignored without a nominal value.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub fix: Option<Vec<f64>>,
    /// Relative lower bound, default 0.
    #[serde(default = "default_min")]
    pub min: Sequence,
    /// Relative upper bound, default 1.
    #[serde(default = "default_max")]
    pub max: Sequence,
    /// Objective coefficient per unit of flow.
    #[serde(default = "default_cost")]
    pub variable_cost: Sequence,
}

impl Default for Flow {
    fn default() -> Self {
        Flow {
            nominal_value: None,
            fix: None,
            min: default_min(),
            max: default_max(),
            variable_cost: default_cost(),
        }
    }
}

impl Flow {
    /// Flow accepting any non-negative amount.
    pub fn unrestricted() -> Self {
        Flow::default()
    }

    /// Flow pinned to `profile[t] * nominal_value`.
    pub fn fixed(profile: Vec<f64>, nominal_value: f64) -> Self {
        Flow {
            nominal_value: Some(nominal_value),
            fix: Some(profile),
            ..Flow::default()
        }
    }

    pub fn with_nominal_value(mut self, nominal_value: f64) -> Self {
        self.nominal_value = Some(nominal_value);
        self
    }

    pub fn with_min(mut self, min: impl Into<Sequence>) -> Self {
        self.min = min.into();
        self
    }

    pub fn with_max(mut self, max: impl Into<Sequence>) -> Self {
        self.max = max.into();
        self
    }

    pub fn with_variable_cost(mut self, cost: impl Into<Sequence>) -> Self {
        self.variable_cost = cost.into();
        self
    }

    pub fn is_fixed(&self) -> bool {
        self.fix.is_some()
    }

    /// `(lower, upper)` bound of the flow at timestep `t`.
    pub fn bounds(&self, t: usize) -> (f64, f64) {
        match (self.nominal_value, &self.fix) {
            (Some(nominal), Some(profile)) => {
                let v = profile[t] * nominal;
                (v, v)
            }
            (Some(nominal), None) => (self.min.at(t) * nominal, self.max.at(t) * nominal),
            (None, _) => (0.0, f64::INFINITY),
        }
    }

    /// Variable cost at timestep `t`.
    pub fn cost(&self, t: usize) -> f64 {
        self.variable_cost.at(t)
    }
}

/// Node kind as written in scenario files.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Role {
    Bus,
    Source,
    Sink,
}

impl fmt::Display for Role {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(match self {
            Role::Bus => "bus",
            Role::Source => "source",
            Role::Sink => "sink",
        })
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Bus {
    pub label: String,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Source {
    pub label: String,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Sink {
    pub label: String,
}

/// Graph vertex: a balancing bus or a component feeding/drawing from one.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub enum Node {
    Bus(Bus),
    Source(Source),
    Sink(Sink),
}

impl Node {
    pub fn new(role: Role, label: impl Into<String>) -> Self {
        let label = label.into();
        match role {
            Role::Bus => Node::Bus(Bus { label }),
            Role::Source => Node::Source(Source { label }),
            Role::Sink => Node::Sink(Sink { label }),
        }
    }

    pub fn label(&self) -> &str {
        match self {
            Node::Bus(bus) => &bus.label,
            Node::Source(source) => &source.label,
            Node::Sink(sink) => &sink.label,
        }
    }

    pub fn role(&self) -> Role {
        match self {
            Node::Bus(_) => Role::Bus,
            Node::Source(_) => Role::Source,
            Node::Sink(_) => Role::Sink,
        }
    }

    pub fn is_bus(&self) -> bool {
        matches!(self, Node::Bus(_))
    }

    /// Whether a flow may leave (`Outgoing`) or enter (`Incoming`) this node.
    pub fn accepts_flow(&self, direction: Direction) -> bool {
        match self {
            Node::Bus(_) => true,
            Node::Source(_) => direction == Direction::Outgoing,
            Node::Sink(_) => direction == Direction::Incoming,
        }
    }

    /// Orient the flow owned by this node: sources feed the bus, sinks draw
    /// from it. Buses own no flow.
    pub fn attach(&self, me: NodeIndex, bus: NodeIndex) -> Option<(NodeIndex, NodeIndex)> {
        if self.is_bus() {
            None
        } else if self.accepts_flow(Direction::Outgoing) {
            Some((me, bus))
        } else {
            Some((bus, me))
        }
    }
}

/// Borrowed view of one flow with its endpoint labels.
#[derive(Debug, Clone, Copy)]
pub struct FlowRef<'a> {
    /// Edge index, equal to the flow's insertion position.
    pub index: usize,
    pub from: &'a str,
    pub to: &'a str,
    pub flow: &'a Flow,
}

impl FlowRef<'_> {
    /// Display name such as `pv -> electricity`.
    pub fn name(&self) -> String {
        format!("{} -> {}", self.from, self.to)
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize)]
pub struct SystemStats {
    pub num_buses: usize,
    pub num_sources: usize,
    pub num_sinks: usize,
    pub num_flows: usize,
    pub num_periods: usize,
}

/// Validated energy system. Construct with [`NetworkBuilder`].
#[derive(Debug, Clone)]
pub struct EnergySystem {
    time_index: TimeIndex,
    graph: DiGraph<Node, Flow>,
}

impl EnergySystem {
    pub(crate) fn from_parts(time_index: TimeIndex, graph: DiGraph<Node, Flow>) -> Self {
        Self { time_index, graph }
    }

    pub fn time_index(&self) -> &TimeIndex {
        &self.time_index
    }

    pub fn periods(&self) -> usize {
        self.time_index.len()
    }

    pub fn graph(&self) -> &DiGraph<Node, Flow> {
        &self.graph
    }

    /// Nodes in insertion order.
    pub fn nodes(&self) -> impl Iterator<Item = &Node> {
        self.graph.node_weights()
    }

    /// Graph index of the node labelled `label`.
    pub fn node_index(&self, label: &str) -> Option<NodeIndex> {
        self.graph
            .node_indices()
            .find(|&idx| self.graph[idx].label() == label)
    }

    pub fn buses(&self) -> impl Iterator<Item = (NodeIndex, &Bus)> {
        self.graph
            .node_indices()
            .filter_map(move |idx| match &self.graph[idx] {
                Node::Bus(bus) => Some((idx, bus)),
                _ => None,
            })
    }

    /// Flows in insertion order.
    pub fn flows(&self) -> impl Iterator<Item = FlowRef<'_>> {
        self.graph.edge_references().map(move |edge| FlowRef {
            index: edge.id().index(),
            from: self.graph[edge.source()].label(),
            to: self.graph[edge.target()].label(),
            flow: edge.weight(),
        })
    }

    pub fn num_flows(&self) -> usize {
        self.graph.edge_count()
    }

    /// The flow between two labelled nodes, if one exists.
    pub fn flow(&self, from: &str, to: &str) -> Option<&Flow> {
        self.flows()
            .find(|f| f.from == from && f.to == to)
            .map(|f| f.flow)
    }

    /// Edge indices of flows into and out of `bus`, in insertion order.
    pub fn bus_edges(&self, bus: NodeIndex) -> (Vec<EdgeIndex>, Vec<EdgeIndex>) {
        let mut inflows: Vec<EdgeIndex> = self
            .graph
            .edges_directed(bus, Direction::Incoming)
            .map(|e| e.id())
            .collect();
        let mut outflows: Vec<EdgeIndex> = self
            .graph
            .edges_directed(bus, Direction::Outgoing)
            .map(|e| e.id())
            .collect();
        inflows.sort();
        outflows.sort();
        (inflows, outflows)
    }

    /// Node counts by role, flow count and period count.
    pub fn stats(&self) -> SystemStats {
        let mut stats = SystemStats {
            num_flows: self.graph.edge_count(),
            num_periods: self.time_index.len(),
            ..SystemStats::default()
        };
        for node in self.graph.node_weights() {
            match node.role() {
                Role::Bus => stats.num_buses += 1,
                Role::Source => stats.num_sources += 1,
                Role::Sink => stats.num_sinks += 1,
            }
        }
        stats
    }

    /// Declarative description that rebuilds this system through
    /// [`NetworkBuilder`].
    pub fn to_specs(&self) -> Vec<NodeSpec> {
        self.graph
            .node_indices()
            .map(|idx| match &self.graph[idx] {
                Node::Bus(bus) => NodeSpec::bus(bus.label.clone()),
                node => {
                    let owned = self
                        .graph
                        .edges_directed(idx, Direction::Outgoing)
                        .chain(self.graph.edges_directed(idx, Direction::Incoming))
                        .next();
                    let bus = owned.map(|edge| {
                        let bus_idx = if edge.source() == idx {
                            edge.target()
                        } else {
                            edge.source()
                        };
                        self.graph[bus_idx].label().to_string()
                    });
                    NodeSpec {
                        label: node.label().to_string(),
                        role: node.role(),
                        bus,
                        flow: owned.map(|edge| edge.weight().clone()),
                    }
                }
            })
            .collect()
    }
}

impl PartialEq for EnergySystem {
    fn eq(&self, other: &Self) -> bool {
        if self.time_index != other.time_index
            || self.graph.node_count() != other.graph.node_count()
            || self.graph.edge_count() != other.graph.edge_count()
        {
            return false;
        }
        let nodes_equal = self
            .graph
            .node_weights()
            .zip(other.graph.node_weights())
            .all(|(a, b)| a == b);
        let edges_equal = self
            .graph
            .edge_references()
            .zip(other.graph.edge_references())
            .all(|(a, b)| {
                a.source() == b.source() && a.target() == b.target() && a.weight() == b.weight()
            });
        nodes_equal && edges_equal
    }
}
