//! Assembly and validation of [`EnergySystem`]s from declarative node specs.
//!
//! Checks run in a fixed order so that the first reported problem is stable:
//! duplicate labels, node shape, flow parameters, then bus references.
//! Everything except an unresolved bus reference is a configuration error.

use crate::diagnostics::Diagnostics;
use crate::error::{EnsysError, EnsysResult, Stage};
use crate::{EnergySystem, Flow, Node, Role, Sequence, TimeIndex};
use petgraph::graph::{DiGraph, NodeIndex};
use serde::{Deserialize, Serialize};
use std::collections::{HashMap, HashSet};

/// Declarative description of one node and the flow it owns.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct NodeSpec {
    pub label: String,
    pub role: Role,
    /// Bus the owned flow connects to. Must be absent for buses.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub bus: Option<String>,
    /// Owned flow. Sources and sinks default to an unrestricted flow.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub flow: Option<Flow>,
}

impl NodeSpec {
    pub fn bus(label: impl Into<String>) -> Self {
        NodeSpec {
            label: label.into(),
            role: Role::Bus,
            bus: None,
            flow: None,
        }
    }

    pub fn source(label: impl Into<String>, bus: impl Into<String>, flow: Flow) -> Self {
        NodeSpec {
            label: label.into(),
            role: Role::Source,
            bus: Some(bus.into()),
            flow: Some(flow),
        }
    }

    pub fn sink(label: impl Into<String>, bus: impl Into<String>, flow: Flow) -> Self {
        NodeSpec {
            label: label.into(),
            role: Role::Sink,
            bus: Some(bus.into()),
            flow: Some(flow),
        }
    }

    /// Name of the owned flow in its direction, e.g. `pv -> electricity`.
    pub fn flow_name(&self) -> String {
        let bus = self.bus.as_deref().unwrap_or("?");
        match self.role {
            Role::Sink => format!("{} -> {}", bus, self.label),
            _ => format!("{} -> {}", self.label, bus),
        }
    }
}

/// Builds a validated [`EnergySystem`] over a fixed [`TimeIndex`].
#[derive(Debug, Clone)]
pub struct NetworkBuilder {
    time_index: TimeIndex,
    specs: Vec<NodeSpec>,
}

impl NetworkBuilder {
    pub fn new(time_index: TimeIndex) -> Self {
        Self {
            time_index,
            specs: Vec::new(),
        }
    }

    pub fn node(mut self, spec: NodeSpec) -> Self {
        self.specs.push(spec);
        self
    }

    pub fn nodes(mut self, specs: impl IntoIterator<Item = NodeSpec>) -> Self {
        self.specs.extend(specs);
        self
    }

    pub fn bus(self, label: impl Into<String>) -> Self {
        self.node(NodeSpec::bus(label))
    }

    pub fn source(self, label: impl Into<String>, bus: impl Into<String>, flow: Flow) -> Self {
        self.node(NodeSpec::source(label, bus, flow))
    }

    pub fn sink(self, label: impl Into<String>, bus: impl Into<String>, flow: Flow) -> Self {
        self.node(NodeSpec::sink(label, bus, flow))
    }

    /// Sink with unrestricted acceptance that absorbs any surplus on `bus`.
    pub fn excess(self, label: impl Into<String>, bus: impl Into<String>) -> Self {
        self.sink(label, bus, Flow::unrestricted())
    }

    pub fn build(self) -> EnsysResult<EnergySystem> {
        let mut diag = Diagnostics::new();
        self.build_with_diagnostics(&mut diag)
    }

    pub fn build_with_diagnostics(self, diag: &mut Diagnostics) -> EnsysResult<EnergySystem> {
        let periods = self.time_index.len();

        let mut seen = HashSet::new();
        for spec in &self.specs {
            if spec.label.trim().is_empty() {
                return Err(EnsysError::config(
                    Stage::Network,
                    format!("{} node has an empty label", spec.role),
                ));
            }
            if !seen.insert(spec.label.as_str()) {
                return Err(EnsysError::config(
                    Stage::Network,
                    format!("duplicate node label '{}'", spec.label),
                ));
            }
        }

        for spec in &self.specs {
            check_shape(spec)?;
        }

        for spec in &self.specs {
            if let Some(flow) = &spec.flow {
                validate_flow(&spec.flow_name(), flow, periods, diag)?;
            }
        }

        let mut graph = DiGraph::with_capacity(self.specs.len(), self.specs.len());
        let mut index: HashMap<&str, NodeIndex> = HashMap::new();
        for spec in &self.specs {
            let idx = graph.add_node(Node::new(spec.role, spec.label.clone()));
            index.insert(spec.label.as_str(), idx);
        }

        for spec in &self.specs {
            let Some(bus_label) = spec.bus.as_deref() else {
                continue;
            };
            let bus_idx = match index.get(bus_label) {
                Some(&idx) if graph[idx].is_bus() => idx,
                Some(&idx) => {
                    return Err(EnsysError::model_build(
                        Stage::Network,
                        format!(
                            "flow '{}' references '{}', which is a {} and not a bus",
                            spec.flow_name(),
                            bus_label,
                            graph[idx].role()
                        ),
                    ));
                }
                None => {
                    return Err(EnsysError::model_build(
                        Stage::Network,
                        format!(
                            "flow '{}' references unknown bus '{}'",
                            spec.flow_name(),
                            bus_label
                        ),
                    ));
                }
            };
            let me = index[spec.label.as_str()];
            if let Some((from, to)) = graph[me].attach(me, bus_idx) {
                graph.add_edge(from, to, spec.flow.clone().unwrap_or_default());
            }
        }

        let system = EnergySystem::from_parts(self.time_index, graph);
        let stats = system.stats();
        tracing::info!(
            buses = stats.num_buses,
            sources = stats.num_sources,
            sinks = stats.num_sinks,
            flows = stats.num_flows,
            periods = stats.num_periods,
            "built energy system"
        );
        Ok(system)
    }
}

fn check_shape(spec: &NodeSpec) -> EnsysResult<()> {
    match spec.role {
        Role::Bus if spec.bus.is_some() || spec.flow.is_some() => Err(EnsysError::config(
            Stage::Network,
            format!("bus '{}' cannot own a flow or reference a bus", spec.label),
        )),
        Role::Source | Role::Sink if spec.bus.is_none() => Err(EnsysError::config(
            Stage::Network,
            format!("{} '{}' must name the bus it connects to", spec.role, spec.label),
        )),
        _ => Ok(()),
    }
}

fn validate_flow(
    name: &str,
    flow: &Flow,
    periods: usize,
    diag: &mut Diagnostics,
) -> EnsysResult<()> {
    let fail = |message: String| {
        EnsysError::config(Stage::Network, format!("flow '{}': {}", name, message))
    };

    if let Some(nominal) = flow.nominal_value {
        if !nominal.is_finite() || nominal < 0.0 {
            return Err(fail(format!(
                "nominal value must be finite and non-negative, got {}",
                nominal
            )));
        }
    }

    if let Some(profile) = &flow.fix {
        if profile.len() != periods {
            return Err(fail(format!(
                "fixed profile has {} values but the time index has {} periods",
                profile.len(),
                periods
            )));
        }
        if flow.nominal_value.is_none() {
            return Err(fail("a fixed profile requires a nominal value".to_string()));
        }
        if let Some(t) = profile.iter().position(|v| !v.is_finite()) {
            return Err(fail(format!("fixed profile value at t={} is not finite", t)));
        }
        if let Some(t) = profile.iter().position(|v| *v < 0.0) {
            diag.warn(Stage::Network, "fixed profile is negative")
                .on(name)
                .at(t);
            tracing::warn!(flow = name, t, "fixed profile value is negative");
        }
    }

    for (what, seq) in [
        ("min", &flow.min),
        ("max", &flow.max),
        ("variable_cost", &flow.variable_cost),
    ] {
        if let Some(len) = seq.series_len() {
            if len != periods {
                return Err(fail(format!(
                    "{} has {} values but the time index has {} periods",
                    what, len, periods
                )));
            }
        }
        if seq.values().any(|v| !v.is_finite()) {
            return Err(fail(format!("{} must be finite", what)));
        }
    }

    if flow.nominal_value.is_some() && flow.fix.is_none() {
        for t in 0..periods {
            let (min, max) = (flow.min.at(t), flow.max.at(t));
            if min > max {
                return Err(fail(format!("min {} exceeds max {} at t={}", min, max, t)));
            }
        }
    } else if flow.nominal_value.is_none()
        && flow.fix.is_none()
        && (flow.min != Sequence::Scalar(0.0) || flow.max != Sequence::Scalar(1.0))
    {
        diag.warn(Stage::Network, "min/max are ignored without a nominal value")
            .on(name);
    }

    Ok(())
}
