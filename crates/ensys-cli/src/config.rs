//! TOML scenario files.
//!
//! A scenario describes one pipeline run: the time index, the nodes of the
//! energy system, named profiles the nodes refer to, and the solver, dump and
//! logging settings. Every section is optional and falls back to defaults.
//!
//! ```toml
//! truncate_profiles = true
//!
//! [time]
//! start = "2022-01-01"
//! periods = 24
//! freq = "h"
//!
//! [profiles]
//! pv = [0.0, 0.1, ...]
//!
//! [[nodes]]
//! label = "electricity"
//! role = "bus"
//!
//! [[nodes]]
//! label = "pv"
//! role = "source"
//! bus = "electricity"
//! nominal_value = 700.0
//! fix = "pv"
//! ```

use ensys_algo::{default_lp_dump_path, SolveOptions, SolverBackend};
use ensys_core::{
    EnsysError, EnsysResult, Flow, NodeSpec, Role, Sequence, Stage, TimeIndex, TimeIndexBuilder,
};
use ensys_io::{SnapshotLocation, DEFAULT_FILENAME};
use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;
use std::fs;
use std::path::{Path, PathBuf};

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(default, deny_unknown_fields)]
pub struct ScenarioConfig {
    /// Cut named profiles longer than `time.periods` instead of rejecting them.
    pub truncate_profiles: bool,
    pub time: TimeConfig,
    pub solver: SolverConfig,
    pub dump: DumpConfig,
    pub logging: LoggingConfig,
    pub profiles: BTreeMap<String, Vec<f64>>,
    pub nodes: Vec<NodeConfig>,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default, deny_unknown_fields)]
pub struct TimeConfig {
    pub start: String,
    pub periods: i64,
    pub freq: String,
}

impl Default for TimeConfig {
    fn default() -> Self {
        Self {
            start: "2022-01-01".to_string(),
            periods: 24,
            freq: "h".to_string(),
        }
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default, deny_unknown_fields)]
pub struct SolverConfig {
    pub name: String,
    pub verbose: bool,
    /// Write the LP file before solving, to `lp_file` or the default location.
    pub debug: bool,
    /// With `debug` on, shorten the horizon to this many periods and cut
    /// every series to match.
    pub debug_periods: Option<i64>,
    pub timeout_seconds: Option<u64>,
    pub lp_file: Option<PathBuf>,
}

impl Default for SolverConfig {
    fn default() -> Self {
        Self {
            name: "clarabel".to_string(),
            verbose: false,
            debug: false,
            debug_periods: None,
            timeout_seconds: None,
            lp_file: None,
        }
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default, deny_unknown_fields)]
pub struct DumpConfig {
    pub enabled: bool,
    pub dir: Option<PathBuf>,
    pub filename: String,
}

impl Default for DumpConfig {
    fn default() -> Self {
        Self {
            enabled: true,
            dir: None,
            filename: DEFAULT_FILENAME.to_string(),
        }
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default, deny_unknown_fields)]
pub struct LoggingConfig {
    pub level: String,
    pub file: Option<PathBuf>,
}

impl Default for LoggingConfig {
    fn default() -> Self {
        Self {
            level: "info".to_string(),
            file: None,
        }
    }
}

/// A flow parameter: a number, an inline series, or the name of a profile.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(untagged)]
pub enum ParamRef {
    Scalar(f64),
    Inline(Vec<f64>),
    Profile(String),
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct NodeConfig {
    pub label: String,
    pub role: Role,
    #[serde(default)]
    pub bus: Option<String>,
    #[serde(default)]
    pub nominal_value: Option<f64>,
    #[serde(default)]
    pub fix: Option<ParamRef>,
    #[serde(default)]
    pub min: Option<ParamRef>,
    #[serde(default)]
    pub max: Option<ParamRef>,
    #[serde(default)]
    pub variable_cost: Option<ParamRef>,
}

impl NodeConfig {
    fn has_flow_fields(&self) -> bool {
        self.nominal_value.is_some()
            || self.fix.is_some()
            || self.min.is_some()
            || self.max.is_some()
            || self.variable_cost.is_some()
    }
}

fn scenario_error(message: impl Into<String>) -> EnsysError {
    EnsysError::config(Stage::Scenario, message)
}

impl ScenarioConfig {
    pub fn load(path: &Path) -> EnsysResult<Self> {
        let text = fs::read_to_string(path).map_err(|e| {
            scenario_error(format!("cannot read scenario {}: {}", path.display(), e))
        })?;
        Self::from_toml_str(&text)
            .map_err(|e| scenario_error(format!("{}: {}", path.display(), e)))
    }

    pub fn from_toml_str(text: &str) -> Result<Self, toml::de::Error> {
        toml::from_str(text)
    }

    /// `time.periods`, or the debug horizon when that is shorter.
    pub fn effective_periods(&self) -> i64 {
        match (self.solver.debug, self.solver.debug_periods) {
            (true, Some(n)) => n.min(self.time.periods),
            _ => self.time.periods,
        }
    }

    fn debug_shortened(&self) -> bool {
        self.effective_periods() < self.time.periods
    }

    pub fn time_index(&self) -> EnsysResult<TimeIndex> {
        let periods = self.effective_periods();
        if self.debug_shortened() {
            tracing::info!(
                periods,
                configured = self.time.periods,
                "debug run: horizon shortened"
            );
        }
        TimeIndexBuilder::new(self.time.start.clone())
            .periods(periods)
            .freq(self.time.freq.clone())
            .build()
    }

    /// Node specs with profile references resolved.
    ///
    /// Sources and sinks without flow parameters get an unrestricted flow.
    /// Profile lengths are left for the network builder to check, except that
    /// named profiles are cut to `periods` when `truncate_profiles` is set,
    /// and every series is cut on a shortened debug run.
    pub fn to_node_specs(&self, periods: usize) -> EnsysResult<Vec<NodeSpec>> {
        self.nodes
            .iter()
            .map(|node| {
                let flow = if node.role == Role::Bus && !node.has_flow_fields() {
                    None
                } else {
                    Some(self.resolve_flow(node, periods)?)
                };
                Ok(NodeSpec {
                    label: node.label.clone(),
                    role: node.role,
                    bus: node.bus.clone(),
                    flow,
                })
            })
            .collect()
    }

    fn resolve_flow(&self, node: &NodeConfig, periods: usize) -> EnsysResult<Flow> {
        let mut flow = Flow::unrestricted();
        flow.nominal_value = node.nominal_value;
        if let Some(fix) = &node.fix {
            flow.fix = Some(match self.resolve(node, "fix", fix, periods)? {
                Sequence::Scalar(v) => vec![v; periods],
                Sequence::Series(values) => values,
            });
        }
        if let Some(min) = &node.min {
            flow.min = self.resolve(node, "min", min, periods)?;
        }
        if let Some(max) = &node.max {
            flow.max = self.resolve(node, "max", max, periods)?;
        }
        if let Some(cost) = &node.variable_cost {
            flow.variable_cost = self.resolve(node, "variable_cost", cost, periods)?;
        }
        Ok(flow)
    }

    fn resolve(
        &self,
        node: &NodeConfig,
        field: &str,
        param: &ParamRef,
        periods: usize,
    ) -> EnsysResult<Sequence> {
        match param {
            ParamRef::Scalar(v) => Ok(Sequence::Scalar(*v)),
            ParamRef::Inline(values) => {
                let mut values = values.clone();
                if self.debug_shortened() {
                    values.truncate(periods);
                }
                Ok(Sequence::Series(values))
            }
            ParamRef::Profile(name) => {
                let profile = self.profiles.get(name).ok_or_else(|| {
                    scenario_error(format!(
                        "node '{}' field '{}' references unknown profile '{}'",
                        node.label, field, name
                    ))
                })?;
                let mut values = profile.clone();
                if self.truncate_profiles || self.debug_shortened() {
                    values.truncate(periods);
                }
                Ok(Sequence::Series(values))
            }
        }
    }

    pub fn solve_options(&self) -> EnsysResult<SolveOptions> {
        let solver: SolverBackend = self.solver.name.parse()?;
        let lp_dump = match (&self.solver.lp_file, self.solver.debug) {
            (Some(path), _) => Some(path.clone()),
            (None, true) => Some(default_lp_dump_path()),
            (None, false) => None,
        };
        Ok(SolveOptions {
            solver,
            verbose: self.solver.verbose,
            timeout_seconds: self.solver.timeout_seconds,
            lp_dump,
        })
    }

    pub fn snapshot_location(&self) -> SnapshotLocation {
        SnapshotLocation::with_overrides(self.dump.dir.clone(), Some(self.dump.filename.clone()))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    const SCENARIO: &str = r#"
truncate_profiles = true

[time]
start = "2022-01-01"
periods = 3
freq = "h"

[solver]
name = "highs"
timeout_seconds = 60

[profiles]
pv = [0.1, 0.2, 0.3, 0.4]

[[nodes]]
label = "electricity"
role = "bus"

[[nodes]]
label = "pv"
role = "source"
bus = "electricity"
nominal_value = 700.0
fix = "pv"

[[nodes]]
label = "demand"
role = "sink"
bus = "electricity"
nominal_value = 1.0
fix = [5.0, 6.0, 7.0]

[[nodes]]
label = "excess_bel"
role = "sink"
bus = "electricity"
"#;

    #[test]
    fn test_parse_and_resolve() {
        let config = ScenarioConfig::from_toml_str(SCENARIO).unwrap();
        assert_eq!(config.time.periods, 3);
        assert_eq!(config.solver.timeout_seconds, Some(60));
        assert!(config.dump.enabled);
        assert_eq!(config.dump.filename, "es_dump.ensys");

        let specs = config.to_node_specs(3).unwrap();
        assert_eq!(specs.len(), 4);
        assert!(specs[0].flow.is_none());
        assert_eq!(specs[1].flow.as_ref().unwrap().fix, Some(vec![0.1, 0.2, 0.3]));
        assert_eq!(specs[2].flow.as_ref().unwrap().fix, Some(vec![5.0, 6.0, 7.0]));
        assert_eq!(specs[3].flow.as_ref().unwrap(), &Flow::unrestricted());
    }

    #[test]
    fn test_no_truncation_by_default() {
        let text = SCENARIO.replace("truncate_profiles = true", "");
        let config = ScenarioConfig::from_toml_str(&text).unwrap();
        let specs = config.to_node_specs(3).unwrap();
        assert_eq!(specs[1].flow.as_ref().unwrap().fix.as_ref().unwrap().len(), 4);
    }

    #[test]
    fn test_debug_periods_shorten_horizon() {
        let text = SCENARIO
            .replace("truncate_profiles = true", "")
            .replace("timeout_seconds = 60", "timeout_seconds = 60\ndebug_periods = 2");
        let mut config = ScenarioConfig::from_toml_str(&text).unwrap();
        assert_eq!(config.solver.debug_periods, Some(2));
        assert_eq!(config.time_index().unwrap().len(), 3);

        config.solver.debug = true;
        let index = config.time_index().unwrap();
        assert_eq!(index.len(), 2);
        let specs = config.to_node_specs(index.len()).unwrap();
        assert_eq!(specs[1].flow.as_ref().unwrap().fix, Some(vec![0.1, 0.2]));
        assert_eq!(specs[2].flow.as_ref().unwrap().fix, Some(vec![5.0, 6.0]));

        config.solver.debug_periods = Some(10);
        assert_eq!(config.time_index().unwrap().len(), 3);
    }

    #[test]
    fn test_unknown_profile() {
        let text = SCENARIO.replace("fix = \"pv\"", "fix = \"wind\"");
        let config = ScenarioConfig::from_toml_str(&text).unwrap();
        let err = config.to_node_specs(3).unwrap_err();
        assert!(err.is_config());
        assert!(err.to_string().contains("wind"));
    }

    #[test]
    fn test_solve_options() {
        let mut config = ScenarioConfig::from_toml_str(SCENARIO).unwrap();
        let options = config.solve_options().unwrap();
        assert_eq!(options.solver.name(), "highs");
        assert_eq!(options.timeout_seconds, Some(60));
        assert!(options.lp_dump.is_none());

        config.solver.debug = true;
        assert_eq!(config.solve_options().unwrap().lp_dump, Some(default_lp_dump_path()));

        config.solver.name = "glpk".into();
        assert!(config.solve_options().unwrap_err().is_config());
    }

    #[test]
    fn test_defaults_and_unknown_keys() {
        let config = ScenarioConfig::from_toml_str("").unwrap();
        assert_eq!(config, ScenarioConfig::default());
        assert_eq!(config.solver.name, "clarabel");
        assert!(ScenarioConfig::from_toml_str("[solver]\nsolvr = \"cbc\"").is_err());
    }
}
