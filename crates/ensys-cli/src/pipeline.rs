//! One pipeline for every scenario: time index, network, compile, solve,
//! extract and dump, each stage fed only by the one before.

use crate::config::ScenarioConfig;
use ensys_algo::{CompileOptions, Model, ModelCompiler, ResultsExtractor, SolverAdapter};
use ensys_core::{
    Diagnostics, EnergySystem, EnsysResult, NetworkBuilder, ResultsSet, SolveStatus,
};
use std::path::PathBuf;
use tracing::{info, warn};

/// What a pipeline run produced. `results` is present only for optimal solves.
#[derive(Debug)]
pub struct PipelineOutcome {
    pub system: EnergySystem,
    pub status: SolveStatus,
    pub message: Option<String>,
    pub results: Option<ResultsSet>,
    pub diagnostics: Diagnostics,
    pub dump_path: Option<PathBuf>,
}

#[derive(Debug, Clone)]
pub struct Pipeline {
    config: ScenarioConfig,
    compile_options: CompileOptions,
}

impl Pipeline {
    pub fn new(config: ScenarioConfig) -> Self {
        Self {
            config,
            compile_options: CompileOptions::default(),
        }
    }

    pub fn with_compile_options(mut self, options: CompileOptions) -> Self {
        self.compile_options = options;
        self
    }

    pub fn config(&self) -> &ScenarioConfig {
        &self.config
    }

    pub fn build_system(&self, diag: &mut Diagnostics) -> EnsysResult<EnergySystem> {
        let time_index = self.config.time_index()?;
        let specs = self.config.to_node_specs(time_index.len())?;
        NetworkBuilder::new(time_index)
            .nodes(specs)
            .build_with_diagnostics(diag)
    }

    pub fn compile(&self, system: &EnergySystem, diag: &mut Diagnostics) -> EnsysResult<Model> {
        ModelCompiler::new(self.compile_options).compile(system, diag)
    }

    /// Run every stage. Infeasible and unbounded solves are reported in the
    /// outcome; the system is still dumped, without results.
    pub fn run(&self) -> EnsysResult<PipelineOutcome> {
        let mut diagnostics = Diagnostics::new();
        let system = self.build_system(&mut diagnostics)?;
        let model = self.compile(&system, &mut diagnostics)?;

        let solved = SolverAdapter::new(self.config.solve_options()?).solve(model)?;
        let status = solved.status;
        let message = solved.message.clone();
        let results = if solved.is_optimal() {
            Some(ResultsExtractor::new().extract(&solved, &system)?)
        } else {
            warn!(status = %status, "no results extracted");
            None
        };

        let dump_path = if self.config.dump.enabled {
            Some(ensys_io::dump(
                &system,
                results.as_ref(),
                &self.config.snapshot_location(),
            )?)
        } else {
            info!("snapshot dump disabled");
            None
        };

        Ok(PipelineOutcome {
            system,
            status,
            message,
            results,
            diagnostics,
            dump_path,
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn config(dir: &std::path::Path, demand: f64) -> ScenarioConfig {
        let text = format!(
            r#"
[time]
periods = 2

[dump]
dir = "{dir}"
filename = "test.ensys"

[[nodes]]
label = "b"
role = "bus"

[[nodes]]
label = "pv"
role = "source"
bus = "b"
nominal_value = 10.0
fix = [0.5, 1.0]

[[nodes]]
label = "demand"
role = "sink"
bus = "b"
nominal_value = 1.0
fix = [{demand}, {demand}]
"#,
            dir = dir.display()
        );
        ScenarioConfig::from_toml_str(&text).unwrap()
    }

    #[test]
    fn test_run_and_dump() {
        let dir = tempfile::tempdir().unwrap();
        let mut cfg = config(dir.path(), 5.0);
        cfg.nodes.push(crate::config::NodeConfig {
            label: "excess".into(),
            role: ensys_core::Role::Sink,
            bus: Some("b".into()),
            nominal_value: None,
            fix: None,
            min: None,
            max: None,
            variable_cost: None,
        });

        let outcome = Pipeline::new(cfg).run().unwrap();
        assert_eq!(outcome.status, SolveStatus::Optimal);
        let results = outcome.results.unwrap();
        assert_eq!(results.flow("b", "excess").unwrap().values, vec![0.0, 5.0]);

        let path = outcome.dump_path.unwrap();
        assert_eq!(path, dir.path().join("test.ensys"));
        let location = ensys_io::SnapshotLocation::new(dir.path(), "test.ensys");
        let (system, restored) = ensys_io::restore(&location).unwrap();
        assert_eq!(system, outcome.system);
        assert_eq!(restored, Some(results));
    }

    #[test]
    fn test_infeasible_is_reported() {
        let dir = tempfile::tempdir().unwrap();
        let mut cfg = config(dir.path(), 20.0);
        cfg.dump.enabled = false;
        let outcome = Pipeline::new(cfg).run().unwrap();
        assert_eq!(outcome.status, SolveStatus::Infeasible);
        assert!(outcome.results.is_none());
        assert!(outcome.dump_path.is_none());
        assert_eq!(std::fs::read_dir(dir.path()).unwrap().count(), 0);
    }

    #[test]
    fn test_debug_run_uses_short_horizon() {
        let dir = tempfile::tempdir().unwrap();
        let mut cfg = config(dir.path(), 5.0);
        cfg.dump.enabled = false;
        cfg.solver.debug = true;
        cfg.solver.debug_periods = Some(1);
        cfg.solver.lp_file = Some(dir.path().join("debug.lp"));

        // Surplus PV in the second period has nowhere to go.
        let outcome = Pipeline::new(cfg).run().unwrap();
        assert_eq!(outcome.status, SolveStatus::Optimal);
        assert_eq!(outcome.system.periods(), 1);
        let results = outcome.results.unwrap();
        assert_eq!(results.flow("pv", "b").unwrap().values, vec![5.0]);
        assert!(dir.path().join("debug.lp").is_file());
    }

    #[test]
    fn test_config_errors_surface() {
        let dir = tempfile::tempdir().unwrap();
        let mut cfg = config(dir.path(), 5.0);
        cfg.time.periods = 0;
        assert!(Pipeline::new(cfg).run().unwrap_err().is_config());
    }
}
