//! End-to-end tests for the PV / demand / excess system.

use ensys_algo::{ModelCompiler, ResultsExtractor, SolveOptions, SolverAdapter, SolverBackend};
use ensys_core::{
    Diagnostics, EnergySystem, Flow, NetworkBuilder, ResultsSet, SolveStatus, TimeIndexBuilder,
};
use ensys_solver_common::{SolverId, SolverProcess};

const PV: [f64; 48] = [
    209.0, 207.0, 200.0, 191.0, 185.0, 180.0, 172.0, 170.0, 171.0, 179.0, 189.0, 201.0, 208.0,
    207.0, 205.0, 206.0, 217.0, 232.0, 237.0, 232.0, 224.0, 219.0, 223.0, 213.0, 201.0, 192.0,
    187.0, 184.0, 184.0, 182.0, 180.0, 191.0, 207.0, 222.0, 231.0, 238.0, 241.0, 237.0, 234.0,
    235.0, 242.0, 264.0, 265.0, 260.0, 245.0, 238.0, 241.0, 231.0,
];

const DEMAND: [f64; 48] = [
    0.18, 0.11, 0.05, 0.05, 0.0, 0.0, 0.0, 0.0, 0.0, 0.0, 0.0, 0.0, 0.0, 0.05, 0.07, 0.11, 0.13,
    0.15, 0.22, 0.28, 0.33, 0.25, 0.17, 0.09, 0.09, 0.07, 0.05, 0.05, 0.0, 0.0, 0.0, 0.0, 0.0,
    0.0, 0.0, 0.0, 0.0, 0.09, 0.21, 0.33, 0.44, 0.54, 0.61, 0.65, 0.67, 0.64, 0.59, 0.52,
];

fn pv_system(periods: usize, nominal: f64) -> EnergySystem {
    let index = TimeIndexBuilder::new("2022-01-01")
        .periods(periods as i64)
        .freq("h")
        .build()
        .unwrap();
    NetworkBuilder::new(index)
        .bus("electricity")
        .excess("excess_bel", "electricity")
        .source("pv", "electricity", Flow::fixed(PV[..periods].to_vec(), nominal))
        .sink("demand", "electricity", Flow::fixed(DEMAND[..periods].to_vec(), 1.0))
        .build()
        .unwrap()
}

fn run(system: &EnergySystem, options: SolveOptions) -> ResultsSet {
    let mut diag = Diagnostics::new();
    let model = ModelCompiler::default().compile(system, &mut diag).unwrap();
    let solved = SolverAdapter::new(options).solve(model).unwrap();
    assert_eq!(solved.status, SolveStatus::Optimal);
    ResultsExtractor::new().extract(&solved, system).unwrap()
}

fn assert_pv_results(results: &ResultsSet, periods: usize, nominal: f64) {
    let pv = results.flow("pv", "electricity").unwrap();
    let demand = results.flow("electricity", "demand").unwrap();
    let excess = results.flow("electricity", "excess_bel").unwrap();

    for t in 0..periods {
        assert_eq!(pv.values[t], PV[t] * nominal);
        assert_eq!(demand.values[t], DEMAND[t]);
        let expected = PV[t] * nominal - DEMAND[t];
        assert!(
            (excess.values[t] - expected).abs() <= 1e-6 * expected.abs().max(1.0),
            "t={t}: excess {} expected {expected}",
            excess.values[t]
        );
    }
    assert_eq!(results.meta.status, SolveStatus::Optimal);
}

fn assert_balanced(results: &ResultsSet) {
    let view = results.bus_view("electricity").unwrap();
    for t in 0..results.periods() {
        let scale = view.columns().map(|f| f.values[t].abs()).fold(1.0, f64::max);
        assert!(view.residual(t).abs() <= 1e-9 * scale, "unbalanced at t={t}");
    }
}

#[test]
fn test_day_with_nominal_700() {
    let system = pv_system(24, 700.0);
    let results = run(&system, SolveOptions::default());
    assert_pv_results(&results, 24, 700.0);
    assert_balanced(&results);
    assert_eq!(results.meta.num_variables, 72);
    assert_eq!(results.meta.num_constraints, 24);
    assert_eq!(results.meta.objective, 0.0);
}

#[test]
fn test_two_days_with_nominal_1000() {
    let system = pv_system(48, 1000.0);
    let results = run(&system, SolveOptions::default());
    assert_pv_results(&results, 48, 1000.0);
    assert_balanced(&results);
}

#[test]
fn test_solving_twice_is_deterministic() {
    let system = pv_system(24, 700.0);
    let first = run(&system, SolveOptions::default());
    let second = run(&system, SolveOptions::default());
    assert_eq!(first.flows, second.flows);
    assert_eq!(first.meta.objective, second.meta.objective);
}

#[test]
fn test_without_excess_sink_is_infeasible() {
    let index = TimeIndexBuilder::new("2022-01-01").periods(24).build().unwrap();
    let system = NetworkBuilder::new(index)
        .bus("electricity")
        .source("pv", "electricity", Flow::fixed(PV[..24].to_vec(), 700.0))
        .sink("demand", "electricity", Flow::fixed(DEMAND[..24].to_vec(), 1.0))
        .build()
        .unwrap();
    let model = ModelCompiler::default()
        .compile(&system, &mut Diagnostics::new())
        .unwrap();
    let solved = SolverAdapter::default().solve(model).unwrap();
    assert_eq!(solved.status, SolveStatus::Infeasible);
    assert!(ResultsExtractor::new().extract(&solved, &system).is_err());
}

#[test]
fn test_curtailable_pv_with_costs() {
    // PV may be curtailed, backup covers any shortfall at a cost.
    let index = TimeIndexBuilder::new("2022-01-01").periods(24).build().unwrap();
    let pv_max: Vec<f64> = PV[..24].iter().map(|v| v / 265.0).collect();
    let system = NetworkBuilder::new(index)
        .bus("electricity")
        .source(
            "pv",
            "electricity",
            Flow::unrestricted().with_nominal_value(0.2).with_max(pv_max.clone()),
        )
        .source(
            "backup",
            "electricity",
            Flow::unrestricted().with_nominal_value(1.0).with_variable_cost(10.0),
        )
        .sink("demand", "electricity", Flow::fixed(DEMAND[..24].to_vec(), 1.0))
        .build()
        .unwrap();
    let results = run(&system, SolveOptions::default());
    assert_balanced_within(&results, 1e-5);

    let backup = results.flow("backup", "electricity").unwrap();
    let expected: f64 = (0..24)
        .map(|t| (DEMAND[t] - 0.2 * pv_max[t]).max(0.0))
        .sum();
    assert!((backup.total() - expected).abs() < 1e-4, "backup {}", backup.total());
    assert!((results.meta.objective - 10.0 * expected).abs() < 1e-3);
}

fn assert_balanced_within(results: &ResultsSet, tol: f64) {
    let view = results.bus_view("electricity").unwrap();
    for t in 0..results.periods() {
        assert!(view.residual(t).abs() <= tol, "unbalanced at t={t}");
    }
}

#[test]
fn test_native_solvers_when_installed() {
    // A second, costly outlet keeps two free columns per row so the
    // native solver actually runs.
    let index = TimeIndexBuilder::new("2022-01-01").periods(24).build().unwrap();
    let system = NetworkBuilder::new(index)
        .bus("electricity")
        .excess("excess_bel", "electricity")
        .sink(
            "export",
            "electricity",
            Flow::unrestricted().with_variable_cost(1.0),
        )
        .source("pv", "electricity", Flow::fixed(PV[..24].to_vec(), 700.0))
        .sink("demand", "electricity", Flow::fixed(DEMAND[..24].to_vec(), 1.0))
        .build()
        .unwrap();

    for id in [SolverId::Cbc, SolverId::Highs] {
        if !SolverProcess::is_installed(id) {
            eprintln!("skipping {id}: not installed");
            continue;
        }
        let options = SolveOptions {
            solver: SolverBackend::Native(id),
            timeout_seconds: Some(60),
            ..SolveOptions::default()
        };
        let results = run(&system, options);
        assert_eq!(results.meta.solver, id.binary_name());
        assert!(results.meta.objective.abs() < 1e-6);
        let export = results.flow("electricity", "export").unwrap();
        assert!(export.values.iter().all(|v| v.abs() < 1e-6));
        assert_pv_results(&results, 24, 700.0);
    }
}
