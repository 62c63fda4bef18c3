//! Solve a small system, dump it, restore it and compare.

use ensys_algo::{ModelCompiler, ResultsExtractor, SolverAdapter};
use ensys_core::{Diagnostics, EnergySystem, Flow, NetworkBuilder, ResultsSet, TimeIndexBuilder};
use ensys_io::{dump, read_header, restore, write_results_csv, SnapshotLocation, SCHEMA_VERSION};

fn solved_system() -> (EnergySystem, ResultsSet) {
    let index = TimeIndexBuilder::new("2022-01-01 00:00")
        .periods(4)
        .freq("15min")
        .build()
        .unwrap();
    let system = NetworkBuilder::new(index)
        .bus("electricity")
        .excess("excess_bel", "electricity")
        .source("pv", "electricity", Flow::fixed(vec![0.1, 0.35, 0.7, 0.2], 700.0))
        .sink("demand", "electricity", Flow::fixed(vec![20.0, 30.0, 40.0, 50.0], 1.0))
        .build()
        .unwrap();

    let model = ModelCompiler::default()
        .compile(&system, &mut Diagnostics::new())
        .unwrap();
    let solved = SolverAdapter::default().solve(model).unwrap();
    let results = ResultsExtractor::new().extract(&solved, &system).unwrap();
    (system, results)
}

#[test]
fn test_dump_restore_solved_system() {
    let (system, results) = solved_system();
    let dir = tempfile::tempdir().unwrap();
    let location = SnapshotLocation::new(dir.path(), "es_dump.ensys");

    dump(&system, Some(&results), &location).unwrap();
    let (restored, restored_results) = restore(&location).unwrap();

    assert_eq!(restored, system);
    assert_eq!(restored.time_index().timestamps(), system.time_index().timestamps());
    let restored_results = restored_results.unwrap();
    // Bitwise equality of every float.
    for (a, b) in restored_results.flows.iter().zip(&results.flows) {
        let a: Vec<u64> = a.values.iter().map(|v| v.to_bits()).collect();
        let b: Vec<u64> = b.values.iter().map(|v| v.to_bits()).collect();
        assert_eq!(a, b);
    }
    assert_eq!(restored_results, results);
    assert_eq!(read_header(&location).unwrap().schema_version, SCHEMA_VERSION);
}

#[test]
fn test_dump_overwrites_previous_snapshot() {
    let (system, results) = solved_system();
    let dir = tempfile::tempdir().unwrap();
    let location = SnapshotLocation::new(dir.path(), "es_dump.ensys");

    dump(&system, None, &location).unwrap();
    dump(&system, Some(&results), &location).unwrap();
    let (_, restored_results) = restore(&location).unwrap();
    assert!(restored_results.is_some());
    assert_eq!(std::fs::read_dir(dir.path()).unwrap().count(), 1);
}

#[test]
fn test_restored_results_export() {
    let (system, results) = solved_system();
    let dir = tempfile::tempdir().unwrap();
    let location = SnapshotLocation::new(dir.path(), "es_dump.ensys");
    dump(&system, Some(&results), &location).unwrap();
    let (restored, restored_results) = restore(&location).unwrap();

    let mut buf = Vec::new();
    write_results_csv(
        &restored_results.unwrap(),
        restored.time_index(),
        &mut buf,
        Some("electricity"),
    )
    .unwrap();
    let text = String::from_utf8(buf).unwrap();
    let mut lines = text.lines();
    assert_eq!(
        lines.next().unwrap(),
        "timestamp,electricity -> excess_bel,pv -> electricity,electricity -> demand"
    );
    assert!(lines.next().unwrap().starts_with("2022-01-01 00:00:00,"));
    assert!(lines.nth(2).unwrap().starts_with("2022-01-01 00:45:00,"));
}
