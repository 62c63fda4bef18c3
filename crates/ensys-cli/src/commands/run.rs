//! `ensys run`: execute a scenario and summarize the solved flows.

use anyhow::{bail, Context, Result};
use ensys_cli::{Pipeline, PipelineOutcome, RunArgs, ScenarioConfig};
use std::io::Write;
use tabwriter::TabWriter;

pub fn handle(args: &RunArgs, mut config: ScenarioConfig) -> Result<()> {
    args.apply(&mut config);
    let outcome = Pipeline::new(config)
        .run()
        .with_context(|| format!("running scenario {}", args.scenario.display()))?;

    if !outcome.diagnostics.is_empty() {
        for issue in outcome.diagnostics.issues() {
            eprintln!("{issue}");
        }
        eprintln!("diagnostics: {}", outcome.diagnostics.summary());
    }
    print_summary(&outcome)?;

    if !outcome.status.is_optimal() {
        match &outcome.message {
            Some(message) => bail!("solver finished with status {}: {}", outcome.status, message),
            None => bail!("solver finished with status {}", outcome.status),
        }
    }
    Ok(())
}

fn print_summary(outcome: &PipelineOutcome) -> Result<()> {
    let stats = outcome.system.stats();
    println!(
        "{} buses, {} sources, {} sinks over {} periods",
        stats.num_buses, stats.num_sources, stats.num_sinks, stats.num_periods
    );

    if let Some(results) = &outcome.results {
        println!(
            "Status: {} (solver {}, objective {})",
            results.meta.status, results.meta.solver, results.meta.objective
        );
        let mut writer = TabWriter::new(Vec::new()).padding(2);
        writeln!(writer, "Flow\tTotal\tMin\tMax")?;
        for series in &results.flows {
            let min = series.values.iter().copied().fold(f64::INFINITY, f64::min);
            let max = series.values.iter().copied().fold(f64::NEG_INFINITY, f64::max);
            writeln!(
                writer,
                "{}\t{:.3}\t{:.3}\t{:.3}",
                series.name(),
                series.total(),
                min,
                max
            )?;
        }
        writer.flush()?;
        let table = String::from_utf8(writer.into_inner()?)?;
        print!("{table}");
    } else {
        println!("Status: {}", outcome.status);
    }

    if let Some(path) = &outcome.dump_path {
        println!("Snapshot written to {}", path.display());
    }
    Ok(())
}
