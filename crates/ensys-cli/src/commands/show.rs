//! `ensys show`: restore a snapshot and print the flows around each bus.

use anyhow::{Context, Result};
use ensys_cli::ShowArgs;
use ensys_core::{BusView, ResultsSet, TimeIndex};
use ensys_io::{read_header, restore, write_results_csv, SnapshotLocation};
use std::fs::File;
use std::io::{BufWriter, Write};
use tabwriter::TabWriter;

pub fn handle(args: &ShowArgs) -> Result<()> {
    let location = SnapshotLocation::with_overrides(args.dump_dir.clone(), args.dump_file.clone());
    let path = location.path();
    let header =
        read_header(&location).with_context(|| format!("reading snapshot {}", path.display()))?;
    let (system, results) =
        restore(&location).with_context(|| format!("restoring snapshot {}", path.display()))?;
    let results = results
        .with_context(|| format!("snapshot {} holds no results", path.display()))?;

    if let Some(out) = &args.csv {
        let file = File::create(out).with_context(|| format!("creating {}", out.display()))?;
        let mut writer = BufWriter::new(file);
        write_results_csv(&results, system.time_index(), &mut writer, args.bus.as_deref())?;
        writer.flush()?;
        println!("Wrote {}", out.display());
        return Ok(());
    }

    println!(
        "Snapshot {} (schema {}, written {} by ensys {})",
        path.display(),
        header.schema_version,
        header.created_at.format("%Y-%m-%d %H:%M:%S UTC"),
        header.ensys_version
    );
    println!(
        "Status: {} (solver {}, objective {})",
        results.meta.status, results.meta.solver, results.meta.objective
    );

    if let Some(bus) = &args.bus {
        let view = results
            .bus_view(bus)
            .with_context(|| format!("no flows touch bus '{}'", bus))?;
        println!();
        println!("Bus {}", bus);
        return print_bus(&view, system.time_index(), &results);
    }

    for (_, bus) in system.buses() {
        println!();
        match results.bus_view(&bus.label) {
            Some(view) => {
                println!("Bus {}", bus.label);
                print_bus(&view, system.time_index(), &results)?;
            }
            None => println!("Bus {}: no flows", bus.label),
        }
    }
    Ok(())
}

fn print_bus(view: &BusView<'_>, time_index: &TimeIndex, results: &ResultsSet) -> Result<()> {
    let columns: Vec<_> = view.columns().collect();
    let mut writer = TabWriter::new(Vec::new()).padding(2);
    write!(writer, "timestamp")?;
    for series in &columns {
        write!(writer, "\t{}", series.name())?;
    }
    writeln!(writer)?;
    for (t, stamp) in time_index.iter().enumerate().take(results.periods()) {
        write!(writer, "{}", stamp.format("%Y-%m-%d %H:%M"))?;
        for series in &columns {
            write!(writer, "\t{:.3}", series.values[t])?;
        }
        writeln!(writer)?;
    }
    writer.flush()?;
    let table = String::from_utf8(writer.into_inner()?)?;
    print!("{table}");
    Ok(())
}
