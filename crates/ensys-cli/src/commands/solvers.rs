//! `ensys solvers`: list solver backends.

use anyhow::Result;
use ensys_algo::SolverBackend;
use std::io::Write;
use tabwriter::TabWriter;

pub fn handle() -> Result<()> {
    let mut writer = TabWriter::new(Vec::new()).padding(2);
    writeln!(writer, "Solver\tStatus\tDescription")?;
    for backend in SolverBackend::all() {
        let status = if backend.is_available() {
            "available"
        } else {
            "not installed"
        };
        writeln!(writer, "{}\t{}\t{}", backend.name(), status, backend.description())?;
    }
    writer.flush()?;
    let table = String::from_utf8(writer.into_inner()?)?;
    print!("{table}");
    println!();
    println!("Native solvers are looked up in ~/.ensys/solvers, then on PATH.");
    Ok(())
}
