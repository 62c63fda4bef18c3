//! `ensys lp`: compile a scenario and write its LP file.

use anyhow::{Context, Result};
use ensys_cli::{LpArgs, Pipeline, ScenarioConfig};
use ensys_core::Diagnostics;

pub fn handle(args: &LpArgs, config: ScenarioConfig) -> Result<()> {
    let pipeline = Pipeline::new(config);
    let mut diag = Diagnostics::new();
    let system = pipeline.build_system(&mut diag)?;
    let model = pipeline.compile(&system, &mut diag)?;
    if !diag.is_empty() {
        for issue in diag.issues() {
            eprintln!("{issue}");
        }
        eprintln!("diagnostics: {}", diag.summary());
    }

    model
        .lp()
        .write_lp_file(&args.out)
        .with_context(|| format!("writing {}", args.out.display()))?;
    println!(
        "Wrote {} ({} variables, {} constraints)",
        args.out.display(),
        model.num_variables(),
        model.num_constraints()
    );
    Ok(())
}
