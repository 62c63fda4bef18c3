use crate::config::ScenarioConfig;
use clap::{Args, Parser, Subcommand};
use std::path::PathBuf;

#[derive(Parser, Debug)]
#[command(name = "ensys", author, version, about = "Build, solve and inspect energy-balance models", long_about = None)]
pub struct Cli {
    /// Set the logging level (overrides the scenario's [logging] level)
    #[arg(long, global = true)]
    pub log_level: Option<tracing::Level>,

    #[command(subcommand)]
    pub command: Commands,
}

#[derive(Subcommand, Debug)]
pub enum Commands {
    /// Run a scenario through the full pipeline and print a flow summary
    Run(RunArgs),
    /// Restore a snapshot and print the flows of each bus
    Show(ShowArgs),
    /// List solver backends and whether they are available
    Solvers,
    /// Write the LP formulation of a scenario without solving it
    Lp(LpArgs),
}

#[derive(Args, Debug)]
pub struct RunArgs {
    /// Scenario file (TOML)
    #[arg(long, short = 's')]
    pub scenario: PathBuf,

    /// Solver backend: clarabel, cbc or highs
    #[arg(long)]
    pub solver: Option<String>,

    /// Write the LP file before solving
    #[arg(long)]
    pub debug: bool,

    /// LP file location used with --debug
    #[arg(long)]
    pub lp_file: Option<PathBuf>,

    /// Forward solver output at info level
    #[arg(long)]
    pub verbose: bool,

    /// Time limit for native solvers, in seconds
    #[arg(long)]
    pub timeout: Option<u64>,

    /// Dump the solved system to a snapshot
    #[arg(long, overrides_with = "no_dump")]
    pub dump: bool,

    /// Do not write a snapshot
    #[arg(long, overrides_with = "dump")]
    pub no_dump: bool,

    /// Snapshot directory
    #[arg(long)]
    pub dump_dir: Option<PathBuf>,

    /// Snapshot file name
    #[arg(long)]
    pub dump_file: Option<String>,
}

impl RunArgs {
    /// Apply command-line overrides on top of the scenario file.
    pub fn apply(&self, config: &mut ScenarioConfig) {
        if let Some(solver) = &self.solver {
            config.solver.name = solver.clone();
        }
        if self.debug {
            config.solver.debug = true;
        }
        if let Some(path) = &self.lp_file {
            config.solver.lp_file = Some(path.clone());
        }
        if self.verbose {
            config.solver.verbose = true;
        }
        if let Some(seconds) = self.timeout {
            config.solver.timeout_seconds = Some(seconds);
        }
        if self.dump {
            config.dump.enabled = true;
        }
        if self.no_dump {
            config.dump.enabled = false;
        }
        if let Some(dir) = &self.dump_dir {
            config.dump.dir = Some(dir.clone());
        }
        if let Some(file) = &self.dump_file {
            config.dump.filename = file.clone();
        }
    }
}

#[derive(Args, Debug)]
pub struct ShowArgs {
    /// Snapshot directory (default: ~/.ensys/dumps)
    #[arg(long)]
    pub dump_dir: Option<PathBuf>,

    /// Snapshot file name (default: es_dump.ensys)
    #[arg(long)]
    pub dump_file: Option<String>,

    /// Only show this bus
    #[arg(long)]
    pub bus: Option<String>,

    /// Write the flows as CSV instead of printing a table
    #[arg(long)]
    pub csv: Option<PathBuf>,
}

#[derive(Args, Debug)]
pub struct LpArgs {
    /// Scenario file (TOML)
    #[arg(long, short = 's')]
    pub scenario: PathBuf,

    /// Output LP file
    #[arg(long, short = 'o')]
    pub out: PathBuf,
}
