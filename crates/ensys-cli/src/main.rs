use clap::Parser;
use ensys_cli::config::LoggingConfig;
use ensys_cli::{Cli, Commands, ScenarioConfig};
use std::process::ExitCode;

mod commands;

fn main() -> ExitCode {
    let cli = Cli::parse();
    match dispatch(cli) {
        Ok(()) => ExitCode::SUCCESS,
        Err(err) => {
            eprintln!("error: {err:#}");
            ExitCode::FAILURE
        }
    }
}

fn dispatch(cli: Cli) -> anyhow::Result<()> {
    match &cli.command {
        Commands::Run(args) => {
            let config = ScenarioConfig::load(&args.scenario)?;
            ensys_cli::logging::init(cli.log_level, &config.logging)?;
            commands::run::handle(args, config)
        }
        Commands::Lp(args) => {
            let config = ScenarioConfig::load(&args.scenario)?;
            ensys_cli::logging::init(cli.log_level, &config.logging)?;
            commands::lp::handle(args, config)
        }
        Commands::Show(args) => {
            ensys_cli::logging::init(cli.log_level, &LoggingConfig::default())?;
            commands::show::handle(args)
        }
        Commands::Solvers => {
            ensys_cli::logging::init(cli.log_level, &LoggingConfig::default())?;
            commands::solvers::handle()
        }
    }
}
