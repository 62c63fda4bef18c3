pub mod cli;
pub mod config;
pub mod logging;
pub mod pipeline;

pub use cli::{Cli, Commands, LpArgs, RunArgs, ShowArgs};
pub use config::ScenarioConfig;
pub use pipeline::{Pipeline, PipelineOutcome};
