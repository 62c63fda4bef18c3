use crate::config::LoggingConfig;
use anyhow::{Context, Result};
use std::fs::OpenOptions;
use std::sync::Arc;
use tracing_subscriber::layer::SubscriberExt;
use tracing_subscriber::util::SubscriberInitExt;
use tracing_subscriber::{fmt, EnvFilter};

/// Install the global subscriber: stderr always, plus `config.file` when set.
///
/// `RUST_LOG` takes precedence over `level_override`, which takes precedence
/// over `config.level`.
pub fn init(level_override: Option<tracing::Level>, config: &LoggingConfig) -> Result<()> {
    let level = level_override
        .map(|level| level.to_string().to_ascii_lowercase())
        .unwrap_or_else(|| config.level.clone());
    let filter = match EnvFilter::try_from_default_env() {
        Ok(filter) => filter,
        Err(_) => EnvFilter::try_new(&level)
            .with_context(|| format!("invalid log level '{}'", level))?,
    };

    let file_layer = match &config.file {
        Some(path) => {
            if let Some(parent) = path.parent().filter(|p| !p.as_os_str().is_empty()) {
                std::fs::create_dir_all(parent)
                    .with_context(|| format!("creating log directory {}", parent.display()))?;
            }
            let file = OpenOptions::new()
                .create(true)
                .append(true)
                .open(path)
                .with_context(|| format!("opening log file {}", path.display()))?;
            Some(fmt::layer().with_writer(Arc::new(file)).with_ansi(false))
        }
        None => None,
    };

    tracing_subscriber::registry()
        .with(filter)
        .with(fmt::layer().with_writer(std::io::stderr))
        .with(file_layer)
        .try_init()
        .context("installing log subscriber")?;
    Ok(())
}
