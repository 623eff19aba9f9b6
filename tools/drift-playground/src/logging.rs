//! Logging and tracing setup

use anyhow::Result;
use clap::ValueEnum;
use tracing_subscriber::{fmt, layer::SubscriberExt, prelude::*, util::SubscriberInitExt, EnvFilter};

/// Output format of log lines
#[derive(Debug, Clone, Copy, PartialEq, Eq, ValueEnum)]
pub enum LogFormat {
    Plain,
    Pretty,
    Json,
}

/// Initialize logging; `RUST_LOG` wins over `level` when set
pub fn initialize_logging(level: &str, format: LogFormat) -> Result<()> {
    let env_filter = EnvFilter::try_from_default_env().or_else(|_| EnvFilter::try_new(level))?;

    let fmt_layer = match format {
        LogFormat::Json => fmt::layer().json().with_target(true).with_writer(std::io::stderr).boxed(),
        LogFormat::Pretty => fmt::layer().pretty().with_target(false).with_writer(std::io::stderr).boxed(),
        LogFormat::Plain => fmt::layer()
            .with_target(false)
            .with_file(true)
            .with_line_number(true)
            .with_writer(std::io::stderr)
            .boxed(),
    };

    tracing_subscriber::registry().with(env_filter).with(fmt_layer).try_init()?;
    Ok(())
}
