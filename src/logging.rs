//! Log output to stdout and, optionally, a log file truncated on each start.

use crate::config::Config;
use std::fs::File;
use std::sync::Arc;
use tracing::warn;
use tracing_subscriber::layer::SubscriberExt;
use tracing_subscriber::util::SubscriberInitExt;
use tracing_subscriber::{fmt, EnvFilter};

/// `RUST_LOG` wins over `LOG_LEVEL` when set.
fn filter(config: &Config) -> EnvFilter {
    EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new(config.log_level.as_directive()))
}

pub fn init(config: &Config) -> anyhow::Result<()> {
    let file_layer = match &config.log_file {
        Some(path) => {
            let file = File::create(path)?;
            Some(fmt::layer().with_ansi(false).with_writer(Arc::new(file)))
        }
        None => None,
    };

    tracing_subscriber::registry()
        .with(filter(config))
        .with(fmt::layer())
        .with(file_layer)
        .try_init()?;

    for (var, value) in &config.rejected {
        warn!("{} has invalid value {:?}, using the default instead.", var, value);
    }
    Ok(())
}
