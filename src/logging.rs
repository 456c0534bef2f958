use anyhow::Result;
use tracing_subscriber::{fmt, layer::SubscriberExt, util::SubscriberInitExt, EnvFilter, Layer};

/// Installs a compact stderr logger. `RUST_LOG` takes precedence over
/// `default_level`.
pub fn init_logging(default_level: &str) -> Result<()> {
    let env_filter =
        EnvFilter::try_from_default_env().or_else(|_| EnvFilter::try_new(default_level))?;

    tracing_subscriber::registry()
        .with(
            fmt::layer()
                .compact()
                .with_target(false)
                .with_writer(std::io::stderr)
                .with_filter(env_filter),
        )
        .try_init()?;

    tracing::debug!(level = default_level, "logging initialized");
    Ok(())
}
