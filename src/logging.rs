//! Logging setup using tracing.

use tracing_subscriber::{fmt, layer::SubscriberExt, util::SubscriberInitExt, EnvFilter};

use crate::config::LogConfig;

/// Install the global tracing subscriber from the service config.
/// `RUST_LOG` overrides the configured level when set; an unparseable
/// directive is a startup error rather than a silent fallback.
pub fn init(config: &LogConfig) -> anyhow::Result<()> {
    let directives =
        std::env::var(EnvFilter::DEFAULT_ENV).unwrap_or_else(|_| config.level.clone());
    let filter = EnvFilter::try_new(&directives)
        .map_err(|err| anyhow::anyhow!("invalid log filter {directives:?}: {err}"))?;

    tracing_subscriber::registry()
        .with(filter)
        .with(fmt::layer().with_target(true))
        .init();

    Ok(())
}
