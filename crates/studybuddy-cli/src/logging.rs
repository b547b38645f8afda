use anyhow::{anyhow, Result};
use studybuddy_core::LoggingConfig;
use tracing::dispatcher::DefaultGuard;
use tracing_subscriber::{fmt, layer::SubscriberExt, util::SubscriberInitExt, EnvFilter};

/// `RUST_LOG` wins when it parses, then `--verbose`, then `level`.
fn filter(verbose: bool, level: &str, rust_log: Option<&str>) -> EnvFilter {
    if let Some(filter) = rust_log.and_then(|directives| EnvFilter::try_new(directives).ok()) {
        return filter;
    }
    EnvFilter::new(if verbose { "debug" } else { level })
}

fn env_filter(verbose: bool, level: &str) -> EnvFilter {
    let rust_log = std::env::var(EnvFilter::DEFAULT_ENV).ok();
    filter(verbose, level, rust_log.as_deref())
}

/// Subscriber for the configuration load itself, driven only by `--verbose`
/// and `RUST_LOG`. Dropping the guard removes it.
pub fn bootstrap(verbose: bool) -> DefaultGuard {
    tracing_subscriber::registry()
        .with(env_filter(verbose, "info"))
        .with(fmt::layer().compact().with_writer(std::io::stderr))
        .set_default()
}

/// Install the global subscriber once the configuration is known.
pub fn init_tracing(config: &LoggingConfig, verbose: bool) -> Result<()> {
    let registry = tracing_subscriber::registry().with(env_filter(verbose, &config.level));
    let result = match config.format.as_str() {
        "json" => registry
            .with(fmt::layer().json().with_writer(std::io::stderr))
            .try_init(),
        "compact" => registry
            .with(fmt::layer().compact().with_writer(std::io::stderr))
            .try_init(),
        _ => registry
            .with(fmt::layer().pretty().with_writer(std::io::stderr))
            .try_init(),
    };

    result.map_err(|e| anyhow!("failed to initialise logging: {}", e))
}
