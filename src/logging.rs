//! Structured logging setup.
//!
//! `RUST_LOG` takes precedence over the configured level.

use tracing_subscriber::{fmt, layer::SubscriberExt, util::SubscriberInitExt, EnvFilter};

use crate::config::LoggingConfig;

fn filter_for(config: &LoggingConfig) -> EnvFilter {
    EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new(&config.level))
}

/// Install the global subscriber. Calling it twice is harmless: the second
/// attempt is ignored.
pub fn init(config: &LoggingConfig) {
    let filter = filter_for(config);

    let result = if config.format == "json" {
        tracing_subscriber::registry()
            .with(filter)
            .with(fmt::layer().json().with_target(true))
            .try_init()
    } else {
        tracing_subscriber::registry()
            .with(filter)
            .with(fmt::layer().compact().with_target(true))
            .try_init()
    };

    if result.is_err() {
        tracing::debug!("Logging already initialised");
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_init_twice_doesnt_panic() {
        let config = LoggingConfig::default();
        init(&config);
        init(&config);
    }
}
