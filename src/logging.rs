//! Logging and tracing configuration

use crate::config::LoggingConfig;
use tracing_subscriber::{EnvFilter, fmt, layer::SubscriberExt, util::SubscriberInitExt};

/// Initialize tracing based on configuration.
///
/// `RUST_LOG` takes precedence over the configured level. Fails if a global
/// subscriber is already installed.
pub fn init_tracing(config: &LoggingConfig) -> Result<(), Box<dyn std::error::Error>> {
    let env_filter = EnvFilter::try_from_default_env()
        .or_else(|_| EnvFilter::try_new(&config.level))
        .unwrap_or_else(|_| EnvFilter::new("info"));

    let registry = tracing_subscriber::registry().with(env_filter);

    match config.format.as_str() {
        "json" => registry
            .with(
                fmt::layer()
                    .json()
                    .with_target(false)
                    .with_current_span(true),
            )
            .try_init()?,
        "pretty" => registry.with(fmt::layer().pretty()).try_init()?,
        _ => registry.with(fmt::layer().compact()).try_init()?,
    }

    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_json_format_installs_once() {
        let config = LoggingConfig {
            level: "debug".to_string(),
            format: "json".to_string(),
        };
        assert!(init_tracing(&config).is_ok());
        tracing::info_span!("request", id = 1).in_scope(|| tracing::info!("inside span"));
        assert!(init_tracing(&config).is_err());
    }
}
