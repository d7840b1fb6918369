//! Tracing subscriber initialization

use fabricflow_domain::config::LoggingConfig;
use fabricflow_domain::{FlowError, Result};
use tracing_subscriber::EnvFilter;

/// Filter from `RUST_LOG`, falling back to the configured level.
///
/// # Errors
/// Returns [`FlowError::Config`] when `RUST_LOG` is unset and
/// `config.level` is not a valid filter directive.
pub fn build_filter(config: &LoggingConfig) -> Result<EnvFilter> {
    if let Ok(filter) = EnvFilter::try_from_default_env() {
        return Ok(filter);
    }
    EnvFilter::try_new(config.level.trim())
        .map_err(|e| FlowError::Config(format!("Invalid logging.level '{}': {e}", config.level)))
}

/// Install the global tracing subscriber.
///
/// Safe to call multiple times; once a subscriber is installed later calls
/// are no-ops.
///
/// # Errors
/// Returns [`FlowError::Config`] when the filter cannot be built.
pub fn init_tracing(config: &LoggingConfig) -> Result<()> {
    let filter = build_filter(config)?;
    let builder = tracing_subscriber::fmt().with_env_filter(filter).with_target(false);

    let installed = if config.json {
        builder.json().with_current_span(true).with_span_list(false).try_init()
    } else {
        builder.try_init()
    };

    if installed.is_err() {
        tracing::debug!("Tracing subscriber already installed");
    }
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn init_is_idempotent() {
        let config = LoggingConfig { level: "debug".into(), json: true };
        assert!(init_tracing(&config).is_ok());
        assert!(init_tracing(&LoggingConfig::default()).is_ok());
    }

    #[test]
    fn accepts_target_directives() {
        let config = LoggingConfig { level: "warn,fabricflow_core=debug".into(), json: false };
        assert!(build_filter(&config).is_ok());
    }
}
