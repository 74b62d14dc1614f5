//! Installs the global tracing subscriber.

use tracing_subscriber::{fmt, layer::SubscriberExt, util::SubscriberInitExt, EnvFilter, Layer};

use super::config::{Log, LogFormat};
use crate::errors::ConfigurationError;

/// Crates whose events pass the default filter.
const DEFAULT_LOGGED_CRATES: [&str; 3] = ["bidv_connector", "external_services", "common_utils"];

/// Sets up console logging according to `config`.
///
/// Fails if a global subscriber is already installed or the filtering
/// directive does not parse.
pub fn setup(config: &Log) -> Result<(), ConfigurationError> {
    let console = &config.console;

    let console_layer = if console.enabled {
        let filter = console_filter(
            console.filtering_directive.as_deref(),
            console.level.into_level(),
        )?;
        let layer = match console.log_format {
            LogFormat::Default => fmt::layer().pretty().boxed(),
            LogFormat::Json => fmt::layer()
                .json()
                .with_current_span(true)
                .with_span_list(true)
                .boxed(),
        };
        Some(layer.with_filter(filter))
    } else {
        None
    };

    tracing_subscriber::registry()
        .with(console_layer)
        .try_init()
        .map_err(|_| ConfigurationError::LoggerSetupFailed)
}

fn console_filter(
    directive: Option<&str>,
    level: tracing::Level,
) -> Result<EnvFilter, ConfigurationError> {
    let directive = match directive {
        Some(directive) => directive.to_string(),
        None => DEFAULT_LOGGED_CRATES
            .iter()
            .map(|krate| format!("{krate}={level}"))
            .collect::<Vec<_>>()
            .join(","),
    };

    EnvFilter::builder()
        .with_default_directive(tracing::Level::WARN.into())
        .parse(&directive)
        .map_err(|error| ConfigurationError::InvalidConfigValue {
            field: "log.console.filtering_directive",
            reason: error.to_string(),
        })
}
