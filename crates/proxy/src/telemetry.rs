// Tracing setup
//
// Installs a global subscriber for processes embedding the proxy.

use std::env;

use tracing_subscriber::util::TryInitError;
use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt, EnvFilter};

/// Logging configuration
#[derive(Debug, Clone)]
pub struct TelemetryConfig {
    /// Name recorded in the startup log line
    pub service_name: String,

    /// Explicit filter directive; `RUST_LOG` wins when set
    pub log_filter: Option<String>,
}

impl Default for TelemetryConfig {
    fn default() -> Self {
        Self {
            service_name: "everruns-proxy".to_string(),
            log_filter: None,
        }
    }
}

impl TelemetryConfig {
    /// Create configuration from environment variables
    ///
    /// Environment variables:
    /// - `SERVICE_NAME`: Service name (default: everruns-proxy)
    /// - `LOG_LEVEL`: Level for this crate when `RUST_LOG` is unset (default: info)
    pub fn from_env() -> Self {
        let service_name =
            env::var("SERVICE_NAME").unwrap_or_else(|_| "everruns-proxy".to_string());
        let log_filter = env::var("LOG_LEVEL")
            .ok()
            .map(|level| format!("everruns_proxy={level}"));

        Self {
            service_name,
            log_filter,
        }
    }

    fn filter(&self) -> EnvFilter {
        EnvFilter::try_from_default_env().unwrap_or_else(|_| {
            self.log_filter
                .clone()
                .unwrap_or_else(|| "everruns_proxy=info".to_string())
                .into()
        })
    }
}

/// Install the global tracing subscriber
///
/// Fails if a subscriber is already installed.
pub fn init_tracing(config: &TelemetryConfig) -> Result<(), TryInitError> {
    tracing_subscriber::registry()
        .with(config.filter())
        .with(tracing_subscriber::fmt::layer())
        .try_init()?;

    tracing::info!(service = %config.service_name, "tracing initialized");
    Ok(())
}
