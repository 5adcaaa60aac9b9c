//! Subscriber setup for herald's structured logs.
//!
//! The library itself only emits `tracing` events: registration and
//! unregistration at `info`, parsing and permission checks at `debug`, usage
//! errors at `warn` and failed handlers at `error`. Transports that do not
//! install their own subscriber can use the helpers here.

use serde::{Deserialize, Serialize};
use thiserror::Error;
use tracing_subscriber::filter::ParseError;
use tracing_subscriber::util::{SubscriberInitExt, TryInitError};
use tracing_subscriber::{layer::SubscriberExt, EnvFilter, Layer, Registry};

/// Output format of the fmt layer
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum TracingFormat {
    /// Multi-line, human-readable
    #[default]
    Pretty,

    /// One line per event
    Compact,

    /// Newline-delimited JSON
    Json,
}

/// Logging configuration
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct TracingConfig {
    /// Filter directives such as `"debug"` or `"herald=trace,info"`.
    ///
    /// If None, uses the RUST_LOG environment variable or defaults to "info".
    pub filter: Option<String>,

    pub format: TracingFormat,

    /// Include timestamps in output
    pub timestamps: bool,

    /// Include target module names in output
    pub target: bool,

    /// Include thread IDs in output
    pub thread_ids: bool,
}

impl Default for TracingConfig {
    fn default() -> Self {
        Self {
            filter: None,
            format: TracingFormat::Pretty,
            timestamps: true,
            target: true,
            thread_ids: false,
        }
    }
}

/// Error type for subscriber installation
#[derive(Debug, Error)]
pub enum TracingError {
    #[error("Invalid log filter: {0}")]
    Filter(#[from] ParseError),

    #[error("A global subscriber is already installed: {0}")]
    Init(#[from] TryInitError),
}

/// Install a global subscriber with default settings.
///
/// Honours `RUST_LOG`, e.g. `RUST_LOG=herald=debug`.
pub fn init_subscriber() -> Result<(), TracingError> {
    init_subscriber_with_config(TracingConfig::default())
}

/// Install a global subscriber for `config`.
///
/// # Example
///
/// ```no_run
/// use herald::tracing_support::{init_subscriber_with_config, TracingConfig, TracingFormat};
///
/// init_subscriber_with_config(TracingConfig {
///     format: TracingFormat::Json,
///     filter: Some("herald=debug".to_string()),
///     ..Default::default()
/// })
/// .unwrap();
/// ```
pub fn init_subscriber_with_config(config: TracingConfig) -> Result<(), TracingError> {
    let filter = build_filter(config.filter.as_deref())?;
    tracing_subscriber::registry()
        .with(fmt_layer(&config))
        .with(filter)
        .try_init()?;
    Ok(())
}

fn build_filter(directives: Option<&str>) -> Result<EnvFilter, ParseError> {
    match directives {
        Some(directives) => EnvFilter::try_new(directives),
        None => Ok(EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info"))),
    }
}

fn fmt_layer(config: &TracingConfig) -> Box<dyn Layer<Registry> + Send + Sync> {
    let layer = tracing_subscriber::fmt::layer()
        .with_target(config.target)
        .with_thread_ids(config.thread_ids);

    match (config.format, config.timestamps) {
        (TracingFormat::Pretty, true) => layer.pretty().boxed(),
        (TracingFormat::Pretty, false) => layer.pretty().without_time().boxed(),
        (TracingFormat::Compact, true) => layer.compact().boxed(),
        (TracingFormat::Compact, false) => layer.compact().without_time().boxed(),
        (TracingFormat::Json, true) => layer.json().boxed(),
        (TracingFormat::Json, false) => layer.json().without_time().boxed(),
    }
}
