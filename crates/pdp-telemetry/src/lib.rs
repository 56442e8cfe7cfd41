//! Structured logging init and vote-tracing observers, installed against
//! [`pdp_policy::set_observer`].

#![deny(unsafe_code)]
#![warn(missing_docs)]

use thiserror::Error;
use tracing_subscriber::{fmt, layer::SubscriberExt, EnvFilter, Registry};

#[cfg(feature = "otel")]
mod otel_observer;
mod vote_logging;

#[cfg(feature = "otel")]
pub use otel_observer::OtelVoteObserver;
pub use vote_logging::LoggingVoteObserver;

/// Telemetry setup failures.
#[derive(Debug, Error)]
pub enum TelemetryError {
    /// The OpenTelemetry exporter pipeline could not be built.
    #[error("otel setup failed: {0}")]
    Otel(String),
}

/// Initialize structured JSON logging with an env filter (`RUST_LOG`, e.g.
/// `"info,pdp_decision=debug"`). Idempotent: a second call is a no-op if a
/// global subscriber is already installed.
pub fn init_json_logging() {
    let fmt_layer = fmt::layer().json().with_current_span(true).with_span_list(true);
    let filter = EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info"));
    let subscriber = Registry::default().with(filter).with(fmt_layer);
    tracing::subscriber::set_global_default(subscriber).ok();
}

/// Initialize the OpenTelemetry tracer pipeline (behind the `otel` feature).
/// Does not attach a `tracing` layer; callers wanting OTel-correlated spans
/// should additionally install `tracing-opentelemetry`.
#[cfg(feature = "otel")]
pub fn init_otel(service_name: &str) -> Result<(), TelemetryError> {
    use opentelemetry::KeyValue;
    use opentelemetry_sdk::trace as sdktrace;
    use opentelemetry_sdk::{runtime, Resource};

    let resource = Resource::new(vec![KeyValue::new("service.name", service_name.to_owned())]);
    let _tracer_provider = opentelemetry_otlp::new_pipeline()
        .tracing()
        .with_exporter(opentelemetry_otlp::new_exporter().http())
        .with_trace_config(sdktrace::config().with_resource(resource))
        .install_batch(runtime::Tokio)
        .map_err(|e| TelemetryError::Otel(e.to_string()))?;
    Ok(())
}
