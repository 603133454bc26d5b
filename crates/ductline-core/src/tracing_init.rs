//! Shared tracing/logging initialization.
//!
//! Sets up `tracing_subscriber` with an env-filter and optional JSON output,
//! and, with the `metrics` feature, an OpenTelemetry layer.

use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt};

/// Initialise the global tracing subscriber.
///
/// * `default_filter` -- default `RUST_LOG` value when the env-var is not set
///   (e.g. `"ductline_server=info"`).
/// * `log_json` -- when `true`, emit structured JSON log lines instead of the
///   human-readable format.
pub fn init_tracing(default_filter: &str, log_json: bool) {
    let env_filter = tracing_subscriber::EnvFilter::new(
        std::env::var("RUST_LOG").unwrap_or_else(|_| default_filter.into()),
    );
    if log_json {
        tracing_subscriber::registry()
            .with(env_filter)
            .with(tracing_subscriber::fmt::layer().json())
            .init();
    } else {
        tracing_subscriber::registry()
            .with(env_filter)
            .with(tracing_subscriber::fmt::layer())
            .init();
    }
}

/// Handle returned by [`init_tracing_with_metrics`].
///
/// Holds the OpenTelemetry pipeline when one was started; empty otherwise.
pub struct TelemetryGuard {
    #[cfg(feature = "metrics")]
    metrics: Option<crate::metrics::MetricsGuard>,
}

impl TelemetryGuard {
    /// Flush and shut down the telemetry pipeline, if any.
    pub fn shutdown(self) {
        #[cfg(feature = "metrics")]
        if let Some(guard) = self.metrics {
            if let Err(e) = guard.shutdown() {
                tracing::warn!(error = %e, "OpenTelemetry shutdown failed");
            }
        }
    }
}

/// Initialise tracing and, when `metrics_endpoint` is set and the `metrics`
/// feature is compiled in, the OTLP export pipeline.
///
/// Falls back to plain [`init_tracing`] when the endpoint is absent or the
/// exporter cannot be built.
#[cfg_attr(not(feature = "metrics"), allow(unused_variables))]
pub fn init_tracing_with_metrics(
    default_filter: &str,
    log_json: bool,
    metrics_endpoint: Option<&str>,
) -> TelemetryGuard {
    #[cfg(feature = "metrics")]
    if let Some(endpoint) = metrics_endpoint {
        match crate::metrics::init_metrics(endpoint) {
            Ok(guard) => {
                let env_filter = tracing_subscriber::EnvFilter::new(
                    std::env::var("RUST_LOG").unwrap_or_else(|_| default_filter.into()),
                );
                if log_json {
                    tracing_subscriber::registry()
                        .with(env_filter)
                        .with(tracing_subscriber::fmt::layer().json())
                        .with(guard.otel_layer())
                        .init();
                } else {
                    tracing_subscriber::registry()
                        .with(env_filter)
                        .with(tracing_subscriber::fmt::layer())
                        .with(guard.otel_layer())
                        .init();
                }
                tracing::info!(endpoint, "OpenTelemetry export enabled");
                return TelemetryGuard {
                    metrics: Some(guard),
                };
            }
            Err(e) => {
                init_tracing(default_filter, log_json);
                tracing::warn!(error = %e, "OpenTelemetry export disabled");
                return TelemetryGuard { metrics: None };
            }
        }
    }

    init_tracing(default_filter, log_json);
    TelemetryGuard {
        #[cfg(feature = "metrics")]
        metrics: None,
    }
}
