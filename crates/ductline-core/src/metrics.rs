//! OpenTelemetry export and Fast Track business counters.
//!
//! Compiled only with the `metrics` feature. [`init_metrics`] starts OTLP
//! trace and metric pipelines tagged with the `ductline-server` service
//! name; the `record_*` functions feed the waitlist counters.

use std::sync::OnceLock;

use opentelemetry::metrics::Counter;
use opentelemetry::trace::TracerProvider as _;
use opentelemetry::{KeyValue, global};
use opentelemetry_otlp::WithExportConfig;
use opentelemetry_sdk::Resource;
use opentelemetry_sdk::metrics::SdkMeterProvider;
use opentelemetry_sdk::trace::SdkTracerProvider;

const SERVICE_NAME: &str = "ductline-server";
const METER_NAME: &str = "ductline";

#[derive(Debug, thiserror::Error)]
pub enum MetricsError {
    #[error("failed to build OTLP exporter: {0}")]
    ExporterBuild(#[from] opentelemetry_otlp::ExporterBuildError),

    #[error("OpenTelemetry SDK error: {0}")]
    Sdk(#[from] opentelemetry_sdk::error::OTelSdkError),
}

/// Keeps the providers alive. Call [`MetricsGuard::shutdown`] before exit
/// to flush; dropping does not.
pub struct MetricsGuard {
    tracer_provider: SdkTracerProvider,
    meter_provider: SdkMeterProvider,
}

impl MetricsGuard {
    pub fn shutdown(self) -> Result<(), MetricsError> {
        self.tracer_provider.shutdown()?;
        self.meter_provider.shutdown()?;
        Ok(())
    }

    /// A `tracing` layer that exports spans through this pipeline.
    pub fn otel_layer<S>(&self) -> impl tracing_subscriber::Layer<S> + use<S>
    where
        S: tracing::Subscriber + for<'span> tracing_subscriber::registry::LookupSpan<'span>,
    {
        tracing_opentelemetry::layer().with_tracer(self.tracer_provider.tracer(METER_NAME))
    }
}

/// Start OTLP (gRPC) export of traces and metrics to `endpoint`.
pub fn init_metrics(endpoint: &str) -> Result<MetricsGuard, MetricsError> {
    let resource = Resource::builder().with_service_name(SERVICE_NAME).build();

    let span_exporter = opentelemetry_otlp::SpanExporter::builder()
        .with_tonic()
        .with_endpoint(endpoint)
        .build()?;
    let tracer_provider = SdkTracerProvider::builder()
        .with_resource(resource.clone())
        .with_batch_exporter(span_exporter)
        .build();
    global::set_tracer_provider(tracer_provider.clone());

    let metric_exporter = opentelemetry_otlp::MetricExporter::builder()
        .with_tonic()
        .with_endpoint(endpoint)
        .build()?;
    let meter_provider = SdkMeterProvider::builder()
        .with_resource(resource)
        .with_periodic_exporter(metric_exporter)
        .build();
    global::set_meter_provider(meter_provider.clone());

    Ok(MetricsGuard {
        tracer_provider,
        meter_provider,
    })
}

struct FastTrackCounters {
    joins: Counter<u64>,
    bumps: Counter<u64>,
    positions_moved: Counter<u64>,
    captures: Counter<u64>,
}

/// Instruments are bound to the meter provider installed at first use, so
/// the first `record_*` call must come after [`init_metrics`].
fn counters() -> &'static FastTrackCounters {
    static COUNTERS: OnceLock<FastTrackCounters> = OnceLock::new();
    COUNTERS.get_or_init(|| {
        let meter = global::meter(METER_NAME);
        FastTrackCounters {
            joins: meter
                .u64_counter("ductline.waitlist.joins")
                .with_description("New waitlist entries")
                .build(),
            bumps: meter
                .u64_counter("ductline.waitlist.bumps")
                .with_description("Paid bumps applied")
                .build(),
            positions_moved: meter
                .u64_counter("ductline.waitlist.positions_moved")
                .with_description("Positions bought through Fast Track")
                .build(),
            captures: meter
                .u64_counter("ductline.payments.captures")
                .with_description("Capture callbacks by outcome")
                .build(),
        }
    })
}

pub fn record_join() {
    counters().joins.add(1, &[]);
}

pub fn record_bump(positions_moved: u64) {
    let c = counters();
    c.bumps.add(1, &[]);
    c.positions_moved.add(positions_moved, &[]);
}

/// `outcome` is a short label such as `captured` or `declined`.
pub fn record_capture(outcome: &'static str) {
    counters().captures.add(1, &[KeyValue::new("outcome", outcome)]);
}
