//! Tracing/OpenTelemetry setup.
//!
//! Mirrors the codebase's existing telemetry wiring, retargeted at
//! scenario/step spans instead of per-HTTP-request spans. The OTel exporter
//! is compiled in only behind the `otel` feature so a plain build has no
//! network-facing dependency at all.

use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt, EnvFilter};

/// Initializes the global tracing subscriber. Call once, at process start.
///
/// With the `otel` feature enabled and `OTEL_EXPORTER_OTLP_ENDPOINT` set,
/// spans are additionally exported via OTLP; otherwise logging goes to
/// stderr only, filtered by `RUST_LOG` (default `info`).
pub fn init() {
    let filter = EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info"));
    let fmt_layer = tracing_subscriber::fmt::layer();

    #[cfg(feature = "otel")]
    {
        if let Some(otel_layer) = otel::build_layer() {
            let _ = tracing_subscriber::registry()
                .with(filter)
                .with(fmt_layer)
                .with(otel_layer)
                .try_init();
            return;
        }
    }

    let _ = tracing_subscriber::registry().with(filter).with(fmt_layer).try_init();
}

#[cfg(feature = "otel")]
mod otel {
    use opentelemetry::trace::TracerProvider as _;
    use opentelemetry_otlp::WithExportConfig;

    pub fn build_layer() -> Option<tracing_opentelemetry::OpenTelemetryLayer<
        tracing_subscriber::Registry,
        opentelemetry_sdk::trace::Tracer,
    >> {
        let endpoint = std::env::var("OTEL_EXPORTER_OTLP_ENDPOINT").ok()?;
        let service_name =
            std::env::var("OTEL_SERVICE_NAME").unwrap_or_else(|_| "scenario-runner".to_string());

        let exporter = opentelemetry_otlp::new_exporter().tonic().with_endpoint(endpoint);
        let provider = opentelemetry_otlp::new_pipeline()
            .tracing()
            .with_exporter(exporter)
            .with_trace_config(opentelemetry_sdk::trace::config().with_resource(
                opentelemetry_sdk::Resource::new(vec![opentelemetry::KeyValue::new(
                    "service.name",
                    service_name,
                )]),
            ))
            .install_batch(opentelemetry_sdk::runtime::Tokio)
            .ok()?;

        let tracer = provider.tracer("scenario-runner");
        Some(tracing_opentelemetry::layer().with_tracer(tracer))
    }
}
