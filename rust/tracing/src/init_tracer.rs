use opentelemetry::trace::{TraceError, TracerProvider};
use opentelemetry::{global, KeyValue};
use opentelemetry_otlp::WithExportConfig;
use opentelemetry_sdk::propagation::TraceContextPropagator;
use serde::{Deserialize, Serialize};
use thiserror::Error;
use tracing_subscriber::fmt;
use tracing_subscriber::Registry;
use tracing_subscriber::{layer::SubscriberExt, EnvFilter, Layer};

#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
#[serde(rename_all = "snake_case")]
pub enum OtelFilterLevel {
    Trace,
    Debug,
    Info,
    Warn,
    Error,
}

impl std::fmt::Display for OtelFilterLevel {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            OtelFilterLevel::Trace => f.write_str("trace"),
            OtelFilterLevel::Debug => f.write_str("debug"),
            OtelFilterLevel::Info => f.write_str("info"),
            OtelFilterLevel::Warn => f.write_str("warn"),
            OtelFilterLevel::Error => f.write_str("error"),
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
pub struct OtelFilter {
    pub crate_name: String,
    pub filter_level: OtelFilterLevel,
}

#[derive(Debug, Error)]
pub enum TracingInitError {
    #[error("Failed to build span exporter: {0}")]
    Exporter(#[from] TraceError),
    #[error("Failed to set global subscriber: {0}")]
    Subscriber(#[from] tracing::subscriber::SetGlobalDefaultError),
}

// Crate names use underscores, the way they appear as tracing targets.
const DEFAULT_CRATE_NAMES: [&str; 9] = [
    "chroma_config",
    "chroma_distance",
    "chroma_error",
    "chroma_frontend",
    "chroma_log",
    "chroma_segment",
    "chroma_tracing",
    "chroma_types",
    "worker",
];

pub fn global_filter_directives(custom_filters: &[OtelFilter]) -> String {
    let mut directives = vec!["error".to_string(), "opentelemetry_sdk=info".to_string()];
    directives.extend(DEFAULT_CRATE_NAMES.iter().map(|s| format!("{s}=trace")));
    directives.extend(
        custom_filters
            .iter()
            .map(|filter| format!("{}={}", filter.crate_name, filter.filter_level)),
    );
    directives.join(",")
}

/// `RUST_LOG` wins over the built in directives when it is set.
pub fn init_global_filter_layer(
    custom_filters: &[OtelFilter],
) -> Box<dyn Layer<Registry> + Send + Sync> {
    EnvFilter::new(
        std::env::var("RUST_LOG").unwrap_or_else(|_| global_filter_directives(custom_filters)),
    )
    .boxed()
}

pub fn init_otel_layer(
    service_name: &str,
    otel_endpoint: &str,
) -> Result<Box<dyn Layer<Registry> + Send + Sync>, TracingInitError> {
    tracing::info!(
        "Registering otel subscriber for {} at endpoint {}",
        service_name,
        otel_endpoint
    );
    let resource = opentelemetry_sdk::Resource::new(vec![
        KeyValue::new("service.name", service_name.to_string()),
        KeyValue::new(
            "service.pod_name",
            std::env::var("HOSTNAME").unwrap_or_else(|_| "unknown".to_string()),
        ),
    ]);

    let span_exporter = opentelemetry_otlp::SpanExporter::builder()
        .with_tonic()
        .with_endpoint(otel_endpoint)
        .build()?;
    let trace_config = opentelemetry_sdk::trace::Config::default().with_resource(resource);
    let tracer_provider = opentelemetry_sdk::trace::TracerProvider::builder()
        .with_batch_exporter(span_exporter, opentelemetry_sdk::runtime::Tokio)
        .with_config(trace_config)
        .build();
    let tracer = tracer_provider.tracer(service_name.to_string());
    global::set_tracer_provider(tracer_provider);
    Ok(tracing_opentelemetry::OpenTelemetryLayer::new(tracer).boxed())
}

pub fn init_stdout_layer() -> Box<dyn Layer<Registry> + Send + Sync> {
    fmt::layer().with_target(false).boxed()
}

pub fn init_tracing(
    layers: Vec<Box<dyn Layer<Registry> + Send + Sync>>,
) -> Result<(), TracingInitError> {
    global::set_text_map_propagator(TraceContextPropagator::new());
    let subscriber = tracing_subscriber::registry().with(layers);
    tracing::subscriber::set_global_default(subscriber)?;
    tracing::info!("Global tracing subscriber set");
    Ok(())
}

pub fn init_panic_tracing_hook() {
    let prev_hook = std::panic::take_hook();
    std::panic::set_hook(Box::new(move |panic_info| {
        let payload = panic_info.payload();
        let payload = if let Some(s) = payload.downcast_ref::<&str>() {
            Some(&**s)
        } else {
            payload.downcast_ref::<String>().map(|s| s.as_str())
        };

        tracing::error!(
            panic.payload = payload,
            panic.location = panic_info.location().map(|l| l.to_string()),
            "A panic occurred"
        );

        prev_hook(panic_info);
    }));
}

/// Installs the global subscriber for a service.
///
/// The otel exporter is only registered when an endpoint is given, so local
/// runs and tests get plain stdout logging.
pub fn init_otel_tracing(
    service_name: &str,
    custom_filters: &[OtelFilter],
    otel_endpoint: Option<&str>,
) -> Result<(), TracingInitError> {
    // The global filter applies to all subsequent layers.
    let mut layers = vec![init_global_filter_layer(custom_filters)];
    if let Some(endpoint) = otel_endpoint.filter(|endpoint| !endpoint.is_empty()) {
        layers.push(init_otel_layer(service_name, endpoint)?);
    }
    layers.push(init_stdout_layer());
    init_tracing(layers)?;
    init_panic_tracing_hook();
    Ok(())
}
