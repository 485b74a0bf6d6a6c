use opentelemetry::trace::{
    SpanContext, SpanId, TraceContextExt, TraceFlags, TraceId, TraceState,
};
use tonic::metadata::MetadataMap;
use tracing_opentelemetry::OpenTelemetrySpanExt;

pub const TRACE_ID_HEADER_KEY: &str = "chroma-traceid";
pub const SPAN_ID_HEADER_KEY: &str = "chroma-spanid";

fn header<'a>(metadata: &'a MetadataMap, key: &str) -> Option<&'a str> {
    metadata.get(key).and_then(|value| value.to_str().ok())
}

/// Reads the ids set by `TraceContextInterceptor`. Missing or malformed
/// entries are not fatal and come back as `None`.
pub fn try_parse_tracecontext(metadata: &MetadataMap) -> (Option<TraceId>, Option<SpanId>) {
    let trace_id = header(metadata, TRACE_ID_HEADER_KEY)
        .and_then(|id| TraceId::from_hex(id).ok())
        .filter(|id| *id != TraceId::INVALID);
    let span_id = header(metadata, SPAN_ID_HEADER_KEY)
        .and_then(|id| SpanId::from_hex(id).ok())
        .filter(|id| *id != SpanId::INVALID);
    (trace_id, span_id)
}

/// Makes the caller's span the remote parent of `request_span`.
pub fn wrap_span_with_parent_context(
    request_span: tracing::Span,
    metadata: &MetadataMap,
) -> tracing::Span {
    if let (Some(trace_id), Some(span_id)) = try_parse_tracecontext(metadata) {
        let span_context = SpanContext::new(
            trace_id,
            span_id,
            TraceFlags::SAMPLED,
            true,
            TraceState::default(),
        );
        let context = request_span
            .context()
            .with_remote_span_context(span_context);
        request_span.set_parent(context);
    }
    request_span
}

pub fn get_current_trace_id() -> TraceId {
    crate::interceptor::current_trace_context().0
}
