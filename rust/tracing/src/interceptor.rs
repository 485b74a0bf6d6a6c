use opentelemetry::trace::{SpanId, TraceContextExt, TraceId};
use tonic::{metadata::MetadataValue, service::Interceptor, Request, Status};
use tracing_opentelemetry::OpenTelemetrySpanExt;

use crate::util::{SPAN_ID_HEADER_KEY, TRACE_ID_HEADER_KEY};

/// Attaches `chroma-traceid` and `chroma-spanid` to every outbound call.
///
/// The ids come from the current span's otel context. Without a valid
/// context (no exporter installed, or called outside a span) fresh random
/// ids are used, so the entries are always present.
#[derive(Clone, Copy, Debug, Default)]
pub struct TraceContextInterceptor;

pub(crate) fn current_trace_context() -> (TraceId, SpanId) {
    let context = tracing::Span::current().context();
    let span = context.span();
    let span_context = span.span_context();
    if span_context.is_valid() {
        (span_context.trace_id(), span_context.span_id())
    } else {
        random_trace_context()
    }
}

fn random_trace_context() -> (TraceId, SpanId) {
    // Zero is the invalid id for both, so draw from 1..=MAX.
    let trace_id = rand::random::<u128>().max(1);
    let span_id = rand::random::<u64>().max(1);
    (
        TraceId::from_bytes(trace_id.to_be_bytes()),
        SpanId::from_bytes(span_id.to_be_bytes()),
    )
}

impl Interceptor for TraceContextInterceptor {
    fn call(&mut self, mut request: Request<()>) -> Result<Request<()>, Status> {
        let (trace_id, span_id) = current_trace_context();
        let trace_id: MetadataValue<_> = trace_id
            .to_string()
            .parse()
            .map_err(|_| Status::internal("trace id is not valid metadata"))?;
        let span_id: MetadataValue<_> = span_id
            .to_string()
            .parse()
            .map_err(|_| Status::internal("span id is not valid metadata"))?;
        let metadata = request.metadata_mut();
        metadata.insert(TRACE_ID_HEADER_KEY, trace_id);
        metadata.insert(SPAN_ID_HEADER_KEY, span_id);
        Ok(request)
    }
}
