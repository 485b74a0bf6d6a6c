pub mod init_tracer;
pub mod interceptor;
pub mod util;

pub use init_tracer::{init_otel_tracing, OtelFilter, OtelFilterLevel, TracingInitError};
pub use interceptor::TraceContextInterceptor;
pub use util::{wrap_span_with_parent_context, SPAN_ID_HEADER_KEY, TRACE_ID_HEADER_KEY};
