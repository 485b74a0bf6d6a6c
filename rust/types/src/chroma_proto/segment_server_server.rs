//! Server side of the `chroma.SegmentServer` service.

use std::future::Future;
use std::pin::Pin;
use std::sync::Arc;
use std::task::{Context, Poll};

use async_trait::async_trait;
use tonic::codegen::{Body, StdError};

type BoxFuture<T, E> = Pin<Box<dyn Future<Output = Result<T, E>> + Send + 'static>>;

#[async_trait]
pub trait SegmentServer: Send + Sync + 'static {
    async fn load_segment(
        &self,
        request: tonic::Request<super::Segment>,
    ) -> Result<tonic::Response<super::SegmentServerResponse>, tonic::Status>;
    async fn release_segment(
        &self,
        request: tonic::Request<super::Segment>,
    ) -> Result<tonic::Response<super::SegmentServerResponse>, tonic::Status>;
    async fn get_vectors(
        &self,
        request: tonic::Request<super::GetVectorsRequest>,
    ) -> Result<tonic::Response<super::GetVectorsResponse>, tonic::Status>;
    async fn query_vectors(
        &self,
        request: tonic::Request<super::QueryVectorsRequest>,
    ) -> Result<tonic::Response<super::QueryVectorsResponse>, tonic::Status>;
}

#[derive(Debug)]
pub struct SegmentServerServer<T> {
    inner: Arc<T>,
}

impl<T> SegmentServerServer<T> {
    pub fn new(inner: T) -> Self {
        Self::from_arc(Arc::new(inner))
    }

    pub fn from_arc(inner: Arc<T>) -> Self {
        Self { inner }
    }
}

impl<T> Clone for SegmentServerServer<T> {
    fn clone(&self) -> Self {
        Self {
            inner: self.inner.clone(),
        }
    }
}

macro_rules! unary_method {
    ($svc:ident, $method:ident, $req:ty, $resp:ty) => {
        struct $svc<T: SegmentServer>(Arc<T>);

        impl<T: SegmentServer> tonic::server::UnaryService<$req> for $svc<T> {
            type Response = $resp;
            type Future = BoxFuture<tonic::Response<Self::Response>, tonic::Status>;

            fn call(&mut self, request: tonic::Request<$req>) -> Self::Future {
                let inner = Arc::clone(&self.0);
                Box::pin(async move { <T as SegmentServer>::$method(&inner, request).await })
            }
        }
    };
}

unary_method!(LoadSegmentSvc, load_segment, super::Segment, super::SegmentServerResponse);
unary_method!(ReleaseSegmentSvc, release_segment, super::Segment, super::SegmentServerResponse);
unary_method!(GetVectorsSvc, get_vectors, super::GetVectorsRequest, super::GetVectorsResponse);
unary_method!(
    QueryVectorsSvc,
    query_vectors,
    super::QueryVectorsRequest,
    super::QueryVectorsResponse
);

impl<T, B> tonic::codegen::Service<http::Request<B>> for SegmentServerServer<T>
where
    T: SegmentServer,
    B: Body + Send + 'static,
    B::Error: Into<StdError> + Send + 'static,
{
    type Response = http::Response<tonic::body::Body>;
    type Error = std::convert::Infallible;
    type Future = BoxFuture<Self::Response, Self::Error>;

    fn poll_ready(&mut self, _cx: &mut Context<'_>) -> Poll<Result<(), Self::Error>> {
        Poll::Ready(Ok(()))
    }

    fn call(&mut self, req: http::Request<B>) -> Self::Future {
        let inner = self.inner.clone();
        match req.uri().path() {
            "/chroma.SegmentServer/LoadSegment" => Box::pin(async move {
                let mut grpc = tonic::server::Grpc::new(tonic_prost::ProstCodec::default());
                Ok(grpc.unary(LoadSegmentSvc(inner), req).await)
            }),
            "/chroma.SegmentServer/ReleaseSegment" => Box::pin(async move {
                let mut grpc = tonic::server::Grpc::new(tonic_prost::ProstCodec::default());
                Ok(grpc.unary(ReleaseSegmentSvc(inner), req).await)
            }),
            "/chroma.SegmentServer/GetVectors" => Box::pin(async move {
                let mut grpc = tonic::server::Grpc::new(tonic_prost::ProstCodec::default());
                Ok(grpc.unary(GetVectorsSvc(inner), req).await)
            }),
            "/chroma.SegmentServer/QueryVectors" => Box::pin(async move {
                let mut grpc = tonic::server::Grpc::new(tonic_prost::ProstCodec::default());
                Ok(grpc.unary(QueryVectorsSvc(inner), req).await)
            }),
            _ => Box::pin(async move { Ok(tonic::Status::unimplemented("").into_http()) }),
        }
    }
}

pub const SERVICE_NAME: &str = "chroma.SegmentServer";

impl<T> tonic::server::NamedService for SegmentServerServer<T> {
    const NAME: &'static str = SERVICE_NAME;
}
