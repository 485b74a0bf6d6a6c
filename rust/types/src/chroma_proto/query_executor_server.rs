//! Server side of the `chroma.QueryExecutor` service.

use std::future::Future;
use std::pin::Pin;
use std::sync::Arc;
use std::task::{Context, Poll};

use async_trait::async_trait;
use tonic::codegen::{Body, StdError};

type BoxFuture<T, E> = Pin<Box<dyn Future<Output = Result<T, E>> + Send + 'static>>;

#[async_trait]
pub trait QueryExecutor: Send + Sync + 'static {
    async fn count(
        &self,
        request: tonic::Request<super::CountPlan>,
    ) -> Result<tonic::Response<super::CountResult>, tonic::Status>;
    async fn get(
        &self,
        request: tonic::Request<super::GetPlan>,
    ) -> Result<tonic::Response<super::GetResult>, tonic::Status>;
    async fn knn(
        &self,
        request: tonic::Request<super::KnnPlan>,
    ) -> Result<tonic::Response<super::KnnBatchResult>, tonic::Status>;
}

#[derive(Debug)]
pub struct QueryExecutorServer<T> {
    inner: Arc<T>,
}

impl<T> QueryExecutorServer<T> {
    pub fn new(inner: T) -> Self {
        Self::from_arc(Arc::new(inner))
    }

    pub fn from_arc(inner: Arc<T>) -> Self {
        Self { inner }
    }
}

impl<T> Clone for QueryExecutorServer<T> {
    fn clone(&self) -> Self {
        Self {
            inner: self.inner.clone(),
        }
    }
}

macro_rules! unary_method {
    ($svc:ident, $method:ident, $req:ty, $resp:ty) => {
        struct $svc<T: QueryExecutor>(Arc<T>);

        impl<T: QueryExecutor> tonic::server::UnaryService<$req> for $svc<T> {
            type Response = $resp;
            type Future = BoxFuture<tonic::Response<Self::Response>, tonic::Status>;

            fn call(&mut self, request: tonic::Request<$req>) -> Self::Future {
                let inner = Arc::clone(&self.0);
                Box::pin(async move { <T as QueryExecutor>::$method(&inner, request).await })
            }
        }
    };
}

unary_method!(CountSvc, count, super::CountPlan, super::CountResult);
unary_method!(GetSvc, get, super::GetPlan, super::GetResult);
unary_method!(KnnSvc, knn, super::KnnPlan, super::KnnBatchResult);

impl<T, B> tonic::codegen::Service<http::Request<B>> for QueryExecutorServer<T>
where
    T: QueryExecutor,
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
            "/chroma.QueryExecutor/Count" => Box::pin(async move {
                let mut grpc = tonic::server::Grpc::new(tonic_prost::ProstCodec::default());
                Ok(grpc.unary(CountSvc(inner), req).await)
            }),
            "/chroma.QueryExecutor/Get" => Box::pin(async move {
                let mut grpc = tonic::server::Grpc::new(tonic_prost::ProstCodec::default());
                Ok(grpc.unary(GetSvc(inner), req).await)
            }),
            "/chroma.QueryExecutor/KNN" => Box::pin(async move {
                let mut grpc = tonic::server::Grpc::new(tonic_prost::ProstCodec::default());
                Ok(grpc.unary(KnnSvc(inner), req).await)
            }),
            _ => Box::pin(async move { Ok(tonic::Status::unimplemented("").into_http()) }),
        }
    }
}

pub const SERVICE_NAME: &str = "chroma.QueryExecutor";

impl<T> tonic::server::NamedService for QueryExecutorServer<T> {
    const NAME: &'static str = SERVICE_NAME;
}
