//! Client for the `chroma.QueryExecutor` service.

use tonic::codegen::{Body, Bytes, InterceptedService, StdError};

#[derive(Debug, Clone)]
pub struct QueryExecutorClient<T> {
    inner: tonic::client::Grpc<T>,
}

impl QueryExecutorClient<tonic::transport::Channel> {
    pub async fn connect<D>(dst: D) -> Result<Self, tonic::transport::Error>
    where
        D: TryInto<tonic::transport::Endpoint>,
        D::Error: Into<StdError>,
    {
        let conn = tonic::transport::Endpoint::new(dst)?.connect().await?;
        Ok(Self::new(conn))
    }
}

impl<T> QueryExecutorClient<T>
where
    T: tonic::client::GrpcService<tonic::body::Body>,
    T::Error: Into<StdError>,
    T::ResponseBody: Body<Data = Bytes> + Send + 'static,
    <T::ResponseBody as Body>::Error: Into<StdError> + Send,
{
    pub fn new(inner: T) -> Self {
        Self {
            inner: tonic::client::Grpc::new(inner),
        }
    }

    pub fn with_interceptor<F>(
        inner: T,
        interceptor: F,
    ) -> QueryExecutorClient<InterceptedService<T, F>>
    where
        F: tonic::service::Interceptor,
        T::ResponseBody: Default,
        T: tonic::codegen::Service<
            http::Request<tonic::body::Body>,
            Response = http::Response<
                <T as tonic::client::GrpcService<tonic::body::Body>>::ResponseBody,
            >,
        >,
        <T as tonic::codegen::Service<http::Request<tonic::body::Body>>>::Error:
            Into<StdError> + Send + Sync,
    {
        QueryExecutorClient::new(InterceptedService::new(inner, interceptor))
    }

    async fn ready(&mut self) -> Result<(), tonic::Status> {
        self.inner
            .ready()
            .await
            .map_err(|e| tonic::Status::unknown(format!("Service was not ready: {}", e.into())))
    }

    pub async fn count(
        &mut self,
        request: impl tonic::IntoRequest<super::CountPlan>,
    ) -> Result<tonic::Response<super::CountResult>, tonic::Status> {
        self.ready().await?;
        let codec = tonic_prost::ProstCodec::default();
        let path = http::uri::PathAndQuery::from_static("/chroma.QueryExecutor/Count");
        let mut req = request.into_request();
        req.extensions_mut()
            .insert(tonic::GrpcMethod::new("chroma.QueryExecutor", "Count"));
        self.inner.unary(req, path, codec).await
    }

    pub async fn get(
        &mut self,
        request: impl tonic::IntoRequest<super::GetPlan>,
    ) -> Result<tonic::Response<super::GetResult>, tonic::Status> {
        self.ready().await?;
        let codec = tonic_prost::ProstCodec::default();
        let path = http::uri::PathAndQuery::from_static("/chroma.QueryExecutor/Get");
        let mut req = request.into_request();
        req.extensions_mut()
            .insert(tonic::GrpcMethod::new("chroma.QueryExecutor", "Get"));
        self.inner.unary(req, path, codec).await
    }

    pub async fn knn(
        &mut self,
        request: impl tonic::IntoRequest<super::KnnPlan>,
    ) -> Result<tonic::Response<super::KnnBatchResult>, tonic::Status> {
        self.ready().await?;
        let codec = tonic_prost::ProstCodec::default();
        let path = http::uri::PathAndQuery::from_static("/chroma.QueryExecutor/KNN");
        let mut req = request.into_request();
        req.extensions_mut()
            .insert(tonic::GrpcMethod::new("chroma.QueryExecutor", "KNN"));
        self.inner.unary(req, path, codec).await
    }
}
