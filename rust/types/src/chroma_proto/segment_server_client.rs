//! Client for the `chroma.SegmentServer` service.

use tonic::codegen::{Body, Bytes, InterceptedService, StdError};

#[derive(Debug, Clone)]
pub struct SegmentServerClient<T> {
    inner: tonic::client::Grpc<T>,
}

impl SegmentServerClient<tonic::transport::Channel> {
    pub async fn connect<D>(dst: D) -> Result<Self, tonic::transport::Error>
    where
        D: TryInto<tonic::transport::Endpoint>,
        D::Error: Into<StdError>,
    {
        let conn = tonic::transport::Endpoint::new(dst)?.connect().await?;
        Ok(Self::new(conn))
    }
}

impl<T> SegmentServerClient<T>
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
    ) -> SegmentServerClient<InterceptedService<T, F>>
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
        SegmentServerClient::new(InterceptedService::new(inner, interceptor))
    }

    async fn ready(&mut self) -> Result<(), tonic::Status> {
        self.inner
            .ready()
            .await
            .map_err(|e| tonic::Status::unknown(format!("Service was not ready: {}", e.into())))
    }

    pub async fn load_segment(
        &mut self,
        request: impl tonic::IntoRequest<super::Segment>,
    ) -> Result<tonic::Response<super::SegmentServerResponse>, tonic::Status> {
        self.ready().await?;
        let codec = tonic_prost::ProstCodec::default();
        let path = http::uri::PathAndQuery::from_static("/chroma.SegmentServer/LoadSegment");
        let mut req = request.into_request();
        req.extensions_mut()
            .insert(tonic::GrpcMethod::new("chroma.SegmentServer", "LoadSegment"));
        self.inner.unary(req, path, codec).await
    }

    pub async fn release_segment(
        &mut self,
        request: impl tonic::IntoRequest<super::Segment>,
    ) -> Result<tonic::Response<super::SegmentServerResponse>, tonic::Status> {
        self.ready().await?;
        let codec = tonic_prost::ProstCodec::default();
        let path = http::uri::PathAndQuery::from_static("/chroma.SegmentServer/ReleaseSegment");
        let mut req = request.into_request();
        req.extensions_mut()
            .insert(tonic::GrpcMethod::new("chroma.SegmentServer", "ReleaseSegment"));
        self.inner.unary(req, path, codec).await
    }

    pub async fn get_vectors(
        &mut self,
        request: impl tonic::IntoRequest<super::GetVectorsRequest>,
    ) -> Result<tonic::Response<super::GetVectorsResponse>, tonic::Status> {
        self.ready().await?;
        let codec = tonic_prost::ProstCodec::default();
        let path = http::uri::PathAndQuery::from_static("/chroma.SegmentServer/GetVectors");
        let mut req = request.into_request();
        req.extensions_mut()
            .insert(tonic::GrpcMethod::new("chroma.SegmentServer", "GetVectors"));
        self.inner.unary(req, path, codec).await
    }

    pub async fn query_vectors(
        &mut self,
        request: impl tonic::IntoRequest<super::QueryVectorsRequest>,
    ) -> Result<tonic::Response<super::QueryVectorsResponse>, tonic::Status> {
        self.ready().await?;
        let codec = tonic_prost::ProstCodec::default();
        let path = http::uri::PathAndQuery::from_static("/chroma.SegmentServer/QueryVectors");
        let mut req = request.into_request();
        req.extensions_mut()
            .insert(tonic::GrpcMethod::new("chroma.SegmentServer", "QueryVectors"));
        self.inner.unary(req, path, codec).await
    }
}
