//! Protobuf messages and gRPC service glue for the `chroma` package.
//!
//! The messages are declared with `prost` derives directly so that the crate
//! builds without a protoc toolchain; field tags are the wire contract and
//! must never be renumbered.

pub mod query_executor_client;
pub mod query_executor_server;
pub mod segment_server_client;
pub mod segment_server_server;

use std::collections::HashMap;

#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash, PartialOrd, Ord, ::prost::Enumeration)]
#[repr(i32)]
pub enum ScalarEncoding {
    Float32 = 0,
    Int32 = 1,
}

#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash, PartialOrd, Ord, ::prost::Enumeration)]
#[repr(i32)]
pub enum Operation {
    Add = 0,
    Update = 1,
    Upsert = 2,
    Delete = 3,
}

#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash, PartialOrd, Ord, ::prost::Enumeration)]
#[repr(i32)]
pub enum SegmentScope {
    Vector = 0,
    Metadata = 1,
    Record = 2,
}

#[derive(Clone, PartialEq, ::prost::Message)]
pub struct Vector {
    #[prost(int32, tag = "1")]
    pub dimension: i32,
    #[prost(bytes = "vec", tag = "2")]
    pub vector: Vec<u8>,
    #[prost(enumeration = "ScalarEncoding", tag = "3")]
    pub encoding: i32,
}

#[derive(Clone, PartialEq, ::prost::Message)]
pub struct UpdateMetadataValue {
    /// Unset means the key is to be deleted when the update is applied.
    #[prost(oneof = "update_metadata_value::Value", tags = "1, 2, 3")]
    pub value: Option<update_metadata_value::Value>,
}

pub mod update_metadata_value {
    #[derive(Clone, PartialEq, ::prost::Oneof)]
    pub enum Value {
        #[prost(string, tag = "1")]
        StringValue(String),
        #[prost(int64, tag = "2")]
        IntValue(i64),
        #[prost(double, tag = "3")]
        FloatValue(f64),
    }
}

#[derive(Clone, PartialEq, ::prost::Message)]
pub struct UpdateMetadata {
    #[prost(map = "string, message", tag = "1")]
    pub metadata: HashMap<String, UpdateMetadataValue>,
}

#[derive(Clone, PartialEq, ::prost::Message)]
pub struct Segment {
    #[prost(string, tag = "1")]
    pub id: String,
    #[prost(string, tag = "2")]
    pub r#type: String,
    #[prost(enumeration = "SegmentScope", tag = "3")]
    pub scope: i32,
    #[prost(string, optional, tag = "5")]
    pub collection: Option<String>,
    #[prost(message, optional, tag = "6")]
    pub metadata: Option<UpdateMetadata>,
}

#[derive(Clone, PartialEq, ::prost::Message)]
pub struct Collection {
    #[prost(string, tag = "1")]
    pub id: String,
    #[prost(string, tag = "2")]
    pub name: String,
    #[prost(uint32, optional, tag = "3")]
    pub dimension: Option<u32>,
    #[prost(uint64, tag = "4")]
    pub version: u64,
}

#[derive(Clone, PartialEq, ::prost::Message)]
pub struct SubmitEmbeddingRecord {
    #[prost(string, tag = "1")]
    pub id: String,
    #[prost(message, optional, tag = "2")]
    pub vector: Option<Vector>,
    #[prost(message, optional, tag = "3")]
    pub metadata: Option<UpdateMetadata>,
    #[prost(enumeration = "Operation", tag = "4")]
    pub operation: i32,
    #[prost(string, tag = "5")]
    pub collection_id: String,
}

#[derive(Clone, PartialEq, ::prost::Message)]
pub struct VectorEmbeddingRecord {
    #[prost(string, tag = "1")]
    pub id: String,
    #[prost(bytes = "vec", tag = "2")]
    pub seq_id: Vec<u8>,
    #[prost(message, optional, tag = "3")]
    pub vector: Option<Vector>,
}

#[derive(Clone, PartialEq, ::prost::Message)]
pub struct VectorQueryResult {
    #[prost(string, tag = "1")]
    pub id: String,
    #[prost(bytes = "vec", tag = "2")]
    pub seq_id: Vec<u8>,
    #[prost(float, tag = "3")]
    pub distance: f32,
    #[prost(message, optional, tag = "4")]
    pub vector: Option<Vector>,
}

#[derive(Clone, PartialEq, ::prost::Message)]
pub struct VectorQueryResults {
    #[prost(message, repeated, tag = "1")]
    pub results: Vec<VectorQueryResult>,
}

/*
===========================================
Segment server
===========================================
*/

#[derive(Clone, PartialEq, ::prost::Message)]
pub struct SegmentServerResponse {
    #[prost(bool, tag = "1")]
    pub success: bool,
}

#[derive(Clone, PartialEq, ::prost::Message)]
pub struct GetVectorsRequest {
    /// Absent means every record. Present and empty means none.
    #[prost(message, optional, tag = "1")]
    pub ids: Option<UserIds>,
    #[prost(string, tag = "2")]
    pub segment_id: String,
}

#[derive(Clone, PartialEq, ::prost::Message)]
pub struct GetVectorsResponse {
    #[prost(message, repeated, tag = "1")]
    pub records: Vec<VectorEmbeddingRecord>,
}

#[derive(Clone, PartialEq, ::prost::Message)]
pub struct QueryVectorsRequest {
    #[prost(message, repeated, tag = "1")]
    pub vectors: Vec<Vector>,
    #[prost(uint32, tag = "2")]
    pub k: u32,
    /// Absent means no restriction. Present and empty restricts to nothing.
    #[prost(message, optional, tag = "3")]
    pub allowed_ids: Option<UserIds>,
    #[prost(bool, tag = "4")]
    pub include_embeddings: bool,
    #[prost(string, tag = "5")]
    pub segment_id: String,
}

#[derive(Clone, PartialEq, ::prost::Message)]
pub struct QueryVectorsResponse {
    #[prost(message, repeated, tag = "1")]
    pub results: Vec<VectorQueryResults>,
}

/*
===========================================
Query executor
===========================================
*/

#[derive(Clone, PartialEq, ::prost::Message)]
pub struct ScanOperator {
    #[prost(message, optional, tag = "1")]
    pub collection: Option<Collection>,
    #[prost(message, optional, tag = "2")]
    pub knn: Option<Segment>,
    #[prost(message, optional, tag = "3")]
    pub metadata: Option<Segment>,
}

#[derive(Clone, PartialEq, ::prost::Message)]
pub struct UserIds {
    #[prost(string, repeated, tag = "1")]
    pub ids: Vec<String>,
}

#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash, PartialOrd, Ord, ::prost::Enumeration)]
#[repr(i32)]
pub enum BooleanOperator {
    And = 0,
    Or = 1,
}

#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash, PartialOrd, Ord, ::prost::Enumeration)]
#[repr(i32)]
pub enum ComparisonOperator {
    Eq = 0,
    Ne = 1,
    Gt = 2,
    Gte = 3,
    Lt = 4,
    Lte = 5,
    In = 6,
    Nin = 7,
}

#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash, PartialOrd, Ord, ::prost::Enumeration)]
#[repr(i32)]
pub enum WhereDocumentOperator {
    Contains = 0,
    NotContains = 1,
}

#[derive(Clone, PartialEq, ::prost::Message)]
pub struct DirectComparison {
    #[prost(string, tag = "1")]
    pub key: String,
    #[prost(enumeration = "ComparisonOperator", tag = "2")]
    pub operator: i32,
    /// One value for primitive operators, any number for set operators.
    #[prost(message, repeated, tag = "3")]
    pub values: Vec<UpdateMetadataValue>,
}

#[derive(Clone, PartialEq, ::prost::Message)]
pub struct WhereChildren {
    #[prost(message, repeated, tag = "1")]
    pub children: Vec<Where>,
    #[prost(enumeration = "BooleanOperator", tag = "2")]
    pub operator: i32,
}

#[derive(Clone, PartialEq, ::prost::Message)]
pub struct Where {
    #[prost(oneof = "r#where::Where", tags = "1, 2")]
    pub r#where: Option<r#where::Where>,
}

pub mod r#where {
    #[derive(Clone, PartialEq, ::prost::Oneof)]
    pub enum Where {
        #[prost(message, tag = "1")]
        DirectComparison(super::DirectComparison),
        #[prost(message, tag = "2")]
        Children(super::WhereChildren),
    }
}

#[derive(Clone, PartialEq, ::prost::Message)]
pub struct DirectWhereDocument {
    #[prost(string, tag = "1")]
    pub document: String,
    #[prost(enumeration = "WhereDocumentOperator", tag = "2")]
    pub operator: i32,
}

#[derive(Clone, PartialEq, ::prost::Message)]
pub struct WhereDocumentChildren {
    #[prost(message, repeated, tag = "1")]
    pub children: Vec<WhereDocument>,
    #[prost(enumeration = "BooleanOperator", tag = "2")]
    pub operator: i32,
}

#[derive(Clone, PartialEq, ::prost::Message)]
pub struct WhereDocument {
    #[prost(oneof = "where_document::WhereDocument", tags = "1, 2")]
    pub where_document: Option<where_document::WhereDocument>,
}

pub mod where_document {
    #[derive(Clone, PartialEq, ::prost::Oneof)]
    pub enum WhereDocument {
        #[prost(message, tag = "1")]
        Direct(super::DirectWhereDocument),
        #[prost(message, tag = "2")]
        Children(super::WhereDocumentChildren),
    }
}

#[derive(Clone, PartialEq, ::prost::Message)]
pub struct FilterOperator {
    #[prost(message, optional, tag = "1")]
    pub ids: Option<UserIds>,
    #[prost(message, optional, tag = "2")]
    pub r#where: Option<Where>,
    #[prost(message, optional, tag = "3")]
    pub where_document: Option<WhereDocument>,
}

#[derive(Clone, PartialEq, ::prost::Message)]
pub struct LimitOperator {
    #[prost(uint32, tag = "1")]
    pub offset: u32,
    #[prost(uint32, optional, tag = "2")]
    pub limit: Option<u32>,
}

#[derive(Clone, PartialEq, ::prost::Message)]
pub struct ProjectionOperator {
    #[prost(bool, tag = "1")]
    pub document: bool,
    #[prost(bool, tag = "2")]
    pub embedding: bool,
    #[prost(bool, tag = "3")]
    pub metadata: bool,
    #[prost(bool, tag = "4")]
    pub uri: bool,
}

#[derive(Clone, PartialEq, ::prost::Message)]
pub struct KnnOperator {
    #[prost(message, repeated, tag = "1")]
    pub embeddings: Vec<Vector>,
    #[prost(uint32, tag = "2")]
    pub fetch: u32,
}

#[derive(Clone, PartialEq, ::prost::Message)]
pub struct KnnProjectionOperator {
    #[prost(message, optional, tag = "1")]
    pub projection: Option<ProjectionOperator>,
    #[prost(bool, tag = "2")]
    pub distance: bool,
}

#[derive(Clone, PartialEq, ::prost::Message)]
pub struct CountPlan {
    #[prost(message, optional, tag = "1")]
    pub scan: Option<ScanOperator>,
}

#[derive(Clone, PartialEq, ::prost::Message)]
pub struct CountResult {
    #[prost(uint32, tag = "1")]
    pub count: u32,
}

#[derive(Clone, PartialEq, ::prost::Message)]
pub struct GetPlan {
    #[prost(message, optional, tag = "1")]
    pub scan: Option<ScanOperator>,
    #[prost(message, optional, tag = "2")]
    pub filter: Option<FilterOperator>,
    #[prost(message, optional, tag = "3")]
    pub limit: Option<LimitOperator>,
    #[prost(message, optional, tag = "4")]
    pub projection: Option<ProjectionOperator>,
}

#[derive(Clone, PartialEq, ::prost::Message)]
pub struct ProjectionRecord {
    #[prost(string, tag = "1")]
    pub id: String,
    #[prost(message, optional, tag = "2")]
    pub embedding: Option<Vector>,
    /// Raw stored metadata, including reserved `chroma:` keys.
    #[prost(message, optional, tag = "3")]
    pub metadata: Option<UpdateMetadata>,
}

#[derive(Clone, PartialEq, ::prost::Message)]
pub struct GetResult {
    #[prost(message, repeated, tag = "1")]
    pub records: Vec<ProjectionRecord>,
}

#[derive(Clone, PartialEq, ::prost::Message)]
pub struct KnnPlan {
    #[prost(message, optional, tag = "1")]
    pub scan: Option<ScanOperator>,
    #[prost(message, optional, tag = "2")]
    pub filter: Option<FilterOperator>,
    #[prost(message, optional, tag = "3")]
    pub knn: Option<KnnOperator>,
    #[prost(message, optional, tag = "4")]
    pub projection: Option<KnnProjectionOperator>,
}

#[derive(Clone, PartialEq, ::prost::Message)]
pub struct KnnProjectionRecord {
    #[prost(message, optional, tag = "1")]
    pub record: Option<ProjectionRecord>,
    #[prost(float, optional, tag = "2")]
    pub distance: Option<f32>,
}

#[derive(Clone, PartialEq, ::prost::Message)]
pub struct KnnResult {
    #[prost(message, repeated, tag = "1")]
    pub records: Vec<KnnProjectionRecord>,
}

#[derive(Clone, PartialEq, ::prost::Message)]
pub struct KnnBatchResult {
    #[prost(message, repeated, tag = "1")]
    pub results: Vec<KnnResult>,
}
