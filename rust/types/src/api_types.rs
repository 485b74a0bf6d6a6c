use serde::{Deserialize, Serialize};

use crate::{
    clean_metadata,
    operator::{
        GetResult, KnnBatchResult, KnnProjection, KnnProjectionRecord, Projection,
        ProjectionRecord,
    },
    CleanedMetadata, Metadata, Vector,
};

#[derive(Clone, Copy, Debug, Deserialize, PartialEq, Eq, Serialize)]
pub enum Include {
    #[serde(rename = "distances")]
    Distance,
    #[serde(rename = "documents")]
    Document,
    #[serde(rename = "embeddings")]
    Embedding,
    #[serde(rename = "metadatas")]
    Metadata,
    #[serde(rename = "uris")]
    Uri,
}

#[derive(Debug, Clone, Deserialize, PartialEq, Eq)]
pub struct IncludeList(pub Vec<Include>);

impl IncludeList {
    pub fn empty() -> Self {
        Self(Vec::new())
    }

    pub fn default_query() -> Self {
        Self(vec![
            Include::Document,
            Include::Metadata,
            Include::Distance,
        ])
    }

    pub fn default_get() -> Self {
        Self(vec![Include::Document, Include::Metadata])
    }

    pub fn contains(&self, include: Include) -> bool {
        self.0.contains(&include)
    }
}

impl From<&IncludeList> for Projection {
    fn from(include: &IncludeList) -> Self {
        Projection {
            document: include.contains(Include::Document),
            embedding: include.contains(Include::Embedding),
            metadata: include.contains(Include::Metadata),
            uri: include.contains(Include::Uri),
        }
    }
}

impl From<&IncludeList> for KnnProjection {
    fn from(include: &IncludeList) -> Self {
        KnnProjection {
            projection: include.into(),
            distance: include.contains(Include::Distance),
        }
    }
}

impl From<&Projection> for IncludeList {
    fn from(projection: &Projection) -> Self {
        let mut include = Vec::new();
        if projection.document {
            include.push(Include::Document);
        }
        if projection.embedding {
            include.push(Include::Embedding);
        }
        if projection.metadata {
            include.push(Include::Metadata);
        }
        if projection.uri {
            include.push(Include::Uri);
        }
        Self(include)
    }
}

impl From<&KnnProjection> for IncludeList {
    fn from(projection: &KnnProjection) -> Self {
        let mut include = IncludeList::from(&projection.projection);
        if projection.distance {
            include.0.push(Include::Distance);
        }
        include
    }
}

pub type CountResponse = u32;

/// Columnar result of a get. Columns that were not requested are `None`;
/// requested columns have one entry per id.
#[derive(Clone, Debug, PartialEq)]
pub struct GetResponse {
    pub ids: Vec<String>,
    pub embeddings: Option<Vec<Option<Vector>>>,
    pub documents: Option<Vec<Option<String>>>,
    pub uris: Option<Vec<Option<String>>>,
    pub metadatas: Option<Vec<Option<Metadata>>>,
    pub include: Vec<Include>,
}

impl GetResponse {
    fn empty(include: &IncludeList) -> Self {
        Self {
            ids: Vec::new(),
            embeddings: include.contains(Include::Embedding).then_some(Vec::new()),
            documents: include.contains(Include::Document).then_some(Vec::new()),
            uris: include.contains(Include::Uri).then_some(Vec::new()),
            metadatas: include.contains(Include::Metadata).then_some(Vec::new()),
            include: include.0.clone(),
        }
    }

    fn push(&mut self, record: ProjectionRecord) {
        let ProjectionRecord {
            id,
            embedding,
            metadata,
        } = record;
        let CleanedMetadata {
            metadata,
            document,
            uri,
        } = clean_metadata(metadata);
        self.ids.push(id);
        if let Some(embeddings) = self.embeddings.as_mut() {
            embeddings.push(embedding);
        }
        if let Some(documents) = self.documents.as_mut() {
            documents.push(document);
        }
        if let Some(uris) = self.uris.as_mut() {
            uris.push(uri);
        }
        if let Some(metadatas) = self.metadatas.as_mut() {
            metadatas.push(metadata);
        }
    }
}

impl From<(GetResult, IncludeList)> for GetResponse {
    fn from((result, include): (GetResult, IncludeList)) -> Self {
        let mut res = Self::empty(&include);
        for record in result.records {
            res.push(record);
        }
        res
    }
}

/// Per query columnar result of a knn. The outer index is the query vector,
/// the inner order is exactly the order returned by the segment.
#[derive(Clone, Debug, PartialEq)]
pub struct QueryResponse {
    pub ids: Vec<Vec<String>>,
    pub embeddings: Option<Vec<Vec<Option<Vector>>>>,
    pub documents: Option<Vec<Vec<Option<String>>>>,
    pub uris: Option<Vec<Vec<Option<String>>>>,
    pub metadatas: Option<Vec<Vec<Option<Metadata>>>>,
    pub distances: Option<Vec<Vec<Option<f32>>>>,
    pub include: Vec<Include>,
}

impl From<(KnnBatchResult, IncludeList)> for QueryResponse {
    fn from((result, include): (KnnBatchResult, IncludeList)) -> Self {
        let mut res = Self {
            ids: Vec::new(),
            embeddings: include.contains(Include::Embedding).then_some(Vec::new()),
            documents: include.contains(Include::Document).then_some(Vec::new()),
            uris: include.contains(Include::Uri).then_some(Vec::new()),
            metadatas: include.contains(Include::Metadata).then_some(Vec::new()),
            distances: include.contains(Include::Distance).then_some(Vec::new()),
            include: include.0.clone(),
        };
        for output in result.results {
            let mut column = GetResponse::empty(&include);
            let mut distances = Vec::with_capacity(output.records.len());
            for KnnProjectionRecord { record, distance } in output.records {
                column.push(record);
                distances.push(distance);
            }
            res.ids.push(column.ids);
            if let (Some(all), Some(one)) = (res.embeddings.as_mut(), column.embeddings) {
                all.push(one);
            }
            if let (Some(all), Some(one)) = (res.documents.as_mut(), column.documents) {
                all.push(one);
            }
            if let (Some(all), Some(one)) = (res.uris.as_mut(), column.uris) {
                all.push(one);
            }
            if let (Some(all), Some(one)) = (res.metadatas.as_mut(), column.metadatas) {
                all.push(one);
            }
            if let Some(all) = res.distances.as_mut() {
                all.push(distances);
            }
        }
        res
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::{
        operator::KnnProjectionOutput, MetadataValue, CHROMA_DOCUMENT_KEY, CHROMA_URI_KEY,
    };

    fn record(id: &str, document: Option<&str>) -> ProjectionRecord {
        let mut metadata = Metadata::from([("n".to_string(), MetadataValue::Int(1))]);
        if let Some(document) = document {
            metadata.insert(
                CHROMA_DOCUMENT_KEY.to_string(),
                MetadataValue::Str(document.to_string()),
            );
        }
        ProjectionRecord {
            id: id.to_string(),
            embedding: None,
            metadata: Some(metadata),
        }
    }

    #[test]
    fn test_get_response_only_has_requested_columns() {
        let result = GetResult {
            records: vec![record("a", Some("x")), record("b", None), record("c", Some("z"))],
        };
        let response = GetResponse::from((result, IncludeList(vec![Include::Metadata])));
        assert_eq!(response.ids, vec!["a", "b", "c"]);
        let metadatas = response.metadatas.expect("metadata requested");
        assert_eq!(metadatas.len(), 3);
        for metadata in metadatas {
            let metadata = metadata.expect("user key present");
            assert!(!metadata.contains_key(CHROMA_DOCUMENT_KEY));
        }
        assert!(response.embeddings.is_none());
        assert!(response.documents.is_none());
        assert!(response.uris.is_none());
    }

    #[test]
    fn test_documents_and_uris_come_from_shadow_keys() {
        let mut with_uri = record("a", Some("doc"));
        with_uri.metadata.as_mut().unwrap().insert(
            CHROMA_URI_KEY.to_string(),
            MetadataValue::Str("file://a".to_string()),
        );
        let response = GetResponse::from((
            GetResult {
                records: vec![with_uri, record("b", None)],
            },
            IncludeList(vec![Include::Document, Include::Uri]),
        ));
        assert_eq!(
            response.documents,
            Some(vec![Some("doc".to_string()), None])
        );
        assert_eq!(response.uris, Some(vec![Some("file://a".to_string()), None]));
        assert!(response.metadatas.is_none());
    }

    #[test]
    fn test_query_response_keeps_remote_order() {
        let output = |ids: &[(&str, f32)]| KnnProjectionOutput {
            records: ids
                .iter()
                .map(|(id, distance)| KnnProjectionRecord {
                    record: record(id, None),
                    distance: Some(*distance),
                })
                .collect(),
        };
        // Deliberately not sorted; the response must not reorder.
        let result = KnnBatchResult {
            results: vec![output(&[("b", 0.5), ("a", 0.1)]), output(&[])],
        };
        let response =
            QueryResponse::from((result, IncludeList(vec![Include::Distance])));
        assert_eq!(response.ids, vec![vec!["b".to_string(), "a".to_string()], vec![]]);
        assert_eq!(
            response.distances,
            Some(vec![vec![Some(0.5), Some(0.1)], vec![]])
        );
        assert!(response.metadatas.is_none());
        assert!(response.embeddings.is_none());
    }
}
