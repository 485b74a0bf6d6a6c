use chroma_error::{ChromaError, ErrorCodes};
use thiserror::Error;

use crate::distance::{cosine_distance_scalar, euclidean_distance_scalar, inner_product_scalar};

/// Segment metadata key that selects the distance function.
pub const DISTANCE_FUNCTION_KEY: &str = "hnsw:space";

/// The distance functions a vector segment can rank by.
/// - `Euclidean`: squared l2 norm.
/// - `Cosine`: 1 - cosine similarity.
/// - `InnerProduct`: 1 - inner product.
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq)]
pub enum DistanceFunction {
    #[default]
    Euclidean,
    Cosine,
    InnerProduct,
}

impl DistanceFunction {
    pub fn distance(&self, a: &[f32], b: &[f32]) -> f32 {
        match self {
            DistanceFunction::Euclidean => euclidean_distance_scalar(a, b),
            DistanceFunction::Cosine => cosine_distance_scalar(a, b),
            DistanceFunction::InnerProduct => inner_product_scalar(a, b),
        }
    }
}

#[derive(Error, Debug)]
pub enum DistanceFunctionError {
    #[error("Invalid distance function `{0}`")]
    InvalidDistanceFunction(String),
}

impl ChromaError for DistanceFunctionError {
    fn code(&self) -> ErrorCodes {
        match self {
            DistanceFunctionError::InvalidDistanceFunction(_) => ErrorCodes::InvalidArgument,
        }
    }
}

impl TryFrom<&str> for DistanceFunction {
    type Error = DistanceFunctionError;

    fn try_from(value: &str) -> Result<Self, Self::Error> {
        match value {
            "l2" => Ok(DistanceFunction::Euclidean),
            "cosine" => Ok(DistanceFunction::Cosine),
            "ip" => Ok(DistanceFunction::InnerProduct),
            _ => Err(DistanceFunctionError::InvalidDistanceFunction(
                value.to_string(),
            )),
        }
    }
}

impl From<DistanceFunction> for String {
    fn from(value: DistanceFunction) -> Self {
        match value {
            DistanceFunction::Euclidean => "l2",
            DistanceFunction::Cosine => "cosine",
            DistanceFunction::InnerProduct => "ip",
        }
        .to_string()
    }
}
