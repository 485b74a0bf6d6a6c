pub mod error;
pub mod operator;
pub mod plan;

pub use error::QueryConversionError;
