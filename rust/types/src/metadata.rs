use chroma_error::{ChromaError, ErrorCodes};
use std::{cmp::Ordering, collections::HashMap};
use thiserror::Error;

use crate::chroma_proto;

/// Reserved key namespace. Keys under it are never shown to users as metadata.
pub const CHROMA_KEY: &str = "chroma:";
pub const CHROMA_DOCUMENT_KEY: &str = "chroma:document";
pub const CHROMA_URI_KEY: &str = "chroma:uri";

#[derive(Clone, Debug, PartialEq)]
pub enum UpdateMetadataValue {
    Int(i64),
    Float(f64),
    Str(String),
    /// Deletes the key when the update is applied.
    None,
}

#[derive(Error, Debug)]
pub enum UpdateMetadataValueConversionError {
    #[error("Invalid metadata value, valid values are: Int, Float, Str, None")]
    InvalidValue,
}

impl ChromaError for UpdateMetadataValueConversionError {
    fn code(&self) -> ErrorCodes {
        match self {
            UpdateMetadataValueConversionError::InvalidValue => ErrorCodes::InvalidArgument,
        }
    }
}

impl From<&chroma_proto::UpdateMetadataValue> for UpdateMetadataValue {
    fn from(value: &chroma_proto::UpdateMetadataValue) -> Self {
        match &value.value {
            Some(chroma_proto::update_metadata_value::Value::IntValue(value)) => {
                UpdateMetadataValue::Int(*value)
            }
            Some(chroma_proto::update_metadata_value::Value::FloatValue(value)) => {
                UpdateMetadataValue::Float(*value)
            }
            Some(chroma_proto::update_metadata_value::Value::StringValue(value)) => {
                UpdateMetadataValue::Str(value.clone())
            }
            None => UpdateMetadataValue::None,
        }
    }
}

impl From<UpdateMetadataValue> for chroma_proto::UpdateMetadataValue {
    fn from(value: UpdateMetadataValue) -> Self {
        use chroma_proto::update_metadata_value::Value;
        let value = match value {
            UpdateMetadataValue::Int(value) => Some(Value::IntValue(value)),
            UpdateMetadataValue::Float(value) => Some(Value::FloatValue(value)),
            UpdateMetadataValue::Str(value) => Some(Value::StringValue(value)),
            UpdateMetadataValue::None => None,
        };
        chroma_proto::UpdateMetadataValue { value }
    }
}

impl TryFrom<&UpdateMetadataValue> for MetadataValue {
    type Error = MetadataValueConversionError;

    fn try_from(value: &UpdateMetadataValue) -> Result<Self, Self::Error> {
        match value {
            UpdateMetadataValue::Int(value) => Ok(MetadataValue::Int(*value)),
            UpdateMetadataValue::Float(value) => Ok(MetadataValue::Float(*value)),
            UpdateMetadataValue::Str(value) => Ok(MetadataValue::Str(value.clone())),
            UpdateMetadataValue::None => Err(MetadataValueConversionError::InvalidValue),
        }
    }
}

/*
===========================================
MetadataValue
===========================================
*/

#[derive(Clone, Debug, PartialEq)]
pub enum MetadataValue {
    Int(i64),
    Float(f64),
    Str(String),
}

impl MetadataValue {
    fn as_number(&self) -> Option<f64> {
        match self {
            MetadataValue::Int(value) => Some(*value as f64),
            MetadataValue::Float(value) => Some(*value),
            MetadataValue::Str(_) => None,
        }
    }

    /// Ints and floats compare numerically with each other, strings only
    /// with strings.
    pub fn compare(&self, other: &MetadataValue) -> Option<Ordering> {
        match (self, other) {
            (MetadataValue::Int(a), MetadataValue::Int(b)) => Some(a.cmp(b)),
            (MetadataValue::Str(a), MetadataValue::Str(b)) => Some(a.cmp(b)),
            _ => self.as_number()?.partial_cmp(&other.as_number()?),
        }
    }
}

impl From<MetadataValue> for UpdateMetadataValue {
    fn from(value: MetadataValue) -> Self {
        match value {
            MetadataValue::Int(value) => UpdateMetadataValue::Int(value),
            MetadataValue::Float(value) => UpdateMetadataValue::Float(value),
            MetadataValue::Str(value) => UpdateMetadataValue::Str(value),
        }
    }
}

impl TryFrom<&MetadataValue> for String {
    type Error = MetadataValueConversionError;

    fn try_from(value: &MetadataValue) -> Result<Self, Self::Error> {
        match value {
            MetadataValue::Str(value) => Ok(value.clone()),
            _ => Err(MetadataValueConversionError::InvalidValue),
        }
    }
}

#[derive(Error, Debug)]
pub enum MetadataValueConversionError {
    #[error("Metadata value is a deletion marker or of the wrong type")]
    InvalidValue,
}

impl ChromaError for MetadataValueConversionError {
    fn code(&self) -> ErrorCodes {
        match self {
            MetadataValueConversionError::InvalidValue => ErrorCodes::InvalidArgument,
        }
    }
}

impl TryFrom<&chroma_proto::UpdateMetadataValue> for MetadataValue {
    type Error = MetadataValueConversionError;

    fn try_from(value: &chroma_proto::UpdateMetadataValue) -> Result<Self, Self::Error> {
        (&UpdateMetadataValue::from(value)).try_into()
    }
}

impl From<MetadataValue> for chroma_proto::UpdateMetadataValue {
    fn from(value: MetadataValue) -> Self {
        UpdateMetadataValue::from(value).into()
    }
}

/*
===========================================
UpdateMetadata
===========================================
*/

pub type UpdateMetadata = HashMap<String, UpdateMetadataValue>;

impl From<chroma_proto::UpdateMetadata> for UpdateMetadata {
    fn from(proto_metadata: chroma_proto::UpdateMetadata) -> Self {
        proto_metadata
            .metadata
            .iter()
            .map(|(key, value)| (key.clone(), value.into()))
            .collect()
    }
}

impl From<UpdateMetadata> for chroma_proto::UpdateMetadata {
    fn from(metadata: UpdateMetadata) -> Self {
        chroma_proto::UpdateMetadata {
            metadata: metadata
                .into_iter()
                .map(|(key, value)| (key, value.into()))
                .collect(),
        }
    }
}

impl From<Metadata> for chroma_proto::UpdateMetadata {
    fn from(metadata: Metadata) -> Self {
        chroma_proto::UpdateMetadata {
            metadata: metadata
                .into_iter()
                .map(|(key, value)| (key, value.into()))
                .collect(),
        }
    }
}

/*
===========================================
Metadata
===========================================
*/

pub type Metadata = HashMap<String, MetadataValue>;

impl TryFrom<chroma_proto::UpdateMetadata> for Metadata {
    type Error = MetadataValueConversionError;

    fn try_from(proto_metadata: chroma_proto::UpdateMetadata) -> Result<Self, Self::Error> {
        proto_metadata
            .metadata
            .iter()
            .map(|(key, value)| Ok((key.clone(), MetadataValue::try_from(value)?)))
            .collect::<Result<Metadata, Self::Error>>()
    }
}

// An empty map and an absent map share one encoding: the field is omitted.

pub fn encode_update_metadata(
    metadata: Option<UpdateMetadata>,
) -> Option<chroma_proto::UpdateMetadata> {
    metadata.filter(|m| !m.is_empty()).map(Into::into)
}

pub fn decode_update_metadata(
    metadata: Option<chroma_proto::UpdateMetadata>,
) -> Option<UpdateMetadata> {
    metadata
        .filter(|m| !m.metadata.is_empty())
        .map(UpdateMetadata::from)
}

pub fn encode_metadata(metadata: Option<Metadata>) -> Option<chroma_proto::UpdateMetadata> {
    metadata.filter(|m| !m.is_empty()).map(Into::into)
}

pub fn decode_metadata(
    metadata: Option<chroma_proto::UpdateMetadata>,
) -> Result<Option<Metadata>, MetadataValueConversionError> {
    metadata
        .filter(|m| !m.metadata.is_empty())
        .map(Metadata::try_from)
        .transpose()
}

/// Applies an update in place: deletion markers remove keys, other values
/// overwrite.
pub fn merge_update_metadata(base: &mut Metadata, update: &UpdateMetadata) {
    for (key, value) in update {
        match MetadataValue::try_from(value) {
            Ok(value) => {
                base.insert(key.clone(), value);
            }
            Err(_) => {
                base.remove(key);
            }
        }
    }
}

/// Metadata as stored, split into the user visible part and the values held
/// under reserved shadow keys.
#[derive(Clone, Debug, Default, PartialEq)]
pub struct CleanedMetadata {
    pub metadata: Option<Metadata>,
    pub document: Option<String>,
    pub uri: Option<String>,
}

pub fn clean_metadata(metadata: Option<Metadata>) -> CleanedMetadata {
    let Some(metadata) = metadata else {
        return CleanedMetadata::default();
    };
    let mut cleaned = CleanedMetadata::default();
    let mut visible = Metadata::new();
    for (key, value) in metadata {
        if key == CHROMA_DOCUMENT_KEY {
            cleaned.document = String::try_from(&value).ok();
        } else if key == CHROMA_URI_KEY {
            cleaned.uri = String::try_from(&value).ok();
        } else if !key.starts_with(CHROMA_KEY) {
            visible.insert(key, value);
        }
    }
    cleaned.metadata = (!visible.is_empty()).then_some(visible);
    cleaned
}

/*
===========================================
Metadata queries
===========================================
*/

#[derive(Clone, Debug, PartialEq)]
pub enum Where {
    DirectWhereComparison(DirectWhereComparison),
    DirectWhereDocumentComparison(DirectDocumentComparison),
    WhereChildren(WhereChildren),
}

impl Where {
    pub fn conjunction(children: Vec<Where>) -> Self {
        Self::WhereChildren(WhereChildren {
            operator: BooleanOperator::And,
            children,
        })
    }

    pub fn disjunction(children: Vec<Where>) -> Self {
        Self::WhereChildren(WhereChildren {
            operator: BooleanOperator::Or,
            children,
        })
    }

    /// Evaluates the clause against one record. A missing key never
    /// satisfies a positive comparison and always satisfies a negative one.
    pub fn eval(&self, metadata: Option<&Metadata>, document: Option<&str>) -> bool {
        match self {
            Where::DirectWhereComparison(direct) => {
                let value = metadata.and_then(|m| m.get(&direct.key));
                direct.comp.eval(value)
            }
            Where::DirectWhereDocumentComparison(direct) => {
                let contains = document
                    .map(|doc| doc.contains(direct.document.as_str()))
                    .unwrap_or(false);
                match direct.operator {
                    DocumentOperator::Contains => contains,
                    DocumentOperator::NotContains => !contains,
                }
            }
            Where::WhereChildren(children) => match children.operator {
                BooleanOperator::And => children
                    .children
                    .iter()
                    .all(|child| child.eval(metadata, document)),
                BooleanOperator::Or => children
                    .children
                    .iter()
                    .any(|child| child.eval(metadata, document)),
            },
        }
    }
}

#[derive(Clone, Debug, PartialEq)]
pub struct DirectWhereComparison {
    pub key: String,
    pub comp: WhereComparison,
}

#[derive(Clone, Debug, PartialEq)]
pub enum WhereComparison {
    Primitive(PrimitiveOperator, MetadataValue),
    Set(SetOperator, MetadataSetValue),
}

impl WhereComparison {
    fn eval(&self, value: Option<&MetadataValue>) -> bool {
        match self {
            WhereComparison::Primitive(operator, target) => {
                let ordering = value.and_then(|v| v.compare(target));
                match operator {
                    PrimitiveOperator::Equal => ordering == Some(Ordering::Equal),
                    PrimitiveOperator::NotEqual => ordering != Some(Ordering::Equal),
                    PrimitiveOperator::GreaterThan => ordering == Some(Ordering::Greater),
                    PrimitiveOperator::GreaterThanOrEqual => {
                        matches!(ordering, Some(Ordering::Greater | Ordering::Equal))
                    }
                    PrimitiveOperator::LessThan => ordering == Some(Ordering::Less),
                    PrimitiveOperator::LessThanOrEqual => {
                        matches!(ordering, Some(Ordering::Less | Ordering::Equal))
                    }
                }
            }
            WhereComparison::Set(operator, targets) => {
                let found = value
                    .map(|v| {
                        targets
                            .into_vec()
                            .iter()
                            .any(|t| v.compare(t) == Some(Ordering::Equal))
                    })
                    .unwrap_or(false);
                match operator {
                    SetOperator::In => found,
                    SetOperator::NotIn => !found,
                }
            }
        }
    }
}

#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum PrimitiveOperator {
    Equal,
    NotEqual,
    GreaterThan,
    GreaterThanOrEqual,
    LessThan,
    LessThanOrEqual,
}

#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum SetOperator {
    In,
    NotIn,
}

#[derive(Clone, Debug, PartialEq)]
pub enum MetadataSetValue {
    Int(Vec<i64>),
    Float(Vec<f64>),
    Str(Vec<String>),
}

impl MetadataSetValue {
    pub fn into_vec(&self) -> Vec<MetadataValue> {
        use MetadataSetValue::*;
        match self {
            Int(vec) => vec.iter().map(|i| MetadataValue::Int(*i)).collect(),
            Float(vec) => vec.iter().map(|f| MetadataValue::Float(*f)).collect(),
            Str(vec) => vec.iter().map(|s| MetadataValue::Str(s.clone())).collect(),
        }
    }
}

#[derive(Clone, Debug, PartialEq)]
pub struct WhereChildren {
    pub operator: BooleanOperator,
    pub children: Vec<Where>,
}

#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum BooleanOperator {
    And,
    Or,
}

#[derive(Clone, Debug, PartialEq)]
pub struct DirectDocumentComparison {
    pub operator: DocumentOperator,
    pub document: String,
}

#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum DocumentOperator {
    Contains,
    NotContains,
}

#[derive(Error, Debug, Clone, PartialEq)]
pub enum WhereConversionError {
    #[error("Where clause has no expression")]
    InvalidWhere,
    #[error("Invalid comparison in where clause")]
    InvalidWhereComparison,
    #[error("Invalid boolean operator in where clause")]
    InvalidWhereChildren,
    #[error("Document comparison found in a metadata where clause, or the reverse")]
    MisplacedComparison,
}

impl ChromaError for WhereConversionError {
    fn code(&self) -> ErrorCodes {
        ErrorCodes::InvalidArgument
    }
}

impl TryFrom<chroma_proto::Where> for Where {
    type Error = WhereConversionError;

    fn try_from(proto_where: chroma_proto::Where) -> Result<Self, Self::Error> {
        match proto_where.r#where {
            Some(chroma_proto::r#where::Where::DirectComparison(proto_comparison)) => {
                Ok(Where::DirectWhereComparison(DirectWhereComparison {
                    key: proto_comparison.key.clone(),
                    comp: proto_comparison.try_into()?,
                }))
            }
            Some(chroma_proto::r#where::Where::Children(proto_children)) => {
                let children = proto_children
                    .children
                    .into_iter()
                    .map(Where::try_from)
                    .collect::<Result<Vec<_>, _>>()?;
                Ok(Where::WhereChildren(WhereChildren {
                    operator: boolean_operator_from_i32(proto_children.operator)?,
                    children,
                }))
            }
            None => Err(WhereConversionError::InvalidWhere),
        }
    }
}

impl TryFrom<chroma_proto::DirectComparison> for WhereComparison {
    type Error = WhereConversionError;

    fn try_from(proto_comparison: chroma_proto::DirectComparison) -> Result<Self, Self::Error> {
        use chroma_proto::ComparisonOperator as Op;
        let operator = Op::try_from(proto_comparison.operator)
            .map_err(|_| WhereConversionError::InvalidWhereComparison)?;
        let values = proto_comparison
            .values
            .iter()
            .map(MetadataValue::try_from)
            .collect::<Result<Vec<_>, _>>()
            .map_err(|_| WhereConversionError::InvalidWhereComparison)?;
        let single = match values.as_slice() {
            [value] => Some(value.clone()),
            _ => None,
        };
        let primitive = |op| {
            single
                .clone()
                .map(|value| WhereComparison::Primitive(op, value))
                .ok_or(WhereConversionError::InvalidWhereComparison)
        };
        let ordered = |op| match &single {
            Some(value @ (MetadataValue::Int(_) | MetadataValue::Float(_))) => {
                Ok(WhereComparison::Primitive(op, value.clone()))
            }
            _ => Err(WhereConversionError::InvalidWhereComparison),
        };
        match operator {
            Op::Eq => primitive(PrimitiveOperator::Equal),
            Op::Ne => primitive(PrimitiveOperator::NotEqual),
            Op::Gt => ordered(PrimitiveOperator::GreaterThan),
            Op::Gte => ordered(PrimitiveOperator::GreaterThanOrEqual),
            Op::Lt => ordered(PrimitiveOperator::LessThan),
            Op::Lte => ordered(PrimitiveOperator::LessThanOrEqual),
            Op::In => Ok(WhereComparison::Set(SetOperator::In, set_value(values)?)),
            Op::Nin => Ok(WhereComparison::Set(SetOperator::NotIn, set_value(values)?)),
        }
    }
}

fn set_value(values: Vec<MetadataValue>) -> Result<MetadataSetValue, WhereConversionError> {
    match values.first() {
        None | Some(MetadataValue::Str(_)) => values
            .iter()
            .map(String::try_from)
            .collect::<Result<Vec<_>, _>>()
            .map(MetadataSetValue::Str)
            .map_err(|_| WhereConversionError::InvalidWhereComparison),
        Some(MetadataValue::Int(_)) => values
            .into_iter()
            .map(|v| match v {
                MetadataValue::Int(i) => Ok(i),
                _ => Err(WhereConversionError::InvalidWhereComparison),
            })
            .collect::<Result<Vec<_>, _>>()
            .map(MetadataSetValue::Int),
        Some(MetadataValue::Float(_)) => values
            .into_iter()
            .map(|v| match v {
                MetadataValue::Float(f) => Ok(f),
                _ => Err(WhereConversionError::InvalidWhereComparison),
            })
            .collect::<Result<Vec<_>, _>>()
            .map(MetadataSetValue::Float),
    }
}

fn boolean_operator_from_i32(operator: i32) -> Result<BooleanOperator, WhereConversionError> {
    match chroma_proto::BooleanOperator::try_from(operator) {
        Ok(chroma_proto::BooleanOperator::And) => Ok(BooleanOperator::And),
        Ok(chroma_proto::BooleanOperator::Or) => Ok(BooleanOperator::Or),
        Err(_) => Err(WhereConversionError::InvalidWhereChildren),
    }
}

fn boolean_operator_to_i32(operator: BooleanOperator) -> i32 {
    match operator {
        BooleanOperator::And => chroma_proto::BooleanOperator::And as i32,
        BooleanOperator::Or => chroma_proto::BooleanOperator::Or as i32,
    }
}

impl TryFrom<chroma_proto::WhereDocument> for Where {
    type Error = WhereConversionError;

    fn try_from(proto_document: chroma_proto::WhereDocument) -> Result<Self, Self::Error> {
        match proto_document.where_document {
            Some(chroma_proto::where_document::WhereDocument::Direct(proto_comparison)) => {
                let operator = match chroma_proto::WhereDocumentOperator::try_from(
                    proto_comparison.operator,
                ) {
                    Ok(chroma_proto::WhereDocumentOperator::Contains) => DocumentOperator::Contains,
                    Ok(chroma_proto::WhereDocumentOperator::NotContains) => {
                        DocumentOperator::NotContains
                    }
                    Err(_) => return Err(WhereConversionError::InvalidWhereComparison),
                };
                Ok(Where::DirectWhereDocumentComparison(
                    DirectDocumentComparison {
                        document: proto_comparison.document,
                        operator,
                    },
                ))
            }
            Some(chroma_proto::where_document::WhereDocument::Children(proto_children)) => {
                let children = proto_children
                    .children
                    .into_iter()
                    .map(Where::try_from)
                    .collect::<Result<_, _>>()?;
                Ok(Where::WhereChildren(WhereChildren {
                    operator: boolean_operator_from_i32(proto_children.operator)?,
                    children,
                }))
            }
            None => Err(WhereConversionError::InvalidWhere),
        }
    }
}

impl TryFrom<Where> for chroma_proto::Where {
    type Error = WhereConversionError;

    fn try_from(value: Where) -> Result<Self, Self::Error> {
        use chroma_proto::ComparisonOperator as Op;
        let proto_where = match value {
            Where::DirectWhereComparison(direct) => {
                let (operator, values) = match direct.comp {
                    WhereComparison::Primitive(op, value) => {
                        let op = match op {
                            PrimitiveOperator::Equal => Op::Eq,
                            PrimitiveOperator::NotEqual => Op::Ne,
                            PrimitiveOperator::GreaterThan => Op::Gt,
                            PrimitiveOperator::GreaterThanOrEqual => Op::Gte,
                            PrimitiveOperator::LessThan => Op::Lt,
                            PrimitiveOperator::LessThanOrEqual => Op::Lte,
                        };
                        (op, vec![value])
                    }
                    WhereComparison::Set(op, set) => {
                        let op = match op {
                            SetOperator::In => Op::In,
                            SetOperator::NotIn => Op::Nin,
                        };
                        (op, set.into_vec())
                    }
                };
                chroma_proto::r#where::Where::DirectComparison(chroma_proto::DirectComparison {
                    key: direct.key,
                    operator: operator as i32,
                    values: values.into_iter().map(Into::into).collect(),
                })
            }
            Where::WhereChildren(children) => {
                chroma_proto::r#where::Where::Children(chroma_proto::WhereChildren {
                    children: children
                        .children
                        .into_iter()
                        .map(chroma_proto::Where::try_from)
                        .collect::<Result<_, _>>()?,
                    operator: boolean_operator_to_i32(children.operator),
                })
            }
            Where::DirectWhereDocumentComparison(_) => {
                return Err(WhereConversionError::MisplacedComparison)
            }
        };
        Ok(chroma_proto::Where {
            r#where: Some(proto_where),
        })
    }
}

impl TryFrom<Where> for chroma_proto::WhereDocument {
    type Error = WhereConversionError;

    fn try_from(value: Where) -> Result<Self, Self::Error> {
        let proto_document = match value {
            Where::DirectWhereDocumentComparison(direct) => {
                let operator = match direct.operator {
                    DocumentOperator::Contains => chroma_proto::WhereDocumentOperator::Contains,
                    DocumentOperator::NotContains => {
                        chroma_proto::WhereDocumentOperator::NotContains
                    }
                };
                chroma_proto::where_document::WhereDocument::Direct(
                    chroma_proto::DirectWhereDocument {
                        document: direct.document,
                        operator: operator as i32,
                    },
                )
            }
            Where::WhereChildren(children) => chroma_proto::where_document::WhereDocument::Children(
                chroma_proto::WhereDocumentChildren {
                    children: children
                        .children
                        .into_iter()
                        .map(chroma_proto::WhereDocument::try_from)
                        .collect::<Result<_, _>>()?,
                    operator: boolean_operator_to_i32(children.operator),
                },
            ),
            Where::DirectWhereComparison(_) => {
                return Err(WhereConversionError::MisplacedComparison)
            }
        };
        Ok(chroma_proto::WhereDocument {
            where_document: Some(proto_document),
        })
    }
}
