use chroma_error::{ChromaError, ErrorCodes};
use chroma_types::{RecordConversionError, SeqIdError};
use std::{fmt, str::FromStr};
use thiserror::Error;
use uuid::Uuid;

/// The only tenant the log accepts. Multi-tenancy lives above this layer.
pub const DEFAULT_TENANT: &str = "default";
/// The only namespace the log accepts.
pub const DEFAULT_NAMESPACE: &str = "default";

const TOPIC_SCHEME: &str = "persistent://";

pub type SubscriptionId = Uuid;

#[derive(Error, Debug)]
pub enum LogError {
    #[error("Invalid topic name `{0}`, expected tenant/namespace/topic")]
    InvalidTopicName(String),
    #[error("Tenant `{0}` is not allowed, only `{DEFAULT_TENANT}` is supported")]
    TenantNotAllowed(String),
    #[error("Namespace `{0}` is not allowed, only `{DEFAULT_NAMESPACE}` is supported")]
    NamespaceNotAllowed(String),
    #[error("Tenant `{0}` already exists")]
    TenantAlreadyExists(String),
    #[error("Namespace `{0}` already exists")]
    NamespaceAlreadyExists(String),
    #[error("Topic `{0}` already exists")]
    TopicAlreadyExists(String),
    #[error("Tenant `{0}` does not exist")]
    TenantNotFound(String),
    #[error("Namespace `{0}` does not exist")]
    NamespaceNotFound(String),
    #[error("Topic `{0}` does not exist")]
    TopicNotFound(String),
    #[error("Invalid record: {0}")]
    InvalidRecord(String),
    #[error("Batch of {0} records does not fit in one entry")]
    BatchTooLarge(usize),
    #[error("Subscription {0} already exists")]
    SubscriptionAlreadyExists(SubscriptionId),
    #[error("Subscription {subscription_id} gave up after {attempts} failed deliveries")]
    DeliveryFailed {
        subscription_id: SubscriptionId,
        attempts: u32,
        #[source]
        source: Box<dyn ChromaError>,
    },
    #[error(transparent)]
    Record(#[from] RecordConversionError),
    #[error(transparent)]
    SeqId(#[from] SeqIdError),
    #[error("Failed to decode log entry: {0}")]
    Decode(#[from] prost::DecodeError),
}

impl ChromaError for LogError {
    fn code(&self) -> ErrorCodes {
        match self {
            LogError::InvalidTopicName(_)
            | LogError::TenantNotAllowed(_)
            | LogError::NamespaceNotAllowed(_)
            | LogError::InvalidRecord(_)
            | LogError::BatchTooLarge(_) => ErrorCodes::InvalidArgument,
            LogError::TenantAlreadyExists(_)
            | LogError::NamespaceAlreadyExists(_)
            | LogError::TopicAlreadyExists(_)
            | LogError::SubscriptionAlreadyExists(_) => ErrorCodes::AlreadyExists,
            LogError::TenantNotFound(_)
            | LogError::NamespaceNotFound(_)
            | LogError::TopicNotFound(_) => ErrorCodes::NotFound,
            LogError::Record(err) => err.code(),
            LogError::SeqId(err) => err.code(),
            LogError::Decode(_) => ErrorCodes::Internal,
            LogError::DeliveryFailed { source, .. } => source.code(),
        }
    }
}

/// A fully qualified topic: `{tenant}/{namespace}/{topic}`.
///
/// Parsing accepts an optional `persistent://` prefix. Only the default tenant
/// and namespace are accepted.
#[derive(Clone, Debug, PartialEq, Eq, Hash)]
pub struct TopicName {
    pub tenant: String,
    pub namespace: String,
    pub topic: String,
}

impl TopicName {
    pub fn new(topic: impl Into<String>) -> Self {
        Self {
            tenant: DEFAULT_TENANT.to_string(),
            namespace: DEFAULT_NAMESPACE.to_string(),
            topic: topic.into(),
        }
    }
}

pub(crate) fn check_tenant(tenant: &str) -> Result<(), LogError> {
    if tenant != DEFAULT_TENANT {
        return Err(LogError::TenantNotAllowed(tenant.to_string()));
    }
    Ok(())
}

pub(crate) fn check_namespace(namespace: &str) -> Result<(), LogError> {
    if namespace != DEFAULT_NAMESPACE {
        return Err(LogError::NamespaceNotAllowed(namespace.to_string()));
    }
    Ok(())
}

impl FromStr for TopicName {
    type Err = LogError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        let path = s.strip_prefix(TOPIC_SCHEME).unwrap_or(s);
        let mut parts = path.split('/');
        let (Some(tenant), Some(namespace), Some(topic), None) =
            (parts.next(), parts.next(), parts.next(), parts.next())
        else {
            return Err(LogError::InvalidTopicName(s.to_string()));
        };
        if tenant.is_empty() || namespace.is_empty() || topic.is_empty() {
            return Err(LogError::InvalidTopicName(s.to_string()));
        }
        check_tenant(tenant)?;
        check_namespace(namespace)?;
        Ok(Self {
            tenant: tenant.to_string(),
            namespace: namespace.to_string(),
            topic: topic.to_string(),
        })
    }
}

impl fmt::Display for TopicName {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}/{}/{}", self.tenant, self.namespace, self.topic)
    }
}
