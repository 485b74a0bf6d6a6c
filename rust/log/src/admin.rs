use crate::{
    managed_log::ManagedLog,
    types::{LogError, TopicName, DEFAULT_NAMESPACE, DEFAULT_TENANT},
};

/// Idempotent administration of tenants, namespaces and topics.
///
/// Creating something that already exists, or deleting something that does
/// not, succeeds. Every other failure is returned to the caller.
#[derive(Clone, Debug)]
pub struct LogAdmin {
    log: ManagedLog,
}

impl LogAdmin {
    pub fn new(log: ManagedLog) -> Self {
        Self { log }
    }

    pub fn create_tenant(&self, tenant: &str) -> Result<(), LogError> {
        match self.log.create_tenant(tenant) {
            Ok(()) | Err(LogError::TenantAlreadyExists(_)) => Ok(()),
            Err(err) => Err(err),
        }
    }

    pub fn create_namespace(&self, tenant: &str, namespace: &str) -> Result<(), LogError> {
        match self.log.create_namespace(tenant, namespace) {
            Ok(()) | Err(LogError::NamespaceAlreadyExists(_)) => Ok(()),
            Err(err) => Err(err),
        }
    }

    pub fn create_topic(&self, topic: &TopicName) -> Result<(), LogError> {
        match self.log.create_topic(topic) {
            Ok(()) => {
                tracing::info!(%topic, "Created topic");
                Ok(())
            }
            Err(LogError::TopicAlreadyExists(_)) => Ok(()),
            Err(err) => Err(err),
        }
    }

    pub fn delete_topic(&self, topic: &TopicName) -> Result<(), LogError> {
        match self.log.delete_topic(topic) {
            Ok(()) => {
                tracing::info!(%topic, "Deleted topic");
                Ok(())
            }
            Err(LogError::TopicNotFound(_)) => Ok(()),
            Err(err) => Err(err),
        }
    }

    /// Creates the default tenant and namespace every topic lives under.
    pub fn bootstrap(&self) -> Result<(), LogError> {
        self.create_tenant(DEFAULT_TENANT)?;
        self.create_namespace(DEFAULT_TENANT, DEFAULT_NAMESPACE)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::config::LogConfig;
    use chroma_error::{ChromaError, ErrorCodes};

    #[test]
    fn test_admin_is_idempotent() {
        let admin = LogAdmin::new(ManagedLog::new(&LogConfig::default()));
        admin.bootstrap().unwrap();
        admin.bootstrap().unwrap();

        let topic = TopicName::new("collection");
        admin.create_topic(&topic).unwrap();
        admin.create_topic(&topic).unwrap();
        admin.delete_topic(&topic).unwrap();
        admin.delete_topic(&topic).unwrap();
    }

    #[test]
    fn test_admin_propagates_other_failures() {
        let admin = LogAdmin::new(ManagedLog::new(&LogConfig::default()));
        let err = admin.create_tenant("acme").unwrap_err();
        assert_eq!(err.code(), ErrorCodes::InvalidArgument);

        // Namespace is missing because the log was never bootstrapped.
        let err = admin.create_topic(&TopicName::new("t")).unwrap_err();
        assert_eq!(err.code(), ErrorCodes::NotFound);
    }
}
