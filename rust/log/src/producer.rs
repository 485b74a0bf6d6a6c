use crate::{
    admin::LogAdmin,
    managed_log::{ManagedLog, TopicLog},
    types::{LogError, TopicName},
};
use chroma_types::{chroma_proto, Operation, OperationRecord, SeqId};
use parking_lot::Mutex;
use prost::Message;
use std::{collections::HashMap, sync::Arc};

/// Writes operation records to topics and returns their sequence ids.
///
/// The producer owns its cache of open topic handles. Handles for deleted
/// topics are dropped from the cache on the next submit.
#[derive(Clone, Debug)]
pub struct Producer {
    log: ManagedLog,
    admin: LogAdmin,
    topics: Arc<Mutex<HashMap<TopicName, TopicLog>>>,
}

impl Producer {
    pub fn new(log: ManagedLog) -> Self {
        Self {
            admin: LogAdmin::new(log.clone()),
            log,
            topics: Arc::default(),
        }
    }

    pub async fn create_topic(&self, topic: &str) -> Result<(), LogError> {
        self.admin.create_topic(&topic.parse()?)
    }

    pub async fn delete_topic(&self, topic: &str) -> Result<(), LogError> {
        let name: TopicName = topic.parse()?;
        self.admin.delete_topic(&name)?;
        self.topics.lock().remove(&name);
        Ok(())
    }

    /// Appends one record and returns the sequence id assigned to it.
    #[tracing::instrument(skip(self, record), fields(record_id = %record.id))]
    pub async fn submit(&self, topic: &str, record: OperationRecord) -> Result<SeqId, LogError> {
        let payload = encode_record(record)?;
        let handle = self.topic_handle(&topic.parse()?)?;
        handle
            .append(vec![payload])?
            .pop()
            .ok_or_else(|| LogError::InvalidRecord("append returned no position".to_string()))
    }

    /// Appends `records` as one log entry. The returned ids share a ledger and
    /// entry and have consecutive batch indices.
    #[tracing::instrument(skip(self, records), fields(count = records.len()))]
    pub async fn submit_batch(
        &self,
        topic: &str,
        records: Vec<OperationRecord>,
    ) -> Result<Vec<SeqId>, LogError> {
        let payloads = records
            .into_iter()
            .map(encode_record)
            .collect::<Result<Vec<_>, _>>()?;
        let handle = self.topic_handle(&topic.parse()?)?;
        handle.append(payloads)
    }

    fn topic_handle(&self, name: &TopicName) -> Result<TopicLog, LogError> {
        let mut topics = self.topics.lock();
        if let Some(handle) = topics.get(name) {
            if !handle.is_deleted() {
                return Ok(handle.clone());
            }
            topics.remove(name);
        }
        let handle = self.log.topic(name)?;
        topics.insert(name.clone(), handle.clone());
        Ok(handle)
    }
}

pub(crate) fn validate_record(record: &OperationRecord) -> Result<(), LogError> {
    if record.id.is_empty() {
        return Err(LogError::InvalidRecord("record id is empty".to_string()));
    }
    if record.operation == Operation::Add && record.embedding.is_none() {
        return Err(LogError::InvalidRecord(format!(
            "add of `{}` carries no vector",
            record.id
        )));
    }
    Ok(())
}

fn encode_record(record: OperationRecord) -> Result<Vec<u8>, LogError> {
    validate_record(&record)?;
    let proto = chroma_proto::SubmitEmbeddingRecord::try_from(record)?;
    Ok(proto.encode_to_vec())
}
