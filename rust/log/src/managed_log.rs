use crate::{
    config::LogConfig,
    types::{check_namespace, check_tenant, LogError, TopicName},
};
use chroma_types::{MessagePosition, SeqId};
use parking_lot::Mutex;
use std::{
    collections::{HashMap, HashSet},
    sync::Arc,
};
use tokio::sync::Notify;

/// A message as stored in the log, keyed by its sequence id.
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct LogMessage {
    pub seq_id: SeqId,
    pub payload: Vec<u8>,
}

#[derive(Debug)]
struct TopicState {
    messages: Vec<LogMessage>,
    ledger_id: u64,
    next_entry_id: u64,
    deleted: bool,
}

#[derive(Debug)]
struct TopicInner {
    name: TopicName,
    partition: u32,
    entries_per_ledger: u64,
    state: Mutex<TopicState>,
    appended: Notify,
}

/// Handle to one topic of a `ManagedLog`. Clones share the topic.
#[derive(Clone, Debug)]
pub struct TopicLog {
    inner: Arc<TopicInner>,
}

impl TopicLog {
    fn new(name: TopicName, entries_per_ledger: u64) -> Self {
        Self {
            inner: Arc::new(TopicInner {
                name,
                partition: 0,
                entries_per_ledger: entries_per_ledger.max(1),
                state: Mutex::new(TopicState {
                    messages: Vec::new(),
                    // Ledger 0 is never written, so no message has the
                    // minimum sequence id.
                    ledger_id: 1,
                    next_entry_id: 0,
                    deleted: false,
                }),
                appended: Notify::new(),
            }),
        }
    }

    pub fn name(&self) -> &TopicName {
        &self.inner.name
    }

    pub fn is_deleted(&self) -> bool {
        self.inner.state.lock().deleted
    }

    /// Appends `payloads` as a single entry, one batch index per payload.
    /// Returns the sequence id of each payload in order.
    pub fn append(&self, payloads: Vec<Vec<u8>>) -> Result<Vec<SeqId>, LogError> {
        if payloads.is_empty() {
            return Ok(Vec::new());
        }
        if u32::try_from(payloads.len()).is_err() {
            return Err(LogError::BatchTooLarge(payloads.len()));
        }
        let seq_ids = {
            let mut state = self.inner.state.lock();
            if state.deleted {
                return Err(LogError::TopicNotFound(self.inner.name.to_string()));
            }
            if state.next_entry_id >= self.inner.entries_per_ledger {
                state.ledger_id += 1;
                state.next_entry_id = 0;
                tracing::debug!(
                    topic = %self.inner.name,
                    ledger_id = state.ledger_id,
                    "Rolled over to a new ledger"
                );
            }
            let ledger_id = state.ledger_id;
            let entry_id = state.next_entry_id;
            let mut seq_ids = Vec::with_capacity(payloads.len());
            for (batch_index, payload) in (0u32..).zip(payloads) {
                let seq_id = SeqId::encode(MessagePosition {
                    partition: self.inner.partition,
                    ledger_id,
                    entry_id,
                    batch_index,
                })?;
                state.messages.push(LogMessage { seq_id, payload });
                seq_ids.push(seq_id);
            }
            state.next_entry_id += 1;
            seq_ids
        };
        self.inner.appended.notify_waiters();
        Ok(seq_ids)
    }

    /// Reads up to `max` messages with a sequence id strictly greater than
    /// `after`, in log order. `None` reads from the beginning.
    pub fn read_after(
        &self,
        after: Option<SeqId>,
        max: usize,
    ) -> Result<Vec<LogMessage>, LogError> {
        let state = self.inner.state.lock();
        if state.deleted {
            return Err(LogError::TopicNotFound(self.inner.name.to_string()));
        }
        let start = match after {
            Some(after) => state.messages.partition_point(|m| m.seq_id <= after),
            None => 0,
        };
        Ok(state.messages[start..].iter().take(max).cloned().collect())
    }

    /// The sequence id of the newest message, if any.
    pub fn last_seq_id(&self) -> Option<SeqId> {
        self.inner
            .state
            .lock()
            .messages
            .last()
            .map(|message| message.seq_id)
    }

    /// Woken on every append and when the topic is deleted.
    pub fn appended(&self) -> &Notify {
        &self.inner.appended
    }

    fn mark_deleted(&self) {
        self.inner.state.lock().deleted = true;
        self.inner.appended.notify_waiters();
    }
}

#[derive(Debug, Default)]
struct LogState {
    tenants: HashSet<String>,
    namespaces: HashSet<(String, String)>,
    topics: HashMap<TopicName, TopicLog>,
}

/// In-process append-only log with tenants, namespaces and topics.
///
/// Each topic is a sequence of ledgers, each ledger a sequence of entries
/// and each entry a batch of messages. A message's position in that
/// hierarchy is its sequence id. Administrative calls report conflicts as
/// errors; `LogAdmin` is the idempotent front for them.
#[derive(Clone, Debug)]
pub struct ManagedLog {
    entries_per_ledger: u64,
    state: Arc<Mutex<LogState>>,
}

impl ManagedLog {
    pub fn new(config: &LogConfig) -> Self {
        Self {
            entries_per_ledger: config.entries_per_ledger,
            state: Arc::default(),
        }
    }

    pub fn create_tenant(&self, tenant: &str) -> Result<(), LogError> {
        check_tenant(tenant)?;
        if !self.state.lock().tenants.insert(tenant.to_string()) {
            return Err(LogError::TenantAlreadyExists(tenant.to_string()));
        }
        Ok(())
    }

    pub fn create_namespace(&self, tenant: &str, namespace: &str) -> Result<(), LogError> {
        check_tenant(tenant)?;
        check_namespace(namespace)?;
        let mut state = self.state.lock();
        if !state.tenants.contains(tenant) {
            return Err(LogError::TenantNotFound(tenant.to_string()));
        }
        if !state
            .namespaces
            .insert((tenant.to_string(), namespace.to_string()))
        {
            return Err(LogError::NamespaceAlreadyExists(format!(
                "{tenant}/{namespace}"
            )));
        }
        Ok(())
    }

    pub fn create_topic(&self, name: &TopicName) -> Result<(), LogError> {
        let mut state = self.state.lock();
        if !state
            .namespaces
            .contains(&(name.tenant.clone(), name.namespace.clone()))
        {
            return Err(LogError::NamespaceNotFound(format!(
                "{}/{}",
                name.tenant, name.namespace
            )));
        }
        if state.topics.contains_key(name) {
            return Err(LogError::TopicAlreadyExists(name.to_string()));
        }
        state
            .topics
            .insert(name.clone(), TopicLog::new(name.clone(), self.entries_per_ledger));
        Ok(())
    }

    pub fn delete_topic(&self, name: &TopicName) -> Result<(), LogError> {
        let topic = self
            .state
            .lock()
            .topics
            .remove(name)
            .ok_or_else(|| LogError::TopicNotFound(name.to_string()))?;
        topic.mark_deleted();
        Ok(())
    }

    pub fn topic(&self, name: &TopicName) -> Result<TopicLog, LogError> {
        self.state
            .lock()
            .topics
            .get(name)
            .cloned()
            .ok_or_else(|| LogError::TopicNotFound(name.to_string()))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::types::{DEFAULT_NAMESPACE, DEFAULT_TENANT};

    fn log_with_topic(entries_per_ledger: u64) -> (ManagedLog, TopicLog) {
        let log = ManagedLog::new(&LogConfig {
            entries_per_ledger,
            ..Default::default()
        });
        log.create_tenant(DEFAULT_TENANT).unwrap();
        log.create_namespace(DEFAULT_TENANT, DEFAULT_NAMESPACE).unwrap();
        let name = TopicName::new("t");
        log.create_topic(&name).unwrap();
        let topic = log.topic(&name).unwrap();
        (log, topic)
    }

    #[test]
    fn test_positions_and_rollover() {
        let (_log, topic) = log_with_topic(2);
        let first = topic.append(vec![b"a".to_vec(), b"b".to_vec()]).unwrap();
        let second = topic.append(vec![b"c".to_vec()]).unwrap();
        let third = topic.append(vec![b"d".to_vec()]).unwrap();

        let positions = first
            .iter()
            .chain(&second)
            .chain(&third)
            .map(|seq_id| {
                let p = seq_id.decode();
                (p.ledger_id, p.entry_id, p.batch_index)
            })
            .collect::<Vec<_>>();
        assert_eq!(positions, vec![(1, 0, 0), (1, 0, 1), (1, 1, 0), (2, 0, 0)]);
        assert!(all_after_min(&first));

        let all = first.iter().chain(&second).chain(&third).collect::<Vec<_>>();
        assert!(all.windows(2).all(|w| w[0] < w[1]));
        assert_eq!(topic.last_seq_id(), Some(third[0]));
    }

    fn all_after_min(seq_ids: &[SeqId]) -> bool {
        seq_ids.iter().all(|seq_id| *seq_id > chroma_types::min_seqid())
    }

    #[test]
    fn test_read_after() {
        let (_log, topic) = log_with_topic(10);
        let ids = topic
            .append((0..5u8).map(|i| vec![i]).collect())
            .unwrap();
        let all = topic.read_after(None, 100).unwrap();
        assert_eq!(all.len(), 5);
        let tail = topic.read_after(Some(ids[1]), 2).unwrap();
        assert_eq!(
            tail.iter().map(|m| m.payload.clone()).collect::<Vec<_>>(),
            vec![vec![2], vec![3]]
        );
        assert!(topic.read_after(Some(ids[4]), 10).unwrap().is_empty());
    }

    #[test]
    fn test_admin_conflicts() {
        let (log, topic) = log_with_topic(10);
        let name = TopicName::new("t");
        assert!(matches!(
            log.create_tenant(DEFAULT_TENANT),
            Err(LogError::TenantAlreadyExists(_))
        ));
        assert!(matches!(
            log.create_topic(&name),
            Err(LogError::TopicAlreadyExists(_))
        ));
        log.delete_topic(&name).unwrap();
        assert!(topic.is_deleted());
        assert!(matches!(
            topic.append(vec![vec![1]]),
            Err(LogError::TopicNotFound(_))
        ));
        assert!(matches!(
            log.delete_topic(&name),
            Err(LogError::TopicNotFound(_))
        ));
    }

    #[test]
    fn test_topic_requires_namespace() {
        let log = ManagedLog::new(&LogConfig::default());
        assert!(matches!(
            log.create_namespace(DEFAULT_TENANT, DEFAULT_NAMESPACE),
            Err(LogError::TenantNotFound(_))
        ));
        assert!(matches!(
            log.create_topic(&TopicName::new("t")),
            Err(LogError::NamespaceNotFound(_))
        ));
    }
}
