use crate::{
    config::LogConfig,
    managed_log::{ManagedLog, TopicLog},
    types::{LogError, SubscriptionId, TopicName},
};
use chroma_error::ChromaError;
use chroma_types::{chroma_proto, EmbeddingRecord, SeqId};
use futures::future::BoxFuture;
use parking_lot::Mutex;
use prost::Message;
use std::{collections::HashMap, sync::Arc, time::Duration};
use tokio::task::JoinHandle;
use tokio_util::sync::CancellationToken;
use uuid::Uuid;

/// Receives ordered, non-empty batches. May be called again with the same
/// records after a failure, so it must be idempotent by sequence id.
pub type ConsumerCallback = Arc<
    dyn Fn(Vec<EmbeddingRecord>) -> BoxFuture<'static, Result<(), Box<dyn ChromaError>>>
        + Send
        + Sync,
>;

#[derive(Debug)]
struct Subscription {
    topic: TopicName,
    cancel: CancellationToken,
    // Held for the duration of every callback invocation.
    delivery_guard: Arc<tokio::sync::Mutex<()>>,
    handle: JoinHandle<()>,
}

type Subscriptions = Arc<Mutex<HashMap<SubscriptionId, Subscription>>>;

/// Delivers records from topics to registered callbacks.
///
/// Each subscription runs as its own task. Within a subscription batches are
/// delivered in log order and never overlap; a failed batch is redelivered
/// up to `max_redeliveries` times before the subscription stops.
#[derive(Clone, Debug)]
pub struct Consumer {
    log: ManagedLog,
    config: LogConfig,
    subscriptions: Subscriptions,
}

impl Consumer {
    pub fn new(log: ManagedLog, config: LogConfig) -> Self {
        Self {
            log,
            config,
            subscriptions: Arc::default(),
        }
    }

    /// Registers `callback` on `topic`.
    ///
    /// Records with a sequence id at or below `start` are skipped; with no
    /// `start`, delivery begins at the next append; `min_seqid()` replays the
    /// whole topic. Once the record at `end`
    /// has been delivered the subscription is released.
    pub async fn subscribe(
        &self,
        topic: &str,
        callback: ConsumerCallback,
        start: Option<SeqId>,
        end: Option<SeqId>,
        subscription_id: Option<SubscriptionId>,
    ) -> Result<SubscriptionId, LogError> {
        let name: TopicName = topic.parse()?;
        let topic = self.log.topic(&name)?;
        let id = subscription_id.unwrap_or_else(Uuid::new_v4);
        let cursor = start.or_else(|| topic.last_seq_id());

        let mut subscriptions = self.subscriptions.lock();
        if subscriptions.contains_key(&id) {
            return Err(LogError::SubscriptionAlreadyExists(id));
        }
        let cancel = CancellationToken::new();
        let delivery_guard = Arc::new(tokio::sync::Mutex::new(()));
        let task = DeliveryTask {
            id,
            topic,
            callback,
            cursor,
            end,
            max_batch_size: self.config.max_batch_size.max(1),
            max_redeliveries: self.config.max_redeliveries,
            redelivery_backoff: Duration::from_millis(self.config.redelivery_backoff_ms),
            cancel: cancel.clone(),
            delivery_guard: delivery_guard.clone(),
            subscriptions: self.subscriptions.clone(),
        };
        let handle = tokio::spawn(task.run());
        tracing::info!(subscription_id = %id, topic = %name, "Subscribed");
        subscriptions.insert(
            id,
            Subscription {
                topic: name,
                cancel,
                delivery_guard,
                handle,
            },
        );
        Ok(id)
    }

    /// Removes the subscription. When this returns, no callback for it is
    /// running and none will run again. Unknown ids are ignored.
    pub async fn unsubscribe(&self, subscription_id: SubscriptionId) {
        let Some(subscription) = self.subscriptions.lock().remove(&subscription_id) else {
            return;
        };
        subscription.cancel.cancel();
        // Waits out an in-flight callback; the task re-checks the token under
        // this guard before every invocation.
        drop(subscription.delivery_guard.lock().await);
        if let Err(err) = subscription.handle.await {
            tracing::warn!(%subscription_id, "Delivery task ended abnormally: {}", err);
        }
        tracing::info!(%subscription_id, topic = %subscription.topic, "Unsubscribed");
    }

    pub fn subscription_ids(&self) -> Vec<SubscriptionId> {
        self.subscriptions.lock().keys().copied().collect()
    }
}

enum Finished {
    Cancelled,
    ReachedEnd,
}

struct DeliveryTask {
    id: SubscriptionId,
    topic: TopicLog,
    callback: ConsumerCallback,
    cursor: Option<SeqId>,
    end: Option<SeqId>,
    max_batch_size: usize,
    max_redeliveries: u32,
    redelivery_backoff: Duration,
    cancel: CancellationToken,
    delivery_guard: Arc<tokio::sync::Mutex<()>>,
    subscriptions: Subscriptions,
}

impl DeliveryTask {
    async fn run(mut self) {
        match self.deliver_until_done().await {
            Ok(Finished::Cancelled) => {}
            Ok(Finished::ReachedEnd) => {
                tracing::info!(subscription_id = %self.id, "Delivered end of range");
            }
            Err(err) => {
                tracing::error!(subscription_id = %self.id, "Subscription stopped: {}", err);
            }
        }
        // Self-terminated subscriptions release themselves. Cancelled ones
        // were already removed by `unsubscribe`.
        if !self.cancel.is_cancelled() {
            self.subscriptions.lock().remove(&self.id);
        }
    }

    async fn deliver_until_done(&mut self) -> Result<Finished, LogError> {
        let topic = self.topic.clone();
        loop {
            // Registered before reading so an append in between is not missed.
            let appended = topic.appended().notified();
            tokio::pin!(appended);
            appended.as_mut().enable();

            if self.cancel.is_cancelled() {
                return Ok(Finished::Cancelled);
            }
            let messages = topic.read_after(self.cursor, self.max_batch_size)?;
            if messages.is_empty() {
                tokio::select! {
                    _ = self.cancel.cancelled() => return Ok(Finished::Cancelled),
                    _ = &mut appended => continue,
                }
            }

            let mut batch = Vec::with_capacity(messages.len());
            let mut reached_end = false;
            for message in messages {
                if self.end.is_some_and(|end| message.seq_id > end) {
                    reached_end = true;
                    break;
                }
                let proto =
                    chroma_proto::SubmitEmbeddingRecord::decode(message.payload.as_slice())?;
                batch.push(EmbeddingRecord {
                    seq_id: message.seq_id,
                    record: proto.try_into()?,
                });
                if Some(message.seq_id) == self.end {
                    reached_end = true;
                    break;
                }
            }

            if let Some(last) = batch.last().map(|record| record.seq_id) {
                if !self.deliver(batch).await? {
                    return Ok(Finished::Cancelled);
                }
                self.cursor = Some(last);
            }
            if reached_end {
                return Ok(Finished::ReachedEnd);
            }
        }
    }

    /// Returns `Ok(false)` when cancelled before the batch was accepted.
    async fn deliver(&self, batch: Vec<EmbeddingRecord>) -> Result<bool, LogError> {
        let mut failures = 0u32;
        loop {
            {
                let _guard = self.delivery_guard.lock().await;
                if self.cancel.is_cancelled() {
                    return Ok(false);
                }
                match (self.callback)(batch.clone()).await {
                    Ok(()) => return Ok(true),
                    Err(err) => {
                        failures += 1;
                        if failures > self.max_redeliveries {
                            return Err(LogError::DeliveryFailed {
                                subscription_id: self.id,
                                attempts: failures,
                                source: err,
                            });
                        }
                        tracing::warn!(
                            subscription_id = %self.id,
                            failures,
                            "Callback failed, redelivering batch: {}",
                            err
                        );
                    }
                }
            }
            tokio::select! {
                _ = self.cancel.cancelled() => return Ok(false),
                _ = tokio::time::sleep(self.redelivery_backoff) => {}
            }
        }
    }
}
