//! Replication consumer for the product mutation queues.

use std::sync::Arc;
use std::time::{Duration, Instant};

use broker::topology::{self, kind_for_queue};
use broker::{AckMode, Delivery, MessageBroker, MessageBrokerExt};
use common::{DeadLetterRecord, ItemCode, LogRecord, MutationKind, Product, ProductPatch};
use futures_util::StreamExt;
use tokio::task::JoinSet;

use crate::store::ReplicaStore;
use crate::{ReplicationError, Result};

/// Name this component uses in log records and consumer tags.
pub const SOURCE: &str = "replicator";

/// Default bound on a single store operation.
pub const DEFAULT_STORE_TIMEOUT: Duration = Duration::from_secs(10);

/// A decoded mutation event.
#[derive(Debug, Clone, PartialEq)]
pub enum Mutation {
    /// Write every column of the product.
    Insert(Product),
    /// Write only the fields present in the patch.
    Update(ItemCode, ProductPatch),
}

impl Mutation {
    /// Decodes an event body for the given mutation kind.
    ///
    /// Fails on invalid JSON, a missing or blank `itemcode`, or a field of the
    /// wrong type.
    pub fn decode(kind: MutationKind, body: &[u8]) -> serde_json::Result<Self> {
        match kind {
            MutationKind::Insert => Product::from_slice(body).map(Mutation::Insert),
            MutationKind::Update => {
                ProductPatch::from_slice(body).map(|(code, patch)| Mutation::Update(code, patch))
            }
        }
    }

    pub fn kind(&self) -> MutationKind {
        match self {
            Mutation::Insert(_) => MutationKind::Insert,
            Mutation::Update(..) => MutationKind::Update,
        }
    }

    pub fn item_code(&self) -> &ItemCode {
        match self {
            Mutation::Insert(product) => &product.item_code,
            Mutation::Update(code, _) => code,
        }
    }
}

/// What happened to one consumed event.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum ReplicationOutcome {
    /// The replica now reflects the event.
    Applied {
        kind: MutationKind,
        item_code: ItemCode,
    },
    /// The event was not written and a log record was emitted.
    ///
    /// `kind` is `None` when the delivery came from a queue that carries no
    /// mutation kind.
    Dropped {
        kind: Option<MutationKind>,
        reason: String,
    },
    /// The store write failed. A dead-letter record and a log record were
    /// emitted.
    DeadLettered { kind: MutationKind, error: String },
}

impl ReplicationOutcome {
    pub fn label(&self) -> &'static str {
        match self {
            ReplicationOutcome::Applied { .. } => "applied",
            ReplicationOutcome::Dropped { .. } => "dropped",
            ReplicationOutcome::DeadLettered { .. } => "dead_lettered",
        }
    }
}

/// Consumes the insert and update queues and applies each event to the
/// replica store.
///
/// Each queue is handled by its own task, one message at a time in delivery
/// order. A failed write is never retried: the original body is published to
/// the dead-letter queue for compensation.
pub struct ReplicationConsumer<S, B> {
    store: Arc<S>,
    broker: Arc<B>,
    ack_mode: AckMode,
    store_timeout: Duration,
}

impl<S, B> Clone for ReplicationConsumer<S, B> {
    fn clone(&self) -> Self {
        Self {
            store: Arc::clone(&self.store),
            broker: Arc::clone(&self.broker),
            ack_mode: self.ack_mode,
            store_timeout: self.store_timeout,
        }
    }
}

impl<S, B> ReplicationConsumer<S, B>
where
    S: ReplicaStore + 'static,
    B: MessageBroker + 'static,
{
    /// Creates a consumer with auto acknowledgement and the default timeout.
    pub fn new(store: S, broker: B) -> Self {
        Self {
            store: Arc::new(store),
            broker: Arc::new(broker),
            ack_mode: AckMode::default(),
            store_timeout: DEFAULT_STORE_TIMEOUT,
        }
    }

    pub fn with_ack_mode(mut self, ack_mode: AckMode) -> Self {
        self.ack_mode = ack_mode;
        self
    }

    pub fn with_store_timeout(mut self, store_timeout: Duration) -> Self {
        self.store_timeout = store_timeout;
        self
    }

    pub fn store(&self) -> &S {
        &self.store
    }

    /// Consumes both mutation queues until their delivery streams end.
    ///
    /// Returns the first error raised by either queue task.
    pub async fn run(&self) -> Result<()> {
        let mut tasks = JoinSet::new();
        for kind in [MutationKind::Insert, MutationKind::Update] {
            let consumer = self.clone();
            tasks.spawn(async move { consumer.consume(kind).await });
        }

        while let Some(joined) = tasks.join_next().await {
            joined??;
        }
        Ok(())
    }

    /// Consumes the queue for `kind` until its delivery stream ends.
    #[tracing::instrument(skip(self), fields(queue = topology::queue_for(kind)))]
    pub async fn consume(&self, kind: MutationKind) -> Result<()> {
        let queue = topology::queue_for(kind);
        let mut deliveries = self.broker.consume(queue, self.ack_mode).await?;
        tracing::info!(ack_mode = %self.ack_mode, "replication consumer started");

        while let Some(delivery) = deliveries.next().await {
            let delivery = delivery?;
            self.handle_delivery(&delivery).await;
        }

        tracing::info!("delivery stream ended");
        Ok(())
    }

    /// Handles one delivery and acknowledges it if the subscription requires it.
    pub async fn handle_delivery(&self, delivery: &Delivery) -> ReplicationOutcome {
        let kind = match kind_for_queue(&delivery.queue) {
            Some(kind) => kind,
            None => {
                let reason = format!("no mutation kind for queue {}", delivery.queue);
                tracing::warn!(queue = %delivery.queue, "{reason}");
                self.report(&reason).await;
                self.ack(delivery).await;
                return ReplicationOutcome::Dropped { kind: None, reason };
            }
        };

        let outcome = self.handle(kind, &delivery.body, &delivery.queue).await;
        self.ack(delivery).await;
        outcome
    }

    /// Decodes and applies one event body.
    #[tracing::instrument(skip(self, body), fields(bytes = body.len()))]
    pub async fn handle(&self, kind: MutationKind, body: &[u8], queue: &str) -> ReplicationOutcome {
        let outcome = match Mutation::decode(kind, body) {
            Ok(mutation) => match self.apply(&mutation).await {
                Ok(()) => {
                    tracing::info!(item_code = %mutation.item_code(), "mutation replicated");
                    ReplicationOutcome::Applied {
                        kind,
                        item_code: mutation.item_code().clone(),
                    }
                }
                Err(e) => self.dead_letter(kind, body, queue, &e).await,
            },
            Err(e) => {
                let reason = format!("undecodable {kind} event from {queue}: {e}");
                tracing::warn!(error = %e, "dropping undecodable event");
                self.report(&reason).await;
                ReplicationOutcome::Dropped {
                    kind: Some(kind),
                    reason,
                }
            }
        };

        metrics::counter!(
            "replication_messages_total",
            "kind" => kind.as_str(),
            "outcome" => outcome.label()
        )
        .increment(1);
        outcome
    }

    /// Writes a decoded mutation to the store under the configured timeout.
    pub async fn apply(&self, mutation: &Mutation) -> Result<()> {
        let started = Instant::now();
        let result = tokio::time::timeout(self.store_timeout, self.write(mutation)).await;
        metrics::histogram!(
            "replication_store_duration_seconds",
            "kind" => mutation.kind().as_str()
        )
        .record(started.elapsed().as_secs_f64());

        match result {
            Ok(written) => written,
            Err(_) => Err(ReplicationError::Timeout(self.store_timeout)),
        }
    }

    async fn write(&self, mutation: &Mutation) -> Result<()> {
        match mutation {
            Mutation::Insert(product) => self.store.upsert(product).await,
            Mutation::Update(item_code, patch) => {
                let rows = self.store.update(item_code, patch).await?;
                if rows == 0 {
                    return Err(ReplicationError::MissingRow(item_code.clone()));
                }
                Ok(())
            }
        }
    }

    async fn dead_letter(
        &self,
        kind: MutationKind,
        body: &[u8],
        queue: &str,
        error: &ReplicationError,
    ) -> ReplicationOutcome {
        metrics::counter!("replication_failures_total", "kind" => kind.as_str()).increment(1);
        tracing::error!(error = %error, "replication failed, dead-lettering event");

        let record = DeadLetterRecord::new(body.to_vec(), error.to_string(), kind, queue);
        if let Err(e) = self.broker.publish_dead_letter(&record).await {
            tracing::error!(error = %e, "failed to publish dead-letter record");
        }
        self.report(&format!("replication of {kind} event failed: {error}"))
            .await;

        ReplicationOutcome::DeadLettered {
            kind,
            error: error.to_string(),
        }
    }

    async fn report(&self, message: &str) {
        if let Err(e) = self.broker.publish_log(&LogRecord::new(SOURCE, message)).await {
            tracing::error!(error = %e, "failed to publish log record");
        }
    }

    async fn ack(&self, delivery: &Delivery) {
        if let Err(e) = delivery.ack().await {
            tracing::error!(error = %e, queue = %delivery.queue, "failed to acknowledge delivery");
        }
    }
}
