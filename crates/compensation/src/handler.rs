use std::sync::Arc;
use std::time::Duration;

use broker::topology::PRODUCT_DLQ;
use broker::{AckMode, Delivery, MessageBroker, MessageBrokerExt};
use catalog::ProductCatalog;
use common::{DeadLetterRecord, ItemCode, LogRecord, MutationKind};
use futures_util::StreamExt;

use crate::extract::extract_item_code;
use crate::{CompensationError, Result};

/// Name this component uses in log records and consumer tags.
pub const SOURCE: &str = "compensator";

/// Default bound on a single delete.
pub const DEFAULT_DELETE_TIMEOUT: Duration = Duration::from_secs(10);

/// What happened to one dead-letter record.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum CompensationOutcome {
    /// The product is absent from the authoritative store.
    ///
    /// `deleted` is false when it was already gone.
    Compensated {
        item_code: ItemCode,
        kind: Option<MutationKind>,
        deleted: bool,
    },
    /// No item code could be read; nothing was deleted.
    Skipped { reason: String },
    /// The delete failed. It is not retried.
    Failed { item_code: ItemCode, error: String },
}

/// Rolls back the authoritative store for every dead-lettered mutation.
///
/// Any failed mutation deletes the product, whatever its kind. The kind read
/// from the record is carried on the outcome and in logs.
pub struct CompensationHandler<C, B> {
    catalog: Arc<C>,
    broker: Arc<B>,
    ack_mode: AckMode,
    delete_timeout: Duration,
}

impl<C, B> CompensationHandler<C, B>
where
    C: ProductCatalog,
    B: MessageBroker,
{
    /// Creates a handler with auto acknowledgement and the default timeout.
    pub fn new(catalog: C, broker: B) -> Self {
        Self {
            catalog: Arc::new(catalog),
            broker: Arc::new(broker),
            ack_mode: AckMode::default(),
            delete_timeout: DEFAULT_DELETE_TIMEOUT,
        }
    }

    pub fn with_ack_mode(mut self, ack_mode: AckMode) -> Self {
        self.ack_mode = ack_mode;
        self
    }

    pub fn with_delete_timeout(mut self, delete_timeout: Duration) -> Self {
        self.delete_timeout = delete_timeout;
        self
    }

    /// Consumes the dead-letter queue until its delivery stream ends.
    #[tracing::instrument(skip(self), fields(queue = PRODUCT_DLQ))]
    pub async fn run(&self) -> Result<()> {
        let mut deliveries = self.broker.consume(PRODUCT_DLQ, self.ack_mode).await?;
        tracing::info!(ack_mode = %self.ack_mode, "compensation handler started");

        while let Some(delivery) = deliveries.next().await {
            let delivery = delivery?;
            self.handle_delivery(&delivery).await;
        }

        tracing::info!("delivery stream ended");
        Ok(())
    }

    /// Handles one delivery and acknowledges it if the subscription requires it.
    pub async fn handle_delivery(&self, delivery: &Delivery) -> CompensationOutcome {
        let record = DeadLetterRecord::from_parts(delivery.body.clone(), &delivery.headers);
        let outcome = self.handle(&record).await;

        if let Err(e) = delivery.ack().await {
            tracing::error!(error = %e, "failed to acknowledge dead-letter delivery");
        }
        outcome
    }

    /// Deletes the product named by a dead-letter record.
    #[tracing::instrument(skip(self, record), fields(kind = ?record.kind, bytes = record.body.len()))]
    pub async fn handle(&self, record: &DeadLetterRecord) -> CompensationOutcome {
        let item_code = match extract_item_code(&record.body) {
            Ok(item_code) => item_code,
            Err(e) => {
                metrics::counter!("compensation_skipped_total").increment(1);
                let reason = format!("cannot compensate dead-letter record: {e}");
                tracing::warn!(error = %e, "skipping dead-letter record");
                self.report(&reason).await;
                return CompensationOutcome::Skipped { reason };
            }
        };

        match self.delete(&item_code).await {
            Ok(deleted) => {
                let result = if deleted { "deleted" } else { "absent" };
                metrics::counter!("compensation_deletes_total", "result" => result).increment(1);
                tracing::info!(
                    %item_code,
                    deleted,
                    replication_error = %record.error,
                    "authoritative product rolled back"
                );
                CompensationOutcome::Compensated {
                    item_code,
                    kind: record.kind,
                    deleted,
                }
            }
            Err(e) => {
                metrics::counter!("compensation_failures_total").increment(1);
                tracing::error!(%item_code, error = %e, "compensating delete failed");
                self.report(&format!("compensating delete of {item_code} failed: {e}"))
                    .await;
                CompensationOutcome::Failed {
                    item_code,
                    error: e.to_string(),
                }
            }
        }
    }

    async fn delete(&self, item_code: &ItemCode) -> Result<bool> {
        match tokio::time::timeout(self.delete_timeout, self.catalog.delete(item_code)).await {
            Ok(deleted) => Ok(deleted?),
            Err(_) => Err(CompensationError::Timeout(self.delete_timeout)),
        }
    }

    async fn report(&self, message: &str) {
        if let Err(e) = self.broker.publish_log(&LogRecord::new(SOURCE, message)).await {
            tracing::error!(error = %e, "failed to publish log record");
        }
    }
}
