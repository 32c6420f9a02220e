use broker::topology::LOGGING_QUEUE;
use broker::{AckMode, Delivery, MessageBroker};
use futures_util::StreamExt;

use crate::Result;
use crate::archive::LogArchive;
use crate::entry::LogEntry;

/// Name this component uses in consumer tags.
pub const SOURCE: &str = "log-aggregator";

/// Drains the logging queue into a [`LogArchive`].
///
/// Inserts are never retried: an entry the archive rejects is reported
/// through tracing and dropped.
pub struct LogAggregator<A, B> {
    archive: A,
    broker: B,
    ack_mode: AckMode,
}

impl<A, B> LogAggregator<A, B>
where
    A: LogArchive,
    B: MessageBroker,
{
    pub fn new(archive: A, broker: B) -> Self {
        Self {
            archive,
            broker,
            ack_mode: AckMode::default(),
        }
    }

    pub fn with_ack_mode(mut self, ack_mode: AckMode) -> Self {
        self.ack_mode = ack_mode;
        self
    }

    /// Consumes the logging queue until its delivery stream ends.
    #[tracing::instrument(skip(self), fields(queue = LOGGING_QUEUE))]
    pub async fn run(&self) -> Result<()> {
        let mut deliveries = self.broker.consume(LOGGING_QUEUE, self.ack_mode).await?;
        tracing::info!(ack_mode = %self.ack_mode, "log aggregator started");

        while let Some(delivery) = deliveries.next().await {
            let delivery = delivery?;
            self.handle_delivery(&delivery).await;
        }

        tracing::info!("delivery stream ended");
        Ok(())
    }

    /// Archives one delivery. Returns whether the entry was stored.
    pub async fn handle_delivery(&self, delivery: &Delivery) -> bool {
        let entry = LogEntry::ingest(&delivery.body);
        let stored = match self.archive.append(&entry).await {
            Ok(()) => {
                metrics::counter!("log_records_ingested_total").increment(1);
                tracing::debug!(source = ?entry.source, "log record archived");
                true
            }
            Err(e) => {
                metrics::counter!("log_records_dropped_total").increment(1);
                tracing::error!(error = %e, message = %entry.message, "failed to archive log record");
                false
            }
        };

        if let Err(e) = delivery.ack().await {
            tracing::error!(error = %e, "failed to acknowledge log delivery");
        }
        stored
    }
}
