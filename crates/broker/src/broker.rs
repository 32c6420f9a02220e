use std::collections::BTreeMap;
use std::pin::Pin;

use async_trait::async_trait;
use common::{DeadLetterRecord, LogRecord, MutationKind, Product};
use futures_core::Stream;

use crate::topology::{self, ERROR_EXCHANGE, PRODUCT_EXCHANGE, Topology};
use crate::Result;

pub const CONTENT_TYPE_JSON: &str = "application/json";
pub const CONTENT_TYPE_BINARY: &str = "application/octet-stream";

/// When a consumed message is acknowledged.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum AckMode {
    /// The broker considers a message acknowledged as soon as it is delivered.
    ///
    /// At-most-once: a crash while handling a delivery loses it.
    #[default]
    Auto,

    /// The consumer acknowledges after its handler has finished.
    ///
    /// At-least-once: a crash while handling a delivery makes the broker
    /// redeliver it, so handlers must be idempotent.
    AfterProcessing,
}

impl AckMode {
    pub fn as_str(&self) -> &'static str {
        match self {
            AckMode::Auto => "auto",
            AckMode::AfterProcessing => "after-processing",
        }
    }
}

impl std::fmt::Display for AckMode {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}", self.as_str())
    }
}

impl std::str::FromStr for AckMode {
    type Err = String;

    fn from_str(s: &str) -> std::result::Result<Self, Self::Err> {
        match s.to_ascii_lowercase().as_str() {
            "auto" => Ok(AckMode::Auto),
            "after-processing" | "manual" => Ok(AckMode::AfterProcessing),
            other => Err(format!(
                "unknown ack mode {other:?}, expected \"auto\" or \"after-processing\""
            )),
        }
    }
}

/// A message to publish.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Publication {
    pub exchange: String,
    pub routing_key: String,
    pub body: Vec<u8>,
    pub content_type: String,
    pub headers: BTreeMap<String, String>,
}

impl Publication {
    pub fn new(
        exchange: impl Into<String>,
        routing_key: impl Into<String>,
        body: Vec<u8>,
        content_type: impl Into<String>,
    ) -> Self {
        Self {
            exchange: exchange.into(),
            routing_key: routing_key.into(),
            body,
            content_type: content_type.into(),
            headers: BTreeMap::new(),
        }
    }

    pub fn with_headers(mut self, headers: BTreeMap<String, String>) -> Self {
        self.headers = headers;
        self
    }

    /// A mutation event for `product`.
    pub fn mutation(kind: MutationKind, product: &Product) -> Result<Self> {
        Ok(Self::new(
            PRODUCT_EXCHANGE,
            topology::routing_key_for(kind),
            product.to_vec()?,
            CONTENT_TYPE_JSON,
        ))
    }

    /// A log record for the log aggregator.
    pub fn log(record: &LogRecord) -> Result<Self> {
        Ok(Self::new(
            ERROR_EXCHANGE,
            topology::LOGGING_ROUTING_KEY,
            record.to_vec()?,
            CONTENT_TYPE_JSON,
        ))
    }

    /// A dead-letter record. The body is published unchanged.
    pub fn dead_letter(record: &DeadLetterRecord) -> Self {
        Self::new(
            ERROR_EXCHANGE,
            topology::DLQ_ROUTING_KEY,
            record.body.clone(),
            CONTENT_TYPE_BINARY,
        )
        .with_headers(record.headers())
    }
}

/// Acknowledges one delivery.
#[async_trait]
pub trait Acknowledger: Send + Sync {
    async fn ack(&self) -> Result<()>;
}

/// A message consumed from a queue.
pub struct Delivery {
    pub queue: String,
    pub routing_key: String,
    pub body: Vec<u8>,
    pub content_type: Option<String>,
    pub headers: BTreeMap<String, String>,
    acker: Option<Box<dyn Acknowledger>>,
}

impl Delivery {
    pub fn new(queue: impl Into<String>, routing_key: impl Into<String>, body: Vec<u8>) -> Self {
        Self {
            queue: queue.into(),
            routing_key: routing_key.into(),
            body,
            content_type: None,
            headers: BTreeMap::new(),
            acker: None,
        }
    }

    pub fn with_content_type(mut self, content_type: Option<String>) -> Self {
        self.content_type = content_type;
        self
    }

    pub fn with_headers(mut self, headers: BTreeMap<String, String>) -> Self {
        self.headers = headers;
        self
    }

    /// Attaches the handle used to acknowledge this delivery.
    ///
    /// Deliveries from an [`AckMode::Auto`] subscription carry none.
    pub fn with_acker(mut self, acker: Box<dyn Acknowledger>) -> Self {
        self.acker = Some(acker);
        self
    }

    /// Returns true if the consumer still has to acknowledge this delivery.
    pub fn needs_ack(&self) -> bool {
        self.acker.is_some()
    }

    /// Acknowledges the delivery. A no-op for auto-acknowledged deliveries.
    pub async fn ack(&self) -> Result<()> {
        match &self.acker {
            Some(acker) => acker.ack().await,
            None => Ok(()),
        }
    }
}

impl std::fmt::Debug for Delivery {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Delivery")
            .field("queue", &self.queue)
            .field("routing_key", &self.routing_key)
            .field("body_len", &self.body.len())
            .field("headers", &self.headers)
            .field("needs_ack", &self.needs_ack())
            .finish()
    }
}

/// A stream of deliveries from one queue.
///
/// Items arrive in the order the broker delivered them. The stream ends when
/// the connection closes.
pub type DeliveryStream = Pin<Box<dyn Stream<Item = Result<Delivery>> + Send>>;

/// Core trait for broker implementations.
///
/// Implementations are cheap to clone and safe to share between the tasks of
/// one process.
#[async_trait]
pub trait MessageBroker: Send + Sync {
    /// Declares exchanges, queues and bindings.
    ///
    /// Declaring the same topology again is a no-op.
    async fn declare(&self, topology: &Topology) -> Result<()>;

    /// Publishes a message without waiting for a broker confirmation.
    async fn publish(&self, publication: Publication) -> Result<()>;

    /// Starts consuming `queue`.
    async fn consume(&self, queue: &str, ack_mode: AckMode) -> Result<DeliveryStream>;
}

/// Convenience methods for publishing the pipeline's message types.
#[async_trait]
pub trait MessageBrokerExt: MessageBroker {
    /// Validates and declares a topology, logging the outcome.
    async fn declare_topology(&self, topology: &Topology) -> Result<()> {
        topology.validate()?;
        self.declare(topology).await?;
        tracing::info!(
            exchanges = topology.exchanges.len(),
            queues = topology.queues.len(),
            bindings = topology.bindings.len(),
            "broker topology declared"
        );
        Ok(())
    }

    /// Publishes a mutation event.
    async fn publish_mutation(&self, kind: MutationKind, product: &Product) -> Result<()> {
        self.publish(Publication::mutation(kind, product)?).await
    }

    /// Publishes a log record to the logging queue.
    async fn publish_log(&self, record: &LogRecord) -> Result<()> {
        self.publish(Publication::log(record)?).await
    }

    /// Publishes a dead-letter record to the dead-letter queue.
    async fn publish_dead_letter(&self, record: &DeadLetterRecord) -> Result<()> {
        self.publish(Publication::dead_letter(record)).await
    }
}

impl<T: MessageBroker + ?Sized> MessageBrokerExt for T {}

#[cfg(test)]
mod tests {
    use super::*;
    use common::ItemCode;

    #[test]
    fn ack_mode_parses_config_values() {
        assert_eq!("auto".parse::<AckMode>().unwrap(), AckMode::Auto);
        assert_eq!(
            "after-processing".parse::<AckMode>().unwrap(),
            AckMode::AfterProcessing
        );
        assert_eq!("MANUAL".parse::<AckMode>().unwrap(), AckMode::AfterProcessing);
        assert!("sometimes".parse::<AckMode>().is_err());
        assert_eq!(AckMode::default(), AckMode::Auto);
    }

    #[test]
    fn mutation_publication_targets_product_exchange() {
        let product = Product::new(ItemCode::new("SKU1").unwrap(), "Widget", 9.99, "tools", "hardware");
        let publication = Publication::mutation(MutationKind::Update, &product).unwrap();
        assert_eq!(publication.exchange, "product_exchange");
        assert_eq!(publication.routing_key, "product.update");
        assert_eq!(publication.content_type, "application/json");
        assert_eq!(Product::from_slice(&publication.body).unwrap(), product);
    }

    #[test]
    fn dead_letter_publication_keeps_body_verbatim() {
        let record = DeadLetterRecord::new(
            b"\xff not json".to_vec(),
            "timeout",
            MutationKind::Insert,
            "product_insert_queue",
        );
        let publication = Publication::dead_letter(&record);
        assert_eq!(publication.exchange, "error_exchange");
        assert_eq!(publication.routing_key, "product.dlq");
        assert_eq!(publication.body, record.body);
        assert_eq!(publication.headers["x-error"], "timeout");
        assert_eq!(publication.headers["x-mutation-kind"], "insert");
    }

    #[test]
    fn log_publication_targets_logging_key() {
        let publication = Publication::log(&LogRecord::new("test", "hello")).unwrap();
        assert_eq!(publication.exchange, "error_exchange");
        assert_eq!(publication.routing_key, "logging.error");
    }

    #[tokio::test]
    async fn auto_delivery_ack_is_noop() {
        let delivery = Delivery::new("q", "k", vec![1, 2, 3]);
        assert!(!delivery.needs_ack());
        assert!(delivery.ack().await.is_ok());
    }
}
