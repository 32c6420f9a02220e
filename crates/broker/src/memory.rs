use std::collections::{BTreeMap, HashMap, HashSet};
use std::sync::Arc;

use async_trait::async_trait;
use futures_util::stream;
use tokio::sync::{Mutex, mpsc};

use crate::broker::{AckMode, Acknowledger, Delivery, DeliveryStream, MessageBroker, Publication};
use crate::topology::{Binding, QueueSpec, Topology};
use crate::{BrokerError, Result};

/// A routed message waiting in a queue.
struct QueuedMessage {
    routing_key: String,
    body: Vec<u8>,
    content_type: String,
    headers: BTreeMap<String, String>,
}

struct QueueState {
    spec: QueueSpec,
    sender: Option<mpsc::UnboundedSender<QueuedMessage>>,
    receiver: Option<mpsc::UnboundedReceiver<QueuedMessage>>,
    enqueued: usize,
}

#[derive(Default)]
struct BrokerState {
    exchanges: HashSet<String>,
    queues: HashMap<String, QueueState>,
    bindings: Vec<Binding>,
    published: Vec<Publication>,
    acks: usize,
    declarations: usize,
    fail_on_publish: bool,
    fail_on_declare: bool,
    closed: bool,
}

/// In-memory broker implementation for testing.
///
/// Routes publications through direct-exchange bindings into unbounded
/// per-queue channels, with the same interface as [`crate::AmqpBroker`].
/// Each queue supports a single consumer. Every publication is also kept in
/// a log so tests can assert on what was sent.
#[derive(Clone, Default)]
pub struct InMemoryBroker {
    state: Arc<Mutex<BrokerState>>,
}

impl InMemoryBroker {
    /// Creates a new broker with nothing declared.
    pub fn new() -> Self {
        Self::default()
    }

    /// Creates a broker with the standard topology already declared.
    pub async fn with_standard_topology() -> Result<Self> {
        let broker = Self::new();
        broker.declare(&Topology::standard()).await?;
        Ok(broker)
    }

    /// Makes every subsequent publish fail.
    pub async fn set_fail_on_publish(&self, fail: bool) {
        self.state.lock().await.fail_on_publish = fail;
    }

    /// Makes every subsequent declaration fail.
    pub async fn set_fail_on_declare(&self, fail: bool) {
        self.state.lock().await.fail_on_declare = fail;
    }

    /// Returns every publication accepted so far, in publish order.
    pub async fn published(&self) -> Vec<Publication> {
        self.state.lock().await.published.clone()
    }

    /// Returns the publications sent under `routing_key`.
    pub async fn published_with_key(&self, routing_key: &str) -> Vec<Publication> {
        self.state
            .lock()
            .await
            .published
            .iter()
            .filter(|p| p.routing_key == routing_key)
            .cloned()
            .collect()
    }

    /// Returns how many messages have been routed into `queue`.
    pub async fn enqueued_count(&self, queue: &str) -> usize {
        self.state
            .lock()
            .await
            .queues
            .get(queue)
            .map(|q| q.enqueued)
            .unwrap_or(0)
    }

    /// Returns the declared properties of `queue`.
    pub async fn queue_spec(&self, queue: &str) -> Option<QueueSpec> {
        self.state
            .lock()
            .await
            .queues
            .get(queue)
            .map(|q| q.spec.clone())
    }

    /// Returns the number of explicit acknowledgements received.
    pub async fn ack_count(&self) -> usize {
        self.state.lock().await.acks
    }

    /// Returns how many times a topology has been declared.
    pub async fn declaration_count(&self) -> usize {
        self.state.lock().await.declarations
    }

    /// Closes the broker: every delivery stream ends once drained and
    /// further publishes fail.
    pub async fn close(&self) {
        let mut state = self.state.lock().await;
        state.closed = true;
        for queue in state.queues.values_mut() {
            queue.sender = None;
        }
    }
}

struct InMemoryAcker {
    state: Arc<Mutex<BrokerState>>,
}

#[async_trait]
impl Acknowledger for InMemoryAcker {
    async fn ack(&self) -> Result<()> {
        self.state.lock().await.acks += 1;
        Ok(())
    }
}

#[async_trait]
impl MessageBroker for InMemoryBroker {
    async fn declare(&self, topology: &Topology) -> Result<()> {
        let mut state = self.state.lock().await;

        if state.closed {
            return Err(BrokerError::Closed);
        }
        if state.fail_on_declare {
            return Err(BrokerError::InvalidTopology(
                "declaration rejected by broker".to_string(),
            ));
        }

        for exchange in &topology.exchanges {
            state.exchanges.insert(exchange.name.clone());
        }

        for spec in &topology.queues {
            if let Some(existing) = state.queues.get(&spec.name) {
                if existing.spec != *spec {
                    return Err(BrokerError::PreconditionFailed {
                        queue: spec.name.clone(),
                    });
                }
                continue;
            }
            let (sender, receiver) = mpsc::unbounded_channel();
            state.queues.insert(
                spec.name.clone(),
                QueueState {
                    spec: spec.clone(),
                    sender: Some(sender),
                    receiver: Some(receiver),
                    enqueued: 0,
                },
            );
        }

        for binding in &topology.bindings {
            if !state.bindings.contains(binding) {
                state.bindings.push(binding.clone());
            }
        }

        state.declarations += 1;
        Ok(())
    }

    async fn publish(&self, publication: Publication) -> Result<()> {
        let mut state = self.state.lock().await;

        if state.closed {
            return Err(BrokerError::Closed);
        }
        if state.fail_on_publish {
            return Err(BrokerError::PublishFailed(
                "publish rejected by broker".to_string(),
            ));
        }
        if !state.exchanges.contains(&publication.exchange) {
            return Err(BrokerError::UnknownExchange(publication.exchange.clone()));
        }

        // Unroutable messages are dropped, as with a non-mandatory publish.
        let targets: Vec<String> = state
            .bindings
            .iter()
            .filter(|b| b.exchange == publication.exchange && b.routing_key == publication.routing_key)
            .map(|b| b.queue.clone())
            .collect();

        for target in targets {
            if let Some(queue) = state.queues.get_mut(&target)
                && let Some(sender) = &queue.sender
            {
                let message = QueuedMessage {
                    routing_key: publication.routing_key.clone(),
                    body: publication.body.clone(),
                    content_type: publication.content_type.clone(),
                    headers: publication.headers.clone(),
                };
                if sender.send(message).is_ok() {
                    queue.enqueued += 1;
                }
            }
        }

        metrics::counter!("broker_messages_published_total", "routing_key" => publication.routing_key.clone())
            .increment(1);
        state.published.push(publication);
        Ok(())
    }

    async fn consume(&self, queue: &str, ack_mode: AckMode) -> Result<DeliveryStream> {
        let mut state = self.state.lock().await;
        let queue_state = state
            .queues
            .get_mut(queue)
            .ok_or_else(|| BrokerError::UnknownQueue(queue.to_string()))?;
        let receiver = queue_state
            .receiver
            .take()
            .ok_or_else(|| BrokerError::AlreadyConsumed(queue.to_string()))?;

        let queue_name = queue.to_string();
        let shared = Arc::clone(&self.state);

        let deliveries = stream::unfold(receiver, move |mut receiver| {
            let queue_name = queue_name.clone();
            let shared = Arc::clone(&shared);
            async move {
                let message = receiver.recv().await?;
                let mut delivery = Delivery::new(queue_name, message.routing_key, message.body)
                    .with_content_type(Some(message.content_type))
                    .with_headers(message.headers);
                if ack_mode == AckMode::AfterProcessing {
                    delivery = delivery.with_acker(Box::new(InMemoryAcker { state: shared }));
                }
                Some((Ok(delivery), receiver))
            }
        });

        Ok(Box::pin(deliveries))
    }
}

#[cfg(test)]
mod tests {
    use futures_util::StreamExt;

    use super::*;
    use crate::topology::{
        DLQ_ROUTING_KEY, ERROR_EXCHANGE, INSERT_ROUTING_KEY, PRODUCT_DLQ, PRODUCT_EXCHANGE,
        PRODUCT_INSERT_QUEUE, PRODUCT_UPDATE_QUEUE,
    };

    fn publication(exchange: &str, routing_key: &str, body: &[u8]) -> Publication {
        Publication::new(exchange, routing_key, body.to_vec(), "application/json")
    }

    #[tokio::test]
    async fn routes_by_binding_key() {
        let broker = InMemoryBroker::with_standard_topology().await.unwrap();

        broker
            .publish(publication(PRODUCT_EXCHANGE, INSERT_ROUTING_KEY, b"one"))
            .await
            .unwrap();

        assert_eq!(broker.enqueued_count(PRODUCT_INSERT_QUEUE).await, 1);
        assert_eq!(broker.enqueued_count(PRODUCT_UPDATE_QUEUE).await, 0);
        assert_eq!(broker.enqueued_count(PRODUCT_DLQ).await, 0);
    }

    #[tokio::test]
    async fn unroutable_publish_is_dropped() {
        let broker = InMemoryBroker::with_standard_topology().await.unwrap();

        // product.dlq is bound on the error exchange, not the product exchange
        broker
            .publish(publication(PRODUCT_EXCHANGE, DLQ_ROUTING_KEY, b"lost"))
            .await
            .unwrap();

        assert_eq!(broker.enqueued_count(PRODUCT_DLQ).await, 0);
        assert_eq!(broker.published().await.len(), 1);
    }

    #[tokio::test]
    async fn publish_to_unknown_exchange_fails() {
        let broker = InMemoryBroker::new();
        let result = broker
            .publish(publication("nowhere", INSERT_ROUTING_KEY, b"x"))
            .await;
        assert!(matches!(result, Err(BrokerError::UnknownExchange(_))));
    }

    #[tokio::test]
    async fn declare_is_idempotent() {
        let broker = InMemoryBroker::new();
        broker.declare(&Topology::standard()).await.unwrap();
        broker.declare(&Topology::standard()).await.unwrap();

        broker
            .publish(publication(ERROR_EXCHANGE, DLQ_ROUTING_KEY, b"x"))
            .await
            .unwrap();
        assert_eq!(broker.enqueued_count(PRODUCT_DLQ).await, 1);
        assert_eq!(broker.declaration_count().await, 2);
    }

    #[tokio::test]
    async fn redeclare_with_different_arguments_fails() {
        let broker = InMemoryBroker::with_standard_topology().await.unwrap();
        let conflicting = Topology::default().queue(PRODUCT_DLQ, None).queue(
            PRODUCT_INSERT_QUEUE,
            None,
        );
        let result = broker.declare(&conflicting).await;
        assert!(matches!(result, Err(BrokerError::PreconditionFailed { .. })));
    }

    #[tokio::test]
    async fn deliveries_preserve_order() {
        let broker = InMemoryBroker::with_standard_topology().await.unwrap();
        for body in [b"1", b"2", b"3"] {
            broker
                .publish(publication(PRODUCT_EXCHANGE, INSERT_ROUTING_KEY, body))
                .await
                .unwrap();
        }
        broker.close().await;

        let stream = broker
            .consume(PRODUCT_INSERT_QUEUE, AckMode::Auto)
            .await
            .unwrap();
        let bodies: Vec<Vec<u8>> = stream.map(|d| d.unwrap().body).collect().await;
        assert_eq!(bodies, vec![b"1".to_vec(), b"2".to_vec(), b"3".to_vec()]);
    }

    #[tokio::test]
    async fn manual_ack_is_counted() {
        let broker = InMemoryBroker::with_standard_topology().await.unwrap();
        broker
            .publish(publication(PRODUCT_EXCHANGE, INSERT_ROUTING_KEY, b"x"))
            .await
            .unwrap();

        let mut stream = broker
            .consume(PRODUCT_INSERT_QUEUE, AckMode::AfterProcessing)
            .await
            .unwrap();
        let delivery = stream.next().await.unwrap().unwrap();
        assert!(delivery.needs_ack());
        delivery.ack().await.unwrap();
        assert_eq!(broker.ack_count().await, 1);
    }

    #[tokio::test]
    async fn second_consumer_is_rejected() {
        let broker = InMemoryBroker::with_standard_topology().await.unwrap();
        let _first = broker.consume(PRODUCT_DLQ, AckMode::Auto).await.unwrap();
        let second = broker.consume(PRODUCT_DLQ, AckMode::Auto).await;
        assert!(matches!(second, Err(BrokerError::AlreadyConsumed(_))));
    }

    #[tokio::test]
    async fn publish_after_close_fails() {
        let broker = InMemoryBroker::with_standard_topology().await.unwrap();
        broker.close().await;
        let result = broker
            .publish(publication(PRODUCT_EXCHANGE, INSERT_ROUTING_KEY, b"x"))
            .await;
        assert!(matches!(result, Err(BrokerError::Closed)));
    }
}
