//! Topology declaration against the in-memory broker.

use broker::topology::{
    DLQ_ROUTING_KEY, ERROR_EXCHANGE, INSERT_ROUTING_KEY, LOGGING_QUEUE, PRODUCT_DLQ,
    PRODUCT_EXCHANGE, PRODUCT_INSERT_QUEUE, PRODUCT_UPDATE_QUEUE,
};
use broker::{
    AckMode, BrokerError, DeadLetterTarget, DeliveryStream, InMemoryBroker, MessageBroker,
    MessageBrokerExt, Publication, Topology,
};

/// Declares the standard topology, then subscribes to the insert queue, the
/// way every service starts.
async fn start(broker: &InMemoryBroker) -> broker::Result<DeliveryStream> {
    broker.declare_topology(&Topology::standard()).await?;
    broker.consume(PRODUCT_INSERT_QUEUE, AckMode::Auto).await
}

#[tokio::test]
async fn test_failed_declaration_stops_startup() {
    let broker = InMemoryBroker::new();
    broker.set_fail_on_declare(true).await;

    let result = start(&broker).await;

    assert!(matches!(result, Err(BrokerError::InvalidTopology(_))));
    assert_eq!(broker.declaration_count().await, 0);
    assert!(broker.queue_spec(PRODUCT_INSERT_QUEUE).await.is_none());
    assert!(broker.published().await.is_empty());

    // Nothing was declared, so there is nothing to consume from or route to.
    let consumed = broker.consume(PRODUCT_INSERT_QUEUE, AckMode::Auto).await;
    assert!(matches!(consumed, Err(BrokerError::UnknownQueue(_))));
    let published = broker
        .publish(Publication::new(
            PRODUCT_EXCHANGE,
            INSERT_ROUTING_KEY,
            b"{}".to_vec(),
            "application/json",
        ))
        .await;
    assert!(matches!(published, Err(BrokerError::UnknownExchange(_))));
}

#[tokio::test]
async fn test_successful_declaration_allows_consuming() {
    let broker = InMemoryBroker::new();

    assert!(start(&broker).await.is_ok());
    assert_eq!(broker.declaration_count().await, 1);
}

#[tokio::test]
async fn test_mutation_queues_dead_letter_to_error_exchange() {
    let broker = InMemoryBroker::with_standard_topology().await.unwrap();
    let expected = DeadLetterTarget {
        exchange: ERROR_EXCHANGE.to_string(),
        routing_key: DLQ_ROUTING_KEY.to_string(),
    };

    for queue in [PRODUCT_INSERT_QUEUE, PRODUCT_UPDATE_QUEUE] {
        let spec = broker.queue_spec(queue).await.unwrap();
        assert!(spec.durable, "{queue} should be durable");
        assert_eq!(spec.dead_letter.as_ref(), Some(&expected), "queue: {queue}");
    }

    for queue in [PRODUCT_DLQ, LOGGING_QUEUE] {
        let spec = broker.queue_spec(queue).await.unwrap();
        assert!(spec.durable, "{queue} should be durable");
        assert_eq!(spec.dead_letter, None, "queue: {queue}");
    }
}
