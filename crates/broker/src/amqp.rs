use std::collections::BTreeMap;
use std::sync::Arc;

use async_trait::async_trait;
use futures_util::StreamExt;
use lapin::acker::Acker;
use lapin::options::{
    BasicAckOptions, BasicConsumeOptions, BasicPublishOptions, BasicQosOptions,
    ExchangeDeclareOptions, QueueBindOptions, QueueDeclareOptions,
};
use lapin::types::{AMQPValue, FieldTable, LongString, ShortString};
use lapin::{BasicProperties, Channel, Connection, ConnectionProperties, ExchangeKind};
use uuid::Uuid;

use crate::broker::{AckMode, Acknowledger, Delivery, DeliveryStream, MessageBroker, Publication};
use crate::topology::{ARG_DEAD_LETTER_EXCHANGE, ARG_DEAD_LETTER_ROUTING_KEY, QueueSpec, Topology};
use crate::{BrokerError, Result};

/// AMQP reply code for a normal close.
const REPLY_SUCCESS: u16 = 200;

/// Unacknowledged deliveries allowed per consumer in
/// [`AckMode::AfterProcessing`].
const PREFETCH_COUNT: u16 = 16;

/// RabbitMQ-backed broker.
///
/// Owns one connection and one channel for the lifetime of the process.
/// Clones share both; call [`AmqpBroker::close`] once on shutdown.
#[derive(Clone)]
pub struct AmqpBroker {
    connection: Arc<Connection>,
    channel: Channel,
    consumer_prefix: String,
}

impl AmqpBroker {
    /// Connects to the broker at `uri` and opens a channel.
    ///
    /// `consumer_prefix` names this process in consumer tags.
    pub async fn connect(uri: &str, consumer_prefix: impl Into<String>) -> Result<Self> {
        let connection = Connection::connect(uri, ConnectionProperties::default()).await?;
        let channel = connection.create_channel().await?;
        tracing::info!(channel_id = channel.id(), "connected to AMQP broker");

        Ok(Self {
            connection: Arc::new(connection),
            channel,
            consumer_prefix: consumer_prefix.into(),
        })
    }

    /// Gets a reference to the underlying channel.
    pub fn channel(&self) -> &Channel {
        &self.channel
    }

    /// Closes the channel and the connection.
    pub async fn close(&self) -> Result<()> {
        self.channel.close(REPLY_SUCCESS, "shutdown").await?;
        self.connection.close(REPLY_SUCCESS, "shutdown").await?;
        tracing::info!("AMQP connection closed");
        Ok(())
    }

    fn consumer_tag(&self, queue: &str) -> String {
        format!("{}-{}-{}", self.consumer_prefix, queue, Uuid::new_v4().simple())
    }
}

fn queue_arguments(queue: &QueueSpec) -> FieldTable {
    let mut arguments = FieldTable::default();
    if let Some(target) = &queue.dead_letter {
        arguments.insert(
            ShortString::from(ARG_DEAD_LETTER_EXCHANGE),
            AMQPValue::LongString(LongString::from(target.exchange.clone())),
        );
        arguments.insert(
            ShortString::from(ARG_DEAD_LETTER_ROUTING_KEY),
            AMQPValue::LongString(LongString::from(target.routing_key.clone())),
        );
    }
    arguments
}

fn header_table(headers: &BTreeMap<String, String>) -> FieldTable {
    let mut table = FieldTable::default();
    for (key, value) in headers {
        table.insert(
            ShortString::from(key.clone()),
            AMQPValue::LongString(LongString::from(value.clone())),
        );
    }
    table
}

/// Extracts string headers. Non-string values are skipped.
fn headers_from_table(table: &FieldTable) -> BTreeMap<String, String> {
    table
        .inner()
        .iter()
        .filter_map(|(key, value)| {
            let value = match value {
                AMQPValue::LongString(s) => String::from_utf8_lossy(s.as_bytes()).into_owned(),
                AMQPValue::ShortString(s) => s.as_str().to_string(),
                _ => return None,
            };
            Some((key.as_str().to_string(), value))
        })
        .collect()
}

fn into_delivery(queue: &str, delivery: lapin::message::Delivery, ack_mode: AckMode) -> Delivery {
    let headers = delivery
        .properties
        .headers()
        .as_ref()
        .map(headers_from_table)
        .unwrap_or_default();
    let content_type = delivery
        .properties
        .content_type()
        .as_ref()
        .map(|c| c.as_str().to_string());

    let converted = Delivery::new(queue, delivery.routing_key.as_str(), delivery.data)
        .with_content_type(content_type)
        .with_headers(headers);

    match ack_mode {
        AckMode::Auto => converted,
        AckMode::AfterProcessing => converted.with_acker(Box::new(AmqpAcker(delivery.acker))),
    }
}

struct AmqpAcker(Acker);

#[async_trait]
impl Acknowledger for AmqpAcker {
    async fn ack(&self) -> Result<()> {
        self.0.ack(BasicAckOptions::default()).await?;
        Ok(())
    }
}

#[async_trait]
impl MessageBroker for AmqpBroker {
    async fn declare(&self, topology: &Topology) -> Result<()> {
        for exchange in &topology.exchanges {
            self.channel
                .exchange_declare(
                    &exchange.name,
                    ExchangeKind::Direct,
                    ExchangeDeclareOptions {
                        durable: exchange.durable,
                        ..Default::default()
                    },
                    FieldTable::default(),
                )
                .await?;
            tracing::debug!(exchange = %exchange.name, "exchange declared");
        }

        for queue in &topology.queues {
            self.channel
                .queue_declare(
                    &queue.name,
                    QueueDeclareOptions {
                        durable: queue.durable,
                        ..Default::default()
                    },
                    queue_arguments(queue),
                )
                .await?;
            tracing::debug!(queue = %queue.name, "queue declared");
        }

        for binding in &topology.bindings {
            self.channel
                .queue_bind(
                    &binding.queue,
                    &binding.exchange,
                    &binding.routing_key,
                    QueueBindOptions::default(),
                    FieldTable::default(),
                )
                .await?;
            tracing::debug!(
                exchange = %binding.exchange,
                queue = %binding.queue,
                routing_key = %binding.routing_key,
                "queue bound"
            );
        }

        Ok(())
    }

    async fn publish(&self, publication: Publication) -> Result<()> {
        let mut properties = BasicProperties::default()
            .with_content_type(ShortString::from(publication.content_type.clone()));
        if !publication.headers.is_empty() {
            properties = properties.with_headers(header_table(&publication.headers));
        }

        // The returned confirmation is dropped: publishes are fire-and-forget.
        self.channel
            .basic_publish(
                &publication.exchange,
                &publication.routing_key,
                BasicPublishOptions::default(),
                &publication.body,
                properties,
            )
            .await?;

        metrics::counter!("broker_messages_published_total", "routing_key" => publication.routing_key.clone())
            .increment(1);
        tracing::debug!(
            exchange = %publication.exchange,
            routing_key = %publication.routing_key,
            bytes = publication.body.len(),
            "message published"
        );
        Ok(())
    }

    async fn consume(&self, queue: &str, ack_mode: AckMode) -> Result<DeliveryStream> {
        if ack_mode == AckMode::AfterProcessing {
            self.channel
                .basic_qos(PREFETCH_COUNT, BasicQosOptions::default())
                .await?;
        }

        let consumer = self
            .channel
            .basic_consume(
                queue,
                &self.consumer_tag(queue),
                BasicConsumeOptions {
                    no_ack: ack_mode == AckMode::Auto,
                    ..Default::default()
                },
                FieldTable::default(),
            )
            .await?;
        tracing::info!(queue, %ack_mode, "consumer registered");

        let queue = queue.to_string();
        let deliveries = consumer.map(move |result| {
            result
                .map(|delivery| into_delivery(&queue, delivery, ack_mode))
                .map_err(BrokerError::from)
        });

        Ok(Box::pin(deliveries))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::topology::PRODUCT_INSERT_QUEUE;

    #[test]
    fn mutation_queue_arguments_name_dead_letter_target() {
        let topology = Topology::standard();
        let queue = topology
            .queues
            .iter()
            .find(|q| q.name == PRODUCT_INSERT_QUEUE)
            .unwrap();

        let arguments = headers_from_table(&queue_arguments(queue));
        assert_eq!(arguments["x-dead-letter-exchange"], "error_exchange");
        assert_eq!(arguments["x-dead-letter-routing-key"], "product.dlq");
    }

    #[test]
    fn header_table_round_trips_strings() {
        let mut headers = BTreeMap::new();
        headers.insert("x-error".to_string(), "timed out".to_string());
        headers.insert("x-mutation-kind".to_string(), "update".to_string());
        assert_eq!(headers_from_table(&header_table(&headers)), headers);
    }
}
