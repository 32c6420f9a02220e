//! Exchange, queue and binding layout.
//!
//! ```text
//! product_exchange ──product.insert──► product_insert_queue ─┐
//!                  ──product.update──► product_update_queue ─┤ x-dead-letter
//!                                                           ▼
//! error_exchange   ──product.dlq─────► product_dlq
//!                  ──logging.error───► logging_queue
//! ```
//!
//! The names below are a wire contract shared with every producer and
//! consumer of these queues and must not change.

use std::collections::HashSet;

use common::MutationKind;

use crate::{BrokerError, Result};

pub const PRODUCT_EXCHANGE: &str = "product_exchange";
pub const ERROR_EXCHANGE: &str = "error_exchange";

pub const PRODUCT_INSERT_QUEUE: &str = "product_insert_queue";
pub const PRODUCT_UPDATE_QUEUE: &str = "product_update_queue";
pub const PRODUCT_DLQ: &str = "product_dlq";
pub const LOGGING_QUEUE: &str = "logging_queue";

pub const INSERT_ROUTING_KEY: &str = "product.insert";
pub const UPDATE_ROUTING_KEY: &str = "product.update";
pub const DLQ_ROUTING_KEY: &str = "product.dlq";
pub const LOGGING_ROUTING_KEY: &str = "logging.error";

/// Queue argument naming the dead-letter exchange.
pub const ARG_DEAD_LETTER_EXCHANGE: &str = "x-dead-letter-exchange";

/// Queue argument naming the dead-letter routing key.
pub const ARG_DEAD_LETTER_ROUTING_KEY: &str = "x-dead-letter-routing-key";

/// A direct exchange.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ExchangeSpec {
    pub name: String,
    pub durable: bool,
}

/// Where the broker routes messages it dead-letters itself.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct DeadLetterTarget {
    pub exchange: String,
    pub routing_key: String,
}

/// A queue declaration.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct QueueSpec {
    pub name: String,
    pub durable: bool,
    pub dead_letter: Option<DeadLetterTarget>,
}

/// Binds a queue to an exchange under a routing key.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Binding {
    pub exchange: String,
    pub queue: String,
    pub routing_key: String,
}

/// A complete broker layout.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct Topology {
    pub exchanges: Vec<ExchangeSpec>,
    pub queues: Vec<QueueSpec>,
    pub bindings: Vec<Binding>,
}

impl Topology {
    /// The production layout shared by every service.
    pub fn standard() -> Self {
        let dead_letter = DeadLetterTarget {
            exchange: ERROR_EXCHANGE.to_string(),
            routing_key: DLQ_ROUTING_KEY.to_string(),
        };

        Self::default()
            .exchange(PRODUCT_EXCHANGE)
            .exchange(ERROR_EXCHANGE)
            .queue(PRODUCT_INSERT_QUEUE, Some(dead_letter.clone()))
            .queue(PRODUCT_UPDATE_QUEUE, Some(dead_letter))
            .queue(PRODUCT_DLQ, None)
            .queue(LOGGING_QUEUE, None)
            .bind(PRODUCT_EXCHANGE, PRODUCT_INSERT_QUEUE, INSERT_ROUTING_KEY)
            .bind(PRODUCT_EXCHANGE, PRODUCT_UPDATE_QUEUE, UPDATE_ROUTING_KEY)
            .bind(ERROR_EXCHANGE, PRODUCT_DLQ, DLQ_ROUTING_KEY)
            .bind(ERROR_EXCHANGE, LOGGING_QUEUE, LOGGING_ROUTING_KEY)
    }

    /// Adds a durable direct exchange.
    pub fn exchange(mut self, name: &str) -> Self {
        self.exchanges.push(ExchangeSpec {
            name: name.to_string(),
            durable: true,
        });
        self
    }

    /// Adds a durable queue.
    pub fn queue(mut self, name: &str, dead_letter: Option<DeadLetterTarget>) -> Self {
        self.queues.push(QueueSpec {
            name: name.to_string(),
            durable: true,
            dead_letter,
        });
        self
    }

    /// Adds a binding.
    pub fn bind(mut self, exchange: &str, queue: &str, routing_key: &str) -> Self {
        self.bindings.push(Binding {
            exchange: exchange.to_string(),
            queue: queue.to_string(),
            routing_key: routing_key.to_string(),
        });
        self
    }

    /// Returns the queues a direct exchange delivers `routing_key` to.
    pub fn route<'a>(&'a self, exchange: &'a str, routing_key: &'a str) -> impl Iterator<Item = &'a str> {
        self.bindings
            .iter()
            .filter(move |b| b.exchange == exchange && b.routing_key == routing_key)
            .map(|b| b.queue.as_str())
    }

    /// Checks that every binding and dead-letter target refers to a declared
    /// exchange and queue.
    pub fn validate(&self) -> Result<()> {
        let exchanges: HashSet<&str> = self.exchanges.iter().map(|e| e.name.as_str()).collect();
        let queues: HashSet<&str> = self.queues.iter().map(|q| q.name.as_str()).collect();

        for binding in &self.bindings {
            if !exchanges.contains(binding.exchange.as_str()) {
                return Err(BrokerError::InvalidTopology(format!(
                    "binding {} refers to undeclared exchange {}",
                    binding.routing_key, binding.exchange
                )));
            }
            if !queues.contains(binding.queue.as_str()) {
                return Err(BrokerError::InvalidTopology(format!(
                    "binding {} refers to undeclared queue {}",
                    binding.routing_key, binding.queue
                )));
            }
        }

        for queue in &self.queues {
            if let Some(target) = &queue.dead_letter
                && !exchanges.contains(target.exchange.as_str())
            {
                return Err(BrokerError::InvalidTopology(format!(
                    "queue {} dead-letters to undeclared exchange {}",
                    queue.name, target.exchange
                )));
            }
        }

        Ok(())
    }
}

/// Routing key under which a mutation of `kind` is published.
pub fn routing_key_for(kind: MutationKind) -> &'static str {
    match kind {
        MutationKind::Insert => INSERT_ROUTING_KEY,
        MutationKind::Update => UPDATE_ROUTING_KEY,
    }
}

/// Queue that carries mutations of `kind`.
pub fn queue_for(kind: MutationKind) -> &'static str {
    match kind {
        MutationKind::Insert => PRODUCT_INSERT_QUEUE,
        MutationKind::Update => PRODUCT_UPDATE_QUEUE,
    }
}

/// The mutation kind implied by a queue, if it is a mutation queue.
pub fn kind_for_queue(queue: &str) -> Option<MutationKind> {
    match queue {
        PRODUCT_INSERT_QUEUE => Some(MutationKind::Insert),
        PRODUCT_UPDATE_QUEUE => Some(MutationKind::Update),
        _ => None,
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn standard_topology_matches_wire_contract() {
        let topology = Topology::standard();

        let table: Vec<(&str, &str, &str)> = topology
            .bindings
            .iter()
            .map(|b| (b.exchange.as_str(), b.queue.as_str(), b.routing_key.as_str()))
            .collect();
        assert_eq!(
            table,
            vec![
                ("product_exchange", "product_insert_queue", "product.insert"),
                ("product_exchange", "product_update_queue", "product.update"),
                ("error_exchange", "product_dlq", "product.dlq"),
                ("error_exchange", "logging_queue", "logging.error"),
            ]
        );
        assert!(topology.exchanges.iter().all(|e| e.durable));
        assert!(topology.queues.iter().all(|q| q.durable));
        assert!(topology.validate().is_ok());
    }

    #[test]
    fn mutation_queues_dead_letter_to_dlq() {
        let topology = Topology::standard();
        for queue in &topology.queues {
            let expected = kind_for_queue(&queue.name).map(|_| DeadLetterTarget {
                exchange: ERROR_EXCHANGE.to_string(),
                routing_key: DLQ_ROUTING_KEY.to_string(),
            });
            assert_eq!(queue.dead_letter, expected, "queue {}", queue.name);
        }
    }

    #[test]
    fn route_follows_bindings() {
        let topology = Topology::standard();
        let queues: Vec<_> = topology.route(PRODUCT_EXCHANGE, UPDATE_ROUTING_KEY).collect();
        assert_eq!(queues, vec![PRODUCT_UPDATE_QUEUE]);
        assert_eq!(topology.route(PRODUCT_EXCHANGE, DLQ_ROUTING_KEY).count(), 0);
    }

    #[test]
    fn validate_rejects_dangling_binding() {
        let topology = Topology::default()
            .exchange(PRODUCT_EXCHANGE)
            .bind(PRODUCT_EXCHANGE, PRODUCT_INSERT_QUEUE, INSERT_ROUTING_KEY);
        assert!(matches!(
            topology.validate(),
            Err(BrokerError::InvalidTopology(_))
        ));
    }

    #[test]
    fn kinds_map_to_their_queues() {
        for kind in [MutationKind::Insert, MutationKind::Update] {
            assert_eq!(kind_for_queue(queue_for(kind)), Some(kind));
        }
        assert_eq!(routing_key_for(MutationKind::Insert), "product.insert");
        assert_eq!(kind_for_queue(PRODUCT_DLQ), None);
    }
}
