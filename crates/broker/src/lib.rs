//! Broker plumbing for the product replication pipeline.
//!
//! - [`Topology`] describes the exchanges, queues and bindings every service
//!   relies on, and [`Topology::standard`] is the fixed production layout
//! - [`MessageBroker`] is the publish/consume seam injected into every
//!   component; [`AmqpBroker`] talks to RabbitMQ and [`InMemoryBroker`]
//!   routes messages in-process for tests
//! - [`AckMode`] makes the acknowledgement policy of a subscription explicit

pub mod amqp;
pub mod broker;
pub mod error;
pub mod memory;
pub mod topology;

pub use amqp::AmqpBroker;
pub use broker::{
    AckMode, Acknowledger, Delivery, DeliveryStream, MessageBroker, MessageBrokerExt, Publication,
};
pub use error::{BrokerError, Result};
pub use memory::InMemoryBroker;
pub use topology::{Binding, DeadLetterTarget, ExchangeSpec, QueueSpec, Topology};
