use thiserror::Error;

/// Errors that can occur when talking to the message broker.
#[derive(Debug, Error)]
pub enum BrokerError {
    /// The AMQP client reported an error.
    #[error("AMQP error: {0}")]
    Amqp(#[from] lapin::Error),

    /// A publish targeted an exchange that was never declared.
    #[error("Unknown exchange: {0}")]
    UnknownExchange(String),

    /// A subscription targeted a queue that was never declared.
    #[error("Unknown queue: {0}")]
    UnknownQueue(String),

    /// The in-process broker only supports one consumer per queue.
    #[error("Queue {0} already has a consumer")]
    AlreadyConsumed(String),

    /// A queue was redeclared with different properties.
    #[error("Queue {queue} redeclared with different arguments")]
    PreconditionFailed { queue: String },

    /// The topology refers to exchanges or queues it does not declare.
    #[error("Invalid topology: {0}")]
    InvalidTopology(String),

    /// The broker rejected or could not accept a publish.
    #[error("Publish failed: {0}")]
    PublishFailed(String),

    /// The broker connection has been closed.
    #[error("Broker connection closed")]
    Closed,

    /// A message body could not be encoded.
    #[error("Serialization error: {0}")]
    Serialization(#[from] serde_json::Error),
}

/// Result type for broker operations.
pub type Result<T> = std::result::Result<T, BrokerError>;
