//! Consumer handles polled by the joiner.
//!
//! A [`ConsumerHandle`] is anything that can be asked for "one message, maybe
//! none, maybe an error" within a timeout. [`KafkaHandle`] is the production
//! implementation on top of rdkafka's `BaseConsumer`; tests use in-memory
//! handles.

use std::fmt;
use std::time::Duration;

use rdkafka::consumer::{BaseConsumer, Consumer};
use rdkafka::error::KafkaError;
use rdkafka::message::{Message, OwnedMessage};
use thiserror::Error;
use tracing::info;

use super::config::KafkaConsumerConfig;

/// Errors that can occur while creating a consumer handle.
#[derive(Error, Debug)]
pub enum ConsumerError {
    /// Error from the Kafka client.
    #[error("Kafka error: {0}")]
    Kafka(#[from] KafkaError),
}

/// A pollable message source.
///
/// Handles own their own state (connection, offsets, assignment); callers only
/// ever borrow them.
#[cfg_attr(
    test,
    mockall::automock(type Message = Vec<u8>; type Error = std::io::Error;)
)]
pub trait ConsumerHandle {
    /// Message type produced by a successful poll.
    type Message;

    /// Error reported by the handle when a poll fails.
    type Error: std::error::Error + Send + Sync + 'static;

    /// Waits at most `timeout` for one message.
    ///
    /// Returns `None` when nothing arrived in time.
    fn poll(&self, timeout: Duration) -> Option<Result<Self::Message, Self::Error>>;
}

/// Access to the raw body of a message.
pub trait MessagePayload {
    /// Returns the message body, if it has one.
    fn payload(&self) -> Option<&[u8]>;
}

impl MessagePayload for OwnedMessage {
    fn payload(&self) -> Option<&[u8]> {
        Message::payload(self)
    }
}

impl MessagePayload for Vec<u8> {
    fn payload(&self) -> Option<&[u8]> {
        Some(self.as_slice())
    }
}

/// A Kafka consumer subscribed to a single topic.
pub struct KafkaHandle {
    topic: String,
    consumer: BaseConsumer,
}

// BaseConsumer doesn't impl Debug
impl fmt::Debug for KafkaHandle {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("KafkaHandle")
            .field("topic", &self.topic)
            .finish()
    }
}

impl KafkaHandle {
    /// Creates a consumer from configuration and subscribes it to the
    /// configured topic.
    ///
    /// # Errors
    ///
    /// Returns `ConsumerError::Kafka` if the client cannot be created or the
    /// subscription is rejected.
    pub fn new(config: &KafkaConsumerConfig) -> Result<Self, ConsumerError> {
        info!(
            brokers = %config.brokers,
            topic = %config.topic,
            group_id = %config.group_id,
            security_protocol = %config.security_protocol.as_str(),
            "Creating Kafka consumer handle"
        );

        let consumer: BaseConsumer = config.client_config().create()?;
        consumer.subscribe(&[config.topic.as_str()])?;

        Ok(Self {
            topic: config.topic.clone(),
            consumer,
        })
    }

    /// Returns the topic this handle is subscribed to.
    pub fn topic(&self) -> &str {
        &self.topic
    }
}

impl ConsumerHandle for KafkaHandle {
    type Message = OwnedMessage;
    type Error = KafkaError;

    fn poll(&self, timeout: Duration) -> Option<Result<OwnedMessage, KafkaError>> {
        self.consumer
            .poll(timeout)
            .map(|result| result.map(|message| message.detach()))
    }
}
