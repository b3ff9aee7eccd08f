//! Kafka event stream consumer
//!
//! This module lets a relay process consume event-change messages from one
//! or more Kafka topics and hand the decoded events downstream.
//!
//! # Overview
//!
//! - **Consumer handles**: [`ConsumerHandle`] is the "poll one message"
//!   capability; [`KafkaHandle`] implements it on an rdkafka consumer
//! - **Joiner**: [`Joiner`] polls several handles round-robin with adaptive
//!   backoff
//! - **Messages**: [`parse_event_message`] decodes the versioned envelope
//! - **Relay**: [`Relay`] ties the above together and feeds an [`EventSink`]
//!
//! # Example
//!
//! ```rust,no_run
//! use eventrelay::eventstream::kafka::{KafkaConsumerConfig, KafkaHandle, Relay};
//! use eventrelay::eventstream::kafka::relay::LoggingSink;
//!
//! fn main() -> anyhow::Result<()> {
//!     let config = KafkaConsumerConfig::new("localhost:9092", "events", "relay");
//!     let handles = vec![
//!         KafkaHandle::new(&config)?,
//!         KafkaHandle::new(&config.for_topic("events-replay"))?,
//!     ];
//!
//!     let mut relay = Relay::new(LoggingSink);
//!     let stats = relay.run(&handles)?;
//!     println!("relayed {} inserts", stats.inserted);
//!     Ok(())
//! }
//! ```
//!
//! # Wire Format
//!
//! ```text
//! [1, "insert", {event data}, {task state}]
//! [1, "delete", {...}, {...}]   ignored
//! ```
//!
//! Any version other than `1` is rejected as unsupported.

pub mod config;
pub mod consumer;
pub mod fake;
pub mod join;
pub mod message;
pub mod relay;

pub use config::{
    ConfigError, KafkaConsumerConfig, SaslConfig, SaslMechanism, SecurityProtocol, SslConfig,
};
pub use consumer::{ConsumerError, ConsumerHandle, KafkaHandle, MessagePayload};
pub use join::{join, Backoff, JoinError, Joiner, PollError, PollResult, DEFAULT_THROTTLE};
pub use message::{
    encode_insert, parse_event_message, DecodeError, Event, EventChange, ParsedMessage,
};
pub use relay::{
    EventSink, LoggingSink, MemorySink, Outcome, Relay, RelayError, RelayStats, SinkError,
};
