//! Event stream integration
//!
//! The platform publishes every event change to a Kafka topic as a versioned
//! JSON envelope. This module contains everything needed to read that stream
//! back:
//!
//! 1. **Join**: poll several consumers as one message sequence
//! 2. **Decode**: turn an envelope into an event change, or skip it
//! 3. **Relay**: hand decoded changes to a sink
//!
//! # Submodules
//!
//! - [`kafka`]: Kafka consumer handles, joiner, decoder and relay loop

pub mod kafka;

pub use kafka::{
    encode_insert, join, parse_event_message, ConsumerHandle, DecodeError, Event, EventChange,
    EventSink, Joiner, KafkaConsumerConfig, KafkaHandle, ParsedMessage, Relay, RelayError,
    RelayStats,
};
