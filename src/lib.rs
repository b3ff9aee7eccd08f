//! EventRelay - Kafka event-change relay library
//!
//! This library provides the core functionality for EventRelay: joining
//! several Kafka consumers with adaptive backoff, decoding versioned
//! event-change messages, and relaying decoded events to a sink.
//!
//! # Architecture
//!
//! The library is organized into the following modules:
//!
//! - `eventstream`: Consumer handles, the joiner, the message decoder, and the relay loop
//! - `config`: Configuration management and validation
//! - `error`: Error types and result aliases
//! - `logging`: Tracing subscriber setup
//! - `telemetry`: Relay metrics
//! - `cli`: Command-line interface definition
//! - `commands`: Handlers behind the CLI commands
//!
//! # Example
//!
//! ```no_run
//! use eventrelay::Config;
//!
//! fn main() -> anyhow::Result<()> {
//!     let config = Config::load("config/eventrelay.yaml", &Default::default())?;
//!     config.validate()?;
//!
//!     for consumer in config.consumer_configs()? {
//!         println!("{} -> {}", consumer.brokers, consumer.topic);
//!     }
//!     Ok(())
//! }
//! ```

pub mod cli;
pub mod commands;
pub mod config;
pub mod error;
pub mod eventstream;
pub mod logging;
pub mod telemetry;

// Re-export commonly used types
pub use config::Config;
pub use error::{EventRelayError, Result};
pub use eventstream::{
    join, parse_event_message, DecodeError, EventChange, Joiner, ParsedMessage, Relay,
    RelayStats,
};
