//! Error types for EventRelay
//!
//! This module defines the application-level error type. Domain modules
//! under `eventstream::kafka` carry their own `thiserror` enums, which
//! convert into [`EventRelayError`] at the command boundary.

use thiserror::Error;

use crate::eventstream::kafka::config::ConfigError;
use crate::eventstream::kafka::consumer::ConsumerError;
use crate::eventstream::kafka::message::DecodeError;
use crate::eventstream::kafka::relay::RelayError;

/// Main error type for EventRelay operations
#[derive(Error, Debug)]
pub enum EventRelayError {
    /// Configuration-related errors
    #[error("Configuration error: {0}")]
    Config(String),

    /// Invalid Kafka client settings
    #[error("Kafka configuration error: {0}")]
    KafkaConfig(#[from] ConfigError),

    /// Consumer creation or subscription failed
    #[error("Consumer error: {0}")]
    Consumer(#[from] ConsumerError),

    /// The relay loop aborted
    #[error("Relay error: {0}")]
    Relay(#[from] RelayError),

    /// The blocking relay task panicked or was cancelled
    #[error("Relay task failed: {0}")]
    Task(#[from] tokio::task::JoinError),

    /// A message could not be decoded
    #[error("Decode error: {0}")]
    Decode(#[from] DecodeError),

    /// IO errors
    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),

    /// JSON serialization/deserialization errors
    #[error("Serialization error: {0}")]
    Serialization(#[from] serde_json::Error),

    /// YAML parsing errors
    #[error("YAML error: {0}")]
    Yaml(#[from] serde_yaml::Error),
}

/// Result type alias for EventRelay operations
///
/// Uses `anyhow::Error` so commands can attach context while propagating.
pub type Result<T> = anyhow::Result<T>;

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_config_error_display() {
        let error = EventRelayError::Config("no topics".to_string());
        assert_eq!(error.to_string(), "Configuration error: no topics");
    }

    #[test]
    fn test_decode_error_conversion() {
        let error: EventRelayError = DecodeError::InvalidVersion(2).into();
        assert!(matches!(error, EventRelayError::Decode(_)));
        assert!(error.to_string().starts_with("Decode error:"));
    }

    #[test]
    fn test_kafka_config_error_conversion() {
        let error: EventRelayError =
            ConfigError::InvalidSecurityProtocol("TELEGRAPH".to_string()).into();
        assert!(error.to_string().contains("TELEGRAPH"));
    }

    #[tokio::test]
    async fn test_task_error_conversion() {
        let handle = tokio::task::spawn_blocking(|| panic!("relay thread died"));
        let join_error = handle.await.unwrap_err();

        let error: EventRelayError = join_error.into();
        assert!(matches!(error, EventRelayError::Task(_)));
        assert!(error.to_string().starts_with("Relay task failed:"));
    }

    #[test]
    fn test_io_error_conversion() {
        let io_error = std::io::Error::new(std::io::ErrorKind::NotFound, "file not found");
        let error: EventRelayError = io_error.into();
        assert!(matches!(error, EventRelayError::Io(_)));
    }

    #[test]
    fn test_yaml_error_conversion() {
        let yaml_error = serde_yaml::from_str::<serde_yaml::Value>("key: [").unwrap_err();
        let error: EventRelayError = yaml_error.into();
        assert!(error.to_string().starts_with("YAML error:"));
    }

    #[test]
    fn test_anyhow_downcast() {
        let result: Result<()> = Err(EventRelayError::Config("bad".to_string()).into());
        let error = result.unwrap_err();
        assert!(matches!(
            error.downcast_ref::<EventRelayError>(),
            Some(EventRelayError::Config(_))
        ));
    }
}
