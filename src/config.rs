//! Configuration management for EventRelay
//!
//! This module handles loading, parsing, validating, and managing
//! configuration from files, environment variables, and CLI overrides.

use crate::cli::{Cli, Commands};
use crate::error::{EventRelayError, Result};
use crate::eventstream::kafka::{
    ConfigError, KafkaConsumerConfig, SaslMechanism, SecurityProtocol,
};
use serde::{Deserialize, Serialize};
use std::path::{Path, PathBuf};
use std::time::Duration;

/// Largest accepted throttle, in milliseconds
const MAX_THROTTLE_MS: u64 = 10_000;

/// Accepted log levels
const LOG_LEVELS: [&str; 5] = ["trace", "debug", "info", "warn", "error"];

/// Main configuration structure for EventRelay
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct Config {
    /// Kafka connection and topics
    #[serde(default)]
    pub kafka: KafkaSection,

    /// Relay loop behavior
    #[serde(default)]
    pub relay: RelaySection,

    /// Logging configuration
    #[serde(default)]
    pub logging: LoggingConfig,
}

/// Kafka consumer configuration
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct KafkaSection {
    /// Kafka brokers (comma-separated)
    #[serde(default = "default_brokers")]
    pub brokers: String,

    /// Topics to consume; one consumer is created per topic
    #[serde(default = "default_topics")]
    pub topics: Vec<String>,

    /// Consumer group ID shared by all consumers
    #[serde(default = "default_group_id")]
    pub group_id: String,

    /// Auto offset reset policy ("earliest" or "latest")
    #[serde(default = "default_auto_offset_reset")]
    pub auto_offset_reset: String,

    /// Let the client commit offsets automatically
    #[serde(default = "default_enable_auto_commit")]
    pub enable_auto_commit: bool,

    /// Security configuration
    #[serde(default)]
    pub security: Option<KafkaSecurityConfig>,
}

/// Kafka security configuration
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct KafkaSecurityConfig {
    /// Security protocol (PLAINTEXT, SSL, SASL_PLAINTEXT, SASL_SSL)
    pub protocol: String,

    /// SASL mechanism (PLAIN, SCRAM-SHA-256, SCRAM-SHA-512)
    pub sasl_mechanism: Option<String>,

    /// SASL username
    pub sasl_username: Option<String>,

    /// SASL password (prefer env var EVENTRELAY_KAFKA_SASL_PASSWORD)
    pub sasl_password: Option<String>,

    /// CA certificate path for SSL protocols
    pub ssl_ca_location: Option<String>,
}

/// Relay loop configuration
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct RelaySection {
    /// Poll timeout once all consumers are idle, in milliseconds
    #[serde(default = "default_throttle_ms")]
    pub throttle_ms: u64,

    /// Stop after this many handled messages
    #[serde(default)]
    pub max_messages: Option<u64>,
}

/// Logging configuration
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct LoggingConfig {
    /// Log level (trace, debug, info, warn, error)
    #[serde(default = "default_log_level")]
    pub level: String,

    /// Enable JSON-formatted logs
    #[serde(default)]
    pub json_format: bool,

    /// Log file path (if None, STDERR only)
    pub file_path: Option<PathBuf>,

    /// Include raw payloads of skipped messages in logs
    #[serde(default)]
    pub include_payload: bool,
}

fn default_brokers() -> String {
    "localhost:9092".to_string()
}

fn default_topics() -> Vec<String> {
    vec!["events".to_string()]
}

fn default_group_id() -> String {
    "eventrelay".to_string()
}

fn default_auto_offset_reset() -> String {
    "latest".to_string()
}

fn default_enable_auto_commit() -> bool {
    true
}

fn default_throttle_ms() -> u64 {
    100
}

fn default_log_level() -> String {
    "info".to_string()
}

impl Default for KafkaSection {
    fn default() -> Self {
        Self {
            brokers: default_brokers(),
            topics: default_topics(),
            group_id: default_group_id(),
            auto_offset_reset: default_auto_offset_reset(),
            enable_auto_commit: default_enable_auto_commit(),
            security: None,
        }
    }
}

impl Default for RelaySection {
    fn default() -> Self {
        Self {
            throttle_ms: default_throttle_ms(),
            max_messages: None,
        }
    }
}

impl Default for LoggingConfig {
    fn default() -> Self {
        Self {
            level: default_log_level(),
            json_format: false,
            file_path: None,
            include_payload: false,
        }
    }
}

impl RelaySection {
    /// Returns the throttle as a duration
    pub fn throttle(&self) -> Duration {
        Duration::from_millis(self.throttle_ms)
    }
}

impl Config {
    /// Load configuration from file with environment and CLI overrides
    ///
    /// A missing file is not an error; defaults are used instead.
    ///
    /// # Errors
    ///
    /// Returns error if the file exists but cannot be read or parsed
    pub fn load(path: &str, cli: &Cli) -> Result<Self> {
        let mut config = if Path::new(path).exists() {
            Self::from_file(path)?
        } else {
            tracing::warn!("Config file not found at {}, using defaults", path);
            Self::default()
        };

        config.apply_env_vars();
        config.apply_cli_overrides(cli);

        Ok(config)
    }

    fn from_file(path: &str) -> Result<Self> {
        let contents = std::fs::read_to_string(path)
            .map_err(|e| EventRelayError::Config(format!("Failed to read config file: {}", e)))?;
        let config = serde_yaml::from_str(&contents).map_err(EventRelayError::from)?;
        Ok(config)
    }

    fn apply_env_vars(&mut self) {
        if let Ok(brokers) = std::env::var("EVENTRELAY_KAFKA_BROKERS") {
            self.kafka.brokers = brokers;
        }

        if let Ok(topics) = std::env::var("EVENTRELAY_KAFKA_TOPICS") {
            self.kafka.topics = split_list(&topics);
        }

        if let Ok(group_id) = std::env::var("EVENTRELAY_KAFKA_GROUP_ID") {
            self.kafka.group_id = group_id;
        }

        if let Ok(protocol) = std::env::var("EVENTRELAY_KAFKA_SECURITY_PROTOCOL") {
            self.kafka.security = Some(KafkaSecurityConfig {
                protocol,
                sasl_mechanism: std::env::var("EVENTRELAY_KAFKA_SASL_MECHANISM").ok(),
                sasl_username: std::env::var("EVENTRELAY_KAFKA_SASL_USERNAME").ok(),
                sasl_password: std::env::var("EVENTRELAY_KAFKA_SASL_PASSWORD").ok(),
                ssl_ca_location: std::env::var("EVENTRELAY_KAFKA_SSL_CA_LOCATION").ok(),
            });
            tracing::debug!("Overrode kafka.security from EVENTRELAY_KAFKA_* env vars");
        } else if let Ok(password) = std::env::var("EVENTRELAY_KAFKA_SASL_PASSWORD") {
            if let Some(security) = self.kafka.security.as_mut() {
                security.sasl_password = Some(password);
            }
        }

        if let Ok(throttle) = std::env::var("EVENTRELAY_THROTTLE_MS") {
            match throttle.parse::<u64>() {
                Ok(v) => self.relay.throttle_ms = v,
                Err(_) => tracing::warn!("Invalid value for EVENTRELAY_THROTTLE_MS: {}", throttle),
            }
        }

        if let Ok(level) = std::env::var("EVENTRELAY_LOG_LEVEL") {
            self.logging.level = level;
        }

        if let Ok(json_logs) = std::env::var("EVENTRELAY_JSON_LOGS") {
            match json_logs.to_lowercase().as_str() {
                "1" | "true" | "yes" => self.logging.json_format = true,
                "0" | "false" | "no" => self.logging.json_format = false,
                _ => tracing::warn!("Invalid value for EVENTRELAY_JSON_LOGS: {}", json_logs),
            }
        }
    }

    fn apply_cli_overrides(&mut self, cli: &Cli) {
        if cli.verbose {
            self.logging.level = "debug".to_string();
        }

        if cli.json_logs {
            self.logging.json_format = true;
        }

        if let Commands::Run {
            brokers,
            topics,
            group_id,
            throttle_ms,
            max_messages,
        } = &cli.command
        {
            if let Some(brokers) = brokers {
                self.kafka.brokers = brokers.clone();
            }
            if !topics.is_empty() {
                self.kafka.topics = topics.clone();
            }
            if let Some(group_id) = group_id {
                self.kafka.group_id = group_id.clone();
            }
            if let Some(throttle_ms) = throttle_ms {
                self.relay.throttle_ms = *throttle_ms;
            }
            if max_messages.is_some() {
                self.relay.max_messages = *max_messages;
            }
        }
    }

    /// Validate the configuration
    ///
    /// # Errors
    ///
    /// Returns error if any validation check fails
    pub fn validate(&self) -> Result<()> {
        if self.kafka.brokers.trim().is_empty() {
            return Err(EventRelayError::Config("kafka.brokers cannot be empty".to_string()).into());
        }

        if self.kafka.topics.is_empty() {
            return Err(EventRelayError::Config(
                "kafka.topics must name at least one topic".to_string(),
            )
            .into());
        }

        if self.kafka.topics.iter().any(|topic| topic.trim().is_empty()) {
            return Err(
                EventRelayError::Config("kafka.topics cannot contain empty names".to_string())
                    .into(),
            );
        }

        if self.kafka.group_id.trim().is_empty() {
            return Err(
                EventRelayError::Config("kafka.group_id cannot be empty".to_string()).into(),
            );
        }

        if !matches!(self.kafka.auto_offset_reset.as_str(), "earliest" | "latest") {
            return Err(EventRelayError::Config(format!(
                "Invalid kafka.auto_offset_reset: {}. Must be one of: earliest, latest",
                self.kafka.auto_offset_reset
            ))
            .into());
        }

        if self.relay.throttle_ms == 0 || self.relay.throttle_ms > MAX_THROTTLE_MS {
            return Err(EventRelayError::Config(format!(
                "relay.throttle_ms must be between 1 and {}",
                MAX_THROTTLE_MS
            ))
            .into());
        }

        if self.relay.max_messages == Some(0) {
            return Err(EventRelayError::Config(
                "relay.max_messages must be greater than 0".to_string(),
            )
            .into());
        }

        if !LOG_LEVELS.contains(&self.logging.level.to_lowercase().as_str()) {
            return Err(EventRelayError::Config(format!(
                "Invalid logging.level: {}. Must be one of: {}",
                self.logging.level,
                LOG_LEVELS.join(", ")
            ))
            .into());
        }

        Ok(())
    }

    /// Builds one consumer configuration per configured topic
    ///
    /// # Errors
    ///
    /// Returns error if the security settings are invalid or incomplete
    pub fn consumer_configs(&self) -> Result<Vec<KafkaConsumerConfig>> {
        let first_topic = self
            .kafka
            .topics
            .first()
            .ok_or_else(|| EventRelayError::Config("No topics configured".to_string()))?;

        let mut base = KafkaConsumerConfig::new(&self.kafka.brokers, first_topic, "relay")
            .with_group_id(&self.kafka.group_id)
            .with_auto_offset_reset(&self.kafka.auto_offset_reset);

        if !self.kafka.enable_auto_commit {
            base = base.with_manual_commit();
        }

        if let Some(security) = &self.kafka.security {
            base = apply_security_config(base, security)?;
        }

        Ok(self
            .kafka
            .topics
            .iter()
            .map(|topic| base.for_topic(topic))
            .collect())
    }
}

/// Applies file/env security settings to a consumer configuration
fn apply_security_config(
    mut config: KafkaConsumerConfig,
    security: &KafkaSecurityConfig,
) -> Result<KafkaConsumerConfig> {
    let protocol = SecurityProtocol::parse(&security.protocol).map_err(EventRelayError::from)?;

    if protocol.uses_sasl() {
        let username = security.sasl_username.as_deref().ok_or_else(|| {
            EventRelayError::from(ConfigError::MissingConfig(
                "kafka.security.sasl_username".to_string(),
            ))
        })?;
        let password = security.sasl_password.as_deref().ok_or_else(|| {
            EventRelayError::from(ConfigError::MissingConfig(
                "kafka.security.sasl_password".to_string(),
            ))
        })?;
        let mechanism = SaslMechanism::parse(
            security
                .sasl_mechanism
                .as_deref()
                .unwrap_or(SaslMechanism::default().as_str()),
        )
        .map_err(EventRelayError::from)?;

        config = match mechanism {
            SaslMechanism::ScramSha512 => config.with_sasl_scram_sha512(username, password),
            _ => config.with_sasl_scram_sha256(username, password),
        };
        if let Some(sasl) = config.sasl_config.as_mut() {
            sasl.mechanism = mechanism;
        }
    }

    if let Some(ca_location) = &security.ssl_ca_location {
        config = config.with_ssl(ca_location);
    }

    // SASL helpers default to SASL_SSL; the configured protocol wins.
    config.security_protocol = protocol;
    Ok(config)
}

fn split_list(raw: &str) -> Vec<String> {
    raw.split(',')
        .map(str::trim)
        .filter(|item| !item.is_empty())
        .map(str::to_string)
        .collect()
}
